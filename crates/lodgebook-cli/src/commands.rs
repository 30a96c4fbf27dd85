//! Command parsing and execution.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use lodgebook_core::analytics::{provincial_analytics, AnalyticsRange, AttendanceRollup};
use lodgebook_core::auth::{
    authenticate, create_account, redeem_invitation, refresh_if_needed, resolve_member,
    resolve_session, sign_out, validate_new_password, CredentialStore, Session, SessionFile,
};
use lodgebook_core::events::upcoming_events;
use lodgebook_core::meetings::{load_meetings, CalendarMonth, MeetingsFilter};
use lodgebook_core::models::{ChapterMeeting, Member, RsvpStatus};
use lodgebook_core::nav::{is_group, FileStorage, MenuRow, MenuState};
use lodgebook_core::push::save_push_token;
use lodgebook_core::rsvp::{event_with_response, respond};
use lodgebook_core::utils::{format_currency, format_percent, format_timestamp, truncate_string};
use lodgebook_core::{BackendConfig, Config, LodgeError, StoreClient};
use tracing::{debug, warn};

#[derive(Debug, Parser)]
#[command(name = "lodgebook")]
#[command(about = "Lodge events, RSVPs and meetings from the terminal")]
pub struct Cli {
    /// Also write logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login {
        /// Defaults to the last email used
        email: Option<String>,

        /// Keep the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Redeem an invitation and set up your account
    Redeem { code: String },
    /// Show the signed-in member
    #[command(name = "whoami")]
    WhoAmI,
    /// Upcoming events in your lodges
    Events,
    /// Event details and your response
    Event { id: String },
    /// Respond to an event
    Rsvp {
        id: String,

        /// yes, no or pending
        #[arg(value_parser = parse_status)]
        status: RsvpStatus,
    },
    /// Provincial attendance analytics
    Analytics {
        /// 30, 90, 365 or all (days)
        #[arg(value_parser = parse_range, default_value = "90")]
        range: AnalyticsRange,

        /// Print the rollup as JSON
        #[arg(long)]
        json: bool,
    },
    /// Public chapter meetings calendar
    Meetings {
        /// Area name, or "all"; defaults to the last area viewed
        area: Option<String>,

        /// Month to show (YYYY-MM)
        #[arg(short, long, value_parser = parse_month)]
        month: Option<Month>,
    },
    /// Your lodge events as a calendar
    MyMeetings {
        /// Month to show (YYYY-MM)
        #[arg(short, long, value_parser = parse_month)]
        month: Option<Month>,
    },
    /// Register this device for notifications
    PushToken { token: String },
    /// Show or change the navigation menu
    Menu {
        #[command(subcommand)]
        action: Option<MenuAction>,
    },
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum MenuAction {
    /// Open or close a menu group
    Toggle {
        #[arg(required = true, num_args = 1..)]
        label: Vec<String>,
    },
}

/// A calendar month given as YYYY-MM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

fn parse_month(s: &str) -> Result<Month, String> {
    NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .map(|date| Month {
            year: date.year(),
            month: date.month(),
        })
        .map_err(|_| format!("expected YYYY-MM, got '{}'", s))
}

fn parse_status(s: &str) -> Result<RsvpStatus, String> {
    RsvpStatus::parse(s).ok_or_else(|| format!("expected yes, no or pending, got '{}'", s))
}

fn parse_range(s: &str) -> Result<AnalyticsRange, String> {
    AnalyticsRange::parse(s).ok_or_else(|| format!("expected 30, 90, 365 or all, got '{}'", s))
}

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("{} [{}]: ", label, d),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let value = line.trim();
    Ok(match (value.is_empty(), default) {
        (true, Some(d)) => d.to_string(),
        _ => value.to_string(),
    })
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    client: StoreClient,
    meetings: Option<StoreClient>,
    credentials: CredentialStore,
    session_file: SessionFile,
    config: Config,
    cache_dir: PathBuf,
}

impl App {
    pub fn new(backend: &BackendConfig, config: Config, cache_dir: PathBuf) -> Result<Self> {
        let client = StoreClient::new(&backend.url, &backend.anon_key)
            .context("Failed to create lodge database client")?;
        let meetings = match &backend.meetings {
            Some((url, key)) => Some(
                StoreClient::new(url, key).context("Failed to create meetings database client")?,
            ),
            None => None,
        };

        Ok(Self {
            client,
            meetings,
            credentials: CredentialStore::new(&backend.url),
            session_file: SessionFile::new(cache_dir.clone()),
            config,
            cache_dir,
        })
    }

    pub async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { email, remember } => self.login(email, remember).await,
            Command::Logout => self.logout().await,
            Command::Redeem { code } => self.redeem(&code).await,
            Command::WhoAmI => self.whoami().await,
            Command::Events => self.events().await,
            Command::Event { id } => self.event(&id).await,
            Command::Rsvp { id, status } => self.rsvp(&id, status).await,
            Command::Analytics { range, json } => self.analytics(range, json).await,
            Command::Meetings { area, month } => self.meetings(area, month).await,
            Command::MyMeetings { month } => self.my_meetings(month).await,
            Command::PushToken { token } => self.push_token(&token).await,
            Command::Menu { action } => self.menu(action),
        }
    }

    /// Restore the saved session, refreshing tokens when close to expiry.
    /// Returns a client carrying the member's token.
    async fn session(&mut self) -> Result<(StoreClient, Session)> {
        self.session_file.load()?;
        let Some(tokens) = self.session_file.data.clone() else {
            return Ok((self.client.clone(), Session::Absent));
        };

        let tokens = match refresh_if_needed(&self.client, tokens).await {
            Ok(tokens) => tokens,
            Err(LodgeError::NotSignedIn) => {
                warn!("Saved session could not be refreshed");
                self.session_file.clear()?;
                return Ok((self.client.clone(), Session::Absent));
            }
            Err(e) => return Err(e.into()),
        };

        let client = self.client.with_token(tokens.access_token.clone());
        self.session_file.update(tokens);
        self.session_file.save()?;

        let session = resolve_session(&client, &client).await?;
        Ok((client, session))
    }

    async fn signed_in(&mut self) -> Result<(StoreClient, Session, Member)> {
        let (client, session) = self.session().await?;
        let member = session.member().cloned().ok_or(LodgeError::NotSignedIn)?;
        Ok((client, session, member))
    }

    fn remember_config(&self) {
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    async fn login(&mut self, email: Option<String>, remember: bool) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => prompt("Email", self.config.last_email.as_deref())?,
        };

        let remembered = self.credentials.has_credentials(&email);
        let password = if remembered {
            debug!("Using remembered password");
            self.credentials.get_password(&email)?
        } else {
            rpassword::prompt_password("Password: ")?
        };

        let tokens = match authenticate(&self.client, &email, &password).await {
            Ok(tokens) => tokens,
            Err(e @ LodgeError::AuthenticationFailed(_)) if remembered => {
                // The password changed elsewhere; ask again next time
                warn!("Remembered password was rejected");
                self.credentials.forget(&email)?;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        let client = self.client.with_token(tokens.access_token.clone());
        let active = resolve_member(&client, tokens.identity.clone()).await?;

        self.session_file.update(tokens);
        self.session_file.save()?;

        if remember {
            if let Err(e) = self.credentials.store(&email, &password) {
                warn!(error = %e, "Could not remember password");
            }
        }
        self.config.last_email = Some(email);
        self.remember_config();

        println!("Welcome, {}", active.member.salutation());
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        let (client, _) = self.session().await?;
        if self.session_file.data.is_some() {
            sign_out(&client).await?;
        }
        self.session_file.clear()?;

        if let Some(email) = &self.config.last_email {
            self.credentials.forget(email)?;
        }
        println!("Signed out");
        Ok(())
    }

    /// Redeem a code, then walk through account setup
    async fn redeem(&mut self, code: &str) -> Result<()> {
        let redemption = redeem_invitation(&self.client, code, Utc::now()).await?;
        let member = redemption.member;
        println!("Invitation accepted for {}", member.salutation());

        let email = prompt("Email", Some(member.email.as_str()).filter(|e| !e.is_empty()))?;
        let password = rpassword::prompt_password("Choose a password: ")?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;
        validate_new_password(&password, &confirm)?;

        create_account(&self.client, &self.client, &member.id, &email, &password).await?;
        println!("Account created");

        self.login(Some(email), false).await
    }

    async fn whoami(&mut self) -> Result<()> {
        let (_, session, member) = self.signed_in().await?;
        println!("{}", member.salutation());
        println!("  Name:  {}", member.full_name());
        println!("  Email: {}", member.email);
        if let Some(identity) = session.identity() {
            debug!(identity = %identity.id, "Resolved identity");
        }
        if let Some(data) = &self.session_file.data {
            println!(
                "  Session expires {} UTC ({} minutes)",
                format_timestamp(&data.expires_at),
                data.minutes_until_expiry()
            );
        }
        Ok(())
    }

    // ========================================================================
    // Events and responses
    // ========================================================================

    async fn events(&mut self) -> Result<()> {
        let (client, _, member) = self.signed_in().await?;
        let events = upcoming_events(&client, &member, Local::now().date_naive()).await?;

        if events.is_empty() {
            println!("No upcoming events");
            return Ok(());
        }
        for event in &events {
            println!(
                "{:<12} {:<40} {:<24} {}",
                event.formatted_date(),
                truncate_string(&event.title, 40),
                truncate_string(event.venue_display(), 24),
                event.id
            );
        }
        Ok(())
    }

    async fn event(&mut self, id: &str) -> Result<()> {
        let (client, _, member) = self.signed_in().await?;
        let detail = event_with_response(&client, id, &member.id).await?;
        let event = &detail.event;
        let today = Local::now().date_naive();

        println!("{}", event.title);
        if let Some(lodge) = &event.lodge {
            println!("  Lodge:  {}", lodge.display_name());
        }
        println!("  Date:   {} {}", event.formatted_date(), event.event_time.as_deref().unwrap_or(""));
        println!("  Venue:  {}", event.venue_display());
        println!("  Cost:   {}", format_currency(event.cost()));
        if let Some(deadline) = event.rsvp_deadline {
            println!("  RSVP by {}", deadline.format("%-d %b %Y"));
        }
        if let Some(description) = &event.description {
            println!();
            println!("{}", description);
        }
        println!();
        let responded_at = detail.rsvp.as_ref().and_then(|r| r.responded_at);
        match detail.status() {
            Some(status) => match responded_at {
                Some(at) => println!("Your response: {} ({} UTC)", status, format_timestamp(&at)),
                None => println!("Your response: {}", status),
            },
            None if event.rsvp_open(today) => println!("You have not responded yet"),
            None => println!("Responses are closed"),
        }
        Ok(())
    }

    async fn rsvp(&mut self, id: &str, status: RsvpStatus) -> Result<()> {
        let (client, _, member) = self.signed_in().await?;
        let rsvp = respond(&client, &member.id, id, status, Utc::now()).await?;
        println!("Response recorded: {}", rsvp.status);
        Ok(())
    }

    // ========================================================================
    // Analytics
    // ========================================================================

    async fn analytics(&mut self, range: AnalyticsRange, json: bool) -> Result<()> {
        let (client, session, _) = self.signed_in().await?;
        let rollup =
            provincial_analytics(&client, &session, range, Local::now().date_naive()).await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&rollup)?);
        } else {
            print_rollup(range, &rollup);
        }
        Ok(())
    }

    // ========================================================================
    // Meetings calendar
    // ========================================================================

    async fn meetings(&mut self, area: Option<String>, month: Option<Month>) -> Result<()> {
        let source = self
            .meetings
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("The meetings database is not configured"))?;

        let filter = MeetingsFilter::parse(
            area.as_deref()
                .or(self.config.meetings_area.as_deref())
                .unwrap_or(""),
        );
        let meetings = load_meetings(source, &filter).await?;

        if area.is_some() {
            self.config.meetings_area = filter.as_option().map(str::to_string);
            self.remember_config();
        }

        print_calendar(month, &meetings, &filter)
    }

    async fn my_meetings(&mut self, month: Option<Month>) -> Result<()> {
        let (client, _, member) = self.signed_in().await?;
        let events = upcoming_events(&client, &member, Local::now().date_naive()).await?;
        let meetings: Vec<ChapterMeeting> = events.iter().map(ChapterMeeting::from).collect();
        print_calendar(month, &meetings, &MeetingsFilter::All)
    }

    // ========================================================================
    // Device and navigation
    // ========================================================================

    async fn push_token(&mut self, token: &str) -> Result<()> {
        let (client, session) = self.session().await?;
        save_push_token(&client, &session, token).await?;
        println!("Notifications enabled for this device");
        Ok(())
    }

    fn menu(&self, action: Option<MenuAction>) -> Result<()> {
        let storage = FileStorage::in_dir(&self.cache_dir);
        let mut state = MenuState::load(&storage);

        if let Some(MenuAction::Toggle { label }) = action {
            let label = label.join(" ");
            if !is_group(&label) {
                return Err(LodgeError::InvalidInput(format!("No menu group named '{}'", label)).into());
            }
            state.toggle(&label);
            state.save(&storage)?;
        }

        for row in state.rows() {
            match row {
                MenuRow::Group { label, expanded } => {
                    println!("{} {}", if expanded { "v" } else { ">" }, label)
                }
                MenuRow::Link { depth, link } => {
                    println!("{}{:<20} {}", "  ".repeat(depth + 1), link.label, link.path)
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Output
// ============================================================================

fn print_rollup(range: AnalyticsRange, rollup: &AttendanceRollup) {
    println!("Provincial analytics - {}", range.label());
    println!();
    println!(
        "  Events:     {} ({} past, {} upcoming)",
        rollup.total_events, rollup.past_events, rollup.upcoming_events
    );
    println!(
        "  Responses:  {} ({} attending, {} not attending, {} pending)",
        rollup.total_responses, rollup.total_attending, rollup.total_not_attending, rollup.total_pending
    );
    println!(
        "  Attendance: {} attending, {} of responses",
        rollup.total_attending,
        format_percent(rollup.total_attending, rollup.total_responses)
    );
    println!("  Average:    {} per past event", rollup.average_attendance);
    println!("  Revenue:    {}", format_currency(rollup.total_revenue));

    if !rollup.lodge_breakdown.is_empty() {
        println!();
        println!("{:<36} {:>6} {:>9} {:>6}", "Lodge", "Events", "Attending", "Avg");
        for lodge in &rollup.lodge_breakdown {
            println!(
                "{:<36} {:>6} {:>9} {:>6}",
                truncate_string(&lodge.display_name(), 36),
                lodge.event_count,
                lodge.total_attending,
                lodge.avg_attendance
            );
        }
    }

    if !rollup.recent_events.is_empty() {
        println!();
        println!("Recent events");
        for event in &rollup.recent_events {
            println!(
                "  {:<12} {:<32} {:>4} attending {:>10}",
                event.event_date.format("%-d %b %Y"),
                truncate_string(&event.title, 32),
                event.attending,
                format_currency(event.revenue)
            );
        }
    }
}

fn print_calendar(
    month: Option<Month>,
    meetings: &[ChapterMeeting],
    filter: &MeetingsFilter,
) -> Result<()> {
    let today = Local::now().date_naive();
    let Month { year, month } = month.unwrap_or(Month {
        year: today.year(),
        month: today.month(),
    });
    let calendar = CalendarMonth::build(year, month, today, meetings, filter)
        .ok_or_else(|| LodgeError::InvalidInput(format!("Invalid month {}-{:02}", year, month)))?;

    println!("{}", calendar.title());
    println!("  Mon  Tue  Wed  Thu  Fri  Sat  Sun");
    for week in calendar.weeks() {
        // Five columns per day: today is bracketed, '*' marks meetings
        let line: String = week
            .iter()
            .map(|day| {
                if !day.is_current_month {
                    return "    .".to_string();
                }
                let marker = if day.meetings.is_empty() { ' ' } else { '*' };
                if day.is_today {
                    format!("[{:>2}]{}", day.date.day(), marker)
                } else {
                    format!("  {:>2}{}", day.date.day(), marker)
                }
            })
            .collect();
        println!("{}", line.trim_end());
    }

    let in_month: Vec<_> = calendar
        .days
        .iter()
        .filter(|d| d.is_current_month && !d.meetings.is_empty())
        .collect();
    if in_month.is_empty() {
        println!();
        println!("No meetings this month");
        return Ok(());
    }

    for day in in_month {
        println!();
        println!("{}", day.date.format("%A %-d %B"));
        for meeting in calendar.meetings_on(day.date) {
            println!(
                "  {:<6} {} ({})",
                meeting.meeting_time,
                meeting.chapter_name,
                meeting.meeting_type
            );
            if !meeting.location_name.is_empty() {
                println!("         {}", meeting.location_name);
                println!("         {}", meeting.maps_url());
            }
        }
    }
    Ok(())
}
