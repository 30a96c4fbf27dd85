//! HTTP client for the hosted lodge database.
//!
//! `StoreClient` speaks two APIs on the same project URL:
//! - `/rest/v1/<table>`: row select/insert/update with query-string filters
//! - `/auth/v1/*`: sign-up, password sign-in, token refresh, sign-out
//!
//! Every request carries the project's public key in `apikey`. The bearer
//! token is the member's access token once signed in, else the public key.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::{Identity, SessionData};
use crate::models::{
    ChapterMeeting, Event, Guest, InvitationToken, Lodge, LodgeMembership, Member, MemberRsvp,
    NewRsvp, VisitorAdditionalGuest, VisitorRsvp,
};
use crate::store::{
    AttendanceSource, EventCatalog, IdentityProvider, InvitationLedger, MeetingSource,
    MemberDirectory, RsvpBook,
};

use super::{ApiError, Query};

// ============================================================================
// Constants
// ============================================================================

/// Unique key of the `rsvps` table: one row per member per event.
const RSVP_KEY_COLUMNS: &str = "event_id,member_id";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Columns fetched for province analytics, with the owning lodge joined
const PROVINCE_EVENT_COLUMNS: &str = "
    id, title, event_date, event_time, venue, cost_per_person, lodge_id,
    craft_lodges!inner ( id, name, number, provincial_lodge_id )";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<AuthUser> for Identity {
    fn from(user: AuthUser) -> Self {
        Identity {
            id: user.id,
            email: user.email,
        }
    }
}

/// Sign-up returns either the bare user (email confirmation pending)
/// or a full session with the user nested.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    user: Option<AuthUser>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> SessionData {
        SessionData {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            identity: self.user.into(),
            expires_at: Utc::now() + chrono::Duration::seconds(self.expires_in),
        }
    }
}

/// Client for one hosted project.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct StoreClient {
    client: Client,
    base_url: String,
    api_key: String,
    token: Option<String>,
}

impl StoreClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            token: None,
        })
    }

    /// Create a new client with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            token: Some(token),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let bearer = self.token.as_deref().unwrap_or(&self.api_key);
        let mut headers = header::HeaderMap::new();
        headers.insert("apikey", header_value(&self.api_key)?);
        headers.insert(
            header::AUTHORIZATION,
            header_value(&format!("Bearer {}", bearer))?,
        );
        Ok(headers)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, backing off and retrying while rate limited
    async fn send<F>(&self, what: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().headers(self.auth_headers()?).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(request = what, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn parse<T: DeserializeOwned>(what: &str, response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", what, e)))
    }

    // ===== Row API =====

    pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, ApiError> {
        let url = self.rest_url(query.table_name());
        debug!(table = query.table_name(), "select");
        let response = self
            .send(query.table_name(), || {
                self.client.get(&url).query(query.params())
            })
            .await?;
        Self::parse(query.table_name(), response).await
    }

    /// First matching row, or None
    pub async fn select_one<T: DeserializeOwned>(&self, query: Query) -> Result<Option<T>, ApiError> {
        let rows: Vec<T> = self.select(&query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    fn upsert_request<B: Serialize + ?Sized>(
        &self,
        table: &str,
        on_conflict: &str,
        body: &B,
    ) -> RequestBuilder {
        self.client
            .post(self.rest_url(table))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(body)
    }

    /// Insert a row, or merge into the row that already holds the
    /// `on_conflict` key. Returns the stored row.
    pub async fn upsert<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        table: &'static str,
        on_conflict: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(table = table, on_conflict = on_conflict, "upsert");
        let response = self
            .send(table, || self.upsert_request(table, on_conflict, body))
            .await?;
        let rows: Vec<T> = Self::parse(table, response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::InvalidResponse(format!("{}: upsert returned no row", table)))
    }

    /// Update every row matching `query`, returning the updated rows
    pub async fn update<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        query: &Query,
        body: &B,
    ) -> Result<Vec<T>, ApiError> {
        let url = self.rest_url(query.table_name());
        debug!(table = query.table_name(), "update");
        let response = self
            .send(query.table_name(), || {
                self.client
                    .patch(&url)
                    .query(query.params())
                    .header("Prefer", "return=representation")
                    .json(body)
            })
            .await?;
        Self::parse(query.table_name(), response).await
    }
}

fn header_value(s: &str) -> Result<header::HeaderValue, ApiError> {
    header::HeaderValue::from_str(s)
        .map_err(|_| ApiError::BadRequest("API key or token contains invalid characters".into()))
}

// ============================================================================
// Store implementations
// ============================================================================

#[async_trait]
impl AttendanceSource for StoreClient {
    async fn member_rsvps(&self, event_ids: &[String]) -> Result<Vec<MemberRsvp>, ApiError> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table("rsvps")
            .select("id, event_id, member_id, status, responded_at")
            .in_list("event_id", event_ids);
        self.select(&query).await
    }

    async fn visitor_rsvps(&self, event_ids: &[String]) -> Result<Vec<VisitorRsvp>, ApiError> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table("visitor_rsvps")
            .select("id, event_id")
            .in_list("event_id", event_ids);
        self.select(&query).await
    }

    async fn guests(&self, rsvp_ids: &[String]) -> Result<Vec<Guest>, ApiError> {
        if rsvp_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table("guests")
            .select("id, rsvp_id")
            .in_list("rsvp_id", rsvp_ids);
        self.select(&query).await
    }

    async fn visitor_additional_guests(
        &self,
        visitor_rsvp_ids: &[String],
    ) -> Result<Vec<VisitorAdditionalGuest>, ApiError> {
        if visitor_rsvp_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table("visitor_additional_guests")
            .select("id, visitor_rsvp_id")
            .in_list("visitor_rsvp_id", visitor_rsvp_ids);
        self.select(&query).await
    }
}

#[async_trait]
impl MemberDirectory for StoreClient {
    async fn member_by_identity(&self, identity_id: &str) -> Result<Option<Member>, ApiError> {
        let query = Query::table("members").select("*").eq("auth_user_id", identity_id);
        self.select_one(query).await
    }

    async fn member_by_id(&self, member_id: &str) -> Result<Option<Member>, ApiError> {
        let query = Query::table("members").select("*").eq("id", member_id);
        self.select_one(query).await
    }

    async fn link_identity(
        &self,
        member_id: &str,
        identity_id: &str,
        email: &str,
    ) -> Result<(), ApiError> {
        let query = Query::table("members").eq("id", member_id);
        let body = json!({ "auth_user_id": identity_id, "email": email });
        let updated: Vec<Member> = self.update(&query, &body).await?;
        if updated.is_empty() {
            return Err(ApiError::NotFound(format!("member {}", member_id)));
        }
        Ok(())
    }

    async fn save_push_token(&self, identity_id: &str, token: &str) -> Result<(), ApiError> {
        let query = Query::table("members").eq("auth_user_id", identity_id);
        let body = json!({ "push_token": token });
        let _: Vec<Member> = self.update(&query, &body).await?;
        Ok(())
    }

    async fn lodge(&self, lodge_id: &str) -> Result<Option<Lodge>, ApiError> {
        let query = Query::table("craft_lodges")
            .select("id, name, number, provincial_lodge_id")
            .eq("id", lodge_id);
        self.select_one(query).await
    }

    async fn active_lodge_ids(&self, member_id: &str) -> Result<Vec<String>, ApiError> {
        let query = Query::table("member_lodge_memberships")
            .select("craft_lodge_id")
            .eq("member_id", member_id)
            .eq("is_active", true);
        let memberships: Vec<LodgeMembership> = self.select(&query).await?;
        Ok(memberships.into_iter().map(|m| m.craft_lodge_id).collect())
    }
}

#[async_trait]
impl EventCatalog for StoreClient {
    async fn event(&self, event_id: &str) -> Result<Option<Event>, ApiError> {
        let query = Query::table("events")
            .select("*, craft_lodges ( id, name, number, provincial_lodge_id )")
            .eq("id", event_id);
        self.select_one(query).await
    }

    async fn upcoming_events(
        &self,
        lodge_ids: &[String],
        from: NaiveDate,
    ) -> Result<Vec<Event>, ApiError> {
        if lodge_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table("events")
            .select("*, craft_lodges ( id, name, number )")
            .in_list("lodge_id", lodge_ids)
            .gte("event_date", from)
            .order("event_date", true);
        self.select(&query).await
    }

    async fn province_events(
        &self,
        provincial_lodge_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<Event>, ApiError> {
        let query = Query::table("events")
            .select(PROVINCE_EVENT_COLUMNS)
            .eq("craft_lodges.provincial_lodge_id", provincial_lodge_id)
            .gte("event_date", since)
            .order("event_date", false);
        self.select(&query).await
    }
}

#[async_trait]
impl RsvpBook for StoreClient {
    async fn rsvp_for(
        &self,
        event_id: &str,
        member_id: &str,
    ) -> Result<Option<MemberRsvp>, ApiError> {
        let query = Query::table("rsvps")
            .select("*")
            .eq("event_id", event_id)
            .eq("member_id", member_id);
        self.select_one(query).await
    }

    async fn upsert_rsvp(&self, rsvp: &NewRsvp) -> Result<MemberRsvp, ApiError> {
        self.upsert("rsvps", RSVP_KEY_COLUMNS, rsvp).await
    }
}

#[async_trait]
impl InvitationLedger for StoreClient {
    async fn invitation(&self, code: &str) -> Result<Option<InvitationToken>, ApiError> {
        let query = Query::table("rsvp_tokens")
            .select("id, token, member_id, invitation_type, expires_at, used_at")
            .eq("token", code);
        self.select_one(query).await
    }

    async fn mark_used(&self, invitation_id: &str, at: DateTime<Utc>) -> Result<(), ApiError> {
        // Only an unused token transitions, so a concurrent redemption cannot
        // consume it twice.
        let query = Query::table("rsvp_tokens")
            .eq("id", invitation_id)
            .is_null("used_at");
        let body = json!({ "used_at": at });
        let updated: Vec<InvitationToken> = self.update(&query, &body).await?;
        if updated.is_empty() {
            return Err(ApiError::NotFound(format!("unused invitation {}", invitation_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for StoreClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, ApiError> {
        let url = self.auth_url("signup");
        let body = json!({ "email": email, "password": password });
        let response = self
            .send("signup", || self.client.post(&url).json(&body))
            .await?;
        let parsed: SignUpResponse = Self::parse("signup", response).await?;
        match (parsed.user, parsed.id) {
            (Some(user), _) => Ok(user.into()),
            (None, Some(id)) => Ok(Identity {
                id,
                email: parsed.email,
            }),
            (None, None) => Err(ApiError::InvalidResponse(
                "signup: response carried no user".into(),
            )),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionData, ApiError> {
        let url = self.auth_url("token");
        let body = json!({ "email": email, "password": password });
        let response = self
            .send("token", || {
                self.client
                    .post(&url)
                    .query(&[("grant_type", "password")])
                    .json(&body)
            })
            .await?;
        let tokens: TokenResponse = Self::parse("token", response).await?;
        Ok(tokens.into_session())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionData, ApiError> {
        let url = self.auth_url("token");
        let body = json!({ "refresh_token": refresh_token });
        let response = self
            .send("token", || {
                self.client
                    .post(&url)
                    .query(&[("grant_type", "refresh_token")])
                    .json(&body)
            })
            .await?;
        let tokens: TokenResponse = Self::parse("token", response).await?;
        Ok(tokens.into_session())
    }

    async fn current_identity(&self) -> Result<Option<Identity>, ApiError> {
        if self.token.is_none() {
            return Ok(None);
        }
        let url = self.auth_url("user");
        match self.send("user", || self.client.get(&url)).await {
            Ok(response) => {
                let user: AuthUser = Self::parse("user", response).await?;
                Ok(Some(user.into()))
            }
            Err(ApiError::Unauthorized) | Err(ApiError::AccessDenied(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        if self.token.is_none() {
            return Ok(());
        }
        let url = self.auth_url("logout");
        self.send("logout", || self.client.post(&url)).await?;
        Ok(())
    }
}

#[async_trait]
impl MeetingSource for StoreClient {
    async fn published_meetings(
        &self,
        area: Option<&str>,
    ) -> Result<Vec<ChapterMeeting>, ApiError> {
        let mut query = Query::table("chapter_meetings")
            .select("*")
            .eq("published", true);
        if let Some(area) = area {
            query = query.eq("area", area);
        }
        self.select(&query.order("meeting_date", true)).await
    }
}
