use anyhow::{Context, Result};
use keyring::Entry;
use tracing::{debug, info};

const SERVICE_NAME: &str = "lodgebook";

/// Remembered sign-in passwords, kept in the OS keychain.
///
/// One lodge database project never sees another's passwords: entries are
/// keyed by the project host and the lowercased email.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    project: String,
}

impl CredentialStore {
    pub fn new(project_url: &str) -> Self {
        Self {
            project: project_key(project_url),
        }
    }

    /// Keychain account name, e.g. `abc.supabase.co|wm@lodge.org`
    pub fn account(&self, email: &str) -> String {
        format!("{}|{}", self.project, email.trim().to_lowercase())
    }

    fn entry(&self, email: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account(email)).context("Failed to create keyring entry")
    }

    pub fn store(&self, email: &str, password: &str) -> Result<()> {
        self.entry(email)?
            .set_password(password)
            .context("Failed to store password in keychain")?;
        debug!(project = %self.project, "Password remembered");
        Ok(())
    }

    pub fn get_password(&self, email: &str) -> Result<String> {
        self.entry(email)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    pub fn has_credentials(&self, email: &str) -> bool {
        self.entry(email)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }

    /// Drop the remembered password, if any. Used on sign-out and when a
    /// remembered password is rejected by the identity service.
    pub fn forget(&self, email: &str) -> Result<()> {
        match self.entry(email)?.delete_credential() {
            Ok(()) => {
                info!(project = %self.project, "Forgot remembered password");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

/// Host (and port) of the project URL; the trimmed URL itself when it
/// does not parse
fn project_key(project_url: &str) -> String {
    let trimmed = project_url.trim().trim_end_matches('/');
    match url::Url::parse(trimmed) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => trimmed.to_lowercase(),
        },
        Err(_) => trimmed.to_lowercase(),
    }
}
