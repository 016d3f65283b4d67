use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "rpersonio";

/// Login credentials for one run.
///
/// `csrf_token` and `email_token` are only set when answering a new-device
/// challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub csrf_token: Option<String>,
    pub email_token: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            csrf_token: None,
            email_token: None,
        }
    }

    /// Copy of these credentials carrying the tokens for a device challenge.
    pub fn with_challenge_response(
        &self,
        csrf_token: impl Into<String>,
        email_token: impl Into<String>,
    ) -> Self {
        Self {
            csrf_token: Some(csrf_token.into()),
            email_token: Some(email_token.into()),
            ..self.clone()
        }
    }

    pub fn has_challenge_response(&self) -> bool {
        self.csrf_token.is_some() && self.email_token.is_some()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("csrf_token", &self.csrf_token)
            .field("email_token", &self.email_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub struct CredentialStore;

impl CredentialStore {
    /// Store the password for an email address in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for an email address from the OS keychain
    pub fn get_password(email: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Remove the stored password. Returns false when none was stored.
    pub fn forget(email: &str) -> Result<bool> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e).context("Failed to delete password from keychain"),
        }
    }
}
