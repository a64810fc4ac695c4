//! API key parsing
//!
//! The remote service authenticates with a single `user:password` secret.
//! It is split once, when the client is constructed, so a bad key makes the
//! client unusable instead of failing every lookup.

use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Username/password pair used for HTTP Basic authentication
#[derive(Clone)]
pub struct Credential {
    username: String,
    password: SecretString,
}

impl Credential {
    /// Parse a `user:password` secret
    ///
    /// The split happens at the first `:`; the password may itself contain colons.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the secret is empty, has no `:` separator,
    /// or either side of the separator is empty
    pub fn parse(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("API key must not be empty".to_string()));
        }

        let Some((user, password)) = secret.split_once(':') else {
            return Err(Error::Config(
                "API key must contain a ':' separator".to_string(),
            ));
        };

        if user.is_empty() {
            return Err(Error::Config("API key username is empty".to_string()));
        }
        if password.is_empty() {
            return Err(Error::Config("API key password is empty".to_string()));
        }

        Ok(Self {
            username: user.to_string(),
            password: SecretString::new(password.into()),
        })
    }

    /// Account name part of the key
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Secret part of the key
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Value for the `Authorization` header: `Basic base64(user:password)`
    #[must_use]
    pub fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password.expose_secret());
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
