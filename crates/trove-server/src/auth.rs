//! Bearer credential validation.
//!
//! Validation is pure and side-effect free; callers decide what to log.
//! Every denial carries a stable machine-readable reason string and maps
//! to HTTP 401 — a denial is never downgraded to authorized.

use secrecy::{ExposeSecret, SecretString};

/// The configured credential set.
///
/// An empty set puts the server in public mode (every request is
/// authorized). Secrets are held behind [`SecretString`] so they are
/// redacted from `Debug` output.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    primary: Option<SecretString>,
    additional: Vec<SecretString>,
}

impl AuthConfig {
    /// Public mode: no credentials configured.
    pub fn open() -> Self {
        Self::default()
    }

    /// Build from a single optional secret and an optional
    /// comma-separated list of further secrets. Blank entries are
    /// dropped.
    pub fn from_values(primary: Option<String>, additional_csv: Option<String>) -> Self {
        let primary = primary
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .map(SecretString::from);
        let additional = additional_csv
            .map(|csv| {
                csv.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| SecretString::from(s.to_owned()))
                    .collect()
            })
            .unwrap_or_default();
        Self { primary, additional }
    }

    /// Whether the server runs without authentication.
    pub fn is_open(&self) -> bool {
        self.primary.is_none() && self.additional.is_empty()
    }

    fn matches(&self, token: &str) -> bool {
        if let Some(primary) = &self.primary {
            if primary.expose_secret() == token {
                return true;
            }
        }
        // The multi-secret set is only consulted after the primary check
        // fails.
        self.additional
            .iter()
            .any(|secret| secret.expose_secret() == token)
    }
}

/// Why a request was denied.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("malformed credential")]
    MalformedCredential,
    #[error("invalid credential")]
    InvalidCredential,
}

impl AuthError {
    /// Stable machine-readable reason string.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing credential",
            Self::MalformedCredential => "malformed credential",
            Self::InvalidCredential => "invalid credential",
        }
    }
}

/// Validate an `Authorization` header value against the credential set.
pub fn authenticate(header: Option<&str>, config: &AuthConfig) -> Result<(), AuthError> {
    if config.is_open() {
        return Ok(());
    }
    let Some(header) = header else {
        return Err(AuthError::MissingCredential);
    };
    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(AuthError::MalformedCredential);
    };
    if config.matches(token) {
        Ok(())
    } else {
        Err(AuthError::InvalidCredential)
    }
}
