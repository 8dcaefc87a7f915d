use thiserror::Error;

pub const AUTH_FAILED_MESSAGE: &str =
    "Authentication failed (401). Check the token in your settings.";

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("{0}")]
    Configuration(String),
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("{0}")]
    Authentication(String),
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl MigrateError {
    pub fn config(message: impl Into<String>) -> Self {
        MigrateError::Configuration(message.into())
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, MigrateError::Authentication(_))
    }

    /// Message shown to the user. Authentication failures are rewritten into
    /// something actionable; everything else keeps the remote's wording.
    pub fn user_message(&self) -> String {
        match self {
            MigrateError::Authentication(_) => AUTH_FAILED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = MigrateError> = std::result::Result<T, E>;
