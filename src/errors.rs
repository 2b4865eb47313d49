use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop the run before any message is touched.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to read client secret from {}: {source}", path.display())]
    ClientSecret {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("authorization flow failed: {0}")]
    Flow(String),
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("credential store error: {0}")]
    Store(String),
}

impl From<keyring::Error> for AuthError {
    fn from(e: keyring::Error) -> Self {
        AuthError::Store(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Gmail API returned {status}: {body}")]
    Status { status: u16, body: String },
}
