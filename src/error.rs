use thiserror::Error;

/// Failures talking to the neubot backend.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl ApiError {
    /// Short label used in the header and settings panel.
    pub fn summary(&self) -> &'static str {
        match self {
            ApiError::Network(e) if e.is_timeout() => "timed out",
            ApiError::Network(e) if e.is_decode() => "bad response",
            ApiError::Network(_) => "offline",
            ApiError::Status { status, .. } if *status == 429 => "rate limited",
            ApiError::Status { .. } => "server error",
        }
    }
}
