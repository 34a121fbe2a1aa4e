use thiserror::Error;

/// Token acquisition failures. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Sign-in failed: {error}: {description}")]
    Rejected { error: String, description: String },

    #[error("Device code expired before sign-in completed")]
    Expired,

    #[error("Sign-in was declined by the user")]
    Declined,

    #[error("Identity provider returned HTTP {code}: {message}")]
    ApiError { code: u16, message: String },

    #[error("Another spshrink instance holds the token cache lock ({0})")]
    Locked(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
