use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{detail} (HTTP {status})")]
    Status { status: u16, detail: String },
    #[error("Authentication required, please login again")]
    Unauthorized,
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Please login to use favorites")]
    LoginRequired,
    #[error("Local state error: {0}")]
    Store(#[from] StoreError),
}

impl FetchError {
    /// Message shown inline next to the failed action.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}
