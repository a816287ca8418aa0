#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("State file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("State file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to replace state file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
