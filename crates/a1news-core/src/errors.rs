/// Core error type.
///
/// Adapter crates map their specific errors into this type so the ingestion
/// handler and publish pipeline can tell retryable conflicts from hard failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(String),

    /// A uniqueness constraint rejected a write (grouping key or word key).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("parse error: {reason} (raw: {raw})")]
    Parse { reason: String, raw: String },

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
