/// Core error type for the alarm bot.
///
/// Adapter crates should map their specific errors into this type so the orchestrator
/// can turn command failures into chat replies consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection refused, timeout, DNS failure and friends.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote side answered, but with a non-2xx status.
    #[error("{target} rejected request: {status}")]
    Rejected { target: &'static str, status: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::Rejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
