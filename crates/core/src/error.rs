use thiserror::Error;

#[derive(Debug, Error)]
pub enum SightlineError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Db(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),
}

impl SightlineError {
    /// Stable machine-readable error type exposed to API consumers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) | Self::Parse(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Db(_) => "DB_ERROR",
            Self::Internal(_) | Self::Config(_) | Self::Io(_) => "INTERNAL_SERVER",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::Parse(_) => 400,
            Self::NotFound(_) => 404,
            Self::Db(_) | Self::Internal(_) | Self::Config(_) | Self::Io(_) => 500,
        }
    }

    /// Human message that is safe to show without the debug flag.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::BadRequest(_) | Self::Parse(_) => "Bad request",
            Self::NotFound(_) => "Not found",
            Self::Db(_) => "Database error",
            Self::Internal(_) | Self::Config(_) | Self::Io(_) => "Internal server error",
        }
    }
}

pub type Result<T> = std::result::Result<T, SightlineError>;
