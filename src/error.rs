use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("name already exists")]
    DuplicateName,

    #[error("unknown user")]
    UnknownUser,

    #[error("cannot share a bucket with its owner")]
    SelfShareRejected,

    #[error("invalid permission level: {0}")]
    InvalidPermissionLevel(String),

    #[error("storage io error: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("payload exceeds {0} bytes")]
    PayloadTooLarge(u64),

    #[error("token lookup collision")]
    TokenLookupCollision,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid token format")]
    InvalidTokenFormat,

    #[error("token expired")]
    TokenExpired,
}

impl Error {
    /// Stable machine-readable kind, reported verbatim in API error bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound => "NotFound",
            Error::Forbidden => "Forbidden",
            Error::DuplicateName => "DuplicateName",
            Error::UnknownUser => "UnknownUser",
            Error::SelfShareRejected => "SelfShareRejected",
            Error::InvalidPermissionLevel(_) => "InvalidPermissionLevel",
            Error::StorageIo(_) => "StorageIOError",
            Error::InvalidInput(_) => "InvalidInput",
            Error::PayloadTooLarge(_) => "PayloadTooLarge",
            Error::Unauthorized | Error::InvalidTokenFormat | Error::TokenExpired => {
                "Unauthorized"
            }
            Error::Database(_) | Error::TokenLookupCollision | Error::Config(_) => "Internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
