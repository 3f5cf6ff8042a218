use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("project still has {0}")]
    HasDependents(&'static str),

    #[error("token lookup collision")]
    TokenLookupCollision,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("token hashing failed: {0}")]
    TokenHash(String),

    #[error("invalid token format")]
    InvalidTokenFormat,
}

pub type Result<T> = std::result::Result<T, Error>;
