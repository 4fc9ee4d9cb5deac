#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Nothing matched the lookup. Expired snippets land here too.
    #[error("no matching record found")]
    NoRecord,
    #[error("duplicate email")]
    DuplicateEmail,
    /// Deliberately says nothing about whether the email or the password was wrong.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("password hash error: {0}")]
    Hash(#[from] argon2::password_hash::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("malformed session data: {0}")]
    SessionData(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
