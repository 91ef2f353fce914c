use thiserror::Error;

/// All errors that can occur in Lockbox.
///
/// Callers are expected to match on the variant. Message text is for
/// humans only and may change between releases.
#[derive(Debug, Error)]
pub enum LockboxError {
    // --- Caller errors ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Crypto errors ---
    /// The derived key does not match the ciphertext's integrity tag.
    ///
    /// Deliberately covers both a wrong password and a tampered or
    /// corrupted ciphertext; the two are never told apart.
    #[error("Authentication failed — wrong password or corrupted data")]
    AuthenticationFailure,

    // --- Structural errors ---
    #[error("Malformed vault: {0}")]
    MalformedVault(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    // --- Lookup ---
    #[error("Secret '{0}' not found")]
    NotFound(String),

    // --- Durability ---
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    // --- Collaborator errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),
}

impl From<std::io::Error> for LockboxError {
    fn from(e: std::io::Error) -> Self {
        Self::StorageFailure(e.to_string())
    }
}

#[cfg(feature = "sqlite-store")]
impl From<rusqlite::Error> for LockboxError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match e {
            // Not a SQLite file at all, or a damaged one.
            rusqlite::Error::SqliteFailure(ref err, _)
                if matches!(
                    err.code,
                    ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt
                ) =>
            {
                Self::MalformedVault(e.to_string())
            }
            other => Self::StorageFailure(other.to_string()),
        }
    }
}

/// Convenience type alias for Lockbox results.
pub type Result<T> = std::result::Result<T, LockboxError>;
