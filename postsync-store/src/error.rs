//! Error types for postsync-store.

use thiserror::Error;

use postsync_core::RelayId;

/// Errors raised by repository implementations and the relay cursor.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Query or connection failure from the SQL backend.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness rule would be violated (alias, domain name, identity).
    #[error("conflict: {what}")]
    Conflict { what: String },

    /// The addressed record does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The store returned identifiers out of order. Pagination cannot
    /// continue safely past this point.
    #[error("data integrity fault: relay id {next} does not follow {previous}")]
    DataIntegrity { previous: RelayId, next: RelayId },

    /// The stored whitelist column is not a JSON array of strings.
    #[error("whitelist encoding error: {0}")]
    Whitelist(#[from] serde_json::Error),

    /// The database URI names a backend this build cannot talk to.
    #[error("unsupported database scheme '{scheme}'; expected sqlite or mysql")]
    UnsupportedScheme { scheme: String },
}
