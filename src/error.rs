//! Error types for the asset usage index.

use thiserror::Error;

/// Errors raised by usage store implementations.
///
/// Store failures are fatal to the operation that triggered them; the index
/// never retries internally.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("failed to encode usage record: {0}")]
    Encode(String),

    #[error("failed to decode usage record: {0}")]
    Decode(String),
}

/// Failure to resolve an asset reference to its original asset.
///
/// Always a per-reference condition: the reference is skipped (and reported)
/// while the remaining references of the same property are still processed.
#[derive(Debug, Clone, Error)]
#[error("cannot resolve asset reference '{reference}': {message}")]
pub struct ResolveError {
    /// The raw reference that failed to resolve.
    pub reference: String,
    /// Human-readable cause.
    pub message: String,
}

/// Top-level errors for updater, reconciler and tooling operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("content tree error: {0}")]
    ContentTree(String),

    #[error("configuration error: {0}")]
    Config(String),
}
