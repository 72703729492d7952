//! Crate-wide error types.
//!
//! The core never retries and never hands back a partial result: every
//! operation either produces a complete summary, distribution or commitment,
//! or fails with one of these variants.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QfError {
    /// Missing or malformed identifiers and inputs (chain, round, project, address).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The round uses a voting strategy this crate cannot compute.
    #[error("Unsupported voting strategy: {0}")]
    UnsupportedStrategy(String),

    /// Indexer, metadata or pricing collaborator failed.
    #[error("Upstream fetch error: {0}")]
    UpstreamFetch(String),

    /// Finalize attempted with nothing payable.
    #[error("Distribution has no payable entries")]
    EmptyDistribution,

    /// An amount cannot be represented at the fixed-point scale without loss.
    #[error("Precision error: {0}")]
    Precision(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QfError>;
