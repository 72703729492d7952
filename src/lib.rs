//! # QF Kernel
//!
//! Quadratic-funding matching for grant rounds, with a merkle commitment
//! over the resulting payouts.
//!
//! ## Architecture
//!
//! The kernel consists of:
//! - **Types**: Core data structures (Contribution, RoundMetadata, summaries, distributions)
//! - **Summary**: Contribution aggregates per round or per project
//! - **Hotfix**: Per-round corrections applied before aggregation
//! - **Engine**: Linear QF matching with an iterative per-project cap
//! - **Tree**: Sorted-pair merkle commitment over payouts
//! - **Service**: Fetch, price, correct, compute, persist and cache
//!
//! ## Design Principles
//!
//! 1. **Determinism**: Identical inputs produce identical outputs, independent of input order
//! 2. **Fixed Point**: USD math in `Decimal` quantized to 18 digits; token amounts in `U256`
//! 3. **Pure Core**: Summary, engine and tree do no I/O; collaborators sit behind traits
//! 4. **Synchronous Execution**: No async anywhere in the computation path
//!
//! ## Example
//!
//! ```
//! use qf_kernel::{Address, Contribution, DistributionTree, MatchingEngine, RoundMetadata};
//! use rust_decimal::Decimal;
//! use ruint::aliases::U256;
//!
//! let a = Address::from_bytes([1; 20]);
//! let b = Address::from_bytes([2; 20]);
//! let payout = Address::from_bytes([9; 20]);
//! let contributions = vec![
//!     Contribution::new(U256::from(1u64), "usdc", a, "p1", payout, 0).with_usd_value(Decimal::from(25)),
//!     Contribution::new(U256::from(1u64), "usdc", b, "p1", payout, 0).with_usd_value(Decimal::from(25)),
//! ];
//!
//! let round = RoundMetadata::linear_qf("strategy", "usdc", Decimal::from(1000));
//! let results = MatchingEngine::new().compute(&contributions, &round).unwrap();
//! assert_eq!(results.distribution[0].match_amount_in_usd, Decimal::from(1000));
//!
//! let tree = DistributionTree::build(&results.distribution).unwrap();
//! assert!(DistributionTree::verify(&tree.root(), &tree.leaves()[0], tree.proof(&payout).unwrap()));
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: Contribution, RoundMetadata, summaries, distributions
pub mod types;

/// Error type shared by every module
pub mod errors;

/// Collaborator traits and in-memory implementations
pub mod sources;

/// Per-round hotfix table and overlay
pub mod hotfix;

/// Contribution summaries
pub mod summary;

/// Matching engine: linear QF with per-project cap
pub mod engine;

/// Payout commitment tree
pub mod tree;

/// Result cache
pub mod cache;

/// Request orchestration
pub mod service;

/// Runner configuration
pub mod config;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use errors::{QfError, Result};
pub use types::{
    Address, Contribution, MostRecentTip, QFContributionSummary, QFDistributionEntry, QFDistributionResults, RoundMetadata,
    StrategyKind,
};
pub use summary::{summarize, summarize_by_project};
pub use hotfix::{HotfixConfig, HotfixOverlay, RoundHotfix};
pub use engine::{MatchPreview, MatchingEngine};
pub use tree::{CommitmentReport, DistributionTree, PayoutLeaf};
pub use cache::{CacheLookup, CachedResult, Fingerprint, MemoryCache, ResultCache};
pub use service::RoundService;
