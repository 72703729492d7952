//! Matching engine module for the QF kernel.
//!
//! ## Design Principles
//!
//! The matching engine is designed for:
//!
//! 1. **Determinism**: Same contribution multiset always produces the same
//!    distribution, regardless of input order
//! 2. **Bounded Rounding**: Floating point only for the square root, every
//!    monetary value re-quantized to 18 fractional digits
//! 3. **Synchronous Execution**: Pure reduction over an in-memory slice
//! 4. **Anti-Sybil Tallying**: Contributions are summed per contributor
//!    before the square root
//!
//! ## Matching Rules
//!
//! - Only priced contributions with positive USD value qualify
//! - Projects without qualifying contributions are left out
//! - With a cap, surplus moves to uncapped projects by score; once every
//!   project is capped the rest stays unallocated and the round is saturated
//!
//! ## Example
//!
//! ```
//! use qf_kernel::engine::MatchingEngine;
//! use qf_kernel::types::RoundMetadata;
//! use rust_decimal::Decimal;
//!
//! let engine = MatchingEngine::new();
//! let round = RoundMetadata::linear_qf("vs", "0xtoken", Decimal::from(1000));
//!
//! // Nothing to match: empty distribution, not an error
//! let results = engine.compute(&[], &round).unwrap();
//! assert!(results.is_empty());
//! ```

pub mod cap;
pub mod matcher;
pub mod tally;

pub use cap::{apply_cap, CapOutcome};
pub use matcher::{MatchPreview, MatchingEngine};
pub use tally::{tally, ProjectTally};
