//! Core data types for the QF kernel
//!
//! All types serialize to camelCase JSON matching the indexer, metadata
//! service and persistence layer.
//!
//! ## Types
//!
//! - [`Address`]: Canonical 20-byte account address
//! - [`Contribution`]: A single (optionally USD-priced) contribution
//! - [`RoundMetadata`]: Pool size, cap and voting strategy of a round
//! - [`QFContributionSummary`]: Count, uniqueness, USD and token aggregates
//! - [`QFDistributionEntry`] / [`QFDistributionResults`]: Matching output
//! - [`MostRecentTip`]: Latest contribution a match includes, per contributor
//!
//! ## Numeric Representation
//!
//! USD values are [`rust_decimal::Decimal`] quantized to 18 fractional digits
//! (see [`fixed`]). Token amounts are [`ruint::aliases::U256`] in the token's
//! smallest unit.

mod address;
mod contribution;
mod distribution;
mod round;
mod summary;
mod tip;
pub mod fixed;

// Re-export all types at module level
pub use address::Address;
pub use contribution::Contribution;
pub(crate) use contribution::u256_string;
pub use distribution::{QFDistributionEntry, QFDistributionResults};
pub use round::{RoundMetadata, StrategyKind, VotingStrategy, LINEAR_QUADRATIC_FUNDING};
pub use summary::QFContributionSummary;
pub use tip::MostRecentTip;
