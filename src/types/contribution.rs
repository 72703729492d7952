//! A single contribution (vote) to a project in a round.

use rust_decimal::Decimal;
use ruint::aliases::U256;
use serde::{Deserialize, Serialize};

use crate::errors::{QfError, Result};
use crate::types::Address;

/// A contribution as delivered by the indexer, optionally priced in USD.
///
/// ## Units
///
/// - `amount` is in the token's smallest unit (wei for 18-decimal tokens).
/// - `usd_value` is the USD value at `created_at`, when the pricing oracle
///   could provide one. Unpriced contributions are never treated as zero.
///
/// ## Example
///
/// ```
/// use qf_kernel::types::{Address, Contribution};
/// use ruint::aliases::U256;
/// use rust_decimal::Decimal;
///
/// let c = Contribution::new(
///     U256::from(1_000_000u64),
///     "0x0000000000000000000000000000000000000000",
///     Address::from_bytes([1; 20]),
///     "project-1",
///     Address::from_bytes([2; 20]),
///     1_680_000_000,
/// )
/// .with_usd_value(Decimal::from(25));
///
/// assert!(c.is_priced());
/// assert!(c.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    /// Amount in the token's smallest unit
    #[serde(with = "u256_string")]
    pub amount: U256,

    /// Token contract address as reported by the indexer
    pub token: String,

    /// Contributor (voter) address
    pub contributor: Address,

    /// Project identifier
    pub project_id: String,

    /// Where the project's match is paid
    #[serde(alias = "projectPayoutAddress")]
    pub payout_address: Address,

    /// USD value at contribution time, if priced
    #[serde(default, rename = "usdValue", skip_serializing_if = "Option::is_none")]
    pub usd_value: Option<Decimal>,

    /// Block timestamp in seconds
    #[serde(default)]
    pub created_at: u64,
}

impl Contribution {
    /// Create an unpriced contribution
    pub fn new(
        amount: U256,
        token: impl Into<String>,
        contributor: Address,
        project_id: impl Into<String>,
        payout_address: Address,
        created_at: u64,
    ) -> Self {
        Self {
            amount,
            token: token.into(),
            contributor,
            project_id: project_id.into(),
            payout_address,
            usd_value: None,
            created_at,
        }
    }

    /// Attach a USD valuation
    pub fn with_usd_value(mut self, usd_value: Decimal) -> Self {
        self.usd_value = Some(usd_value);
        self
    }

    #[inline]
    pub fn is_priced(&self) -> bool {
        self.usd_value.is_some()
    }

    /// Positive USD value, if any. Only these contributions count for matching.
    #[inline]
    pub fn qualifying_usd(&self) -> Option<Decimal> {
        self.usd_value.filter(|usd| usd.is_sign_positive() && !usd.is_zero())
    }

    /// Check the record invariants: positive amount and a project id.
    pub fn validate(&self) -> Result<()> {
        if self.amount.is_zero() {
            return Err(QfError::Validation(format!(
                "contribution from {} to {} has zero amount",
                self.contributor, self.project_id
            )));
        }
        if self.project_id.trim().is_empty() {
            return Err(QfError::Validation(format!(
                "contribution from {} has no project id",
                self.contributor
            )));
        }
        Ok(())
    }
}

/// Serde adapter: U256 as a decimal string, accepting `0x` hex strings and
/// plain JSON integers on input.
pub(crate) mod u256_string {
    use ruint::aliases::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.trim().parse::<U256>().map_err(de::Error::custom),
            Raw::Number(n) => Ok(U256::from(n)),
        }
    }
}
