//! Round metadata and voting-strategy dispatch.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{QfError, Result};
use crate::types::fixed;

/// Wire name of the only strategy this crate computes.
pub const LINEAR_QUADRATIC_FUNDING: &str = "LINEAR_QUADRATIC_FUNDING";

/// Voting strategy of a round.
///
/// Strategy names are a closed set. Names this crate does not know are kept
/// verbatim in [`StrategyKind::Unsupported`] so a request for such a round
/// fails with `UnsupportedStrategy` instead of falling through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StrategyKind {
    LinearQuadraticFunding,
    Unsupported(String),
}

impl StrategyKind {
    pub fn as_str(&self) -> &str {
        match self {
            StrategyKind::LinearQuadraticFunding => LINEAR_QUADRATIC_FUNDING,
            StrategyKind::Unsupported(name) => name,
        }
    }
}

impl From<String> for StrategyKind {
    fn from(name: String) -> Self {
        if name == LINEAR_QUADRATIC_FUNDING {
            StrategyKind::LinearQuadraticFunding
        } else {
            StrategyKind::Unsupported(name)
        }
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingStrategy {
    /// Voting strategy contract id
    pub id: String,
    pub strategy_name: StrategyKind,
}

fn default_token_decimals() -> u32 {
    18
}

/// Round parameters as served by the metadata service.
///
/// ## Units
///
/// - `total_pot`: matching pool in USD
/// - `matching_cap_percentage`: per-project cap as a fraction in (0, 1]
/// - `token_price_usd`: USD price of the pool token; `None` means the pool
///   token is USD-pegged
/// - `token_decimals`: decimals of the pool token, for payout amounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundMetadata {
    pub voting_strategy: VotingStrategy,
    pub token: String,
    pub total_pot: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_cap_percentage: Option<Decimal>,
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,
    #[serde(default, rename = "tokenPriceUSD", alias = "tokenPriceUsd", skip_serializing_if = "Option::is_none")]
    pub token_price_usd: Option<Decimal>,
}

impl RoundMetadata {
    /// Linear-QF round with an 18-decimal USD-pegged pool token and no cap.
    pub fn linear_qf(strategy_id: impl Into<String>, token: impl Into<String>, total_pot: Decimal) -> Self {
        Self {
            voting_strategy: VotingStrategy {
                id: strategy_id.into(),
                strategy_name: StrategyKind::LinearQuadraticFunding,
            },
            token: token.into(),
            total_pot,
            matching_cap_percentage: None,
            token_decimals: default_token_decimals(),
            token_price_usd: None,
        }
    }

    pub fn with_cap(mut self, cap: Decimal) -> Self {
        self.matching_cap_percentage = Some(cap);
        self
    }

    pub fn with_token_price(mut self, price_usd: Decimal) -> Self {
        self.token_price_usd = Some(price_usd);
        self
    }

    pub fn with_token_decimals(mut self, decimals: u32) -> Self {
        self.token_decimals = decimals;
        self
    }

    /// Fail with `UnsupportedStrategy` unless this is a linear-QF round.
    pub fn ensure_supported(&self) -> Result<()> {
        match &self.voting_strategy.strategy_name {
            StrategyKind::LinearQuadraticFunding => Ok(()),
            StrategyKind::Unsupported(name) => Err(QfError::UnsupportedStrategy(name.clone())),
        }
    }

    /// Check numeric parameters: non-negative pot, cap in (0, 1], positive price.
    pub fn validate(&self) -> Result<()> {
        if self.total_pot.is_sign_negative() && !self.total_pot.is_zero() {
            return Err(QfError::Validation(format!("negative total pot {}", self.total_pot)));
        }
        if let Some(cap) = self.matching_cap_percentage {
            if cap <= Decimal::ZERO || cap > Decimal::ONE {
                return Err(QfError::Validation(format!(
                    "matching cap percentage {cap} outside (0, 1]"
                )));
            }
        }
        if let Some(price) = self.token_price_usd {
            if price <= Decimal::ZERO {
                return Err(QfError::Validation(format!("non-positive token price {price}")));
            }
        }
        Ok(())
    }

    /// Largest match any single project may receive, if capped.
    ///
    /// # Errors
    ///
    /// * `Precision` if `cap * totalPot` overflows
    pub fn cap_amount(&self) -> Result<Option<Decimal>> {
        self.matching_cap_percentage
            .map(|p| fixed::mul(p, self.total_pot))
            .transpose()
    }

    /// USD price of one pool token.
    pub fn token_price(&self) -> Decimal {
        self.token_price_usd.unwrap_or(Decimal::ONE)
    }
}
