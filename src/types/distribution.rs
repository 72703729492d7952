//! Matching distribution output.

use rust_decimal::Decimal;
use ruint::aliases::U256;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::fixed;
use crate::types::u256_string;
use crate::types::Address;

/// One project's share of the matching pool.
///
/// ## Units
///
/// - `match_amount_in_usd`, `total_contributions_in_usd`: USD, 18 fractional digits
/// - `match_amount_in_token`: pool token, human units
/// - `match_amount`: pool token, smallest unit (what the payout tree commits to)
/// - `match_pool_percentage`: fraction of the pool in [0, 1]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QFDistributionEntry {
    pub project_id: String,
    #[serde(alias = "projectPayoutAddress")]
    pub payout_address: Address,
    #[serde(rename = "matchAmountInUSD")]
    pub match_amount_in_usd: Decimal,
    pub match_amount_in_token: Decimal,
    pub match_pool_percentage: Decimal,
    #[serde(rename = "totalContributionsInUSD")]
    pub total_contributions_in_usd: Decimal,
    pub total_contributions_in_token: String,
    pub unique_contributors_count: u64,
    #[serde(with = "u256_string")]
    pub match_amount: U256,
}

/// A round's distribution, ordered by project id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QFDistributionResults {
    pub distribution: Vec<QFDistributionEntry>,
    /// Pool left unallocated because every project hit the cap
    pub is_saturated: bool,
}

impl QFDistributionResults {
    pub fn is_empty(&self) -> bool {
        self.distribution.is_empty()
    }

    pub fn len(&self) -> usize {
        self.distribution.len()
    }

    /// Entry for a project, if it received any match.
    pub fn entry(&self, project_id: &str) -> Option<&QFDistributionEntry> {
        self.distribution.iter().find(|e| e.project_id == project_id)
    }

    /// Entries for the listed projects, in distribution order. Unknown ids
    /// and projects without a match are skipped.
    pub fn entries_for(&self, project_ids: &[String]) -> Vec<&QFDistributionEntry> {
        self.distribution
            .iter()
            .filter(|e| project_ids.iter().any(|id| *id == e.project_id))
            .collect()
    }

    /// Sum of USD match amounts across all projects.
    ///
    /// # Errors
    ///
    /// * `Precision` if the sum overflows
    pub fn total_match_usd(&self) -> Result<Decimal> {
        fixed::sum(self.distribution.iter().map(|e| e.match_amount_in_usd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(project: &str, usd: i64) -> QFDistributionEntry {
        QFDistributionEntry {
            project_id: project.to_string(),
            payout_address: Address::from_bytes([3; 20]),
            match_amount_in_usd: Decimal::from(usd),
            match_amount_in_token: Decimal::from(usd),
            match_pool_percentage: Decimal::ZERO,
            total_contributions_in_usd: Decimal::ZERO,
            total_contributions_in_token: "0".to_string(),
            unique_contributors_count: 1,
            match_amount: U256::from(usd as u64),
        }
    }

    #[test]
    fn test_lookup_and_total() {
        let results = QFDistributionResults {
            distribution: vec![entry("a", 300), entry("b", 700)],
            is_saturated: false,
        };
        assert_eq!(results.len(), 2);
        assert_eq!(results.entry("b").map(|e| e.match_amount_in_usd), Some(Decimal::from(700)));
        assert!(results.entry("c").is_none());
        assert_eq!(results.total_match_usd().unwrap(), Decimal::from(1000));
    }

    #[test]
    fn test_entries_for_project_list() {
        let results = QFDistributionResults {
            distribution: vec![entry("a", 300), entry("b", 700), entry("c", 0)],
            is_saturated: false,
        };
        let ids = vec!["c".to_string(), "a".to_string(), "missing".to_string()];
        let found: Vec<&str> = results.entries_for(&ids).iter().map(|e| e.project_id.as_str()).collect();
        assert_eq!(found, vec!["a", "c"]);
        assert!(results.entries_for(&[]).is_empty());
    }

    #[test]
    fn test_total_overflow_is_error() {
        let results = QFDistributionResults {
            distribution: vec![entry("a", 0), entry("b", 0)]
                .into_iter()
                .map(|mut e| {
                    e.match_amount_in_usd = Decimal::MAX;
                    e
                })
                .collect(),
            is_saturated: false,
        };
        assert!(results.total_match_usd().is_err());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(entry("a", 5)).unwrap();
        assert_eq!(json["matchAmountInUSD"], "5");
        assert_eq!(json["matchAmount"], "5");
        assert_eq!(json["payoutAddress"], "0x0303030303030303030303030303030303030303");
    }
}
