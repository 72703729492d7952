//! Contribution summary for a round or a project.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregates over a contribution set.
///
/// Recomputed per request and never updated in place. Token aggregates are
/// exact integers rendered as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QFContributionSummary {
    pub contribution_count: u64,
    pub unique_contributors: u64,
    #[serde(rename = "totalContributionsInUSD")]
    pub total_contributions_in_usd: Decimal,
    #[serde(rename = "averageUSDContribution")]
    pub average_usd_contribution: Decimal,
    pub total_tipped_in_token: String,
    pub average_tip_in_token: String,
    /// Contributions the pricing oracle could not value
    #[serde(default)]
    pub unpriced_contribution_count: u64,
}

impl QFContributionSummary {
    /// Summary of an empty contribution set.
    pub fn empty() -> Self {
        Self {
            contribution_count: 0,
            unique_contributors: 0,
            total_contributions_in_usd: Decimal::ZERO,
            average_usd_contribution: Decimal::ZERO,
            total_tipped_in_token: "0".to_string(),
            average_tip_in_token: "0".to_string(),
            unpriced_contribution_count: 0,
        }
    }
}

impl Default for QFContributionSummary {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(QFContributionSummary::empty()).unwrap();
        assert_eq!(json["contributionCount"], 0);
        assert_eq!(json["totalContributionsInUSD"], "0");
        assert_eq!(json["averageUSDContribution"], "0");
        assert_eq!(json["totalTippedInToken"], "0");
        assert_eq!(json["unpricedContributionCount"], 0);
    }
}
