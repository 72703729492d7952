//! Contribution summaries.
//!
//! [`summarize`] is a commutative reduction: the result does not depend on
//! the order of the input. USD totals only include priced contributions;
//! unpriced ones are counted separately and never valued at zero. Token
//! totals are exact 256-bit integer sums.
//!
//! ## Example
//!
//! ```
//! use qf_kernel::summary::summarize;
//! use rust_decimal::Decimal;
//!
//! let summary = summarize(&[]).unwrap();
//! assert_eq!(summary.contribution_count, 0);
//! assert_eq!(summary.average_usd_contribution, Decimal::ZERO);
//! ```

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use ruint::aliases::U256;
use tracing::debug;

use crate::errors::{QfError, Result};
use crate::types::fixed::{self, quantize};
use crate::types::{Address, Contribution, QFContributionSummary};

/// Summarize a contribution set.
///
/// # Errors
///
/// * `Precision` if the USD or token totals overflow
pub fn summarize(contributions: &[Contribution]) -> Result<QFContributionSummary> {
    if contributions.is_empty() {
        return Ok(QFContributionSummary::empty());
    }

    let contributors: HashSet<Address> = contributions.iter().map(|c| c.contributor).collect();

    let priced: Vec<Decimal> = contributions.iter().filter_map(|c| c.usd_value).collect();
    let unpriced = contributions.len() - priced.len();
    if unpriced > 0 {
        debug!(unpriced, total = contributions.len(), "skipping unpriced contributions in USD totals");
    }

    let total_usd = quantize(fixed::sum(priced.iter().copied())?);
    let average_usd = if priced.is_empty() {
        Decimal::ZERO
    } else {
        fixed::div(total_usd, Decimal::from(priced.len() as u64))?
    };

    let total_token = fixed::sum_units(contributions.iter().map(|c| c.amount))?;
    let count = U256::from(contributions.len() as u64);
    let average_token = total_token
        .checked_div(count)
        .ok_or_else(|| QfError::Precision("average of empty token total".to_string()))?;

    Ok(QFContributionSummary {
        contribution_count: contributions.len() as u64,
        unique_contributors: contributors.len() as u64,
        total_contributions_in_usd: total_usd,
        average_usd_contribution: average_usd,
        total_tipped_in_token: total_token.to_string(),
        average_tip_in_token: average_token.to_string(),
        unpriced_contribution_count: unpriced as u64,
    })
}

/// Summaries for every project present in `contributions`, keyed by project id.
pub fn summarize_by_project(contributions: &[Contribution]) -> Result<BTreeMap<String, QFContributionSummary>> {
    let mut grouped: BTreeMap<&str, Vec<Contribution>> = BTreeMap::new();
    for c in contributions {
        grouped.entry(c.project_id.as_str()).or_default().push(c.clone());
    }

    grouped
        .into_iter()
        .map(|(project_id, group)| Ok((project_id.to_string(), summarize(&group)?)))
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn contribution(project: &str, contributor: u8, amount: u64, usd: Option<&str>) -> Contribution {
        let c = Contribution::new(U256::from(amount), "t", addr(contributor), project, addr(100), 0);
        match usd {
            Some(v) => c.with_usd_value(Decimal::from_str(v).unwrap()),
            None => c,
        }
    }

    #[test]
    fn test_summarize_empty() {
        let s = summarize(&[]).unwrap();
        assert_eq!(s.contribution_count, 0);
        assert_eq!(s.unique_contributors, 0);
        assert_eq!(s.total_contributions_in_usd, Decimal::ZERO);
        assert_eq!(s.average_usd_contribution, Decimal::ZERO);
        assert_eq!(s.total_tipped_in_token, "0");
        assert_eq!(s.average_tip_in_token, "0");
    }

    #[test]
    fn test_summarize_basic() {
        let contributions = vec![
            contribution("p1", 1, 100, Some("10")),
            contribution("p1", 2, 200, Some("20")),
            contribution("p2", 1, 301, Some("30")),
        ];
        let s = summarize(&contributions).unwrap();

        assert_eq!(s.contribution_count, 3);
        assert_eq!(s.unique_contributors, 2);
        assert_eq!(s.total_contributions_in_usd, Decimal::from(60));
        assert_eq!(s.average_usd_contribution, Decimal::from(20));
        assert_eq!(s.total_tipped_in_token, "601");
        // floor(601 / 3)
        assert_eq!(s.average_tip_in_token, "200");
        assert_eq!(s.unpriced_contribution_count, 0);
    }

    #[test]
    fn test_unpriced_not_counted_as_zero() {
        let contributions = vec![
            contribution("p1", 1, 100, Some("10")),
            contribution("p1", 2, 100, None),
            contribution("p1", 3, 100, Some("30")),
        ];
        let s = summarize(&contributions).unwrap();

        assert_eq!(s.contribution_count, 3);
        assert_eq!(s.unpriced_contribution_count, 1);
        assert_eq!(s.total_contributions_in_usd, Decimal::from(40));
        assert_eq!(s.average_usd_contribution, Decimal::from(20));
        assert_eq!(s.total_tipped_in_token, "300");
    }

    #[test]
    fn test_all_unpriced_average_is_zero() {
        let s = summarize(&[contribution("p1", 1, 5, None)]).unwrap();
        assert_eq!(s.total_contributions_in_usd, Decimal::ZERO);
        assert_eq!(s.average_usd_contribution, Decimal::ZERO);
        assert_eq!(s.total_tipped_in_token, "5");
    }

    #[test]
    fn test_average_is_quantized() {
        let contributions = vec![
            contribution("p1", 1, 1, Some("1")),
            contribution("p1", 2, 1, Some("1")),
            contribution("p1", 3, 1, Some("0")),
        ];
        let s = summarize(&contributions).unwrap();
        assert_eq!(s.average_usd_contribution, Decimal::from_str("0.666666666666666667").unwrap());
    }

    #[test]
    fn test_token_totals_exceed_u128() {
        let big = U256::from(u128::MAX);
        let mut a = contribution("p1", 1, 1, None);
        a.amount = big;
        let mut b = contribution("p1", 2, 1, None);
        b.amount = big;

        let s = summarize(&[a, b]).unwrap();
        assert_eq!(s.total_tipped_in_token, (big + big).to_string());
        assert_eq!(s.average_tip_in_token, big.to_string());
    }

    #[test]
    fn test_contributor_case_is_normalized() {
        let mut a = contribution("p1", 1, 1, None);
        a.contributor = "0xABABABABABABABABABABABABABABABABABABABAB".parse().unwrap();
        let mut b = contribution("p1", 1, 1, None);
        b.contributor = "0xabababababababababababababababababababab".parse().unwrap();

        assert_eq!(summarize(&[a, b]).unwrap().unique_contributors, 1);
    }

    #[test]
    fn test_summarize_by_project() {
        let contributions = vec![
            contribution("p2", 1, 10, Some("1")),
            contribution("p1", 1, 10, Some("2")),
            contribution("p1", 2, 10, Some("3")),
        ];
        let by_project = summarize_by_project(&contributions).unwrap();

        assert_eq!(by_project.len(), 2);
        assert_eq!(by_project["p1"].contribution_count, 2);
        assert_eq!(by_project["p1"].total_contributions_in_usd, Decimal::from(5));
        assert_eq!(by_project["p2"].unique_contributors, 1);
    }
}
