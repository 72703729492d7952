//! Quadratic-funding matching engine.
//!
//! ## Algorithm
//!
//! 1. Tally qualifying USD per (project, contributor)
//! 2. `score = (Σ sqrt(contributor total))²` per project
//! 3. `match = score / Σ score * totalPot`
//! 4. Optionally cap each match at `matchingCapPercentage * totalPot` and
//!    redistribute the surplus (see [`super::cap`])
//!
//! Every monetary output is quantized to 18 fractional digits.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::cap::apply_cap;
use crate::engine::tally::{tally, ProjectTally};
use crate::errors::{QfError, Result};
use crate::types::fixed::{self, to_base_units};
use crate::types::{
    Address, Contribution, MostRecentTip, QFDistributionEntry, QFDistributionResults, RoundMetadata,
};

/// What a project would receive with one more contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPreview {
    pub project_id: String,
    #[serde(rename = "currentMatchInUSD")]
    pub current_match_in_usd: Decimal,
    #[serde(rename = "previewMatchInUSD")]
    pub preview_match_in_usd: Decimal,
    #[serde(rename = "differenceInUSD")]
    pub difference_in_usd: Decimal,
}

/// Stateless QF matching engine.
///
/// ## Example
///
/// ```
/// use qf_kernel::engine::MatchingEngine;
/// use qf_kernel::types::{Address, Contribution, RoundMetadata};
/// use ruint::aliases::U256;
/// use rust_decimal::Decimal;
///
/// let c = |project: &str, who: u8, usd: i64| {
///     Contribution::new(U256::from(1u64), "t", Address::from_bytes([who; 20]), project,
///         Address::from_bytes([who + 100; 20]), 0)
///         .with_usd_value(Decimal::from(usd))
/// };
/// let contributions = vec![c("P1", 1, 100), c("P1", 2, 100), c("P2", 1, 400)];
/// let round = RoundMetadata::linear_qf("vs", "t", Decimal::from(1000));
///
/// let results = MatchingEngine::new().compute(&contributions, &round).unwrap();
/// assert_eq!(results.distribution[0].match_amount_in_usd, Decimal::from(500));
/// assert_eq!(results.distribution[1].match_amount_in_usd, Decimal::from(500));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingEngine;

impl MatchingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute the round's distribution.
    ///
    /// # Errors
    ///
    /// * `UnsupportedStrategy` for anything but linear QF (checked first)
    /// * `Validation` for malformed round parameters
    /// * `Precision` if an amount is not representable
    pub fn compute(&self, contributions: &[Contribution], round: &RoundMetadata) -> Result<QFDistributionResults> {
        round.ensure_supported()?;
        round.validate()?;

        let projects: Vec<(String, ProjectTally)> = tally(contributions)?
            .into_iter()
            .filter(|(_, t)| t.qualifies())
            .collect();

        let scores = projects
            .iter()
            .map(|(_, t)| t.qf_score())
            .collect::<Result<Vec<_>>>()?;
        let total_score = fixed::sum(scores.iter().copied())?;

        if total_score <= Decimal::ZERO {
            debug!(contributions = contributions.len(), "no qualifying contributions, empty distribution");
            return Ok(QFDistributionResults::default());
        }

        let raw = scores
            .iter()
            .map(|score| fixed::div(fixed::mul(*score, round.total_pot)?, total_score))
            .collect::<Result<Vec<_>>>()?;

        let (allocations, is_saturated) = match round.cap_amount()? {
            Some(cap) => {
                let outcome = apply_cap(&scores, raw, fixed::quantize(cap), round.total_pot)?;
                let saturated = outcome.is_saturated();
                if saturated {
                    info!(
                        unallocated = %outcome.unallocated,
                        projects = projects.len(),
                        "every project capped, pool saturated"
                    );
                }
                (outcome.allocations, saturated)
            }
            None => (raw, false),
        };

        let distribution = projects
            .iter()
            .zip(allocations)
            .map(|((project_id, t), match_usd)| entry(project_id, t, match_usd, round))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            projects = distribution.len(),
            total_score = %total_score,
            is_saturated,
            "computed distribution"
        );

        Ok(QFDistributionResults {
            distribution,
            is_saturated,
        })
    }

    /// QF score of one project, zero if it has no qualifying contributions.
    pub fn qf_score(&self, contributions: &[Contribution], project_id: &str) -> Result<Decimal> {
        match tally(contributions)?.get(project_id) {
            Some(t) => t.qf_score(),
            None => Ok(Decimal::ZERO),
        }
    }

    /// Latest qualifying contribution per (project, contributor), ordered by
    /// project id then contributor.
    pub fn most_recent_tips(&self, contributions: &[Contribution], round_id: &str) -> Result<Vec<MostRecentTip>> {
        let tips = tally(contributions)?
            .into_iter()
            .flat_map(|(project_id, t)| {
                t.latest_included
                    .into_iter()
                    .map(move |(user_id, timestamp)| MostRecentTip {
                        project_id: project_id.clone(),
                        most_recent_included_tip_timestamp: timestamp,
                        round_id: round_id.to_string(),
                        user_id,
                    })
            })
            .collect();
        Ok(tips)
    }

    /// Latest contribution of `contributor` to `project_id` that the match
    /// counts, if any.
    pub fn most_recent_tip(
        &self,
        contributions: &[Contribution],
        round_id: &str,
        project_id: &str,
        contributor: Address,
    ) -> Result<Option<MostRecentTip>> {
        let tallies = tally(contributions)?;
        let tip = tallies
            .get(project_id)
            .and_then(|t| t.latest_included.get(&contributor))
            .map(|timestamp| MostRecentTip {
                project_id: project_id.to_string(),
                most_recent_included_tip_timestamp: *timestamp,
                round_id: round_id.to_string(),
                user_id: contributor,
            });
        Ok(tip)
    }

    /// Match a project would receive if `contributor` added `extra_usd`.
    ///
    /// # Errors
    ///
    /// * `Validation` if `extra_usd` is not positive
    /// * anything [`MatchingEngine::compute`] returns
    pub fn preview(
        &self,
        contributions: &[Contribution],
        round: &RoundMetadata,
        project_id: &str,
        contributor: Address,
        extra_usd: Decimal,
    ) -> Result<MatchPreview> {
        if extra_usd <= Decimal::ZERO {
            return Err(QfError::Validation(format!("preview amount {extra_usd} must be positive")));
        }

        let current = self.compute(contributions, round)?;

        let payout_address = contributions
            .iter()
            .filter(|c| c.project_id == project_id)
            .map(|c| c.payout_address)
            .min()
            .unwrap_or(Address::ZERO);
        let amount = to_base_units(fixed::div(extra_usd, round.token_price())?, round.token_decimals)?;

        let mut hypothetical = contributions.to_vec();
        hypothetical.push(
            Contribution::new(amount, round.token.clone(), contributor, project_id, payout_address, 0)
                .with_usd_value(extra_usd),
        );
        let preview = self.compute(&hypothetical, round)?;

        let match_of = |results: &QFDistributionResults| {
            results
                .entry(project_id)
                .map(|e| e.match_amount_in_usd)
                .unwrap_or(Decimal::ZERO)
        };
        let current_match = match_of(&current);
        let preview_match = match_of(&preview);

        Ok(MatchPreview {
            project_id: project_id.to_string(),
            current_match_in_usd: current_match,
            preview_match_in_usd: preview_match,
            difference_in_usd: fixed::sub(preview_match, current_match)?,
        })
    }
}

fn entry(project_id: &str, t: &ProjectTally, match_usd: Decimal, round: &RoundMetadata) -> Result<QFDistributionEntry> {
    let match_usd = fixed::quantize(match_usd);
    let match_pool_percentage = if round.total_pot.is_zero() {
        Decimal::ZERO
    } else {
        fixed::div(match_usd, round.total_pot)?
    };
    let match_in_token = fixed::div(match_usd, round.token_price())?;

    Ok(QFDistributionEntry {
        project_id: project_id.to_string(),
        payout_address: t.payout_address,
        match_amount_in_usd: match_usd,
        match_amount_in_token: match_in_token,
        match_pool_percentage,
        total_contributions_in_usd: fixed::quantize(t.total_usd),
        total_contributions_in_token: t.total_token.to_string(),
        unique_contributors_count: t.contributors.len() as u64,
        match_amount: to_base_units(match_in_token, round.token_decimals)?,
    })
}

// ============================================================================
// Unit Tests
// ============================================================================
