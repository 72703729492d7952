//! Per-project tallies and QF scores.
//!
//! Contributions are grouped by project, then by contributor, and only then
//! square-rooted. Summing per contributor first means splitting one
//! contribution into several does not raise a project's score.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use ruint::aliases::U256;

use crate::errors::{QfError, Result};
use crate::types::fixed::{self, sqrt_quantized};
use crate::types::{Address, Contribution};

/// Everything the engine needs to know about one project.
#[derive(Debug, Clone)]
pub struct ProjectTally {
    /// Lowest payout address seen for the project (they normally all agree)
    pub payout_address: Address,
    /// Qualifying USD per contributor
    pub contributor_totals: BTreeMap<Address, Decimal>,
    /// USD over all priced contributions
    pub total_usd: Decimal,
    /// Token amount over all contributions
    pub total_token: U256,
    /// Everyone who contributed, priced or not
    pub contributors: BTreeSet<Address>,
    /// Timestamp of each contributor's latest qualifying contribution
    pub latest_included: BTreeMap<Address, u64>,
}

impl ProjectTally {
    fn new(payout_address: Address) -> Self {
        Self {
            payout_address,
            contributor_totals: BTreeMap::new(),
            total_usd: Decimal::ZERO,
            total_token: U256::ZERO,
            contributors: BTreeSet::new(),
            latest_included: BTreeMap::new(),
        }
    }

    fn add(&mut self, c: &Contribution) -> Result<()> {
        self.payout_address = self.payout_address.min(c.payout_address);
        self.contributors.insert(c.contributor);
        self.total_token = self
            .total_token
            .checked_add(c.amount)
            .ok_or_else(|| QfError::Precision("project token total exceeds uint256".to_string()))?;

        if let Some(usd) = c.usd_value {
            self.total_usd = fixed::add(self.total_usd, usd)?;
        }
        if let Some(usd) = c.qualifying_usd() {
            let slot = self.contributor_totals.entry(c.contributor).or_insert(Decimal::ZERO);
            *slot = fixed::add(*slot, usd)?;

            let latest = self.latest_included.entry(c.contributor).or_insert(c.created_at);
            *latest = (*latest).max(c.created_at);
        }
        Ok(())
    }

    /// At least one priced, positive contribution.
    pub fn qualifies(&self) -> bool {
        !self.contributor_totals.is_empty()
    }

    /// `(Σ sqrt(contributor total))²`
    pub fn qf_score(&self) -> Result<Decimal> {
        let roots = self
            .contributor_totals
            .values()
            .map(|total| sqrt_quantized(*total))
            .collect::<Result<Vec<_>>>()?;
        let sum_of_roots = fixed::sum(roots)?;
        fixed::mul(sum_of_roots, sum_of_roots)
    }
}

/// Group contributions by project id.
pub fn tally(contributions: &[Contribution]) -> Result<BTreeMap<String, ProjectTally>> {
    let mut projects: BTreeMap<String, ProjectTally> = BTreeMap::new();
    for c in contributions {
        projects
            .entry(c.project_id.clone())
            .or_insert_with(|| ProjectTally::new(c.payout_address))
            .add(c)?;
    }
    Ok(projects)
}
