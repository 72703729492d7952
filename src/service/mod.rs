//! Request orchestration around the pure core.
//!
//! Each operation runs the same pipeline:
//!
//! 1. Validate identifiers
//! 2. Fetch round metadata and reject unsupported strategies
//! 3. Fetch contributions and apply the round's hotfixes
//! 4. Validate and price the corrected set
//! 5. Summarize, match or build the commitment
//! 6. Persist, then cache
//!
//! A failed persist is logged and the computed value is still cached and
//! returned. Requests are not deduplicated; concurrent duplicates only cost
//! redundant work because every step after the fetch is pure.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheLookup, CachedResult, Fingerprint, ResultCache};
use crate::engine::{MatchPreview, MatchingEngine};
use crate::errors::{QfError, Result};
use crate::hotfix::HotfixOverlay;
use crate::sources::{ContributionSource, MetadataSource, PriceOracle, SummaryStore};
use crate::summary::summarize;
use crate::tree::DistributionTree;
use crate::types::{
    Address, Contribution, MostRecentTip, QFContributionSummary, QFDistributionEntry, QFDistributionResults,
    RoundMetadata,
};

/// Collaborators and shared state of the round service.
pub struct RoundService {
    metadata: Arc<dyn MetadataSource>,
    contributions: Arc<dyn ContributionSource>,
    oracle: Arc<dyn PriceOracle>,
    store: Arc<dyn SummaryStore>,
    overlay: HotfixOverlay,
    cache: Arc<dyn ResultCache<CachedResult>>,
    engine: MatchingEngine,
}

impl RoundService {
    pub fn new(
        metadata: Arc<dyn MetadataSource>,
        contributions: Arc<dyn ContributionSource>,
        oracle: Arc<dyn PriceOracle>,
        store: Arc<dyn SummaryStore>,
        overlay: HotfixOverlay,
        cache: Arc<dyn ResultCache<CachedResult>>,
    ) -> Self {
        Self {
            metadata,
            contributions,
            oracle,
            store,
            overlay,
            cache,
            engine: MatchingEngine::new(),
        }
    }

    /// Previously computed value for a fingerprint.
    pub fn cached(&self, key: &Fingerprint) -> CacheLookup<CachedResult> {
        self.cache.get(key)
    }

    /// Summary over all contributions of a round.
    pub fn update_round_summary(&self, chain_id: &str, round_id: &str) -> Result<QFContributionSummary> {
        require("chainId", chain_id)?;
        require("roundId", round_id)?;

        let (_, contributions) = self.load(chain_id, round_id, None)?;
        let summary = summarize(&contributions)?;

        if let Err(e) = self.store.persist_summary(chain_id, round_id, None, &summary) {
            error!(chain_id, round_id, error = %e, "failed to persist round summary, serving cached result");
        }
        self.cache.set(
            Fingerprint::round_summary(chain_id, round_id),
            CachedResult::Summary(summary.clone()),
        );
        info!(chain_id, round_id, contributions = summary.contribution_count, "updated round summary");
        Ok(summary)
    }

    /// Summary over one project's contributions.
    pub fn update_project_summary(
        &self,
        chain_id: &str,
        round_id: &str,
        project_id: &str,
    ) -> Result<QFContributionSummary> {
        require("chainId", chain_id)?;
        require("roundId", round_id)?;
        require("projectId", project_id)?;

        let projects = [project_id.to_string()];
        let (_, contributions) = self.load(chain_id, round_id, Some(&projects))?;
        let summary = summarize(&contributions)?;

        if let Err(e) = self.store.persist_summary(chain_id, round_id, Some(project_id), &summary) {
            error!(chain_id, round_id, project_id, error = %e, "failed to persist project summary, serving cached result");
        }
        self.cache.set(
            Fingerprint::project_summary(chain_id, round_id, project_id),
            CachedResult::Summary(summary.clone()),
        );
        Ok(summary)
    }

    /// Matching distribution of a round.
    pub fn update_round_match(&self, chain_id: &str, round_id: &str) -> Result<QFDistributionResults> {
        require("chainId", chain_id)?;
        require("roundId", round_id)?;

        let (metadata, contributions) = self.load(chain_id, round_id, None)?;
        let results = self.engine.compute(&contributions, &metadata)?;

        if let Err(e) = self.store.persist_distribution(chain_id, round_id, &results) {
            error!(chain_id, round_id, error = %e, "failed to persist distribution, serving cached result");
        }
        self.cache.set(
            Fingerprint::round_match(chain_id, round_id),
            CachedResult::Distribution(results.clone()),
        );
        info!(
            chain_id,
            round_id,
            projects = results.len(),
            is_saturated = results.is_saturated,
            "updated round match"
        );
        Ok(results)
    }

    /// Match a project would receive with one more contribution.
    pub fn preview_match(
        &self,
        chain_id: &str,
        round_id: &str,
        project_id: &str,
        contributor: Address,
        extra_usd: Decimal,
    ) -> Result<MatchPreview> {
        require("chainId", chain_id)?;
        require("roundId", round_id)?;
        require("projectId", project_id)?;

        let (metadata, contributions) = self.load(chain_id, round_id, None)?;
        self.engine
            .preview(&contributions, &metadata, project_id, contributor, extra_usd)
    }

    /// Distribution entries for the listed projects. Served from the cached
    /// round match when there is one, computed otherwise.
    pub fn round_match_for_projects(
        &self,
        chain_id: &str,
        round_id: &str,
        project_ids: &[String],
    ) -> Result<Vec<QFDistributionEntry>> {
        require("chainId", chain_id)?;
        require("roundId", round_id)?;
        if project_ids.is_empty() || project_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(QfError::Validation("missing parameter projectIds".to_string()));
        }

        let results = match self.cache.get(&Fingerprint::round_match(chain_id, round_id)) {
            CacheLookup::Hit(CachedResult::Distribution(results)) => results,
            _ => self.update_round_match(chain_id, round_id)?,
        };
        Ok(results.entries_for(project_ids).into_iter().cloned().collect())
    }

    /// Latest contribution of `contributor` to `project_id` that the current
    /// match includes.
    pub fn most_recent_included_tip(
        &self,
        chain_id: &str,
        round_id: &str,
        project_id: &str,
        contributor: Address,
    ) -> Result<Option<MostRecentTip>> {
        require("chainId", chain_id)?;
        require("roundId", round_id)?;
        require("projectId", project_id)?;

        let projects = [project_id.to_string()];
        let (_, contributions) = self.load(chain_id, round_id, Some(&projects))?;
        self.engine
            .most_recent_tip(&contributions, round_id, project_id, contributor)
    }

    /// Recompute the distribution and commit to it.
    pub fn finalize_round(&self, chain_id: &str, round_id: &str) -> Result<DistributionTree> {
        let results = self.update_round_match(chain_id, round_id)?;
        let tree = DistributionTree::build(&results.distribution)?;

        self.cache.set(
            Fingerprint::commitment(chain_id, round_id),
            CachedResult::Commitment(tree.report()),
        );
        info!(chain_id, round_id, root = %tree.root_hex(), leaves = tree.leaves().len(), "finalized round");
        Ok(tree)
    }

    fn load(
        &self,
        chain_id: &str,
        round_id: &str,
        project_ids: Option<&[String]>,
    ) -> Result<(RoundMetadata, Vec<Contribution>)> {
        let metadata = self.metadata.round_metadata(chain_id, round_id)?;
        metadata.ensure_supported()?;

        let raw = self.contributions.contributions(chain_id, round_id, project_ids)?;
        let corrected = self.overlay.apply(chain_id, round_id, &raw, project_ids)?;
        for c in &corrected {
            c.validate()?;
        }
        let priced = self.price(corrected);

        debug!(chain_id, round_id, contributions = priced.len(), "loaded contributions");
        Ok((metadata, priced))
    }

    /// Fill in missing USD values. Oracle failures leave the value unset.
    fn price(&self, contributions: Vec<Contribution>) -> Vec<Contribution> {
        let mut failures = 0usize;
        let priced: Vec<Contribution> = contributions
            .into_iter()
            .map(|c| {
                if c.is_priced() {
                    return c;
                }
                match self.oracle.usd_value(&c.token, c.amount, c.created_at) {
                    Ok(usd) => c.with_usd_value(usd),
                    Err(e) => {
                        failures += 1;
                        debug!(token = %c.token, error = %e, "price lookup failed");
                        c
                    }
                }
            })
            .collect();

        if failures > 0 {
            warn!(failures, "contributions left unpriced");
        }
        priced
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(QfError::Validation(format!("missing parameter {name}")));
    }
    Ok(())
}
