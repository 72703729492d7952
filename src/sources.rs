//! Collaborator seams: indexer, metadata service, pricing oracle,
//! missing-contribution recovery and durable storage.
//!
//! The core only sees these traits. Implementations that talk to the network
//! or a database live outside this crate; the in-memory ones here back the
//! runner binary and the tests.

use std::collections::HashMap;

use rust_decimal::Decimal;
use ruint::aliases::U256;

use crate::errors::{QfError, Result};
use crate::types::{Contribution, QFContributionSummary, QFDistributionResults, RoundMetadata};

/// Round metadata lookup.
pub trait MetadataSource: Send + Sync {
    fn round_metadata(&self, chain_id: &str, round_id: &str) -> Result<RoundMetadata>;
}

/// Raw contributions from the chain-event indexer.
pub trait ContributionSource: Send + Sync {
    /// Contributions of a round, restricted to `project_ids` when given.
    fn contributions(
        &self,
        chain_id: &str,
        round_id: &str,
        project_ids: Option<&[String]>,
    ) -> Result<Vec<Contribution>>;
}

/// Contributions that landed on the wrong network and were recovered
/// from another indexer.
pub trait MissingContributionSource: Send + Sync {
    fn recover(&self, round_id: &str, project_ids: Option<&[String]>) -> Result<Vec<Contribution>>;
}

/// USD pricing oracle. May fail per item.
pub trait PriceOracle: Send + Sync {
    fn usd_value(&self, token: &str, amount: U256, timestamp: u64) -> Result<Decimal>;
}

/// Durable storage for computed results.
pub trait SummaryStore: Send + Sync {
    fn persist_summary(
        &self,
        chain_id: &str,
        round_id: &str,
        project_id: Option<&str>,
        summary: &QFContributionSummary,
    ) -> Result<()>;

    fn persist_distribution(
        &self,
        chain_id: &str,
        round_id: &str,
        results: &QFDistributionResults,
    ) -> Result<()>;
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// No recovered contributions for any round.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecovery;

impl MissingContributionSource for NoRecovery {
    fn recover(&self, _round_id: &str, _project_ids: Option<&[String]>) -> Result<Vec<Contribution>> {
        Ok(Vec::new())
    }
}

/// Store that accepts and discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl SummaryStore for NullStore {
    fn persist_summary(
        &self,
        _chain_id: &str,
        _round_id: &str,
        _project_id: Option<&str>,
        _summary: &QFContributionSummary,
    ) -> Result<()> {
        Ok(())
    }

    fn persist_distribution(&self, _chain_id: &str, _round_id: &str, _results: &QFDistributionResults) -> Result<()> {
        Ok(())
    }
}

/// Oracle for contributions that already carry a `usdValue`: it never
/// prices anything itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrePriced;

impl PriceOracle for PrePriced {
    fn usd_value(&self, token: &str, _amount: U256, _timestamp: u64) -> Result<Decimal> {
        Err(QfError::UpstreamFetch(format!("no price feed for token {token}")))
    }
}

/// Contributions held in memory, keyed by round id.
///
/// Serves both as an indexer stand-in and as a recovery feed.
#[derive(Debug, Default, Clone)]
pub struct MemoryContributions {
    rounds: HashMap<String, Vec<Contribution>>,
}

impl MemoryContributions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_round(mut self, round_id: impl Into<String>, contributions: Vec<Contribution>) -> Self {
        self.rounds.insert(round_id.into(), contributions);
        self
    }

    pub fn insert(&mut self, round_id: impl Into<String>, contributions: Vec<Contribution>) {
        self.rounds.insert(round_id.into(), contributions);
    }

    fn lookup(&self, round_id: &str, project_ids: Option<&[String]>) -> Option<Vec<Contribution>> {
        self.rounds
            .get(round_id)
            .map(|all| filter_projects(all, project_ids))
    }
}

impl ContributionSource for MemoryContributions {
    fn contributions(
        &self,
        _chain_id: &str,
        round_id: &str,
        project_ids: Option<&[String]>,
    ) -> Result<Vec<Contribution>> {
        self.lookup(round_id, project_ids)
            .ok_or_else(|| QfError::UpstreamFetch(format!("round {round_id} not indexed")))
    }
}

impl MissingContributionSource for MemoryContributions {
    fn recover(&self, round_id: &str, project_ids: Option<&[String]>) -> Result<Vec<Contribution>> {
        Ok(self.lookup(round_id, project_ids).unwrap_or_default())
    }
}

/// Metadata held in memory, keyed by round id.
#[derive(Debug, Default, Clone)]
pub struct MemoryMetadata {
    rounds: HashMap<String, RoundMetadata>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_round(mut self, round_id: impl Into<String>, metadata: RoundMetadata) -> Self {
        self.rounds.insert(round_id.into(), metadata);
        self
    }
}

impl MetadataSource for MemoryMetadata {
    fn round_metadata(&self, _chain_id: &str, round_id: &str) -> Result<RoundMetadata> {
        self.rounds
            .get(round_id)
            .cloned()
            .ok_or_else(|| QfError::UpstreamFetch(format!("no metadata for round {round_id}")))
    }
}

/// Keep only contributions to the listed projects; `None` keeps everything.
pub fn filter_projects(contributions: &[Contribution], project_ids: Option<&[String]>) -> Vec<Contribution> {
    match project_ids {
        Some(ids) => contributions
            .iter()
            .filter(|c| ids.iter().any(|id| *id == c.project_id))
            .cloned()
            .collect(),
        None => contributions.to_vec(),
    }
}
