//! Round-specific corrections applied to raw contribution data.
//!
//! ## Rules
//!
//! Applied in this order, each configured per round in a [`HotfixConfig`]:
//!
//! 1. **Recovered contributions**: rounds whose contributions partly landed
//!    on the wrong network get the recovered records appended.
//! 2. **Backup round**: a round extended into another round also counts the
//!    other round's contributions.
//! 3. **Ignored payout addresses**: contributions paying out to these
//!    addresses are dropped from every aggregate.
//!
//! The overlay never mutates its input. Rounds without an entry pass through
//! unchanged. A failing backup or recovery fetch fails the whole call, since
//! a silently skipped correction would misstate round totals.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use qf_kernel::hotfix::{HotfixConfig, HotfixOverlay, RoundHotfix};
//! use qf_kernel::sources::{MemoryContributions, NoRecovery};
//!
//! let config = HotfixConfig::default().with_round(
//!     "0xround",
//!     RoundHotfix::default().with_backup_round("0xbackup"),
//! );
//! let overlay = HotfixOverlay::new(
//!     config,
//!     Arc::new(MemoryContributions::new().with_round("0xbackup", vec![])),
//!     Arc::new(NoRecovery),
//! );
//!
//! let out = overlay.apply("1", "0xround", &[], None).unwrap();
//! assert!(out.is_empty());
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::Result;
use crate::sources::{ContributionSource, MissingContributionSource};
use crate::types::{Address, Contribution};

/// Bundled correction table for production rounds.
pub const PRODUCTION_HOTFIXES: &str = r#"{
    "0xdf75054cd67217aee44b4f9e4ebc651c00330938": {
        "recoverMissingContributions": true
    },
    "0x0524d9f611b3785f4675c90aa3161ab0e54c4a39": {
        "backupRoundId": "0xa2ae8421776035c398c22e143290697da09d19d7",
        "ignoredAddresses": [
            "0x4bfd2181be8fa2f6702dee41a46baabeb5d3dd3d",
            "0x16e41af5e034113802d06064fbeb020cc3d47b19"
        ]
    }
}"#;

/// Corrections for a single round.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundHotfix {
    /// Round whose contributions also count toward this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_round_id: Option<String>,

    /// Payout addresses whose contributions are dropped
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ignored_addresses: BTreeSet<Address>,

    /// Append contributions recovered from a wrong-network indexer
    #[serde(default)]
    pub recover_missing_contributions: bool,
}

impl RoundHotfix {
    pub fn with_backup_round(mut self, round_id: impl Into<String>) -> Self {
        self.backup_round_id = Some(normalize_round_id(&round_id.into()));
        self
    }

    pub fn with_ignored_address(mut self, address: Address) -> Self {
        self.ignored_addresses.insert(address);
        self
    }

    pub fn with_recovery(mut self) -> Self {
        self.recover_missing_contributions = true;
        self
    }
}

/// Correction table keyed by round id (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "HashMap<String, RoundHotfix>", into = "HashMap<String, RoundHotfix>")]
pub struct HotfixConfig {
    rounds: HashMap<String, RoundHotfix>,
}

impl From<HashMap<String, RoundHotfix>> for HotfixConfig {
    fn from(raw: HashMap<String, RoundHotfix>) -> Self {
        raw.into_iter()
            .fold(HotfixConfig::default(), |config, (round_id, hotfix)| {
                config.with_round(round_id, hotfix)
            })
    }
}

impl From<HotfixConfig> for HashMap<String, RoundHotfix> {
    fn from(config: HotfixConfig) -> Self {
        config.rounds
    }
}

impl HotfixConfig {
    /// The bundled production table.
    pub fn production() -> Result<Self> {
        Self::from_json_str(PRODUCTION_HOTFIXES)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn with_round(mut self, round_id: impl Into<String>, hotfix: RoundHotfix) -> Self {
        let mut hotfix = hotfix;
        hotfix.backup_round_id = hotfix.backup_round_id.as_deref().map(normalize_round_id);
        self.rounds.insert(normalize_round_id(&round_id.into()), hotfix);
        self
    }

    pub fn round(&self, round_id: &str) -> Option<&RoundHotfix> {
        self.rounds.get(&normalize_round_id(round_id))
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

fn normalize_round_id(round_id: &str) -> String {
    round_id.trim().to_lowercase()
}

/// Applies a [`HotfixConfig`] using the given collaborators for the rules
/// that need extra data.
#[derive(Clone)]
pub struct HotfixOverlay {
    config: HotfixConfig,
    backup_source: Arc<dyn ContributionSource>,
    recovery: Arc<dyn MissingContributionSource>,
}

impl HotfixOverlay {
    pub fn new(
        config: HotfixConfig,
        backup_source: Arc<dyn ContributionSource>,
        recovery: Arc<dyn MissingContributionSource>,
    ) -> Self {
        Self {
            config,
            backup_source,
            recovery,
        }
    }

    pub fn config(&self) -> &HotfixConfig {
        &self.config
    }

    /// Apply the round's corrections to `contributions`.
    ///
    /// `project_ids` restricts recovered and backup contributions to the
    /// requested projects, matching a project-scoped request.
    ///
    /// # Errors
    ///
    /// * `UpstreamFetch` if a recovery or backup-round fetch fails
    pub fn apply(
        &self,
        chain_id: &str,
        round_id: &str,
        contributions: &[Contribution],
        project_ids: Option<&[String]>,
    ) -> Result<Vec<Contribution>> {
        let mut corrected = contributions.to_vec();

        let Some(hotfix) = self.config.round(round_id) else {
            return Ok(corrected);
        };

        if hotfix.recover_missing_contributions {
            let recovered = self.recovery.recover(round_id, project_ids)?;
            debug!(round_id, recovered = recovered.len(), "appending recovered contributions");
            corrected.extend(recovered);
        }

        if let Some(backup_round_id) = &hotfix.backup_round_id {
            let backup = self
                .backup_source
                .contributions(chain_id, backup_round_id, project_ids)?;
            debug!(round_id, backup_round_id = %backup_round_id, added = backup.len(), "appending backup round contributions");
            corrected.extend(backup);
        }

        if !hotfix.ignored_addresses.is_empty() {
            let before = corrected.len();
            corrected.retain(|c| !hotfix.ignored_addresses.contains(&c.payout_address));
            let removed = before - corrected.len();
            if removed > 0 {
                info!(round_id, removed, "filtered contributions to ignored payout addresses");
            }
        }

        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QfError;
    use crate::sources::{MemoryContributions, NoRecovery};
    use ruint::aliases::U256;

    const ROUND: &str = "0x0524d9f611b3785f4675c90aa3161ab0e54c4a39";
    const BACKUP: &str = "0xa2ae8421776035c398c22e143290697da09d19d7";

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn contribution(project: &str, contributor: u8, payout: u8) -> Contribution {
        Contribution::new(U256::from(100u64), "t", addr(contributor), project, addr(payout), 0)
    }

    fn overlay(config: HotfixConfig, source: MemoryContributions) -> HotfixOverlay {
        HotfixOverlay::new(config, Arc::new(source.clone()), Arc::new(source))
    }

    #[test]
    fn test_production_table_loads() {
        let config = HotfixConfig::production().unwrap();
        assert_eq!(config.len(), 2);

        let hotfix = config.round(ROUND).unwrap();
        assert_eq!(hotfix.backup_round_id.as_deref(), Some(BACKUP));
        assert!(hotfix
            .ignored_addresses
            .contains(&"0x4BFD2181BE8FA2F6702DEE41A46BAABEB5D3DD3D".parse().unwrap()));

        assert!(config
            .round("0xDF75054CD67217AEE44B4F9E4EBC651C00330938")
            .unwrap()
            .recover_missing_contributions);
    }

    #[test]
    fn test_unknown_round_passes_through() {
        let input = vec![contribution("p1", 1, 10), contribution("p2", 2, 20)];
        let overlay = overlay(HotfixConfig::production().unwrap(), MemoryContributions::new());

        let out = overlay.apply("1", "0xunknown", &input, None).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_backup_round_appends() {
        let input = vec![contribution("p1", 1, 10)];
        let backup = vec![contribution("p1", 2, 10), contribution("p2", 3, 20)];
        let config = HotfixConfig::default().with_round(ROUND, RoundHotfix::default().with_backup_round(BACKUP));
        let overlay = overlay(config, MemoryContributions::new().with_round(BACKUP, backup.clone()));

        let out = overlay.apply("1", ROUND, &input, None).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], input[0]);
        assert_eq!(&out[1..], &backup[..]);
        // input untouched
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn test_backup_round_respects_project_filter() {
        let backup = vec![contribution("p1", 2, 10), contribution("p2", 3, 20)];
        let config = HotfixConfig::default().with_round(ROUND, RoundHotfix::default().with_backup_round(BACKUP));
        let overlay = overlay(config, MemoryContributions::new().with_round(BACKUP, backup));

        let projects = vec!["p2".to_string()];
        let out = overlay.apply("1", ROUND, &[], Some(&projects)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].project_id, "p2");
    }

    #[test]
    fn test_backup_fetch_failure_propagates() {
        let config = HotfixConfig::default().with_round(ROUND, RoundHotfix::default().with_backup_round(BACKUP));
        let overlay = overlay(config, MemoryContributions::new());

        let result = overlay.apply("1", ROUND, &[contribution("p1", 1, 10)], None);
        assert!(matches!(result, Err(QfError::UpstreamFetch(_))));
    }

    #[test]
    fn test_ignored_addresses_dropped() {
        let input = vec![
            contribution("p1", 1, 10),
            contribution("p2", 2, 20),
            contribution("p3", 3, 30),
        ];
        let config = HotfixConfig::default().with_round(
            ROUND,
            RoundHotfix::default()
                .with_ignored_address(addr(20))
                .with_ignored_address(addr(30)),
        );
        let overlay = overlay(config, MemoryContributions::new());

        let out = overlay.apply("1", ROUND, &input, None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].project_id, "p1");
    }

    #[test]
    fn test_ignored_addresses_apply_to_backup_contributions() {
        let backup = vec![contribution("p2", 2, 20), contribution("p1", 3, 10)];
        let config = HotfixConfig::default().with_round(
            ROUND,
            RoundHotfix::default()
                .with_backup_round(BACKUP)
                .with_ignored_address(addr(20)),
        );
        let overlay = overlay(config, MemoryContributions::new().with_round(BACKUP, backup));

        let out = overlay.apply("1", ROUND, &[contribution("p1", 1, 10)], None).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|c| c.payout_address == addr(10)));
    }

    #[test]
    fn test_recovery_appends_before_backup() {
        let recovered_round = "0xdf75054cd67217aee44b4f9e4ebc651c00330938";
        let config = HotfixConfig::default().with_round(recovered_round, RoundHotfix::default().with_recovery());
        let source = MemoryContributions::new().with_round(recovered_round, vec![contribution("p9", 9, 90)]);
        let overlay = overlay(config, source);

        let out = overlay.apply("10", recovered_round, &[contribution("p1", 1, 10)], None).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].project_id, "p9");
    }

    #[test]
    fn test_recovery_disabled_with_no_recovery_source() {
        let recovered_round = "0xdf75054cd67217aee44b4f9e4ebc651c00330938";
        let config = HotfixConfig::default().with_round(recovered_round, RoundHotfix::default().with_recovery());
        let overlay = HotfixOverlay::new(config, Arc::new(MemoryContributions::new()), Arc::new(NoRecovery));

        let out = overlay.apply("10", recovered_round, &[contribution("p1", 1, 10)], None).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_config_json_roundtrip_keeps_rounds() {
        let config = HotfixConfig::production().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back = HotfixConfig::from_json_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
