//! QF Kernel runner.
//!
//! Loads a round's contributions and metadata from JSON files, applies the
//! round's hotfixes, then prints the contribution summary, the matching
//! distribution and the payout commitment as one JSON document.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use qf_kernel::cache::{CachedResult, Fingerprint, MemoryCache};
use qf_kernel::config::RunnerConfig;
use qf_kernel::hotfix::HotfixOverlay;
use qf_kernel::service::RoundService;
use qf_kernel::sources::{MemoryContributions, MemoryMetadata, NoRecovery, NullStore, PrePriced};
use qf_kernel::QfError;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Optional .env file
    let _ = dotenvy::dotenv();

    let config = RunnerConfig::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut contributions = MemoryContributions::new();
    for (round_id, backup) in config.load_backup_rounds()? {
        contributions.insert(round_id.trim().to_lowercase(), backup);
    }
    contributions.insert(config.round_id.clone(), config.load_contributions()?);
    let contributions = Arc::new(contributions);

    let metadata = MemoryMetadata::new().with_round(config.round_id.clone(), config.load_metadata()?);
    let overlay = HotfixOverlay::new(config.load_hotfixes()?, contributions.clone(), Arc::new(NoRecovery));
    let cache: Arc<MemoryCache<CachedResult>> = Arc::new(MemoryCache::new());

    let service = RoundService::new(
        Arc::new(metadata),
        contributions,
        Arc::new(PrePriced),
        Arc::new(NullStore),
        overlay,
        cache,
    );

    let chain_id = config.chain_id.as_str();
    let round_id = config.round_id.as_str();
    info!(chain_id, round_id, "processing round");

    let summary = service.update_round_summary(chain_id, round_id)?;
    let commitment = match service.finalize_round(chain_id, round_id) {
        Ok(tree) => Some(tree.report()),
        Err(QfError::EmptyDistribution) => {
            warn!(chain_id, round_id, "no project qualified for matching, nothing to commit");
            None
        }
        Err(e) => return Err(e.into()),
    };
    let distribution = service
        .cached(&Fingerprint::round_match(chain_id, round_id))
        .into_option();

    let output = json!({
        "chainId": chain_id,
        "roundId": round_id,
        "summary": summary,
        "distribution": distribution,
        "commitment": commitment,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
