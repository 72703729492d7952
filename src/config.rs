//! Runner configuration loaded from environment variables.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::errors::{QfError, Result};
use crate::hotfix::HotfixConfig;
use crate::types::{Contribution, RoundMetadata};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Chain the round lives on
    pub chain_id: String,
    /// Round to summarize and finalize
    pub round_id: String,
    /// JSON array of contributions for the round
    pub contributions_path: PathBuf,
    /// JSON round metadata
    pub metadata_path: PathBuf,
    /// Hotfix table; the production table is used when unset
    pub hotfix_path: Option<PathBuf>,
    /// JSON map of round id to contributions, served as backup rounds
    pub backup_contributions_path: Option<PathBuf>,
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(RunnerConfig {
            chain_id: env_var("QF_CHAIN_ID").unwrap_or_else(|_| "1".to_string()),
            round_id: env_var("QF_ROUND_ID")
                .map_err(|_| QfError::Config("QF_ROUND_ID environment variable is required".to_string()))?,
            contributions_path: env_var("QF_CONTRIBUTIONS_PATH")
                .map(PathBuf::from)
                .map_err(|_| QfError::Config("QF_CONTRIBUTIONS_PATH environment variable is required".to_string()))?,
            metadata_path: env_var("QF_METADATA_PATH")
                .map(PathBuf::from)
                .map_err(|_| QfError::Config("QF_METADATA_PATH environment variable is required".to_string()))?,
            hotfix_path: env_var("QF_HOTFIX_PATH").ok().map(PathBuf::from),
            backup_contributions_path: env_var("QF_BACKUP_CONTRIBUTIONS_PATH").ok().map(PathBuf::from),
        })
    }

    pub fn load_contributions(&self) -> Result<Vec<Contribution>> {
        read_json(&self.contributions_path)
    }

    pub fn load_metadata(&self) -> Result<RoundMetadata> {
        let metadata: RoundMetadata = read_json(&self.metadata_path)?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn load_hotfixes(&self) -> Result<HotfixConfig> {
        match &self.hotfix_path {
            Some(path) => HotfixConfig::from_path(path),
            None => HotfixConfig::production(),
        }
    }

    pub fn load_backup_rounds(&self) -> Result<HashMap<String, Vec<Contribution>>> {
        match &self.backup_contributions_path {
            Some(path) => read_json(path),
            None => Ok(HashMap::new()),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn env_var(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(QfError::Config(format!("Missing env var: {key}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> RunnerConfig {
        RunnerConfig {
            chain_id: "1".to_string(),
            round_id: "0xround".to_string(),
            contributions_path: dir.join("contributions.json"),
            metadata_path: dir.join("metadata.json"),
            hotfix_path: None,
            backup_contributions_path: None,
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("qf-kernel-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_loads_files() {
        let dir = scratch_dir("loads");
        fs::write(
            dir.join("contributions.json"),
            r#"[{"amount":"100","token":"usdc","contributor":"0x0101010101010101010101010101010101010101",
                "projectId":"p1","payoutAddress":"0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a","usdValue":"100"}]"#,
        )
        .unwrap();
        fs::write(
            dir.join("metadata.json"),
            r#"{"votingStrategy":{"id":"vs","strategyName":"LINEAR_QUADRATIC_FUNDING"},"token":"usdc","totalPot":"1000"}"#,
        )
        .unwrap();

        let cfg = config(&dir);
        let contributions = cfg.load_contributions().unwrap();
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].project_id, "p1");

        let metadata = cfg.load_metadata().unwrap();
        assert_eq!(metadata.token_decimals, 18);

        assert_eq!(cfg.load_hotfixes().unwrap().len(), 2);
        assert!(cfg.load_backup_rounds().unwrap().is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let cfg = config(Path::new("/nonexistent/qf-kernel"));
        assert!(matches!(cfg.load_contributions(), Err(QfError::Io(_))));
    }

    #[test]
    fn test_malformed_json() {
        let dir = scratch_dir("malformed");
        fs::write(dir.join("metadata.json"), "{not json").unwrap();
        assert!(matches!(config(&dir).load_metadata(), Err(QfError::Json(_))));
        fs::remove_dir_all(&dir).unwrap();
    }
}
