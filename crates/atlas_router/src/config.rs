//! Router configuration.

use crate::{Result, RouterError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One inbox routing rule as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub id: String,
    /// Case-sensitive glob matched against the bare filename.
    pub pattern: String,
    /// Target staging table for matching files.
    pub staging_table: String,
    /// Ascending; lowest wins among matches.
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Main configuration for the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Directory watched for arriving files.
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: PathBuf,

    /// Claimed files live here while a worker owns them.
    #[serde(default = "default_processing_dir")]
    pub processing_dir: PathBuf,

    /// Successfully staged files are moved here.
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,

    /// Unmatched or failed files are quarantined here, never deleted.
    #[serde(default = "default_failed_dir")]
    pub failed_dir: PathBuf,

    /// Number of files staged concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds between inbox scans.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Abandoned files found in processing/ are retried up to this many times.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Optional per-file load timeout in seconds. A timed-out load rolls
    /// back and the file is quarantined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_timeout_secs: Option<u64>,

    /// Recorded as `upload_user` for router-driven loads.
    #[serde(default = "default_uploaded_by")]
    pub uploaded_by: String,

    /// Recorded as `client_name` for router-driven loads.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

fn default_enabled() -> bool {
    true
}

fn atlas_dir(leaf: &str) -> PathBuf {
    atlas_logging::atlas_home().join(leaf)
}

fn default_inbox_dir() -> PathBuf {
    atlas_dir("inbox")
}

fn default_processing_dir() -> PathBuf {
    atlas_dir("processing")
}

fn default_processed_dir() -> PathBuf {
    atlas_dir("processed")
}

fn default_failed_dir() -> PathBuf {
    atlas_dir("failed")
}

fn default_workers() -> usize {
    4
}

fn default_scan_interval() -> u64 {
    5
}

fn default_retry_limit() -> u32 {
    3
}

fn default_uploaded_by() -> String {
    "atlas-router".to_string()
}

fn default_client_name() -> String {
    "atlas-router".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            inbox_dir: default_inbox_dir(),
            processing_dir: default_processing_dir(),
            processed_dir: default_processed_dir(),
            failed_dir: default_failed_dir(),
            workers: default_workers(),
            scan_interval_secs: default_scan_interval(),
            retry_limit: default_retry_limit(),
            load_timeout_secs: None,
            uploaded_by: default_uploaded_by(),
            client_name: default_client_name(),
            rules: Vec::new(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RouterConfig =
            toml::from_str(&content).map_err(|e| RouterError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| RouterError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create the four working directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.inbox_dir,
            &self.processing_dir,
            &self.processed_dir,
            &self.failed_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// All four directories must be distinct; a shared directory would make
    /// the claim rename a no-op.
    pub fn validate(&self) -> Result<()> {
        let dirs = [
            &self.inbox_dir,
            &self.processing_dir,
            &self.processed_dir,
            &self.failed_dir,
        ];
        for (i, a) in dirs.iter().enumerate() {
            for b in dirs.iter().skip(i + 1) {
                if a == b {
                    return Err(RouterError::Config(format!(
                        "directories must be distinct: {} is reused",
                        a.display()
                    )));
                }
            }
        }
        if self.workers == 0 {
            return Err(RouterError::Config("workers must be at least 1".into()));
        }
        Ok(())
    }
}
