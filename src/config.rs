// ⚙️ Configuration - TOML file, then environment overrides
//
// The price tolerance and the "Market Price" prefix are deliberately not
// configurable.

use crate::store::DEFAULT_BASELINE_FILE;
use crate::validation::DEFAULT_MAX_ROWS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "price-reconciliation.toml";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const ENV_CONFIG: &str = "PRICE_RECON_CONFIG";
const ENV_BASELINE_DIR: &str = "PRICE_RECON_BASELINE_DIR";
const ENV_BASELINE_FILE: &str = "PRICE_RECON_BASELINE_FILE";
const ENV_AUDIT_DB: &str = "PRICE_RECON_AUDIT_DB";
const ENV_MAX_ROWS: &str = "PRICE_RECON_MAX_ROWS";
const ENV_MAX_UPLOAD_BYTES: &str = "PRICE_RECON_MAX_UPLOAD_BYTES";
const ENV_BIND: &str = "PRICE_RECON_BIND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the baseline export
    pub baseline_dir: PathBuf,
    /// Baseline file name inside `baseline_dir`
    pub baseline_file: String,
    /// SQLite audit log; disabled when unset
    pub audit_db: Option<PathBuf>,
    pub max_rows: usize,
    pub max_upload_bytes: usize,
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            baseline_dir: PathBuf::from("data"),
            baseline_file: DEFAULT_BASELINE_FILE.to_string(),
            audit_db: None,
            max_rows: DEFAULT_MAX_ROWS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// `.env`, then the TOML file (if any), then `PRICE_RECON_*` variables
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let explicit = env::var(ENV_CONFIG).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else if explicit.is_some() {
            anyhow::bail!("Config file not found: {}", path.display());
        } else {
            Self::default()
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from any key → value lookup (environment in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_BASELINE_DIR) {
            self.baseline_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup(ENV_BASELINE_FILE) {
            self.baseline_file = file;
        }
        if let Some(db) = lookup(ENV_AUDIT_DB) {
            self.audit_db = if db.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(db))
            };
        }
        if let Some(rows) = lookup(ENV_MAX_ROWS) {
            self.max_rows = rows
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number, got '{}'", ENV_MAX_ROWS, rows))?;
        }
        if let Some(bytes) = lookup(ENV_MAX_UPLOAD_BYTES) {
            self.max_upload_bytes = bytes.trim().parse().with_context(|| {
                format!("{} must be a number, got '{}'", ENV_MAX_UPLOAD_BYTES, bytes)
            })?;
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.bind_addr = bind;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.baseline_file, "export.csv");
        assert_eq!(config.max_rows, 50_000);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.audit_db.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "baseline_dir = \"/srv/prices\"\nmax_rows = 100\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();

        assert_eq!(config.baseline_dir, PathBuf::from("/srv/prices"));
        assert_eq!(config.max_rows, 100);
        assert_eq!(config.baseline_file, "export.csv");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PRICE_RECON_BASELINE_FILE", "snapshot.csv"),
            ("PRICE_RECON_AUDIT_DB", "audit.db"),
            ("PRICE_RECON_MAX_ROWS", " 10 "),
            ("PRICE_RECON_BIND", "127.0.0.1:8080"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.baseline_file, "snapshot.csv");
        assert_eq!(config.audit_db, Some(PathBuf::from("audit.db")));
        assert_eq!(config.max_rows, 10);
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_bad_number_override_fails() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "PRICE_RECON_MAX_ROWS").then(|| "lots".to_string())
        });

        assert!(result.is_err());
    }
}
