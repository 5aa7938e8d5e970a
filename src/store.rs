// 💾 Snapshot Store - Where the baseline export lives between comparisons
//
// Exactly one well-known location. Replacement is all-or-nothing: the new
// file is written next to the old one and renamed over it.

use crate::codec;
use crate::record::TabularDataset;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

pub const DEFAULT_BASELINE_FILE: &str = "export.csv";

// ============================================================================
// ERRORS & INFO
// ============================================================================

/// No baseline has been stored yet; comparisons cannot run
#[derive(Debug, Clone)]
pub struct BaselineMissing {
    pub location: String,
}

impl std::fmt::Display for BaselineMissing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Previous export not found at {}", self.location)
    }
}

impl std::error::Error for BaselineMissing {}

/// What was written by a baseline replacement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub location: String,
    pub row_count: usize,
    /// Hex SHA-256 of the stored bytes
    pub fingerprint: String,
    pub replaced_at: DateTime<Utc>,
}

pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// STORE TRAIT
// ============================================================================

pub trait SnapshotStore: Send {
    /// Current baseline; `BaselineMissing` if none has been stored
    fn load_baseline(&self) -> Result<TabularDataset>;

    /// Swap in a new baseline atomically
    fn replace_baseline(&self, dataset: &TabularDataset) -> Result<SnapshotInfo>;

    /// Fingerprint of the current baseline, if any
    fn baseline_fingerprint(&self) -> Result<Option<String>>;

    /// Human-readable location for logs and messages
    fn location(&self) -> String;
}

// ============================================================================
// FILE STORE
// ============================================================================

pub struct FileSnapshotStore {
    root: PathBuf,
    file_name: String,
}

impl FileSnapshotStore {
    /// `file_name` must be a bare file name; the store never leaves `root`
    pub fn new(root: impl Into<PathBuf>, file_name: &str) -> Result<Self> {
        // components() forgives a trailing separator, so check separators first
        let has_separator = file_name.contains(|c: char| c == '/' || c == '\\');
        let mut components = Path::new(file_name).components();
        let is_plain = !has_separator
            && matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            );

        if !is_plain {
            return Err(anyhow!(
                "Invalid baseline file name '{}': must be a plain file name",
                file_name
            ));
        }

        Ok(FileSnapshotStore {
            root: root.into(),
            file_name: file_name.to_string(),
        })
    }

    pub fn with_default_name(root: impl Into<PathBuf>) -> Result<Self> {
        Self::new(root, DEFAULT_BASELINE_FILE)
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.root.join(&self.file_name)
    }

    fn temp_path(&self) -> PathBuf {
        self.root
            .join(format!(".{}.{}.tmp", self.file_name, uuid::Uuid::new_v4()))
    }

    fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        let path = self.baseline_path();
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read baseline: {}", path.display()))?;
        Ok(Some(bytes))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load_baseline(&self) -> Result<TabularDataset> {
        let bytes = self.read_bytes()?.ok_or_else(|| BaselineMissing {
            location: self.location(),
        })?;

        codec::parse(&bytes)
            .with_context(|| format!("Failed to parse baseline: {}", self.location()))
    }

    fn replace_baseline(&self, dataset: &TabularDataset) -> Result<SnapshotInfo> {
        let bytes = codec::serialize(dataset)?;

        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create directory: {}", self.root.display()))?;

        let temp = self.temp_path();
        let write_result = (|| -> Result<()> {
            let mut file = fs::File::create(&temp)
                .with_context(|| format!("Failed to create temp file: {}", temp.display()))?;
            file.write_all(&bytes).context("Failed to write baseline")?;
            file.sync_all().context("Failed to sync baseline")?;
            fs::rename(&temp, self.baseline_path())
                .with_context(|| format!("Failed to replace baseline: {}", self.location()))?;
            Ok(())
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }

        let info = SnapshotInfo {
            location: self.location(),
            row_count: dataset.len(),
            fingerprint: fingerprint(&bytes),
            replaced_at: Utc::now(),
        };

        info!(
            location = %info.location,
            rows = info.row_count,
            fingerprint = %info.fingerprint,
            "baseline replaced"
        );

        Ok(info)
    }

    fn baseline_fingerprint(&self) -> Result<Option<String>> {
        Ok(self.read_bytes()?.map(|bytes| fingerprint(&bytes)))
    }

    fn location(&self) -> String {
        self.baseline_path().display().to_string()
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// Keeps the baseline as serialized CSV in memory
#[derive(Default)]
pub struct MemorySnapshotStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(dataset: &TabularDataset) -> Result<Self> {
        let store = Self::new();
        store.replace_baseline(dataset)?;
        Ok(store)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load_baseline(&self) -> Result<TabularDataset> {
        let guard = self
            .bytes
            .lock()
            .map_err(|_| anyhow!("Snapshot store lock poisoned"))?;
        match guard.as_ref() {
            Some(bytes) => codec::parse(bytes),
            None => Err(BaselineMissing {
                location: self.location(),
            }
            .into()),
        }
    }

    fn replace_baseline(&self, dataset: &TabularDataset) -> Result<SnapshotInfo> {
        let bytes = codec::serialize(dataset)?;
        let info = SnapshotInfo {
            location: self.location(),
            row_count: dataset.len(),
            fingerprint: fingerprint(&bytes),
            replaced_at: Utc::now(),
        };

        *self
            .bytes
            .lock()
            .map_err(|_| anyhow!("Snapshot store lock poisoned"))? = Some(bytes);

        Ok(info)
    }

    fn baseline_fingerprint(&self) -> Result<Option<String>> {
        let guard = self
            .bytes
            .lock()
            .map_err(|_| anyhow!("Snapshot store lock poisoned"))?;
        Ok(guard.as_deref().map(fingerprint))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
