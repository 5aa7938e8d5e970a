// 🔁 Reconciliation Service - Validate, load baseline, compare, record
//
// Everything the comparison needs is passed in explicitly: no global
// clients or shared singletons. Each compare() builds its own index.

use crate::audit::{AuditLog, Event, EventKind};
use crate::changeset::{compare_snapshots, ChangeSet, PriceChange};
use crate::codec;
use crate::config::AppConfig;
use crate::record::{TabularDataset, TabularRecord};
use crate::store::{fingerprint, FileSnapshotStore, SnapshotInfo, SnapshotStore};
use crate::validation::InputValidator;
use anyhow::Result;
use tracing::{info, warn};

/// Who triggered an operation, for the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Cli,
    Api,
}

impl Actor {
    pub fn name(&self) -> &str {
        match self {
            Actor::Cli => "cli",
            Actor::Api => "api",
        }
    }
}

pub struct ReconciliationService<S: SnapshotStore> {
    store: S,
    validator: InputValidator,
    audit: Option<AuditLog>,
}

impl ReconciliationService<FileSnapshotStore> {
    /// File-backed service as described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = FileSnapshotStore::new(&config.baseline_dir, &config.baseline_file)?;
        let audit = match &config.audit_db {
            Some(path) => Some(AuditLog::open(path)?),
            None => None,
        };

        Ok(ReconciliationService {
            store,
            validator: InputValidator::with_max_rows(config.max_rows),
            audit,
        })
    }
}

impl<S: SnapshotStore> ReconciliationService<S> {
    pub fn new(store: S, validator: InputValidator) -> Self {
        ReconciliationService {
            store,
            validator,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> Option<&AuditLog> {
        self.audit.as_ref()
    }

    /// Compare an uploaded export against the stored baseline
    ///
    /// A missing or unreadable baseline is a hard failure; bad rows are not.
    pub fn compare(&self, new_rows: &[TabularRecord], actor: Actor) -> Result<ChangeSet> {
        self.validator.validate_upload(new_rows)?;

        let baseline = self.store.load_baseline()?;
        let change_set = compare_snapshots(&baseline.rows, new_rows);

        info!(
            actor = actor.name(),
            changes = change_set.len(),
            unmatched = change_set.stats.unmatched,
            baseline_unclaimed = change_set.stats.baseline_unclaimed,
            "{}",
            change_set.message()
        );

        if change_set.stats.missing_price_column > 0 {
            warn!(
                rows = change_set.stats.missing_price_column,
                "matched rows skipped: no market price column"
            );
        }

        self.record(Event::new(
            EventKind::BaselineCompared,
            self.audit_baseline_id(),
            actor.name(),
            serde_json::json!({
                "changes": change_set.len(),
                "increases": change_set.increases(),
                "decreases": change_set.decreases(),
                "stats": change_set.stats,
            }),
        ));

        Ok(change_set)
    }

    /// Replace the baseline with uploaded rows; headers follow first appearance
    pub fn replace_baseline(&self, rows: Vec<TabularRecord>, actor: Actor) -> Result<SnapshotInfo> {
        self.replace_baseline_dataset(&TabularDataset::from_records(rows), actor)
    }

    /// Replace the baseline with a parsed export, keeping its header order
    pub fn replace_baseline_dataset(&self, dataset: &TabularDataset, actor: Actor) -> Result<SnapshotInfo> {
        self.validator.validate_upload(&dataset.rows)?;

        let previous = self.audit_baseline_id();
        let info = self.store.replace_baseline(dataset)?;

        self.record(Event::new(
            EventKind::BaselineReplaced,
            Some(info.fingerprint.clone()),
            actor.name(),
            serde_json::json!({
                "row_count": info.row_count,
                "previous": previous,
                "location": info.location,
            }),
        ));

        Ok(info)
    }

    /// Render a change-set as the downloadable CSV
    pub fn export(&self, changes: &[PriceChange]) -> Result<Vec<u8>> {
        self.validator.validate_export(changes)?;
        codec::export_price_changes(changes)
    }

    /// Current baseline with its fingerprint
    pub fn baseline(&self) -> Result<(TabularDataset, String)> {
        let dataset = self.store.load_baseline()?;
        let id = match self.store.baseline_fingerprint()? {
            Some(id) => id,
            None => fingerprint(&codec::serialize(&dataset)?),
        };
        Ok((dataset, id))
    }

    pub fn history(&self, limit: usize) -> Result<Vec<Event>> {
        match &self.audit {
            Some(audit) => audit.recent(limit),
            None => Ok(Vec::new()),
        }
    }

    // Only read when auditing; an unreadable baseline just leaves the id blank
    fn audit_baseline_id(&self) -> Option<String> {
        self.audit.as_ref()?;
        match self.store.baseline_fingerprint() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "failed to fingerprint baseline for audit");
                None
            }
        }
    }

    // An audit failure never fails the operation it describes
    fn record(&self, event: Event) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.record(&event) {
                warn!(error = %e, kind = event.kind.as_str(), "failed to write audit event");
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
