// Price Reconciliation - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod record;      // Tabular rows and datasets
pub mod normalizer;  // Identity keys + market price extraction
pub mod index;       // Multiplicity-aware baseline index
pub mod matcher;     // Price-delta matcher
pub mod changeset;   // Change-set assembly + compare_snapshots
pub mod codec;       // CSV in/out and the price-change export
pub mod validation;  // Upload/export preconditions
pub mod store;       // Baseline snapshot store
pub mod audit;       // SQLite event log
pub mod config;      // TOML + environment configuration
pub mod service;     // Boundary orchestration

// Re-export commonly used types
pub use record::{TabularDataset, TabularRecord};
pub use normalizer::{
    extract_price, normalize, parse_price,
    NormalizedRow, PriceExtraction, RecordRole, RowIdentity,
    MARKET_PRICE_PREFIX,
};
pub use index::{BaselineEntry, BaselineIndex};
pub use matcher::{MatchOutcome, PriceDeltaMatcher, PRICE_TOLERANCE};
pub use changeset::{assemble, compare_snapshots, ChangeSet, ComparisonStats, PriceChange};
pub use validation::{
    InputValidator, ValidationError, ValidationFailure, ValidationResult,
    DEFAULT_MAX_ROWS, REQUIRED_COLUMNS,
};
pub use store::{
    BaselineMissing, FileSnapshotStore, MemorySnapshotStore, SnapshotInfo, SnapshotStore,
};
pub use audit::{AuditLog, Event, EventKind};
pub use config::AppConfig;
pub use service::{Actor, ReconciliationService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
