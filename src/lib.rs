// Teller - PDF Statement Importer - Core Library
// Exposes all modules for use in the CLI and tests

pub mod entities;
pub mod transaction;
pub mod patterns;
pub mod temporal;
pub mod parser;
pub mod deduplication;
pub mod reconciliation;
pub mod batch;
pub mod db;
#[cfg(feature = "mariadb")]
pub mod mariadb;
pub mod export;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use entities::{AccountShape, Institution, UnknownInstitution};
pub use transaction::{sort_chronologically, Transaction};
pub use patterns::{PatternRegistry, PatternSet, PatternSpec, BUILTIN_SPECS};
pub use parser::{
    signed_amount, DuplicateStats, ExtractedStatement, LineFailure, ParsedStatement,
    StatementFields, StatementParser,
};
pub use deduplication::{DuplicatePolicy, DuplicatePrompt, DuplicateResolver, Resolution};
pub use reconciliation::{Flows, ReconciliationEngine, ReconciliationFailure, ReconciliationReport};
pub use batch::{
    find_statements, BatchReport, BatchRunner, FileFailure, FileOutcome, PdfTextExtractor,
    TextExtractor,
};
pub use db::{new_transactions, Event, SqliteStore, TransactionStore};
#[cfg(feature = "mariadb")]
pub use mariadb::MariaDbStore;
pub use config::{DatabaseKind, LineFailurePolicy, ParseOptions, Settings};
pub use error::{
    BatchError, ConfigError, ExtractError, LineError, StatementError, StoreError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
