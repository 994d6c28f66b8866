// ⚠️ Error taxonomy
//
// Line-level errors drop a single transaction line, statement-level errors
// exclude one file, batch-level errors stop the run before any file is read.

use crate::parser::LineFailure;
use crate::reconciliation::ReconciliationFailure;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why one transaction line could not be turned into a `Transaction`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("no statement year available for date '{token}'")]
    MissingYear { token: String },

    #[error("date '{token}' matches none of the accepted formats")]
    UnrecognizedDate { token: String },

    #[error("amount '{raw}' is not a valid number")]
    InvalidAmount { raw: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceKind {
    Opening,
    Closing,
}

impl fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceKind::Opening => f.write_str("opening"),
            BalanceKind::Closing => f.write_str("closing"),
        }
    }
}

/// Why a whole statement was excluded from the batch
#[derive(Debug, Error)]
pub enum StatementError {
    #[error("could not detect the financial institution")]
    UndeterminedInstitution,

    #[error("{0} balance not found on statement")]
    MissingBalance(BalanceKind),

    #[error("transaction amounts overflow the supported range")]
    AmountOverflow,

    #[error("{} transaction line(s) could not be parsed", .0.len())]
    UnparsedLines(Vec<LineFailure>),

    #[error(transparent)]
    Reconciliation(#[from] Box<ReconciliationFailure>),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("statement directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("statement path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

#[derive(Debug, Error)]
#[error("failed to extract text from {}: {message}", .path.display())]
pub struct ExtractError {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "mariadb")]
    #[error("MariaDB error: {0}")]
    MariaDb(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt stored transaction: {0}")]
    CorruptRow(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("MariaDB connection requires {0}")]
    MissingCredential(&'static str),
}
