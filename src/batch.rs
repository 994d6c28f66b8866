// 📂 Batch Runner - Every statement under a directory, one file at a time
//
// A failing file never stops the batch: it becomes a `FileOutcome` and the
// run moves on. Only a missing input directory is fatal, and that is checked
// before any file is opened.

use crate::config::ParseOptions;
use crate::deduplication::DuplicatePrompt;
use crate::entities::Institution;
use crate::error::{BatchError, ExtractError, StatementError};
use crate::parser::{LineFailure, StatementParser};
use crate::patterns::PatternRegistry;
use crate::reconciliation::ReconciliationReport;
use crate::transaction::{sort_chronologically, Transaction};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

// ============================================================================
// TEXT EXTRACTION
// ============================================================================

/// Turns one statement file into plain text (all pages concatenated)
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Reads the PDF text layer
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    /// pdf-extract panics on some malformed documents; the panic is turned
    /// into an `ExtractError` so only this file fails
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let fail = |message: String| ExtractError {
            path: path.to_path_buf(),
            message,
        };

        match panic::catch_unwind(|| pdf_extract::extract_text(path)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(fail(err.to_string())),
            Err(payload) => Err(fail(format!("malformed PDF: {}", panic_message(&*payload)))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "text extraction panicked".to_string())
}

// ============================================================================
// DISCOVERY
// ============================================================================

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Every `*.pdf` under `root`, recursively, in file-name order
pub fn find_statements(root: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if !root.exists() {
        return Err(BatchError::MissingDirectory(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(BatchError::NotADirectory(root.to_path_buf()));
    }

    let files = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable path: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_pdf(path))
        .collect();

    Ok(files)
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug)]
pub enum FileFailure {
    Extract(ExtractError),
    Statement(StatementError),
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFailure::Extract(err) => write!(f, "{}", err),
            FileFailure::Statement(err) => write!(f, "{}", err),
        }
    }
}

/// What happened to one statement file
#[derive(Debug)]
pub enum FileOutcome {
    Parsed {
        path: PathBuf,
        institution: Institution,
        report: ReconciliationReport,
        disambiguated: usize,
        unparsed_lines: Vec<LineFailure>,
    },

    /// Not an error: the layout is simply not one we know
    Skipped { path: PathBuf, reason: String },

    /// Excluded from the batch; none of its transactions are kept
    Failed { path: PathBuf, error: FileFailure },
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::Parsed { path, .. }
            | FileOutcome::Skipped { path, .. }
            | FileOutcome::Failed { path, .. } => path,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, FileOutcome::Parsed { .. })
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Union of every parsed file's transactions
    pub transactions: HashSet<Transaction>,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn parsed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_parsed()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Failed { .. }))
            .count()
    }

    /// Transactions ordered by date, then institution and description
    pub fn sorted_transactions(&self) -> Vec<Transaction> {
        let mut sorted: Vec<Transaction> = self.transactions.iter().cloned().collect();
        sort_chronologically(&mut sorted);
        sorted
    }
}

// ============================================================================
// RUNNER
// ============================================================================

pub struct BatchRunner<'r, E: TextExtractor = PdfTextExtractor> {
    extractor: E,
    parser: StatementParser<'r>,
}

impl BatchRunner<'static, PdfTextExtractor> {
    pub fn new(options: ParseOptions) -> Self {
        BatchRunner {
            extractor: PdfTextExtractor,
            parser: StatementParser::new(options),
        }
    }
}

impl<'r, E: TextExtractor> BatchRunner<'r, E> {
    pub fn with_extractor(extractor: E, registry: &'r PatternRegistry, options: ParseOptions) -> Self {
        BatchRunner {
            extractor,
            parser: StatementParser::with_registry(registry, options),
        }
    }

    /// Prompt used when duplicates are resolved interactively
    pub fn with_prompt(mut self, prompt: Box<dyn DuplicatePrompt>) -> Self {
        self.parser = self.parser.with_prompt(prompt);
        self
    }

    pub fn run(&mut self, root: &Path) -> Result<BatchReport, BatchError> {
        let files = find_statements(root)?;
        info!("Found {} statement(s) under {}", files.len(), root.display());
        Ok(self.run_files(files))
    }

    /// Process an already discovered list of statements, in the given order
    pub fn run_files(&mut self, files: Vec<PathBuf>) -> BatchReport {
        let mut report = BatchReport::default();
        for path in files {
            let (outcome, transactions) = self.process_file(path);
            report.transactions.extend(transactions);
            report.outcomes.push(outcome);
        }

        info!(
            "Batch finished: {} parsed, {} skipped, {} failed, {} transactions",
            report.parsed_count(),
            report.skipped_count(),
            report.failed_count(),
            report.transactions.len()
        );
        report
    }

    /// Parse one file. Transactions are returned only for a parsed outcome.
    pub fn process_file(&mut self, path: PathBuf) -> (FileOutcome, Vec<Transaction>) {
        info!("Processing {}", path.display());

        let text = match self.extractor.extract(&path) {
            Ok(text) => text,
            Err(err) => {
                error!("{}", err);
                let error = FileFailure::Extract(err);
                return (FileOutcome::Failed { path, error }, Vec::new());
            }
        };

        match self.parser.parse_statement(&text) {
            Ok(parsed) => {
                let outcome = FileOutcome::Parsed {
                    path,
                    institution: parsed.institution(),
                    report: parsed.report.clone(),
                    disambiguated: parsed.statement.duplicates.disambiguated,
                    unparsed_lines: parsed.statement.unparsed_lines.clone(),
                };
                (outcome, parsed.into_transactions())
            }
            Err(StatementError::UndeterminedInstitution) => {
                warn!("Unable to determine financial institution, skipping {}", path.display());
                let reason = StatementError::UndeterminedInstitution.to_string();
                (FileOutcome::Skipped { path, reason }, Vec::new())
            }
            Err(err) => {
                error!("Excluding {}: {}", path.display(), err);
                let error = FileFailure::Statement(err);
                (FileOutcome::Failed { path, error }, Vec::new())
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
