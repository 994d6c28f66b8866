// 🏗️ Statement Parser - One generic algorithm over per-institution patterns
//
// Pipeline for one statement's text:
//   detect institution → extract fields (account, year, balances)
//   → extract transaction lines → resolve duplicates → reconcile
//
// Nothing here branches on a specific institution; every layout difference
// lives in the `PatternSet` data.

use crate::config::{LineFailurePolicy, ParseOptions};
use crate::deduplication::{DuplicatePrompt, DuplicateResolver, Resolution, TransactionSet};
use crate::entities::Institution;
use crate::error::{BalanceKind, LineError, StatementError};
use crate::patterns::{PatternRegistry, PatternSet};
use crate::reconciliation::{ReconciliationEngine, ReconciliationReport};
use crate::temporal::{parse_statement_date, YearRollover};
use crate::transaction::Transaction;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, info, warn};

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// A matched transaction line that could not be turned into a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFailure {
    /// Text matched by the transaction pattern
    pub text: String,
    pub error: LineError,
}

/// Statement-level values found outside the transaction lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFields {
    pub institution: Institution,
    pub account_reference: Option<String>,
    pub year: Option<i32>,
    pub opening_balance: Option<Decimal>,
    pub closing_balance: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateStats {
    pub disambiguated: usize,
    pub rejected: usize,
}

/// Everything pulled from one statement, before reconciliation
#[derive(Debug, Clone)]
pub struct ExtractedStatement {
    pub fields: StatementFields,
    /// In document order, duplicates already resolved
    pub transactions: Vec<Transaction>,
    pub unparsed_lines: Vec<LineFailure>,
    pub duplicates: DuplicateStats,
}

/// A statement whose transactions account for its balance change
#[derive(Debug, Clone)]
pub struct ParsedStatement {
    pub statement: ExtractedStatement,
    pub report: ReconciliationReport,
}

impl ParsedStatement {
    pub fn institution(&self) -> Institution {
        self.statement.fields.institution
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.statement.transactions
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.statement.transactions
    }
}

// ============================================================================
// AMOUNTS
// ============================================================================

/// Parse `$1,234.56`, `-12.00`, `12.00-` into a value and a trailing-minus flag
fn parse_numeral(raw: &str) -> Result<(Decimal, bool), LineError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '+') && !c.is_whitespace())
        .collect();

    let (body, trailing_minus) = match cleaned.strip_suffix('-') {
        Some(body) => (body, true),
        None => (cleaned.as_str(), false),
    };

    Decimal::from_str(body)
        .map(|value| (value, trailing_minus))
        .map_err(|_| LineError::InvalidAmount {
            raw: raw.to_string(),
        })
}

/// Sign a transaction amount.
///
/// Statements print charges as plain numerals, so a bare numeral is an
/// outflow. A credit marker (`CR`, or a trailing `-`) makes it an inflow.
pub fn signed_amount(raw: &str, credit_marker: bool) -> Result<Decimal, LineError> {
    let (value, trailing_minus) = parse_numeral(raw)?;
    if credit_marker || trailing_minus {
        Ok(value.abs())
    } else {
        Ok(-value)
    }
}

/// Value of a balance figure.
/// A `CR` next to an unsigned balance means the account is in credit.
pub fn balance_value(raw: &str, credit_marker: bool) -> Result<Decimal, LineError> {
    let (value, _) = parse_numeral(raw)?;
    if credit_marker && !raw.contains('-') {
        debug!("Patched credit balance: '{}'", raw);
        Ok(-value)
    } else {
        Ok(value)
    }
}

// ============================================================================
// FIELD EXTRACTORS
// ============================================================================

/// Statement year from the set's year pattern, digits only
pub fn extract_year(text: &str, set: &PatternSet) -> Option<i32> {
    let caps = set.year.captures(text)?;
    let digits: String = caps
        .name("year")?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

fn extract_balance(text: &str, pattern: &Regex, kind: BalanceKind) -> Option<Decimal> {
    info!("Getting {} balance...", kind);
    let caps = pattern.captures(text)?;
    let raw = caps.name("balance")?.as_str();

    match balance_value(raw, caps.name("cr").is_some()) {
        Ok(balance) => {
            debug!("{} balance: {}", kind, balance);
            Some(balance)
        }
        Err(err) => {
            warn!("Unreadable {} balance: {}", kind, err);
            None
        }
    }
}

// ============================================================================
// STATEMENT PARSER
// ============================================================================

pub struct StatementParser<'r> {
    registry: &'r PatternRegistry,
    options: ParseOptions,
    resolver: DuplicateResolver,
    reconciler: ReconciliationEngine,
}

impl StatementParser<'static> {
    /// Parser over the built-in registry
    pub fn new(options: ParseOptions) -> Self {
        Self::with_registry(PatternRegistry::builtin(), options)
    }
}

impl<'r> StatementParser<'r> {
    pub fn with_registry(registry: &'r PatternRegistry, options: ParseOptions) -> Self {
        StatementParser {
            registry,
            options,
            resolver: DuplicateResolver::new(options.duplicate_policy),
            reconciler: ReconciliationEngine::new(),
        }
    }

    /// Replace the terminal prompt used by the interactive duplicate policy
    pub fn with_prompt(mut self, prompt: Box<dyn DuplicatePrompt>) -> Self {
        self.resolver = DuplicateResolver::with_prompt(self.options.duplicate_policy, prompt);
        self
    }

    pub fn registry(&self) -> &'r PatternRegistry {
        self.registry
    }

    /// First registry entry whose detection pattern matches.
    ///
    /// Entries sharing a layout family must also find their own statement
    /// year, which is what tells two revisions of one bank's layout apart.
    pub fn detect_institution(&self, text: &str) -> Option<Institution> {
        info!("Detecting financial institution from pdf...");
        let text = text.trim_start();

        let found = self
            .registry
            .sets()
            .iter()
            .find(|set| {
                set.detect.is_match(text)
                    && (!self.registry.has_sibling(set) || extract_year(text, set).is_some())
            })
            .map(|set| set.institution);

        if let Some(institution) = found {
            info!("Found matching FI: {}", institution);
        }
        found
    }

    /// First account-number shape found, redacted to its last four digits
    pub fn extract_account_reference(&self, text: &str) -> Option<String> {
        info!("Getting account number...");

        self.registry
            .account_shapes()
            .iter()
            .find_map(|(shape, pattern)| {
                let caps = pattern.captures(text)?;
                Some(shape.redact(caps.name("account_number")?.as_str()))
            })
            .inspect(|account| debug!("Account Number: {}", account))
    }

    pub fn extract_fields(&self, text: &str, set: &PatternSet) -> StatementFields {
        info!("Getting year...");
        let year = extract_year(text, set);
        match year {
            Some(year) => debug!("YEAR IS: {}", year),
            None => warn!("No statement year found for {}", set.institution),
        }

        StatementFields {
            institution: set.institution,
            account_reference: self.extract_account_reference(text),
            year,
            opening_balance: extract_balance(text, &set.opening_balance, BalanceKind::Opening),
            closing_balance: extract_balance(text, &set.closing_balance, BalanceKind::Closing),
        }
    }

    /// Detect, extract fields and transactions, resolve duplicates.
    /// No balance validation happens here.
    pub fn extract_statement(&mut self, text: &str) -> Result<ExtractedStatement, StatementError> {
        let registry = self.registry;
        let set = self
            .detect_institution(text)
            .and_then(|institution| registry.get(institution))
            .ok_or(StatementError::UndeterminedInstitution)?;

        let fields = self.extract_fields(text, set);
        Ok(self.extract_transactions(text, set, fields))
    }

    /// Full per-statement pipeline, including reconciliation
    pub fn parse_statement(&mut self, text: &str) -> Result<ParsedStatement, StatementError> {
        let statement = self.extract_statement(text)?;

        if !statement.unparsed_lines.is_empty()
            && self.options.line_failures == LineFailurePolicy::Fail
        {
            return Err(StatementError::UnparsedLines(statement.unparsed_lines));
        }

        let report = self.reconciler.reconcile(
            statement.fields.opening_balance,
            statement.fields.closing_balance,
            &statement.transactions,
            &statement.unparsed_lines,
        )?;
        info!("Statement reconciled: {}", report.summary());

        Ok(ParsedStatement { statement, report })
    }

    fn extract_transactions(
        &mut self,
        text: &str,
        set: &PatternSet,
        fields: StatementFields,
    ) -> ExtractedStatement {
        let mut rollover = YearRollover::new();
        let mut collected = TransactionSet::new();
        let mut unparsed_lines = Vec::new();
        let mut duplicates = DuplicateStats::default();

        for caps in set.transaction.captures_iter(text) {
            match self.build_transaction(set, &fields, &caps, &mut rollover) {
                Ok(transaction) => match self.resolver.admit(&mut collected, transaction) {
                    Resolution::Unique => {}
                    Resolution::Disambiguated { description } => {
                        debug!("Kept duplicate as '{}'", description);
                        duplicates.disambiguated += 1;
                    }
                    Resolution::Rejected => duplicates.rejected += 1,
                },
                Err(error) => {
                    let text = caps[0].trim().to_string();
                    warn!("Dropping transaction line {:?}: {}", text, error);
                    unparsed_lines.push(LineFailure { text, error });
                }
            }
        }

        info!(
            "Extracted {} transactions ({} unparsed lines)",
            collected.as_slice().len(),
            unparsed_lines.len()
        );

        ExtractedStatement {
            fields,
            transactions: collected.into_vec(),
            unparsed_lines,
            duplicates,
        }
    }

    fn build_transaction(
        &self,
        set: &PatternSet,
        fields: &StatementFields,
        caps: &Captures<'_>,
        rollover: &mut YearRollover,
    ) -> Result<Transaction, LineError> {
        let date = rollover.adjust(parse_statement_date(&caps["dates"], fields.year)?);

        let credit = caps.name("cr").is_some();
        if credit {
            debug!("Credit found in transaction: '{}'", &caps["amount"]);
        }
        let mut amount = signed_amount(&caps["amount"], credit)?;
        let mut description = caps["description"].to_string();

        // The line pattern can swallow a second figure into the description
        if set.embedded_amounts && description.contains('$') {
            let embedded = self
                .registry
                .embedded_amount()
                .captures(&description)
                .map(|c| signed_amount(&c["amount"], c.name("cr").is_some()));

            if let Some(embedded) = embedded {
                debug!("Amount embedded in description: '{}'", description);
                amount = embedded?;
                description = description
                    .split('$')
                    .next()
                    .unwrap_or_default()
                    .to_string();
            }
        }

        Ok(Transaction::new(
            set.institution,
            fields.account_reference.clone(),
            date,
            description.trim(),
            amount,
        ))
    }
}

// ============================================================================
// TESTS
// ============================================================================
