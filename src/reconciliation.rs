// ⚖️ Reconciliation - Do the parsed lines explain the balance change?
//
// Spend is negative, payments and cashback are positive, so for a statement
// to be fully accounted for:
//
//   round(sum(amounts), 2) == round(opening_balance - closing_balance, 2)
//
// A mismatch means the transaction pattern missed (or invented) lines. The
// whole file is rejected and a diagnostic dump is logged.

use crate::error::{BalanceKind, StatementError};
use crate::parser::LineFailure;
use crate::transaction::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// FLOWS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flows {
    pub net: Decimal,
    /// Sum of positive amounts (payments, credits)
    pub inflow: Decimal,
    /// Sum of negative amounts (purchases, fees)
    pub outflow: Decimal,
}

// ============================================================================
// REPORT (success)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub flows: Flows,
    pub transaction_count: usize,
}

impl ReconciliationReport {
    pub fn summary(&self) -> String {
        format!(
            "{} transactions, opening ${}, closing ${}, net/inflow/outflow {}/{}/{}",
            self.transaction_count,
            self.opening_balance,
            self.closing_balance,
            self.flows.net,
            self.flows.inflow,
            self.flows.outflow
        )
    }
}

// ============================================================================
// FAILURE (mismatch)
// ============================================================================

#[derive(Debug, Clone, Error)]
#[error(
    "discrepancy found: balances move by {expected_net} but transactions net {}; not all transactions are accounted for",
    .flows.net
)]
pub struct ReconciliationFailure {
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    /// round(opening - closing)
    pub expected_net: Decimal,
    pub flows: Flows,
    /// Every parsed transaction, sorted by date
    pub transactions: Vec<Transaction>,
    /// Lines the transaction pattern matched but that could not be parsed
    pub unparsed_lines: Vec<LineFailure>,
}

impl ReconciliationFailure {
    /// `None` when the two sides are too far apart to subtract
    pub fn difference(&self) -> Option<Decimal> {
        self.expected_net.checked_sub(self.flows.net)
    }

    pub fn log_diagnostics(&self) {
        warn!("* the diff is: {} vs. {}", self.expected_net, self.flows.net);
        info!("* Opening reported at {}", self.opening_balance);
        info!("* Closing reported at {}", self.closing_balance);
        info!(
            "* Transactions (net/inflow/outflow): {}/{}/{}",
            self.flows.net, self.flows.inflow, self.flows.outflow
        );
        info!("* Parsed transactions:");
        for transaction in &self.transactions {
            info!("{}", transaction);
        }
        if !self.unparsed_lines.is_empty() {
            info!("* Unparsed lines:");
            for failure in &self.unparsed_lines {
                info!("{:?}: {}", failure.text, failure.error);
            }
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ReconciliationEngine {
    /// Rounding applied to both sides before comparing (default: 2)
    pub decimal_places: u32,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine { decimal_places: 2 }
    }

    /// Net, inflow and outflow totals, or `AmountOverflow` when a sum leaves
    /// the `Decimal` range
    pub fn flows(&self, transactions: &[Transaction]) -> Result<Flows, StatementError> {
        let sum = |pick: fn(&Transaction) -> bool| -> Result<Decimal, StatementError> {
            transactions
                .iter()
                .filter(|t| pick(t))
                .try_fold(Decimal::ZERO, |total, t| total.checked_add(t.amount))
                .map(|total| total.round_dp(self.decimal_places))
                .ok_or(StatementError::AmountOverflow)
        };

        Ok(Flows {
            net: sum(|_| true)?,
            inflow: sum(Transaction::is_inflow)?,
            outflow: sum(Transaction::is_outflow)?,
        })
    }

    /// Validate one statement's transactions against its reported balances.
    ///
    /// A missing balance is a hard failure: it is never treated as zero.
    pub fn reconcile(
        &self,
        opening_balance: Option<Decimal>,
        closing_balance: Option<Decimal>,
        transactions: &[Transaction],
        unparsed_lines: &[LineFailure],
    ) -> Result<ReconciliationReport, StatementError> {
        info!("Validating opening/closing balances against transactions...");

        let opening_balance =
            opening_balance.ok_or(StatementError::MissingBalance(BalanceKind::Opening))?;
        let closing_balance =
            closing_balance.ok_or(StatementError::MissingBalance(BalanceKind::Closing))?;

        let flows = self.flows(transactions)?;
        let expected_net = opening_balance
            .checked_sub(closing_balance)
            .ok_or(StatementError::AmountOverflow)?
            .round_dp(self.decimal_places);

        debug!(
            "opbal: {}, clbal: {}, net: {}",
            opening_balance, closing_balance, flows.net
        );

        if expected_net != flows.net {
            let mut sorted = transactions.to_vec();
            sorted.sort_by_key(|t| t.date);

            let failure = ReconciliationFailure {
                opening_balance,
                closing_balance,
                expected_net,
                flows,
                transactions: sorted,
                unparsed_lines: unparsed_lines.to_vec(),
            };
            failure.log_diagnostics();
            return Err(StatementError::Reconciliation(Box::new(failure)));
        }

        Ok(ReconciliationReport {
            opening_balance,
            closing_balance,
            flows,
            transaction_count: transactions.len(),
        })
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Institution;
    use crate::error::LineError;
    use chrono::NaiveDate;

    fn txn(day: u32, description: &str, cents: i64) -> Transaction {
        Transaction::new(
            Institution::Amex,
            None,
            NaiveDate::from_ymd_opt(2021, 11, day).unwrap(),
            description,
            Decimal::new(cents, 2),
        )
    }

    #[test]
    fn test_balanced_statement() {
        let engine = ReconciliationEngine::new();
        let transactions = vec![
            txn(3, "GROCERY", -9550),
            txn(1, "COFFEE", -450),
            txn(5, "PAYMENT", 50000),
        ];

        let report = engine
            .reconcile(
                Some(Decimal::new(100000, 2)),
                Some(Decimal::new(60000, 2)),
                &transactions,
                &[],
            )
            .unwrap();

        assert_eq!(report.flows.net, Decimal::new(40000, 2));
        assert_eq!(report.flows.inflow, Decimal::new(50000, 2));
        assert_eq!(report.flows.outflow, Decimal::new(-10000, 2));
        assert_eq!(report.transaction_count, 3);

        println!("✅ {}", report.summary());
    }

    #[test]
    fn test_mismatch_carries_sorted_diagnostics() {
        let engine = ReconciliationEngine::new();
        let transactions = vec![txn(9, "LATE", -1000), txn(2, "EARLY", -500)];
        let unparsed = vec![LineFailure {
            text: "Foo 99 Bar 98 MYSTERY 1.00".to_string(),
            error: LineError::UnrecognizedDate {
                token: "Foo 99 Bar 98".to_string(),
            },
        }];

        let err = engine
            .reconcile(
                Some(Decimal::new(0, 2)),
                Some(Decimal::new(1600, 2)),
                &transactions,
                &unparsed,
            )
            .unwrap_err();

        let failure = match err {
            StatementError::Reconciliation(failure) => failure,
            other => panic!("unexpected error: {other}"),
        };
        assert_eq!(failure.expected_net, Decimal::new(-1600, 2));
        assert_eq!(failure.flows.net, Decimal::new(-1500, 2));
        assert_eq!(failure.difference(), Some(Decimal::new(-100, 2)));
        assert_eq!(failure.transactions[0].description, "EARLY");
        assert_eq!(failure.unparsed_lines.len(), 1);
    }

    #[test]
    fn test_missing_opening_balance_is_an_error() {
        let engine = ReconciliationEngine::new();
        let err = engine
            .reconcile(None, Some(Decimal::ZERO), &[], &[])
            .unwrap_err();
        assert!(matches!(
            err,
            StatementError::MissingBalance(BalanceKind::Opening)
        ));
    }

    #[test]
    fn test_missing_closing_balance_is_an_error() {
        let engine = ReconciliationEngine::new();
        let err = engine
            .reconcile(Some(Decimal::ZERO), None, &[], &[])
            .unwrap_err();
        assert!(matches!(
            err,
            StatementError::MissingBalance(BalanceKind::Closing)
        ));
    }

    #[test]
    fn test_comparison_rounds_to_two_places() {
        let engine = ReconciliationEngine::new();
        let transactions = vec![txn(1, "FX FEE", -1), txn(1, "FX FEE 2", -1)];

        // -0.02 net against a 0.0200 balance delta
        let report = engine.reconcile(
            Some(Decimal::new(1000200, 4)),
            Some(Decimal::new(1000000, 4)),
            &transactions,
            &[],
        );
        assert!(report.is_err());

        let report = engine
            .reconcile(
                Some(Decimal::new(1000000, 4)),
                Some(Decimal::new(1000200, 4)),
                &transactions,
                &[],
            )
            .unwrap();
        assert_eq!(report.flows.net, Decimal::new(-2, 2));
    }

    #[test]
    fn test_empty_statement_with_unchanged_balance() {
        let engine = ReconciliationEngine::new();
        let report = engine
            .reconcile(Some(Decimal::new(1234, 2)), Some(Decimal::new(1234, 2)), &[], &[])
            .unwrap();
        assert_eq!(report.flows, Flows::default());
    }

    #[test]
    fn test_overflowing_sum_is_a_statement_error() {
        let engine = ReconciliationEngine::new();
        let huge = |day: u32| {
            Transaction::new(
                Institution::Amex,
                None,
                NaiveDate::from_ymd_opt(2021, 11, day).unwrap(),
                "HUGE",
                Decimal::MIN,
            )
        };
        let transactions = vec![huge(1), huge(2)];

        let err = engine.flows(&transactions).unwrap_err();
        assert!(matches!(err, StatementError::AmountOverflow));

        let err = engine
            .reconcile(Some(Decimal::ZERO), Some(Decimal::ZERO), &transactions, &[])
            .unwrap_err();
        assert!(matches!(err, StatementError::AmountOverflow));

        println!("✅ Overflow rejected: {}", err);
    }

    #[test]
    fn test_overflowing_balance_delta_is_a_statement_error() {
        let engine = ReconciliationEngine::new();
        let err = engine
            .reconcile(Some(Decimal::MAX), Some(Decimal::MIN), &[], &[])
            .unwrap_err();
        assert!(matches!(err, StatementError::AmountOverflow));
    }
}
