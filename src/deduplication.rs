// 🔍 Deduplication - Keeping repeated charges without losing any
//
// Two identical coffees on the same day are two real transactions. When a
// newly built transaction equals one already collected for the statement, it
// is kept under an amended description (`COFFEE 2`) unless an operator
// explicitly rejects it in interactive mode.

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use tracing::{debug, info, warn};

// ============================================================================
// POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Keep every duplicate with a numbered description suffix
    #[default]
    AutoDisambiguate,

    /// Ask the operator whether to keep each duplicate
    Interactive,
}

/// Operator decision seam for interactive mode
pub trait DuplicatePrompt {
    /// `true` keeps the duplicate (with a suffix), `false` discards it
    fn keep_duplicate(&mut self, transaction: &Transaction) -> bool;
}

/// Asks on stdout, answers on stdin; only `y` keeps the duplicate
pub struct StdinPrompt;

impl DuplicatePrompt for StdinPrompt {
    fn keep_duplicate(&mut self, transaction: &Transaction) -> bool {
        print!(
            "Duplicate transaction found for {}, on {} for {}. Do you want to add this again? ",
            transaction.description, transaction.date, transaction.amount
        );
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
            Err(err) => {
                warn!("Could not read duplicate prompt answer: {}", err);
                false
            }
        }
    }
}

// ============================================================================
// TRANSACTION SET
// ============================================================================

/// Insertion-ordered set of transactions
#[derive(Debug, Default, Clone)]
pub struct TransactionSet {
    order: Vec<Transaction>,
    index: HashSet<Transaction>,
}

impl TransactionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, transaction: &Transaction) -> bool {
        self.index.contains(transaction)
    }

    /// Returns `false` (and changes nothing) if already present
    pub fn insert(&mut self, transaction: Transaction) -> bool {
        if !self.index.insert(transaction.clone()) {
            return false;
        }
        self.order.push(transaction);
        true
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.order
    }

    pub fn into_vec(self) -> Vec<Transaction> {
        self.order
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Not a duplicate; added as-is
    Unique,

    /// Duplicate kept under a new description
    Disambiguated { description: String },

    /// Duplicate discarded by the operator
    Rejected,
}

pub struct DuplicateResolver {
    policy: DuplicatePolicy,
    prompt: Box<dyn DuplicatePrompt>,
}

impl DuplicateResolver {
    /// Interactive policy prompts on the terminal
    pub fn new(policy: DuplicatePolicy) -> Self {
        DuplicateResolver {
            policy,
            prompt: Box::new(StdinPrompt),
        }
    }

    pub fn with_prompt(policy: DuplicatePolicy, prompt: Box<dyn DuplicatePrompt>) -> Self {
        DuplicateResolver { policy, prompt }
    }

    /// Add `transaction` to `set`, resolving a collision according to policy.
    ///
    /// The suffix counter starts at 2 and keeps counting until the amended
    /// description is unique, so a third identical line becomes `... 3`.
    pub fn admit(&mut self, set: &mut TransactionSet, transaction: Transaction) -> Resolution {
        if !set.contains(&transaction) {
            set.insert(transaction);
            return Resolution::Unique;
        }

        let keep = match self.policy {
            DuplicatePolicy::AutoDisambiguate => {
                debug!("Duplicate override enabled, keeping {}", transaction);
                true
            }
            DuplicatePolicy::Interactive => {
                warn!(
                    "Duplicate transaction found for {} on {} for {}",
                    transaction.description, transaction.date, transaction.amount
                );
                self.prompt.keep_duplicate(&transaction)
            }
        };

        if !keep {
            info!("Ignoring duplicate {}", transaction);
            return Resolution::Rejected;
        }

        let mut suffix = 2u32;
        let renamed = loop {
            let candidate =
                transaction.with_description(format!("{} {}", transaction.description, suffix));
            if !set.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };

        let description = renamed.description.clone();
        set.insert(renamed);
        Resolution::Disambiguated { description }
    }
}

impl Default for DuplicateResolver {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Institution;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::collections::VecDeque;

    /// Answers from a script; says no once the script runs out
    struct ScriptedPrompt {
        answers: VecDeque<bool>,
    }

    impl DuplicatePrompt for ScriptedPrompt {
        fn keep_duplicate(&mut self, _transaction: &Transaction) -> bool {
            self.answers.pop_front().unwrap_or(false)
        }
    }

    fn coffee() -> Transaction {
        Transaction::new(
            Institution::Td,
            None,
            NaiveDate::from_ymd_opt(2021, 11, 3).unwrap(),
            "COFFEE",
            Decimal::new(-450, 2),
        )
    }

    #[test]
    fn test_unique_is_added_unchanged() {
        let mut resolver = DuplicateResolver::default();
        let mut set = TransactionSet::new();

        assert_eq!(resolver.admit(&mut set, coffee()), Resolution::Unique);
        assert_eq!(set.as_slice(), &[coffee()]);
    }

    #[test]
    fn test_auto_disambiguate_keeps_both() {
        let mut resolver = DuplicateResolver::default();
        let mut set = TransactionSet::new();

        resolver.admit(&mut set, coffee());
        let resolution = resolver.admit(&mut set, coffee());

        assert_eq!(
            resolution,
            Resolution::Disambiguated {
                description: "COFFEE 2".to_string()
            }
        );
        assert_eq!(set.as_slice().len(), 2);
        assert_eq!(set.as_slice()[1].description, "COFFEE 2");
    }

    #[test]
    fn test_third_collision_gets_next_suffix() {
        let mut resolver = DuplicateResolver::default();
        let mut set = TransactionSet::new();

        for _ in 0..3 {
            resolver.admit(&mut set, coffee());
        }

        let descriptions: Vec<&str> = set.as_slice().iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, vec!["COFFEE", "COFFEE 2", "COFFEE 3"]);
    }

    #[test]
    fn test_interactive_reject_discards() {
        let prompt = ScriptedPrompt {
            answers: VecDeque::from(vec![false]),
        };
        let mut resolver = DuplicateResolver::with_prompt(DuplicatePolicy::Interactive, Box::new(prompt));
        let mut set = TransactionSet::new();

        resolver.admit(&mut set, coffee());
        assert_eq!(resolver.admit(&mut set, coffee()), Resolution::Rejected);
        assert_eq!(set.as_slice().len(), 1);
    }

    #[test]
    fn test_interactive_accept_disambiguates() {
        let prompt = ScriptedPrompt {
            answers: VecDeque::from(vec![true]),
        };
        let mut resolver = DuplicateResolver::with_prompt(DuplicatePolicy::Interactive, Box::new(prompt));
        let mut set = TransactionSet::new();

        resolver.admit(&mut set, coffee());
        assert!(matches!(
            resolver.admit(&mut set, coffee()),
            Resolution::Disambiguated { .. }
        ));
        assert_eq!(set.as_slice().len(), 2);
    }

    #[test]
    fn test_transaction_set_keeps_insertion_order() {
        let mut set = TransactionSet::new();
        let later = coffee().with_description("TEA");
        assert!(set.insert(later.clone()));
        assert!(set.insert(coffee()));
        assert!(!set.insert(coffee()));
        assert_eq!(set.into_vec(), vec![later, coffee()]);
    }
}
