// 🧾 Transaction - Canonical record produced by the statement parser
//
// Identity is the full value: two transactions are the same transaction iff
// institution, account, date, description and amount all match. There is no
// surrogate id at this layer.

use crate::entities::Institution;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub institution: Institution,

    /// Redacted account or card number, e.g. `xxxx xxxx xxxx 4321`
    pub account_reference: Option<String>,

    pub date: NaiveDate,

    pub description: String,

    /// Negative = outflow (purchase/charge), positive = inflow (payment/credit)
    pub amount: Decimal,
}

impl Transaction {
    pub fn new(
        institution: Institution,
        account_reference: Option<String>,
        date: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Transaction {
            institution,
            account_reference,
            date,
            description: description.into(),
            amount,
        }
    }

    /// Copy of this transaction with a different description
    pub fn with_description(&self, description: impl Into<String>) -> Self {
        Transaction {
            description: description.into(),
            ..self.clone()
        }
    }

    pub fn is_inflow(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_outflow(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// SHA-256 over the five identity fields.
    /// Used as the UNIQUE key in storage; amounts are normalized so 4.5 and
    /// 4.50 hash the same, matching `Eq`.
    pub fn idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}",
            self.institution.code(),
            self.account_reference.as_deref().unwrap_or(""),
            self.date,
            self.description,
            self.amount.normalize()
        ));
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {})",
            self.amount,
            self.date,
            self.institution,
            self.account_reference.as_deref().unwrap_or("-"),
            self.description
        )
    }
}

/// Stable report order: date, institution, description, amount
pub fn sort_chronologically(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| {
        (a.date, a.institution, &a.description, a.amount)
            .cmp(&(b.date, b.institution, &b.description, b.amount))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn coffee(amount: Decimal) -> Transaction {
        Transaction::new(
            Institution::Bmo,
            Some("xxxx xxxx xxxx 4321".to_string()),
            NaiveDate::from_ymd_opt(2021, 12, 20).unwrap(),
            "COFFEE SHOP",
            amount,
        )
    }

    #[test]
    fn test_equality_covers_all_fields() {
        let a = coffee(Decimal::new(-450, 2));
        assert_eq!(a, coffee(Decimal::new(-450, 2)));
        assert_ne!(a, a.with_description("COFFEE SHOP 2"));

        let mut other_account = a.clone();
        other_account.account_reference = None;
        assert_ne!(a, other_account);
    }

    #[test]
    fn test_scale_does_not_affect_identity() {
        let a = coffee(Decimal::new(-450, 2));
        let b = coffee(Decimal::new(-45, 1));

        let set: HashSet<Transaction> = [a.clone(), b.clone()].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert_eq!(a.idempotency_hash(), b.idempotency_hash());
    }

    #[test]
    fn test_idempotency_hash_is_sha256_hex() {
        let hash = coffee(Decimal::new(-450, 2)).idempotency_hash();
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, coffee(Decimal::new(-451, 2)).idempotency_hash());
    }

    #[test]
    fn test_flow_direction() {
        assert!(coffee(Decimal::new(-450, 2)).is_outflow());
        assert!(coffee(Decimal::new(50000, 2)).is_inflow());
    }
}
