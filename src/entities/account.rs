// 💳 Account Shapes - How account numbers look on a statement
//
// A statement shows either a credit-card style number (four groups of four)
// or a bank account number (five digits, hyphen, seven digits). Only the last
// four digits are ever kept.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountShape {
    /// `1234 5678 9010 4321` or `XXXX XXXX XXXX 4321`
    CreditCard,

    /// `01234-5678987`
    BankAccount,
}

impl AccountShape {
    /// Shapes in the order they are tried
    pub const ALL: [AccountShape; 2] = [AccountShape::CreditCard, AccountShape::BankAccount];

    /// Regex with a single `account_number` capture
    pub fn pattern(&self) -> &'static str {
        match self {
            AccountShape::CreditCard => r"(?P<account_number>(?:X{4} |[0-9]{4} ){3}[0-9]{4})",
            AccountShape::BankAccount => r"(?P<account_number>[0-9]{5}-[0-9]{7})",
        }
    }

    fn mask(&self) -> &'static str {
        match self {
            AccountShape::CreditCard => "xxxx xxxx xxxx ",
            AccountShape::BankAccount => "xxxxx-xxx",
        }
    }

    /// Mask everything but the last four digits
    pub fn redact(&self, account_number: &str) -> String {
        let digits: Vec<char> = account_number
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
        format!("{}{}", self.mask(), tail)
    }
}
