// Entity Models
// Closed sets the statement parser keys on: which institution issued a
// statement, and which shape its account number takes.

pub mod institution;
pub mod account;

pub use institution::{Institution, UnknownInstitution};
pub use account::AccountShape;
