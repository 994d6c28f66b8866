// 🗄️ Transaction Store - Where new transactions end up
//
// The parser only produces candidates. A store answers "what is already
// known?" and accepts the difference. Inserts are idempotent: the SHA-256
// of the five identity fields is a UNIQUE column, so importing the same
// statement twice adds nothing.

use crate::entities::Institution;
use crate::error::StoreError;
use crate::transaction::{sort_chronologically, Transaction};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

// ============================================================================
// STORE CONTRACT
// ============================================================================

pub trait TransactionStore {
    /// Create tables and indexes if missing
    fn ensure_schema(&mut self) -> Result<(), StoreError>;

    /// Every stored transaction; an empty store yields an empty set
    fn existing_transactions(&mut self) -> Result<HashSet<Transaction>, StoreError>;

    /// Insert, skipping anything already stored. Returns rows added.
    fn insert_transactions(&mut self, transactions: &[Transaction]) -> Result<usize, StoreError>;
}

/// Transactions in `found` that are not in `existing`, chronologically
pub fn new_transactions(
    found: &HashSet<Transaction>,
    existing: &HashSet<Transaction>,
) -> Vec<Transaction> {
    let mut fresh: Vec<Transaction> = found.difference(existing).cloned().collect();
    sort_chronologically(&mut fresh);
    fresh
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for audit trail: one per stored transaction
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    /// Idempotency hash of the transaction concerned
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(event_type: &str, entity_id: &str, data: serde_json::Value, actor: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }

    pub fn transaction_added(hash: &str, transaction: &Transaction) -> Self {
        Event::new(
            "transaction_added",
            hash,
            serde_json::json!({
                "institution": transaction.institution.code(),
                "date": transaction.date.to_string(),
                "amount": transaction.amount.to_string(),
            }),
            "statement_importer",
        )
    }
}

// ============================================================================
// SQLITE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening SQLite database {}", path.display());
        Ok(SqliteStore {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(SqliteStore {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Audit events for one transaction hash, newest first
    pub fn events_for(&self, entity_id: &str) -> Result<Vec<Event>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_id, data, actor
             FROM events
             WHERE entity_id = ?1
             ORDER BY timestamp DESC",
        )?;

        let rows = stmt
            .query_map(params![entity_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(event_id, timestamp, event_type, entity_id, data, actor)| {
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| StoreError::CorruptRow(format!("event timestamp: {}", e)))?
                    .with_timezone(&Utc);
                Ok(Event {
                    event_id,
                    timestamp,
                    event_type,
                    entity_id,
                    data: serde_json::from_str(&data)?,
                    actor,
                })
            })
            .collect()
    }
}

fn insert_event(conn: &Connection, event: &Event) -> Result<(), StoreError> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let institution: String = row.get(0)?;
    let date: String = row.get(2)?;
    let amount: String = row.get(4)?;

    Ok(Transaction {
        institution: Institution::from_str(&institution).map_err(|e| conversion_error(0, e))?,
        account_reference: row.get(1)?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| conversion_error(2, e))?,
        description: row.get(3)?,
        amount: Decimal::from_str(&amount).map_err(|e| conversion_error(4, e))?,
    })
}

impl TransactionStore for SqliteStore {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        // Enable WAL mode for crash recovery
        let mode: String =
            self.conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("SQLite journal mode: {}", mode);

        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                idempotency_hash TEXT UNIQUE NOT NULL,
                institution TEXT NOT NULL,
                account_number TEXT,
                date TEXT NOT NULL,
                description TEXT NOT NULL,
                amount_original TEXT NOT NULL,
                amount_numeric REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT UNIQUE NOT NULL,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                data TEXT NOT NULL,
                actor TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_date ON transactions(date);
            CREATE INDEX IF NOT EXISTS idx_institution ON transactions(institution);
            CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_id);",
        )?;

        Ok(())
    }

    fn existing_transactions(&mut self) -> Result<HashSet<Transaction>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT institution, account_number, date, description, amount_original
             FROM transactions",
        )?;

        let existing = stmt
            .query_map([], transaction_from_row)?
            .collect::<Result<HashSet<_>, _>>()?;

        debug!("{} transactions already stored", existing.len());
        Ok(existing)
    }

    fn insert_transactions(&mut self, transactions: &[Transaction]) -> Result<usize, StoreError> {
        let mut inserted = 0;
        let mut duplicates = 0;

        let tx = self.conn.transaction()?;
        for transaction in transactions {
            let hash = transaction.idempotency_hash();

            let result = tx.execute(
                "INSERT INTO transactions (
                    idempotency_hash, institution, account_number, date, description,
                    amount_original, amount_numeric
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    hash,
                    transaction.institution.code(),
                    transaction.account_reference,
                    transaction.date.to_string(),
                    transaction.description,
                    transaction.amount.to_string(),
                    transaction.amount.to_f64().unwrap_or_default(),
                ],
            );

            match result {
                Ok(_) => {
                    inserted += 1;
                    insert_event(&tx, &Event::transaction_added(&hash, transaction))?;
                }
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    duplicates += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        tx.commit()?;

        info!("✓ Inserted: {} transactions", inserted);
        info!("✓ Skipped duplicates: {}", duplicates);

        Ok(inserted)
    }
}
