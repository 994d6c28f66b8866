// 🌐 MariaDB Store - Same contract as SQLite, over the network
//
// sqlx is async; the importer is not. A current-thread tokio runtime owned by
// the store drives every query to completion before returning.

use crate::config::MariaDbConfig;
use crate::db::{Event, TransactionStore};
use crate::entities::Institution;
use crate::error::StoreError;
use crate::transaction::Transaction;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::collections::HashSet;
use std::str::FromStr;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

type StoredRow = (String, Option<String>, String, String, String);

pub struct MariaDbStore {
    runtime: Runtime,
    pool: MySqlPool,
}

impl MariaDbStore {
    pub fn connect(config: &MariaDbConfig) -> Result<Self, StoreError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        info!(
            "Connecting to MariaDB {}@{}:{}/{}",
            config.username, config.host, config.port, config.database
        );

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.database);

        let pool = runtime.block_on(
            MySqlPoolOptions::new()
                .max_connections(1)
                .connect_with(options),
        )?;

        Ok(MariaDbStore { runtime, pool })
    }
}

fn transaction_from_row(row: StoredRow) -> Result<Transaction, StoreError> {
    let (institution, account_reference, date, description, amount) = row;
    let corrupt = |what: &str, err: &dyn std::fmt::Display| {
        StoreError::CorruptRow(format!("{}: {}", what, err))
    };

    Ok(Transaction {
        institution: Institution::from_str(&institution).map_err(|e| corrupt("institution", &e))?,
        account_reference,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| corrupt("date", &e))?,
        description,
        amount: Decimal::from_str(&amount).map_err(|e| corrupt("amount", &e))?,
    })
}

impl TransactionStore for MariaDbStore {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        let pool = &self.pool;
        self.runtime.block_on(async {
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS transactions (
                    id BIGINT AUTO_INCREMENT PRIMARY KEY,
                    idempotency_hash CHAR(64) NOT NULL UNIQUE,
                    institution VARCHAR(16) NOT NULL,
                    account_number VARCHAR(32),
                    date VARCHAR(10) NOT NULL,
                    description TEXT NOT NULL,
                    amount_original VARCHAR(32) NOT NULL,
                    amount_numeric DOUBLE NOT NULL,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                    INDEX idx_date (date),
                    INDEX idx_institution (institution)
                )",
            )
            .execute(pool)
            .await?;

            sqlx::query(
                "CREATE TABLE IF NOT EXISTS events (
                    id BIGINT AUTO_INCREMENT PRIMARY KEY,
                    event_id CHAR(36) NOT NULL UNIQUE,
                    timestamp VARCHAR(40) NOT NULL,
                    event_type VARCHAR(64) NOT NULL,
                    entity_id CHAR(64) NOT NULL,
                    data TEXT NOT NULL,
                    actor VARCHAR(64) NOT NULL,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                    INDEX idx_events_entity (entity_id)
                )",
            )
            .execute(pool)
            .await?;

            Ok::<(), StoreError>(())
        })
    }

    fn existing_transactions(&mut self) -> Result<HashSet<Transaction>, StoreError> {
        let rows: Vec<StoredRow> = self.runtime.block_on(
            sqlx::query_as(
                "SELECT institution, account_number, date, description, amount_original
                 FROM transactions",
            )
            .fetch_all(&self.pool),
        )?;

        debug!("{} transactions already stored", rows.len());
        rows.into_iter().map(transaction_from_row).collect()
    }

    fn insert_transactions(&mut self, transactions: &[Transaction]) -> Result<usize, StoreError> {
        let pool = &self.pool;
        let inserted = self.runtime.block_on(async {
            let mut tx = pool.begin().await?;
            let mut inserted = 0usize;

            for transaction in transactions {
                let hash = transaction.idempotency_hash();

                let result = sqlx::query(
                    "INSERT IGNORE INTO transactions (
                        idempotency_hash, institution, account_number, date, description,
                        amount_original, amount_numeric
                    ) VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&hash)
                .bind(transaction.institution.code())
                .bind(transaction.account_reference.as_deref())
                .bind(transaction.date.to_string())
                .bind(&transaction.description)
                .bind(transaction.amount.to_string())
                .bind(transaction.amount.to_f64().unwrap_or_default())
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    continue;
                }
                inserted += 1;

                let event = Event::transaction_added(&hash, transaction);
                sqlx::query(
                    "INSERT INTO events (event_id, timestamp, event_type, entity_id, data, actor)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(&event.event_id)
                .bind(event.timestamp.to_rfc3339())
                .bind(&event.event_type)
                .bind(&event.entity_id)
                .bind(serde_json::to_string(&event.data)?)
                .bind(&event.actor)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok::<usize, StoreError>(inserted)
        })?;

        info!("✓ Inserted: {} transactions", inserted);
        info!("✓ Skipped duplicates: {}", transactions.len() - inserted);
        Ok(inserted)
    }
}
