// 📤 CSV Export - New transactions in a spreadsheet-friendly file

use crate::transaction::Transaction;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Write transactions with a header row:
/// `institution,account_reference,date,description,amount`
pub fn write_csv(path: &Path, transactions: &[Transaction]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;

    for transaction in transactions {
        writer
            .serialize(transaction)
            .context("Failed to serialize transaction")?;
    }
    writer.flush().context("Failed to flush CSV file")?;

    info!("Exported {} transactions to {}", transactions.len(), path.display());
    Ok(transactions.len())
}

/// Read back a file produced by `write_csv`
pub fn read_csv(path: &Path) -> Result<Vec<Transaction>> {
    let mut reader = csv::Reader::from_path(path).context("Failed to open CSV file")?;

    reader
        .deserialize()
        .map(|row| row.context("Failed to deserialize transaction"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Institution;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::fs;

    #[test]
    fn test_export_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.csv");

        let transactions = vec![
            Transaction::new(
                Institution::Bmo2022,
                Some("xxxx xxxx xxxx 4321".to_string()),
                NaiveDate::from_ymd_opt(2021, 12, 20).unwrap(),
                "COFFEE SHOP",
                Decimal::new(-450, 2),
            ),
            Transaction::new(
                Institution::Amex,
                None,
                NaiveDate::from_ymd_opt(2021, 11, 1).unwrap(),
                "PAYMENT RECEIVED",
                Decimal::new(20000, 2),
            ),
        ];

        assert_eq!(write_csv(&path, &transactions).unwrap(), 2);

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("institution,account_reference,date,description,amount")
        );
        assert_eq!(
            lines.next(),
            Some("BMO_2022,xxxx xxxx xxxx 4321,2021-12-20,COFFEE SHOP,-4.50")
        );

        assert_eq!(read_csv(&path).unwrap(), transactions);
    }
}
