// End-to-end checks over synthetic statement text for every supported layout

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use teller::{
    new_transactions, BatchRunner, ExtractError, FileOutcome, Institution, ParseOptions,
    PatternRegistry, SqliteStore, StatementParser, TextExtractor, Transaction, TransactionStore,
};

const BMO_2022: &str = "BMO Bank of Montreal
Mastercard statement
Card number 1234 5678 9010 4321
PERIOD COVERED BY THIS STATEMENT Dec. 15, 2021 - Jan. 14, 2022
Previous Balance $1,000.00
Dec. 20 Dec. 21 COFFEE SHOP 4.50
Dec. 30 Jan. 2 GROCERY STORE 95.50
Jan. 5 Jan. 6 PAYMENT RECEIVED - THANK YOU 500.00 CR
New Balance $600.00
";

const BMO: &str = "BMO Bank of Montreal
Account 01234-5678987
Statement period Nov. 15, 2021 to Dec. 14, 2021
Previous balance $250.00
Nov. 16 Nov. 17 BOOKSTORE 20.00
Nov. 20 Nov. 21 REFUND 5.00 CR
Total balance $265.00
";

const RBC: &str = "Royal Bank of Canada
RBC Visa statement 4500 1234 5678 9012
STATEMENT FROM DEC 10, 2021 TO JAN 09, 2022
Opening balance 300.00
12 DEC GAS STATION $40.00
03 JAN PAYMENT THANK YOU $100.00 CR
Closing balance $240.00
";

const MFC: &str = "Manulife Bank of Canada
Account 98765-4321012
Statement Period: Mar 01, 2022 to Mar 31, 2022
Previous Balance $0.00
03/13 03/15 PHARMACY $12.34
03/20 03/21 ONLINE STORE $45.66
New Balance $58.00
";

const TD: &str = "TD Canada Trust
TD Cash Back Visa 4520 XXXX XXXX 1111
Statement Period: Nov 15, 2021 to Dec 14, 2021
Previous Statement Balance $100.00
NOV 16 NOV 17 AMAZON.CA $25.00 $25.00
NOV 20 NOV 21 STREAMING SERVICE $15.00
DEC 1 DEC 2 PAYMENT - THANK YOU $100.00-
New Balance $40.00
";

const AMEX: &str = "AMEX Canada
Card Number XXXX XXXX XXXX 1005
Closing Date Nov 14, 2021
Previous Balance $200.00
OCT 20 OCT 21 RESTAURANT 60.00
OCT 25 OCT 25 CASH ADVANCE $20.00 FEE 3.50
NOV 1 NOV 1 PAYMENT RECEIVED 200.00 CR
New Balance $80.00
";

const TD_WITH_REPEATS: &str = "TD Canada Trust
Statement Period: Nov 15, 2021 to Dec 14, 2021
Previous Statement Balance $0.00
NOV 16 NOV 16 COFFEE $4.50
NOV 16 NOV 16 COFFEE $4.50
NOV 16 NOV 16 COFFEE $4.50
New Balance $13.50
";

fn samples() -> Vec<(Institution, &'static str)> {
    vec![
        (Institution::Bmo2022, BMO_2022),
        (Institution::Bmo, BMO),
        (Institution::Rbc, RBC),
        (Institution::Mfc, MFC),
        (Institution::Td, TD),
        (Institution::Amex, AMEX),
    ]
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn parse(text: &str) -> Vec<Transaction> {
    StatementParser::new(ParseOptions::default())
        .parse_statement(text)
        .unwrap()
        .into_transactions()
}

#[test]
fn test_every_institution_is_detected() {
    let parser = StatementParser::new(ParseOptions::default());
    for (institution, text) in samples() {
        assert_eq!(parser.detect_institution(text), Some(institution));
    }
}

#[test]
fn test_no_earlier_entry_claims_a_sample() {
    let registry = PatternRegistry::builtin();
    for (institution, text) in samples() {
        let position = registry
            .sets()
            .iter()
            .position(|set| set.institution == institution)
            .unwrap();

        for earlier in &registry.sets()[..position] {
            let claims = earlier.detect.is_match(text)
                && (!registry.has_sibling(earlier) || earlier.year.is_match(text));
            assert!(!claims, "{} claims the {} sample", earlier.institution, institution);
        }
    }
}

#[test]
fn test_every_sample_reconciles() {
    for (institution, text) in samples() {
        let parsed = StatementParser::new(ParseOptions::default())
            .parse_statement(text)
            .unwrap_or_else(|e| panic!("{} sample failed: {}", institution, e));

        let report = &parsed.report;
        assert_eq!(
            report.flows.net,
            report.opening_balance - report.closing_balance,
            "{}",
            institution
        );
        assert!(parsed.statement.unparsed_lines.is_empty(), "{}", institution);

        println!("✅ {}: {}", institution, report.summary());
    }
}

#[test]
fn test_rbc_day_first_dates_roll_into_january() {
    let transactions = parse(RBC);
    assert_eq!(transactions[0].date, ymd(2021, 12, 12));
    assert_eq!(transactions[0].amount, Decimal::new(-4000, 2));
    assert_eq!(transactions[1].date, ymd(2022, 1, 3));
    assert_eq!(transactions[1].amount, Decimal::new(10000, 2));
    assert_eq!(
        transactions[0].account_reference.as_deref(),
        Some("xxxx xxxx xxxx 9012")
    );
}

#[test]
fn test_mfc_numeric_dates_and_bank_account() {
    let transactions = parse(MFC);
    assert_eq!(transactions[0].date, ymd(2022, 3, 13));
    assert_eq!(transactions[0].description, "PHARMACY");
    assert_eq!(
        transactions[0].account_reference.as_deref(),
        Some("xxxxx-xxx1012")
    );
}

#[test]
fn test_td_trailing_minus_and_embedded_amount() {
    let transactions = parse(TD);

    assert_eq!(transactions[0].description, "AMAZON.CA");
    assert_eq!(transactions[0].amount, Decimal::new(-2500, 2));

    assert_eq!(transactions[2].description, "PAYMENT - THANK YOU");
    assert_eq!(transactions[2].amount, Decimal::new(10000, 2));
}

#[test]
fn test_same_statement_twice_is_set_equal() {
    for text in [TD_WITH_REPEATS, BMO_2022] {
        let first: HashSet<Transaction> = parse(text).into_iter().collect();
        let second: HashSet<Transaction> = parse(text).into_iter().collect();
        assert_eq!(first, second);

        // Disambiguation is deterministic, so unioning two passes adds nothing
        let union: HashSet<Transaction> = first.union(&second).cloned().collect();
        assert_eq!(union.len(), first.len());
    }
}

#[test]
fn test_repeated_charges_all_survive() {
    let descriptions: Vec<String> = parse(TD_WITH_REPEATS)
        .into_iter()
        .map(|t| t.description)
        .collect();
    assert_eq!(descriptions, vec!["COFFEE", "COFFEE 2", "COFFEE 3"]);
}

/// Serves canned text keyed by file name
struct CannedText(HashMap<&'static str, &'static str>);

impl TextExtractor for CannedText {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.0.get(name))
            .map(|text| text.to_string())
            .ok_or_else(|| ExtractError {
                path: path.to_path_buf(),
                message: "unreadable text layer".to_string(),
            })
    }
}

#[test]
fn test_batch_into_store_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("2021")).unwrap();

    let files = [
        ("2021/amex-nov.pdf", AMEX),
        ("2021/td-nov.pdf", TD),
        ("bmo-dec.pdf", BMO_2022),
        ("mismatch.pdf", "AMEX Canada\nClosing Date Nov 14, 2021\nPrevious Balance $0.00\nNOV 3 NOV 4 COFFEE 4.50\nNew Balance $9.99\n"),
        ("credit-union.pdf", "Friendly Credit Union\n"),
        ("corrupt.pdf", ""),
    ];
    let mut texts: HashMap<&'static str, &'static str> = HashMap::new();
    for (name, text) in files {
        fs::write(dir.path().join(name), b"%PDF-1.4").unwrap();
        let file_name = Path::new(name).file_name().unwrap().to_str().unwrap();
        if !text.is_empty() {
            texts.insert(file_name, text);
        }
    }

    let mut runner = BatchRunner::with_extractor(
        CannedText(texts),
        PatternRegistry::builtin(),
        ParseOptions::default(),
    );
    let report = runner.run(dir.path()).unwrap();

    assert_eq!(report.parsed_count(), 3);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.failed_count(), 2);
    assert_eq!(report.transactions.len(), 9);

    let mismatch = report
        .outcomes
        .iter()
        .find(|o| o.path().ends_with("mismatch.pdf"))
        .unwrap();
    assert!(matches!(mismatch, FileOutcome::Failed { .. }));

    let mut store = SqliteStore::open_in_memory().unwrap();
    store.ensure_schema().unwrap();

    let fresh = new_transactions(&report.transactions, &store.existing_transactions().unwrap());
    assert_eq!(fresh.len(), 9);
    assert_eq!(store.insert_transactions(&fresh).unwrap(), 9);

    let again = new_transactions(&report.transactions, &store.existing_transactions().unwrap());
    assert!(again.is_empty());

    println!("✅ Batch import is idempotent");
}
