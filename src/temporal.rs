// ⏰ Statement Dates - Turning `Aug. 10` into a calendar date
//
// Transaction lines carry a month and a day but no year. The year comes from
// the statement header, and a statement that spans December→January has to
// push its January lines into the following year.

use crate::error::LineError;
use chrono::{Datelike, NaiveDate};

// ============================================================================
// DATE TOKENS
// ============================================================================

/// Accepted formats, tried in order.
/// `%d %b %Y` covers day-first layouts (`12 DEC`).
pub const DATE_FORMATS: [&str; 3] = ["%b %d %Y", "%m %d %Y", "%d %b %Y"];

/// Parse the `dates` capture of a transaction line.
///
/// Only the first date of the token is used (transaction date, not posting
/// date). `/` separators become spaces and dots after the month are dropped:
///
/// - `Aug. 10 Aug. 13` → `Aug 10 <year>`
/// - `03/13 03/15` → `03 13 <year>`
pub fn parse_statement_date(token: &str, year: Option<i32>) -> Result<NaiveDate, LineError> {
    let spaced = token.replace('/', " ");
    let parts: Vec<&str> = spaced.split_whitespace().take(2).collect();

    let year = year.ok_or_else(|| LineError::MissingYear {
        token: token.trim().to_string(),
    })?;

    if parts.len() < 2 {
        return Err(LineError::UnrecognizedDate {
            token: token.trim().to_string(),
        });
    }

    let candidate = format!("{} {} {}", parts[0].trim_matches('.'), parts[1], year);

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&candidate, format).ok())
        .ok_or_else(|| LineError::UnrecognizedDate {
            token: token.trim().to_string(),
        })
}

// ============================================================================
// YEAR ROLLOVER
// ============================================================================

/// Tracks one document's dates in order.
/// Once a December date has been seen, every later January date belongs to
/// the next year.
#[derive(Debug, Default, Clone)]
pub struct YearRollover {
    seen_december: bool,
}

impl YearRollover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adjust(&mut self, date: NaiveDate) -> NaiveDate {
        match date.month() {
            12 => {
                self.seen_december = true;
                date
            }
            1 if self.seen_december => date.with_year(date.year() + 1).unwrap_or(date),
            _ => date,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_abbreviated_month_with_dot() {
        assert_eq!(parse_statement_date("Aug. 10 Aug. 13 ", Some(2021)).unwrap(), ymd(2021, 8, 10));
    }

    #[test]
    fn test_abbreviated_month_without_dot() {
        assert_eq!(parse_statement_date("NOV 3 NOV 4 ", Some(2021)).unwrap(), ymd(2021, 11, 3));
    }

    #[test]
    fn test_numeric_month() {
        assert_eq!(parse_statement_date("03/13 03/15 ", Some(2022)).unwrap(), ymd(2022, 3, 13));
    }

    #[test]
    fn test_day_first() {
        assert_eq!(parse_statement_date("12 DEC", Some(2021)).unwrap(), ymd(2021, 12, 12));
    }

    #[test]
    fn test_day_first_needs_a_month_name() {
        // Numeric day-first tokens are not admitted by the day-first format
        for token in ["13 03", "31 12", "32 DEC"] {
            let err = parse_statement_date(token, Some(2021)).unwrap_err();
            assert!(matches!(err, LineError::UnrecognizedDate { .. }), "{}", token);
        }

        assert_eq!(parse_statement_date("03 JAN", Some(2022)).unwrap(), ymd(2022, 1, 3));
    }

    #[test]
    fn test_missing_year_is_a_line_error() {
        let err = parse_statement_date("Aug. 10 Aug. 13", None).unwrap_err();
        assert!(matches!(err, LineError::MissingYear { .. }));
    }

    #[test]
    fn test_unparseable_token() {
        let err = parse_statement_date("Foo 99 Bar 98", Some(2021)).unwrap_err();
        assert_eq!(
            err,
            LineError::UnrecognizedDate {
                token: "Foo 99 Bar 98".to_string()
            }
        );
    }

    #[test]
    fn test_rollover_after_december() {
        let mut rollover = YearRollover::new();
        assert_eq!(rollover.adjust(ymd(2021, 12, 30)), ymd(2021, 12, 30));
        assert_eq!(rollover.adjust(ymd(2021, 1, 5)), ymd(2022, 1, 5));
        assert_eq!(rollover.adjust(ymd(2021, 1, 6)), ymd(2022, 1, 6));
    }

    #[test]
    fn test_no_rollover_without_december() {
        let mut rollover = YearRollover::new();
        assert_eq!(rollover.adjust(ymd(2022, 1, 5)), ymd(2022, 1, 5));
        assert_eq!(rollover.adjust(ymd(2022, 2, 1)), ymd(2022, 2, 1));
    }
}
