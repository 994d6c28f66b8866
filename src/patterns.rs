// 🗂️ Pattern Registry - Statement layouts as data
//
// One `PatternSpec` per institution: five regexes plus two flags. The parser
// runs a single generic algorithm over whichever set matches, so supporting a
// new layout means adding one entry to `BUILTIN_SPECS` and one enum variant.
//
// Capture-group contract:
//   detect           -> any match
//   transaction      -> `dates`, `description`, `amount`, optional `cr`
//   year             -> `year`
//   opening/closing  -> `balance`, optional `cr`

use crate::entities::{AccountShape, Institution};
use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

// ============================================================================
// RAW SPECS (static data)
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct PatternSpec {
    pub institution: Institution,

    /// Layout family. Entries sharing a family (two revisions of one bank)
    /// are told apart by their year pattern.
    pub family: &'static str,

    pub detect: &'static str,
    pub transaction: &'static str,
    pub year: &'static str,
    pub opening_balance: &'static str,
    pub closing_balance: &'static str,

    /// Whether descriptions may carry a `$` amount that should replace the
    /// line amount
    pub embedded_amounts: bool,
}

/// Amount embedded in a description (`... $12.34 ...`)
pub const EMBEDDED_AMOUNT: &str = r"(?P<amount>-?\$[\d,]+\.\d{2}-?)(?P<cr>-|\s?CR)?";

pub const BUILTIN_SPECS: &[PatternSpec] = &[
    PatternSpec {
        institution: Institution::Bmo2022,
        family: "BMO",
        detect: r"^BMO",
        transaction: concat!(
            r"^(?P<dates>(?:\w{3}\.? \d{1,2}\s*){2})",
            r"(?P<description>.+)\s",
            r"(?P<amount>-?[\d,]+\.\d{2})(?P<cr>-|\s*CR)?"
        ),
        year: r"PERIOD COVERED BY THIS STATEMENT\s\w+\.?\s\d+,\s(?P<year>[0-9]{4})",
        opening_balance: r"Previous Balance.*(?P<balance>-?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?",
        closing_balance: r"New Balance\s.*(?P<balance>-?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?",
        embedded_amounts: true,
    },
    PatternSpec {
        institution: Institution::Bmo,
        family: "BMO",
        detect: r"^BMO",
        transaction: concat!(
            r"^(?P<dates>(?:\w{3}\.? \d{1,2}\s*){2})",
            r"(?P<description>.+)\s",
            r"(?P<amount>-?[\d,]+\.\d{2})(?P<cr>-|\s*CR)?"
        ),
        year: r"Statement period\s\w+\.?\s\d+,\s(?P<year>[0-9]{4})",
        opening_balance: r"Previous balance.*(?P<balance>-?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?",
        closing_balance: r"Total balance\s.*(?P<balance>-?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?",
        // BMO never prints currency inside descriptions
        embedded_amounts: false,
    },
    PatternSpec {
        institution: Institution::Rbc,
        family: "RBC",
        detect: r"^Royal Bank of Canada",
        transaction: concat!(
            r"(?P<dates>\d{2} \w{3}) ",
            r"(?P<description>.+)\s",
            r"(?P<amount>-?\$[\d,]+\.\d{2}-?)(?P<cr>-|\s?CR)?"
        ),
        year: r"STATEMENT FROM .+?,.(?P<year>[0-9]{4})",
        opening_balance: r"Opening balance (?P<balance>[+-]?[0-9]{1,3}(?:,?[0-9]{3})*\.[0-9]{2})(?P<cr>-|\s?CR)?",
        closing_balance: r"Closing balance \$?(?P<balance>[+-]?[0-9]{1,3}(?:,?[0-9]{3})*\.[0-9]{2})(?P<cr>-|\s?CR)?",
        embedded_amounts: true,
    },
    PatternSpec {
        institution: Institution::Mfc,
        family: "MFC",
        detect: r"^Manulife",
        transaction: concat!(
            r"^(?P<dates>(?:\d{2}/\d{2} ){2})",
            r"(?P<description>.+)\s",
            r"(?P<amount>-?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?"
        ),
        year: r"Statement Period: .+?,.(?P<year>[0-9]{4})",
        opening_balance: r"Previous Balance (?P<balance>-?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?",
        closing_balance: r"New Balance (?P<balance>-?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?",
        embedded_amounts: true,
    },
    PatternSpec {
        institution: Institution::Td,
        family: "TD",
        detect: r"^TD",
        transaction: concat!(
            r"(?P<dates>(?:\w{3} \d{1,2} ){2})",
            r"(?P<description>.+)\s",
            r"(?P<amount>-?\$[\d,]+\.\d{2}-?)(?P<cr>-|\s?CR)?"
        ),
        year: r"Statement Period: .+?,.(?P<year>[0-9]{4})",
        opening_balance: r"Previous (?:Statement|Account) Balance (?P<balance>-?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?",
        closing_balance: r"(?:New|Credit) Balance (?P<balance>-?\s?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?",
        embedded_amounts: true,
    },
    PatternSpec {
        institution: Institution::Amex,
        family: "AMEX",
        detect: r"^AMEX",
        transaction: concat!(
            r"(?P<dates>(?:\w{3} \d{1,2} ){2})",
            r"(?P<description>.+)\s",
            r"(?P<amount>-?[\d,]+\.\d{2}-?)(?P<cr>-|\s?CR)?"
        ),
        year: r",.(?P<year>[0-9]{4})",
        opening_balance: r"Previous Balance (?P<balance>-?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?",
        closing_balance: r"(?:New|Credit) Balance (?P<balance>-?\s?\$[\d,]+\.\d{2})(?P<cr>-|\s?CR)?",
        embedded_amounts: true,
    },
];

// ============================================================================
// COMPILED PATTERN SETS
// ============================================================================

#[derive(Debug, Clone)]
pub struct PatternSet {
    pub institution: Institution,
    pub family: &'static str,
    pub detect: Regex,
    pub transaction: Regex,
    pub year: Regex,
    pub opening_balance: Regex,
    pub closing_balance: Regex,
    pub embedded_amounts: bool,
}

impl PatternSet {
    /// Compile one spec.
    /// Detection, year and balance patterns are case-insensitive; the
    /// transaction pattern is line-anchored and case-sensitive.
    pub fn compile(spec: &PatternSpec) -> Result<Self, regex::Error> {
        Ok(PatternSet {
            institution: spec.institution,
            family: spec.family,
            detect: insensitive(spec.detect)?,
            transaction: RegexBuilder::new(spec.transaction)
                .multi_line(true)
                .build()?,
            year: insensitive(spec.year)?,
            opening_balance: insensitive(spec.opening_balance)?,
            closing_balance: insensitive(spec.closing_balance)?,
            embedded_amounts: spec.embedded_amounts,
        })
    }
}

fn insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Debug, Clone)]
pub struct PatternRegistry {
    sets: Vec<PatternSet>,
    account_shapes: Vec<(AccountShape, Regex)>,
    embedded_amount: Regex,
}

impl PatternRegistry {
    /// Compile a registry from specs, keeping their order
    pub fn from_specs(specs: &[PatternSpec]) -> Result<Self, regex::Error> {
        let sets = specs
            .iter()
            .map(PatternSet::compile)
            .collect::<Result<Vec<_>, _>>()?;

        let account_shapes = AccountShape::ALL
            .iter()
            .map(|shape| Ok((*shape, insensitive(shape.pattern())?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(PatternRegistry {
            sets,
            account_shapes,
            embedded_amount: Regex::new(EMBEDDED_AMOUNT)?,
        })
    }

    /// The built-in registry, compiled once
    pub fn builtin() -> &'static PatternRegistry {
        static REGISTRY: OnceLock<PatternRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            PatternRegistry::from_specs(BUILTIN_SPECS).expect("built-in statement patterns compile")
        })
    }

    /// Pattern sets in detection order
    pub fn sets(&self) -> &[PatternSet] {
        &self.sets
    }

    pub fn get(&self, institution: Institution) -> Option<&PatternSet> {
        self.sets.iter().find(|s| s.institution == institution)
    }

    pub fn account_shapes(&self) -> &[(AccountShape, Regex)] {
        &self.account_shapes
    }

    pub fn embedded_amount(&self) -> &Regex {
        &self.embedded_amount
    }

    /// True when another entry shares this set's layout family
    pub fn has_sibling(&self, set: &PatternSet) -> bool {
        self.sets
            .iter()
            .any(|other| other.institution != set.institution && other.family == set.family)
    }
}
