// 🏦 Institution - Closed set of supported statement layouts
//
// Each variant is one key of the pattern registry. Two revisions of the same
// bank's layout are two variants (BMO and BMO_2022).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// INSTITUTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Institution {
    #[serde(rename = "BMO_2022")]
    Bmo2022,
    #[serde(rename = "BMO")]
    Bmo,
    #[serde(rename = "RBC")]
    Rbc,
    #[serde(rename = "MFC")]
    Mfc,
    #[serde(rename = "TD")]
    Td,
    #[serde(rename = "AMEX")]
    Amex,
}

impl Institution {
    /// Every institution, in registry (detection) order
    pub const ALL: [Institution; 6] = [
        Institution::Bmo2022,
        Institution::Bmo,
        Institution::Rbc,
        Institution::Mfc,
        Institution::Td,
        Institution::Amex,
    ];

    /// Stable code stored in the database
    pub fn code(&self) -> &'static str {
        match self {
            Institution::Bmo2022 => "BMO_2022",
            Institution::Bmo => "BMO",
            Institution::Rbc => "RBC",
            Institution::Mfc => "MFC",
            Institution::Td => "TD",
            Institution::Amex => "AMEX",
        }
    }

    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            Institution::Bmo2022 => "Bank of Montreal (2022 layout)",
            Institution::Bmo => "Bank of Montreal",
            Institution::Rbc => "Royal Bank of Canada",
            Institution::Mfc => "Manulife",
            Institution::Td => "TD Canada Trust",
            Institution::Amex => "American Express",
        }
    }
}

impl fmt::Display for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown institution code: {0}")]
pub struct UnknownInstitution(pub String);

impl FromStr for Institution {
    type Err = UnknownInstitution;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Institution::ALL
            .iter()
            .copied()
            .find(|i| i.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownInstitution(s.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
