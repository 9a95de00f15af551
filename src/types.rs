use std::fmt;

use serde::{Deserialize, Serialize};

/// Geography dimension of national batches, dropped from every lookup key
pub const NATIONAL_DIMENSION: &str = "nat";

/// Geography dimension of area-level batches
pub const AREA_DIMENSION: &str = "ltla";

/// Raw cell id meaning "does not apply", never reported as an output category
pub const NOT_APPLICABLE_CELL: &str = "-8";

/// Marker written in place of figures withheld for disclosure control
pub const BLOCKED_MARKER: &str = "blocked";

/// Family whose output variants are reported even when an input shares the family
pub const DEFAULT_SHARED_FAMILY: &str = "resident_age";

/// Population a classification is published under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PopulationType {
    /// Usual residents
    #[serde(rename = "UR")]
    Residents,
    /// Usual residents in households
    #[serde(rename = "UR_HH")]
    Households,
}

impl PopulationType {
    pub const ALL: [PopulationType; 2] = [PopulationType::Residents, PopulationType::Households];

    pub fn as_str(&self) -> &'static str {
        match self {
            PopulationType::Residents => "UR",
            PopulationType::Households => "UR_HH",
        }
    }
}

impl fmt::Display for PopulationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type for the application
pub type Result<T> = std::result::Result<T, crate::error::Error>;
