use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::Error;
use crate::types::Result;

/// Upper bound used for open-ended "and over" bands
pub const OPEN_UPPER_AGE: u32 = 999;

static AND_UNDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Aged ([0-9]+) years and under$").unwrap());

static RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Aged ([0-9]+) to ([0-9]+) years$").unwrap());

static SINGLE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Aged ([0-9]+) years$").unwrap());

static AND_OVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Aged ([0-9]+) years and over$").unwrap());

/// Inclusive age range of an age-band category, serialized as `[lower, upper]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBand {
    pub lower: u32,
    pub upper: u32,
}

impl Serialize for AgeBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [self.lower, self.upper].serialize(serializer)
    }
}

/// Parse a category label such as "Aged 10 to 14 years"
pub fn parse_age_band(text: &str) -> Result<AgeBand> {
    if let Some(caps) = AND_UNDER.captures(text) {
        return Ok(AgeBand {
            lower: 0,
            upper: parse_age(&caps[1], text)?,
        });
    }
    if let Some(caps) = RANGE.captures(text) {
        return Ok(AgeBand {
            lower: parse_age(&caps[1], text)?,
            upper: parse_age(&caps[2], text)?,
        });
    }
    if let Some(caps) = SINGLE_YEAR.captures(text) {
        let age = parse_age(&caps[1], text)?;
        return Ok(AgeBand {
            lower: age,
            upper: age,
        });
    }
    if let Some(caps) = AND_OVER.captures(text) {
        return Ok(AgeBand {
            lower: parse_age(&caps[1], text)?,
            upper: OPEN_UPPER_AGE,
        });
    }
    Err(Error::DataIntegrity(format!(
        "Unrecognised age band pattern: {}",
        text
    )))
}

fn parse_age(digits: &str, text: &str) -> Result<u32> {
    digits
        .parse()
        .map_err(|_| Error::DataIntegrity(format!("Age out of range in '{}'", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_under() {
        assert_eq!(
            parse_age_band("Aged 2 years and under").unwrap(),
            AgeBand { lower: 0, upper: 2 }
        );
    }

    #[test]
    fn test_range() {
        assert_eq!(
            parse_age_band("Aged 10 to 14 years").unwrap(),
            AgeBand { lower: 10, upper: 14 }
        );
    }

    #[test]
    fn test_single_year() {
        assert_eq!(
            parse_age_band("Aged 15 years").unwrap(),
            AgeBand { lower: 15, upper: 15 }
        );
    }

    #[test]
    fn test_and_over() {
        assert_eq!(
            parse_age_band("Aged 85 years and over").unwrap(),
            AgeBand { lower: 85, upper: OPEN_UPPER_AGE }
        );
    }

    #[test]
    fn test_unrecognised_pattern() {
        assert!(matches!(
            parse_age_band("Aged 45 to 49"),
            Err(Error::DataIntegrity(_))
        ));
        assert!(parse_age_band("Does not apply").is_err());
        assert!(parse_age_band("Aged 99999999999 years").is_err());
    }

    #[test]
    fn test_serializes_as_pair() {
        let band = AgeBand { lower: 10, upper: 14 };
        assert_eq!(serde_json::to_string(&band).unwrap(), "[10,14]");
    }
}
