use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::{family, read_json};
use crate::error::Error;
use crate::types::{Result, DEFAULT_SHARED_FAMILY};

pub const CONFIG_FILE: &str = "config.json";

/// Run settings read from `config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Largest number of input variables selectable at once
    pub max_var_selections: usize,

    /// `{}` placeholders: population type, then comma-separated dimensions
    #[serde(default)]
    pub national_url_pattern: Option<String>,

    /// `{}` placeholder: comma-separated dimensions
    #[serde(default)]
    pub ltla_url_pattern: Option<String>,

    /// Families whose output variants are still reported when an input of the
    /// same family is selected
    #[serde(default = "default_shared_output_families")]
    pub shared_output_families: Vec<String>,
}

fn default_shared_output_families() -> Vec<String> {
    vec![DEFAULT_SHARED_FAMILY.to_string()]
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_var_selections: 0,
            national_url_pattern: None,
            ltla_url_pattern: None,
            shared_output_families: default_shared_output_families(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Whether outputs of `id`'s family are reported alongside an input of that family
    pub fn shares_family(&self, id: &str) -> bool {
        let family = family(id);
        self.shared_output_families.iter().any(|f| f == family)
    }
}

/// Substitute each `{}` in `pattern` with the next value
pub fn fill_pattern(pattern: &str, values: &[&str]) -> Result<String> {
    let placeholders = pattern.matches("{}").count();
    if placeholders != values.len() {
        return Err(Error::Config(format!(
            "Pattern '{}' has {} placeholders, expected {}",
            pattern,
            placeholders,
            values.len()
        )));
    }
    let mut parts = pattern.split("{}");
    let mut result = parts.next().unwrap_or_default().to_string();
    for (value, part) in values.iter().zip(parts) {
        result.push_str(value);
        result.push_str(part);
    }
    Ok(result)
}
