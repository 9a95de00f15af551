//! Shared fixtures for unit tests.

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};

use crate::catalog::{Catalog, Category, Classification, OutputCategory, OutputClassificationDetails};
use crate::error::Error;
use crate::observations::ObservationBatch;
use crate::source::{BatchRequest, ObservationSource};
use crate::types::{PopulationType, Result};

pub fn classification(
    id: &str,
    categories: &[(&str, &str)],
    poptypes: &[PopulationType],
) -> Classification {
    Classification {
        id: id.to_string(),
        label: id.to_string(),
        categories: categories
            .iter()
            .map(|(id, label)| Category {
                id: id.to_string(),
                label: label.to_string(),
            })
            .collect(),
        poptypes: poptypes.to_vec(),
        extra: BTreeMap::new(),
    }
}

fn details(code: &str, categories: Option<Vec<OutputCategory>>) -> OutputClassificationDetails {
    OutputClassificationDetails {
        code: code.to_string(),
        categories,
        extra: BTreeMap::new(),
    }
}

/// Inputs `resident_age_3a` and `sex`; outputs `economic_activity_3a` (cells 1
/// and 2 merged), `hh_tenure_2a` (household, default categories) and
/// `resident_age_2b` (same family as an input).
pub fn sample_catalog() -> Catalog {
    use PopulationType::{Households, Residents};

    let all = vec![
        classification(
            "resident_age_3a",
            &[
                ("1", "Aged 15 years and under"),
                ("2", "Aged 16 to 64 years"),
                ("3", "Aged 65 years and over"),
            ],
            &[Residents, Households],
        ),
        classification("sex", &[("1", "Female"), ("2", "Male")], &[Residents, Households]),
        classification(
            "economic_activity_3a",
            &[
                ("-8", "Does not apply"),
                ("1", "Employee"),
                ("2", "Self-employed"),
                ("3", "Inactive"),
            ],
            &[Residents],
        ),
        classification(
            "hh_tenure_2a",
            &[("-8", "Does not apply"), ("1", "Owned"), ("2", "Rented")],
            &[Households],
        ),
        classification(
            "resident_age_2b",
            &[("1", "Aged 15 years and under"), ("2", "Aged 16 years and over")],
            &[Residents, Households],
        ),
    ];
    let classifications = all.into_iter().map(|c| (c.id.clone(), c)).collect();

    let output_details = vec![
        details(
            "economic_activity_3a",
            Some(vec![
                OutputCategory {
                    label: "Working".to_string(),
                    cells: vec![1, 2],
                },
                OutputCategory {
                    label: "Not working".to_string(),
                    cells: vec![3],
                },
            ]),
        ),
        details("hh_tenure_2a", None),
        details("resident_age_2b", None),
    ];

    Catalog::new(
        classifications,
        output_details,
        vec!["sex".to_string(), "resident_age_3a".to_string()],
        vec![
            "resident_age_2b".to_string(),
            "hh_tenure_2a".to_string(),
            "economic_activity_3a".to_string(),
        ],
    )
    .unwrap()
}

pub fn batch(value: Value) -> ObservationBatch {
    serde_json::from_value(value).unwrap()
}

/// Serialized national batch: every observation tagged with the `nat` dimension
pub fn national_batch(observations: &[(&[(&str, &str)], u64)]) -> Value {
    let observations: Vec<Value> = observations
        .iter()
        .map(|(dims, count)| {
            let mut dimensions = vec![json!({"dimension_id": "nat", "option_id": "K04000001"})];
            dimensions.extend(
                dims.iter()
                    .map(|(d, o)| json!({"dimension_id": d, "option_id": o})),
            );
            json!({"dimensions": dimensions, "observation": count})
        })
        .collect();
    json!({"blocked_areas": 0, "observations": observations})
}

pub fn blocked_batch() -> Value {
    json!({"blocked_areas": 1, "observations": null})
}

/// Batches keyed by relative path. Paths without a batch get `fallback`, or
/// fail as not found when there is none.
#[derive(Debug, Default)]
pub struct MemorySource {
    pub batches: HashMap<String, Value>,
    pub fallback: Option<Value>,
    pub fetched: Vec<String>,
}

impl ObservationSource for MemorySource {
    fn fetch(&mut self, request: &BatchRequest) -> Result<ObservationBatch> {
        let path = request.relative_path();
        self.fetched.push(path.clone());
        match self.batches.get(&path).or(self.fallback.as_ref()) {
            Some(value) => Ok(batch(value.clone())),
            None => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path,
            ))),
        }
    }
}
