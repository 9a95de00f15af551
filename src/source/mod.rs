//! Raw observation batches: which batches a run needs, and where they come from.

pub mod gz;

use std::collections::HashSet;

use serde::Serialize;
use tracing::trace;

use crate::catalog::{family, Catalog};
use crate::combinations::{input_combinations, Combination};
use crate::config::{fill_pattern, RunConfig};
use crate::observations::ObservationBatch;
use crate::types::{PopulationType, Result};

pub use gz::GzJsonSource;

/// Common trait for observation batch sources
pub trait ObservationSource {
    fn fetch(&mut self, request: &BatchRequest) -> Result<ObservationBatch>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// Inputs crossed with one output classification, national level
    Output,
    /// Inputs alone, national level
    PopulationTotals,
    /// Inputs crossed with areas
    ByArea,
}

/// One query against the census API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRequest {
    pub kind: BatchKind,
    pub population_type: PopulationType,
    pub dimensions: Vec<String>,
}

impl BatchRequest {
    /// Path of the downloaded batch, relative to the download directory
    pub fn relative_path(&self) -> String {
        let joined = self.dimensions.join("-");
        let n = self.dimensions.len();
        match self.kind {
            BatchKind::Output => format!("{}var/{}.json.gz", n.saturating_sub(1), joined),
            BatchKind::PopulationTotals => format!("{}var/{}.json.gz", n, joined),
            BatchKind::ByArea => format!("{}var-by-ltla/{}_by_geog.json.gz", n, joined),
        }
    }

    /// API URL from the configured pattern, if one is configured
    pub fn url(&self, config: &RunConfig) -> Result<Option<String>> {
        let dimensions = self.dimensions.join(",");
        match self.kind {
            BatchKind::Output | BatchKind::PopulationTotals => config
                .national_url_pattern
                .as_deref()
                .map(|p| fill_pattern(p, &[self.population_type.as_str(), &dimensions]))
                .transpose(),
            BatchKind::ByArea => config
                .ltla_url_pattern
                .as_deref()
                .map(|p| fill_pattern(p, &[&dimensions]))
                .transpose(),
        }
    }
}

/// Batches needed for one combination at national level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NationalRequests {
    pub population: Option<BatchRequest>,
    /// Output code and its request, in output order
    pub outputs: Vec<(String, BatchRequest)>,
}

/// Requests for `cc`. An output of the same family as one of the inputs is
/// requested without that input, and only when the family is shared; the API
/// never returns two variants of one family together.
pub fn national_requests(
    catalog: &Catalog,
    config: &RunConfig,
    cc: &Combination,
) -> Result<NationalRequests> {
    let population = (!cc.is_empty()).then(|| BatchRequest {
        kind: BatchKind::PopulationTotals,
        population_type: PopulationType::Residents,
        dimensions: cc.ids().to_vec(),
    });

    let mut outputs = Vec::new();
    for code in catalog.output_ids() {
        let output_family = family(code);
        let collides = cc.ids().iter().any(|id| family(id) == output_family);
        if collides && !config.shares_family(code) {
            trace!(output = %code, combination = %cc, "Skipping output of an input's family");
            continue;
        }

        let mut dimensions: Vec<String> = cc
            .ids()
            .iter()
            .filter(|id| family(id) != output_family)
            .cloned()
            .collect();
        dimensions.push(code.clone());

        let population_type = if catalog.classification(code)?.is_household() {
            PopulationType::Households
        } else {
            PopulationType::Residents
        };
        outputs.push((
            code.clone(),
            BatchRequest {
                kind: BatchKind::Output,
                population_type,
                dimensions,
            },
        ));
    }

    Ok(NationalRequests {
        population,
        outputs,
    })
}

pub fn area_request(cc: &Combination) -> BatchRequest {
    BatchRequest {
        kind: BatchKind::ByArea,
        population_type: PopulationType::Residents,
        dimensions: cc.ids().to_vec(),
    }
}

/// A request with its download location
#[derive(Debug, Clone, Serialize)]
pub struct PlannedRequest {
    #[serde(flatten)]
    pub request: BatchRequest,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Every distinct batch a national (or area-level) run reads, in run order
pub fn plan_requests(
    catalog: &Catalog,
    config: &RunConfig,
    by_area: bool,
) -> Result<Vec<PlannedRequest>> {
    let first = if by_area { 1 } else { 0 };
    let mut seen = HashSet::new();
    let mut planned = Vec::new();

    for k in first..=config.max_var_selections {
        for cc in input_combinations(catalog.input_ids(), k) {
            let requests = if by_area {
                vec![area_request(&cc)]
            } else {
                let national = national_requests(catalog, config, &cc)?;
                national
                    .population
                    .into_iter()
                    .chain(national.outputs.into_iter().map(|(_, r)| r))
                    .collect()
            };

            for request in requests {
                let path = request.relative_path();
                if !seen.insert(path.clone()) {
                    continue;
                }
                planned.push(PlannedRequest {
                    url: request.url(config)?,
                    path,
                    request,
                });
            }
        }
    }
    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_catalog;

    fn config() -> RunConfig {
        RunConfig {
            max_var_selections: 2,
            national_url_pattern: Some("https://api/{}?dims={}".to_string()),
            ltla_url_pattern: Some("https://api/ltla?dims={}".to_string()),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_zero_variable_requests() {
        let catalog = sample_catalog();
        let requests = national_requests(&catalog, &config(), &Combination::default()).unwrap();

        assert!(requests.population.is_none());
        let paths: Vec<_> = requests.outputs.iter().map(|(_, r)| r.relative_path()).collect();
        assert_eq!(
            paths,
            [
                "0var/economic_activity_3a.json.gz",
                "0var/hh_tenure_2a.json.gz",
                "0var/resident_age_2b.json.gz"
            ]
        );
    }

    #[test]
    fn test_household_outputs_use_household_population() {
        let catalog = sample_catalog();
        let cc = Combination::from_ids(&["sex"]);
        let requests = national_requests(&catalog, &config(), &cc).unwrap();

        let tenure = &requests.outputs[1].1;
        assert_eq!(tenure.population_type, PopulationType::Households);
        assert_eq!(
            tenure.url(&config()).unwrap().as_deref(),
            Some("https://api/UR_HH?dims=sex,hh_tenure_2a")
        );
        let econ = &requests.outputs[0].1;
        assert_eq!(econ.population_type, PopulationType::Residents);

        let population = requests.population.unwrap();
        assert_eq!(population.relative_path(), "1var/sex.json.gz");
        assert_eq!(
            population.url(&config()).unwrap().as_deref(),
            Some("https://api/UR?dims=sex")
        );
    }

    #[test]
    fn test_shared_family_output_drops_input() {
        let catalog = sample_catalog();
        let cc = Combination::from_ids(&["resident_age_3a", "sex"]);
        let requests = national_requests(&catalog, &config(), &cc).unwrap();

        let (code, age) = &requests.outputs[2];
        assert_eq!(code, "resident_age_2b");
        assert_eq!(age.dimensions, ["sex", "resident_age_2b"]);
        assert_eq!(age.relative_path(), "1var/sex-resident_age_2b.json.gz");
    }

    #[test]
    fn test_unshared_family_output_skipped() {
        let catalog = sample_catalog();
        let config = RunConfig {
            shared_output_families: Vec::new(),
            ..config()
        };
        let cc = Combination::from_ids(&["resident_age_3a"]);
        let requests = national_requests(&catalog, &config, &cc).unwrap();

        let codes: Vec<_> = requests.outputs.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(codes, ["economic_activity_3a", "hh_tenure_2a"]);
    }

    #[test]
    fn test_area_request_path() {
        let cc = Combination::from_ids(&["resident_age_3a", "sex"]);
        let request = area_request(&cc);
        assert_eq!(
            request.relative_path(),
            "2var-by-ltla/resident_age_3a-sex_by_geog.json.gz"
        );
        assert_eq!(
            request.url(&config()).unwrap().as_deref(),
            Some("https://api/ltla?dims=resident_age_3a,sex")
        );
    }

    #[test]
    fn test_plan_is_deduplicated() {
        let catalog = sample_catalog();
        let planned = plan_requests(&catalog, &config(), false).unwrap();
        let paths: Vec<_> = planned.iter().map(|p| p.path.as_str()).collect();
        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());

        // [resident_age_3a] crossed with resident_age_2b is the 0var file
        assert!(paths.contains(&"0var/resident_age_2b.json.gz"));
        assert!(!paths.contains(&"1var/resident_age_3a-resident_age_2b.json.gz"));
        assert!(paths.contains(&"2var/resident_age_3a-sex.json.gz"));
        assert_eq!(paths[0], "0var/economic_activity_3a.json.gz");
    }

    #[test]
    fn test_plan_by_area() {
        let catalog = sample_catalog();
        let planned = plan_requests(&catalog, &config(), true).unwrap();
        let paths: Vec<_> = planned.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "1var-by-ltla/resident_age_3a_by_geog.json.gz",
                "1var-by-ltla/sex_by_geog.json.gz",
                "2var-by-ltla/resident_age_3a-sex_by_geog.json.gz"
            ]
        );
    }

    #[test]
    fn test_planned_request_serialization() {
        let catalog = sample_catalog();
        let planned = plan_requests(&catalog, &config(), true).unwrap();
        let json = serde_json::to_value(&planned[1]).unwrap();
        assert_eq!(json["kind"], "by_area");
        assert_eq!(json["population_type"], "UR");
        assert_eq!(json["path"], "1var-by-ltla/sex_by_geog.json.gz");
        assert_eq!(json["url"], "https://api/ltla?dims=sex");
    }
}
