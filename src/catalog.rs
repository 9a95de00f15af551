//! Classification metadata, loaded once per run and read-only afterwards.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Error;
use crate::types::{PopulationType, Result, NOT_APPLICABLE_CELL};

/// Suffix that distinguishes variants of one family, e.g. `_4b` in `resident_age_4b`:
/// an underscore, one to three digits and one lowercase letter at the end of the id.
/// Repeated suffixes are stripped together so that stripping is idempotent.
pub const FAMILY_SUFFIX_PATTERN: &str = r"(_[0-9]{1,3}[a-z])+$";

static FAMILY_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(FAMILY_SUFFIX_PATTERN).unwrap());

/// Name prefixes of household classifications. Only used to cross-check the
/// population types recorded in the catalog.
const HOUSEHOLD_PREFIXES: &[&str] = &[
    "hh_",
    "accommodation_type",
    "number_bedrooms",
    "occupancy_rating_bedrooms",
    "number_of_cars",
    "heating_type",
];

pub const INPUT_CLASSIFICATIONS_FILE: &str = "input-classifications.txt";
pub const OUTPUT_CLASSIFICATIONS_FILE: &str = "output-classifications.txt";
pub const OUTPUT_DETAILS_FILE: &str = "output-classifications-with-details.json";
pub const ALL_CLASSIFICATIONS_FILE: &str = "all-classifications.json";
pub const CLASSIFICATIONS_BY_POPTYPE_FILE: &str = "all-classifications-by-poptype.json";
pub const AREA_LIST_FILE: &str = "ltla-geog.json";

/// Family of a classification id: the id with its variant suffix removed
pub fn family(id: &str) -> &str {
    match FAMILY_SUFFIX.find(id) {
        Some(m) => &id[..m.start()],
        None => id,
    }
}

/// One selectable category of a classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

/// A classification as published by the data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub id: String,

    #[serde(default)]
    pub label: String,

    pub categories: Vec<Category>,

    /// Populations this classification is published under
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub poptypes: Vec<PopulationType>,

    /// Source fields the aggregation does not use, kept for the front-end
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Classification {
    /// A classification missing from the resident population is a household variable
    pub fn is_household(&self) -> bool {
        !self.poptypes.contains(&PopulationType::Residents)
    }
}

/// A reported output category and the raw cells it merges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputCategory {
    pub label: String,
    pub cells: Vec<i64>,
}

/// Entry of the output details file. `categories` is null when every raw cell
/// is reported as its own category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputClassificationDetails {
    pub code: String,
    pub categories: Option<Vec<OutputCategory>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Output classification with every reported category resolved to raw cells
#[derive(Debug, Clone, PartialEq)]
pub struct OutputClassification {
    pub code: String,
    pub categories: Vec<OutputCategory>,
}

/// All classification metadata needed for one run
#[derive(Debug, Clone)]
pub struct Catalog {
    classifications: BTreeMap<String, Classification>,
    output_details: Vec<OutputClassificationDetails>,
    outputs: BTreeMap<String, OutputClassification>,
    input_ids: Vec<String>,
    output_ids: Vec<String>,
}

impl Catalog {
    /// Build and validate a catalog. Input and output ids are sorted.
    pub fn new(
        classifications: BTreeMap<String, Classification>,
        output_details: Vec<OutputClassificationDetails>,
        mut input_ids: Vec<String>,
        mut output_ids: Vec<String>,
    ) -> Result<Self> {
        input_ids.sort();
        output_ids.sort();
        check_unique("input", &input_ids)?;
        check_unique("output", &output_ids)?;

        for id in input_ids.iter().chain(output_ids.iter()) {
            if !classifications.contains_key(id) {
                return Err(Error::Config(format!("Unknown classification '{}'", id)));
            }
        }

        let mut outputs = BTreeMap::new();
        for code in &output_ids {
            let details = output_details
                .iter()
                .find(|d| &d.code == code)
                .ok_or_else(|| {
                    Error::Config(format!("No output details for classification '{}'", code))
                })?;
            let classification = &classifications[code];
            check_population_type(classification)?;

            let categories = match &details.categories {
                Some(categories) => categories.clone(),
                None => default_output_categories(classification)?,
            };
            outputs.insert(
                code.clone(),
                OutputClassification {
                    code: code.clone(),
                    categories,
                },
            );
        }

        Ok(Self {
            classifications,
            output_details,
            outputs,
            input_ids,
            output_ids,
        })
    }

    /// Load the catalog from the input text files and the merged classifications file
    pub fn load(input_dir: &Path, generated_dir: &Path) -> Result<Self> {
        let input_ids = read_id_list(&input_dir.join(INPUT_CLASSIFICATIONS_FILE))?;
        let output_ids = read_id_list(&input_dir.join(OUTPUT_CLASSIFICATIONS_FILE))?;
        let output_details: Vec<OutputClassificationDetails> =
            read_json(&input_dir.join(OUTPUT_DETAILS_FILE))?;
        let classifications: BTreeMap<String, Classification> =
            read_json(&generated_dir.join(ALL_CLASSIFICATIONS_FILE))?;

        let catalog = Self::new(classifications, output_details, input_ids, output_ids)?;
        info!(
            inputs = catalog.input_ids.len(),
            outputs = catalog.output_ids.len(),
            classifications = catalog.classifications.len(),
            "Loaded classification catalog"
        );
        Ok(catalog)
    }

    pub fn input_ids(&self) -> &[String] {
        &self.input_ids
    }

    pub fn output_ids(&self) -> &[String] {
        &self.output_ids
    }

    pub fn output_details(&self) -> &[OutputClassificationDetails] {
        &self.output_details
    }

    pub fn classification(&self, id: &str) -> Result<&Classification> {
        self.classifications
            .get(id)
            .ok_or_else(|| Error::Config(format!("Unknown classification '{}'", id)))
    }

    pub fn categories(&self, id: &str) -> Result<&[Category]> {
        Ok(&self.classification(id)?.categories)
    }

    pub fn output(&self, code: &str) -> Result<&OutputClassification> {
        self.outputs
            .get(code)
            .ok_or_else(|| Error::Config(format!("'{}' is not an output classification", code)))
    }

    /// Every input and output classification, keyed by id
    pub fn used_classifications(&self) -> BTreeMap<&str, &Classification> {
        self.input_ids
            .iter()
            .chain(self.output_ids.iter())
            .filter_map(|id| {
                self.classifications
                    .get(id)
                    .map(|c| (id.as_str(), c))
            })
            .collect()
    }
}

fn check_unique(kind: &str, ids: &[String]) -> Result<()> {
    // ids are sorted
    if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
        return Err(Error::Config(format!(
            "Duplicate {} classification '{}'",
            kind, pair[0]
        )));
    }
    Ok(())
}

/// Population-type membership decides household status; the name prefixes must agree.
fn check_population_type(classification: &Classification) -> Result<()> {
    let by_name = HOUSEHOLD_PREFIXES
        .iter()
        .any(|prefix| classification.id.starts_with(prefix));
    if by_name != classification.is_household() {
        return Err(Error::Config(format!(
            "Population types {:?} of '{}' disagree with its name",
            classification.poptypes, classification.id
        )));
    }
    Ok(())
}

/// One output category per raw cell, skipping "does not apply"
fn default_output_categories(classification: &Classification) -> Result<Vec<OutputCategory>> {
    classification
        .categories
        .iter()
        .filter(|cat| cat.id != NOT_APPLICABLE_CELL)
        .map(|cat| {
            let cell = cat.id.parse::<i64>().map_err(|_| {
                Error::DataIntegrity(format!(
                    "Category id '{}' of '{}' is not a cell number",
                    cat.id, classification.id
                ))
            })?;
            Ok(OutputCategory {
                label: cat.label.clone(),
                cells: vec![cell],
            })
        })
        .collect()
}

/// Read one classification id per line, ignoring blank lines
pub fn read_id_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let mut ids: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    ids.sort();
    Ok(ids)
}

/// Open `path`, naming it in the error
pub(crate) fn open_file(path: &Path) -> Result<fs::File> {
    fs::File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = open_file(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

#[derive(Debug, Deserialize)]
struct ItemList<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AreaItem {
    id: String,
}

/// Read every `*.json` classification file in a directory, in file name order
pub fn read_classification_dir(dir: &Path) -> Result<Vec<Classification>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut classifications = Vec::new();
    for path in paths {
        let list: ItemList<Classification> = read_json(&path)?;
        debug!(file = %path.display(), items = list.items.len(), "Read classifications");
        classifications.extend(list.items);
    }
    Ok(classifications)
}

/// Ordered list of area ids from an `{"items": [{"id": ...}]}` file
pub fn read_area_list(path: &Path) -> Result<Vec<String>> {
    let list: ItemList<AreaItem> = read_json(path)?;
    let areas: Vec<String> = list.items.into_iter().map(|item| item.id).collect();
    if areas.is_empty() {
        return Err(Error::Config(format!("No areas in {}", path.display())));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = areas.iter().find(|a| !seen.insert(a.as_str())) {
        return Err(Error::Config(format!("Duplicate area '{}'", dup)));
    }
    Ok(areas)
}

/// Classifications merged across population types
#[derive(Debug, Clone, Default)]
pub struct MergedClassifications {
    pub all: BTreeMap<String, Classification>,
    pub by_population: BTreeMap<PopulationType, BTreeMap<String, Classification>>,
}

/// Merge the classifications published for each population type, recording in
/// `poptypes` where each one appears. A classification published under several
/// population types must be identical in each.
pub fn merge_population_types(
    sources: BTreeMap<PopulationType, Vec<Classification>>,
) -> Result<MergedClassifications> {
    let mut merged = MergedClassifications::default();

    for (poptype, items) in sources {
        let population = merged.by_population.entry(poptype).or_default();
        for item in items {
            if let Some(existing) = population.get(&item.id) {
                if *existing != item {
                    return Err(Error::Config(format!(
                        "{} publishes '{}' twice with different metadata",
                        poptype, item.id
                    )));
                }
                continue;
            }
            population.insert(item.id.clone(), item);
        }
    }

    let mut populations = merged.by_population.iter();
    if let Some((first_type, first)) = populations.next() {
        for (other_type, other) in populations {
            for (id, item) in other {
                if let Some(existing) = first.get(id) {
                    if existing != item {
                        return Err(Error::Config(format!(
                            "{} and {} disagree on '{}'",
                            first_type, other_type, id
                        )));
                    }
                }
            }
        }
    }

    for (poptype, population) in &merged.by_population {
        for (id, item) in population {
            let entry = merged.all.entry(id.clone()).or_insert_with(|| item.clone());
            entry.poptypes.push(*poptype);
        }
    }

    Ok(merged)
}
