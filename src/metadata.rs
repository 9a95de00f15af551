//! Files the front-end reads alongside the generated artifacts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::age_bands::{parse_age_band, AgeBand};
use crate::catalog::{
    family, merge_population_types, read_classification_dir, Catalog, Classification,
    MergedClassifications, OutputClassificationDetails, ALL_CLASSIFICATIONS_FILE,
    CLASSIFICATIONS_BY_POPTYPE_FILE,
};
use crate::output::{to_json, to_json_pretty, ArtifactStore};
use crate::types::{PopulationType, Result, DEFAULT_SHARED_FAMILY, NOT_APPLICABLE_CELL};

pub const METADATA_FILE: &str = "metadata.json";
pub const INPUT_LIST_FILE: &str = "input-classifications.json";
pub const OUTPUT_LIST_FILE: &str = "output-classifications.json";
pub const USED_CLASSIFICATIONS_FILE: &str = "all-used-classifications.json";

/// Age range of one category of an age classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeBandCategory {
    pub id: String,
    pub range: AgeBand,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata<'a> {
    pub input_classifications: &'a [String],
    pub all_used_classifications: BTreeMap<&'a str, &'a Classification>,
    pub output_classifications_with_details: &'a [OutputClassificationDetails],
    pub age_bands: BTreeMap<&'a str, Vec<AgeBandCategory>>,
}

impl<'a> Metadata<'a> {
    pub fn new(catalog: &'a Catalog) -> Result<Self> {
        let all_used_classifications = catalog.used_classifications();
        let mut age_bands = BTreeMap::new();
        for (id, classification) in &all_used_classifications {
            if family(id) == DEFAULT_SHARED_FAMILY {
                age_bands.insert(*id, age_band_categories(classification)?);
            }
        }

        Ok(Self {
            input_classifications: catalog.input_ids(),
            all_used_classifications,
            output_classifications_with_details: catalog.output_details(),
            age_bands,
        })
    }
}

/// Range of every category but "does not apply"
pub fn age_band_categories(classification: &Classification) -> Result<Vec<AgeBandCategory>> {
    classification
        .categories
        .iter()
        .filter(|c| c.id != NOT_APPLICABLE_CELL)
        .map(|c| {
            Ok(AgeBandCategory {
                id: c.id.clone(),
                range: parse_age_band(&c.label)?,
            })
        })
        .collect()
}

/// Write `metadata.json` and the input and output id lists
pub fn write_metadata(catalog: &Catalog, store: &mut dyn ArtifactStore) -> Result<()> {
    let metadata = Metadata::new(catalog)?;
    store.put(METADATA_FILE, to_json_pretty(&metadata)?)?;
    store.put(
        USED_CLASSIFICATIONS_FILE,
        to_json(&metadata.all_used_classifications)?,
    )?;
    store.put(INPUT_LIST_FILE, to_json_pretty(catalog.input_ids())?)?;
    store.put(OUTPUT_LIST_FILE, to_json_pretty(catalog.output_ids())?)?;
    info!(
        age_classifications = metadata.age_bands.len(),
        "Metadata written"
    );
    Ok(())
}

/// Directory holding the downloaded classification files of one population type
pub fn classification_dir(downloaded_dir: &Path, population: PopulationType) -> PathBuf {
    downloaded_dir.join(format!("classifications-{}", population))
}

/// Merge the classification files of every population type
pub fn merge_classification_dirs(downloaded_dir: &Path) -> Result<MergedClassifications> {
    let mut sources = BTreeMap::new();
    for population in PopulationType::ALL {
        let items = read_classification_dir(&classification_dir(downloaded_dir, population))?;
        info!(population = %population, classifications = items.len(), "Read classifications");
        sources.insert(population, items);
    }
    merge_population_types(sources)
}

pub fn write_merged_classifications(
    merged: &MergedClassifications,
    store: &mut dyn ArtifactStore,
) -> Result<()> {
    store.put(ALL_CLASSIFICATIONS_FILE, to_json(&merged.all)?)?;
    store.put(
        CLASSIFICATIONS_BY_POPTYPE_FILE,
        to_json(&merged.by_population)?,
    )?;
    info!(classifications = merged.all.len(), "Merged classifications written");
    Ok(())
}
