//! Runs over every combination: load batches, aggregate, hand artifacts to the store.

use tracing::{debug, info};

use crate::aggregate::{Aggregator, NationalData, OutputData};
use crate::catalog::Catalog;
use crate::combinations::{input_combinations, Combination};
use crate::config::RunConfig;
use crate::error::Error;
use crate::observations::{IndexLayout, ObservationIndex};
use crate::output::{
    combine_json, to_json, unblocked_counts_json, ArtifactKind, ArtifactStore,
    UNBLOCKED_COUNTS_PATH, ZERO_VARIABLE_PATH,
};
use crate::source::{area_request, national_requests, BatchRequest, ObservationSource};
use crate::types::Result;

/// What a run produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub combinations: usize,
    pub artifacts: usize,
    pub blocked_batches: usize,
}

pub struct Generator<'a> {
    catalog: &'a Catalog,
    config: &'a RunConfig,
    source: &'a mut dyn ObservationSource,
    store: &'a mut dyn ArtifactStore,
}

impl<'a> Generator<'a> {
    pub fn new(
        catalog: &'a Catalog,
        config: &'a RunConfig,
        source: &'a mut dyn ObservationSource,
        store: &'a mut dyn ArtifactStore,
    ) -> Self {
        Self {
            catalog,
            config,
            source,
            store,
        }
    }

    /// National artifacts for 0 up to the maximum number of input variables,
    /// then the unblocked output count of every combination
    pub fn generate_national(&mut self) -> Result<RunSummary> {
        let aggregator = Aggregator::new(self.catalog);
        let mut summary = RunSummary::default();
        let mut unblocked = Vec::new();

        for k in 0..=self.config.max_var_selections {
            let combinations = input_combinations(self.catalog.input_ids(), k);
            for (i, cc) in combinations.iter().enumerate() {
                info!(
                    "{} var: processing {} of {} ({})",
                    k,
                    i + 1,
                    combinations.len(),
                    cc
                );
                let data = self.load_national(cc, &mut summary)?;

                if cc.is_empty() {
                    let dataset = aggregator.zero_variable(&data)?;
                    self.store.put(ZERO_VARIABLE_PATH, to_json(&dataset)?)?;
                    summary.artifacts += 1;
                } else {
                    for group in aggregator.national(&data, cc)? {
                        let path = ArtifactKind::National.path(cc, &group.prefix)?;
                        self.store.put(&path, to_json(&group)?)?;
                        summary.artifacts += 1;
                    }
                }

                unblocked.push((cc.join(","), data.unblocked_outputs()));
                summary.combinations += 1;
            }
        }

        self.store
            .put(UNBLOCKED_COUNTS_PATH, unblocked_counts_json(&unblocked)?)?;
        info!(
            combinations = summary.combinations,
            artifacts = summary.artifacts,
            blocked_batches = summary.blocked_batches,
            "National run complete"
        );
        Ok(summary)
    }

    /// Area-level artifacts for 1 up to the maximum number of input variables
    pub fn generate_by_area(&mut self, areas: &[String]) -> Result<RunSummary> {
        if areas.is_empty() {
            return Err(Error::Config("Area list is empty".to_string()));
        }
        let aggregator = Aggregator::new(self.catalog);
        let layout = IndexLayout::ByArea {
            all_blocked: areas.len() as u64,
        };
        let mut summary = RunSummary::default();

        for k in 1..=self.config.max_var_selections {
            let combinations = input_combinations(self.catalog.input_ids(), k);
            for (i, cc) in combinations.iter().enumerate() {
                info!(
                    "{} var: processing {} of {} ({})",
                    k,
                    i + 1,
                    combinations.len(),
                    cc
                );
                let index = self.load(&area_request(cc), layout)?;
                if index.is_blocked() {
                    summary.blocked_batches += 1;
                }

                for group in aggregator.by_area(&index, cc, areas)? {
                    let path = ArtifactKind::ByArea.path(cc, &group.prefix)?;
                    self.store.put(&path, to_json(&group)?)?;
                    summary.artifacts += 1;
                }
                summary.combinations += 1;
            }
        }

        info!(
            combinations = summary.combinations,
            artifacts = summary.artifacts,
            blocked_batches = summary.blocked_batches,
            "Area-level run complete"
        );
        Ok(summary)
    }

    fn load_national(&mut self, cc: &Combination, summary: &mut RunSummary) -> Result<NationalData> {
        let requests = national_requests(self.catalog, self.config, cc)?;

        let mut outputs = Vec::with_capacity(requests.outputs.len());
        for (code, request) in &requests.outputs {
            let index = self.load(request, IndexLayout::National)?;
            if index.is_blocked() {
                summary.blocked_batches += 1;
            }
            outputs.push(OutputData {
                code: code.clone(),
                index,
            });
        }

        let population = match &requests.population {
            Some(request) => {
                let index = self.load(request, IndexLayout::National)?;
                if index.is_blocked() {
                    summary.blocked_batches += 1;
                }
                Some(index)
            }
            None => None,
        };

        Ok(NationalData {
            outputs,
            population,
        })
    }

    fn load(&mut self, request: &BatchRequest, layout: IndexLayout) -> Result<ObservationIndex> {
        let batch = self.source.fetch(request)?;
        ObservationIndex::build(&batch, layout).map_err(|e| match e {
            Error::DataIntegrity(message) => {
                Error::DataIntegrity(format!("{}: {}", request.relative_path(), message))
            }
            other => other,
        })
    }
}

/// Pair every national artifact with its area-level counterpart. Both runs
/// must already be complete.
pub fn combine_artifacts(
    catalog: &Catalog,
    config: &RunConfig,
    store: &mut dyn ArtifactStore,
) -> Result<RunSummary> {
    let aggregator = Aggregator::new(catalog);
    let mut summary = RunSummary::default();

    for k in 1..=config.max_var_selections {
        for cc in input_combinations(catalog.input_ids(), k) {
            for prefix in aggregator.prefixes(&cc)? {
                let bar_chart_data = store.get(&ArtifactKind::National.path(&cc, &prefix)?)?;
                let map_data = store.get(&ArtifactKind::ByArea.path(&cc, &prefix)?)?;
                let path = ArtifactKind::Combined.path(&cc, &prefix)?;
                debug!(path = %path, "Combining");
                store.put(&path, combine_json(&bar_chart_data, &map_data)?)?;
                summary.artifacts += 1;
            }
            summary.combinations += 1;
        }
    }

    info!(artifacts = summary.artifacts, "Combined artifacts written");
    Ok(summary)
}
