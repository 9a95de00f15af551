//! Cross-tabulation of observation indexes into output-category figures.
//!
//! For a combination `cc`, every assignment of categories to `cc` yields one
//! dataset. Assignments are grouped by their categories for all but the last
//! variable, which is how artifacts are split.

use itertools::Itertools;
use serde::Serialize;

use crate::catalog::{family, Catalog, Category, OutputClassification};
use crate::combinations::Combination;
use crate::error::Error;
use crate::observations::{ObservationIndex, TagSet};
use crate::rounding::{percent, Rounded};
use crate::types::{Result, AREA_DIMENSION};

/// Count and percentage of one output category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryFigure {
    pub count: u64,
    pub percent: Option<Rounded>,
}

/// Figures for one output variable under one category assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFigures {
    Blocked,
    /// One entry per output category, in declaration order
    Categories(Vec<CategoryFigure>),
}

/// Share of the whole population matching a category assignment. Both fields
/// are `None` when the population totals were blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PopulationFigure {
    pub count: Option<u64>,
    pub percent: Option<Rounded>,
}

/// Every chart for one full category assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Output code and figures, in output order
    pub outputs: Vec<(String, OutputFigures)>,
    /// Present whenever the combination is non-empty
    pub total_population: Option<PopulationFigure>,
}

/// Count of an area and its share of the area's population
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaFigure {
    pub count: u64,
    pub percent: Option<Rounded>,
}

/// Per-area figures for one full category assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaFigures {
    Blocked,
    /// Areas in area-list order; areas without an observation are absent
    Areas(Vec<(String, AreaFigure)>),
}

/// Results that share the categories of every variable but the last
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixGroup<T> {
    /// Category ids of the prefix variables
    pub prefix: Vec<String>,
    /// Keyed by the last variable's category id, in declaration order
    pub entries: Vec<(String, T)>,
}

/// Observation index of one output classification
#[derive(Debug, Clone)]
pub struct OutputData {
    pub code: String,
    pub index: ObservationIndex,
}

/// Everything loaded for one combination at national level
#[derive(Debug, Clone, Default)]
pub struct NationalData {
    pub outputs: Vec<OutputData>,
    /// Population totals, absent for the empty combination
    pub population: Option<ObservationIndex>,
}

impl NationalData {
    pub fn unblocked_outputs(&self) -> usize {
        self.outputs.iter().filter(|o| !o.index.is_blocked()).count()
    }
}

/// Lookup key for a category assignment. Inputs in `skip_family` are left out.
pub fn assignment_key(
    cc: &Combination,
    assignment: &[&Category],
    skip_family: Option<&str>,
) -> TagSet {
    cc.ids()
        .iter()
        .zip(assignment)
        .filter(|(id, _)| skip_family != Some(family(id)))
        .map(|(id, category)| (id.clone(), category.id.clone()))
        .collect()
}

/// Every combination of one category per list, last list varying fastest
fn category_products<'c>(lists: &[&'c [Category]]) -> Vec<Vec<&'c Category>> {
    if lists.is_empty() {
        return vec![Vec::new()];
    }
    lists
        .iter()
        .copied()
        .map(|list| list.iter())
        .multi_cartesian_product()
        .collect()
}

pub struct Aggregator<'a> {
    catalog: &'a Catalog,
}

impl<'a> Aggregator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// The single dataset of the empty combination
    pub fn zero_variable(&self, data: &NationalData) -> Result<Dataset> {
        self.dataset(data, &Combination::default(), &[])
    }

    /// National datasets of a non-empty combination, grouped by prefix
    pub fn national(
        &self,
        data: &NationalData,
        cc: &Combination,
    ) -> Result<Vec<PrefixGroup<Dataset>>> {
        self.grouped(cc, |assignment| self.dataset(data, cc, assignment))
    }

    /// Per-area figures of a non-empty combination, grouped by prefix
    pub fn by_area(
        &self,
        index: &ObservationIndex,
        cc: &Combination,
        areas: &[String],
    ) -> Result<Vec<PrefixGroup<AreaFigures>>> {
        self.grouped(cc, |assignment| area_figures(index, cc, assignment, areas))
    }

    /// Category ids of every prefix of `cc`, in artifact order
    pub fn prefixes(&self, cc: &Combination) -> Result<Vec<Vec<String>>> {
        let groups = self.grouped(cc, |_| Ok(()))?;
        Ok(groups.into_iter().map(|group| group.prefix).collect())
    }

    fn grouped<T, F>(&self, cc: &Combination, mut build: F) -> Result<Vec<PrefixGroup<T>>>
    where
        F: FnMut(&[&Category]) -> Result<T>,
    {
        let last = cc.last().ok_or_else(|| {
            Error::InvalidInput("Grouped results need at least one variable".to_string())
        })?;
        let last_categories = self.catalog.categories(last)?;
        let prefix_lists = cc
            .prefix()
            .iter()
            .map(|id| self.catalog.categories(id))
            .collect::<Result<Vec<_>>>()?;

        let mut groups = Vec::new();
        for prefix in category_products(&prefix_lists) {
            let mut entries = Vec::with_capacity(last_categories.len());
            let mut assignment = prefix.clone();
            for category in last_categories {
                assignment.push(category);
                entries.push((category.id.clone(), build(&assignment)?));
                assignment.pop();
            }
            groups.push(PrefixGroup {
                prefix: prefix.iter().map(|c| c.id.clone()).collect(),
                entries,
            });
        }
        Ok(groups)
    }

    /// Every output's figures, plus the population share when `cc` is non-empty
    pub fn dataset(
        &self,
        data: &NationalData,
        cc: &Combination,
        assignment: &[&Category],
    ) -> Result<Dataset> {
        let mut outputs = Vec::with_capacity(data.outputs.len());
        for output in &data.outputs {
            let classification = self.catalog.output(&output.code)?;
            let figures = output_figures(&output.index, classification, cc, assignment)?;
            outputs.push((output.code.clone(), figures));
        }

        let total_population = if cc.is_empty() {
            None
        } else {
            let population = data.population.as_ref().ok_or_else(|| {
                Error::InvalidInput(format!("No population totals loaded for {}", cc))
            })?;
            Some(population_figure(population, cc, assignment)?)
        };

        Ok(Dataset {
            outputs,
            total_population,
        })
    }
}

/// Sum the raw cells of every output category and express each as a share of
/// their overall total. An input of the output's own family is not part of the key.
pub fn output_figures(
    index: &ObservationIndex,
    classification: &OutputClassification,
    cc: &Combination,
    assignment: &[&Category],
) -> Result<OutputFigures> {
    if index.is_blocked() {
        return Ok(OutputFigures::Blocked);
    }

    let code = classification.code.as_str();
    let base = assignment_key(cc, assignment, Some(family(code)));

    let mut totals = Vec::with_capacity(classification.categories.len());
    for category in &classification.categories {
        let mut total = 0u64;
        for cell in &category.cells {
            let key = base.clone().with(code, &cell.to_string());
            total = checked_sum(total, index.count(&key).unwrap_or(0))?;
        }
        totals.push(total);
    }

    let overall = totals.iter().try_fold(0u64, |acc, &t| checked_sum(acc, t))?;
    let figures = totals
        .into_iter()
        .map(|count| {
            Ok(CategoryFigure {
                count,
                percent: percent(count, overall)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(OutputFigures::Categories(figures))
}

/// Population count at the assignment's key as a share of the grand total
pub fn population_figure(
    index: &ObservationIndex,
    cc: &Combination,
    assignment: &[&Category],
) -> Result<PopulationFigure> {
    if index.is_blocked() {
        return Ok(PopulationFigure {
            count: None,
            percent: None,
        });
    }
    let count = index
        .count(&assignment_key(cc, assignment, None))
        .unwrap_or(0);
    Ok(PopulationFigure {
        count: Some(count),
        percent: percent(count, index.total())?,
    })
}

/// Count of each area at the assignment's key, against that area's total
pub fn area_figures(
    index: &ObservationIndex,
    cc: &Combination,
    assignment: &[&Category],
    areas: &[String],
) -> Result<AreaFigures> {
    if index.is_blocked() {
        return Ok(AreaFigures::Blocked);
    }

    let base = assignment_key(cc, assignment, None);
    let mut figures = Vec::new();
    for area in areas {
        let key = base.clone().with(AREA_DIMENSION, area);
        let Some(count) = index.count(&key) else {
            continue;
        };
        let area_total = index.area_total(area).unwrap_or(0);
        figures.push((
            area.clone(),
            AreaFigure {
                count,
                percent: percent(count, area_total)?,
            },
        ));
    }
    Ok(AreaFigures::Areas(figures))
}

fn checked_sum(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| Error::DataIntegrity("Count total overflows".to_string()))
}
