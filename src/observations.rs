//! Exact lookup of raw observation counts by their set of tags.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::types::{Result, AREA_DIMENSION, NATIONAL_DIMENSION};

/// A (dimension id, option id) pair
pub type Tag = (String, String);

/// Unordered set of tags. Tags are kept sorted, so equality and hashing do not
/// depend on the order they were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dimension: &str, option: &str) {
        self.0.insert((dimension.to_string(), option.to_string()));
    }

    pub fn with(mut self, dimension: &str, option: &str) -> Self {
        self.insert(dimension, option);
        self
    }

    pub fn has_dimension(&self, dimension: &str) -> bool {
        self.0.iter().any(|(d, _)| d == dimension)
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A batch of observations as returned by the census API.
///
/// `observations` stays unparsed until the batch is known not to be blocked:
/// blocked batches carry `null` there.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationBatch {
    #[serde(default)]
    pub blocked_areas: u64,

    #[serde(default)]
    pub observations: Value,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    dimensions: Vec<RawDimension>,
    observation: u64,
}

#[derive(Debug, Deserialize)]
struct RawDimension {
    dimension_id: String,
    option_id: String,
}

/// How observations are keyed and grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLayout {
    /// Geography tag dropped; blocked when any area is withheld
    National,
    /// Geography tag kept and summed per area; blocked when `all_blocked`
    /// areas are withheld
    ByArea { all_blocked: u64 },
}

impl IndexLayout {
    fn is_blocked(&self, blocked_areas: u64) -> bool {
        match self {
            IndexLayout::National => blocked_areas != 0,
            IndexLayout::ByArea { all_blocked } => blocked_areas >= *all_blocked,
        }
    }
}

/// Key of a grouping sum
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Total,
    Area(String),
}

/// Counts of one batch keyed by tag set, with grouping sums and the
/// disclosure-control flag
#[derive(Debug, Clone, Default)]
pub struct ObservationIndex {
    counts: HashMap<TagSet, u64>,
    group_totals: BTreeMap<GroupKey, u64>,
    blocked: bool,
}

impl ObservationIndex {
    /// An index whose data was withheld
    pub fn blocked() -> Self {
        Self {
            blocked: true,
            ..Self::default()
        }
    }

    /// Build an index from a raw batch in a single pass over its observations
    pub fn build(batch: &ObservationBatch, layout: IndexLayout) -> Result<Self> {
        if layout.is_blocked(batch.blocked_areas) {
            debug!(blocked_areas = batch.blocked_areas, "Batch blocked");
            return Ok(Self::blocked());
        }

        if batch.observations.is_null() {
            return Err(Error::DataIntegrity(
                "Unblocked batch has no observations".to_string(),
            ));
        }
        let observations = Vec::<RawObservation>::deserialize(&batch.observations)
            .map_err(|e| Error::DataIntegrity(format!("Malformed observation: {}", e)))?;

        let mut index = Self::default();
        index.group_totals.insert(GroupKey::Total, 0);

        for obs in observations {
            let mut tags = TagSet::new();
            let mut area = None;
            for dim in &obs.dimensions {
                match layout {
                    IndexLayout::National if dim.dimension_id == NATIONAL_DIMENSION => continue,
                    IndexLayout::ByArea { .. } if dim.dimension_id == AREA_DIMENSION => {
                        area = Some(dim.option_id.clone());
                    }
                    _ => {}
                }
                if tags.has_dimension(&dim.dimension_id) {
                    return Err(Error::DataIntegrity(format!(
                        "Dimension '{}' appears twice in one observation",
                        dim.dimension_id
                    )));
                }
                tags.insert(&dim.dimension_id, &dim.option_id);
            }

            let group = match (layout, area) {
                (IndexLayout::National, _) => None,
                (IndexLayout::ByArea { .. }, Some(area)) => Some(GroupKey::Area(area)),
                (IndexLayout::ByArea { .. }, None) => {
                    return Err(Error::DataIntegrity(format!(
                        "Observation without a '{}' dimension",
                        AREA_DIMENSION
                    )));
                }
            };

            if !index.insert(tags, obs.observation)? {
                continue;
            }
            index.add_to_group(GroupKey::Total, obs.observation)?;
            if let Some(group) = group {
                index.add_to_group(group, obs.observation)?;
            }
        }

        debug!(observations = index.len(), "Built observation index");
        Ok(index)
    }

    /// Returns false for an exact repeat of an existing observation
    fn insert(&mut self, tags: TagSet, count: u64) -> Result<bool> {
        if let Some(&existing) = self.counts.get(&tags) {
            if existing != count {
                return Err(Error::DataIntegrity(format!(
                    "Conflicting counts {} and {} for {:?}",
                    existing, count, tags
                )));
            }
            return Ok(false);
        }
        self.counts.insert(tags, count);
        Ok(true)
    }

    fn add_to_group(&mut self, key: GroupKey, count: u64) -> Result<()> {
        let total = self.group_totals.entry(key).or_insert(0);
        *total = total
            .checked_add(count)
            .ok_or_else(|| Error::DataIntegrity("Group total overflows".to_string()))?;
        Ok(())
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn count(&self, tags: &TagSet) -> Option<u64> {
        self.counts.get(tags).copied()
    }

    /// Sum of every count in the batch
    pub fn total(&self) -> u64 {
        self.group_totals.get(&GroupKey::Total).copied().unwrap_or(0)
    }

    pub fn area_total(&self, area: &str) -> Option<u64> {
        self.group_totals
            .get(&GroupKey::Area(area.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }
}
