use std::collections::HashSet;
use std::fmt;

use itertools::Itertools;

use crate::catalog::family;

/// Input classifications selected together, at most one per family
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Combination(Vec<String>);

impl Combination {
    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Every id but the last
    pub fn prefix(&self) -> &[String] {
        match self.0.split_last() {
            Some((_, prefix)) => prefix,
            None => &[],
        }
    }

    pub fn join(&self, separator: &str) -> String {
        self.0.join(separator)
    }

    /// Build a combination from ids already known to be family-distinct
    #[cfg(test)]
    pub fn from_ids(ids: &[&str]) -> Self {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        assert!(distinct_families(&ids), "ids share a family: {:?}", ids);
        Self(ids)
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join("-"))
    }
}

/// Every `k`-subset of `input_ids` whose members come from distinct families.
///
/// Subsets keep the relative order of `input_ids` and are produced in
/// lexicographic order of their positions, so output naming is reproducible.
/// `k == 0` gives the single empty combination.
pub fn input_combinations(input_ids: &[String], k: usize) -> Vec<Combination> {
    input_ids
        .iter()
        .combinations(k)
        .filter(|ids| distinct_families(ids))
        .map(|ids| Combination(ids.into_iter().cloned().collect()))
        .collect()
}

fn distinct_families<S: AsRef<str>>(ids: &[S]) -> bool {
    let mut seen = HashSet::new();
    ids.iter().all(|id| seen.insert(family(id.as_ref())))
}
