//! Artifact layout, serialization and storage.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use tracing::debug;

use crate::aggregate::{AreaFigure, AreaFigures, Dataset, OutputFigures, PrefixGroup};
use crate::combinations::Combination;
use crate::config::fill_pattern;
use crate::error::Error;
use crate::types::{Result, BLOCKED_MARKER};

pub const ZERO_VARIABLE_PATH: &str = "0var_percent/data.json";
pub const UNBLOCKED_COUNTS_PATH: &str = "unblocked-combination-counts.json";

/// Where generated artifacts are kept, addressed by path relative to the root
pub trait ArtifactStore {
    fn put(&mut self, relative_path: &str, contents: String) -> Result<()>;
    fn get(&self, relative_path: &str) -> Result<String>;
}

/// Artifacts stored as files under a root directory
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl ArtifactStore for FsStore {
    fn put(&mut self, relative_path: &str, contents: String) -> Result<()> {
        let path = self.root.join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        debug!(path = %path.display(), "Wrote artifact");
        Ok(())
    }

    fn get(&self, relative_path: &str) -> Result<String> {
        let path = self.root.join(relative_path);
        fs::read_to_string(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub files: std::collections::BTreeMap<String, String>,
}

#[cfg(test)]
impl ArtifactStore for MemoryStore {
    fn put(&mut self, relative_path: &str, contents: String) -> Result<()> {
        self.files.insert(relative_path.to_string(), contents);
        Ok(())
    }

    fn get(&self, relative_path: &str) -> Result<String> {
        self.files.get(relative_path).cloned().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                relative_path.to_string(),
            ))
        })
    }
}

/// Family of per-prefix artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    National,
    ByArea,
    Combined,
}

impl ArtifactKind {
    /// Directory pattern: number of variables, then the prefix directories
    pub fn dir_pattern(&self) -> &'static str {
        match self {
            ArtifactKind::National => "{}var_percent/{}",
            ArtifactKind::ByArea => "{}var-by-ltla_percent/{}",
            ArtifactKind::Combined => "{}var-combined_percent/{}",
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::National | ArtifactKind::Combined => ".json",
            ArtifactKind::ByArea => "_by_geog.json",
        }
    }

    pub fn path(&self, cc: &Combination, prefix: &[String]) -> Result<String> {
        outfile_path(cc, prefix, self.dir_pattern(), self.suffix())
    }
}

/// Path of the artifact holding every category of the last variable of `cc`,
/// with the other variables fixed to `prefix`. Each prefix variable adds a
/// directory named `{id}-{category}`.
pub fn outfile_path(
    cc: &Combination,
    prefix: &[String],
    dir_pattern: &str,
    suffix: &str,
) -> Result<String> {
    let last = cc.last().ok_or_else(|| {
        Error::InvalidInput("Artifact path needs at least one variable".to_string())
    })?;
    if prefix.len() + 1 != cc.len() {
        return Err(Error::InvalidInput(format!(
            "{} needs {} prefix categories, got {}",
            cc,
            cc.len() - 1,
            prefix.len()
        )));
    }

    let directories = cc
        .prefix()
        .iter()
        .zip(prefix)
        .map(|(id, category)| format!("{}-{}", id, category))
        .join("/");
    let directory = fill_pattern(dir_pattern, &[&cc.len().to_string(), &directories])?;
    Ok(format!(
        "{}/{}{}",
        directory.trim_end_matches('/'),
        last,
        suffix
    ))
}

/// Serialize pairs as a JSON object, keeping their order
struct Entries<'a, K, V>(&'a [(K, V)]);

impl<K: Serialize, V: Serialize> Serialize for Entries<'_, K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl Serialize for OutputFigures {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            OutputFigures::Blocked => serializer.serialize_str(BLOCKED_MARKER),
            OutputFigures::Categories(figures) => {
                let counts: Vec<u64> = figures.iter().map(|f| f.count).collect();
                let percents: Vec<_> = figures.iter().map(|f| f.percent).collect();
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("count", &counts)?;
                map.serialize_entry("percent", &percents)?;
                map.end()
            }
        }
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = self.outputs.len() + usize::from(self.total_population.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (code, figures) in &self.outputs {
            map.serialize_entry(code, figures)?;
        }
        if let Some(population) = &self.total_population {
            map.serialize_entry("total_pop", population)?;
        }
        map.end()
    }
}

/// `[count, percent]`
impl Serialize for AreaFigure {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (self.count, self.percent).serialize(serializer)
    }
}

impl Serialize for AreaFigures {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AreaFigures::Blocked => serializer.serialize_str(BLOCKED_MARKER),
            AreaFigures::Areas(areas) => Entries(areas).serialize(serializer),
        }
    }
}

/// Last-variable category id to its result
impl<T: Serialize> Serialize for PrefixGroup<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Entries(&self.entries).serialize(serializer)
    }
}

#[derive(Serialize)]
struct CombinedArtifact<'a> {
    bar_chart_data: &'a RawValue,
    map_data: &'a RawValue,
}

/// Pair a national artifact with its area-level counterpart, both kept verbatim
pub fn combine_json(bar_chart_data: &str, map_data: &str) -> Result<String> {
    let combined = CombinedArtifact {
        bar_chart_data: serde_json::from_str(bar_chart_data)?,
        map_data: serde_json::from_str(map_data)?,
    };
    to_json(&combined)
}

/// Compact JSON, fields in declaration order
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Write one compact JSON document per line to stdout
pub fn write_json_lines<T: Serialize>(items: &[T]) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    for item in items {
        writeln!(handle, "{}", to_json(item)?)?;
    }
    Ok(())
}

/// Unblocked output counts keyed by combination, in run order
pub fn unblocked_counts_json(counts: &[(String, usize)]) -> Result<String> {
    to_json(&Entries(counts))
}
