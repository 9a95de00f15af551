use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{BatchRequest, ObservationSource};
use crate::catalog::open_file;
use crate::observations::ObservationBatch;
use crate::types::Result;

/// Batches previously downloaded as gzipped JSON under one directory
pub struct GzJsonSource {
    root: PathBuf,
}

impl GzJsonSource {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl ObservationSource for GzJsonSource {
    fn fetch(&mut self, request: &BatchRequest) -> Result<ObservationBatch> {
        let path = self.root.join(request.relative_path());
        debug!(path = %path.display(), "Reading batch");
        read_gz_json(&path)
    }
}

pub fn read_gz_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = open_file(path)?;
    let decoder = GzDecoder::new(file);
    Ok(serde_json::from_reader(BufReader::new(decoder))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinations::Combination;
    use crate::error::Error;
    use crate::source::area_request;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_gz(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(contents.as_bytes()).unwrap();
        fs::write(path, encoder.finish().unwrap()).unwrap();
    }

    #[test]
    fn test_fetch_batch() {
        let dir = TempDir::new().unwrap();
        write_gz(
            &dir.path().join("1var-by-ltla/sex_by_geog.json.gz"),
            r#"{"blocked_areas": 2, "observations": [
                {"dimensions": [{"dimension_id": "ltla", "option_id": "E06000001"},
                                {"dimension_id": "sex", "option_id": "1"}],
                 "observation": 40}]}"#,
        );

        let mut source = GzJsonSource::new(dir.path());
        let batch = source
            .fetch(&area_request(&Combination::from_ids(&["sex"])))
            .unwrap();
        assert_eq!(batch.blocked_areas, 2);
        assert!(batch.observations.is_array());
    }

    #[test]
    fn test_missing_batch_names_path() {
        let dir = TempDir::new().unwrap();
        let mut source = GzJsonSource::new(dir.path());
        let err = source
            .fetch(&area_request(&Combination::from_ids(&["sex"])))
            .unwrap_err();
        match err {
            Error::Io(e) => assert!(e.to_string().contains("sex_by_geog.json.gz")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_batch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json.gz");
        write_gz(&path, "{\"blocked_areas\": ");
        let result: Result<ObservationBatch> = read_gz_json(&path);
        assert!(matches!(result, Err(Error::Json(_))));
    }
}
