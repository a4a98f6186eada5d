/// Development mode utilities for working without the live page
///
/// When the sensor network page is unreachable (or you simply do not want to
/// hit it while iterating), use this module to replay a previously persisted
/// `sensor_data.csv` as if it had just been scraped.

use std::path::{Path, PathBuf};

use crate::ingest::{ExtractError, Extractor};
use crate::model::RawRow;

/// Extractor that serves rows from a columnar CSV file.
pub struct ReplayExtractor {
    path: PathBuf,
}

impl ReplayExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads rows with the `SENSOR NAME, OBS TIME, NORMAL LEVEL, CURRENT,
/// DESCRIPTION` header written by the snapshot store.
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>, ExtractError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ExtractError::Replay(format!("{}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for record in reader.deserialize::<RawRow>() {
        let row = record.map_err(|e| ExtractError::Replay(format!("{}: {}", path.display(), e)))?;
        rows.push(row);
    }
    Ok(rows)
}

impl Extractor for ReplayExtractor {
    /// `source` is ignored; rows always come from the replay file.
    fn fetch(&mut self, _source: &str) -> Result<Vec<RawRow>, ExtractError> {
        let rows = read_rows(&self.path)?;
        if rows.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(rows)
    }

    fn name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_replay_reads_persisted_rows() {
        let file = write_csv(
            "SENSOR NAME,OBS TIME,NORMAL LEVEL,CURRENT,DESCRIPTION\n\
             Libis,2024-09-01 08:00,0.50m,0.35m,Passable\n\
             QCPU,2024-09-01 08:00,,2.5,\n",
        );
        let mut replay = ReplayExtractor::new(file.path());
        let rows = replay.fetch("ignored").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], RawRow::new("Libis", "2024-09-01 08:00", "0.50m", "0.35m", "Passable"));
        assert_eq!(rows[1].current_value, "2.5");
    }

    #[test]
    fn test_replay_of_header_only_file_is_empty() {
        let file = write_csv("SENSOR NAME,OBS TIME,NORMAL LEVEL,CURRENT,DESCRIPTION\n");
        let mut replay = ReplayExtractor::new(file.path());
        assert_eq!(replay.fetch("ignored"), Err(ExtractError::Empty));
    }

    #[test]
    fn test_replay_of_missing_file_is_replay_error() {
        let mut replay = ReplayExtractor::new("/nonexistent/sensor_data.csv");
        assert!(matches!(replay.fetch("ignored"), Err(ExtractError::Replay(_))));
    }

    #[test]
    fn test_replay_of_wrong_columns_is_replay_error() {
        let file = write_csv("name,value\nLibis,0.35m\n");
        let mut replay = ReplayExtractor::new(file.path());
        assert!(matches!(replay.fetch("ignored"), Err(ExtractError::Replay(_))));
    }
}
