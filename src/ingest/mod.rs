//! Ingestion: finding rental tables, reading them and cleaning rows.
//!
//! ```ignore
//! use rentalgap::ingest;
//!
//! let batch = ingest::load("exports/")?;   // every .csv / .json below exports/
//! println!("{} rentals, {} excluded", batch.rentals.len(), batch.summary.excluded);
//! ```

pub mod clean;
pub mod raw;

pub use clean::{clean, parse_timestamp, ExcludedRow, ExclusionReason, IngestionSummary};
pub use raw::{read_csv, read_json, read_source, Column, RawRow};

use crate::error::{AnalysisError, Result};
use crate::model::Rental;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// File extensions recognised as rental tables
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["csv", "json"];

/// Cleaned rentals plus the record of what was excluded.
#[derive(Debug, Clone, Default)]
pub struct RentalBatch {
    pub rentals: Vec<Rental>,
    pub summary: IngestionSummary,
}

impl RentalBatch {
    pub fn from_rows(rows: &[RawRow]) -> Self {
        let (rentals, summary) = clean(rows);
        info!(
            rentals = summary.rentals,
            excluded = summary.excluded,
            "cleaned rental table"
        );
        Self { rentals, summary }
    }
}

pub fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&raw::extension(path).as_str())
}

/// List the tables under `path`: the file itself, or every supported file
/// below a directory, sorted so runs are reproducible.
pub fn discover<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AnalysisError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        ));
    }

    let mut files: Vec<PathBuf> = if path.is_dir() {
        WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_supported(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect()
    } else {
        vec![path.to_path_buf()]
    };
    files.sort();

    if files.is_empty() {
        return Err(AnalysisError::NoInput(path.to_path_buf()));
    }
    Ok(files)
}

/// Discover, read and clean everything under `path`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<RentalBatch> {
    let mut rows = Vec::new();
    for file in discover(path)? {
        rows.extend(read_source(&file)?);
    }
    Ok(RentalBatch::from_rows(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("a/rentals.csv")));
        assert!(is_supported(Path::new("a/rentals.JSON")));
        assert!(!is_supported(Path::new("a/rentals.xlsx")));
        assert!(!is_supported(Path::new("a/README")));
    }

    #[test]
    fn test_discover_missing_path() {
        let err = discover("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, AnalysisError::Io { .. }));
    }
}
