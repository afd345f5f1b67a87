//! Dashboard tables, one CSV per table.

use super::AnalysisReport;
use crate::analyzer::BufferCounts;
use crate::error::{AnalysisError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const HISTOGRAM_FILE: &str = "histogram.csv";
pub const LINKS_FILE: &str = "links.csv";
pub const ROI_FILE: &str = "roi_curve.csv";
pub const CASCADE_FILE: &str = "cascade.csv";
pub const DELAYS_FILE: &str = "delays.csv";
pub const EXCLUSIONS_FILE: &str = "exclusions.csv";

/// Wide ROI row; the JSON shape nests the breakdown, which CSV cannot.
#[derive(Debug, Serialize)]
struct RoiRow<'a> {
    buffer_minutes: i64,
    checkin_type: &'a str,
    evaluated_links: usize,
    links_masked: usize,
    conflicts_without_buffer: usize,
    conflicts_remaining: usize,
    conflicts_resolved: i64,
    conflicts_avoided: usize,
    masking_rate: f64,
    resolution_efficiency: Option<f64>,
    avoided_rate: f64,
}

impl<'a> RoiRow<'a> {
    fn new(buffer_minutes: i64, checkin_type: &'a str, c: &BufferCounts) -> Self {
        Self {
            buffer_minutes,
            checkin_type,
            evaluated_links: c.evaluated_links,
            links_masked: c.links_masked,
            conflicts_without_buffer: c.conflicts_without_buffer,
            conflicts_remaining: c.conflicts_remaining,
            conflicts_resolved: c.conflicts_resolved,
            conflicts_avoided: c.conflicts_avoided,
            masking_rate: c.masking_rate,
            resolution_efficiency: c.resolution_efficiency,
            avoided_rate: c.avoided_rate,
        }
    }
}

fn write_rows<T, I>(path: &Path, rows: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut wtr = ::csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| AnalysisError::io(path, e))
}

/// Write every dashboard table into `dir` (created if missing).
/// Returns the written paths in a fixed order.
pub fn export_tables<P: AsRef<Path>>(dir: P, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| AnalysisError::io(dir, e))?;
    let analysis = &report.analysis;

    let histogram = dir.join(HISTOGRAM_FILE);
    write_rows(&histogram, &analysis.histogram)?;

    let links = dir.join(LINKS_FILE);
    write_rows(&links, &analysis.links)?;

    let roi = dir.join(ROI_FILE);
    write_rows(
        &roi,
        analysis.roi.points.iter().flat_map(|p| {
            std::iter::once(RoiRow::new(p.buffer_minutes, "all", &p.overall)).chain(
                p.by_checkin_type
                    .iter()
                    .map(move |(t, c)| RoiRow::new(p.buffer_minutes, t.as_str(), c)),
            )
        }),
    )?;

    let cascade = dir.join(CASCADE_FILE);
    write_rows(&cascade, &analysis.cascade.buckets)?;

    let delays = dir.join(DELAYS_FILE);
    write_rows(&delays, &analysis.delays)?;

    let exclusions = dir.join(EXCLUSIONS_FILE);
    write_rows(&exclusions, &report.ingestion.excluded_rows)?;

    let written = vec![histogram, links, roi, cascade, delays, exclusions];
    info!(dir = %dir.display(), tables = written.len(), "exported dashboard tables");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::sample_report;

    #[test]
    fn test_export_writes_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("tables");
        let written = export_tables(&out, &sample_report()).unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![HISTOGRAM_FILE, LINKS_FILE, ROI_FILE, CASCADE_FILE, DELAYS_FILE, EXCLUSIONS_FILE]
        );
        assert!(written.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_links_table_has_flags() {
        let dir = tempfile::tempdir().unwrap();
        export_tables(dir.path(), &sample_report()).unwrap();

        let text = std::fs::read_to_string(dir.path().join(LINKS_FILE)).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("vehicle_id,previous_rental_id,next_rental_id"));
        assert!(header.contains("masked"));
        assert!(header.contains("conflict_with_buffer"));
        // 4 links + header
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains("A,1,2,mobile,ended,15,20,-5,true,30,true,false"));
    }

    #[test]
    fn test_roi_table_rows() {
        let dir = tempfile::tempdir().unwrap();
        export_tables(dir.path(), &sample_report()).unwrap();

        let mut rdr = ::csv::Reader::from_path(dir.path().join(ROI_FILE)).unwrap();
        let rows: Vec<::csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        // 3 buffers x (all + mobile)
        assert_eq!(rows.len(), 6);
        assert_eq!(&rows[0][0], "0");
        assert_eq!(&rows[0][1], "all");
    }
}
