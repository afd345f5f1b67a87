//! CSV report: the ROI curve in long format, one metric per row.
//!
//! ```text
//! buffer_minutes;checkin_type;metric;value
//! 0;all;links_masked;0
//! 0;all;masking_rate;0
//! 0;mobile;links_masked;0
//! ```

use super::AnalysisReport;
use crate::analyzer::BufferCounts;
use std::io::{self, Write};

pub const DELIMITER: u8 = b';';

fn metrics(counts: &BufferCounts) -> [(&'static str, Option<f64>); 9] {
    [
        ("evaluated_links", Some(counts.evaluated_links as f64)),
        ("links_masked", Some(counts.links_masked as f64)),
        ("conflicts_without_buffer", Some(counts.conflicts_without_buffer as f64)),
        ("conflicts_remaining", Some(counts.conflicts_remaining as f64)),
        ("conflicts_resolved", Some(counts.conflicts_resolved as f64)),
        ("conflicts_avoided", Some(counts.conflicts_avoided as f64)),
        ("masking_rate", Some(counts.masking_rate)),
        ("resolution_efficiency", counts.resolution_efficiency),
        ("avoided_rate", Some(counts.avoided_rate)),
    ]
}

pub fn write<W: Write>(writer: &mut W, report: &AnalysisReport) -> io::Result<()> {
    let mut wtr = ::csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_writer(writer);

    wtr.write_record(["buffer_minutes", "checkin_type", "metric", "value"])?;

    for point in &report.analysis.roi.points {
        let buffer = point.buffer_minutes.to_string();
        let groups = std::iter::once(("all", &point.overall)).chain(
            point
                .by_checkin_type
                .iter()
                .map(|(t, counts)| (t.as_str(), counts)),
        );
        for (group, counts) in groups {
            for (metric, value) in metrics(counts) {
                // Undefined ratios are left empty
                let value = value.map(|v| v.to_string()).unwrap_or_default();
                wtr.write_record([buffer.as_str(), group, metric, value.as_str()])?;
            }
        }
    }

    wtr.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::sample_report;

    #[test]
    fn test_long_format_rows() {
        let report = sample_report();
        let mut buf = Vec::new();
        write(&mut buf, &report).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "buffer_minutes;checkin_type;metric;value");
        assert!(lines.contains(&"30;all;links_masked;1"));
        assert!(lines.contains(&"0;all;resolution_efficiency;"), "undefined ratio stays empty");
        assert!(lines.iter().all(|l| l.split(';').count() == 4));
    }

    #[test]
    fn test_row_count() {
        let report = sample_report();
        let mut buf = Vec::new();
        write(&mut buf, &report).unwrap();
        let text = String::from_utf8(buf).unwrap();

        // 3 buffers x (all + mobile) x 9 metrics + header
        assert_eq!(text.lines().count(), 3 * 2 * 9 + 1);
    }
}
