//! JSON report: the whole [`AnalysisReport`], pretty-printed.

use super::AnalysisReport;
use std::io::{self, Write};

pub fn write<W: Write>(writer: &mut W, report: &AnalysisReport) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, report)?;
    writeln!(writer)
}
