//! Reading rental tables into untyped rows.
//!
//! Both readers resolve the same logical columns (with the aliases used by
//! the original delay export) and fail the whole source when one is absent.
//! Cell values are kept as trimmed strings; typing happens in `clean`.

use crate::error::{AnalysisError, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Logical columns every rental table must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    RentalId,
    VehicleId,
    CheckinType,
    ScheduledCheckinAt,
    ScheduledCheckoutAt,
    ActualCheckoutAt,
    Status,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::RentalId,
        Column::VehicleId,
        Column::CheckinType,
        Column::ScheduledCheckinAt,
        Column::ScheduledCheckoutAt,
        Column::ActualCheckoutAt,
        Column::Status,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::RentalId => "rental_id",
            Column::VehicleId => "vehicle_id",
            Column::CheckinType => "checkin_type",
            Column::ScheduledCheckinAt => "scheduled_checkin_at",
            Column::ScheduledCheckoutAt => "scheduled_checkout_at",
            Column::ActualCheckoutAt => "actual_checkout_at",
            Column::Status => "status",
        }
    }

    /// Alternative header names accepted for this column.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::VehicleId => &["car_id"],
            Column::Status => &["state"],
            _ => &[],
        }
    }

    fn matches(&self, header: &str) -> bool {
        let header = header.trim();
        header.eq_ignore_ascii_case(self.name())
            || self.aliases().iter().any(|a| header.eq_ignore_ascii_case(a))
    }
}

/// One input row before typing. `None` means the cell was empty or a null marker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub source: String,
    /// 1-based line (CSV) or record index (JSON)
    pub line: u64,
    pub rental_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub checkin_type: Option<String>,
    pub scheduled_checkin_at: Option<String>,
    pub scheduled_checkout_at: Option<String>,
    pub actual_checkout_at: Option<String>,
    pub status: Option<String>,
    /// At least one cell was not valid UTF-8 and was left unread
    pub invalid_encoding: bool,
}

impl RawRow {
    fn set(&mut self, column: Column, value: Option<String>) {
        let slot = match column {
            Column::RentalId => &mut self.rental_id,
            Column::VehicleId => &mut self.vehicle_id,
            Column::CheckinType => &mut self.checkin_type,
            Column::ScheduledCheckinAt => &mut self.scheduled_checkin_at,
            Column::ScheduledCheckoutAt => &mut self.scheduled_checkout_at,
            Column::ActualCheckoutAt => &mut self.actual_checkout_at,
            Column::Status => &mut self.status,
        };
        *slot = value;
    }
}

/// Trim a cell and map null markers to `None`.
pub fn normalize_cell(cell: &str) -> Option<String> {
    let cell = cell.trim();
    let is_null = cell.is_empty()
        || ["na", "nan", "null", "none", "nat"]
            .iter()
            .any(|m| cell.eq_ignore_ascii_case(m));
    if is_null {
        None
    } else {
        Some(cell.to_string())
    }
}

fn missing_columns(source: &str, present: impl Fn(Column) -> bool) -> Result<()> {
    let missing: Vec<String> = Column::ALL
        .iter()
        .filter(|c| !present(**c))
        .map(|c| c.name().to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::MissingColumns {
            source_name: source.to_string(),
            missing,
        })
    }
}

/// Read CSV text with a header row.
pub fn read_csv<R: std::io::Read>(reader: R, source: &str) -> Result<Vec<RawRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let positions: Vec<(Column, Option<usize>)> = Column::ALL
        .iter()
        .map(|c| (*c, headers.iter().position(|h| c.matches(h))))
        .collect();
    missing_columns(source, |c| {
        positions.iter().any(|(col, pos)| *col == c && pos.is_some())
    })?;

    let mut rows = Vec::new();
    for record in csv_reader.byte_records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let mut row = RawRow {
            source: source.to_string(),
            line,
            ..RawRow::default()
        };
        for (column, pos) in &positions {
            let Some(bytes) = pos.and_then(|i| record.get(i)) else {
                continue;
            };
            match std::str::from_utf8(bytes) {
                Ok(cell) => row.set(*column, normalize_cell(cell)),
                Err(_) => row.invalid_encoding = true,
            }
        }
        rows.push(row);
    }

    debug!(source, rows = rows.len(), "read csv table");
    Ok(rows)
}

fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => normalize_cell(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn json_lookup<'a>(object: &'a Map<String, Value>, column: Column) -> Option<&'a Value> {
    object
        .iter()
        .find(|(key, _)| column.matches(key))
        .map(|(_, value)| value)
}

/// Read a JSON array of row objects.
pub fn read_json<R: std::io::Read>(reader: R, source: &str) -> Result<Vec<RawRow>> {
    let objects: Vec<Map<String, Value>> = serde_json::from_reader(reader)?;

    // An empty array has no rows to check
    if !objects.is_empty() {
        missing_columns(source, |c| {
            objects.iter().any(|o| json_lookup(o, c).is_some())
        })?;
    }

    let rows: Vec<RawRow> = objects
        .iter()
        .enumerate()
        .map(|(idx, object)| {
            let mut row = RawRow {
                source: source.to_string(),
                line: idx as u64 + 1,
                ..RawRow::default()
            };
            for column in Column::ALL {
                row.set(column, json_lookup(object, column).and_then(json_cell));
            }
            row
        })
        .collect();

    debug!(source, rows = rows.len(), "read json table");
    Ok(rows)
}

/// Read one file, choosing the reader from its extension.
pub fn read_source(path: &Path) -> Result<Vec<RawRow>> {
    let source = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| AnalysisError::io(path, e))?;
    let reader = std::io::BufReader::new(file);

    match extension(path).as_str() {
        "json" => read_json(reader, &source),
        _ => read_csv(reader, &source),
    }
}

pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}
