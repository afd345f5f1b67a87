//! Typing and validating raw rows.
//!
//! A row that cannot become a `Rental` is excluded with a reason and
//! counted. Exclusion never aborts the batch.

use super::raw::RawRow;
use crate::model::{CheckinType, Rental, RentalStatus};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

/// Naive layouts accepted after RFC 3339; read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Why a row was left out of the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    MissingRentalId,
    InvalidRentalId,
    MissingVehicleId,
    MissingScheduledCheckout,
    InvalidScheduledCheckout,
    MissingScheduledCheckin,
    InvalidScheduledCheckin,
    InvalidActualCheckout,
    UnknownCheckinType,
    UnknownStatus,
    ScheduleInverted,
    DuplicateRentalId,
    InvalidEncoding,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionReason::MissingRentalId => "missing_rental_id",
            ExclusionReason::InvalidRentalId => "invalid_rental_id",
            ExclusionReason::MissingVehicleId => "missing_vehicle_id",
            ExclusionReason::MissingScheduledCheckout => "missing_scheduled_checkout",
            ExclusionReason::InvalidScheduledCheckout => "invalid_scheduled_checkout",
            ExclusionReason::MissingScheduledCheckin => "missing_scheduled_checkin",
            ExclusionReason::InvalidScheduledCheckin => "invalid_scheduled_checkin",
            ExclusionReason::InvalidActualCheckout => "invalid_actual_checkout",
            ExclusionReason::UnknownCheckinType => "unknown_checkin_type",
            ExclusionReason::UnknownStatus => "unknown_status",
            ExclusionReason::ScheduleInverted => "schedule_inverted",
            ExclusionReason::DuplicateRentalId => "duplicate_rental_id",
            ExclusionReason::InvalidEncoding => "invalid_encoding",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedRow {
    pub source: String,
    pub line: u64,
    pub rental_id: Option<String>,
    pub reason: ExclusionReason,
}

/// What cleaning kept and what it dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionSummary {
    pub sources: Vec<String>,
    pub rows_read: usize,
    pub rentals: usize,
    pub excluded: usize,
    pub by_reason: BTreeMap<ExclusionReason, usize>,
    pub excluded_rows: Vec<ExcludedRow>,
}

/// Parse RFC 3339 or a naive `YYYY-MM-DD HH:MM[:SS]` timestamp (UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Integer ids, also accepting the `123.0` form float-typed exports produce.
pub fn parse_rental_id(value: &str) -> Option<u64> {
    if let Ok(id) = value.parse::<u64>() {
        return Some(id);
    }
    let float = value.parse::<f64>().ok()?;
    if float.is_finite() && float >= 0.0 && float.fract() == 0.0 && float <= u64::MAX as f64 {
        Some(float as u64)
    } else {
        None
    }
}

fn required_timestamp(
    value: &Option<String>,
    missing: ExclusionReason,
    invalid: ExclusionReason,
) -> Result<DateTime<Utc>, ExclusionReason> {
    let value = value.as_deref().ok_or(missing)?;
    parse_timestamp(value).ok_or(invalid)
}

/// Turn one raw row into a rental or the first reason it cannot be one.
pub fn type_row(row: &RawRow) -> Result<Rental, ExclusionReason> {
    if row.invalid_encoding {
        return Err(ExclusionReason::InvalidEncoding);
    }
    let rental_id = row
        .rental_id
        .as_deref()
        .ok_or(ExclusionReason::MissingRentalId)?;
    let rental_id = parse_rental_id(rental_id).ok_or(ExclusionReason::InvalidRentalId)?;

    let vehicle_id = row
        .vehicle_id
        .clone()
        .ok_or(ExclusionReason::MissingVehicleId)?;

    let scheduled_checkout_at = required_timestamp(
        &row.scheduled_checkout_at,
        ExclusionReason::MissingScheduledCheckout,
        ExclusionReason::InvalidScheduledCheckout,
    )?;
    let scheduled_checkin_at = required_timestamp(
        &row.scheduled_checkin_at,
        ExclusionReason::MissingScheduledCheckin,
        ExclusionReason::InvalidScheduledCheckin,
    )?;

    // Missing is fine (lateness unreported); garbage is not
    let actual_checkout_at = match row.actual_checkout_at.as_deref() {
        None => None,
        Some(v) => Some(parse_timestamp(v).ok_or(ExclusionReason::InvalidActualCheckout)?),
    };

    let checkin_type = row
        .checkin_type
        .as_deref()
        .and_then(|v| v.parse::<CheckinType>().ok())
        .ok_or(ExclusionReason::UnknownCheckinType)?;
    let status = row
        .status
        .as_deref()
        .and_then(|v| v.parse::<RentalStatus>().ok())
        .ok_or(ExclusionReason::UnknownStatus)?;

    if scheduled_checkout_at < scheduled_checkin_at {
        return Err(ExclusionReason::ScheduleInverted);
    }

    Ok(Rental {
        rental_id,
        vehicle_id,
        checkin_type,
        scheduled_checkin_at,
        scheduled_checkout_at,
        actual_checkout_at,
        status,
    })
}

/// Type every row, then drop every copy of a duplicated rental id.
///
/// Output rentals are sorted by id and exclusions by (source, line), so the
/// result does not depend on input row order.
pub fn clean(rows: &[RawRow]) -> (Vec<Rental>, IngestionSummary) {
    let mut summary = IngestionSummary {
        rows_read: rows.len(),
        ..IngestionSummary::default()
    };
    let mut typed: Vec<(&RawRow, Rental)> = Vec::with_capacity(rows.len());

    for row in rows {
        match type_row(row) {
            Ok(rental) => typed.push((row, rental)),
            Err(reason) => exclude(&mut summary, row, reason),
        }
    }

    let mut seen: HashMap<u64, usize> = HashMap::new();
    for (_, rental) in &typed {
        *seen.entry(rental.rental_id).or_insert(0) += 1;
    }

    let mut rentals = Vec::with_capacity(typed.len());
    for (row, rental) in typed {
        if seen.get(&rental.rental_id).copied().unwrap_or(0) > 1 {
            exclude(&mut summary, row, ExclusionReason::DuplicateRentalId);
        } else {
            rentals.push(rental);
        }
    }

    rentals.sort_by_key(|r| r.rental_id);
    summary
        .excluded_rows
        .sort_by(|a, b| a.source.cmp(&b.source).then(a.line.cmp(&b.line)));
    summary.rentals = rentals.len();
    summary.excluded = summary.excluded_rows.len();

    let mut sources: Vec<String> = rows.iter().map(|r| r.source.clone()).collect();
    sources.sort();
    sources.dedup();
    summary.sources = sources;

    if summary.excluded > 0 {
        warn!(
            excluded = summary.excluded,
            rows = summary.rows_read,
            "excluded malformed rental rows"
        );
    }

    (rentals, summary)
}

fn exclude(summary: &mut IngestionSummary, row: &RawRow, reason: ExclusionReason) {
    debug!(source = %row.source, line = row.line, %reason, "excluding row");
    *summary.by_reason.entry(reason).or_insert(0) += 1;
    summary.excluded_rows.push(ExcludedRow {
        source: row.source.clone(),
        line: row.line,
        rental_id: row.rental_id.clone(),
        reason,
    });
}
