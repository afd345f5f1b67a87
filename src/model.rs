//! Rental records as loaded from the input table.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the car was handed over at check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckinType {
    Mobile,
    Connect,
    Paper,
}

impl CheckinType {
    pub const ALL: [CheckinType; 3] = [CheckinType::Mobile, CheckinType::Connect, CheckinType::Paper];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckinType::Mobile => "mobile",
            CheckinType::Connect => "connect",
            CheckinType::Paper => "paper",
        }
    }
}

impl fmt::Display for CheckinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile" => Ok(CheckinType::Mobile),
            "connect" => Ok(CheckinType::Connect),
            "paper" => Ok(CheckinType::Paper),
            other => Err(format!("unknown checkin type '{}'", other)),
        }
    }
}

/// Final state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Ended,
    Canceled,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Ended => "ended",
            RentalStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RentalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ended" => Ok(RentalStatus::Ended),
            // Both spellings show up in exports
            "canceled" | "cancelled" => Ok(RentalStatus::Canceled),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// A completed or canceled rental. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rental {
    pub rental_id: u64,
    pub vehicle_id: String,
    pub checkin_type: CheckinType,
    /// Scheduled start of the rental
    pub scheduled_checkin_at: DateTime<Utc>,
    /// Scheduled return of the vehicle
    pub scheduled_checkout_at: DateTime<Utc>,
    /// Real return time; `None` when lateness was never reported
    pub actual_checkout_at: Option<DateTime<Utc>>,
    pub status: RentalStatus,
}

impl Rental {
    /// Actual minus scheduled checkout. Negative means an early return.
    pub fn delay(&self) -> Option<Duration> {
        self.actual_checkout_at
            .map(|actual| actual - self.scheduled_checkout_at)
    }

    /// Lateness in whole minutes, truncated toward zero.
    pub fn delay_minutes(&self) -> Option<i64> {
        self.delay().map(|d| d.num_minutes())
    }

    pub fn is_canceled(&self) -> bool {
        self.status == RentalStatus::Canceled
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_delay_minutes_late_early_on_time() {
        assert_eq!(rental(1, "V", 0, 600, Some(20)).delay_minutes(), Some(20));
        assert_eq!(rental(2, "V", 0, 600, Some(-45)).delay_minutes(), Some(-45));
        assert_eq!(rental(3, "V", 0, 600, Some(0)).delay_minutes(), Some(0));
    }

    #[test]
    fn test_unknown_delay_stays_unknown() {
        // Never coerced to zero
        let r = rental(1, "V", 0, 600, None);
        assert_eq!(r.delay(), None);
        assert_eq!(r.delay_minutes(), None);
    }

    #[test]
    fn test_checkin_type_parsing() {
        assert_eq!("Mobile".parse::<CheckinType>(), Ok(CheckinType::Mobile));
        assert_eq!(" connect ".parse::<CheckinType>(), Ok(CheckinType::Connect));
        assert_eq!("paper".parse::<CheckinType>(), Ok(CheckinType::Paper));
        assert!("kiosk".parse::<CheckinType>().is_err());
    }

    #[test]
    fn test_status_accepts_both_spellings() {
        assert_eq!("canceled".parse::<RentalStatus>(), Ok(RentalStatus::Canceled));
        assert_eq!("cancelled".parse::<RentalStatus>(), Ok(RentalStatus::Canceled));
        assert_eq!("ENDED".parse::<RentalStatus>(), Ok(RentalStatus::Ended));
        assert!("pending".parse::<RentalStatus>().is_err());
    }

    #[test]
    fn test_serialized_enums_are_lowercase() {
        assert_eq!(serde_json::to_string(&CheckinType::Connect).unwrap(), "\"connect\"");
        assert_eq!(serde_json::to_string(&RentalStatus::Canceled).unwrap(), "\"canceled\"");
    }
}
