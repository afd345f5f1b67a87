//! Dataset-level shares shown above the detailed analyses.

use super::lateness::CheckoutOutcome;
use crate::model::{CheckinType, Rental, RentalStatus};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub count: usize,
    pub share: f64,
}

/// Early / on-time / late checkouts for one checkin type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutBreakdown {
    pub checkin_type: CheckinType,
    pub rentals: usize,
    /// Rentals with a known return
    pub known: usize,
    pub outcomes: BTreeMap<CheckoutOutcome, Share>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOverview {
    pub rentals: usize,
    pub vehicles: usize,
    pub status_share: BTreeMap<RentalStatus, Share>,
    pub checkin_share: BTreeMap<CheckinType, Share>,
    pub checkout_by_checkin: Vec<CheckoutBreakdown>,
}

fn shares<K: Ord>(counts: BTreeMap<K, usize>, total: usize) -> BTreeMap<K, Share> {
    counts
        .into_iter()
        .map(|(k, count)| {
            let share = if total == 0 { 0.0 } else { count as f64 / total as f64 };
            (k, Share { count, share })
        })
        .collect()
}

impl DatasetOverview {
    pub fn from_rentals<'a, I>(rentals: I) -> Self
    where
        I: IntoIterator<Item = &'a Rental>,
    {
        let rentals: Vec<&Rental> = rentals.into_iter().collect();
        let vehicles: BTreeSet<&str> = rentals.iter().map(|r| r.vehicle_id.as_str()).collect();

        let mut status: BTreeMap<RentalStatus, usize> = BTreeMap::new();
        let mut checkin: BTreeMap<CheckinType, usize> = BTreeMap::new();
        for r in &rentals {
            *status.entry(r.status).or_default() += 1;
            *checkin.entry(r.checkin_type).or_default() += 1;
        }

        let checkout_by_checkin = CheckinType::ALL
            .into_iter()
            .filter(|t| checkin.contains_key(t))
            .map(|checkin_type| {
                let of_type: Vec<&&Rental> =
                    rentals.iter().filter(|r| r.checkin_type == checkin_type).collect();
                let mut outcomes: BTreeMap<CheckoutOutcome, usize> = BTreeMap::new();
                for delay in of_type.iter().filter_map(|r| r.delay_minutes()) {
                    *outcomes.entry(CheckoutOutcome::classify(delay)).or_default() += 1;
                }
                let known = outcomes.values().sum();
                CheckoutBreakdown {
                    checkin_type,
                    rentals: of_type.len(),
                    known,
                    outcomes: shares(outcomes, known),
                }
            })
            .collect();

        Self {
            rentals: rentals.len(),
            vehicles: vehicles.len(),
            status_share: shares(status, rentals.len()),
            checkin_share: shares(checkin, rentals.len()),
            checkout_by_checkin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::rental;

    #[test]
    fn test_overview_shares() {
        let mut rentals = vec![
            rental(1, "A", 0, 100, Some(-10)),
            rental(2, "A", 200, 300, Some(0)),
            rental(3, "B", 0, 100, Some(25)),
            rental(4, "B", 200, 300, None),
        ];
        rentals[3].status = RentalStatus::Canceled;
        rentals[2].checkin_type = CheckinType::Connect;

        let overview = DatasetOverview::from_rentals(&rentals);

        assert_eq!(overview.rentals, 4);
        assert_eq!(overview.vehicles, 2);
        assert_eq!(overview.status_share[&RentalStatus::Canceled].count, 1);
        assert_eq!(overview.status_share[&RentalStatus::Ended].share, 0.75);
        assert_eq!(overview.checkin_share[&CheckinType::Connect].share, 0.25);

        let mobile = &overview.checkout_by_checkin[0];
        assert_eq!(mobile.checkin_type, CheckinType::Mobile);
        assert_eq!(mobile.rentals, 3);
        assert_eq!(mobile.known, 2);
        assert_eq!(mobile.outcomes[&CheckoutOutcome::Early].share, 0.5);
        assert!(!mobile.outcomes.contains_key(&CheckoutOutcome::Late));
        assert_eq!(overview.checkout_by_checkin.len(), 2, "no paper rentals");
    }

    #[test]
    fn test_overview_empty() {
        let overview = DatasetOverview::from_rentals(&[]);
        assert_eq!(overview.rentals, 0);
        assert!(overview.checkout_by_checkin.is_empty());
    }
}
