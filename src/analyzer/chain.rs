//! Linking consecutive rentals of the same vehicle.
//!
//! Each vehicle's rentals are ordered by scheduled checkout (ties broken by
//! rental id) and every consecutive pair becomes one link, so a vehicle with
//! N rentals yields N - 1 links. Vehicles are independent, which makes them
//! the unit of parallel work.

use crate::model::{CheckinType, Rental, RentalStatus};
use chrono::Duration;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Two temporally adjacent rentals of one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink<'a> {
    pub previous: &'a Rental,
    pub next: &'a Rental,
}

impl<'a> ChainLink<'a> {
    /// Scheduled start of `next` minus scheduled return of `previous`.
    /// Negative when the two bookings overlap on the schedule.
    pub fn gap(&self) -> Duration {
        self.next.scheduled_checkin_at - self.previous.scheduled_checkout_at
    }

    pub fn gap_minutes(&self) -> i64 {
        self.gap().num_minutes()
    }

    /// Previous rental actually returned after the next one was due to start.
    /// `None` when the previous return was never reported.
    pub fn conflict(&self) -> Option<bool> {
        self.previous
            .actual_checkout_at
            .map(|actual| actual > self.next.scheduled_checkin_at)
    }

    pub fn is_evaluable(&self) -> bool {
        self.previous.actual_checkout_at.is_some()
    }

    pub fn vehicle_id(&self) -> &'a str {
        &self.previous.vehicle_id
    }
}

fn schedule_order(a: &&Rental, b: &&Rental) -> std::cmp::Ordering {
    a.scheduled_checkout_at
        .cmp(&b.scheduled_checkout_at)
        .then(a.rental_id.cmp(&b.rental_id))
}

/// Links for one vehicle's rentals (any order in, schedule order out).
pub fn link_vehicle<'a>(mut rentals: Vec<&'a Rental>) -> Vec<ChainLink<'a>> {
    rentals.sort_by(schedule_order);
    rentals
        .windows(2)
        .map(|pair| ChainLink {
            previous: pair[0],
            next: pair[1],
        })
        .collect()
}

/// Build every link in the table.
///
/// Output is sorted by (vehicle id, previous scheduled checkout, previous
/// rental id) and does not depend on input order.
pub fn build_chains(rentals: &[Rental]) -> Vec<ChainLink<'_>> {
    let mut by_vehicle: BTreeMap<&str, Vec<&Rental>> = BTreeMap::new();
    for rental in rentals {
        by_vehicle
            .entry(rental.vehicle_id.as_str())
            .or_default()
            .push(rental);
    }

    let mut links: Vec<ChainLink<'_>> = by_vehicle
        .into_values()
        .collect::<Vec<_>>()
        .into_par_iter()
        .flat_map_iter(link_vehicle)
        .collect();

    links.sort_by(|a, b| {
        a.vehicle_id()
            .cmp(b.vehicle_id())
            .then_with(|| schedule_order(&a.previous, &b.previous))
    });
    links
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    pub links: usize,
    pub vehicles: usize,
    /// Vehicles with at least two rentals
    pub chained_vehicles: usize,
    /// Links whose previous return is known
    pub evaluable: usize,
    /// Links with a conflict and no buffer
    pub conflicts: usize,
    /// Links whose bookings overlap on the schedule itself (negative gap)
    pub overlapping: usize,
}

impl LinkSummary {
    pub fn from_links<'r, I>(rentals: I, links: &[ChainLink<'_>]) -> Self
    where
        I: IntoIterator<Item = &'r Rental>,
    {
        let vehicles: BTreeSet<&str> = rentals
            .into_iter()
            .map(|r| r.vehicle_id.as_str())
            .collect();
        let chained: BTreeSet<&str> = links.iter().map(|l| l.vehicle_id()).collect();
        Self {
            links: links.len(),
            vehicles: vehicles.len(),
            chained_vehicles: chained.len(),
            evaluable: links.iter().filter(|l| l.is_evaluable()).count(),
            conflicts: links.iter().filter(|l| l.conflict() == Some(true)).count(),
            overlapping: links.iter().filter(|l| l.gap() < Duration::zero()).count(),
        }
    }
}

/// Flattened link for the dashboard table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRow {
    pub vehicle_id: String,
    pub previous_rental_id: u64,
    pub next_rental_id: u64,
    pub next_checkin_type: CheckinType,
    pub next_status: RentalStatus,
    pub gap_minutes: i64,
    pub previous_delay_minutes: Option<i64>,
    pub next_delay_minutes: Option<i64>,
    /// Conflict with no buffer
    pub conflict: Option<bool>,
    /// Buffer the two flags below were evaluated at
    pub buffer_minutes: i64,
    pub masked: bool,
    pub conflict_with_buffer: Option<bool>,
}

impl LinkRow {
    pub fn new(link: &ChainLink<'_>, buffer_minutes: i64) -> Self {
        Self {
            vehicle_id: link.previous.vehicle_id.clone(),
            previous_rental_id: link.previous.rental_id,
            next_rental_id: link.next.rental_id,
            next_checkin_type: link.next.checkin_type,
            next_status: link.next.status,
            gap_minutes: link.gap_minutes(),
            previous_delay_minutes: link.previous.delay_minutes(),
            next_delay_minutes: link.next.delay_minutes(),
            conflict: link.conflict(),
            buffer_minutes,
            masked: super::buffer::is_masked(link, buffer_minutes),
            conflict_with_buffer: super::buffer::conflicts_with_buffer(link, buffer_minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::rental;

    // ==========================================================================
    // CHAIN CONSTRUCTION
    // ==========================================================================
    //
    // Rentals are linked per vehicle, consecutive in scheduled-checkout order.
    // No cross-vehicle links, no gap threshold at this stage.
    // ==========================================================================

    #[test]
    fn test_n_rentals_make_n_minus_one_links() {
        let rentals = vec![
            rental(1, "A", 0, 100, Some(0)),
            rental(2, "A", 200, 300, Some(0)),
            rental(3, "A", 5000, 6000, Some(0)),
            rental(4, "B", 0, 100, Some(0)),
        ];
        let links = build_chains(&rentals);

        assert_eq!(links.len(), 2, "A yields 2 links, B yields none");
        assert!(links.iter().all(|l| l.previous.vehicle_id == l.next.vehicle_id));
    }

    #[test]
    fn test_large_gaps_are_still_linked() {
        let rentals = vec![
            rental(1, "A", 0, 100, Some(0)),
            rental(2, "A", 100_000, 100_100, Some(0)),
        ];
        let links = build_chains(&rentals);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].gap_minutes(), 99_900);
    }

    #[test]
    fn test_ties_broken_by_rental_id() {
        let rentals = vec![
            rental(9, "A", 0, 100, Some(0)),
            rental(3, "A", 50, 100, Some(0)),
        ];
        let links = build_chains(&rentals);
        assert_eq!(links[0].previous.rental_id, 3);
        assert_eq!(links[0].next.rental_id, 9);
    }

    #[test]
    fn test_output_independent_of_input_order() {
        let forward = vec![
            rental(1, "A", 0, 100, Some(5)),
            rental(2, "B", 0, 100, None),
            rental(3, "A", 120, 300, Some(0)),
            rental(4, "B", 130, 200, Some(0)),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a: Vec<(u64, u64)> = build_chains(&forward)
            .iter()
            .map(|l| (l.previous.rental_id, l.next.rental_id))
            .collect();
        let b: Vec<(u64, u64)> = build_chains(&reversed)
            .iter()
            .map(|l| (l.previous.rental_id, l.next.rental_id))
            .collect();
        assert_eq!(a, b);
        assert_eq!(a, vec![(1, 3), (2, 4)]);
    }

    #[test]
    fn test_empty_table_has_no_links() {
        assert!(build_chains(&[]).is_empty());
    }

    // ==========================================================================
    // LINK ATTRIBUTES
    // ==========================================================================

    #[test]
    fn test_gap_and_conflict_example() {
        // R1 due back 10:00, returned 10:20; R2 starts 10:15
        let rentals = vec![
            rental(1, "V", 8 * 60, 10 * 60, Some(20)),
            rental(2, "V", 10 * 60 + 15, 12 * 60, None),
        ];
        let links = build_chains(&rentals);

        assert_eq!(links[0].gap_minutes(), 15);
        assert_eq!(links[0].conflict(), Some(true));
    }

    #[test]
    fn test_unknown_previous_return_has_unknown_conflict() {
        let rentals = vec![
            rental(1, "V", 0, 600, None),
            rental(2, "V", 610, 700, Some(0)),
        ];
        let links = build_chains(&rentals);
        assert_eq!(links[0].conflict(), None);
        assert!(!links[0].is_evaluable());
    }

    #[test]
    fn test_link_summary() {
        let rentals = vec![
            rental(1, "A", 0, 600, Some(30)),
            rental(2, "A", 610, 700, Some(-60)),
            rental(3, "A", 650, 800, None),
            rental(4, "B", 0, 100, None),
        ];
        let links = build_chains(&rentals);
        let summary = LinkSummary::from_links(&rentals, &links);

        assert_eq!(summary.links, 2);
        assert_eq!(summary.vehicles, 2);
        assert_eq!(summary.chained_vehicles, 1);
        assert_eq!(summary.evaluable, 2);
        assert_eq!(summary.conflicts, 1);
        assert_eq!(summary.overlapping, 1, "rental 3 starts before rental 2 ends");
    }
}
