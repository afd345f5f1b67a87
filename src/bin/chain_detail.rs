//! Print one vehicle's rental chain and how each link fares under a set of buffers

use rentalgap::analyzer::buffer::{conflicts_with_buffer, is_masked};
use rentalgap::analyzer::chain::link_vehicle;
use rentalgap::config::validate_buffer;
use rentalgap::ingest;
use std::env;

const DEFAULT_BUFFERS: [i64; 5] = [0, 30, 60, 120, 180];

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: chain_detail <table.csv|dir> <vehicle_id> [buffer,buffer,...]");
        std::process::exit(1);
    }

    let buffers: Vec<i64> = match args.get(3) {
        Some(list) => match list.split(',').map(|b| b.trim().parse::<i64>()).collect() {
            Ok(b) => b,
            Err(e) => {
                eprintln!("Bad buffer list '{}': {}", list, e);
                std::process::exit(1);
            }
        },
        None => DEFAULT_BUFFERS.to_vec(),
    };
    if let Err(e) = buffers.iter().try_for_each(|&b| validate_buffer(b).map(|_| ())) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let batch = match ingest::load(&args[1]) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to load {}: {}", args[1], e);
            std::process::exit(1);
        }
    };

    let vehicle = &args[2];
    let rentals: Vec<_> = batch.rentals.iter().filter(|r| &r.vehicle_id == vehicle).collect();
    if rentals.is_empty() {
        eprintln!("No rentals for vehicle {}", vehicle);
        std::process::exit(1);
    }

    println!("\n{}", "=".repeat(60));
    println!("VEHICLE: {} ({} rentals)", vehicle, rentals.len());
    println!("{}", "=".repeat(60));

    for r in &rentals {
        println!(
            "  #{:<10} {:<8} {:<9} {} -> {}  delay {}",
            r.rental_id,
            r.checkin_type,
            r.status,
            r.scheduled_checkin_at.format("%Y-%m-%d %H:%M"),
            r.scheduled_checkout_at.format("%Y-%m-%d %H:%M"),
            r.delay_minutes()
                .map(|d| format!("{} min", d))
                .unwrap_or_else(|| "unknown".to_string())
        );
    }

    let links = link_vehicle(rentals);
    if links.is_empty() {
        println!("\nSingle rental, no links.");
        return;
    }

    println!("\nLinks:");
    for link in &links {
        let conflict = match link.conflict() {
            Some(true) => "CONFLICT",
            Some(false) => "ok",
            None => "unknown",
        };
        println!(
            "  #{} -> #{}  gap {} min  no buffer: {}",
            link.previous.rental_id,
            link.next.rental_id,
            link.gap_minutes(),
            conflict
        );

        let cells: Vec<String> = buffers
            .iter()
            .map(|&b| {
                let state = if is_masked(link, b) {
                    "masked"
                } else {
                    match conflicts_with_buffer(link, b) {
                        Some(true) => "conflict",
                        Some(false) => "clear",
                        None => "?",
                    }
                };
                format!("{}m:{}", b, state)
            })
            .collect();
        println!("      {}", cells.join("  "));
    }
}
