//! Example of counting a few trajectories at a two-way gate.
//!
//! Run with: cargo run --example gate_counting

use geo::{Geometry, LineString};
use trajectory_counter::geo_utils::Planar;
use trajectory_counter::{build_trajectories, Gate, IngestConfig, PointRecord, TimestampUnit};

fn record(id: &str, x: f64, y: f64, t_ms: f64, label: &str) -> PointRecord {
    PointRecord {
        id: id.to_string(),
        x,
        y,
        timestamp: t_ms,
        width: 1.8,
        length: 4.5,
        height: 1.5,
        label: Some(label.to_string()),
    }
}

fn main() {
    println!("Gate Counting Example\n");

    // Projected coordinates in metres (e.g. EPSG:3067)
    let records = vec![
        // Northbound car, one node lands exactly on the gate
        record("car-1", 0.0, -10.0, 0.0, "car"),
        record("car-1", 0.0, 0.0, 1000.0, "car"),
        record("car-1", 0.0, 10.0, 2000.0, "car"),
        // Southbound car
        record("car-2", 2.0, 12.0, 0.0, "car"),
        record("car-2", 2.0, -8.0, 1500.0, "car"),
        // Pedestrian that turns back before the gate
        record("ped-1", -3.0, -5.0, 0.0, "pedestrian"),
        record("ped-1", -3.0, -1.0, 4000.0, "pedestrian"),
        record("ped-1", -3.0, -4.0, 7000.0, "pedestrian"),
    ];

    let config = IngestConfig {
        timestamp_unit: TimestampUnit::Milliseconds,
        ..Default::default()
    };
    let trajectories = match build_trajectories(&records, &config) {
        Ok(trajectories) => trajectories,
        Err(e) => {
            eprintln!("Could not build trajectories: {}", e);
            return;
        }
    };

    let geometry = Geometry::LineString(LineString::from(vec![(-5.0, 0.0), (5.0, 0.0)]));
    let measure = Planar::meters();

    for (name, negative, positive) in [("both", true, true), ("negative", true, false), ("positive", false, true)] {
        let gate = match Gate::new(name, &geometry, negative, positive) {
            Ok(gate) => gate,
            Err(e) => {
                eprintln!("Invalid gate {}: {}", name, e);
                continue;
            }
        };

        match gate.count_trajectories(&trajectories, &measure) {
            Ok(stats) => {
                println!("Gate '{}':", stats.name);
                println!("   Crossings: {} ({} negative, {} positive)",
                    stats.trajectory_count, stats.trajectory_count_negative, stats.trajectory_count_positive);
                println!("   Average speed: {:.2} km/h", stats.average_speed);
                println!("   Average acceleration: {:.2} m/s²\n", stats.average_acceleration);
            }
            Err(e) => eprintln!("Counting failed for {}: {}\n", name, e),
        }
    }

    println!("Trajectories:");
    for trajectory in &trajectories {
        if let Ok(summary) = trajectory.summary(&measure) {
            println!("   {}: {:.2} m in {:.1} s, avg {:.2} km/h, max {:.2} km/h",
                summary.id, summary.length, summary.duration_seconds, summary.average_speed, summary.maximum_speed);
        }
    }
}
