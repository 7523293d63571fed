//! Example of counting many trajectories against several gates and areas.
//!
//! Run with: cargo run --example batch_counting --features parallel

use geo::{polygon, Geometry, LineString};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use trajectory_counter::geo_utils::Planar;
use trajectory_counter::{
    count_all, Area, BatchConfig, Gate, ProgressCallback, TimestampUnit, Trajectory, TrajectoryNode,
};

fn main() {
    println!("Batch Counting Example\n");

    // Synthetic traffic on a 1 km grid: northbound and eastbound lanes
    let mut trajectories = Vec::new();
    for i in 0..2000 {
        let lane = (i % 10) as f64 * 100.0 + 50.0;
        let speed = 8.0 + (i % 7) as f64; // m/s
        let northbound = i % 2 == 0;

        let nodes: Vec<TrajectoryNode> = (0..=20)
            .filter_map(|step| {
                let along = step as f64 * 50.0;
                let (x, y) = if northbound { (lane, along) } else { (along, lane) };
                let t_ms = along / speed * 1000.0;
                TrajectoryNode::from_coordinates(x, y, t_ms, 1.8, 4.5, 1.5, TimestampUnit::Milliseconds).ok()
            })
            .collect();

        if let Ok(trajectory) = Trajectory::new(format!("vehicle-{}", i), nodes) {
            trajectories.push(trajectory);
        }
    }

    let mut gates = Vec::new();
    for (name, coords) in [
        ("south-screen", vec![(0.0, 475.0), (1000.0, 475.0)]),
        ("west-screen", vec![(475.0, 0.0), (475.0, 1000.0)]),
        ("corner", vec![(200.0, 300.0), (300.0, 300.0), (300.0, 200.0)]),
    ] {
        match Gate::new(name, &Geometry::LineString(LineString::from(coords)), true, true) {
            Ok(gate) => gates.push(gate),
            Err(e) => eprintln!("Invalid gate {}: {}", name, e),
        }
    }

    let square = polygon![(x: 400.0, y: 400.0), (x: 600.0, y: 400.0), (x: 600.0, y: 600.0), (x: 400.0, y: 600.0)];
    let areas = match Area::new("centre", &Geometry::Polygon(square)) {
        Ok(area) => vec![area],
        Err(e) => {
            eprintln!("Invalid area: {}", e);
            vec![]
        }
    };

    let progress: ProgressCallback = Arc::new(|done, total| {
        println!("   progress {}/{}", done, total);
    });
    let cancel = AtomicBool::new(false);

    let start = Instant::now();
    let report = match count_all(
        &gates,
        &areas,
        &trajectories,
        &Planar::meters(),
        &BatchConfig::default(),
        Some(progress),
        Some(&cancel),
    ) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Batch failed: {}", e);
            return;
        }
    };
    let elapsed = start.elapsed();

    println!("\nCounted {} trajectories in {:.1}ms\n", trajectories.len(), elapsed.as_secs_f64() * 1000.0);

    for stats in &report.gates {
        println!("Gate '{}': {} crossings ({} negative, {} positive), {:.2} km/h",
            stats.name, stats.trajectory_count, stats.trajectory_count_negative,
            stats.trajectory_count_positive, stats.average_speed);
    }
    for stats in &report.areas {
        println!("Area '{}': {} trajectories, {:.2} km/h", stats.name, stats.trajectory_count, stats.average_speed);
    }

    let fastest = report
        .trajectories
        .iter()
        .max_by(|a, b| a.maximum_speed.total_cmp(&b.maximum_speed));
    if let Some(summary) = fastest {
        println!("\nFastest: {} at {:.2} km/h", summary.id, summary.maximum_speed);
    }
}
