//! Batch counting across many gates and areas.
//!
//! Trajectory bounding boxes are loaded into an R-tree once; each gate or
//! area then only runs the exact tests on trajectories whose box meets its
//! own (optionally padded) envelope.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use rstar::{RTree, RTreeObject, AABB};

use crate::area::{Area, AreaStats};
use crate::gate::{Gate, GateStats};
use crate::geo_utils::{Bounds, DistanceMeasure};
use crate::trajectory::{Trajectory, TrajectorySummary};
use crate::{CountError, Result};

/// Progress callback type, called with (completed, total) after each gate or area.
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Configuration for [`count_all`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchConfig {
    /// Pre-filter trajectories with an R-tree of their bounding boxes.
    /// Turning this off falls back to a linear scan of the same boxes.
    /// Default: true
    pub use_spatial_index: bool,

    /// Distance added on every side of a gate or area envelope before the
    /// R-tree query, in native coordinate units.
    /// Default: 0.0
    pub envelope_padding: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            use_spatial_index: true,
            envelope_padding: 0.0,
        }
    }
}

/// Everything one batch pass produces.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CountReport {
    pub gates: Vec<GateStats>,
    pub areas: Vec<AreaStats>,
    pub trajectories: Vec<TrajectorySummary>,
}

/// Bounding box of a trajectory (used for spatial indexing).
#[derive(Debug, Clone)]
struct TrajectoryBounds {
    index: usize,
    bounds: Bounds,
}

impl RTreeObject for TrajectoryBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds.to_aabb()
    }
}

/// Picks the trajectories worth testing against an envelope.
struct CandidateIndex<'a> {
    trajectories: &'a [Trajectory],
    rtree: Option<RTree<TrajectoryBounds>>,
    padding: f64,
}

impl<'a> CandidateIndex<'a> {
    fn new(trajectories: &'a [Trajectory], config: &BatchConfig) -> Self {
        let rtree = config.use_spatial_index.then(|| {
            let bounds: Vec<TrajectoryBounds> = trajectories
                .iter()
                .enumerate()
                .map(|(index, t)| TrajectoryBounds { index, bounds: t.bounds() })
                .collect();
            RTree::bulk_load(bounds)
        });

        Self { trajectories, rtree, padding: config.envelope_padding }
    }

    /// Candidates in input order, so sums match an unindexed pass exactly.
    fn candidates(&self, envelope: Option<Bounds>) -> Vec<&'a Trajectory> {
        let envelope = match envelope {
            Some(envelope) => envelope.padded(self.padding),
            None => return self.trajectories.iter().collect(),
        };

        let rtree = match &self.rtree {
            Some(rtree) => rtree,
            None => {
                return self
                    .trajectories
                    .iter()
                    .filter(|t| t.bounds().overlaps(&envelope))
                    .collect()
            }
        };

        let mut indices: Vec<usize> = rtree
            .locate_in_envelope_intersecting(&envelope.to_aabb())
            .map(|b| b.index)
            .collect();
        indices.sort_unstable();

        indices.into_iter().map(|i| &self.trajectories[i]).collect()
    }
}

/// One unit of batch work.
enum Job<'a> {
    Gate(&'a Gate),
    Area(&'a Area),
}

enum JobResult {
    Gate(GateStats),
    Area(AreaStats),
}

/// Count every gate and area against every trajectory, and summarise the
/// trajectories.
///
/// Results keep the order of `gates` and `areas`. The optional `cancel` flag
/// is checked before each gate or area; once set, the pass stops with
/// [`CountError::Cancelled`].
///
/// # Arguments
/// * `gates` - Gates to count
/// * `areas` - Areas to count
/// * `trajectories` - Trajectories to test
/// * `measure` - Distance capability for the trajectories' coordinates
/// * `config` - Spatial pre-filter settings
/// * `progress` - Called with (completed, total) after each gate or area
/// * `cancel` - Set from another thread to stop the pass
///
/// # Example
/// ```
/// use geo::{Geometry, LineString};
/// use trajectory_counter::{count_all, BatchConfig, Gate, Trajectory, TrajectoryNode, TimestampUnit};
/// use trajectory_counter::geo_utils::Planar;
///
/// let gate = Gate::new("g", &Geometry::LineString(LineString::from(vec![(-1.0, 0.5), (1.0, 0.5)])), true, true).unwrap();
/// let node = |y, t| TrajectoryNode::from_coordinates(0.0, y, t, 1.0, 1.0, 1.0, TimestampUnit::Seconds).unwrap();
/// let trajectory = Trajectory::new("t", vec![node(0.0, 0.0), node(1.0, 1.0)]).unwrap();
///
/// let report = count_all(&[gate], &[], &[trajectory], &Planar::meters(), &BatchConfig::default(), None, None).unwrap();
/// assert_eq!(report.gates[0].trajectory_count, 1);
/// assert_eq!(report.trajectories.len(), 1);
/// ```
pub fn count_all(
    gates: &[Gate],
    areas: &[Area],
    trajectories: &[Trajectory],
    measure: &dyn DistanceMeasure,
    config: &BatchConfig,
    progress: Option<ProgressCallback>,
    cancel: Option<&AtomicBool>,
) -> Result<CountReport> {
    let start = Instant::now();
    let index = CandidateIndex::new(trajectories, config);

    let jobs: Vec<Job> = gates
        .iter()
        .map(Job::Gate)
        .chain(areas.iter().map(Job::Area))
        .collect();
    let total = jobs.len() as u32;
    let completed = AtomicU32::new(0);

    info!(
        "[Batch] Counting {} gates and {} areas over {} trajectories (spatial index: {})",
        gates.len(),
        areas.len(),
        trajectories.len(),
        config.use_spatial_index
    );

    let run = |job: &Job| -> Result<JobResult> {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(CountError::Cancelled);
        }

        let result = match job {
            Job::Gate(gate) => {
                let envelope = Bounds::from_coords(gate.geometry().coords());
                let candidates = index.candidates(envelope);
                debug!("[Batch] Gate {}: {} candidate trajectories", gate.name(), candidates.len());
                JobResult::Gate(gate.tally(candidates, measure)?.finish(gate))
            }
            Job::Area(area) => {
                let envelope = Bounds::from_coords(
                    area.geometry().iter().flat_map(|polygon| polygon.exterior().coords()),
                );
                let candidates = index.candidates(envelope);
                debug!("[Batch] Area {}: {} candidate trajectories", area.name(), candidates.len());
                JobResult::Area(area.tally(candidates, measure)?.finish(area))
            }
        };

        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref callback) = progress {
            callback(done, total);
        }
        Ok(result)
    };

    #[cfg(feature = "parallel")]
    let results: Result<Vec<JobResult>> = {
        use rayon::prelude::*;
        jobs.par_iter().map(run).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Result<Vec<JobResult>> = jobs.iter().map(run).collect();

    let results = match results {
        Ok(results) => results,
        Err(CountError::Cancelled) => {
            warn!("[Batch] Cancelled after {} of {} jobs", completed.load(Ordering::Relaxed), total);
            return Err(CountError::Cancelled);
        }
        Err(e) => return Err(e),
    };

    let mut report = CountReport::default();
    for result in results {
        match result {
            JobResult::Gate(stats) => report.gates.push(stats),
            JobResult::Area(stats) => report.areas.push(stats),
        }
    }

    report.trajectories = summarize(trajectories, measure)?;

    info!(
        "[Batch] Completed {} gates, {} areas, {} trajectory summaries in {:.1}ms",
        report.gates.len(),
        report.areas.len(),
        report.trajectories.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(report)
}

#[cfg(feature = "parallel")]
fn summarize(trajectories: &[Trajectory], measure: &dyn DistanceMeasure) -> Result<Vec<TrajectorySummary>> {
    use rayon::prelude::*;
    trajectories.par_iter().map(|t| t.summary(measure)).collect()
}

#[cfg(not(feature = "parallel"))]
fn summarize(trajectories: &[Trajectory], measure: &dyn DistanceMeasure) -> Result<Vec<TrajectorySummary>> {
    trajectories.iter().map(|t| t.summary(measure)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::Planar;
    use crate::{TimestampUnit, TrajectoryNode};
    use geo::{polygon, Geometry, LineString};
    use std::sync::Mutex;

    fn node(x: f64, y: f64, t_ms: f64) -> TrajectoryNode {
        TrajectoryNode::from_coordinates(x, y, t_ms, 1.0, 1.0, 1.0, TimestampUnit::Milliseconds).unwrap()
    }

    fn trajectory(id: &str, points: &[(f64, f64, f64)]) -> Trajectory {
        Trajectory::new(id, points.iter().map(|&(x, y, t)| node(x, y, t)).collect()).unwrap()
    }

    fn line_gate(name: &str, points: Vec<(f64, f64)>) -> Gate {
        Gate::new(name, &Geometry::LineString(LineString::from(points)), true, true).unwrap()
    }

    fn fixture() -> (Vec<Gate>, Vec<Area>, Vec<Trajectory>) {
        let gates = vec![
            line_gate("west", vec![(-1.0, 0.5), (1.0, 0.5)]),
            line_gate("east", vec![(9.0, 0.5), (11.0, 0.5)]),
            line_gate("nowhere", vec![(50.0, 50.0), (51.0, 50.0)]),
        ];
        let areas = vec![Area::new(
            "block",
            &Geometry::Polygon(polygon![(x: 8.0, y: -1.0), (x: 12.0, y: -1.0), (x: 12.0, y: 2.0), (x: 8.0, y: 2.0)]),
        )
        .unwrap()];

        let mut trajectories = Vec::new();
        for i in 0..20 {
            let x = if i % 2 == 0 { 0.0 } else { 10.0 } + (i as f64) * 0.01;
            let dt = 100.0 * (1 + i % 3) as f64;
            trajectories.push(trajectory(&format!("t{}", i), &[(x, 0.0, 0.0), (x, 1.0, dt)]));
        }
        (gates, areas, trajectories)
    }

    #[test]
    fn test_spatial_index_matches_brute_force() {
        let (gates, areas, trajectories) = fixture();
        let measure = Planar::meters();

        let indexed = count_all(&gates, &areas, &trajectories, &measure, &BatchConfig::default(), None, None).unwrap();
        let brute_force = count_all(
            &gates,
            &areas,
            &trajectories,
            &measure,
            &BatchConfig { use_spatial_index: false, ..Default::default() },
            None,
            None,
        )
        .unwrap();

        assert_eq!(indexed, brute_force);
        assert_eq!(indexed.gates[0].trajectory_count, 10);
        assert_eq!(indexed.gates[1].trajectory_count, 10);
        assert_eq!(indexed.gates[2].trajectory_count, 0);
        assert_eq!(indexed.areas[0].trajectory_count, 10);
        assert_eq!(indexed.trajectories.len(), 20);
    }

    #[test]
    fn test_report_matches_single_counts() {
        let (gates, areas, trajectories) = fixture();
        let measure = Planar::meters();
        let report = count_all(&gates, &areas, &trajectories, &measure, &BatchConfig::default(), None, None).unwrap();

        for (gate, stats) in gates.iter().zip(&report.gates) {
            assert_eq!(&gate.count_trajectories(&trajectories, &measure).unwrap(), stats);
        }
        assert_eq!(areas[0].count_trajectories(&trajectories, &measure).unwrap(), report.areas[0]);
    }

    #[test]
    fn test_progress_reports_every_job() {
        let (gates, areas, trajectories) = fixture();
        let calls: Arc<Mutex<Vec<(u32, u32)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let progress: ProgressCallback = Arc::new(move |done, total| {
            sink.lock().unwrap().push((done, total));
        });

        count_all(
            &gates,
            &areas,
            &trajectories,
            &Planar::meters(),
            &BatchConfig::default(),
            Some(progress),
            None,
        )
        .unwrap();

        let mut calls = calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_cancelled_pass() {
        let (gates, areas, trajectories) = fixture();
        let cancel = AtomicBool::new(true);

        let result = count_all(
            &gates,
            &areas,
            &trajectories,
            &Planar::meters(),
            &BatchConfig::default(),
            None,
            Some(&cancel),
        );
        assert_eq!(result, Err(CountError::Cancelled));
    }

    #[test]
    fn test_empty_batch() {
        let report = count_all(&[], &[], &[], &Planar::meters(), &BatchConfig::default(), None, None).unwrap();
        assert_eq!(report, CountReport::default());
    }

    #[test]
    fn test_padding_widens_candidates() {
        let trajectories = vec![trajectory("near", &[(0.0, 2.0, 0.0), (0.0, 3.0, 1000.0)])];
        let index = CandidateIndex::new(&trajectories, &BatchConfig::default());
        let gate_envelope = Bounds { min_x: -1.0, min_y: 0.5, max_x: 1.0, max_y: 0.5 };
        assert!(index.candidates(Some(gate_envelope)).is_empty());

        let padded = CandidateIndex::new(&trajectories, &BatchConfig { envelope_padding: 2.0, ..Default::default() });
        assert_eq!(padded.candidates(Some(gate_envelope)).len(), 1);
    }

    #[test]
    fn test_linear_scan_filters_by_bounds() {
        let trajectories = vec![
            trajectory("near", &[(0.0, 0.0, 0.0), (0.0, 1.0, 1000.0)]),
            trajectory("far", &[(20.0, 20.0, 0.0), (21.0, 20.0, 1000.0)]),
        ];
        let config = BatchConfig { use_spatial_index: false, ..Default::default() };
        let index = CandidateIndex::new(&trajectories, &config);
        let gate_envelope = Bounds { min_x: -1.0, min_y: 0.5, max_x: 1.0, max_y: 0.5 };

        let candidates = index.candidates(Some(gate_envelope));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id(), "near");
        assert_eq!(index.candidates(None).len(), 2);
    }
}
