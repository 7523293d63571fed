//! Trajectories, their segments and movement statistics.
//!
//! A [`Trajectory`] is the time-ordered list of detections of one tracked
//! object. Its consecutive node pairs form [`TrajectorySegment`]s, which are
//! what gates and areas actually test against.
//!
//! Raw rows from a point layer are turned into trajectories with
//! [`build_trajectories`], which also applies the optional time window and
//! traveler-class filter.

use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use geo::{Coord, Line, LineString};
use log::{debug, info, warn};

use crate::geo_utils::{round2, Bounds, DistanceMeasure, MPS_TO_KMH};
use crate::{CountError, Result, Size, TimestampUnit, TrajectoryNode};

// ============================================================================
// Segments
// ============================================================================

/// The directed step between two consecutive nodes of a trajectory.
///
/// `node_a` is expected to be the chronologically earlier node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySegment {
    pub node_a: TrajectoryNode,
    pub node_b: TrajectoryNode,
}

impl TrajectorySegment {
    pub fn new(node_a: TrajectoryNode, node_b: TrajectoryNode) -> Self {
        Self { node_a, node_b }
    }

    pub fn as_line(&self) -> Line<f64> {
        Line::new(self.node_a.position, self.node_b.position)
    }

    /// Time from `node_a` to `node_b` in seconds. Negative if the nodes are out of order.
    pub fn elapsed_seconds(&self) -> f64 {
        elapsed_seconds(&self.node_a, &self.node_b)
    }

    pub fn length_meters(&self, measure: &dyn DistanceMeasure) -> f64 {
        measure.measure_meters(self.node_a.position, self.node_b.position)
    }

    /// Average speed over the segment in metres per second.
    ///
    /// A zero-duration segment has speed 0. A segment whose `node_b` precedes
    /// `node_a` is rejected with [`CountError::InvalidSegment`].
    pub fn speed_mps(&self, measure: &dyn DistanceMeasure) -> Result<f64> {
        self.speed_over(self.length_meters(measure))
    }

    /// Speed for an already measured segment length, in metres per second.
    fn speed_over(&self, meters: f64) -> Result<f64> {
        let seconds = self.elapsed_seconds();
        if seconds < 0.0 {
            return Err(CountError::InvalidSegment(
                "node A must be earlier than node B, timewise".to_string(),
            ));
        }
        if seconds == 0.0 {
            return Ok(0.0);
        }
        Ok(meters / seconds)
    }

    /// Average speed over the segment in km/h, rounded to two decimals.
    pub fn speed_kmh(&self, measure: &dyn DistanceMeasure) -> Result<f64> {
        Ok(round2(self.speed_mps(measure)? * MPS_TO_KMH))
    }
}

/// Change of speed between two consecutive segments in m/s².
///
/// The elapsed time spans from the start of `previous` to the end of `current`.
pub fn acceleration(
    previous: &TrajectorySegment,
    current: &TrajectorySegment,
    measure: &dyn DistanceMeasure,
) -> Result<f64> {
    let speed_change = current.speed_mps(measure)? - previous.speed_mps(measure)?;
    let seconds = elapsed_seconds(&previous.node_a, &current.node_b);

    if seconds < 0.0 {
        return Err(CountError::InvalidSegment(
            "previous segment must start before the current one ends".to_string(),
        ));
    }
    if seconds == 0.0 {
        return Ok(0.0);
    }
    Ok(speed_change / seconds)
}

fn elapsed_seconds(from: &TrajectoryNode, to: &TrajectoryNode) -> f64 {
    (to.timestamp - from.timestamp).num_milliseconds() as f64 / 1000.0
}

// ============================================================================
// Trajectory
// ============================================================================

/// Movement statistics of one trajectory, as reported next to gate counts.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrajectorySummary {
    pub id: String,
    /// km/h
    pub average_speed: f64,
    /// km/h
    pub maximum_speed: f64,
    /// metres
    pub length: f64,
    pub duration_seconds: f64,
    pub minimum_size: Size,
    pub maximum_size: Size,
    pub average_size: Size,
}

/// Running totals of a single pass over consecutive node pairs.
struct Movement {
    distance_m: f64,
    seconds: f64,
    max_speed_mps: f64,
}

/// A time-ordered sequence of at least two nodes for one tracked object.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    id: String,
    nodes: Vec<TrajectoryNode>,
}

impl Trajectory {
    /// Create a trajectory from nodes already sorted by timestamp.
    ///
    /// Fails with [`CountError::InvalidTrajectory`] for fewer than two nodes
    /// or nodes out of chronological order.
    pub fn new(id: impl Into<String>, nodes: Vec<TrajectoryNode>) -> Result<Self> {
        let id = id.into();
        if nodes.len() < 2 {
            return Err(CountError::InvalidTrajectory(format!(
                "trajectory {} has {} node(s), at least 2 required",
                id,
                nodes.len()
            )));
        }
        if nodes.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
            return Err(CountError::InvalidTrajectory(format!(
                "trajectory {} nodes are not sorted by timestamp",
                id
            )));
        }
        Ok(Self { id, nodes })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn nodes(&self) -> &[TrajectoryNode] {
        &self.nodes
    }

    /// Segments between consecutive nodes, in temporal order.
    pub fn segments(&self) -> impl Iterator<Item = TrajectorySegment> + '_ {
        self.nodes
            .windows(2)
            .map(|w| TrajectorySegment::new(w[0], w[1]))
    }

    pub fn as_line_string(&self) -> LineString<f64> {
        LineString::new(self.nodes.iter().map(|n| n.position).collect::<Vec<Coord<f64>>>())
    }

    pub fn bounds(&self) -> Bounds {
        // Non-empty by construction
        Bounds::from_coords(self.nodes.iter().map(|n| &n.position)).unwrap_or(Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        })
    }

    fn movement(&self, measure: &dyn DistanceMeasure) -> Result<Movement> {
        let mut movement = Movement { distance_m: 0.0, seconds: 0.0, max_speed_mps: 0.0 };

        for segment in self.segments() {
            let meters = segment.length_meters(measure);
            let speed = segment.speed_over(meters)?;
            if speed > movement.max_speed_mps {
                movement.max_speed_mps = speed;
            }
            movement.distance_m += meters;
            movement.seconds += segment.elapsed_seconds();
        }

        Ok(movement)
    }

    /// Overall average speed (total distance over total time) in km/h.
    pub fn average_speed(&self, measure: &dyn DistanceMeasure) -> Result<f64> {
        let movement = self.movement(measure)?;
        if movement.seconds > 0.0 {
            return Ok(round2(movement.distance_m / movement.seconds * MPS_TO_KMH));
        }
        Ok(0.0)
    }

    /// Highest single-segment speed in km/h.
    pub fn maximum_speed(&self, measure: &dyn DistanceMeasure) -> Result<f64> {
        Ok(round2(self.movement(measure)?.max_speed_mps * MPS_TO_KMH))
    }

    /// Travelled distance in metres.
    pub fn length(&self, measure: &dyn DistanceMeasure) -> Result<f64> {
        Ok(round2(self.movement(measure)?.distance_m))
    }

    pub fn duration(&self) -> Duration {
        match (self.nodes.first(), self.nodes.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        }
    }

    pub fn minimum_size(&self) -> Size {
        self.reduce_size(f64::min)
    }

    pub fn maximum_size(&self) -> Size {
        self.reduce_size(f64::max)
    }

    pub fn average_size(&self) -> Size {
        let n = self.nodes.len() as f64;
        let total = self.nodes.iter().fold(Size::default(), |acc, node| {
            Size::new(acc.width + node.width, acc.length + node.length, acc.height + node.height)
        });
        Size::new(round2(total.width / n), round2(total.length / n), round2(total.height / n))
    }

    fn reduce_size(&self, pick: fn(f64, f64) -> f64) -> Size {
        let first = self.nodes[0].size();
        let reduced = self.nodes[1..].iter().fold(first, |acc, node| {
            Size::new(
                pick(acc.width, node.width),
                pick(acc.length, node.length),
                pick(acc.height, node.height),
            )
        });
        Size::new(round2(reduced.width), round2(reduced.length), round2(reduced.height))
    }

    /// All movement and size statistics in one record.
    pub fn summary(&self, measure: &dyn DistanceMeasure) -> Result<TrajectorySummary> {
        let movement = self.movement(measure)?;
        let average_speed = if movement.seconds > 0.0 {
            round2(movement.distance_m / movement.seconds * MPS_TO_KMH)
        } else {
            0.0
        };

        Ok(TrajectorySummary {
            id: self.id.clone(),
            average_speed,
            maximum_speed: round2(movement.max_speed_mps * MPS_TO_KMH),
            length: round2(movement.distance_m),
            duration_seconds: self.duration().num_milliseconds() as f64 / 1000.0,
            minimum_size: self.minimum_size(),
            maximum_size: self.maximum_size(),
            average_size: self.average_size(),
        })
    }
}

// ============================================================================
// Ingest
// ============================================================================

/// One raw detection row as delivered by the data-access layer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointRecord {
    /// Tracked object identifier
    pub id: String,
    pub x: f64,
    pub y: f64,
    /// Unix timestamp in seconds or milliseconds, see [`IngestConfig::timestamp_unit`]
    pub timestamp: f64,
    pub width: f64,
    pub length: f64,
    pub height: f64,
    /// Traveler class, e.g. "car" or "pedestrian"
    pub label: Option<String>,
}

/// Configuration for turning point records into trajectories.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IngestConfig {
    /// Unit of `PointRecord::timestamp`.
    /// Default: Auto (decided from the first record)
    pub timestamp_unit: TimestampUnit,

    /// Inclusive window start, milliseconds since the epoch.
    /// Must lie within the data's time range. Default: none
    pub start_ms: Option<i64>,

    /// Inclusive window end, milliseconds since the epoch.
    /// Must lie within the data's time range. Default: none
    pub end_ms: Option<i64>,

    /// Keep only records with this label. Default: none (all classes)
    pub traveler_class: Option<String>,
}

/// Group point records by object id into time-sorted trajectories.
///
/// Records outside the configured window or of another traveler class are
/// dropped first. Every remaining group must have at least two nodes; a
/// shorter one fails the whole build with [`CountError::InvalidTrajectory`].
///
/// # Example
/// ```
/// use trajectory_counter::{build_trajectories, IngestConfig, PointRecord};
///
/// let record = |id: &str, y: f64, t: f64| PointRecord {
///     id: id.to_string(), x: 0.0, y, timestamp: t,
///     width: 1.0, length: 1.0, height: 1.0, label: None,
/// };
/// let records = vec![record("a", 1.0, 2000.0), record("a", 0.0, 1000.0)];
///
/// let trajectories = build_trajectories(&records, &IngestConfig::default()).unwrap();
/// assert_eq!(trajectories.len(), 1);
/// assert_eq!(trajectories[0].nodes()[0].position.y, 0.0);
/// ```
pub fn build_trajectories(records: &[PointRecord], config: &IngestConfig) -> Result<Vec<Trajectory>> {
    let first = records
        .first()
        .ok_or_else(|| CountError::InvalidTrajectory("no point records".to_string()))?;

    let unit = match config.timestamp_unit {
        TimestampUnit::Auto => TimestampUnit::detect(first.timestamp),
        unit => unit,
    };

    let stamped: Vec<(i64, &PointRecord)> = records
        .iter()
        .map(|r| unit.to_millis(r.timestamp).map(|t| (t, r)))
        .collect::<Result<_>>()?;

    let (min_ms, max_ms) = stamped
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), (t, _)| (lo.min(*t), hi.max(*t)));
    let start_ms = config.start_ms.unwrap_or(min_ms);
    let end_ms = config.end_ms.unwrap_or(max_ms);

    if !(min_ms..=max_ms).contains(&start_ms) || !(min_ms..=max_ms).contains(&end_ms) {
        return Err(CountError::InvalidTimeWindow(format!(
            "window {}..={} is outside the data's range {}..={}",
            start_ms, end_ms, min_ms, max_ms
        )));
    }
    if start_ms > end_ms {
        return Err(CountError::InvalidTimeWindow(format!(
            "window start {} is after its end {}",
            start_ms, end_ms
        )));
    }

    let mut groups: BTreeMap<&str, Vec<(i64, &PointRecord)>> = BTreeMap::new();
    let mut kept = 0usize;
    for (t, record) in stamped {
        if t < start_ms || t > end_ms {
            continue;
        }
        if let Some(class) = &config.traveler_class {
            if record.label.as_deref() != Some(class.as_str()) {
                continue;
            }
        }
        kept += 1;
        groups.entry(record.id.as_str()).or_default().push((t, record));
    }

    if kept == 0 {
        warn!("[Ingest] All {} records were filtered out", records.len());
    }

    let mut trajectories = Vec::with_capacity(groups.len());
    for (id, mut rows) in groups {
        rows.sort_by_key(|(t, _)| *t);

        let nodes = rows
            .iter()
            .map(|(t, r)| -> Result<TrajectoryNode> {
                let timestamp = Utc
                    .timestamp_millis_opt(*t)
                    .single()
                    .ok_or(CountError::InvalidTimestamp(r.timestamp))?;
                Ok(TrajectoryNode::new(Coord { x: r.x, y: r.y }, timestamp, r.width, r.length, r.height))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("[Ingest] Trajectory {} with {} nodes", id, nodes.len());
        trajectories.push(Trajectory::new(id, nodes)?);
    }

    info!(
        "[Ingest] Built {} trajectories from {} of {} records",
        trajectories.len(),
        kept,
        records.len()
    );

    Ok(trajectories)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::Planar;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn node(x: f64, y: f64, t_ms: f64) -> TrajectoryNode {
        TrajectoryNode::from_coordinates(x, y, t_ms, 1.0, 1.0, 1.0, TimestampUnit::Milliseconds).unwrap()
    }

    fn sized(x: f64, y: f64, t_ms: f64, w: f64, l: f64, h: f64) -> TrajectoryNode {
        TrajectoryNode::from_coordinates(x, y, t_ms, w, l, h, TimestampUnit::Milliseconds).unwrap()
    }

    fn record(id: &str, y: f64, t: f64, label: Option<&str>) -> PointRecord {
        PointRecord {
            id: id.to_string(),
            x: 0.0,
            y,
            timestamp: t,
            width: 1.0,
            length: 2.0,
            height: 1.5,
            label: label.map(str::to_string),
        }
    }

    #[test]
    fn test_trajectory_requires_two_nodes() {
        let result = Trajectory::new("a", vec![node(0.0, 0.0, 0.0)]);
        assert!(matches!(result, Err(CountError::InvalidTrajectory(_))));

        let result = Trajectory::new("a", vec![]);
        assert!(matches!(result, Err(CountError::InvalidTrajectory(_))));
    }

    #[test]
    fn test_trajectory_rejects_unsorted_nodes() {
        let result = Trajectory::new("a", vec![node(0.0, 0.0, 1000.0), node(0.0, 1.0, 0.0)]);
        assert!(matches!(result, Err(CountError::InvalidTrajectory(_))));
    }

    #[test]
    fn test_segments() {
        let traj = Trajectory::new(
            "a",
            vec![node(0.0, 0.0, 100.0), node(0.0, 1.0, 200.0), node(0.0, 2.0, 300.0)],
        )
        .unwrap();

        let segments: Vec<_> = traj.segments().collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].node_a.position, Coord { x: 0.0, y: 0.0 });
        assert_eq!(segments[0].node_b.position, Coord { x: 0.0, y: 1.0 });
        assert_eq!(segments[1].node_a.position, Coord { x: 0.0, y: 1.0 });
        assert_eq!(segments[1].node_b.position, Coord { x: 0.0, y: 2.0 });
        assert_eq!(segments[0].node_a.timestamp_millis(), 100);
        assert_eq!(segments[1].node_b.timestamp_millis(), 300);
    }

    #[test]
    fn test_segment_speed() {
        let segment = TrajectorySegment::new(node(0.0, 0.0, 100.0), node(0.0, 1.0, 200.0));
        let measure = Planar::meters();
        assert!(approx_eq(segment.speed_mps(&measure).unwrap(), 10.0, 1e-9));
        assert_eq!(segment.speed_kmh(&measure).unwrap(), 36.0);
    }

    #[test]
    fn test_zero_duration_segment_has_zero_speed() {
        let segment = TrajectorySegment::new(node(0.0, 0.0, 500.0), node(0.0, 1.0, 500.0));
        assert_eq!(segment.speed_mps(&Planar::meters()).unwrap(), 0.0);
    }

    #[test]
    fn test_reversed_segment_is_invalid() {
        let segment = TrajectorySegment::new(node(0.0, 0.0, 500.0), node(0.0, 1.0, 100.0));
        assert!(matches!(
            segment.speed_mps(&Planar::meters()),
            Err(CountError::InvalidSegment(_))
        ));
    }

    #[test]
    fn test_acceleration() {
        let measure = Planar::meters();
        // 1 m/s, then 3 m/s, over 2 s in total
        let previous = TrajectorySegment::new(node(0.0, 0.0, 0.0), node(0.0, 1.0, 1000.0));
        let current = TrajectorySegment::new(node(0.0, 1.0, 1000.0), node(0.0, 4.0, 2000.0));
        assert!(approx_eq(acceleration(&previous, &current, &measure).unwrap(), 1.0, 1e-9));
        assert!(approx_eq(acceleration(&current, &current, &measure).unwrap(), 0.0, 1e-9));
    }

    #[test]
    fn test_movement_statistics() {
        let measure = Planar::meters();
        let traj = Trajectory::new(
            "a",
            vec![node(0.0, 0.0, 0.0), node(0.0, 1.0, 1000.0), node(0.0, 3.0, 2000.0)],
        )
        .unwrap();

        assert_eq!(traj.length(&measure).unwrap(), 3.0);
        assert_eq!(traj.duration(), Duration::seconds(2));
        assert_eq!(traj.average_speed(&measure).unwrap(), 5.4);
        assert_eq!(traj.maximum_speed(&measure).unwrap(), 7.2);
    }

    #[test]
    fn test_summary_measures_each_segment_once() {
        use crate::geo_utils::LengthUnit;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingMeasure(AtomicUsize);

        impl DistanceMeasure for CountingMeasure {
            fn measure(&self, a: Coord<f64>, b: Coord<f64>) -> f64 {
                self.0.fetch_add(1, Ordering::Relaxed);
                Planar::meters().measure(a, b)
            }

            fn length_unit(&self) -> LengthUnit {
                LengthUnit::Meters
            }
        }

        let measure = CountingMeasure(AtomicUsize::new(0));
        let traj = Trajectory::new(
            "a",
            vec![node(0.0, 0.0, 0.0), node(0.0, 1.0, 1000.0), node(0.0, 3.0, 2000.0)],
        )
        .unwrap();

        let summary = traj.summary(&measure).unwrap();
        assert_eq!(summary.length, 3.0);
        assert_eq!(summary.maximum_speed, 7.2);
        assert_eq!(measure.0.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_stationary_trajectory() {
        let measure = Planar::meters();
        let traj = Trajectory::new("a", vec![node(0.0, 0.0, 0.0), node(0.0, 1.0, 0.0)]).unwrap();
        assert_eq!(traj.average_speed(&measure).unwrap(), 0.0);
        assert_eq!(traj.maximum_speed(&measure).unwrap(), 0.0);
        assert_eq!(traj.length(&measure).unwrap(), 1.0);
    }

    #[test]
    fn test_sizes() {
        let traj = Trajectory::new(
            "a",
            vec![
                sized(0.0, 0.0, 0.0, 1.0, 4.0, 1.5),
                sized(0.0, 1.0, 100.0, 2.0, 5.0, 1.0),
                sized(0.0, 2.0, 200.0, 1.5, 3.0, 2.0),
            ],
        )
        .unwrap();

        assert_eq!(traj.minimum_size(), Size::new(1.0, 3.0, 1.0));
        assert_eq!(traj.maximum_size(), Size::new(2.0, 5.0, 2.0));
        assert_eq!(traj.average_size(), Size::new(1.5, 4.0, 1.5));
    }

    #[test]
    fn test_summary() {
        let measure = Planar::meters();
        let traj = Trajectory::new("car-7", vec![node(0.0, 0.0, 0.0), node(3.0, 4.0, 2000.0)]).unwrap();
        let summary = traj.summary(&measure).unwrap();

        assert_eq!(summary.id, "car-7");
        assert_eq!(summary.length, 5.0);
        assert_eq!(summary.duration_seconds, 2.0);
        assert_eq!(summary.average_speed, 9.0);
        assert_eq!(summary.maximum_speed, 9.0);
        assert_eq!(summary.average_size, Size::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_build_groups_and_sorts() {
        let records = vec![
            record("b", 1.0, 2000.0, None),
            record("a", 2.0, 3000.0, None),
            record("a", 0.0, 1000.0, None),
            record("b", 0.0, 1000.0, None),
            record("a", 1.0, 2000.0, None),
        ];
        let config = IngestConfig { timestamp_unit: TimestampUnit::Milliseconds, ..Default::default() };
        let trajectories = build_trajectories(&records, &config).unwrap();

        assert_eq!(trajectories.len(), 2);
        assert_eq!(trajectories[0].id(), "a");
        assert_eq!(trajectories[1].id(), "b");
        let ys: Vec<f64> = trajectories[0].nodes().iter().map(|n| n.position.y).collect();
        assert_eq!(ys, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_build_detects_seconds() {
        let records = vec![
            record("a", 0.0, 1_700_000_000.0, None),
            record("a", 1.0, 1_700_000_001.0, None),
        ];
        let trajectories = build_trajectories(&records, &IngestConfig::default()).unwrap();
        assert_eq!(trajectories[0].nodes()[1].timestamp_millis(), 1_700_000_001_000);
    }

    #[test]
    fn test_build_filters_class_and_window() {
        let records = vec![
            record("a", 0.0, 1000.0, Some("car")),
            record("a", 1.0, 2000.0, Some("car")),
            record("a", 2.0, 3000.0, Some("car")),
            record("p", 0.0, 1000.0, Some("pedestrian")),
            record("p", 1.0, 2000.0, Some("pedestrian")),
        ];
        let config = IngestConfig {
            timestamp_unit: TimestampUnit::Milliseconds,
            start_ms: Some(2000),
            end_ms: Some(3000),
            traveler_class: Some("car".to_string()),
        };
        let trajectories = build_trajectories(&records, &config).unwrap();

        assert_eq!(trajectories.len(), 1);
        assert_eq!(trajectories[0].id(), "a");
        assert_eq!(trajectories[0].nodes().len(), 2);
    }

    #[test]
    fn test_build_rejects_short_group() {
        let records = vec![
            record("a", 0.0, 1000.0, None),
            record("a", 1.0, 2000.0, None),
            record("lonely", 0.0, 1500.0, None),
        ];
        let config = IngestConfig { timestamp_unit: TimestampUnit::Milliseconds, ..Default::default() };
        assert!(matches!(
            build_trajectories(&records, &config),
            Err(CountError::InvalidTrajectory(_))
        ));
    }

    #[test]
    fn test_build_rejects_window_outside_data() {
        let records = vec![record("a", 0.0, 1000.0, None), record("a", 1.0, 2000.0, None)];
        let config = IngestConfig {
            timestamp_unit: TimestampUnit::Milliseconds,
            start_ms: Some(500),
            ..Default::default()
        };
        assert!(matches!(
            build_trajectories(&records, &config),
            Err(CountError::InvalidTimeWindow(_))
        ));

        let reversed = IngestConfig {
            timestamp_unit: TimestampUnit::Milliseconds,
            start_ms: Some(2000),
            end_ms: Some(1000),
            ..Default::default()
        };
        assert!(matches!(
            build_trajectories(&records, &reversed),
            Err(CountError::InvalidTimeWindow(_))
        ));
    }

    #[test]
    fn test_build_rejects_empty_input() {
        assert!(matches!(
            build_trajectories(&[], &IngestConfig::default()),
            Err(CountError::InvalidTrajectory(_))
        ));
    }
}
