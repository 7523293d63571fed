//! # Gates
//!
//! A gate is a polyline barrier. Each of its straight pieces is a
//! [`GateSegment`], and each trajectory segment is tested against every gate
//! segment to decide whether, and from which side, it crossed.
//!
//! ## Sides
//!
//! For a gate segment directed from `point_a` to `point_b`, a point is on the
//! [`Positive`](RelativeDirection::Positive) side when
//! `signed_area2(point_a, point_b, point) > 0` (the right-hand side when
//! walking from A to B), on the [`Negative`](RelativeDirection::Negative) side
//! when it is below zero and [`Collinear`](RelativeDirection::Collinear) when
//! it is exactly zero. A crossing is named after the side it starts from.
//!
//! ## Vertices on the gate
//!
//! A trajectory node that lands exactly on a gate segment makes both adjacent
//! trajectory segments merely touch the gate. The classifier then bridges the
//! touching node with a composite segment from the previous segment's start to
//! the current segment's end and classifies that instead. The bridge reaches
//! back one segment only; a composite that still only touches is not counted.
//!
//! ## Gate corners
//!
//! A trajectory passing through a vertex shared by two gate segments only
//! touches each of them. Such a pass is classified against the corner itself:
//! a point is on the side the corner opens towards when it is on that side of
//! both adjacent segments, and on the other side otherwise. A trajectory node
//! lying exactly on the corner is bridged with the previous segment's start,
//! as above.
//!
//! ## Counting
//!
//! A trajectory segment counts at most once per gate, at the first gate
//! segment (or corner) that counts it. A trajectory that oscillates across
//! the gate is counted once per crossing.

use std::time::Instant;

use geo::{Coord, Geometry, Intersects, Line, LineString};
use log::{debug, info, warn};

use crate::geo_utils::{
    point_on_segment, segments_cross, segments_intersect, signed_area2, DistanceMeasure,
};
use crate::trajectory::{acceleration, Trajectory, TrajectorySegment};
use crate::{CountError, RelativeDirection, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Which crossing directions a gate counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CountDirections {
    /// Count crossings that start on the negative side
    pub negative: bool,
    /// Count crossings that start on the positive side
    pub positive: bool,
}

impl CountDirections {
    pub const BOTH: CountDirections = CountDirections { negative: true, positive: true };

    pub fn new(negative: bool, positive: bool) -> Self {
        Self { negative, positive }
    }

    pub fn both(&self) -> bool {
        self.negative && self.positive
    }

    /// Whether a crossing classified as `direction` is counted.
    ///
    /// A collinear crossing has no side and only counts when both sides do.
    pub fn counts(&self, direction: RelativeDirection) -> bool {
        match direction {
            RelativeDirection::Negative => self.negative,
            RelativeDirection::Positive => self.positive,
            RelativeDirection::Collinear => self.both(),
        }
    }
}

// ============================================================================
// Gate Segment
// ============================================================================

/// One straight piece of a gate, directed from `point_a` to `point_b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateSegment {
    point_a: Coord<f64>,
    point_b: Coord<f64>,
}

impl GateSegment {
    pub fn new(point_a: Coord<f64>, point_b: Coord<f64>) -> Self {
        Self { point_a, point_b }
    }

    pub fn point_a(&self) -> Coord<f64> {
        self.point_a
    }

    pub fn point_b(&self) -> Coord<f64> {
        self.point_b
    }

    pub fn as_line(&self) -> Line<f64> {
        Line::new(self.point_a, self.point_b)
    }

    /// Side of this segment's supporting line that `point` lies on.
    pub fn point_relative_direction(&self, point: Coord<f64>) -> RelativeDirection {
        let area = signed_area2(self.point_a, self.point_b, point);

        if area > 0.0 {
            RelativeDirection::Positive
        } else if area < 0.0 {
            RelativeDirection::Negative
        } else {
            RelativeDirection::Collinear
        }
    }

    /// Side a crossing trajectory segment comes from.
    ///
    /// The segments must already be known to intersect. Both trajectory nodes
    /// on the same side fails with [`CountError::InvalidDirection`].
    ///
    /// # Example
    /// ```
    /// use geo::coord;
    /// use trajectory_counter::{GateSegment, RelativeDirection, TimestampUnit};
    /// use trajectory_counter::{TrajectoryNode, TrajectorySegment};
    ///
    /// let gate = GateSegment::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
    /// let segment = TrajectorySegment::new(
    ///     TrajectoryNode::from_coordinates(1.5, -0.5, 0.0, 1.0, 1.0, 1.0, TimestampUnit::Seconds).unwrap(),
    ///     TrajectoryNode::from_coordinates(-0.5, 1.5, 1.0, 1.0, 1.0, 1.0, TimestampUnit::Seconds).unwrap(),
    /// );
    ///
    /// assert_eq!(gate.crosses_from(&segment).unwrap(), RelativeDirection::Positive);
    /// ```
    pub fn crosses_from(&self, segment: &TrajectorySegment) -> Result<RelativeDirection> {
        use RelativeDirection::*;

        let from = self.point_relative_direction(segment.node_a.position);
        let to = self.point_relative_direction(segment.node_b.position);

        match (from, to) {
            (Negative, Positive) | (Collinear, Positive) | (Negative, Collinear) => Ok(Negative),
            (Positive, Negative) | (Positive, Collinear) | (Collinear, Negative) => Ok(Positive),
            (Collinear, Collinear) => Ok(Collinear),
            (Negative, Negative) | (Positive, Positive) => Err(CountError::InvalidDirection(
                "Both nodes cannot be on the same side".to_string(),
            )),
        }
    }

    /// Decide whether `segment` crosses this gate segment in a counted direction.
    ///
    /// Returns the crossing direction when it counts and `None` otherwise.
    /// `previous` is the trajectory segment immediately before `segment`; it
    /// is used to bridge a trajectory node lying exactly on the gate.
    pub fn trajectory_segment_crosses(
        &self,
        segment: &TrajectorySegment,
        previous: Option<&TrajectorySegment>,
        directions: CountDirections,
    ) -> Result<Option<RelativeDirection>> {
        let gate_line = self.as_line();
        let trajectory_line = segment.as_line();

        if segments_cross(&gate_line, &trajectory_line) {
            let direction = self.crosses_from(segment)?;
            if directions.counts(direction) {
                return Ok(Some(direction));
            }
            return Ok(None);
        }

        if !segments_intersect(&gate_line, &trajectory_line) {
            return Ok(None);
        }

        match previous {
            Some(previous) => {
                let composite = TrajectorySegment::new(previous.node_a, segment.node_b);
                let crossing = self.trajectory_segment_crosses(&composite, None, directions)?;
                if crossing.is_none() {
                    debug!(
                        "[Gate] Composite segment across {:?}-{:?} does not count",
                        self.point_a, self.point_b
                    );
                }
                Ok(crossing)
            }
            None => Ok(None),
        }
    }
}

// ============================================================================
// Gate Corners
// ============================================================================

/// Side of the corner formed by `incoming` and `outgoing` that `point` lies on.
///
/// Both segment functions vanish at the shared vertex, so the result only
/// depends on the direction from the vertex to `point`. Points along either
/// arm are collinear.
fn corner_side(incoming: &GateSegment, outgoing: &GateSegment, point: Coord<f64>) -> RelativeDirection {
    use RelativeDirection::*;

    let first = incoming.point_relative_direction(point);
    let second = outgoing.point_relative_direction(point);

    // The corner opens towards the side the outgoing segment turns to
    let (inner, outer) = if signed_area2(incoming.point_a, incoming.point_b, outgoing.point_b) < 0.0 {
        (Negative, Positive)
    } else {
        (Positive, Negative)
    };

    if first == inner && second == inner {
        inner
    } else if first == outer || second == outer {
        outer
    } else {
        Collinear
    }
}

/// Side a trajectory segment passing through the corner between `incoming`
/// and `outgoing` comes from, if it crosses there.
///
/// A segment ending on the corner is left to the segment after it.
fn corner_crosses_from(
    incoming: &GateSegment,
    outgoing: &GateSegment,
    segment: &TrajectorySegment,
    previous: Option<&TrajectorySegment>,
) -> Option<RelativeDirection> {
    let vertex = incoming.point_b;
    let from = segment.node_a.position;
    let to = segment.node_b.position;

    let from = if from == vertex {
        previous?.node_a.position
    } else if to != vertex && point_on_segment(&segment.as_line(), vertex) {
        from
    } else {
        return None;
    };

    match (corner_side(incoming, outgoing, from), corner_side(incoming, outgoing, to)) {
        (RelativeDirection::Negative, RelativeDirection::Positive) => Some(RelativeDirection::Negative),
        (RelativeDirection::Positive, RelativeDirection::Negative) => Some(RelativeDirection::Positive),
        _ => None,
    }
}

// ============================================================================
// Gate
// ============================================================================

/// Aggregated counts of one gate over one counting pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GateStats {
    pub name: String,
    pub counts_negative: bool,
    pub counts_positive: bool,
    pub trajectory_count: u64,
    pub trajectory_count_negative: u64,
    pub trajectory_count_positive: u64,
    /// km/h
    pub average_speed: f64,
    /// m/s²
    pub average_acceleration: f64,
}

/// Partial sums of a gate counting pass.
///
/// Tallies from independent shards of trajectories combine with
/// [`GateTally::merge`]. Merging is additive, so merging the same tally
/// twice counts its crossings twice.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GateTally {
    pub trajectory_count: u64,
    pub trajectory_count_negative: u64,
    pub trajectory_count_positive: u64,
    /// Sum of crossing segment speeds, km/h
    pub speed_sum: f64,
    /// Sum of accelerations at crossings, m/s²
    pub acceleration_sum: f64,
}

impl GateTally {
    fn record(
        &mut self,
        direction: RelativeDirection,
        segment: &TrajectorySegment,
        previous: Option<&TrajectorySegment>,
        measure: &dyn DistanceMeasure,
    ) -> Result<()> {
        self.trajectory_count += 1;
        match direction {
            RelativeDirection::Negative => self.trajectory_count_negative += 1,
            RelativeDirection::Positive => self.trajectory_count_positive += 1,
            RelativeDirection::Collinear => {}
        }

        self.speed_sum += segment.speed_kmh(measure)?;
        if let Some(previous) = previous {
            self.acceleration_sum += acceleration(previous, segment, measure)?;
        }
        Ok(())
    }

    pub fn merge(&mut self, other: &GateTally) {
        self.trajectory_count += other.trajectory_count;
        self.trajectory_count_negative += other.trajectory_count_negative;
        self.trajectory_count_positive += other.trajectory_count_positive;
        self.speed_sum += other.speed_sum;
        self.acceleration_sum += other.acceleration_sum;
    }

    /// Turn the partial sums into the reported averages for `gate`.
    pub fn finish(&self, gate: &Gate) -> GateStats {
        let (average_speed, average_acceleration) = if self.trajectory_count > 0 {
            let n = self.trajectory_count as f64;
            (self.speed_sum / n, self.acceleration_sum / n)
        } else {
            (0.0, 0.0)
        };

        GateStats {
            name: gate.name.clone(),
            counts_negative: gate.directions.negative,
            counts_positive: gate.directions.positive,
            trajectory_count: self.trajectory_count,
            trajectory_count_negative: self.trajectory_count_negative,
            trajectory_count_positive: self.trajectory_count_positive,
            average_speed,
            average_acceleration,
        }
    }
}

/// A named polyline barrier counting trajectories in one or both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    name: String,
    geometry: LineString<f64>,
    directions: CountDirections,
    segments: Vec<GateSegment>,
}

impl Gate {
    /// Build a gate from a line geometry.
    ///
    /// Accepts a `LineString` with at least two vertices or a `Line`. Other
    /// geometry types fail with [`CountError::InvalidGeometryType`]; counting
    /// neither direction fails with [`CountError::InvalidDirection`].
    pub fn new(
        name: impl Into<String>,
        geometry: &Geometry<f64>,
        counts_negative: bool,
        counts_positive: bool,
    ) -> Result<Self> {
        let line_string = match geometry {
            Geometry::LineString(ls) if ls.0.len() >= 2 => ls.clone(),
            Geometry::LineString(_) => {
                return Err(CountError::InvalidGeometryType(
                    "Gate line must have at least two vertices".to_string(),
                ))
            }
            Geometry::Line(line) => LineString::from(*line),
            _ => {
                return Err(CountError::InvalidGeometryType(
                    "Gate must be created from a line geometry".to_string(),
                ))
            }
        };

        let directions = CountDirections::new(counts_negative, counts_positive);
        if !directions.negative && !directions.positive {
            return Err(CountError::InvalidDirection(
                "Gate has to count at least one direction".to_string(),
            ));
        }

        let segments = line_string
            .lines()
            .map(|line| GateSegment::new(line.start, line.end))
            .collect();

        Ok(Self { name: name.into(), geometry: line_string, directions, segments })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    pub fn directions(&self) -> CountDirections {
        self.directions
    }

    pub fn segments(&self) -> &[GateSegment] {
        &self.segments
    }

    /// Decide whether `segment` crosses the gate in a counted direction.
    ///
    /// Gate segments are tried in order, then the corners between them; the
    /// first one that counts the segment decides its direction.
    pub fn trajectory_segment_crosses(
        &self,
        segment: &TrajectorySegment,
        previous: Option<&TrajectorySegment>,
    ) -> Result<Option<RelativeDirection>> {
        for gate_segment in &self.segments {
            let crossing = gate_segment.trajectory_segment_crosses(segment, previous, self.directions)?;
            if crossing.is_some() {
                return Ok(crossing);
            }
        }

        for corner in self.segments.windows(2) {
            let crossing = corner_crosses_from(&corner[0], &corner[1], segment, previous);
            if let Some(direction) = crossing.filter(|d| self.directions.counts(*d)) {
                return Ok(Some(direction));
            }
        }

        if previous.is_none() && self.touches(segment.node_a.position) {
            warn!(
                "[Gate] {}: trajectory starts on the gate with nothing to look back on, not counted",
                self.name
            );
        }

        Ok(None)
    }

    fn touches(&self, point: Coord<f64>) -> bool {
        self.segments
            .iter()
            .any(|gate_segment| point_on_segment(&gate_segment.as_line(), point))
    }

    /// Cheap pre-filter: does the trajectory's path touch the gate at all?
    pub fn intersects_trajectory(&self, trajectory: &Trajectory) -> bool {
        self.geometry.intersects(&trajectory.as_line_string())
    }

    /// Count crossings of a set of trajectories.
    ///
    /// Returns a fresh [`GateStats`]; the gate itself is not modified, so
    /// repeated calls with the same input give the same result.
    ///
    /// # Arguments
    /// * `trajectories` - Trajectories to test
    /// * `measure` - Distance capability for the trajectories' coordinates
    pub fn count_trajectories(
        &self,
        trajectories: &[Trajectory],
        measure: &dyn DistanceMeasure,
    ) -> Result<GateStats> {
        let start = Instant::now();
        let tally = self.tally(trajectories, measure)?;
        let stats = tally.finish(self);

        info!(
            "[Gate] {}: {} crossings ({} negative, {} positive) from {} trajectories in {:.1}ms",
            self.name,
            stats.trajectory_count,
            stats.trajectory_count_negative,
            stats.trajectory_count_positive,
            trajectories.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(stats)
    }

    /// Accumulate partial sums over `trajectories` without finishing them.
    pub fn tally<'a, I>(&self, trajectories: I, measure: &dyn DistanceMeasure) -> Result<GateTally>
    where
        I: IntoIterator<Item = &'a Trajectory>,
    {
        let mut tally = GateTally::default();
        for trajectory in trajectories {
            self.tally_trajectory(trajectory, measure, &mut tally)?;
        }
        Ok(tally)
    }

    fn tally_trajectory(
        &self,
        trajectory: &Trajectory,
        measure: &dyn DistanceMeasure,
        tally: &mut GateTally,
    ) -> Result<()> {
        if !self.intersects_trajectory(trajectory) {
            return Ok(());
        }

        let mut previous: Option<TrajectorySegment> = None;
        for segment in trajectory.segments() {
            if let Some(direction) = self.trajectory_segment_crosses(&segment, previous.as_ref())? {
                debug!(
                    "[Gate] {}: trajectory {} crossed from {:?} at {}ms",
                    self.name,
                    trajectory.id(),
                    direction,
                    segment.node_b.timestamp_millis()
                );
                tally.record(direction, &segment, previous.as_ref(), measure)?;
            }
            previous = Some(segment);
        }

        Ok(())
    }

    /// Count crossings with trajectories sharded across rayon's thread pool.
    ///
    /// Same counts as [`Gate::count_trajectories`]; averages may differ in the
    /// last bits because partial sums are added in a different order.
    #[cfg(feature = "parallel")]
    pub fn count_trajectories_parallel(
        &self,
        trajectories: &[Trajectory],
        measure: &dyn DistanceMeasure,
    ) -> Result<GateStats> {
        use rayon::prelude::*;

        let tally = trajectories
            .par_iter()
            .map(|trajectory| -> Result<GateTally> {
                let mut tally = GateTally::default();
                self.tally_trajectory(trajectory, measure, &mut tally)?;
                Ok(tally)
            })
            .try_reduce(GateTally::default, |mut acc, part| {
                acc.merge(&part);
                Ok(acc)
            })?;

        Ok(tally.finish(self))
    }
}

// ============================================================================
// Tests
// ============================================================================
