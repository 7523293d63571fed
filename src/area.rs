//! Polygon areas and containment counts.
//!
//! An area has no direction. A trajectory qualifies when at least one node of
//! one of its segments lies strictly inside the polygon; its speed inside the
//! area is the mean of those segments' speeds.

use std::time::Instant;

use geo::{Contains, Geometry, Intersects, MultiPolygon, Point};
use log::{debug, info};

use crate::geo_utils::{DistanceMeasure, MPS_TO_KMH};
use crate::trajectory::{Trajectory, TrajectorySegment};
use crate::{CountError, Result};

/// Aggregated counts of one area over one counting pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AreaStats {
    pub name: String,
    pub trajectory_count: u64,
    /// km/h
    pub average_speed: f64,
}

/// Partial sums of an area counting pass. Merging is additive.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AreaTally {
    pub trajectory_count: u64,
    /// Sum of per-trajectory average speeds inside the area, km/h
    pub speed_sum: f64,
}

impl AreaTally {
    pub fn merge(&mut self, other: &AreaTally) {
        self.trajectory_count += other.trajectory_count;
        self.speed_sum += other.speed_sum;
    }

    pub fn finish(&self, area: &Area) -> AreaStats {
        let average_speed = if self.trajectory_count > 0 {
            self.speed_sum / self.trajectory_count as f64
        } else {
            0.0
        };

        AreaStats {
            name: area.name.clone(),
            trajectory_count: self.trajectory_count,
            average_speed,
        }
    }
}

/// A named polygon region.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    name: String,
    geometry: MultiPolygon<f64>,
}

impl Area {
    /// Build an area from a `Polygon` or `MultiPolygon`.
    ///
    /// Any other geometry type fails with [`CountError::InvalidGeometryType`].
    pub fn new(name: impl Into<String>, geometry: &Geometry<f64>) -> Result<Self> {
        let geometry = match geometry {
            Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon.clone()]),
            Geometry::MultiPolygon(multi) => multi.clone(),
            _ => {
                return Err(CountError::InvalidGeometryType(
                    "Area must be created from a polygon geometry".to_string(),
                ))
            }
        };

        Ok(Self { name: name.into(), geometry })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn intersects_trajectory(&self, trajectory: &Trajectory) -> bool {
        self.geometry.intersects(&trajectory.as_line_string())
    }

    fn contains_node(&self, segment: &TrajectorySegment) -> bool {
        self.geometry.contains(&Point::from(segment.node_a.position))
            || self.geometry.contains(&Point::from(segment.node_b.position))
    }

    /// Segments of `trajectory` with at least one node inside the area.
    pub fn inside_segments(&self, trajectory: &Trajectory) -> Vec<TrajectorySegment> {
        if !self.intersects_trajectory(trajectory) {
            return Vec::new();
        }
        trajectory
            .segments()
            .filter(|segment| self.contains_node(segment))
            .collect()
    }

    /// Count trajectories inside the area and their average speed.
    ///
    /// Returns a fresh [`AreaStats`] each call.
    ///
    /// # Example
    /// ```
    /// use geo::{polygon, Geometry};
    /// use trajectory_counter::{Area, Trajectory, TrajectoryNode, TimestampUnit};
    /// use trajectory_counter::geo_utils::Planar;
    ///
    /// let square = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
    /// let area = Area::new("square", &Geometry::Polygon(square)).unwrap();
    ///
    /// let node = |x, y, t| TrajectoryNode::from_coordinates(x, y, t, 1.0, 1.0, 1.0, TimestampUnit::Seconds).unwrap();
    /// let walker = Trajectory::new("p-1", vec![node(0.5, 1.0, 0.0), node(1.5, 1.0, 1.0)]).unwrap();
    ///
    /// let stats = area.count_trajectories(&[walker], &Planar::meters()).unwrap();
    /// assert_eq!(stats.trajectory_count, 1);
    /// assert_eq!(stats.average_speed, 3.6);
    /// ```
    pub fn count_trajectories(
        &self,
        trajectories: &[Trajectory],
        measure: &dyn DistanceMeasure,
    ) -> Result<AreaStats> {
        let start = Instant::now();
        let stats = self.tally(trajectories, measure)?.finish(self);

        info!(
            "[Area] {}: {} of {} trajectories inside in {:.1}ms",
            self.name,
            stats.trajectory_count,
            trajectories.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(stats)
    }

    pub fn tally<'a, I>(&self, trajectories: I, measure: &dyn DistanceMeasure) -> Result<AreaTally>
    where
        I: IntoIterator<Item = &'a Trajectory>,
    {
        let mut tally = AreaTally::default();
        for trajectory in trajectories {
            tally.merge(&self.tally_trajectory(trajectory, measure)?);
        }
        Ok(tally)
    }

    fn tally_trajectory(&self, trajectory: &Trajectory, measure: &dyn DistanceMeasure) -> Result<AreaTally> {
        let inside = self.inside_segments(trajectory);
        if inside.is_empty() {
            return Ok(AreaTally::default());
        }

        let mut speed_sum = 0.0;
        for segment in &inside {
            speed_sum += segment.speed_mps(measure)?;
        }
        let average_kmh = speed_sum / inside.len() as f64 * MPS_TO_KMH;

        debug!(
            "[Area] {}: trajectory {} has {} segments inside, {:.2} km/h",
            self.name,
            trajectory.id(),
            inside.len(),
            average_kmh
        );

        Ok(AreaTally { trajectory_count: 1, speed_sum: average_kmh })
    }

    /// Parallel variant of [`Area::count_trajectories`].
    #[cfg(feature = "parallel")]
    pub fn count_trajectories_parallel(
        &self,
        trajectories: &[Trajectory],
        measure: &dyn DistanceMeasure,
    ) -> Result<AreaStats> {
        use rayon::prelude::*;

        let tally = trajectories
            .par_iter()
            .map(|trajectory| self.tally_trajectory(trajectory, measure))
            .try_reduce(AreaTally::default, |mut acc, part| {
                acc.merge(&part);
                Ok(acc)
            })?;

        Ok(tally.finish(self))
    }
}
