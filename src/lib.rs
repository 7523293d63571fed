//! # Trajectory Counter
//!
//! Counts tracked-object trajectories against user-defined gates (polyline
//! barriers) and areas (polygons), and derives the kinematics reported with
//! those counts.
//!
//! This library provides:
//! - A crossing-direction classifier for gate segments, including the
//!   look-back resolution of trajectory vertices that land exactly on a gate
//! - Per-gate counts, per-direction counts, average speed and acceleration
//! - Per-area containment counts and average speed
//! - Per-trajectory speed, length, duration and size statistics
//! - A batch pass with an R-tree pre-filter, progress and cancellation
//!
//! ## Features
//!
//! - **`parallel`** - Shard counting passes across threads with rayon
//! - **`serde`** - Serialize output records and configuration
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use geo::{coord, Geometry, LineString};
//! use trajectory_counter::{Gate, Trajectory, TrajectoryNode, TimestampUnit};
//! use trajectory_counter::geo_utils::Planar;
//!
//! let gate = Gate::new(
//!     "north-bound",
//!     &Geometry::LineString(LineString::from(vec![(-0.5, 0.5), (0.5, 0.5)])),
//!     true,
//!     true,
//! )
//! .unwrap();
//!
//! let trajectory = Trajectory::new(
//!     "car-1",
//!     vec![
//!         TrajectoryNode::from_coordinates(0.0, 0.0, 0.0, 1.8, 4.5, 1.5, TimestampUnit::Milliseconds).unwrap(),
//!         TrajectoryNode::from_coordinates(0.0, 1.0, 100.0, 1.8, 4.5, 1.5, TimestampUnit::Milliseconds).unwrap(),
//!     ],
//! )
//! .unwrap();
//!
//! let stats = gate.count_trajectories(&[trajectory], &Planar::meters()).unwrap();
//! assert_eq!(stats.trajectory_count, 1);
//! assert_eq!(stats.average_speed, 36.0); // 1 m in 0.1 s
//! ```

use chrono::{DateTime, TimeZone, Utc};
use geo::Coord;
use thiserror::Error;

pub mod geo_utils;

pub mod trajectory;
pub use trajectory::{
    build_trajectories, IngestConfig, PointRecord, Trajectory, TrajectorySegment,
    TrajectorySummary,
};

pub mod gate;
pub use gate::{CountDirections, Gate, GateSegment, GateStats, GateTally};

pub mod area;
pub use area::{Area, AreaStats, AreaTally};

pub mod batch;
pub use batch::{count_all, BatchConfig, CountReport, ProgressCallback};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while building or counting.
///
/// None of these are transient: construction errors mean the input is
/// unusable, classifier errors mean a geometric precondition was violated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CountError {
    #[error("invalid geometry type: {0}")]
    InvalidGeometryType(String),
    #[error("invalid direction: {0}")]
    InvalidDirection(String),
    #[error("invalid segment: {0}")]
    InvalidSegment(String),
    #[error("invalid trajectory: {0}")]
    InvalidTrajectory(String),
    #[error("timestamp {0} cannot be represented")]
    InvalidTimestamp(f64),
    #[error("invalid time window: {0}")]
    InvalidTimeWindow(String),
    #[error("counting pass cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CountError>;

// ============================================================================
// Core Types
// ============================================================================

/// Side of a directed gate segment a point lies on.
///
/// Positive is the right-hand side when walking from the segment's first
/// point to its second, negative the left-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelativeDirection {
    Negative,
    Positive,
    Collinear,
}

impl RelativeDirection {
    /// The same classification seen from a segment with swapped endpoints.
    pub fn opposite(self) -> Self {
        match self {
            RelativeDirection::Negative => RelativeDirection::Positive,
            RelativeDirection::Positive => RelativeDirection::Negative,
            RelativeDirection::Collinear => RelativeDirection::Collinear,
        }
    }
}

/// Unit of raw numeric timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimestampUnit {
    Seconds,
    Milliseconds,
    /// Decide from the magnitude of the value, see [`TimestampUnit::detect`].
    #[default]
    Auto,
}

/// A Unix timestamp in seconds with this many digits would be past year 33658.
const MILLISECOND_DIGIT_THRESHOLD: u32 = 13;

impl TimestampUnit {
    /// Guess the unit of a Unix timestamp from its number of integer digits.
    pub fn detect(timestamp: f64) -> Self {
        let magnitude = timestamp.abs().trunc();
        let digits = if magnitude < 1.0 {
            1
        } else {
            magnitude.log10().floor() as u32 + 1
        };

        if digits >= MILLISECOND_DIGIT_THRESHOLD {
            TimestampUnit::Milliseconds
        } else {
            TimestampUnit::Seconds
        }
    }

    /// Convert a raw timestamp in this unit to whole milliseconds since the epoch.
    pub fn to_millis(self, timestamp: f64) -> Result<i64> {
        let millis = match self {
            TimestampUnit::Seconds => timestamp * 1000.0,
            TimestampUnit::Milliseconds => timestamp,
            TimestampUnit::Auto => return Self::detect(timestamp).to_millis(timestamp),
        };

        if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
            return Err(CountError::InvalidTimestamp(timestamp));
        }
        Ok(millis.round() as i64)
    }
}

/// Width, length and height of a detected object.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Size {
    pub width: f64,
    pub length: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, length: f64, height: f64) -> Self {
        Self { width, length, height }
    }
}

/// One located, timestamped and sized observation of a tracked object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryNode {
    pub position: Coord<f64>,
    pub timestamp: DateTime<Utc>,
    pub width: f64,
    pub length: f64,
    pub height: f64,
}

impl TrajectoryNode {
    pub fn new(
        position: Coord<f64>,
        timestamp: DateTime<Utc>,
        width: f64,
        length: f64,
        height: f64,
    ) -> Self {
        Self { position, timestamp, width, length, height }
    }

    /// Create a node from raw coordinates and a numeric Unix timestamp.
    ///
    /// # Example
    /// ```
    /// use trajectory_counter::{TrajectoryNode, TimestampUnit};
    ///
    /// let node = TrajectoryNode::from_coordinates(1.0, 2.0, 1500.0, 0.5, 0.5, 1.7, TimestampUnit::Milliseconds).unwrap();
    /// assert_eq!(node.timestamp_millis(), 1500);
    /// ```
    pub fn from_coordinates(
        x: f64,
        y: f64,
        timestamp: f64,
        width: f64,
        length: f64,
        height: f64,
        unit: TimestampUnit,
    ) -> Result<Self> {
        let millis = unit.to_millis(timestamp)?;
        let timestamp = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or(CountError::InvalidTimestamp(timestamp))?;

        Ok(Self::new(Coord { x, y }, timestamp, width, length, height))
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.length, self.height)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_direction_opposite() {
        assert_eq!(RelativeDirection::Negative.opposite(), RelativeDirection::Positive);
        assert_eq!(RelativeDirection::Positive.opposite(), RelativeDirection::Negative);
        assert_eq!(RelativeDirection::Collinear.opposite(), RelativeDirection::Collinear);
    }

    #[test]
    fn test_timestamp_unit_detection() {
        assert_eq!(TimestampUnit::detect(1_700_000_000.0), TimestampUnit::Seconds);
        assert_eq!(TimestampUnit::detect(1_700_000_000_000.0), TimestampUnit::Milliseconds);
        assert_eq!(TimestampUnit::detect(0.0), TimestampUnit::Seconds);
        assert_eq!(TimestampUnit::detect(999_999_999_999.0), TimestampUnit::Seconds);
    }

    #[test]
    fn test_timestamp_to_millis() {
        assert_eq!(TimestampUnit::Seconds.to_millis(0.1).unwrap(), 100);
        assert_eq!(TimestampUnit::Milliseconds.to_millis(250.0).unwrap(), 250);
        assert_eq!(TimestampUnit::Auto.to_millis(1_700_000_000.5).unwrap(), 1_700_000_000_500);
        assert_eq!(TimestampUnit::Auto.to_millis(1_700_000_000_123.0).unwrap(), 1_700_000_000_123);
        assert!(TimestampUnit::Seconds.to_millis(f64::NAN).is_err());
    }

    #[test]
    fn test_non_finite_timestamp_rejected() {
        assert!(matches!(
            TrajectoryNode::from_coordinates(0.0, 0.0, f64::INFINITY, 1.0, 1.0, 1.0, TimestampUnit::Seconds),
            Err(CountError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_node_from_coordinates() {
        let node = TrajectoryNode::from_coordinates(
            24.94, 60.17, 1_700_000_000.0, 1.8, 4.5, 1.5, TimestampUnit::Auto,
        )
        .unwrap();
        assert_eq!(node.position, Coord { x: 24.94, y: 60.17 });
        assert_eq!(node.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(node.size(), Size::new(1.8, 4.5, 1.5));
    }
}
