//! # Geometric Utilities
//!
//! Planar primitives and the distance capability used by the crossing engine.
//!
//! ## Overview
//!
//! | Item | Description |
//! |------|-------------|
//! | [`signed_area2`] | Twice the signed area of a triangle, the side test for everything else |
//! | [`segments_intersect`] | Segments share at least one point (touching and overlap included) |
//! | [`segments_cross`] | Segments intersect transversally at a single interior point |
//! | [`point_on_segment`] | Point lies exactly on a segment |
//! | [`DistanceMeasure`] | Injected capability turning two coordinates into a real-world distance |
//! | [`Planar`] | Euclidean distance in a projected coordinate system |
//! | [`Spherical`] | Great-circle distance for lon/lat coordinates |
//! | [`Bounds`] | Axis-aligned envelope used for spatial pre-filtering |
//!
//! ## Example
//!
//! ```rust
//! use geo::{coord, Line};
//! use trajectory_counter::geo_utils;
//!
//! let gate = Line::new(coord! { x: -0.5, y: 0.5 }, coord! { x: 0.5, y: 0.5 });
//! let through = Line::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 0.0, y: 1.0 });
//! let onto = Line::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 0.0, y: 0.5 });
//!
//! assert!(geo_utils::segments_cross(&gate, &through));
//! assert!(!geo_utils::segments_cross(&gate, &onto));
//! assert!(geo_utils::segments_intersect(&gate, &onto));
//! ```
//!
//! ## Sign Convention
//!
//! [`signed_area2`] is `(p.x - a.x) * (b.y - a.y) - (p.y - a.y) * (b.x - a.x)`.
//! Walking from `a` to `b`, points on the right-hand side give a positive value
//! and points on the left-hand side a negative one. Gate directions are named
//! after this sign.

use geo::{Coord, Distance, Euclidean, Haversine, Line, Point};
use rstar::AABB;

/// Conversion factor from metres per second to kilometres per hour.
pub const MPS_TO_KMH: f64 = 3.6;

// =============================================================================
// Orientation Predicates
// =============================================================================

/// Twice the signed area of the triangle `(a, b, p)`.
///
/// The sign tells which side of the directed line `a → b` the point `p` lies on;
/// zero means the three points are collinear.
#[inline]
pub fn signed_area2(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> f64 {
    (p.x - a.x) * (b.y - a.y) - (p.y - a.y) * (b.x - a.x)
}

/// Whether `p`, already known to be collinear with `line`, lies within its bounding box.
#[inline]
fn on_segment(line: &Line<f64>, p: Coord<f64>) -> bool {
    p.x >= line.start.x.min(line.end.x)
        && p.x <= line.start.x.max(line.end.x)
        && p.y >= line.start.y.min(line.end.y)
        && p.y <= line.start.y.max(line.end.y)
}

/// Check whether `p` lies exactly on `line`, endpoints included.
pub fn point_on_segment(line: &Line<f64>, p: Coord<f64>) -> bool {
    signed_area2(line.start, line.end, p) == 0.0 && on_segment(line, p)
}

/// Check whether two segments share at least one point.
///
/// This is the broad test: a segment ending exactly on the other one, or two
/// collinear overlapping segments, both count as intersecting.
pub fn segments_intersect(first: &Line<f64>, second: &Line<f64>) -> bool {
    let o1 = signed_area2(first.start, first.end, second.start);
    let o2 = signed_area2(first.start, first.end, second.end);
    let o3 = signed_area2(second.start, second.end, first.start);
    let o4 = signed_area2(second.start, second.end, first.end);

    if opposite_signs(o1, o2) && opposite_signs(o3, o4) {
        return true;
    }

    (o1 == 0.0 && on_segment(first, second.start))
        || (o2 == 0.0 && on_segment(first, second.end))
        || (o3 == 0.0 && on_segment(second, first.start))
        || (o4 == 0.0 && on_segment(second, first.end))
}

/// Check whether two segments cross transversally.
///
/// Both endpoints of each segment must lie strictly on opposite sides of the
/// other segment's supporting line. Touching at an endpoint and collinear
/// overlap are not crossings.
pub fn segments_cross(first: &Line<f64>, second: &Line<f64>) -> bool {
    let o1 = signed_area2(first.start, first.end, second.start);
    let o2 = signed_area2(first.start, first.end, second.end);
    let o3 = signed_area2(second.start, second.end, first.start);
    let o4 = signed_area2(second.start, second.end, first.end);

    opposite_signs(o1, o2) && opposite_signs(o3, o4)
}

#[inline]
fn opposite_signs(a: f64, b: f64) -> bool {
    (a > 0.0 && b < 0.0) || (a < 0.0 && b > 0.0)
}

// =============================================================================
// Distance Capability
// =============================================================================

/// Native length unit of a coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LengthUnit {
    Meters,
    Kilometers,
    Feet,
    Miles,
}

impl LengthUnit {
    /// Convert a length expressed in this unit to metres.
    #[inline]
    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            LengthUnit::Meters => value,
            LengthUnit::Kilometers => value * 1000.0,
            LengthUnit::Feet => value * 0.3048,
            LengthUnit::Miles => value * 1609.344,
        }
    }
}

/// Turns a pair of coordinates into a real-world distance.
///
/// Counting and kinematics never assume a coordinate system; callers pass the
/// measure that matches their data.
pub trait DistanceMeasure: Send + Sync {
    /// Distance between `a` and `b` in [`DistanceMeasure::length_unit`] units.
    fn measure(&self, a: Coord<f64>, b: Coord<f64>) -> f64;

    /// Unit returned by [`DistanceMeasure::measure`].
    fn length_unit(&self) -> LengthUnit;

    /// Distance between `a` and `b` in metres.
    fn measure_meters(&self, a: Coord<f64>, b: Coord<f64>) -> f64 {
        self.length_unit().to_meters(self.measure(a, b))
    }
}

/// Euclidean distance on projected coordinates (e.g. EPSG:3067 metres).
///
/// # Example
///
/// ```rust
/// use geo::coord;
/// use trajectory_counter::geo_utils::{DistanceMeasure, LengthUnit, Planar};
///
/// let measure = Planar::new(LengthUnit::Kilometers);
/// let d = measure.measure_meters(coord! { x: 0.0, y: 0.0 }, coord! { x: 3.0, y: 4.0 });
/// assert_eq!(d, 5000.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Planar {
    unit: LengthUnit,
}

impl Planar {
    pub fn new(unit: LengthUnit) -> Self {
        Self { unit }
    }

    /// Projected coordinates in metres.
    pub fn meters() -> Self {
        Self::new(LengthUnit::Meters)
    }
}

impl DistanceMeasure for Planar {
    fn measure(&self, a: Coord<f64>, b: Coord<f64>) -> f64 {
        Euclidean::distance(Point::from(a), Point::from(b))
    }

    fn length_unit(&self) -> LengthUnit {
        self.unit
    }
}

/// Great-circle distance for coordinates given as `x = longitude`, `y = latitude`.
///
/// Uses the Haversine formula on a spherical Earth, accurate to within 0.3%
/// for the short hops between consecutive detections.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Spherical;

impl DistanceMeasure for Spherical {
    fn measure(&self, a: Coord<f64>, b: Coord<f64>) -> f64 {
        Haversine::distance(Point::from(a), Point::from(b))
    }

    fn length_unit(&self) -> LengthUnit {
        LengthUnit::Meters
    }
}

// =============================================================================
// Bounding Boxes
// =============================================================================

/// Axis-aligned bounding box in native coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Envelope of a set of coordinates. Returns `None` for empty input.
    pub fn from_coords<'a, I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coord<f64>>,
    {
        let mut iter = coords.into_iter().peekable();
        iter.peek()?;

        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;

        for c in iter {
            min_x = min_x.min(c.x);
            min_y = min_y.min(c.y);
            max_x = max_x.max(c.x);
            max_y = max_y.max(c.y);
        }

        Some(Self { min_x, min_y, max_x, max_y })
    }

    /// Grow the box by `padding` on every side.
    pub fn padded(&self, padding: f64) -> Self {
        Self {
            min_x: self.min_x - padding,
            min_y: self.min_y - padding,
            max_x: self.max_x + padding,
            max_y: self.max_y + padding,
        }
    }

    /// Closed-interval overlap test.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        !(self.max_x < other.min_x
            || other.max_x < self.min_x
            || self.max_y < other.min_y
            || other.max_y < self.min_y)
    }

    pub fn to_aabb(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Round to two decimals, the precision reported for speeds, lengths and sizes.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// Unit Tests
// =============================================================================
