//! World-space geometry for scopes and their visibility regions.
//!
//! Producers describe entities with whatever shape they have on hand --
//! a point, a circle, a polygon outline, or a bounding box. The engine
//! only ever needs two derived measures (a center and a maximum radius
//! from that center) plus containment tests on the computed region of
//! interest, so the types here stay deliberately small.

use serde::{Deserialize, Serialize};

/// A point in 2D world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Construct a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance to another point.
    ///
    /// Kept squared so containment tests never take a square root.
    pub fn distance_sq(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }
}

/// The geometry of an entity as reported by the geometry provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Geometry {
    /// A single point.
    Point {
        /// The point itself.
        center: Point,
    },
    /// A circle.
    Circle {
        /// Circle center.
        center: Point,
        /// Circle radius.
        radius: f64,
    },
    /// A closed polygon given as its vertex list.
    Polygon {
        /// Polygon vertices in order.
        points: Vec<Point>,
    },
    /// An axis-aligned bounding box.
    Bbox {
        /// Minimum corner.
        min: Point,
        /// Maximum corner.
        max: Point,
    },
}

impl Default for Geometry {
    /// The conservative fallback: a point at the origin.
    fn default() -> Self {
        Self::origin()
    }
}

impl Geometry {
    /// A conservative default used when the geometry provider fails:
    /// a point at the origin.
    pub const fn origin() -> Self {
        Self::Point { center: Point::new(0.0, 0.0) }
    }

    /// The derivable center of this geometry.
    ///
    /// Polygons use the vertex average; an empty polygon degrades to the
    /// origin.
    pub fn center(&self) -> Point {
        match self {
            Self::Point { center } | Self::Circle { center, .. } => *center,
            Self::Polygon { points } => {
                if points.is_empty() {
                    return Point::default();
                }
                let n = points.len() as f64;
                let (sx, sy) = points
                    .iter()
                    .fold((0.0_f64, 0.0_f64), |(sx, sy), p| (sx + p.x, sy + p.y));
                Point::new(sx / n, sy / n)
            }
            Self::Bbox { min, max } => {
                Point::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0)
            }
        }
    }

    /// The axis-aligned bounding envelope of this geometry as
    /// `(min, max)` corners. Points collapse to a zero-area box.
    pub fn bounds(&self) -> (Point, Point) {
        match self {
            Self::Point { center } => (*center, *center),
            Self::Circle { center, radius } => (
                Point::new(center.x - radius, center.y - radius),
                Point::new(center.x + radius, center.y + radius),
            ),
            Self::Polygon { points } => {
                if points.is_empty() {
                    return (Point::default(), Point::default());
                }
                let mut min = Point::new(f64::INFINITY, f64::INFINITY);
                let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
                for p in points {
                    min.x = min.x.min(p.x);
                    min.y = min.y.min(p.y);
                    max.x = max.x.max(p.x);
                    max.y = max.y.max(p.y);
                }
                (min, max)
            }
            Self::Bbox { min, max } => (*min, *max),
        }
    }

    /// The maximum distance from [`Self::center`] to any part of the
    /// geometry. Zero for points and empty polygons.
    pub fn max_radius(&self) -> f64 {
        match self {
            Self::Point { .. } => 0.0,
            Self::Circle { radius, .. } => *radius,
            Self::Polygon { points } => {
                let center = self.center();
                points
                    .iter()
                    .map(|p| p.distance_sq(&center))
                    .fold(0.0_f64, f64::max)
                    .sqrt()
            }
            Self::Bbox { min, max } => {
                let center = self.center();
                center.distance_sq(max).max(center.distance_sq(min)).sqrt()
            }
        }
    }
}

/// The 2D region a scope is considered to "see".
///
/// Polygonal inputs are restricted to their axis-aligned envelope, so a
/// region is always a circle, a rectangle, or unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "region", rename_all = "snake_case")]
pub enum Region {
    /// A circular region.
    Circle {
        /// Region center.
        center: Point,
        /// Region radius.
        radius: f64,
    },
    /// An axis-aligned rectangular region.
    Rect {
        /// Minimum corner.
        min: Point,
        /// Maximum corner.
        max: Point,
    },
    /// The whole world (world/universe scopes).
    Unbounded,
}

impl Region {
    /// Test whether a point lies inside the region.
    ///
    /// Circles compare squared distance against squared radius to avoid
    /// the square root; rectangles compare against their bounds.
    pub fn contains(&self, p: &Point) -> bool {
        match self {
            Self::Circle { center, radius } => {
                center.distance_sq(p) <= radius * radius
            }
            Self::Rect { min, max } => {
                p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
            }
            Self::Unbounded => true,
        }
    }

    /// Grow the region outward by `distance` on every side.
    ///
    /// Circles grow their radius; rectangles grow their envelope;
    /// an unbounded region is unchanged.
    pub fn expand(self, distance: f64) -> Self {
        match self {
            Self::Circle { center, radius } => Self::Circle {
                center,
                radius: radius + distance,
            },
            Self::Rect { min, max } => Self::Rect {
                min: Point::new(min.x - distance, min.y - distance),
                max: Point::new(max.x + distance, max.y + distance),
            },
            Self::Unbounded => Self::Unbounded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_center_and_radius() {
        let g = Geometry::Circle { center: Point::new(3.0, 4.0), radius: 7.5 };
        assert!((g.center().x - 3.0).abs() < f64::EPSILON);
        assert!((g.max_radius() - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn bbox_center_is_midpoint() {
        let g = Geometry::Bbox { min: Point::new(0.0, 0.0), max: Point::new(10.0, 20.0) };
        let c = g.center();
        assert!((c.x - 5.0).abs() < 1e-9);
        assert!((c.y - 10.0).abs() < 1e-9);
        // Corner distance from (5,10) is sqrt(25 + 100).
        assert!((g.max_radius() - 125.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn polygon_radius_reaches_farthest_vertex() {
        let g = Geometry::Polygon {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(4.0, 0.0),
                Point::new(4.0, 4.0),
                Point::new(0.0, 4.0),
            ],
        };
        let c = g.center();
        assert!((c.x - 2.0).abs() < 1e-9);
        assert!((g.max_radius() - 8.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn empty_polygon_degrades_to_origin() {
        let g = Geometry::Polygon { points: Vec::new() };
        assert_eq!(g.center(), Point::default());
        assert!(g.max_radius().abs() < f64::EPSILON);
    }

    #[test]
    fn circle_containment_uses_squared_distance() {
        let r = Region::Circle { center: Point::new(0.0, 0.0), radius: 5.0 };
        assert!(r.contains(&Point::new(3.0, 4.0))); // exactly on the rim
        assert!(!r.contains(&Point::new(3.1, 4.1)));
    }

    #[test]
    fn rect_containment_is_inclusive() {
        let r = Region::Rect { min: Point::new(-1.0, -1.0), max: Point::new(1.0, 1.0) };
        assert!(r.contains(&Point::new(1.0, 1.0)));
        assert!(!r.contains(&Point::new(1.0, 1.5)));
    }

    #[test]
    fn expand_grows_every_side() {
        let r = Region::Rect { min: Point::new(0.0, 0.0), max: Point::new(2.0, 2.0) }
            .expand(3.0);
        assert!(r.contains(&Point::new(-3.0, -3.0)));
        assert!(r.contains(&Point::new(5.0, 5.0)));
        assert!(!r.contains(&Point::new(5.1, 0.0)));

        let c = Region::Circle { center: Point::default(), radius: 1.0 }.expand(2.0);
        assert!(c.contains(&Point::new(0.0, 3.0)));
    }

    #[test]
    fn unbounded_contains_everything() {
        assert!(Region::Unbounded.contains(&Point::new(1.0e12, -1.0e12)));
        assert_eq!(Region::Unbounded.expand(500.0), Region::Unbounded);
    }
}
