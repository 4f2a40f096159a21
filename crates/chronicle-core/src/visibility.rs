//! Visibility-region computation.
//!
//! Each scope kind maps its primary entity's geometry onto a 2D region
//! of interest. Player scopes see a perception-scaled circle, groups a
//! fixed halo around their extent, locations and regions their own
//! footprint plus a buffer, and world scopes everything. The result is
//! stored on the agent and recomputed whenever the entity projection
//! changes.

use chronicle_types::{Geometry, Region, ScopeKind};

/// Base radius for a player scope before perception scaling.
pub const PLAYER_BASE_RADIUS: f64 = 200.0;

/// Fixed halo added to a group scope's extent.
pub const GROUP_HALO: f64 = 300.0;

/// Implicit buffer distance for location and region scopes when no
/// explicit buffer is configured.
pub const IMPLICIT_BUFFER: f64 = 200.0;

/// Compute the visibility region for a scope.
///
/// `perception` is the primary entity's perception attribute, when
/// present; it scales the player base radius. `buffer` is the explicit
/// configured buffer distance (zero or negative means unset, in which
/// case location-type scopes get [`IMPLICIT_BUFFER`]).
pub fn compute_visibility(
    kind: ScopeKind,
    geometry: &Geometry,
    perception: Option<f64>,
    buffer: f64,
) -> Region {
    let base = match kind {
        ScopeKind::Player => Region::Circle {
            center: geometry.center(),
            radius: PLAYER_BASE_RADIUS * perception.unwrap_or(1.0),
        },
        ScopeKind::Group => Region::Circle {
            center: geometry.center(),
            radius: GROUP_HALO + geometry.max_radius(),
        },
        ScopeKind::Location | ScopeKind::Region => footprint(geometry),
        ScopeKind::World => Region::Unbounded,
    };

    let distance = if buffer > 0.0 {
        buffer
    } else if kind.has_implicit_buffer() {
        IMPLICIT_BUFFER
    } else {
        0.0
    };

    if distance > 0.0 { base.expand(distance) } else { base }
}

/// The region matching an entity's own extent.
///
/// Circular and point geometry keep a circular region; polygons and
/// bounding boxes reduce to their axis-aligned envelope, which is what
/// the buffer later grows on every side.
fn footprint(geometry: &Geometry) -> Region {
    match geometry {
        Geometry::Point { .. } | Geometry::Circle { .. } => Region::Circle {
            center: geometry.center(),
            radius: geometry.max_radius(),
        },
        Geometry::Polygon { .. } | Geometry::Bbox { .. } => {
            let (min, max) = geometry.bounds();
            Region::Rect { min, max }
        }
    }
}
