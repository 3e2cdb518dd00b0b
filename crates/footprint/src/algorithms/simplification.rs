//! Ring georeferencing, simplification and area filtering.

use geo::orient::{Direction, Orient};
use geo::{GeodesicArea, Intersects, Simplify};
use geo_types::{Coord, Line, LineString, Polygon};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::{
    error::{FootprintError, Result},
    geo_transform::GeoTransform,
    session::FootprintIdAllocator,
    types::{BoundingBox, Footprint},
};

/// Turns pixel rings into georeferenced footprints
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RingProcessor {
    /// Footprints with an area at or below this value are dropped (m²)
    pub min_area_m2: f64,
    /// Douglas-Peucker tolerance in degrees
    pub simplify_tolerance: f64,
}

impl Default for RingProcessor {
    fn default() -> Self {
        Self {
            min_area_m2: 5.0,
            simplify_tolerance: 0.000005,
        }
    }
}

impl RingProcessor {
    pub fn new(min_area_m2: f64, simplify_tolerance: f64) -> Self {
        Self { min_area_m2, simplify_tolerance }
    }

    /// Georeference, simplify and filter a single ring.
    ///
    /// Returns `None` for rings that are too short, cannot form a polygon, or
    /// are too small. Never fails.
    pub fn process_ring(
        &self,
        ring: &[[f64; 2]],
        img_width: u32,
        img_height: u32,
        bbox: &BoundingBox,
        ids: &FootprintIdAllocator,
    ) -> Option<Footprint> {
        if ring.len() < 3 {
            tracing::debug!(points = ring.len(), "dropping ring with fewer than 3 points");
            return None;
        }

        let transform = GeoTransform::new(img_width, img_height, *bbox);
        let mut coords = transform.ring_to_geo(ring);
        close_ring(&mut coords);

        let polygon = match try_polygon(coords) {
            Ok(polygon) => polygon,
            Err(e) => {
                tracing::debug!("dropping ring: {}", e);
                return None;
            }
        };

        // Geodesic area of a clockwise exterior is the rest of the globe
        let simplified = simplify_preserving(&polygon, self.simplify_tolerance).orient(Direction::Default);
        let area = simplified.geodesic_area_unsigned();
        if !area.is_finite() {
            tracing::debug!("dropping ring with non-finite area");
            return None;
        }
        if area <= self.min_area_m2 {
            tracing::debug!(area, min_area = self.min_area_m2, "dropping ring below minimum area");
            return None;
        }

        Some(Footprint::new(ids.next_id(), simplified, area))
    }

    /// Process every ring of one raster, keeping the survivors in order
    pub fn process_rings(
        &self,
        rings: &[Vec<[f64; 2]>],
        img_width: u32,
        img_height: u32,
        bbox: &BoundingBox,
        ids: &FootprintIdAllocator,
    ) -> Vec<Footprint> {
        let footprints: Vec<Footprint> = rings
            .iter()
            .filter_map(|ring| self.process_ring(ring, img_width, img_height, bbox, ids))
            .collect();

        tracing::debug!(
            rings = rings.len(),
            kept = footprints.len(),
            dropped = rings.len() - footprints.len(),
            "georeferenced rings"
        );
        footprints
    }
}

/// Append the first vertex when the ring is open
pub fn close_ring(coords: &mut Vec<Coord<f64>>) {
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last {
            coords.push(first);
        }
    }
}

/// Build a polygon from a closed ring.
///
/// Needs at least four positions (three distinct corners plus the closing
/// one), a closed ring and finite coordinates.
pub fn try_polygon(coords: Vec<Coord<f64>>) -> Result<Polygon<f64>> {
    if coords.len() < 4 {
        return Err(FootprintError::GeometryConstruction(format!(
            "ring needs at least 4 positions, got {}",
            coords.len()
        )));
    }
    if coords.first() != coords.last() {
        return Err(FootprintError::GeometryConstruction(
            "first and last positions differ".to_string(),
        ));
    }
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(FootprintError::GeometryConstruction(
            "ring has non-finite coordinates".to_string(),
        ));
    }

    Ok(Polygon::new(LineString::new(coords), vec![]))
}

/// Douglas-Peucker simplification that falls back to the input when the
/// result would be degenerate or newly self-intersecting.
pub fn simplify_preserving(polygon: &Polygon<f64>, tolerance: f64) -> Polygon<f64> {
    if tolerance <= 0.0 {
        return polygon.clone();
    }

    let simplified = polygon.simplify(&tolerance);
    let ring = simplified.exterior();

    if ring.0.len() < 4 || signed_ring_area(ring) == 0.0 {
        return polygon.clone();
    }
    if has_self_intersection(ring) && !has_self_intersection(polygon.exterior()) {
        return polygon.clone();
    }

    simplified
}

/// Shoelace area in coordinate units, used only as a degeneracy check
fn signed_ring_area(ring: &LineString<f64>) -> f64 {
    ring.lines()
        .map(|line| line.start.x * line.end.y - line.end.x * line.start.y)
        .sum::<f64>()
        / 2.0
}

/// True when two non-adjacent edges of a closed ring touch or cross
pub fn has_self_intersection(ring: &LineString<f64>) -> bool {
    let edges: Vec<Line<f64>> = ring.lines().filter(|l| l.start != l.end).collect();
    let n = edges.len();
    if n < 4 {
        return false;
    }

    for i in 0..n {
        for j in (i + 2)..n {
            // First and last edges share the closing vertex
            if i == 0 && j == n - 1 {
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return true;
            }
        }
    }
    false
}
