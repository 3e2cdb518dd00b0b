//! Affine mapping between raster pixels and longitude/latitude.

use geo_types::Coord;

use crate::types::BoundingBox;

/// Map a pixel position to `(lon, lat)`.
///
/// Row 0 is the northernmost row, so latitude decreases as `y` grows.
/// `img_width` and `img_height` must be non-zero.
pub fn pixel_to_geo(x: f64, y: f64, img_width: u32, img_height: u32, bbox: &BoundingBox) -> (f64, f64) {
    assert!(
        img_width > 0 && img_height > 0,
        "pixel_to_geo called with degenerate extent {img_width}x{img_height}"
    );

    // Two-sided lerp is exact at both edges
    let tx = x / img_width as f64;
    let ty = y / img_height as f64;
    let lon = bbox.west * (1.0 - tx) + bbox.east * tx;
    let lat = bbox.north * (1.0 - ty) + bbox.south * ty;
    (lon, lat)
}

/// Inverse of [`pixel_to_geo`]
pub fn geo_to_pixel(lon: f64, lat: f64, img_width: u32, img_height: u32, bbox: &BoundingBox) -> (f64, f64) {
    assert!(
        img_width > 0 && img_height > 0,
        "geo_to_pixel called with degenerate extent {img_width}x{img_height}"
    );

    let x = (lon - bbox.west) / (bbox.east - bbox.west) * img_width as f64;
    let y = (bbox.north - lat) / (bbox.north - bbox.south) * img_height as f64;
    (x, y)
}

/// Pixel/geo mapping bound to one raster extent
#[derive(Debug, Clone, Copy)]
pub struct GeoTransform {
    width: u32,
    height: u32,
    bbox: BoundingBox,
}

impl GeoTransform {
    pub fn new(width: u32, height: u32, bbox: BoundingBox) -> Self {
        assert!(width > 0 && height > 0, "GeoTransform needs a non-empty raster");
        Self { width, height, bbox }
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn to_geo(&self, x: f64, y: f64) -> Coord<f64> {
        let (lon, lat) = pixel_to_geo(x, y, self.width, self.height, &self.bbox);
        Coord { x: lon, y: lat }
    }

    pub fn to_pixel(&self, coord: Coord<f64>) -> [f64; 2] {
        let (x, y) = geo_to_pixel(coord.x, coord.y, self.width, self.height, &self.bbox);
        [x, y]
    }

    pub fn ring_to_geo(&self, ring: &[[f64; 2]]) -> Vec<Coord<f64>> {
        ring.iter().map(|&[x, y]| self.to_geo(x, y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_bbox() -> BoundingBox {
        BoundingBox::new(-49.36, -49.35, -25.56, -25.57).expect("valid bbox")
    }

    #[test]
    fn test_corners_map_exactly() {
        let crossing_zero = BoundingBox::new(-0.1, 0.2, 0.1, -0.2).expect("valid bbox");
        let far_east = BoundingBox::new(179.3, 179.9, 64.7, 64.1).expect("valid bbox");
        for bbox in [scenario_bbox(), crossing_zero, far_east] {
            for (w, h) in [(1, 1), (256, 512), (1000, 1000), (1920, 1080)] {
                assert_eq!(pixel_to_geo(0.0, 0.0, w, h, &bbox), (bbox.west, bbox.north));
                assert_eq!(
                    pixel_to_geo(w as f64, h as f64, w, h, &bbox),
                    (bbox.east, bbox.south)
                );
            }
        }
    }

    #[test]
    fn test_scenario_center_pixel() {
        let (lon, lat) = pixel_to_geo(500.0, 500.0, 1000, 1000, &scenario_bbox());
        assert!((lon - -49.355).abs() < 1e-9, "lon was {lon}");
        assert!((lat - -25.565).abs() < 1e-9, "lat was {lat}");
    }

    #[test]
    fn test_inverse_mapping() {
        let transform = GeoTransform::new(640, 480, scenario_bbox());
        let coord = transform.to_geo(123.0, 321.5);
        let [x, y] = transform.to_pixel(coord);
        assert!((x - 123.0).abs() < 1e-6);
        assert!((y - 321.5).abs() < 1e-6);
    }

    #[test]
    #[should_panic]
    fn test_zero_extent_is_a_precondition_violation() {
        pixel_to_geo(1.0, 1.0, 0, 10, &scenario_bbox());
    }
}
