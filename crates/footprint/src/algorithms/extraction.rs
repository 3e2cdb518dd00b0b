use async_trait::async_trait;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use image::GrayImage;
use imageproc::contours::BorderType;
use crate::{
    error::{FootprintError, Result},
    traits::ContourTracer,
    types::PixelRing,
};

/// Contour tracer built on `imageproc::contours::find_contours`
#[derive(Debug, Clone)]
pub struct ImageprocTracer {
    pub threshold: u8,
    /// Also emit hole borders as separate polygons
    pub include_holes: bool,
}

impl Default for ImageprocTracer {
    fn default() -> Self {
        Self {
            threshold: 128,
            include_holes: false,
        }
    }
}

impl ImageprocTracer {
    /// Trace outer borders of white regions in pixel coordinates
    pub fn trace_rings(&self, image: &GrayImage) -> Vec<PixelRing> {
        let binary_image = imageproc::contrast::threshold(image, self.threshold);
        let contours = imageproc::contours::find_contours::<i32>(&binary_image);

        contours
            .into_iter()
            .filter(|contour| self.include_holes || contour.border_type == BorderType::Outer)
            .map(|contour| {
                contour.points
                    .iter()
                    .map(|p| [p.x as f64, p.y as f64])
                    .collect()
            })
            .collect()
    }

    /// Trace and wrap the rings as a GeoJSON FeatureCollection of polygons
    pub fn trace_to_geojson(&self, image: &GrayImage) -> String {
        let features = self
            .trace_rings(image)
            .into_iter()
            .map(|ring| {
                let coordinates = vec![ring.iter().map(|&[x, y]| vec![x, y]).collect()];
                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::Polygon(coordinates))),
                    id: None,
                    properties: None,
                    foreign_members: None,
                }
            })
            .collect();

        GeoJson::from(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
        .to_string()
    }
}

#[async_trait]
impl ContourTracer for ImageprocTracer {
    async fn trace(&self, encoded_png: &[u8]) -> Result<String> {
        let image = image::load_from_memory(encoded_png)
            .map_err(|e| FootprintError::Vectorization(format!("cannot decode mask raster: {e}")))?
            .to_luma8();
        Ok(self.trace_to_geojson(&image))
    }
}
