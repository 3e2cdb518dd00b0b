use geo_types::{Coord, Polygon};
use image::DynamicImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{FootprintError, Result};

/// Polygon boundary in pixel space as produced by the tracer. Not necessarily closed.
pub type PixelRing = Vec<[f64; 2]>;

/// Geographic rectangle covered by a raster, in degrees.
///
/// Pixel (0, 0) of the raster is the north-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

impl BoundingBox {
    pub fn new(west: f64, east: f64, north: f64, south: f64) -> Result<Self> {
        let bbox = Self { west, east, north, south };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Check `west < east` and `south < north` with finite edges
    pub fn validate(&self) -> Result<()> {
        let edges = [self.west, self.east, self.north, self.south];
        if edges.iter().any(|v| !v.is_finite()) {
            return Err(FootprintError::InvalidBoundingBox(format!(
                "non-finite edge in {self:?}"
            )));
        }
        if self.west >= self.east {
            return Err(FootprintError::InvalidBoundingBox(format!(
                "west ({}) must be less than east ({})",
                self.west, self.east
            )));
        }
        if self.south >= self.north {
            return Err(FootprintError::InvalidBoundingBox(format!(
                "south ({}) must be less than north ({})",
                self.south, self.north
            )));
        }
        Ok(())
    }

    pub fn width_deg(&self) -> f64 {
        self.east - self.west
    }

    pub fn height_deg(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.west + self.east) / 2.0,
            (self.north + self.south) / 2.0,
        )
    }

    /// Parse `west,east,north,south`
    pub fn parse(text: &str) -> Result<Self> {
        let values: Vec<f64> = text
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| FootprintError::InvalidBoundingBox(format!("{text:?}: {e}")))?;

        match values.as_slice() {
            &[west, east, north, south] => Self::new(west, east, north, south),
            _ => Err(FootprintError::InvalidBoundingBox(format!(
                "expected west,east,north,south but got {} values",
                values.len()
            ))),
        }
    }
}

/// Raster produced by the capture collaborator together with the region it shows
#[derive(Debug, Clone)]
pub struct CapturedTile {
    pub image: DynamicImage,
    pub bbox: BoundingBox,
}

impl CapturedTile {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Body sent to the segmentation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationRequest {
    /// PNG bytes, base64 encoded, without a data-URI prefix
    pub image_base64: String,
    pub width: u32,
    pub height: u32,
}

/// Segmentation service reply: either an SVG mask or an error message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, alias = "detail", skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl SegmentationResponse {
    pub fn mask(svg: impl Into<String>) -> Self {
        Self {
            svg: Some(svg.into()),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// A georeferenced, simplified building outline.
///
/// Created once by the ring processor and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    id: String,
    polygon: Polygon<f64>,
    area_m2: f64,
}

impl Footprint {
    pub(crate) fn new(id: String, polygon: Polygon<f64>, area_m2: f64) -> Self {
        Self {
            id,
            polygon,
            area_m2,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Polygon in (lon, lat) with a closed exterior ring
    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Geodesic area in square metres
    pub fn area_m2(&self) -> f64 {
        self.area_m2
    }

    /// Area rounded to two decimals, as exported
    pub fn area_label(&self) -> String {
        format!("{:.2}", self.area_m2)
    }

    pub fn exterior_coords(&self) -> impl Iterator<Item = &Coord<f64>> {
        self.polygon.exterior().0.iter()
    }

    pub fn vertex_count(&self) -> usize {
        self.polygon.exterior().0.len()
    }
}
