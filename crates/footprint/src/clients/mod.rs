//! Concrete collaborators: the HTTP segmentation client and file-backed
//! capture/segmentation used by the CLI and tests.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    error::{FootprintError, Result},
    geo_transform::{geo_to_pixel, pixel_to_geo},
    traits::{SegmentationService, TileCapture},
    types::{BoundingBox, CapturedTile, SegmentationRequest, SegmentationResponse},
};

/// Posts `{imageBase64, width, height}` as JSON and expects `{svg}` or `{error}` back
#[derive(Debug, Clone)]
pub struct HttpSegmentationClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSegmentationClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FootprintError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SegmentationService for HttpSegmentationClient {
    async fn segment(&self, request: &SegmentationRequest) -> Result<SegmentationResponse> {
        tracing::debug!(endpoint = %self.endpoint, width = request.width, height = request.height, "posting segmentation request");

        let transport = |e: reqwest::Error| FootprintError::SegmentationRequest {
            status: e.status().map(|s| s.as_u16()),
            message: format!("transport error: {e}"),
            detail: None,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(FootprintError::SegmentationRequest {
                status: Some(status.as_u16()),
                message: format!("server error ({})", status.as_u16()),
                detail: Some(body),
            });
        }

        serde_json::from_str(&body).map_err(|e| FootprintError::InvalidSegmentationPayload {
            reason: format!("response is not valid JSON: {e}"),
            payload: body,
        })
    }
}

/// Serves a mask stored on disk, for offline runs
#[derive(Debug, Clone)]
pub struct FileSegmentationService {
    pub svg_path: PathBuf,
}

impl FileSegmentationService {
    pub fn new(svg_path: impl Into<PathBuf>) -> Self {
        Self { svg_path: svg_path.into() }
    }
}

#[async_trait]
impl SegmentationService for FileSegmentationService {
    async fn segment(&self, _request: &SegmentationRequest) -> Result<SegmentationResponse> {
        let svg = tokio::fs::read_to_string(&self.svg_path)
            .await
            .map_err(|e| FootprintError::SegmentationRequest {
                status: None,
                message: format!("cannot read mask {}: {e}", self.svg_path.display()),
                detail: None,
            })?;
        Ok(SegmentationResponse::mask(svg))
    }
}

/// Captures tiles out of one georeferenced image on disk.
///
/// The requested region is clipped to the image and snapped to whole pixels;
/// the returned tile carries the exact bounds of the cropped pixels.
#[derive(Debug, Clone)]
pub struct FileTileCapture {
    pub path: PathBuf,
    pub bbox: BoundingBox,
}

impl FileTileCapture {
    pub fn new(path: impl Into<PathBuf>, bbox: BoundingBox) -> Self {
        Self { path: path.into(), bbox }
    }
}

/// Round pixel edges that only miss an integer by float noise
fn snap(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < 1e-6 { nearest } else { value }
}

#[async_trait]
impl TileCapture for FileTileCapture {
    async fn capture(&self, region: &BoundingBox) -> Result<CapturedTile> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            FootprintError::CaptureFailure(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let image = image::load_from_memory(&bytes).map_err(|e| {
            FootprintError::CaptureFailure(format!("cannot decode {}: {e}", self.path.display()))
        })?;

        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(FootprintError::CaptureFailure(format!("{} is empty", self.path.display())));
        }

        let (x0, y0) = geo_to_pixel(region.west, region.north, width, height, &self.bbox);
        let (x1, y1) = geo_to_pixel(region.east, region.south, width, height, &self.bbox);
        let left = snap(x0).floor().clamp(0.0, width as f64) as u32;
        let top = snap(y0).floor().clamp(0.0, height as f64) as u32;
        let right = snap(x1).ceil().clamp(0.0, width as f64) as u32;
        let bottom = snap(y1).ceil().clamp(0.0, height as f64) as u32;

        if right <= left || bottom <= top {
            return Err(FootprintError::CaptureFailure(format!(
                "region {region:?} lies outside the captured image"
            )));
        }

        let (west, north) = pixel_to_geo(left as f64, top as f64, width, height, &self.bbox);
        let (east, south) = pixel_to_geo(right as f64, bottom as f64, width, height, &self.bbox);
        let bbox = BoundingBox::new(west, east, north, south)?;

        tracing::debug!(left, top, right, bottom, "cropped capture region");
        Ok(CapturedTile {
            image: image.crop_imm(left, top, right - left, bottom - top),
            bbox,
        })
    }
}
