use async_trait::async_trait;
use image::GrayImage;

use crate::{
    error::Result,
    io::archive::ExportLabel,
    pipeline::{PipelineState, RunOutcome},
    types::{BoundingBox, CapturedTile, Footprint, SegmentationRequest, SegmentationResponse},
};

/// Trait for mask preprocessing steps (threshold, morphology)
pub trait ImagePreprocessor: Send + Sync {
    /// Produce a new mask from the input
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage>;

    fn name(&self) -> &'static str;
}

/// Renders the raster image of a geographic region
#[async_trait]
pub trait TileCapture: Send + Sync {
    async fn capture(&self, region: &BoundingBox) -> Result<CapturedTile>;
}

/// Remote service turning an encoded tile into an SVG mask
#[async_trait]
pub trait SegmentationService: Send + Sync {
    async fn segment(&self, request: &SegmentationRequest) -> Result<SegmentationResponse>;
}

/// Binary raster to polygon tracing.
///
/// Takes a PNG-encoded binary mask and returns a GeoJSON FeatureCollection in
/// pixel coordinates.
#[async_trait]
pub trait ContourTracer: Send + Sync {
    async fn trace(&self, encoded_png: &[u8]) -> Result<String>;
}

/// Packs the accumulated footprints into a downloadable archive
pub trait ArchiveExporter: Send + Sync {
    fn export(&self, footprints: &[Footprint], label: &ExportLabel) -> Result<Vec<u8>>;

    /// File extension of the produced archive, without the dot
    fn extension(&self) -> &'static str;
}

/// UI feedback sink for a pipeline run
pub trait RunObserver: Send + Sync {
    fn on_state(&self, state: PipelineState);

    fn on_outcome(&self, outcome: &RunOutcome);

    /// Called with the decoded mask before cleanup, for debug overlays
    fn on_mask(&self, _mask: &GrayImage, _bbox: &BoundingBox) {}
}
