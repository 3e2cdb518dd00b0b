//! # Building Footprint Extraction Library
//!
//! Turns AI segmentation masks of map tiles into georeferenced building
//! footprints. A run captures the raster of a drawn region, asks a
//! segmentation service for an SVG mask, cleans the mask with morphological
//! closing, traces it into pixel rings, maps those to WGS84, simplifies them,
//! drops anything smaller than the area threshold and accumulates the rest.
//!
//! ## Core Features
//!
//! - **Async Orchestrator**: one state machine drives every stage; state changes are observable
//! - **Trait-based Collaborators**: capture, segmentation, tracing and export are swappable
//! - **Run Guard**: a newer run supersedes older ones, stale results are discarded
//! - **GeoJSON Support**: export the accumulated footprints as GeoJSON or a tar.zst archive
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use footprint::{
//!     BoundingBox, FileTileCapture, HttpSegmentationClient, Orchestrator, SessionState,
//! };
//! use std::time::Duration;
//!
//! # async fn run() -> footprint::Result<()> {
//! let bbox = BoundingBox::parse("-49.36,-49.35,-25.56,-25.57")?;
//! let orchestrator = Orchestrator::builder()
//!     .capture(FileTileCapture::new("tile.png", bbox))
//!     .segmentation(HttpSegmentationClient::new(
//!         "http://localhost:3000/api/segment",
//!         Duration::from_secs(120),
//!     )?)
//!     .build()?;
//!
//! let session = SessionState::new();
//! let outcome = orchestrator.run(&session, bbox).await;
//! println!("{outcome:?}");
//!
//! session.accumulator().await.save_geojson("footprints.geojson")?;
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod geo_transform;
pub mod markup;
pub mod session;
pub mod accumulator;
pub mod pipeline;
pub mod io;
pub mod config;
pub mod clients;
pub mod typed_geojson;

// Re-exports for convenience
pub use error::{FootprintError, Result};
pub use types::{BoundingBox, CapturedTile, Footprint, SegmentationRequest, SegmentationResponse};
pub use traits::*;
pub use algorithms::{ClosingPreprocessor, ImageprocTracer, RingProcessor, ThresholdPreprocessor};
pub use geo_transform::{pixel_to_geo, GeoTransform};
pub use session::{FootprintIdAllocator, RunToken, SessionState};
pub use accumulator::{AccumulationPolicy, FeatureAccumulator};
pub use pipeline::{Orchestrator, OrchestratorBuilder, PipelineState, RunContext, RunOutcome, TracingObserver};
pub use io::{ExportLabel, GeoJsonArchiveExporter};
pub use config::PipelineConfig;
pub use clients::{FileSegmentationService, FileTileCapture, HttpSegmentationClient};
