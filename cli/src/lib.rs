use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use footprint::{
    ArchiveExporter, BoundingBox, FileSegmentationService, FileTileCapture, FootprintError,
    GeoJsonArchiveExporter, HttpSegmentationClient, Orchestrator, PipelineConfig, RunOutcome,
    SessionState,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Footprint(#[from] FootprintError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Nothing to export: every region came back empty or failed")]
    NothingToExport,
}

/// Parse `west,east,north,south` for clap
pub fn parse_bbox(text: &str) -> Result<BoundingBox, String> {
    BoundingBox::parse(text).map_err(|e| e.to_string())
}

/// Load the pipeline config, falling back to defaults
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    match path {
        Some(path) => Ok(PipelineConfig::from_file(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

/// Inputs of one `run` invocation
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    /// Georeferenced tile image
    pub image: PathBuf,
    /// Bounds of the whole image
    pub bbox: BoundingBox,
    /// Regions to run one after another; empty means the whole image
    pub regions: Vec<BoundingBox>,
    /// Local SVG mask used instead of the segmentation service
    pub svg: Option<PathBuf>,
    pub output: PathBuf,
    pub archive: Option<PathBuf>,
}

impl ExtractionJob {
    fn regions(&self) -> Vec<BoundingBox> {
        if self.regions.is_empty() {
            vec![self.bbox]
        } else {
            self.regions.clone()
        }
    }
}

/// Counts per outcome over all regions of a job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobSummary {
    pub completed: usize,
    pub nothing_detected: usize,
    pub failed: usize,
    pub features: usize,
    pub total_area_m2: f64,
}

pub fn build_orchestrator(config: &PipelineConfig, job: &ExtractionJob) -> Result<Orchestrator, CliError> {
    let builder = Orchestrator::builder()
        .with_config(config)
        .capture(FileTileCapture::new(&job.image, job.bbox));

    let builder = match &job.svg {
        Some(svg) => builder.segmentation(FileSegmentationService::new(svg)),
        None => builder.segmentation(HttpSegmentationClient::new(
            config.service.endpoint.clone(),
            Duration::from_secs(config.service.timeout_secs),
        )?),
    };

    Ok(builder.build()?)
}

/// Run every region of the job, then write the GeoJSON and optional archive
pub async fn run_job(config: &PipelineConfig, job: &ExtractionJob) -> Result<JobSummary, CliError> {
    let orchestrator = build_orchestrator(config, job)?;
    tracing::info!("{}", orchestrator.info());

    let session = SessionState::new();
    let mut summary = JobSummary::default();

    for region in job.regions() {
        match orchestrator.run(&session, region).await {
            RunOutcome::Completed { .. } => summary.completed += 1,
            RunOutcome::NothingDetected => summary.nothing_detected += 1,
            RunOutcome::Failed(_) | RunOutcome::Superseded => summary.failed += 1,
        }
    }

    let accumulator = session.accumulator().await;
    summary.features = accumulator.len();
    summary.total_area_m2 = accumulator.total_area_m2();

    if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    accumulator.save_geojson(&job.output)?;
    tracing::info!("Saved {} footprints to {:?}", summary.features, job.output);

    if let Some(archive) = &job.archive {
        if accumulator.is_empty() {
            return Err(CliError::NothingToExport);
        }
        let exporter = GeoJsonArchiveExporter::default();
        let bytes = exporter.export(accumulator.all(), &config.export)?;
        fs::write(archive, bytes)?;
        tracing::info!("Archive written to {:?}", archive);
    }

    Ok(summary)
}

/// Write the default config as TOML
pub fn write_default_config(path: &Path) -> Result<(), CliError> {
    fs::write(path, PipelineConfig::default().to_toml()?)?;
    Ok(())
}

pub fn schema_json() -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(&PipelineConfig::schema()).map_err(FootprintError::from)?)
}
