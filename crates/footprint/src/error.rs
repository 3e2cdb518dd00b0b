use thiserror::Error;

#[derive(Error, Debug)]
pub enum FootprintError {
    #[error("Failed to capture map tile: {0}")]
    CaptureFailure(String),

    #[error("Segmentation request failed: {message}")]
    SegmentationRequest {
        status: Option<u16>,
        message: String,
        detail: Option<String>,
    },

    #[error("Invalid segmentation payload: {reason}")]
    InvalidSegmentationPayload {
        reason: String,
        /// Raw payload as received, kept for debugging
        payload: String,
    },

    #[error("Failed to rasterize mask: {0}")]
    Rasterization(String),

    #[error("Vectorization failed: {0}")]
    Vectorization(String),

    #[error("Invalid ring geometry: {0}")]
    GeometryConstruction(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FootprintError {
    /// Short name of the pipeline stage the error belongs to
    pub fn stage(&self) -> &'static str {
        match self {
            Self::CaptureFailure(_) => "capture",
            Self::SegmentationRequest { .. } => "segmentation",
            Self::InvalidSegmentationPayload { .. } => "mask_decode",
            Self::Rasterization(_) => "rasterization",
            Self::Vectorization(_) => "vectorization",
            Self::GeometryConstruction(_) => "geometry",
            Self::Export(_) => "export",
            Self::InvalidBoundingBox(_) => "input",
            Self::ImageLoad(_) | Self::Io(_) => "io",
            Self::Serialization(_) | Self::GeoJson(_) => "serialization",
            Self::Config(_) => "config",
        }
    }

    /// Extra diagnostic text worth showing next to the message
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::SegmentationRequest { detail, .. } => detail.as_deref(),
            Self::InvalidSegmentationPayload { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for FootprintError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for FootprintError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FootprintError>;
