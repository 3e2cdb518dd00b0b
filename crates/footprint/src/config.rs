use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    accumulator::AccumulationPolicy,
    algorithms::RingProcessor,
    error::{FootprintError, Result},
    io::archive::ExportLabel,
};

/// Mask cleanup settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct MaskConfig {
    /// Intensity above which a rasterized mask pixel counts as structure
    pub threshold: u8,
    /// Closing window size in pixels; even values are bumped to the next odd one
    pub kernel_size: u32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            threshold: 128,
            kernel_size: 5,
        }
    }
}

/// Ring simplification and filtering settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct GeometryConfig {
    #[schemars(range(min = 0.0))]
    pub min_area_m2: f64,
    #[schemars(range(min = 0.0))]
    pub simplify_tolerance: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        let processor = RingProcessor::default();
        Self {
            min_area_m2: processor.min_area_m2,
            simplify_tolerance: processor.simplify_tolerance,
        }
    }
}

impl GeometryConfig {
    pub fn ring_processor(&self) -> RingProcessor {
        RingProcessor::new(self.min_area_m2, self.simplify_tolerance)
    }
}

/// Segmentation service endpoint
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/segment".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub accumulation: AccumulationPolicy,
    pub mask: MaskConfig,
    pub geometry: GeometryConfig,
    pub service: ServiceConfig,
    pub export: ExportLabel,
}

impl PipelineConfig {
    /// Get the JSON schema of the configuration
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PipelineConfig)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.geometry.min_area_m2.is_finite() || self.geometry.min_area_m2 < 0.0 {
            return Err(FootprintError::Config(format!(
                "geometry.min_area_m2 must be a non-negative number, got {}",
                self.geometry.min_area_m2
            )));
        }
        if !self.geometry.simplify_tolerance.is_finite() || self.geometry.simplify_tolerance < 0.0 {
            return Err(FootprintError::Config(format!(
                "geometry.simplify_tolerance must be a non-negative number, got {}",
                self.geometry.simplify_tolerance
            )));
        }
        if self.service.endpoint.trim().is_empty() {
            return Err(FootprintError::Config("service.endpoint is empty".to_string()));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(FootprintError::Config(format!(
                "unsupported config format {}; use .toml or .json",
                path_ref.display()
            ))),
        }
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.mask.kernel_size, 5);
        assert_eq!(config.geometry.min_area_m2, 5.0);
        assert_eq!(config.geometry.simplify_tolerance, 0.000005);
        assert_eq!(config.accumulation, AccumulationPolicy::Append);
        assert_eq!(config.export.folder, "footprints");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
accumulation = "replace"

[geometry]
min_area_m2 = 12.5

[service]
endpoint = "https://example.test/api/segment"
"#,
        )
        .expect("valid config");

        assert_eq!(config.accumulation, AccumulationPolicy::Replace);
        assert_eq!(config.geometry.min_area_m2, 12.5);
        assert_eq!(config.geometry.simplify_tolerance, 0.000005);
        assert_eq!(config.service.timeout_secs, 120);
        assert_eq!(config.mask, MaskConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PipelineConfig::default();
        let text = config.to_toml().expect("serialize");
        assert_eq!(PipelineConfig::from_toml(&text).expect("parse"), config);
    }

    #[test]
    fn test_json_and_validation() {
        let config = PipelineConfig::from_json(r#"{"mask": {"kernel_size": 7}}"#).expect("valid json");
        assert_eq!(config.mask.kernel_size, 7);

        let err = PipelineConfig::from_json(r#"{"geometry": {"min_area_m2": -1.0}}"#).unwrap_err();
        assert!(matches!(err, FootprintError::Config(_)));
    }

    #[test]
    fn test_from_file_detects_format() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pipeline.toml");
        fs::write(&path, "[mask]\nthreshold = 100\n").expect("write");
        assert_eq!(PipelineConfig::from_file(&path).expect("load").mask.threshold, 100);

        let yaml = dir.path().join("pipeline.yaml");
        fs::write(&yaml, "mask: {}").expect("write");
        assert!(PipelineConfig::from_file(&yaml).is_err());
    }

    #[test]
    fn test_schema_lists_sections() {
        let schema = serde_json::to_value(PipelineConfig::schema()).expect("schema json");
        let properties = schema["properties"].as_object().expect("properties");
        for key in ["mask", "geometry", "accumulation", "service", "export"] {
            assert!(properties.contains_key(key), "missing {key}");
        }
    }
}
