use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tar::{Builder, Header};
use zstd::stream::write::Encoder as ZstdEncoder;

use crate::{
    error::{FootprintError, Result},
    io::geojson::footprints_to_typed_geojson,
    traits::ArchiveExporter,
    typed_geojson::TypedGeoJson,
    types::Footprint,
};

/// Folder and layer names used inside the export archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExportLabel {
    pub folder: String,
    pub type_name: String,
}

impl Default for ExportLabel {
    fn default() -> Self {
        Self {
            folder: "footprints".to_string(),
            type_name: "buildings".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    folder: String,
    type_name: String,
    feature_count: usize,
    total_area_m2: f64,
}

/// Writes `<folder>/<type_name>.geojson` plus a manifest into a tar.zst archive
#[derive(Debug, Clone)]
pub struct GeoJsonArchiveExporter {
    pub compression_level: i32,
}

impl Default for GeoJsonArchiveExporter {
    fn default() -> Self {
        Self { compression_level: 3 }
    }
}

fn append_file<W: std::io::Write>(tar: &mut Builder<W>, path: &str, contents: &[u8]) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    tar.append_data(&mut header, path, contents)
        .map_err(|e| FootprintError::Export(format!("failed to add {path} to archive: {e}")))
}

impl ArchiveExporter for GeoJsonArchiveExporter {
    fn export(&self, footprints: &[Footprint], label: &ExportLabel) -> Result<Vec<u8>> {
        if footprints.is_empty() {
            return Err(FootprintError::Export("there are no footprints to export".to_string()));
        }

        let geojson = match footprints_to_typed_geojson(footprints) {
            TypedGeoJson::FeatureCollection(fc) => fc.to_geojson_string(),
            _ => return Err(FootprintError::Export("expected a feature collection".to_string())),
        };
        let manifest = Manifest {
            folder: label.folder.clone(),
            type_name: label.type_name.clone(),
            feature_count: footprints.len(),
            total_area_m2: footprints.iter().map(Footprint::area_m2).sum(),
        };
        let manifest = serde_json::to_vec_pretty(&manifest)?;

        let encoder = ZstdEncoder::new(Vec::new(), self.compression_level)
            .map_err(|e| FootprintError::Export(format!("failed to create zstd encoder: {e}")))?;
        let mut tar = Builder::new(encoder);

        append_file(&mut tar, &format!("{}/{}.geojson", label.folder, label.type_name), geojson.as_bytes())?;
        append_file(&mut tar, &format!("{}/manifest.json", label.folder), &manifest)?;

        let encoder = tar
            .into_inner()
            .map_err(|e| FootprintError::Export(format!("failed to finalize tar: {e}")))?;
        let bytes = encoder
            .finish()
            .map_err(|e| FootprintError::Export(format!("failed to finalize zstd stream: {e}")))?;

        tracing::info!(
            features = footprints.len(),
            bytes = bytes.len(),
            folder = %label.folder,
            "exported footprint archive"
        );
        Ok(bytes)
    }

    fn extension(&self) -> &'static str {
        "tar.zst"
    }
}
