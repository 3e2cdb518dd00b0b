pub mod archive;
pub mod geojson;

pub use archive::{ExportLabel, GeoJsonArchiveExporter};
pub use geojson::{footprints_to_feature_collection, footprints_to_typed_geojson, rings_from_geojson};
