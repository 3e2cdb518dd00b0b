use geojson::{FeatureCollection, GeoJson, Geometry, Value};
use crate::{
    accumulator::FeatureAccumulator,
    error::{FootprintError, Result},
    typed_geojson::{FootprintGeoJson, FootprintProperties, TypedFeature, TypedFeatureCollection, TypedGeoJson},
    types::{Footprint, PixelRing},
};

fn polygon_coordinates(footprint: &Footprint) -> Vec<Vec<Vec<f64>>> {
    vec![footprint.exterior_coords().map(|c| vec![c.x, c.y]).collect()]
}

fn properties(footprint: &Footprint) -> FootprintProperties {
    FootprintProperties {
        id: footprint.id().to_string(),
        area_m2: footprint.area_label(),
    }
}

/// Export footprints to typed GeoJSON format
pub fn footprints_to_typed_geojson(footprints: &[Footprint]) -> FootprintGeoJson {
    let features = footprints
        .iter()
        .map(|footprint| {
            let geometry = Geometry::new(Value::Polygon(polygon_coordinates(footprint)));
            let mut typed = TypedFeature::new(Some(geometry), properties(footprint));
            typed.feature.id = Some(geojson::feature::Id::String(footprint.id().to_string()));
            typed
        })
        .collect();

    let mut foreign_members = serde_json::Map::new();
    foreign_members.insert("feature_count".to_string(), serde_json::Value::from(footprints.len()));

    TypedGeoJson::FeatureCollection(TypedFeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    })
}

/// Plain GeoJSON FeatureCollection of the footprints, in order
pub fn footprints_to_feature_collection(footprints: &[Footprint]) -> FeatureCollection {
    match footprints_to_typed_geojson(footprints) {
        TypedGeoJson::FeatureCollection(fc) => fc.into_collection(),
        // footprints_to_typed_geojson always builds a collection
        _ => FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        },
    }
}

/// Read the pixel rings out of a tracer result.
///
/// Polygon exteriors and the exteriors of each MultiPolygon member are
/// returned; other geometry types are ignored.
pub fn rings_from_geojson(text: &str) -> Result<Vec<PixelRing>> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| FootprintError::Vectorization(format!("tracer output is not GeoJSON: {e}")))?;

    let geometries: Vec<Geometry> = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().filter_map(|f| f.geometry).collect(),
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::Geometry(geometry) => vec![geometry],
    };

    let mut rings = Vec::new();
    for geometry in geometries {
        match geometry.value {
            Value::Polygon(polygon) => rings.extend(exterior(polygon)),
            Value::MultiPolygon(polygons) => rings.extend(polygons.into_iter().filter_map(exterior)),
            _ => tracing::debug!("ignoring non-polygon tracer geometry"),
        }
    }

    Ok(rings)
}

fn exterior(polygon: Vec<Vec<Vec<f64>>>) -> Option<PixelRing> {
    let ring = polygon.into_iter().next()?;
    Some(
        ring.into_iter()
            .filter(|position| position.len() >= 2)
            .map(|position| [position[0], position[1]])
            .collect(),
    )
}

impl FeatureAccumulator {
    pub fn to_feature_collection(&self) -> FeatureCollection {
        footprints_to_feature_collection(self.all())
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_feature_collection())?)
    }

    /// Save GeoJSON to file
    pub fn save_geojson(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }
}
