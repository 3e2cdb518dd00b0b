use std::marker::PhantomData;
use serde::{Deserialize, Serialize};
use geojson::{GeoJson, Geometry, JsonObject};
use ts_rs::TS;
use schemars::JsonSchema;

/// Properties attached to every exported building footprint
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS, JsonSchema)]
#[ts(export)]
#[schemars(description = "Properties for building footprint features")]
pub struct FootprintProperties {
    #[schemars(description = "Identifier, unique within the session")]
    pub id: String,
    #[schemars(description = "Geodesic area in square metres, two decimals")]
    pub area_m2: String,
}

impl FootprintProperties {
    pub fn area(&self) -> Option<f64> {
        self.area_m2.parse().ok()
    }
}

/// Type alias for footprint GeoJSON
pub type FootprintGeoJson = TypedGeoJson<FootprintProperties>;

/// A typed GeoJSON Feature that is generic over its properties.
#[derive(Serialize, Deserialize, Debug)]
pub struct TypedFeature<P> {
    #[serde(flatten)]
    pub feature: geojson::Feature,
    #[serde(skip)]
    _properties: PhantomData<P>,
}


impl<P> TypedFeature<P>
where
    for<'de> P: Serialize + Deserialize<'de>,
{
    /// Creates a new TypedFeature.
    pub fn new(geometry: Option<Geometry>, properties: P) -> Self {
        let feature = geojson::Feature {
            bbox: None,
            geometry,
            id: None,
            properties: serde_json::to_value(properties).ok().and_then(|v| v.as_object().cloned()),
            foreign_members: None,
        };
        Self {
            feature,
            _properties: PhantomData,
        }
    }

    /// Tries to access the typed properties of the feature.
    pub fn properties(&self) -> Option<P> {
        self.feature.properties.as_ref().and_then(|p| {
            serde_json::from_value(serde_json::Value::Object(p.clone())).ok()
        })
    }
}


#[derive(Serialize, Deserialize, Debug)]
pub struct TypedFeatureCollection<P> {
    pub bbox: Option<Vec<f64>>,
    pub features: Vec<TypedFeature<P>>,
    pub foreign_members: Option<JsonObject>,
}

#[derive(Serialize, Deserialize, Debug)]
pub enum TypedGeoJson<P> {
    Geometry(Geometry),
    Feature(TypedFeature<P>),
    FeatureCollection(TypedFeatureCollection<P>),
}

impl<P> TypedGeoJson<P> {
    /// Get the underlying FeatureCollection if this is a FeatureCollection variant
    pub fn as_feature_collection(&self) -> Option<&TypedFeatureCollection<P>> {
        match self {
            TypedGeoJson::FeatureCollection(fc) => Some(fc),
            _ => None,
        }
    }
}

impl<P> TypedFeatureCollection<P> {
    /// Get the number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl<P> TypedFeatureCollection<P>
where
    for<'de> P: Serialize + Deserialize<'de>,
{
    pub fn into_collection(self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: self.bbox,
            features: self.features.into_iter().map(|f| f.feature).collect(),
            foreign_members: self.foreign_members,
        }
    }

    pub fn to_geojson_string(self) -> String {
        GeoJson::from(self.into_collection()).to_string()
    }
}

impl FootprintGeoJson {
    /// Sum of the `area_m2` properties
    pub fn total_area_m2(&self) -> f64 {
        self.as_feature_collection()
            .map(|fc| {
                fc.features
                    .iter()
                    .filter_map(|f| f.properties().and_then(|p| p.area()))
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Find a footprint by its identifier
    pub fn feature_by_id(&self, id: &str) -> Option<&TypedFeature<FootprintProperties>> {
        self.as_feature_collection()?
            .features
            .iter()
            .find(|f| f.properties().is_some_and(|p| p.id == id))
    }

    /// Get the largest footprint by area
    pub fn largest_feature(&self) -> Option<&TypedFeature<FootprintProperties>> {
        self.as_feature_collection()?.features.iter().max_by(|a, b| {
            let area_a = a.properties().and_then(|p| p.area()).unwrap_or(0.0);
            let area_b = b.properties().and_then(|p| p.area()).unwrap_or(0.0);
            area_a.partial_cmp(&area_b).unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}
