use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr, VariantNames};

use crate::types::Footprint;

/// What a successful run does with footprints from earlier runs
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccumulationPolicy {
    /// Keep everything from earlier runs and append
    #[default]
    Append,
    /// Drop earlier footprints when a run produces new ones
    Replace,
}

/// Ordered, append-only store of accepted footprints
#[derive(Debug, Default)]
pub struct FeatureAccumulator {
    features: Vec<Footprint>,
    ids: HashSet<String>,
}

impl FeatureAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append footprints in order, returning how many were added.
    ///
    /// A footprint whose id is already stored is skipped.
    pub fn accept(&mut self, footprints: Vec<Footprint>) -> usize {
        let mut added = 0;
        for footprint in footprints {
            if !self.ids.insert(footprint.id().to_string()) {
                tracing::warn!(id = footprint.id(), "skipping footprint with duplicate id");
                continue;
            }
            self.features.push(footprint);
            added += 1;
        }
        added
    }

    pub fn clear(&mut self) {
        self.features.clear();
        self.ids.clear();
    }

    pub fn all(&self) -> &[Footprint] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn total_area_m2(&self) -> f64 {
        self.features.iter().map(Footprint::area_m2).sum()
    }
}
