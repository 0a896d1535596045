use foundation::domain::Domain;
use foundation::geometry::{Feature, FeatureCollection, Geometry};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::symbology::{self, Level};
use crate::visibility::LayerVisibility;

/// Property keys the consolidated templates read.
pub mod props {
    pub const ID: &str = "id";
    pub const DOMAIN: &str = "domain";
    pub const SUBTYPE: &str = "subtype";
    pub const PRIORITY: &str = "priority";
    pub const LEVEL: &str = "level";
    pub const STATUS: &str = "status";
    pub const COLOR: &str = "color";
    pub const SYMBOL: &str = "symbol";
    pub const SIZE_MULTIPLIER: &str = "sizeMultiplier";
}

const SUBTYPE_KEYS: [&str; 3] = ["subtype", "type", "category"];

/// A domain feature after normalization; derived, never authored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedFeature {
    pub id: String,
    pub domain: Domain,
    pub subtype: Option<String>,
    /// 0 is the most important and is drawn last.
    pub priority: u8,
    pub level: Option<Level>,
    pub status: Option<String>,
    pub color: &'static str,
    pub symbol: &'static str,
    pub size_multiplier: f64,
    #[serde(skip)]
    pub geometry: Geometry,
}

impl ConsolidatedFeature {
    pub fn to_feature(&self) -> Feature {
        let mut f = Feature::new(self.geometry.clone())
            .with_id(self.id.clone())
            .with_property(props::ID, self.id.clone())
            .with_property(props::DOMAIN, self.domain.as_str())
            .with_property(props::PRIORITY, self.priority)
            .with_property(props::COLOR, self.color)
            .with_property(props::SYMBOL, self.symbol)
            .with_property(props::SIZE_MULTIPLIER, self.size_multiplier);
        if let Some(subtype) = &self.subtype {
            f = f.with_property(props::SUBTYPE, subtype.clone());
        }
        if let Some(level) = self.level {
            f = f.with_property(props::LEVEL, level.as_str());
        }
        if let Some(status) = &self.status {
            f = f.with_property(props::STATUS, status.clone());
        }
        f
    }
}

/// Merged, draw-ordered output of one consolidation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Consolidated {
    /// Every feature, least important first.
    pub features: Vec<ConsolidatedFeature>,
    pub points: FeatureCollection,
    /// Everything that is not a point: polygons and lines.
    pub polygons: FeatureCollection,
}

impl Consolidated {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct LayerConsolidator;

impl LayerConsolidator {
    pub fn new() -> Self {
        Self
    }

    /// `index` is used for the id of features that carry none.
    pub fn normalize(&self, domain: Domain, index: usize, feature: &Feature) -> ConsolidatedFeature {
        let level = Level::from_properties(&feature.properties);
        let subtype = SUBTYPE_KEYS
            .iter()
            .find_map(|k| feature.property_str(k))
            .map(str::to_string);
        let status = feature.properties.get("status").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        });

        ConsolidatedFeature {
            id: feature
                .id_string()
                .unwrap_or_else(|| format!("{domain}-{index}")),
            domain,
            subtype,
            priority: symbology::feature_priority(domain, level),
            level,
            status,
            color: symbology::feature_color(domain, level),
            symbol: symbology::domain_symbol(domain),
            size_multiplier: symbology::size_multiplier(level),
            geometry: feature.geometry.clone(),
        }
    }

    /// Normalizes and merges per-domain features into one collection.
    ///
    /// Output is sorted by descending priority number (stable), so the most
    /// important features come last and a renderer drawing in array order
    /// puts them on top.
    pub fn consolidate<'a, I>(&self, inputs: I) -> Consolidated
    where
        I: IntoIterator<Item = (Domain, &'a [Feature])>,
    {
        let mut features: Vec<ConsolidatedFeature> = inputs
            .into_iter()
            .flat_map(|(domain, raw)| {
                raw.iter()
                    .enumerate()
                    .map(move |(i, f)| self.normalize(domain, i, f))
            })
            .collect();
        features.sort_by(|a, b| b.priority.cmp(&a.priority));

        let (points, polygons): (Vec<_>, Vec<_>) =
            features.iter().partition(|f| f.geometry.is_point());
        let out = Consolidated {
            points: FeatureCollection::new(points.into_iter().map(|f| f.to_feature()).collect()),
            polygons: FeatureCollection::new(
                polygons.into_iter().map(|f| f.to_feature()).collect(),
            ),
            features,
        };
        debug!(
            total = out.features.len(),
            points = out.points.len(),
            polygons = out.polygons.len(),
            "consolidated features"
        );
        out
    }

    /// Like [`LayerConsolidator::consolidate`], skipping hidden domains.
    pub fn consolidate_visible<'a, I>(&self, inputs: I, visibility: &LayerVisibility) -> Consolidated
    where
        I: IntoIterator<Item = (Domain, &'a [Feature])>,
    {
        self.consolidate(
            inputs
                .into_iter()
                .filter(|(domain, _)| visibility.is_visible(*domain)),
        )
    }
}
