use tracing::debug;

use crate::consolidate::Consolidated;
use crate::host::{HostError, MapHost};
use crate::layer::LayerConfig;
use crate::order::LayerOrderRegistry;
use crate::templates::{POINTS_SOURCE, POLYGONS_SOURCE, consolidated_templates};

/// Adds layers to a host so that draw order always follows the order table,
/// whatever order they are mounted in.
#[derive(Debug, Clone, Default)]
pub struct LayerMounter {
    registry: LayerOrderRegistry,
    mounted: Vec<String>,
}

impl LayerMounter {
    pub fn new(registry: LayerOrderRegistry) -> Self {
        Self {
            registry,
            mounted: Vec::new(),
        }
    }

    /// Mounted layer ids, bottom to top.
    pub fn mounted(&self) -> &[String] {
        &self.mounted
    }

    pub fn mount<H: MapHost + ?Sized>(
        &mut self,
        host: &mut H,
        layer: LayerConfig,
    ) -> Result<(), HostError> {
        let id = layer.id.clone();
        let before = self
            .registry
            .before_layer_id(&id, &self.mounted)
            .map(str::to_string);

        host.add_layer(layer)?;
        if let Some(before) = &before {
            host.move_layer(&id, Some(before))?;
        }

        let at = before
            .and_then(|b| self.mounted.iter().position(|m| *m == b))
            .unwrap_or(self.mounted.len());
        debug!(layer = %id, order = self.registry.order(&id), position = at, "mounted layer");
        self.mounted.insert(at, id);
        Ok(())
    }
}

/// The two consolidated sources plus the shared templates drawn from them.
#[derive(Debug, Copy, Clone, Default)]
pub struct ConsolidatedLayers;

impl ConsolidatedLayers {
    pub fn mount<H: MapHost + ?Sized>(
        host: &mut H,
        mounter: &mut LayerMounter,
        data: &Consolidated,
    ) -> Result<(), HostError> {
        Self::update(host, data);
        for template in consolidated_templates() {
            mounter.mount(host, template)?;
        }
        Ok(())
    }

    /// Replaces the data behind already-mounted templates.
    pub fn update<H: MapHost + ?Sized>(host: &mut H, data: &Consolidated) {
        host.add_source(POINTS_SOURCE, data.points.clone());
        host.add_source(POLYGONS_SOURCE, data.polygons.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::{ConsolidatedLayers, LayerMounter};
    use crate::consolidate::LayerConsolidator;
    use crate::host::{MapHost, RecordingHost};
    use crate::layer::{LayerConfig, LayerKind};
    use crate::order::LayerOrderRegistry;
    use crate::templates::POINTS_SOURCE;
    use foundation::domain::Domain;
    use foundation::geometry::{Feature, FeatureCollection, Geometry};
    use pretty_assertions::assert_eq;

    #[test]
    fn mount_order_does_not_affect_draw_order() {
        let mut host = RecordingHost::new();
        host.add_source("s", FeatureCollection::default());
        let mut mounter = LayerMounter::default();

        for id in ["user-location", "distress-points", "heatmap", "traffic-points"] {
            mounter
                .mount(&mut host, LayerConfig::new(id, LayerKind::Circle, "s"))
                .unwrap();
        }

        let expected = vec!["heatmap", "traffic-points", "distress-points", "user-location"];
        assert_eq!(host.layer_ids(), expected);
        assert_eq!(mounter.mounted(), expected.as_slice());
        assert!(LayerOrderRegistry::new().validate_order(mounter.mounted()).valid);
    }

    #[test]
    fn consolidated_layers_mount_four_templates_and_update_in_place() {
        let mut host = RecordingHost::new();
        let mut mounter = LayerMounter::default();
        let consolidator = LayerConsolidator::new();

        let first = vec![Feature::new(Geometry::Point([106.8, -6.2])).with_id("a")];
        let data = consolidator.consolidate([(Domain::Distress, first.as_slice())]);
        ConsolidatedLayers::mount(&mut host, &mut mounter, &data).unwrap();

        assert_eq!(
            host.layer_ids(),
            vec![
                "consolidated-fill",
                "consolidated-line",
                "consolidated-circle",
                "consolidated-symbol"
            ]
        );

        let second = vec![
            Feature::new(Geometry::Point([106.8, -6.2])).with_id("a"),
            Feature::new(Geometry::Point([106.9, -6.3])).with_id("b"),
        ];
        let data = consolidator.consolidate([(Domain::Distress, second.as_slice())]);
        ConsolidatedLayers::update(&mut host, &data);

        assert_eq!(host.layer_ids().len(), 4);
        assert_eq!(host.source(POINTS_SOURCE).map(|s| s.len()), Some(2));
        assert_eq!(host.source_writes(), 4);
    }

    #[test]
    fn host_errors_leave_the_mount_list_untouched() {
        let mut host = RecordingHost::new();
        let mut mounter = LayerMounter::default();
        let missing = LayerConfig::new("heatmap", LayerKind::Heatmap, "nowhere");
        assert!(mounter.mount(&mut host, missing).is_err());
        assert!(mounter.mounted().is_empty());
    }
}
