use serde::Serialize;

/// Order given to layer ids missing from the table.
pub const DEFAULT_LAYER_ORDER: u8 = 50;

/// Bottom to top. Base fills, coverage radii and the heatmap sit under the
/// point layers; point layers rise with domain importance; selection and the
/// user's own location are always on top.
pub const LAYER_ORDER: &[(&str, u8)] = &[
    ("consolidated-fill", 10),
    ("hazard-zones-fill", 12),
    ("consolidated-line", 15),
    ("traffic-routes", 18),
    ("coverage-radius", 20),
    ("heatmap", 30),
    ("ai-forecast-points", 55),
    ("help-offer-points", 58),
    ("traffic-points", 61),
    ("help-request-points", 64),
    ("hazard-points", 67),
    ("distress-points", 70),
    ("clusters", 72),
    ("cluster-count", 73),
    ("consolidated-circle", 75),
    ("consolidated-symbol", 80),
    ("selection-highlight", 90),
    ("user-location", 100),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderValidation {
    pub valid: bool,
    pub issues: Vec<String>,
}

/// Z-order lookups over [`LAYER_ORDER`].
#[derive(Debug, Copy, Clone)]
pub struct LayerOrderRegistry {
    table: &'static [(&'static str, u8)],
}

impl Default for LayerOrderRegistry {
    fn default() -> Self {
        Self { table: LAYER_ORDER }
    }
}

impl LayerOrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(&self, layer_id: &str) -> u8 {
        self.table
            .iter()
            .find(|(id, _)| *id == layer_id)
            .map_or(DEFAULT_LAYER_ORDER, |(_, order)| *order)
    }

    pub fn is_known(&self, layer_id: &str) -> bool {
        self.table.iter().any(|(id, _)| *id == layer_id)
    }

    /// Stable sort, bottom layer first.
    pub fn sort_by_order<S: AsRef<str> + Clone>(&self, ids: &[S]) -> Vec<S> {
        let mut out = ids.to_vec();
        out.sort_by_key(|id| self.order(id.as_ref()));
        out
    }

    /// First layer in `existing` (bottom to top) that must be drawn above
    /// `layer_id`; `None` means `layer_id` goes on top.
    pub fn before_layer_id<'a, S: AsRef<str>>(
        &self,
        layer_id: &str,
        existing: &'a [S],
    ) -> Option<&'a str> {
        let target = self.order(layer_id);
        existing
            .iter()
            .map(AsRef::<str>::as_ref)
            .find(|id| self.order(id) > target)
    }

    /// Reports adjacent pairs drawn out of order. Never reorders.
    pub fn validate_order<S: AsRef<str>>(&self, ids: &[S]) -> OrderValidation {
        let issues: Vec<String> = ids
            .windows(2)
            .filter_map(|pair| {
                let (lower, upper) = (pair[0].as_ref(), pair[1].as_ref());
                let (lo, up) = (self.order(lower), self.order(upper));
                (lo > up).then(|| {
                    format!("{lower} (order {lo}) is drawn below {upper} (order {up})")
                })
            })
            .collect();
        OrderValidation {
            valid: issues.is_empty(),
            issues,
        }
    }
}
