use std::collections::BTreeMap;

use foundation::domain::Domain;
use serde::Serialize;

/// Per-domain visibility switches. Domains start visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerVisibility {
    visibility: BTreeMap<Domain, bool>,
}

impl Default for LayerVisibility {
    fn default() -> Self {
        Self {
            visibility: Domain::ALL.iter().map(|d| (*d, true)).collect(),
        }
    }
}

impl LayerVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visibility(&self) -> &BTreeMap<Domain, bool> {
        &self.visibility
    }

    pub fn is_visible(&self, domain: Domain) -> bool {
        self.visibility.get(&domain).copied().unwrap_or(true)
    }

    pub fn set_layer_visibility(&mut self, domain: Domain, visible: bool) {
        self.visibility.insert(domain, visible);
    }

    /// Flips `domain` and returns its new visibility.
    pub fn toggle_layer(&mut self, domain: Domain) -> bool {
        let visible = !self.is_visible(domain);
        self.visibility.insert(domain, visible);
        visible
    }

    pub fn visible_domains(&self) -> impl Iterator<Item = Domain> + '_ {
        Domain::ALL.into_iter().filter(|d| self.is_visible(*d))
    }
}
