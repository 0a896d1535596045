use std::collections::BTreeMap;

use foundation::bounds::BoundingBox;
use foundation::geometry::FeatureCollection;
use serde::Serialize;

use crate::layer::LayerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    UnknownSource(String),
    DuplicateLayer(String),
    UnknownLayer(String),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::UnknownSource(id) => write!(f, "layer references unknown source {id:?}"),
            HostError::DuplicateLayer(id) => write!(f, "layer {id:?} already exists"),
            HostError::UnknownLayer(id) => write!(f, "unknown layer {id:?}"),
        }
    }
}

impl std::error::Error for HostError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapEvent {
    Load,
    MoveEnd,
    ZoomEnd,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ViewportEvent {
    pub bbox: BoundingBox,
    pub zoom: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(pub u64);

pub type EventHandler = Box<dyn FnMut(&ViewportEvent)>;

/// What the pipeline needs from a map renderer.
///
/// Draw order is bottom to top: a layer added without an anchor goes on top.
pub trait MapHost {
    /// Adds the source, or replaces its data if it already exists.
    fn add_source(&mut self, id: &str, data: FeatureCollection);

    fn add_layer(&mut self, layer: LayerConfig) -> Result<(), HostError>;

    /// Moves `id` directly below `before_id`, or to the top when `None`.
    fn move_layer(&mut self, id: &str, before_id: Option<&str>) -> Result<(), HostError>;

    fn on(&mut self, event: MapEvent, handler: EventHandler) -> HandlerId;

    /// Returns `false` if the handler was not registered.
    fn off(&mut self, event: MapEvent, handler: HandlerId) -> bool;
}

/// In-memory host that records what it is asked to draw.
#[derive(Default)]
pub struct RecordingHost {
    sources: BTreeMap<String, FeatureCollection>,
    source_writes: usize,
    layers: Vec<LayerConfig>,
    handlers: Vec<(HandlerId, MapEvent, EventHandler)>,
    next_handler: u64,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, id: &str) -> Option<&FeatureCollection> {
        self.sources.get(id)
    }

    /// Number of `add_source` calls, including replacements.
    pub fn source_writes(&self) -> usize {
        self.source_writes
    }

    pub fn layer(&self, id: &str) -> Option<&LayerConfig> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Layer ids, bottom to top.
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Calls every handler registered for `event`; returns how many ran.
    pub fn emit(&mut self, event: MapEvent, viewport: &ViewportEvent) -> usize {
        let mut ran = 0;
        for (_, registered, handler) in &mut self.handlers {
            if *registered == event {
                handler(viewport);
                ran += 1;
            }
        }
        ran
    }

    fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }
}

impl MapHost for RecordingHost {
    fn add_source(&mut self, id: &str, data: FeatureCollection) {
        self.sources.insert(id.to_string(), data);
        self.source_writes += 1;
    }

    fn add_layer(&mut self, layer: LayerConfig) -> Result<(), HostError> {
        if self.layer_index(&layer.id).is_some() {
            return Err(HostError::DuplicateLayer(layer.id));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(HostError::UnknownSource(layer.source));
        }
        self.layers.push(layer);
        Ok(())
    }

    fn move_layer(&mut self, id: &str, before_id: Option<&str>) -> Result<(), HostError> {
        let from = self
            .layer_index(id)
            .ok_or_else(|| HostError::UnknownLayer(id.to_string()))?;
        if let Some(before) = before_id
            && self.layer_index(before).is_none()
        {
            return Err(HostError::UnknownLayer(before.to_string()));
        }

        let layer = self.layers.remove(from);
        let to = match before_id {
            Some(before) => self.layer_index(before).unwrap_or(self.layers.len()),
            None => self.layers.len(),
        };
        self.layers.insert(to, layer);
        Ok(())
    }

    fn on(&mut self, event: MapEvent, handler: EventHandler) -> HandlerId {
        self.next_handler += 1;
        let id = HandlerId(self.next_handler);
        self.handlers.push((id, event, handler));
        id
    }

    fn off(&mut self, event: MapEvent, handler: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers
            .retain(|(id, registered, _)| !(*id == handler && *registered == event));
        before != self.handlers.len()
    }
}
