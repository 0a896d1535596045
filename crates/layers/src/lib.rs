pub mod cluster;
pub mod consolidate;
pub mod host;
pub mod layer;
pub mod mount;
pub mod order;
pub mod symbology;
pub mod templates;
pub mod visibility;

pub use cluster::*;
pub use consolidate::{Consolidated, ConsolidatedFeature, LayerConsolidator};
pub use host::*;
pub use layer::*;
pub use mount::*;
pub use order::*;
pub use symbology::Level;
pub use visibility::*;
