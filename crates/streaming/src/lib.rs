pub mod cache;
pub mod regions;
pub mod request;
pub mod source;
pub mod tile_cache;
pub mod viewport;

pub use cache::*;
pub use regions::{LoadPlan, Region, load_strategy, region_from_point, regions_in_bbox};
pub use request::*;
pub use source::*;
pub use tile_cache::*;
pub use viewport::*;
