pub mod bounds;
pub mod device;
pub mod domain;
pub mod geometry;
pub mod time;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use device::*;
pub use domain::*;
pub use geometry::*;
pub use time::*;
