pub mod batch;
pub mod frame;
pub mod host;
pub mod scheduler;
pub mod task_queue;

pub use batch::*;
pub use frame::*;
pub use host::*;
pub use scheduler::*;
pub use task_queue::*;
