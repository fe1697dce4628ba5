//! # gardenhose-core
//!
//! Data model and the shared work queue for the stream-to-classifier pipeline.
//!
//! ### Key Submodules:
//! - `item`: posts and the stop sentinel carried on the queue
//! - `batch`: fixed-threshold text accumulation owned by one worker
//! - `queue`: MPMC FIFO with `task_done`/`join` drain tracking

pub mod batch;
pub mod error;
pub mod item;
pub mod queue;

pub mod prelude {
    pub use crate::batch::*;
    pub use crate::error::*;
    pub use crate::item::*;
    pub use crate::queue::*;
}

pub use batch::Batch;
pub use error::QueueError;
pub use item::{Post, QueueItem};
pub use queue::WorkQueue;
