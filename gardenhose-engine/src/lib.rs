//! # gardenhose-engine
//!
//! Consumer side of the pipeline and the driver that ties it together.
//!
//! ```text
//! StreamSource -> QueueListener -> WorkQueue -> WorkerPool (Batch -> Classifier)
//! ```
//!
//! - `worker`: per-thread batch accumulation loop
//! - `pool`: named worker threads with exit notifications
//! - `shutdown`: stop sentinels, bounded exit polling, queue drain
//! - `runtime`: [`Mapper`], the ingestion driver

mod error;
pub mod pool;
pub mod runtime;
pub mod shutdown;
pub mod worker;

pub use error::EngineError;
pub use pool::WorkerPool;
pub use runtime::{Mapper, RunSummary};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use worker::{run_worker, BatchSettings, WorkerReport, WorkerState};

pub mod prelude {
    pub use super::{
        BatchSettings, EngineError, Mapper, RunSummary, ShutdownCoordinator, ShutdownReport,
        WorkerPool, WorkerReport,
    };
}
