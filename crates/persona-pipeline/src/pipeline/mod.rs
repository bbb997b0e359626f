//! Pipeline module.
//!
//! The batch runner, its builder, and the progress/cancellation types that
//! cross the driver/worker boundary.

mod builder;
pub mod progress;
mod runner;

pub use builder::BatchRunnerBuilder;
pub use progress::{
    CancellationToken, ChannelProgressReporter, ClosureProgressReporter, ProgressEvent,
    ProgressReporter, RowStatus,
};
pub use runner::BatchRunner;
