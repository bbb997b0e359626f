//! Progress reporting and cancellation support for the batch runner.
//!
//! The runner emits one [`ProgressEvent`] per processed row, in strict input
//! order, through a [`ProgressReporter`]. Cancellation crosses the
//! driver/worker boundary through a shared [`CancellationToken`]; it is the
//! only mutable state the two contexts share.
//!
//! # Example
//!
//! ```rust,ignore
//! use persona_pipeline::{BatchRunner, CancellationToken};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! // In the driver context
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(30));
//!     token_clone.cancel();
//! });
//!
//! let result = BatchRunner::builder()
//!     .provider(provider)
//!     .cancellation_token(token)
//!     .on_progress(|event| {
//!         println!("[{}/{}] {}", event.index + 1, event.total, event.summary);
//!     })
//!     .build()?
//!     .process(rows)?;
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use crate::types::ResultRow;

/// Whether a row produced a prediction or an error marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Ok,
    Error,
}

/// One per-row progress notification.
///
/// Events carry the zero-based row index and the run total so consumers can
/// render `[i+1/N]` counters without tracking state of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Zero-based index of the row this event describes.
    pub index: usize,
    /// Total number of rows in the run.
    pub total: usize,
    /// Whether the row produced a prediction or an error marker.
    pub status: RowStatus,
    /// One-line description of the row's outcome.
    pub summary: String,
}

impl ProgressEvent {
    /// Build the event for a just-recorded result row.
    pub fn for_row(index: usize, total: usize, row: &ResultRow) -> Self {
        Self {
            index,
            total,
            status: if row.is_error() {
                RowStatus::Error
            } else {
                RowStatus::Ok
            },
            summary: row.summary(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == RowStatus::Error
    }
}

/// Trait for receiving per-row progress events during a run.
///
/// Implementations must be `Send + Sync`: the runner executes on a worker
/// thread while the consumer usually lives on the driver thread. The runner
/// calls [`report`](Self::report) once per processed row; implementations
/// should be cheap and non-blocking so they never stall the loop.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
///
/// The convenient path for simple consumers; see
/// `BatchRunnerBuilder::on_progress`.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        (self.callback)(event);
    }
}

/// Reporter that forwards events into an mpsc channel.
///
/// The task/channel shape of the driver/worker handoff: the worker thread
/// sends events, the driver drains the receiver while waiting to join for
/// the final result set. A disconnected receiver is tolerated silently; the
/// driver abandoning the channel must not crash the run.
pub struct ChannelProgressReporter {
    sender: Sender<ProgressEvent>,
}

impl ChannelProgressReporter {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressReporter for ChannelProgressReporter {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}

/// Token for cancelling a running batch.
///
/// Wraps an atomic flag behind an `Arc`, so clones share state and the token
/// can cross thread boundaries freely. The driver calls
/// [`cancel()`](Self::cancel); the worker polls
/// [`is_cancelled()`](Self::is_cancelled) once per loop iteration and between
/// rate-limiter sleep slices. `cancel()` is idempotent.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

// The token and events cross the driver/worker thread boundary.
static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressEvent: Send, Sync);
static_assertions::assert_impl_all!(ChannelProgressReporter: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Safe to call from any thread, any number of
    /// times; repeated calls are no-ops.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel()` has been called on this token or any of its clones.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can serve another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
