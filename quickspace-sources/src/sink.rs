//! Hand-off seam between adapters and the dispatch queue

use crate::error::Result;
use crate::event::NormalizedEvent;

/// Slow pull work executed on the dispatch queue
///
/// Returns the events it produced; an empty vector means nothing to apply.
pub type DeferredPull = Box<dyn FnOnce() -> Vec<NormalizedEvent> + Send>;

/// Destination for normalized events
///
/// Implementations must not block: adapters call these from provider
/// callback threads.
pub trait EventSink: Send + Sync {
    /// Hand a normalized event to the queue
    fn push(&self, event: NormalizedEvent) -> Result<()>;

    /// Schedule pull work to run on the queue
    fn defer(&self, label: &'static str, pull: DeferredPull) -> Result<()>;
}
