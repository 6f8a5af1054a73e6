//! Reporting of listener failures.
//!
//! A dispatch never lets a listener panic escape. Instead the panic is handed
//! to the channel's [`FailureSink`] together with a [`FailureContext`]
//! describing where it happened.

use std::cell::RefCell;
use std::rc::Rc;

use crate::arena::{ChannelId, SlotId};
use crate::error::ListenerPanic;

/// Where a listener failure happened.
#[derive(Debug, Clone)]
pub struct FailureContext {
    /// Channel that was dispatching.
    pub channel: ChannelId,
    /// Configured channel name, if any.
    pub channel_name: Option<Rc<str>>,
    /// Binding of the failed listener. Already stale when reported.
    pub slot: SlotId,
    /// Priority the listener was bound with.
    pub priority: i32,
    /// Whether the listener was a once-listener.
    pub once: bool,
    /// Nesting depth of the dispatch that invoked the listener.
    pub depth: usize,
}

/// Receiver of listener failures.
///
/// Called synchronously from inside `dispatch`; implementations must not
/// panic and must not block.
pub trait FailureSink {
    /// Record one failure.
    fn report(&self, failure: &ListenerPanic, context: &FailureContext);
}

/// Default sink: one `tracing` error event per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn report(&self, failure: &ListenerPanic, context: &FailureContext) {
        tracing::error!(
            channel = context.channel.get(),
            channel_name = context.channel_name.as_deref(),
            slot = ?context.slot,
            priority = context.priority,
            once = context.once,
            depth = context.depth,
            "{failure}; listener removed"
        );
    }
}

/// Sink that keeps every report in memory.
///
/// Useful in tests and for surfacing failures to a caller after dispatch.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: RefCell<Vec<(ListenerPanic, FailureContext)>>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of failures recorded so far.
    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }

    /// Remove and return every recorded failure.
    pub fn take(&self) -> Vec<(ListenerPanic, FailureContext)> {
        std::mem::take(&mut self.reports.borrow_mut())
    }
}

impl FailureSink for RecordingSink {
    fn report(&self, failure: &ListenerPanic, context: &FailureContext) {
        self.reports
            .borrow_mut()
            .push((failure.clone(), context.clone()));
    }
}
