#![deny(missing_docs)]

//! Priority-ordered signal/slot dispatch for a single thread.
//!
//! A signal is a dispatch point with any number of listeners. Listeners run in
//! ascending priority, ties in registration order. They may subscribe,
//! unsubscribe or re-dispatch the very signal that is calling them. A panicking
//! listener is removed and reported without disturbing the others.
//!
//! # Quick Start
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use slotted::Signal1;
//!
//! let changed: Signal1<u32> = Signal1::new();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let l = Rc::clone(&log);
//! let audit = Signal1::<u32>::listener(move |v| l.borrow_mut().push(format!("audit {v}")));
//! let l = Rc::clone(&log);
//! let first = Signal1::<u32>::listener(move |v| l.borrow_mut().push(format!("first {v}")));
//!
//! changed.add_with_priority(&audit, 10);
//! changed.add_once_with_priority(&first, -1);
//!
//! changed.dispatch(&1);
//! changed.dispatch(&2);
//!
//! assert_eq!(*log.borrow(), ["first 1", "audit 1", "audit 2"]);
//! ```
//!
//! # Core Types
//!
//! - [`Signal0`] through [`Signal4`] - typed signals for zero to four arguments.
//! - [`Listener`] - a shared callback; equality is identity of the allocation.
//! - [`SlotId`] - handle to one binding, used to change its priority or once flag.
//! - [`Channel`] - the untyped core the signals are generated over.
//! - [`ChannelConfig`] - name, preallocation, pool bound and failure sink.
//!
//! # Re-entrancy
//!
//! Every dispatch iterates a snapshot of the bindings taken when it started.
//! Listeners removed mid-dispatch still run in that snapshot but not in later
//! dispatches. Storage of removed bindings is recycled only once the outermost
//! dispatch of the channel has returned.
//!
//! # Failures
//!
//! Listener panics are caught one at a time and handed to the channel's
//! [`FailureSink`]. The default [`TracingSink`] emits a `tracing` error event.

pub(crate) mod arena;
mod channel;
mod config;
mod error;
mod hash;
mod listener;
mod signal;
mod sink;

pub use arena::{ChannelId, Registry, SlotId};
pub use channel::Channel;
pub use config::ChannelConfig;
pub use error::ListenerPanic;
pub use listener::Listener;
pub use signal::{Signal0, Signal1, Signal2, Signal3, Signal4};
pub use sink::{FailureContext, FailureSink, RecordingSink, TracingSink};

#[cfg(test)]
mod tests;
