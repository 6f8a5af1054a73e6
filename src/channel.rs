use std::cell::{Ref, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::arena::{ChannelId, Registry, SlotId};
use crate::config::ChannelConfig;
use crate::error::ListenerPanic;
use crate::listener::Listener;
use crate::sink::{FailureContext, FailureSink};

/// Shared core of every typed signal.
///
/// Wraps a [`Registry`] in a `RefCell` so listeners may add, remove or
/// re-dispatch on the same channel while it is dispatching. The borrow is
/// never held across a listener call.
pub struct Channel<F: ?Sized> {
    registry: RefCell<Registry<F>>,
    name: Option<Rc<str>>,
    sink: Rc<dyn FailureSink>,
}

impl<F: ?Sized> Channel<F> {
    /// Create a channel with the given settings.
    pub fn with_config(config: ChannelConfig) -> Self {
        Self {
            registry: RefCell::new(Registry::from_config(&config)),
            name: config.name,
            sink: config.sink,
        }
    }

    /// Identifier of this channel.
    pub fn id(&self) -> ChannelId {
        self.registry.borrow().id()
    }

    /// Configured name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Read-only view of the registry.
    ///
    /// The guard must be dropped before dispatching or mutating the channel.
    pub fn registry(&self) -> Ref<'_, Registry<F>> {
        self.registry.borrow()
    }

    /// Bind `listener`, or update its binding when already bound.
    pub fn add(&self, listener: &Listener<F>, priority: i32, once: bool) -> SlotId {
        self.registry.borrow_mut().add(listener, priority, once)
    }

    /// Handle of `listener`'s binding.
    pub fn get(&self, listener: &Listener<F>) -> Option<SlotId> {
        self.registry.borrow().get(listener)
    }

    /// Handle of the binding at `position` in dispatch order.
    pub fn get_at(&self, position: usize) -> Option<SlotId> {
        self.registry.borrow().get_at(position)
    }

    /// Position of `listener` in dispatch order.
    pub fn index_of(&self, listener: &Listener<F>) -> Option<usize> {
        self.registry.borrow().index_of(listener)
    }

    /// Unbind `listener`.
    pub fn remove(&self, listener: &Listener<F>) -> bool {
        self.registry.borrow_mut().remove(listener)
    }

    /// Unbind the listener at `position` in dispatch order.
    pub fn remove_at(&self, position: usize) -> bool {
        self.registry.borrow_mut().remove_at(position)
    }

    /// Unbind the listener `id` refers to.
    pub fn remove_slot(&self, id: SlotId) -> bool {
        self.registry.borrow_mut().remove_slot(id)
    }

    /// Unbind every listener.
    pub fn remove_all(&self) -> bool {
        self.registry.borrow_mut().remove_all()
    }

    /// Priority of a live binding.
    pub fn priority(&self, id: SlotId) -> Option<i32> {
        self.registry.borrow().priority(id)
    }

    /// Move a live binding to a new priority.
    pub fn set_priority(&self, id: SlotId, priority: i32) -> bool {
        self.registry.borrow_mut().reorder(id, priority)
    }

    /// Once flag of a live binding.
    pub fn is_once(&self, id: SlotId) -> Option<bool> {
        self.registry.borrow().is_once(id)
    }

    /// Change the once flag of a live binding.
    pub fn set_once(&self, id: SlotId, once: bool) -> bool {
        self.registry.borrow_mut().set_once(id, once)
    }

    /// Whether `id` is a live binding of this channel.
    pub fn contains(&self, id: SlotId) -> bool {
        self.registry.borrow().contains(id)
    }

    /// Live handles in dispatch order, as of now.
    pub fn slots(&self) -> Vec<SlotId> {
        self.registry.borrow().slots()
    }

    /// Number of bound listeners.
    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Whether no listener is bound.
    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }

    /// Whether a dispatch is running.
    pub fn is_dispatching(&self) -> bool {
        self.registry.borrow().is_dispatching()
    }

    /// Number of nested dispatches running.
    pub fn dispatch_depth(&self) -> usize {
        self.registry.borrow().dispatch_depth()
    }

    /// Whether the channel is disposed.
    pub fn is_disposed(&self) -> bool {
        self.registry.borrow().is_disposed()
    }

    /// Number of cleared records kept for reuse.
    pub fn pooled_count(&self) -> usize {
        self.registry.borrow().pooled_count()
    }

    /// Unbind every listener and release pooled records.
    pub fn dispose(&self) {
        self.registry.borrow_mut().dispose();
    }

    /// Deliver one notification to every listener bound right now.
    ///
    /// `invoke` performs the typed call on each listener. A panicking listener
    /// is removed and reported to the sink; the rest of the snapshot still
    /// runs.
    pub fn dispatch_with(&self, invoke: impl Fn(&F)) {
        let Some(guard) = DispatchGuard::enter(&self.registry) else {
            return;
        };
        let snapshot = self.registry.borrow().slots();

        for id in snapshot {
            let Some(listener) = self.registry.borrow_mut().take_for_invoke(id) else {
                continue;
            };
            let result = panic::catch_unwind(AssertUnwindSafe(|| invoke(&*listener)));
            if let Err(payload) = result {
                cov_mark::hit!(listener_panic_isolated);
                self.report_panic(id, payload.as_ref(), guard.depth);
            }
        }
    }

    fn report_panic(&self, id: SlotId, payload: &(dyn std::any::Any + Send), depth: usize) {
        let (priority, once) = self
            .registry
            .borrow_mut()
            .retire_failed(id)
            .unwrap_or_default();
        let failure = ListenerPanic::from_payload(payload);
        let context = FailureContext {
            channel: id.channel(),
            channel_name: self.name.clone(),
            slot: id,
            priority,
            once,
            depth,
        };
        self.sink.report(&failure, &context);
    }
}

impl<F: ?Sized> Default for Channel<F> {
    fn default() -> Self {
        Self::with_config(ChannelConfig::default())
    }
}

/// RAII guard pairing `dispatch_start` with `dispatch_stop`.
struct DispatchGuard<'a, F: ?Sized> {
    registry: &'a RefCell<Registry<F>>,
    depth: usize,
}

impl<'a, F: ?Sized> DispatchGuard<'a, F> {
    fn enter(registry: &'a RefCell<Registry<F>>) -> Option<Self> {
        let mut inner = registry.borrow_mut();
        if !inner.dispatch_start() {
            return None;
        }
        let depth = inner.dispatch_depth();
        drop(inner);
        Some(Self { registry, depth })
    }
}

impl<F: ?Sized> Drop for DispatchGuard<'_, F> {
    fn drop(&mut self) {
        self.registry.borrow_mut().dispatch_stop();
    }
}
