// Ordered registry - the per-channel record arena
//
// Storage:
// - slots: every record the channel owns (live, removed-pending, pooled)
// - order: arena indices of live records, ascending priority, stable within a
//   priority band
// - lookup: listener address -> arena index, for live records only
// - pool: arena indices of cleared records available to `add`
// - removed: records taken out of `order` while a dispatch was running
//
// A record removed while `depth > 0` stays bound until the outermost dispatch
// finishes, because an enclosing snapshot may still read it.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexSet;
use slab::Slab;

use super::slot::{ChannelId, SlotId, SlotRecord, SlotState};
use crate::config::ChannelConfig;
use crate::hash::FastHashBuilder;
use crate::listener::{Listener, ListenerKey};

/// Untyped listener registry for one channel.
///
/// Holds the live ordered records, the free list of disposed records, the set
/// of records awaiting deferred disposal and the dispatch nesting depth. The
/// typed signals wrap this in a `RefCell` so listeners can mutate it while a
/// dispatch is running.
pub struct Registry<F: ?Sized> {
    id: ChannelId,
    slots: Slab<SlotRecord<F>>,
    order: Vec<usize>,
    lookup: HashMap<ListenerKey, usize, FastHashBuilder>,
    pool: Vec<usize>,
    removed: IndexSet<usize, FastHashBuilder>,
    depth: usize,
    disposed: bool,
    next_generation: u32,
    max_pooled: Option<usize>,
}

impl<F: ?Sized> Registry<F> {
    /// Create an empty registry with default settings.
    pub fn new() -> Self {
        Self::from_config(&ChannelConfig::default())
    }

    pub(crate) fn from_config(config: &ChannelConfig) -> Self {
        Self {
            id: ChannelId::next(),
            slots: Slab::with_capacity(config.reserve),
            order: Vec::with_capacity(config.reserve),
            lookup: HashMap::with_capacity_and_hasher(config.reserve, FastHashBuilder),
            pool: Vec::new(),
            removed: IndexSet::default(),
            depth: 0,
            disposed: false,
            next_generation: 0,
            max_pooled: config.max_pooled,
        }
    }

    /// Identifier stamped into every handle this registry issues.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Bind `listener` with the given priority and once flag.
    ///
    /// An already bound listener keeps its record: the fields are updated and
    /// the record is re-sorted behind its equal-priority peers.
    pub fn add(&mut self, listener: &Listener<F>, priority: i32, once: bool) -> SlotId {
        self.disposed = false;

        if let Some(&index) = self.lookup.get(&listener.key()) {
            let record = &mut self.slots[index];
            record.priority = priority;
            record.once = once;
            self.reposition(index);
            return self.handle(index);
        }

        let index = match self.pool.pop() {
            Some(index) => {
                cov_mark::hit!(slot_reused_from_pool);
                index
            }
            None => self.slots.insert(SlotRecord::vacant()),
        };

        // Generations wrap after 2^32 bindings on one channel; a handle kept
        // across that many bindings could alias a reused record.
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        self.slots[index].bind(self.id, listener, priority, once, generation);
        self.lookup.insert(listener.key(), index);
        self.insert_ordered(index);
        self.handle(index)
    }

    /// Handle of the live record bound to `listener`.
    pub fn get(&self, listener: &Listener<F>) -> Option<SlotId> {
        self.lookup
            .get(&listener.key())
            .map(|&index| self.handle(index))
    }

    /// Handle of the live record at `position` in dispatch order.
    pub fn get_at(&self, position: usize) -> Option<SlotId> {
        self.order.get(position).map(|&index| self.handle(index))
    }

    /// Position of `listener` in dispatch order, scanning from the back.
    pub fn index_of(&self, listener: &Listener<F>) -> Option<usize> {
        let key = listener.key();
        self.order.iter().rposition(|&index| {
            self.slots[index]
                .listener
                .as_ref()
                .is_some_and(|bound| ListenerKey::of(bound) == key)
        })
    }

    /// Unbind `listener`. Returns whether it was bound.
    pub fn remove(&mut self, listener: &Listener<F>) -> bool {
        match self.index_of(listener) {
            Some(position) => self.remove_at(position),
            None => false,
        }
    }

    /// Unbind the record at `position` in dispatch order.
    pub fn remove_at(&mut self, position: usize) -> bool {
        if position >= self.order.len() {
            return false;
        }
        let index = self.order.remove(position);
        let record = &mut self.slots[index];
        if let Some(listener) = record.listener.as_ref() {
            self.lookup.remove(&ListenerKey::of(listener));
        }
        record.state = SlotState::Removed;

        if self.depth > 0 {
            cov_mark::hit!(slot_disposal_deferred);
            self.removed.insert(index);
        } else {
            self.dispose_slot(index);
        }
        true
    }

    /// Unbind the record `id` refers to, if it is still live.
    pub fn remove_slot(&mut self, id: SlotId) -> bool {
        let Some(index) = self.resolve_live(id) else {
            return false;
        };
        match self.order.iter().position(|&i| i == index) {
            Some(position) => self.remove_at(position),
            None => {
                debug_assert!(false, "live record {id:?} missing from order");
                false
            }
        }
    }

    /// Unbind every listener, last first. Returns `false` when already empty.
    pub fn remove_all(&mut self) -> bool {
        if self.order.is_empty() {
            return false;
        }
        while let Some(last) = self.order.len().checked_sub(1) {
            self.remove_at(last);
        }
        true
    }

    // =========================================================================
    // Record self-service
    // =========================================================================

    /// Priority of a live record.
    pub fn priority(&self, id: SlotId) -> Option<i32> {
        self.resolve_live(id).map(|index| self.slots[index].priority)
    }

    /// Change the priority of a live record and restore ordering.
    ///
    /// Setting the current priority again leaves the record where it is.
    pub fn reorder(&mut self, id: SlotId, priority: i32) -> bool {
        let Some(index) = self.resolve_live(id) else {
            return false;
        };
        if self.slots[index].priority == priority {
            return true;
        }
        self.slots[index].priority = priority;
        self.reposition(index);
        true
    }

    /// Once flag of a live record.
    pub fn is_once(&self, id: SlotId) -> Option<bool> {
        self.resolve_live(id).map(|index| self.slots[index].once)
    }

    /// Change the once flag of a live record.
    pub fn set_once(&mut self, id: SlotId, once: bool) -> bool {
        match self.resolve_live(id) {
            Some(index) => {
                self.slots[index].once = once;
                true
            }
            None => false,
        }
    }

    /// Whether `id` refers to a live record of this registry.
    pub fn contains(&self, id: SlotId) -> bool {
        self.resolve_live(id).is_some()
    }

    // =========================================================================
    // Dispatch depth and deferred disposal
    // =========================================================================

    /// Enter a dispatch. Returns `false`, changing nothing, when no listener is
    /// bound; the caller must not dispatch in that case.
    pub fn dispatch_start(&mut self) -> bool {
        if self.order.is_empty() {
            return false;
        }
        self.depth += 1;
        true
    }

    /// Leave a dispatch. When the outermost dispatch ends, every record
    /// removed in the meantime is disposed and `true` is returned.
    pub fn dispatch_stop(&mut self) -> bool {
        if self.depth == 0 {
            return false;
        }
        self.depth -= 1;
        if self.depth > 0 {
            return false;
        }
        if !self.removed.is_empty() {
            cov_mark::hit!(deferred_slots_flushed);
            tracing::trace!(
                channel = self.id.get(),
                count = self.removed.len(),
                "disposing slots removed during dispatch"
            );
        }
        while let Some(index) = self.removed.pop() {
            self.dispose_slot(index);
        }
        true
    }

    /// Copy of the live handles in dispatch order. Later mutation of the
    /// registry is not reflected in the returned list.
    pub fn slots(&self) -> Vec<SlotId> {
        self.order.iter().map(|&index| self.handle(index)).collect()
    }

    /// Read the listener of a snapshot entry for invocation.
    ///
    /// Records removed after the snapshot was taken are still returned, so
    /// every pass sees its whole snapshot. Retired records are the exception:
    /// a once-record that already ran or a listener that already panicked
    /// yields `None`, whichever pass retired it. Once-records are retired and
    /// removed here, before the call.
    pub(crate) fn take_for_invoke(&mut self, id: SlotId) -> Option<Rc<F>> {
        let index = self.resolve_bound(id)?;
        let record = &mut self.slots[index];
        if record.retired {
            cov_mark::hit!(retired_slot_skipped);
            return None;
        }
        let listener = record.listener.clone()?;
        if record.once {
            record.retired = true;
            self.remove_slot(id);
        }
        Some(listener)
    }

    /// Retire the record of a failed listener and unbind it if still live.
    /// Returns its priority and once flag.
    pub(crate) fn retire_failed(&mut self, id: SlotId) -> Option<(i32, bool)> {
        let index = self.resolve_bound(id)?;
        let record = &mut self.slots[index];
        record.retired = true;
        let fields = (record.priority, record.once);
        self.remove_slot(id);
        Some(fields)
    }

    /// Priority and once flag of a record that is still bound, even if it was
    /// already removed from the ordered sequence.
    #[cfg(test)]
    pub(crate) fn bound_fields(&self, id: SlotId) -> Option<(i32, bool)> {
        self.resolve_bound(id).map(|index| {
            let record = &self.slots[index];
            (record.priority, record.once)
        })
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no listener is bound.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of cleared records waiting for reuse.
    pub fn pooled_count(&self) -> usize {
        self.pool.len()
    }

    /// Number of removed records waiting for the outermost dispatch to end.
    pub fn pending_disposal_count(&self) -> usize {
        self.removed.len()
    }

    /// Whether at least one dispatch is running.
    pub fn is_dispatching(&self) -> bool {
        self.depth > 0
    }

    /// Number of nested dispatches currently running.
    pub fn dispatch_depth(&self) -> usize {
        self.depth
    }

    /// Whether `dispose` was called without a later `add`.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Unbind every listener and discard the free list. Records released from
    /// now on are freed instead of pooled, until the next `add`.
    pub fn dispose(&mut self) {
        self.disposed = true;
        for index in self.pool.drain(..) {
            self.slots.remove(index);
        }
        tracing::debug!(
            channel = self.id.get(),
            live = self.order.len(),
            "disposing channel"
        );
        self.remove_all();
        self.slots.shrink_to_fit();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn handle(&self, index: usize) -> SlotId {
        SlotId::new(self.id, index, self.slots[index].generation)
    }

    /// Arena index for a handle whose record is still bound, live or removed.
    fn resolve_bound(&self, id: SlotId) -> Option<usize> {
        if id.channel() != self.id {
            return None;
        }
        match self.slots.get(id.index()) {
            Some(record)
                if record.generation == id.generation() && record.state != SlotState::Pooled =>
            {
                Some(id.index())
            }
            _ => {
                cov_mark::hit!(stale_slot_handle);
                None
            }
        }
    }

    fn resolve_live(&self, id: SlotId) -> Option<usize> {
        self.resolve_bound(id)
            .filter(|&index| self.slots[index].is_live())
    }

    /// Insert after the last record whose priority is <= the new one, or at
    /// the front when there is none.
    fn insert_ordered(&mut self, index: usize) {
        let priority = self.slots[index].priority;
        let position = self
            .order
            .iter()
            .rposition(|&i| self.slots[i].priority <= priority)
            .map_or(0, |p| p + 1);
        self.order.insert(position, index);
    }

    fn reposition(&mut self, index: usize) {
        if let Some(position) = self.order.iter().position(|&i| i == index) {
            self.order.remove(position);
        }
        self.insert_ordered(index);
    }

    fn dispose_slot(&mut self, index: usize) {
        self.slots[index].clear();
        let has_room = self.max_pooled.is_none_or(|max| self.pool.len() < max);
        if !self.disposed && has_room {
            self.pool.push(index);
        } else {
            self.slots.remove(index);
        }
    }
}

impl<F: ?Sized> Default for Registry<F> {
    fn default() -> Self {
        Self::new()
    }
}
