// Slot records - one listener binding per record
//
// A record is created fresh or popped from the channel's free list inside
// `add`, rebound to a listener, and later cleared and pushed back. Records move
// through three states:
// - Live: present in the channel's ordered sequence
// - Removed: taken out of the sequence while a dispatch is running; still bound
//   so the running snapshot can read it
// - Pooled: cleared and waiting for reuse
//
// Handles (SlotId) carry the owning channel and a per-binding generation, so a
// handle outliving its binding never aliases the record's next listener.

use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::listener::Listener;

static NEXT_CHANNEL_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique identifier of a channel.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ChannelId(u32);

impl ChannelId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logging.
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Handle to one listener binding on one channel.
///
/// Handles are plain values and never keep a record alive. Once the binding is
/// removed the handle goes stale and every channel operation taking it returns
/// `None` or `false`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SlotId {
    channel: ChannelId,
    index: u32,
    generation: u32,
}

impl SlotId {
    pub(crate) fn new(channel: ChannelId, index: usize, generation: u32) -> Self {
        debug_assert!(
            u32::try_from(index).is_ok(),
            "slot arena index {index} exceeds u32"
        );
        Self {
            channel,
            index: index as u32,
            generation,
        }
    }

    /// The channel this handle was issued by.
    pub fn channel(self) -> ChannelId {
        self.channel
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    Live,
    Removed,
    Pooled,
}

/// Storage for one binding. The listener type is fixed per channel, so no
/// factory is needed to produce records of the right shape.
pub(crate) struct SlotRecord<F: ?Sized> {
    pub(crate) listener: Option<Rc<F>>,
    pub(crate) priority: i32,
    pub(crate) once: bool,
    /// Back-reference to the owning channel; `None` once disposed.
    pub(crate) owner: Option<ChannelId>,
    pub(crate) generation: u32,
    pub(crate) state: SlotState,
    /// Set once the listener ran as a once-listener or panicked. A retired
    /// record is never invoked again, not even by an enclosing snapshot.
    pub(crate) retired: bool,
}

impl<F: ?Sized> SlotRecord<F> {
    pub(crate) fn vacant() -> Self {
        Self {
            listener: None,
            priority: 0,
            once: false,
            owner: None,
            generation: 0,
            state: SlotState::Pooled,
            retired: false,
        }
    }

    pub(crate) fn bind(
        &mut self,
        owner: ChannelId,
        listener: &Listener<F>,
        priority: i32,
        once: bool,
        generation: u32,
    ) {
        self.listener = Some(listener.share());
        self.priority = priority;
        self.once = once;
        self.owner = Some(owner);
        self.generation = generation;
        self.state = SlotState::Live;
        self.retired = false;
    }

    /// Drop the listener and reset every field. The generation is kept so
    /// stale handles keep failing to resolve.
    pub(crate) fn clear(&mut self) {
        self.listener = None;
        self.priority = 0;
        self.once = false;
        self.owner = None;
        self.state = SlotState::Pooled;
        self.retired = false;
    }

    pub(crate) fn is_live(&self) -> bool {
        self.state == SlotState::Live
    }
}
