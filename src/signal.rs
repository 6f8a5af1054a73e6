use std::fmt;
use std::rc::Rc;

use crate::arena::{ChannelId, SlotId};
use crate::channel::Channel;
use crate::config::ChannelConfig;
use crate::listener::Listener;

/// Generates one typed signal per arity over the shared [`Channel`] core.
///
/// Listeners of an arity-N signal take N arguments by reference, so the
/// argument types do not need to be `Clone`.
macro_rules! typed_signal {
    (
        $(#[$meta:meta])*
        $name:ident<$($T:ident),*>($($arg:ident),*)
    ) => {
        $(#[$meta])*
        pub struct $name<$($T),*> {
            channel: Channel<dyn Fn($(&$T),*)>,
        }

        impl<$($T),*> $name<$($T),*> {
            /// Create a signal with default settings.
            pub fn new() -> Self {
                Self::with_config(ChannelConfig::default())
            }

            /// Create a signal with the given settings.
            pub fn with_config(config: ChannelConfig) -> Self {
                Self {
                    channel: Channel::with_config(config),
                }
            }

            /// Wrap a closure as a listener of this signal's type.
            pub fn listener(
                callback: impl Fn($(&$T),*) + 'static,
            ) -> Listener<dyn Fn($(&$T),*)> {
                let callback: Rc<dyn Fn($(&$T),*)> = Rc::new(callback);
                Listener::from_rc(callback)
            }

            /// Wrap `callback` and bind it with priority 0. The returned
            /// listener is what `remove` and `get` expect.
            pub fn add_fn(
                &self,
                callback: impl Fn($(&$T),*) + 'static,
            ) -> (Listener<dyn Fn($(&$T),*)>, SlotId) {
                let listener = Self::listener(callback);
                let id = self.add(&listener);
                (listener, id)
            }

            /// Bind `listener` with priority 0, invoked on every dispatch.
            pub fn add(&self, listener: &Listener<dyn Fn($(&$T),*)>) -> SlotId {
                self.channel.add(listener, 0, false)
            }

            /// Bind `listener` with `priority`. Lower priorities run first.
            pub fn add_with_priority(
                &self,
                listener: &Listener<dyn Fn($(&$T),*)>,
                priority: i32,
            ) -> SlotId {
                self.channel.add(listener, priority, false)
            }

            /// Bind `listener` with every option spelled out.
            pub fn add_with(
                &self,
                listener: &Listener<dyn Fn($(&$T),*)>,
                priority: i32,
                once: bool,
            ) -> SlotId {
                self.channel.add(listener, priority, once)
            }

            /// Bind `listener` with priority 0 for the next dispatch only.
            pub fn add_once(&self, listener: &Listener<dyn Fn($(&$T),*)>) -> SlotId {
                self.channel.add(listener, 0, true)
            }

            /// Bind `listener` with `priority` for the next dispatch only.
            pub fn add_once_with_priority(
                &self,
                listener: &Listener<dyn Fn($(&$T),*)>,
                priority: i32,
            ) -> SlotId {
                self.channel.add(listener, priority, true)
            }

            /// Handle of `listener`'s binding.
            pub fn get(&self, listener: &Listener<dyn Fn($(&$T),*)>) -> Option<SlotId> {
                self.channel.get(listener)
            }

            /// Handle of the binding at `position` in dispatch order.
            pub fn get_at(&self, position: usize) -> Option<SlotId> {
                self.channel.get_at(position)
            }

            /// Position of `listener` in dispatch order.
            pub fn index_of(&self, listener: &Listener<dyn Fn($(&$T),*)>) -> Option<usize> {
                self.channel.index_of(listener)
            }

            /// Unbind `listener`. Returns whether it was bound.
            pub fn remove(&self, listener: &Listener<dyn Fn($(&$T),*)>) -> bool {
                self.channel.remove(listener)
            }

            /// Unbind the listener at `position` in dispatch order.
            pub fn remove_at(&self, position: usize) -> bool {
                self.channel.remove_at(position)
            }

            /// Unbind the listener `id` refers to.
            pub fn remove_slot(&self, id: SlotId) -> bool {
                self.channel.remove_slot(id)
            }

            /// Unbind every listener. Returns `false` when there was none.
            pub fn remove_all(&self) -> bool {
                self.channel.remove_all()
            }

            /// Priority of a live binding.
            pub fn priority(&self, id: SlotId) -> Option<i32> {
                self.channel.priority(id)
            }

            /// Move a live binding to `priority`, behind its new peers.
            pub fn set_priority(&self, id: SlotId, priority: i32) -> bool {
                self.channel.set_priority(id, priority)
            }

            /// Once flag of a live binding.
            pub fn is_once(&self, id: SlotId) -> Option<bool> {
                self.channel.is_once(id)
            }

            /// Change the once flag of a live binding.
            pub fn set_once(&self, id: SlotId, once: bool) -> bool {
                self.channel.set_once(id, once)
            }

            /// Whether `id` is a live binding of this signal.
            pub fn contains(&self, id: SlotId) -> bool {
                self.channel.contains(id)
            }

            /// Live handles in dispatch order. Not updated by later changes.
            pub fn slots(&self) -> Vec<SlotId> {
                self.channel.slots()
            }

            /// Number of bound listeners.
            pub fn len(&self) -> usize {
                self.channel.len()
            }

            /// Whether no listener is bound.
            pub fn is_empty(&self) -> bool {
                self.channel.is_empty()
            }

            /// Whether a dispatch is running.
            pub fn is_dispatching(&self) -> bool {
                self.channel.is_dispatching()
            }

            /// Number of nested dispatches running.
            pub fn dispatch_depth(&self) -> usize {
                self.channel.dispatch_depth()
            }

            /// Whether `dispose` was called without a later `add`.
            pub fn is_disposed(&self) -> bool {
                self.channel.is_disposed()
            }

            /// Number of cleared records kept for reuse.
            pub fn pooled_count(&self) -> usize {
                self.channel.pooled_count()
            }

            /// Unbind every listener and release pooled records.
            pub fn dispose(&self) {
                self.channel.dispose()
            }

            /// Identifier of this signal's channel.
            pub fn id(&self) -> ChannelId {
                self.channel.id()
            }

            /// Configured name, if any.
            pub fn name(&self) -> Option<&str> {
                self.channel.name()
            }

            /// The untyped channel behind this signal.
            pub fn channel(&self) -> &Channel<dyn Fn($(&$T),*)> {
                &self.channel
            }

            /// Notify every listener bound at the time of the call, in
            /// priority order.
            pub fn dispatch(&self, $($arg: &$T),*) {
                self.channel.dispatch_with(|listener| listener($($arg),*));
            }
        }

        impl<$($T),*> Default for $name<$($T),*> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<$($T),*> fmt::Debug for $name<$($T),*> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", &self.channel.id())
                    .field("name", &self.channel.name())
                    .field("len", &self.channel.len())
                    .field("depth", &self.channel.dispatch_depth())
                    .finish()
            }
        }
    };
}

typed_signal! {
    /// Signal dispatching no arguments.
    ///
    /// ```
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    /// use slotted::Signal0;
    ///
    /// let clicked = Signal0::new();
    /// let count = Rc::new(Cell::new(0));
    /// let c = Rc::clone(&count);
    /// let (listener, _) = clicked.add_fn(move || c.set(c.get() + 1));
    ///
    /// clicked.dispatch();
    /// clicked.remove(&listener);
    /// clicked.dispatch();
    /// assert_eq!(count.get(), 1);
    /// ```
    Signal0<>()
}

typed_signal! {
    /// Signal dispatching one argument.
    Signal1<A>(a)
}

typed_signal! {
    /// Signal dispatching two arguments.
    Signal2<A, B>(a, b)
}

typed_signal! {
    /// Signal dispatching three arguments.
    Signal3<A, B, C>(a, b, c)
}

typed_signal! {
    /// Signal dispatching four arguments.
    Signal4<A, B, C, D>(a, b, c, d)
}
