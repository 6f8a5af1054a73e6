use std::fmt;
use std::rc::Rc;

/// Shared listener callback with identity semantics.
///
/// Two `Listener`s are equal only when they share the same allocation, so a
/// clone of a listener can be used to `remove` or `get` the binding created
/// from the original. Creating a second listener from an identical closure
/// yields a distinct identity.
///
/// `F` is the unsized callback type of the channel, e.g. `dyn Fn(&u32)`.
/// The typed signals provide `listener(..)` constructors that perform the
/// unsizing, or a listener can be built from any `Rc<F>` via [`From`].
pub struct Listener<F: ?Sized> {
    callback: Rc<F>,
}

impl<F: ?Sized> Listener<F> {
    /// Wrap an already shared callback.
    pub fn from_rc(callback: Rc<F>) -> Self {
        Self { callback }
    }

    /// Borrow the callback.
    pub fn callback(&self) -> &F {
        &self.callback
    }

    pub(crate) fn key(&self) -> ListenerKey {
        ListenerKey::of(&self.callback)
    }

    pub(crate) fn share(&self) -> Rc<F> {
        Rc::clone(&self.callback)
    }
}

impl<F: ?Sized> Clone for Listener<F> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<F: ?Sized> PartialEq for Listener<F> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<F: ?Sized> Eq for Listener<F> {}

impl<F: ?Sized> From<Rc<F>> for Listener<F> {
    fn from(callback: Rc<F>) -> Self {
        Self::from_rc(callback)
    }
}

impl<F: ?Sized> fmt::Debug for Listener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:#x})", self.key().0)
    }
}

/// Address of a listener allocation, used as its lookup key.
///
/// The registry holds a strong reference to every bound listener, so an
/// address cannot be recycled while its key is in use.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) struct ListenerKey(usize);

impl ListenerKey {
    pub(crate) fn of<F: ?Sized>(callback: &Rc<F>) -> Self {
        Self(Rc::as_ptr(callback).cast::<()>() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let listener: Listener<dyn Fn()> = Listener::from_rc(Rc::new(|| {}));
        let clone = listener.clone();
        assert_eq!(listener, clone);
        assert_eq!(listener.key(), clone.key());
    }

    #[test]
    fn identical_closures_are_distinct_listeners() {
        let make = || -> Listener<dyn Fn()> { Listener::from_rc(Rc::new(|| {})) };
        let first = make();
        let second = make();
        assert_ne!(first, second);
    }
}
