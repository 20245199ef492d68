//! Observer lists for single-threaded change notification.
//!
//! Services and sources own a `Callbacks<T>` and hand out `CallbackId`s so
//! subscribers can disconnect later. Notification clones the subscriber list
//! first, so a callback may register or unregister others while it runs.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handle returned by [`Callbacks::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

type Callback<T> = Rc<dyn Fn(&T)>;

pub struct Callbacks<T> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(CallbackId, Callback<T>)>>,
}

impl<T> Callbacks<T> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Register a callback and return its id.
    pub fn register<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&T) + 'static,
    {
        let id = CallbackId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if the id was unknown.
    pub fn unregister(&self, id: CallbackId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Invoke every registered callback in registration order.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in snapshot {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_in_registration_order() {
        let callbacks = Callbacks::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let a = seen.clone();
        callbacks.register(move |v| a.borrow_mut().push(("a", *v)));
        let b = seen.clone();
        callbacks.register(move |v| b.borrow_mut().push(("b", *v)));

        callbacks.notify(&7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_unregister() {
        let callbacks = Callbacks::<()>::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let id = callbacks.register(move |_| c.set(c.get() + 1));

        assert!(callbacks.unregister(id));
        assert!(!callbacks.unregister(id));
        callbacks.notify(&());
        assert_eq!(count.get(), 0);
        assert!(callbacks.is_empty());
    }

    #[test]
    fn test_callback_may_unregister_itself() {
        let callbacks = Rc::new(Callbacks::<()>::new());
        let id_cell: Rc<Cell<Option<CallbackId>>> = Rc::new(Cell::new(None));

        let cbs = callbacks.clone();
        let id_for_cb = id_cell.clone();
        let id = callbacks.register(move |_| {
            if let Some(id) = id_for_cb.get() {
                cbs.unregister(id);
            }
        });
        id_cell.set(Some(id));

        callbacks.notify(&());
        assert_eq!(callbacks.len(), 0);
    }
}
