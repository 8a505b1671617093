//! Subscription management for table observers.
//!
//! This module provides subscription IDs, a registration-ordered handler
//! list, and the [`Subscription`] handle returned to callers so they can
//! unsubscribe later. A subscription can also be detached and put back,
//! keeping its place in the dispatch order.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Unique identifier for a subscription within one manager.
pub type SubscriptionId = u64;

/// Something a subscription can be removed from.
pub trait Unsubscribe {
    /// Removes the subscription. Returns true if it was still registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Removes the subscription and hands back its handler.
    fn detach(&self, id: SubscriptionId) -> Option<Box<dyn Any>>;

    /// Registers a detached handler again under its old id.
    fn reattach(&self, id: SubscriptionId, handler: Box<dyn Any>) -> bool;
}

/// A handle on a registered handler.
///
/// Dropping the handle keeps the handler registered; call
/// [`Subscription::unsubscribe`] to remove it. The handle does not keep the
/// manager alive.
pub struct Subscription {
    id: SubscriptionId,
    manager: Weak<dyn Unsubscribe>,
}

impl Subscription {
    /// Creates a handle for `id` registered in `manager`.
    pub fn new(id: SubscriptionId, manager: Weak<dyn Unsubscribe>) -> Self {
        Self { id, manager }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns true while the owning manager is alive.
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.manager.strong_count() > 0
    }

    /// Removes the handler. Returns true if it was still registered.
    pub fn unsubscribe(self) -> bool {
        match self.manager.upgrade() {
            Some(manager) => manager.unsubscribe(self.id),
            None => false,
        }
    }

    /// Removes the handler but keeps it, so that it can be registered again
    /// with [`Detached::reattach`]. Returns `None` if it was not registered.
    pub fn detach(self) -> Option<Detached> {
        let handler = self.manager.upgrade()?.detach(self.id)?;
        Some(Detached {
            id: self.id,
            manager: self.manager,
            handler,
        })
    }
}

/// A handler taken out of its manager. Dropping it drops the handler.
pub struct Detached {
    id: SubscriptionId,
    manager: Weak<dyn Unsubscribe>,
    handler: Box<dyn Any>,
}

impl Detached {
    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Puts the handler back where it was registered. Returns `None` if the
    /// manager is gone.
    pub fn reattach(self) -> Option<Subscription> {
        let manager = self.manager.upgrade()?;
        if !manager.reattach(self.id, self.handler) {
            return None;
        }
        Some(Subscription::new(self.id, self.manager))
    }
}

impl fmt::Debug for Detached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detached").field("id", &self.id).finish()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Manages the handlers of one event, in registration order.
///
/// Interior mutability lets handlers subscribe or unsubscribe while an event
/// is being dispatched: dispatch works on a [`SubscriptionManager::snapshot`].
pub struct SubscriptionManager<T> {
    handlers: RefCell<Vec<(SubscriptionId, T)>>,
    next_id: Cell<SubscriptionId>,
}

impl<T> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }
}

impl<T: Clone + 'static> SubscriptionManager<T> {
    /// Creates a new shared manager.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Registers a handler and returns its handle.
    pub fn subscribe(self: &Rc<Self>, handler: T) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers.borrow_mut().push((id, handler));
        let weak: Weak<dyn Unsubscribe> = Rc::downgrade(self) as Weak<dyn Unsubscribe>;
        Subscription::new(id, weak)
    }

    /// Returns a copy of the registered handlers, in registration order.
    pub fn snapshot(&self) -> Vec<T> {
        self.handlers
            .borrow()
            .iter()
            .map(|(_, h)| h.clone())
            .collect()
    }

    /// Returns the number of registered handlers.
    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Returns true if there are no handlers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }

    /// Returns all subscription IDs.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.handlers.borrow().iter().map(|(id, _)| *id).collect()
    }

    /// Clears all handlers.
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }
}

impl<T: 'static> Unsubscribe for SubscriptionManager<T> {
    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        handlers.len() != before
    }

    fn detach(&self, id: SubscriptionId) -> Option<Box<dyn Any>> {
        let mut handlers = self.handlers.borrow_mut();
        let pos = handlers.iter().position(|(h, _)| *h == id)?;
        let (_, handler) = handlers.remove(pos);
        Some(Box::new(handler))
    }

    fn reattach(&self, id: SubscriptionId, handler: Box<dyn Any>) -> bool {
        let Ok(handler) = handler.downcast::<T>() else {
            return false;
        };
        let mut handlers = self.handlers.borrow_mut();
        if handlers.iter().any(|(h, _)| *h == id) {
            return false;
        }
        // ids grow with registration order
        let pos = handlers
            .iter()
            .position(|(h, _)| *h > id)
            .unwrap_or(handlers.len());
        handlers.insert(pos, (id, *handler));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_assigns_ids() {
        let manager = SubscriptionManager::new();
        let s1 = manager.subscribe("a");
        let s2 = manager.subscribe("b");
        assert_eq!(s1.id(), 1);
        assert_eq!(s2.id(), 2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn test_unsubscribe() {
        let manager = SubscriptionManager::new();
        let s1 = manager.subscribe(1);
        let _s2 = manager.subscribe(2);
        assert!(s1.unsubscribe());
        assert_eq!(manager.snapshot(), vec![2]);
        assert!(!manager.unsubscribe(1));
    }

    #[test]
    fn test_handle_outlives_manager() {
        let manager = SubscriptionManager::new();
        let sub = manager.subscribe(());
        assert!(sub.is_attached());
        drop(manager);
        assert!(!sub.is_attached());
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let manager = SubscriptionManager::new();
        let sub = manager.subscribe(7);
        let snapshot = manager.snapshot();
        sub.unsubscribe();
        assert_eq!(snapshot, vec![7]);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_detach_and_reattach_keep_order() {
        let manager = SubscriptionManager::new();
        let _s1 = manager.subscribe("a");
        let s2 = manager.subscribe("b");
        let _s3 = manager.subscribe("c");
        let detached = s2.detach().unwrap();
        assert_eq!(manager.snapshot(), vec!["a", "c"]);
        let s2 = detached.reattach().unwrap();
        assert_eq!(s2.id(), 2);
        assert_eq!(manager.snapshot(), vec!["a", "b", "c"]);
        assert!(s2.unsubscribe());
        assert_eq!(manager.snapshot(), vec!["a", "c"]);
    }

    #[test]
    fn test_dropped_detached_is_gone() {
        let manager = SubscriptionManager::new();
        let sub = manager.subscribe(1);
        drop(sub.detach());
        assert!(manager.is_empty());
        let sub = manager.subscribe(2);
        let detached = sub.detach().unwrap();
        drop(manager);
        assert!(detached.reattach().is_none());
    }

    #[test]
    fn test_clear() {
        let manager = SubscriptionManager::new();
        manager.subscribe(1);
        manager.subscribe(2);
        manager.clear();
        assert!(manager.is_empty());
        assert!(manager.subscription_ids().is_empty());
    }
}
