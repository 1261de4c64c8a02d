//! Change notification primitives shared by tags, records, tracks and projections.
//!
//! Listeners are plain closures. They run synchronously on the thread that made the change,
//! after every internal lock has been released, so a listener may freely read the emitter or
//! subscribe to it again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::{Error, Result};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ListenerTable<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

/// A list of listeners for events of type `E`.
///
/// Cloning a value that owns a `Notifier` should create a fresh one: listeners follow the
/// instance they subscribed to, never its copies.
pub struct Notifier<E> {
    table: Arc<Mutex<ListenerTable<E>>>,
}

impl<E: 'static> Notifier<E> {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(ListenerTable {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener. It stays registered until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut table = lock(&self.table);
            let id = table.next_id;
            table.next_id += 1;
            table.listeners.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<ListenerTable<E>>> = Arc::downgrade(&self.table);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(table) = weak.upgrade() {
                    lock(&table).listeners.retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = lock(&self.table)
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.table).listeners.len()
    }
}

impl<E: 'static> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &lock(&self.table).listeners.len())
            .finish()
    }
}

/// Guard returned by [`Notifier::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Structural edit of an ordered collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange<T> {
    Inserted { index: usize, items: Vec<T> },
    Removed { index: usize, items: Vec<T> },
    Replaced { index: usize, old: T, new: T },
    Moved { from: usize, to: usize, item: T },
    /// The whole collection changed; `items` is its complete new content.
    Reset { items: Vec<T> },
}

/// An ordered sequence that can be read as a whole and may publish structural changes.
pub trait Sequence<T>: Send + Sync {
    fn snapshot(&self) -> Vec<T>;

    fn len(&self) -> usize {
        self.snapshot().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` for sequences that never change or cannot report their changes.
    fn changes(&self) -> Option<&Notifier<CollectionChange<T>>> {
        None
    }
}

impl<T: Clone + Send + Sync> Sequence<T> for Vec<T> {
    fn snapshot(&self) -> Vec<T> {
        self.clone()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

impl<T, S: Sequence<T> + ?Sized> Sequence<T> for Arc<S> {
    fn snapshot(&self) -> Vec<T> {
        (**self).snapshot()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn changes(&self) -> Option<&Notifier<CollectionChange<T>>> {
        (**self).changes()
    }
}

/// A vector that publishes every structural edit.
///
/// All edits take `&self`, so the collection can be shared behind an `Arc` between the code
/// that feeds it and the projections that follow it.
pub struct ObservableVec<T> {
    items: Mutex<Vec<T>>,
    changes: Notifier<CollectionChange<T>>,
}

impl<T: Clone + Send + Sync + 'static> ObservableVec<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: Mutex::new(items),
            changes: Notifier::new(),
        }
    }

    pub fn get(&self, index: usize) -> Option<T> {
        lock(&self.items).get(index).cloned()
    }

    pub fn position(&self, predicate: impl Fn(&T) -> bool) -> Option<usize> {
        lock(&self.items).iter().position(predicate)
    }

    pub fn push(&self, item: T) {
        let index = {
            let mut items = lock(&self.items);
            items.push(item.clone());
            items.len() - 1
        };
        self.changes.emit(&CollectionChange::Inserted {
            index,
            items: vec![item],
        });
    }

    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.insert_many(index, vec![item])
    }

    pub fn insert_many(&self, index: usize, new_items: Vec<T>) -> Result<()> {
        if new_items.is_empty() {
            return Ok(());
        }
        {
            let mut items = lock(&self.items);
            if index > items.len() {
                return Err(Error::invalid(format!(
                    "insert index {index} out of bounds (len {})",
                    items.len()
                )));
            }
            let tail = items.split_off(index);
            items.extend(new_items.iter().cloned());
            items.extend(tail);
        }
        self.changes.emit(&CollectionChange::Inserted {
            index,
            items: new_items,
        });
        Ok(())
    }

    pub fn remove(&self, index: usize) -> Option<T> {
        let removed = {
            let mut items = lock(&self.items);
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.changes.emit(&CollectionChange::Removed {
            index,
            items: vec![removed.clone()],
        });
        Some(removed)
    }

    /// Remove the first item matching `predicate`.
    pub fn remove_first(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let index = self.position(predicate)?;
        self.remove(index)
    }

    pub fn replace(&self, index: usize, item: T) -> Option<T> {
        let old = {
            let mut items = lock(&self.items);
            let slot = items.get_mut(index)?;
            std::mem::replace(slot, item.clone())
        };
        self.changes.emit(&CollectionChange::Replaced {
            index,
            old: old.clone(),
            new: item,
        });
        Some(old)
    }

    pub fn move_item(&self, from: usize, to: usize) -> Result<()> {
        let item = {
            let mut items = lock(&self.items);
            if from >= items.len() || to >= items.len() {
                return Err(Error::invalid(format!(
                    "move {from} -> {to} out of bounds (len {})",
                    items.len()
                )));
            }
            let item = items.remove(from);
            items.insert(to, item.clone());
            item
        };
        if from != to {
            self.changes
                .emit(&CollectionChange::Moved { from, to, item });
        }
        Ok(())
    }

    /// Replace the whole content and publish a single reset.
    pub fn reset(&self, new_items: Vec<T>) {
        *lock(&self.items) = new_items.clone();
        self.changes
            .emit(&CollectionChange::Reset { items: new_items });
    }

    pub fn clear(&self) {
        self.reset(Vec::new());
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ObservableVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Sequence<T> for ObservableVec<T> {
    fn snapshot(&self) -> Vec<T> {
        lock(&self.items).clone()
    }

    fn len(&self) -> usize {
        lock(&self.items).len()
    }

    fn changes(&self) -> Option<&Notifier<CollectionChange<T>>> {
        Some(&self.changes)
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for ObservableVec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(lock(&self.items).iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_changes(vec: &ObservableVec<i32>) -> (Arc<Mutex<Vec<CollectionChange<i32>>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = vec
            .changes()
            .unwrap()
            .subscribe(move |change| sink.lock().unwrap().push(change.clone()));
        (seen, sub)
    }

    #[test]
    fn edits_publish_matching_changes() {
        let vec = ObservableVec::from_vec(vec![1, 2, 3]);
        let (seen, _sub) = record_changes(&vec);

        vec.push(4);
        vec.remove(0);
        vec.replace(0, 20);
        vec.move_item(0, 2).unwrap();
        vec.reset(vec![7]);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                CollectionChange::Inserted { index: 3, items: vec![4] },
                CollectionChange::Removed { index: 0, items: vec![1] },
                CollectionChange::Replaced { index: 0, old: 2, new: 20 },
                CollectionChange::Moved { from: 0, to: 2, item: 20 },
                CollectionChange::Reset { items: vec![7] },
            ]
        );
        assert_eq!(vec.snapshot(), vec![7]);
    }

    #[test]
    fn dropping_subscription_stops_delivery() {
        let vec = ObservableVec::new();
        let (seen, sub) = record_changes(&vec);
        vec.push(1);
        drop(sub);
        vec.push(2);

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(vec.changes().unwrap().listener_count(), 0);
    }

    #[test]
    fn out_of_bounds_edits_are_rejected() {
        let vec = ObservableVec::from_vec(vec![1]);
        assert!(matches!(vec.insert(5, 2), Err(Error::InvalidArgument(_))));
        assert!(vec.move_item(0, 3).is_err());
        assert_eq!(vec.remove(9), None);
        assert_eq!(vec.replace(9, 0), None);
    }

    #[test]
    fn listener_can_read_the_source_it_observes() {
        let vec = Arc::new(ObservableVec::new());
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let (source, sink) = (Arc::downgrade(&vec), Arc::clone(&lengths));
        let _sub = vec.changes().unwrap().subscribe(move |_| {
            if let Some(source) = source.upgrade() {
                sink.lock().unwrap().push(source.len());
            }
        });

        vec.push("a");
        vec.push("b");
        assert_eq!(*lengths.lock().unwrap(), vec![1, 2]);
    }
}
