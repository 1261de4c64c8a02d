//! Live read-only views derived from observable sequences.
//!
//! * [`Projection`] follows one source.
//! * [`MultiProjection`] follows a list of sources, flattened in list order.
//! * [`ProjectedSlice`] is a lazy, non-live view over a slice.
//!
//! Both live projections are themselves [`Sequence`]s, so they can be chained.
//! `project` and `back_map` run while the projection's state is locked: they must not read
//! the projection they belong to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::observable::{lock, CollectionChange, Notifier, Sequence, Subscription};

type ProjectFn<T, P> = Arc<dyn Fn(&T) -> P + Send + Sync>;
type BackMapFn<T, P> = Arc<dyn Fn(&P, &T) -> bool + Send + Sync>;
type WatchFn<P> = Arc<dyn Fn(&P, Box<dyn Fn() + Send + Sync>) -> Subscription + Send + Sync>;

/// Published by a projection when one of its items reports an internal change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentChanged;

/// Items that can report changes to their own content.
pub trait NotifyChanged {
    fn subscribe_changed(&self, on_change: Box<dyn Fn() + Send + Sync>) -> Subscription;
}

impl<N: NotifyChanged + ?Sized> NotifyChanged for Arc<N> {
    fn subscribe_changed(&self, on_change: Box<dyn Fn() + Send + Sync>) -> Subscription {
        (**self).subscribe_changed(on_change)
    }
}

/// Configures how source items map to derived items.
pub struct ProjectionBuilder<T, P> {
    project: ProjectFn<T, P>,
    back_map: BackMapFn<T, P>,
    watch: Option<WatchFn<P>>,
}

impl<T, P> ProjectionBuilder<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Use re-projection to find the derived item of a removed source item. Only correct
    /// when `project` never maps two different source items to equal derived items.
    pub fn new(project: impl Fn(&T) -> P + Send + Sync + 'static) -> Self
    where
        P: PartialEq,
    {
        let project: ProjectFn<T, P> = Arc::new(project);
        let reproject = Arc::clone(&project);
        Self {
            project,
            back_map: Arc::new(move |derived: &P, source: &T| *derived == reproject(source)),
            watch: None,
        }
    }

    /// `back_map(derived, source)` answers whether `derived` was produced from `source`.
    pub fn with_back_map(
        project: impl Fn(&T) -> P + Send + Sync + 'static,
        back_map: impl Fn(&P, &T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            project: Arc::new(project),
            back_map: Arc::new(back_map),
            watch: None,
        }
    }

    /// Re-publish item-level changes of derived items as [`ContentChanged`].
    pub fn forward_item_changes(mut self) -> Self
    where
        P: NotifyChanged,
    {
        self.watch = Some(Arc::new(
            |item: &P, on_change: Box<dyn Fn() + Send + Sync>| item.subscribe_changed(on_change),
        ));
        self
    }

    pub fn build<S>(self, source: &S) -> Result<Projection<T, P>>
    where
        S: Sequence<T> + ?Sized,
    {
        Projection::from_builder(self, source)
    }

    pub fn build_multi<O, S>(self, sources: &O) -> Result<MultiProjection<T, P>>
    where
        O: Sequence<Arc<S>> + ?Sized,
        S: Sequence<T> + 'static,
    {
        MultiProjection::from_builder(self, sources)
    }
}

struct Entry<P> {
    item: P,
    _watch: Option<Subscription>,
}

/// Mapping rules plus the notifiers shared by both live projections.
struct Rules<T, P> {
    project: ProjectFn<T, P>,
    back_map: BackMapFn<T, P>,
    watch: Option<WatchFn<P>>,
    changes: Notifier<CollectionChange<P>>,
    content_changed: Arc<Notifier<ContentChanged>>,
}

impl<T, P> Rules<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn from_builder(builder: ProjectionBuilder<T, P>) -> Self {
        Self {
            project: builder.project,
            back_map: builder.back_map,
            watch: builder.watch,
            changes: Notifier::new(),
            content_changed: Arc::new(Notifier::new()),
        }
    }

    fn entry(&self, source: &T) -> Entry<P> {
        let item = (self.project)(source);
        let watch = self.watch.as_ref().map(|watch| {
            let content_changed = Arc::downgrade(&self.content_changed);
            watch(
                &item,
                Box::new(move || {
                    if let Some(notifier) = content_changed.upgrade() {
                        notifier.emit(&ContentChanged);
                    }
                }),
            )
        });
        Entry {
            item,
            _watch: watch,
        }
    }

    /// Find the derived entry produced from `source`, preferring `hint` when it matches.
    fn locate(&self, entries: &[Entry<P>], source: &T, hint: usize) -> Option<usize> {
        if entries
            .get(hint)
            .is_some_and(|entry| (self.back_map)(&entry.item, source))
        {
            return Some(hint);
        }
        entries
            .iter()
            .position(|entry| (self.back_map)(&entry.item, source))
    }

    /// Apply a source change to `entries`, returning the derived changes relative to
    /// `entries`' own indices.
    fn apply(
        &self,
        entries: &mut Vec<Entry<P>>,
        change: &CollectionChange<T>,
    ) -> Vec<CollectionChange<P>> {
        let mut out = Vec::new();
        match change {
            CollectionChange::Inserted { index, items } => {
                let at = (*index).min(entries.len());
                let new_entries: Vec<Entry<P>> = items.iter().map(|item| self.entry(item)).collect();
                let derived = new_entries.iter().map(|e| e.item.clone()).collect();
                let tail = entries.split_off(at);
                entries.extend(new_entries);
                entries.extend(tail);
                out.push(CollectionChange::Inserted {
                    index: at,
                    items: derived,
                });
            }
            CollectionChange::Removed { index, items } => {
                for item in items {
                    match self.locate(entries, item, *index) {
                        Some(found) => {
                            let entry = entries.remove(found);
                            out.push(CollectionChange::Removed {
                                index: found,
                                items: vec![entry.item],
                            });
                        }
                        None => debug!("Projection has no derived item for removed source item"),
                    }
                }
            }
            CollectionChange::Replaced { index, old, new } => {
                let entry = self.entry(new);
                match self.locate(entries, old, *index) {
                    Some(found) => {
                        let derived = entry.item.clone();
                        let previous = std::mem::replace(&mut entries[found], entry);
                        out.push(CollectionChange::Replaced {
                            index: found,
                            old: previous.item,
                            new: derived,
                        });
                    }
                    None => {
                        let at = (*index).min(entries.len());
                        let derived = entry.item.clone();
                        entries.insert(at, entry);
                        out.push(CollectionChange::Inserted {
                            index: at,
                            items: vec![derived],
                        });
                    }
                }
            }
            CollectionChange::Moved { from, to, item } => {
                if let Some(found) = self.locate(entries, item, *from) {
                    let entry = entries.remove(found);
                    let at = (*to).min(entries.len());
                    let derived = entry.item.clone();
                    entries.insert(at, entry);
                    if found != at {
                        out.push(CollectionChange::Moved {
                            from: found,
                            to: at,
                            item: derived,
                        });
                    }
                }
            }
            CollectionChange::Reset { items } => {
                entries.clear();
                entries.extend(items.iter().map(|item| self.entry(item)));
                out.push(CollectionChange::Reset {
                    items: entries.iter().map(|e| e.item.clone()).collect(),
                });
            }
        }
        out
    }
}

struct SingleState<T, P> {
    rules: Rules<T, P>,
    entries: Mutex<Vec<Entry<P>>>,
}

/// A derived sequence that mirrors one observable source through a mapping.
///
/// Dropping (or [`release`](Projection::release)-ing) the projection unsubscribes it.
pub struct Projection<T, P> {
    state: Arc<SingleState<T, P>>,
    source_subscription: Option<Subscription>,
}

impl<T, P> Projection<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Shorthand for `ProjectionBuilder::new(project).build(source)`.
    pub fn new<S>(source: &S, project: impl Fn(&T) -> P + Send + Sync + 'static) -> Result<Self>
    where
        S: Sequence<T> + ?Sized,
        P: PartialEq,
    {
        ProjectionBuilder::new(project).build(source)
    }

    fn from_builder<S>(builder: ProjectionBuilder<T, P>, source: &S) -> Result<Self>
    where
        S: Sequence<T> + ?Sized,
    {
        let Some(changes) = source.changes() else {
            return Err(Error::invalid(
                "projection source must publish its changes",
            ));
        };

        let state = Arc::new(SingleState {
            rules: Rules::from_builder(builder),
            entries: Mutex::new(Vec::new()),
        });

        let weak: Weak<SingleState<T, P>> = Arc::downgrade(&state);
        let subscription = changes.subscribe(move |change| {
            if let Some(state) = weak.upgrade() {
                state.handle(change);
            }
        });

        {
            let mut entries = lock(&state.entries);
            let items = source.snapshot();
            entries.extend(items.iter().map(|item| state.rules.entry(item)));
        }

        Ok(Self {
            state,
            source_subscription: Some(subscription),
        })
    }

    pub fn get(&self, index: usize) -> Option<P> {
        lock(&self.state.entries).get(index).map(|e| e.item.clone())
    }

    /// Fired whenever a derived item reports a change of its own content.
    pub fn content_changed(&self) -> &Notifier<ContentChanged> {
        &self.state.rules.content_changed
    }

    /// Stop following the source. The derived items stay as they are.
    pub fn release(&mut self) {
        self.source_subscription.take();
    }

    pub fn is_live(&self) -> bool {
        self.source_subscription.is_some()
    }
}

impl<T, P> SingleState<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn handle(&self, change: &CollectionChange<T>) {
        let derived = {
            let mut entries = lock(&self.entries);
            self.rules.apply(&mut entries, change)
        };
        for change in &derived {
            self.rules.changes.emit(change);
        }
    }
}

impl<T, P> Sequence<P> for Projection<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn snapshot(&self) -> Vec<P> {
        lock(&self.state.entries)
            .iter()
            .map(|e| e.item.clone())
            .collect()
    }

    fn len(&self) -> usize {
        lock(&self.state.entries).len()
    }

    fn changes(&self) -> Option<&Notifier<CollectionChange<P>>> {
        Some(&self.state.rules.changes)
    }
}

static NEXT_BLOCK_KEY: AtomicU64 = AtomicU64::new(0);

/// Derived items of one source, tagged with the source's provenance key.
struct Block<P> {
    key: u64,
    entries: Vec<Entry<P>>,
    _subscription: Option<Subscription>,
}

struct MultiState<T, P> {
    rules: Rules<T, P>,
    blocks: Mutex<Vec<Block<P>>>,
}

/// A derived sequence that flattens the projections of a dynamic list of sources.
///
/// Each derived item is kept with the key of the source that produced it, so removing a
/// source removes exactly its items, whatever `project` would yield for them today.
pub struct MultiProjection<T, P> {
    state: Arc<MultiState<T, P>>,
    sources_subscription: Option<Subscription>,
}

impl<T, P> MultiProjection<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Shorthand for `ProjectionBuilder::new(project).build_multi(sources)`.
    pub fn new<O, S>(sources: &O, project: impl Fn(&T) -> P + Send + Sync + 'static) -> Result<Self>
    where
        O: Sequence<Arc<S>> + ?Sized,
        S: Sequence<T> + 'static,
        P: PartialEq,
    {
        ProjectionBuilder::new(project).build_multi(sources)
    }

    fn from_builder<O, S>(builder: ProjectionBuilder<T, P>, sources: &O) -> Result<Self>
    where
        O: Sequence<Arc<S>> + ?Sized,
        S: Sequence<T> + 'static,
    {
        let initial = sources.snapshot();
        if initial.iter().any(|source| source.changes().is_none()) {
            return Err(Error::invalid(
                "every projection source must publish its changes",
            ));
        }

        let state = Arc::new(MultiState {
            rules: Rules::from_builder(builder),
            blocks: Mutex::new(Vec::new()),
        });

        // The source list itself may be fixed.
        let sources_subscription = sources.changes().map(|changes| {
            let weak: Weak<MultiState<T, P>> = Arc::downgrade(&state);
            changes.subscribe(move |change: &CollectionChange<Arc<S>>| {
                if let Some(state) = weak.upgrade() {
                    state.handle_sources(change);
                }
            })
        });

        {
            let mut blocks = lock(&state.blocks);
            for source in &initial {
                blocks.push(MultiState::block(&state, source));
            }
        }

        Ok(Self {
            state,
            sources_subscription,
        })
    }

    pub fn get(&self, index: usize) -> Option<P> {
        lock(&self.state.blocks)
            .iter()
            .flat_map(|block| block.entries.iter())
            .nth(index)
            .map(|e| e.item.clone())
    }

    pub fn source_count(&self) -> usize {
        lock(&self.state.blocks).len()
    }

    pub fn content_changed(&self) -> &Notifier<ContentChanged> {
        &self.state.rules.content_changed
    }

    /// Stop following the source list and every source in it.
    pub fn release(&mut self) {
        self.sources_subscription.take();
        lock(&self.state.blocks).clear();
    }
}

impl<T, P> MultiState<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Subscribe to `source` and project its current items. A source that does not publish
    /// changes gets an empty block, so block positions keep matching source positions.
    fn block<S>(state: &Arc<Self>, source: &Arc<S>) -> Block<P>
    where
        S: Sequence<T> + 'static,
    {
        let key = NEXT_BLOCK_KEY.fetch_add(1, Ordering::Relaxed);
        let Some(changes) = source.changes() else {
            warn!("Projection source does not publish changes; it contributes no items");
            return Block {
                key,
                entries: Vec::new(),
                _subscription: None,
            };
        };
        let weak: Weak<Self> = Arc::downgrade(state);
        let subscription = changes.subscribe(move |change| {
            if let Some(state) = weak.upgrade() {
                state.handle_source(key, change);
            }
        });
        let entries = source
            .snapshot()
            .iter()
            .map(|item| state.rules.entry(item))
            .collect();
        Block {
            key,
            entries,
            _subscription: Some(subscription),
        }
    }

    fn offset(blocks: &[Block<P>], block_index: usize) -> usize {
        blocks[..block_index].iter().map(|b| b.entries.len()).sum()
    }

    fn flatten(blocks: &[Block<P>]) -> Vec<P> {
        blocks
            .iter()
            .flat_map(|block| block.entries.iter().map(|e| e.item.clone()))
            .collect()
    }

    fn handle_source(&self, key: u64, change: &CollectionChange<T>) {
        let derived = {
            let mut blocks = lock(&self.blocks);
            let Some(block_index) = blocks.iter().position(|b| b.key == key) else {
                return;
            };
            let offset = Self::offset(&blocks, block_index);
            let local = self.rules.apply(&mut blocks[block_index].entries, change);
            if matches!(change, CollectionChange::Reset { .. }) {
                vec![CollectionChange::Reset {
                    items: Self::flatten(&blocks),
                }]
            } else {
                local
                    .into_iter()
                    .map(|change| shift(change, offset))
                    .collect()
            }
        };
        for change in &derived {
            self.rules.changes.emit(change);
        }
    }

    fn handle_sources<S>(self: &Arc<Self>, change: &CollectionChange<Arc<S>>)
    where
        S: Sequence<T> + 'static,
    {
        let derived = {
            let mut blocks = lock(&self.blocks);
            match change {
                CollectionChange::Inserted { index, items } => {
                    let mut at = (*index).min(blocks.len());
                    let mut out = Vec::new();
                    for source in items {
                        let block = Self::block(self, source);
                        let offset = Self::offset(&blocks, at);
                        let items: Vec<P> = block.entries.iter().map(|e| e.item.clone()).collect();
                        blocks.insert(at, block);
                        at += 1;
                        if !items.is_empty() {
                            out.push(CollectionChange::Inserted {
                                index: offset,
                                items,
                            });
                        }
                    }
                    out
                }
                CollectionChange::Removed { index, items } => {
                    let mut out = Vec::new();
                    for _ in items {
                        if *index >= blocks.len() {
                            break;
                        }
                        let offset = Self::offset(&blocks, *index);
                        let block = blocks.remove(*index);
                        let items: Vec<P> = block.entries.into_iter().map(|e| e.item).collect();
                        if !items.is_empty() {
                            out.push(CollectionChange::Removed {
                                index: offset,
                                items,
                            });
                        }
                    }
                    out
                }
                CollectionChange::Replaced { index, new, .. } => {
                    let mut out = Vec::new();
                    if *index < blocks.len() {
                        let offset = Self::offset(&blocks, *index);
                        let block = blocks.remove(*index);
                        let items: Vec<P> = block.entries.into_iter().map(|e| e.item).collect();
                        if !items.is_empty() {
                            out.push(CollectionChange::Removed {
                                index: offset,
                                items,
                            });
                        }
                        let block = Self::block(self, new);
                        let items: Vec<P> = block.entries.iter().map(|e| e.item.clone()).collect();
                        blocks.insert(*index, block);
                        if !items.is_empty() {
                            out.push(CollectionChange::Inserted {
                                index: offset,
                                items,
                            });
                        }
                    }
                    out
                }
                CollectionChange::Moved { from, to, .. } => {
                    if *from < blocks.len() && *to < blocks.len() {
                        let block = blocks.remove(*from);
                        blocks.insert(*to, block);
                    }
                    vec![CollectionChange::Reset {
                        items: Self::flatten(&blocks),
                    }]
                }
                CollectionChange::Reset { items } => {
                    blocks.clear();
                    for source in items {
                        blocks.push(Self::block(self, source));
                    }
                    vec![CollectionChange::Reset {
                        items: Self::flatten(&blocks),
                    }]
                }
            }
        };
        for change in &derived {
            self.rules.changes.emit(change);
        }
    }
}

fn shift<P>(change: CollectionChange<P>, offset: usize) -> CollectionChange<P> {
    match change {
        CollectionChange::Inserted { index, items } => CollectionChange::Inserted {
            index: index + offset,
            items,
        },
        CollectionChange::Removed { index, items } => CollectionChange::Removed {
            index: index + offset,
            items,
        },
        CollectionChange::Replaced { index, old, new } => CollectionChange::Replaced {
            index: index + offset,
            old,
            new,
        },
        CollectionChange::Moved { from, to, item } => CollectionChange::Moved {
            from: from + offset,
            to: to + offset,
            item,
        },
        reset @ CollectionChange::Reset { .. } => reset,
    }
}

impl<T, P> Sequence<P> for MultiProjection<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn snapshot(&self) -> Vec<P> {
        MultiState::<T, P>::flatten(&lock(&self.state.blocks))
    }

    fn len(&self) -> usize {
        lock(&self.state.blocks)
            .iter()
            .map(|b| b.entries.len())
            .sum()
    }

    fn changes(&self) -> Option<&Notifier<CollectionChange<P>>> {
        Some(&self.state.rules.changes)
    }
}

/// A lazy view over a slice that maps items on every access. Nothing is cached or observed.
pub struct ProjectedSlice<'a, T, F> {
    source: &'a [T],
    project: F,
}

impl<'a, T, P, F> ProjectedSlice<'a, T, F>
where
    F: Fn(&T) -> P,
{
    pub fn new(source: &'a [T], project: F) -> Self {
        Self { source, project }
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<P> {
        self.source.get(index).map(&self.project)
    }

    pub fn iter(&self) -> impl Iterator<Item = P> + '_ {
        self.source.iter().map(&self.project)
    }

    pub fn to_vec(&self) -> Vec<P> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::ObservableVec;
    use std::sync::atomic::AtomicUsize;

    fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
        items.sort();
        items
    }

    #[test]
    fn rejects_sources_without_change_notifications() {
        let fixed = vec![1, 2, 3];
        let result = Projection::new(&fixed, |n: &i32| n * 2);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn populates_eagerly_and_follows_edits() {
        let source = ObservableVec::from_vec(vec![1, 2, 3]);
        let projection = Projection::new(&source, |n: &i32| n * 10).unwrap();
        assert_eq!(projection.snapshot(), vec![10, 20, 30]);

        source.insert(1, 5).unwrap();
        assert_eq!(projection.snapshot(), vec![10, 50, 20, 30]);

        source.remove(0);
        assert_eq!(projection.snapshot(), vec![50, 20, 30]);

        source.replace(2, 4);
        assert_eq!(projection.snapshot(), vec![50, 20, 40]);

        source.move_item(0, 2).unwrap();
        assert_eq!(projection.snapshot(), vec![20, 40, 50]);

        source.reset(vec![9]);
        assert_eq!(projection.snapshot(), vec![90]);
    }

    #[test]
    fn stays_consistent_over_random_edits() {
        let source = ObservableVec::new();
        let projection = Projection::new(&source, |n: &u32| format!("#{n}")).unwrap();

        let mut seed: u32 = 0x2545_f491;
        let mut next = |bound: u32| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed % bound.max(1)
        };

        for step in 0..500u32 {
            let len = source.len() as u32;
            match next(6) {
                0 | 1 => source.insert(next(len + 1) as usize, step).unwrap(),
                2 if len > 0 => {
                    source.remove(next(len) as usize);
                }
                3 if len > 0 => {
                    source.replace(next(len) as usize, step);
                }
                4 if len > 1 => source
                    .move_item(next(len) as usize, next(len) as usize)
                    .unwrap(),
                5 if step % 50 == 0 => source.reset(vec![step, step + 1]),
                _ => source.push(step),
            }
            let expected: Vec<String> = source.snapshot().iter().map(|n| format!("#{n}")).collect();
            assert_eq!(sorted(projection.snapshot()), sorted(expected));
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Labeled {
        label: String,
        origin: u32,
    }

    #[test]
    fn back_map_disambiguates_non_injective_projections() {
        let source = ObservableVec::from_vec(vec![11, 21, 12]);
        // Items are labeled by their last digit, so 11 and 21 project to equal labels.
        let projection = ProjectionBuilder::with_back_map(
            |n: &u32| Labeled {
                label: format!("ends-with-{}", n % 10),
                origin: *n,
            },
            |derived: &Labeled, source: &u32| derived.origin == *source,
        )
        .build(&source)
        .unwrap();

        source.remove(1);
        let origins: Vec<u32> = projection.snapshot().iter().map(|l| l.origin).collect();
        assert_eq!(origins, vec![11, 12]);
    }

    #[test]
    fn republishes_derived_changes() {
        let source = ObservableVec::from_vec(vec![1]);
        let projection = Projection::new(&source, |n: &i32| -n).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = projection
            .changes()
            .unwrap()
            .subscribe(move |change| sink.lock().unwrap().push(change.clone()));

        source.push(2);
        source.remove(0);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                CollectionChange::Inserted { index: 1, items: vec![-2] },
                CollectionChange::Removed { index: 0, items: vec![-1] },
            ]
        );
    }

    #[test]
    fn release_unsubscribes_from_source() {
        let source = ObservableVec::from_vec(vec![1]);
        let mut projection = Projection::new(&source, |n: &i32| *n).unwrap();
        assert_eq!(source.changes().unwrap().listener_count(), 1);

        projection.release();
        source.push(2);
        assert_eq!(projection.snapshot(), vec![1]);
        assert_eq!(source.changes().unwrap().listener_count(), 0);

        let other = Projection::new(&source, |n: &i32| *n).unwrap();
        drop(other);
        assert_eq!(source.changes().unwrap().listener_count(), 0);
    }

    struct Counter {
        changed: Notifier<()>,
    }

    impl NotifyChanged for Counter {
        fn subscribe_changed(&self, on_change: Box<dyn Fn() + Send + Sync>) -> Subscription {
            self.changed.subscribe(move |_| on_change())
        }
    }

    #[test]
    fn forwards_item_changes_until_item_is_removed() {
        let a = Arc::new(Counter { changed: Notifier::new() });
        let b = Arc::new(Counter { changed: Notifier::new() });
        let source = ObservableVec::from_vec(vec![Arc::clone(&a), Arc::clone(&b)]);
        let projection = ProjectionBuilder::with_back_map(
            |c: &Arc<Counter>| Arc::clone(c),
            |derived: &Arc<Counter>, source: &Arc<Counter>| Arc::ptr_eq(derived, source),
        )
        .forward_item_changes()
        .build(&source)
        .unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = projection.content_changed().subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        a.changed.emit(&());
        b.changed.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        source.remove(0);
        a.changed.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(a.changed.listener_count(), 0);
    }

    #[test]
    fn projections_chain() {
        let source = ObservableVec::from_vec(vec![1, 2]);
        let doubled = Projection::new(&source, |n: &i32| n * 2).unwrap();
        let labeled = Projection::new(&doubled, |n: &i32| n.to_string()).unwrap();

        source.push(3);
        assert_eq!(labeled.snapshot(), vec!["2", "4", "6"]);
    }

    #[test]
    fn multi_projection_flattens_and_follows_nested_sources() {
        let first = Arc::new(ObservableVec::from_vec(vec![1, 2]));
        let second = Arc::new(ObservableVec::from_vec(vec![10]));
        let sources = ObservableVec::from_vec(vec![Arc::clone(&first), Arc::clone(&second)]);
        let projection = MultiProjection::new(&sources, |n: &i32| n + 100).unwrap();
        assert_eq!(projection.snapshot(), vec![101, 102, 110]);

        second.push(11);
        first.remove(0);
        assert_eq!(projection.snapshot(), vec![102, 110, 111]);

        let third = Arc::new(ObservableVec::from_vec(vec![7]));
        sources.insert(0, Arc::clone(&third)).unwrap();
        assert_eq!(projection.snapshot(), vec![107, 102, 110, 111]);
        assert_eq!(projection.source_count(), 3);
    }

    #[test]
    fn removing_a_source_removes_only_its_items() {
        // Both sources hold equal values; provenance keeps them apart.
        let first = Arc::new(ObservableVec::from_vec(vec![1, 2]));
        let second = Arc::new(ObservableVec::from_vec(vec![1]));
        let sources = ObservableVec::from_vec(vec![Arc::clone(&first), Arc::clone(&second)]);
        let projection = MultiProjection::new(&sources, |n: &i32| *n).unwrap();

        sources.remove(0);
        assert_eq!(projection.snapshot(), vec![1]);
        assert_eq!(first.changes().unwrap().listener_count(), 0);

        // A departed source no longer feeds the projection.
        first.push(3);
        assert_eq!(projection.snapshot(), vec![1]);
    }

    #[test]
    fn multi_projection_accepts_fixed_source_list() {
        let first = Arc::new(ObservableVec::from_vec(vec!["a"]));
        let sources = vec![Arc::clone(&first)];
        let projection = MultiProjection::new(&sources, |s: &&str| s.to_uppercase()).unwrap();

        first.push("b");
        assert_eq!(projection.snapshot(), vec!["A", "B"]);
    }

    #[test]
    fn multi_projection_rejects_unobservable_nested_sources() {
        let sources = vec![Arc::new(vec![1, 2])];
        let result = MultiProjection::new(&sources, |n: &i32| *n);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    /// A nested source that may or may not publish its changes.
    struct Nested {
        items: ObservableVec<i32>,
        live: bool,
    }

    impl Nested {
        fn new(items: Vec<i32>, live: bool) -> Arc<Self> {
            Arc::new(Self {
                items: ObservableVec::from_vec(items),
                live,
            })
        }
    }

    impl Sequence<i32> for Nested {
        fn snapshot(&self) -> Vec<i32> {
            self.items.snapshot()
        }

        fn changes(&self) -> Option<&Notifier<CollectionChange<i32>>> {
            if self.live {
                self.items.changes()
            } else {
                None
            }
        }
    }

    #[test]
    fn unobservable_source_added_later_contributes_nothing() {
        let first = Nested::new(vec![1], true);
        let sources = ObservableVec::from_vec(vec![Arc::clone(&first)]);
        let projection = MultiProjection::new(&sources, |n: &i32| *n).unwrap();

        sources.push(Nested::new(vec![2], false));
        let third = Nested::new(vec![3], true);
        sources.push(Arc::clone(&third));
        assert_eq!(projection.snapshot(), vec![1, 3]);

        first.items.push(4);
        assert_eq!(projection.snapshot(), vec![1, 4, 3]);

        // Positions still line up: removing the silent source leaves the others alone.
        sources.remove(1);
        assert_eq!(projection.snapshot(), vec![1, 4, 3]);
        sources.remove(1);
        assert_eq!(projection.snapshot(), vec![1, 4]);
    }

    #[test]
    fn multi_projection_reports_global_indices() {
        let first = Arc::new(ObservableVec::from_vec(vec![1, 2]));
        let second = Arc::new(ObservableVec::from_vec(vec![3]));
        let sources = ObservableVec::from_vec(vec![Arc::clone(&first), Arc::clone(&second)]);
        let projection = MultiProjection::new(&sources, |n: &i32| *n).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = projection
            .changes()
            .unwrap()
            .subscribe(move |change| sink.lock().unwrap().push(change.clone()));

        second.push(4);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![CollectionChange::Inserted { index: 3, items: vec![4] }]
        );
        assert_eq!(projection.get(3), Some(4));
    }

    #[test]
    fn projected_slice_reprojects_on_every_read() {
        let calls = AtomicUsize::new(0);
        let source = [1, 2, 3];
        let view = ProjectedSlice::new(&source, |n: &i32| {
            calls.fetch_add(1, Ordering::SeqCst);
            n * n
        });

        assert_eq!(view.to_vec(), vec![1, 4, 9]);
        assert_eq!(view.get(1), Some(4));
        assert_eq!(view.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
