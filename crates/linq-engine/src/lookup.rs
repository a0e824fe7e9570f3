//! Grouping/lookup hash engine.
//!
//! A [`Lookup`] is built by draining its source exactly once. Groupings live in an arena in
//! first-seen key order; a [`ChainedIndex`] maps key hashes to arena slots. After construction
//! the table is immutable apart from the per-grouping `fetched` flags used by full outer joins.
//!
//! Null keys only exist for lookups built with [`Lookup::create_for_full_join`], which are keyed
//! by `Option<K>`. Their `None`-keyed grouping sits in the arena like any other (it is counted and
//! enumerated) but key lookups never return it, so `get(&None)` and `contains_key(&None)` behave
//! as if it were absent.

use crate::array_builder::ArrayBuilder;
use crate::comparer::{default_comparer, EqualityComparer, NullableComparer, SharedComparer};
use crate::enumerator::{current_of, open, BoxEnumerator, Enumerable, Enumerator, ListSource};
use crate::error::LinqResult;
use crate::hash_index::{mask_hash, ChainedIndex, LookupOptions};
use crate::iterator::{guarded, IteratorBase, Stage};
use crate::seq::Seq;
use crate::sources::{empty, ListCursor};
use std::cell::Cell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// A key and the elements that share it, in source order.
pub struct Grouping<K, E> {
    key: K,
    elements: Rc<[E]>,
}

impl<K, E> Grouping<K, E> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn elements(&self) -> &[E] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<K: Clone + 'static, E: Clone + 'static> Grouping<K, E> {
    pub fn to_seq(&self) -> Seq<E> {
        Seq::new(self.clone())
    }
}

impl<K: Clone, E> Clone for Grouping<K, E> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            elements: Rc::clone(&self.elements),
        }
    }
}

impl<K: fmt::Debug, E: fmt::Debug> fmt::Debug for Grouping<K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grouping")
            .field("key", &self.key)
            .field("elements", &self.elements)
            .finish()
    }
}

impl<K: PartialEq, E: PartialEq> PartialEq for Grouping<K, E> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.elements == other.elements
    }
}

impl<K: Clone + 'static, E: Clone + 'static> Enumerable for Grouping<K, E> {
    type Item = E;

    fn enumerator(&self) -> BoxEnumerator<E> {
        Box::new(ListCursor::new(Rc::clone(&self.elements)))
    }

    fn cheap_count(&self) -> Option<usize> {
        Some(self.elements.len())
    }

    fn as_list(&self) -> Option<&dyn ListSource<E>> {
        Some(self)
    }

    fn to_vec(&self) -> LinqResult<Vec<E>> {
        Ok(self.elements.to_vec())
    }
}

impl<K, E: Clone> ListSource<E> for Grouping<K, E> {
    fn len(&self) -> usize {
        self.elements.len()
    }

    fn item(&self, index: usize) -> Option<E> {
        self.elements.get(index).cloned()
    }
}

struct PendingGroup<K, E> {
    key: K,
    elements: ArrayBuilder<E>,
}

impl<K, E> PendingGroup<K, E> {
    /// Shrink the element buffer to its exact size.
    fn trim(self) -> Grouping<K, E> {
        Grouping {
            key: self.key,
            elements: Rc::from(self.elements.to_array()),
        }
    }
}

fn find_slot<'a, K: 'a>(
    index: &ChainedIndex,
    comparer: &dyn EqualityComparer<K>,
    null_key: Option<usize>,
    key: &K,
    hash: u32,
    key_at: impl Fn(usize) -> &'a K,
) -> Option<usize> {
    index
        .candidates(hash)
        .find(|&slot| Some(slot) != null_key && comparer.equals(key_at(slot), key))
}

struct LookupBuilder<K, E> {
    comparer: SharedComparer<K>,
    index: ChainedIndex,
    groups: Vec<PendingGroup<K, E>>,
    null_key: Option<usize>,
}

impl<K, E> LookupBuilder<K, E> {
    fn new(comparer: SharedComparer<K>, options: LookupOptions) -> LinqResult<Self> {
        Ok(Self {
            comparer,
            index: ChainedIndex::new(options)?,
            groups: Vec::new(),
            null_key: None,
        })
    }

    fn group_mut(&mut self, key: K) -> LinqResult<&mut PendingGroup<K, E>> {
        let hash = mask_hash(self.comparer.hash(&key));
        let groups = &self.groups;
        let found = find_slot(
            &self.index,
            self.comparer.as_ref(),
            self.null_key,
            &key,
            hash,
            |slot| &groups[slot].key,
        );
        let slot = match found {
            Some(slot) => slot,
            None => self.create(key, hash)?,
        };
        Ok(&mut self.groups[slot])
    }

    fn create(&mut self, key: K, hash: u32) -> LinqResult<usize> {
        let slot = self.index.insert(hash)?;
        debug_assert_eq!(slot, self.groups.len());
        self.groups.push(PendingGroup {
            key,
            elements: ArrayBuilder::with_capacity(1),
        });
        Ok(slot)
    }

    fn finish(self) -> Lookup<K, E> {
        log::debug!(
            "lookup built: {} groupings in {} buckets",
            self.groups.len(),
            self.index.bucket_count()
        );
        let groupings: Rc<[Grouping<K, E>]> =
            self.groups.into_iter().map(PendingGroup::trim).collect();
        let fetched = (0..groupings.len()).map(|_| Cell::new(false)).collect();
        Lookup {
            table: Rc::new(LookupTable {
                comparer: self.comparer,
                index: self.index,
                groupings,
                fetched,
                null_key: self.null_key,
            }),
        }
    }
}

impl<K, E> LookupBuilder<Option<K>, E> {
    fn null_key_group(&mut self) -> LinqResult<&mut PendingGroup<Option<K>, E>> {
        let slot = match self.null_key {
            Some(slot) => slot,
            None => {
                let slot = self.create(None, 0)?;
                self.null_key = Some(slot);
                slot
            }
        };
        Ok(&mut self.groups[slot])
    }
}

struct LookupTable<K, E> {
    comparer: SharedComparer<K>,
    index: ChainedIndex,
    groupings: Rc<[Grouping<K, E>]>,
    fetched: Vec<Cell<bool>>,
    null_key: Option<usize>,
}

impl<K, E> LookupTable<K, E> {
    fn slot_of(&self, key: &K) -> Option<usize> {
        let hash = mask_hash(self.comparer.hash(key));
        find_slot(
            &self.index,
            self.comparer.as_ref(),
            self.null_key,
            key,
            hash,
            |slot| &self.groupings[slot].key,
        )
    }
}

/// Immutable multi-map from keys to [`Grouping`]s, iterated in first-seen key order.
///
/// Cloning a `Lookup` is cheap and shares the table, including the `fetched` flags.
pub struct Lookup<K, E> {
    table: Rc<LookupTable<K, E>>,
}

impl<K, E> Clone for Lookup<K, E> {
    fn clone(&self) -> Self {
        Self {
            table: Rc::clone(&self.table),
        }
    }
}

impl<K: fmt::Debug, E: fmt::Debug> fmt::Debug for Lookup<K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.table.groupings.iter()).finish()
    }
}

impl<K: Clone + 'static, E: Clone + 'static> Lookup<K, E> {
    pub fn create<S, F>(
        source: &S,
        key_selector: F,
        comparer: SharedComparer<K>,
    ) -> LinqResult<Self>
    where
        S: Enumerable<Item = E> + ?Sized,
        F: Fn(&E) -> LinqResult<K>,
    {
        Self::create_with_options(source, key_selector, comparer, LookupOptions::default())
    }

    pub fn create_with_options<S, F>(
        source: &S,
        key_selector: F,
        comparer: SharedComparer<K>,
        options: LookupOptions,
    ) -> LinqResult<Self>
    where
        S: Enumerable<Item = E> + ?Sized,
        F: Fn(&E) -> LinqResult<K>,
    {
        let mut builder = LookupBuilder::new(comparer, options)?;
        let mut cursor = open(source);
        while cursor.move_next()? {
            let item = current_of(&cursor)?;
            let key = key_selector(item)?;
            builder.group_mut(key)?.elements.add(item.clone());
        }
        Ok(builder.finish())
    }

    /// Group `source` by `key_selector`, storing `element_selector(item)` instead of the item.
    pub fn create_with_elements<S, FK, FE>(
        source: &S,
        key_selector: FK,
        element_selector: FE,
        comparer: SharedComparer<K>,
    ) -> LinqResult<Self>
    where
        S: Enumerable + ?Sized,
        FK: Fn(&S::Item) -> LinqResult<K>,
        FE: Fn(&S::Item) -> LinqResult<E>,
    {
        let mut builder = LookupBuilder::new(comparer, LookupOptions::default())?;
        let mut cursor = open(source);
        while cursor.move_next()? {
            let item = current_of(&cursor)?;
            let key = key_selector(item)?;
            let element = element_selector(item)?;
            builder.group_mut(key)?.elements.add(element);
        }
        Ok(builder.finish())
    }

    /// Inner-join side table: elements whose key is `None` are dropped.
    pub fn create_for_join<S, F>(
        source: &S,
        key_selector: F,
        comparer: SharedComparer<K>,
    ) -> LinqResult<Self>
    where
        S: Enumerable<Item = E> + ?Sized,
        F: Fn(&E) -> LinqResult<Option<K>>,
    {
        let mut builder = LookupBuilder::new(comparer, LookupOptions::default())?;
        let mut cursor = open(source);
        while cursor.move_next()? {
            let item = current_of(&cursor)?;
            if let Some(key) = key_selector(item)? {
                builder.group_mut(key)?.elements.add(item.clone());
            }
        }
        Ok(builder.finish())
    }

    pub fn len(&self) -> usize {
        self.table.groupings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.groupings.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.table.index.bucket_count()
    }

    /// The elements for `key`, or an empty sequence.
    pub fn get(&self, key: &K) -> Seq<E> {
        match self.grouping(key) {
            Some(grouping) => grouping.to_seq(),
            None => empty(),
        }
    }

    pub fn grouping(&self, key: &K) -> Option<&Grouping<K, E>> {
        self.table
            .slot_of(key)
            .map(|slot| &self.table.groupings[slot])
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.table.slot_of(key).is_some()
    }

    /// Groupings in first-seen key order.
    pub fn groupings(&self) -> std::slice::Iter<'_, Grouping<K, E>> {
        self.table.groupings.iter()
    }

    /// One result per grouping, in key order, into an exactly-sized vector.
    pub fn to_vec_with<R, F>(&self, result_selector: F) -> LinqResult<Vec<R>>
    where
        F: Fn(&K, Seq<E>) -> LinqResult<R>,
    {
        let mut out = Vec::with_capacity(self.len());
        for grouping in self.table.groupings.iter() {
            out.push(result_selector(&grouping.key, grouping.to_seq())?);
        }
        Ok(out)
    }

    /// Lazily map every grouping through `result_selector`.
    pub fn apply_result_selector<R, F>(&self, result_selector: F) -> Seq<R>
    where
        R: Clone + 'static,
        F: Fn(&K, Seq<E>) -> LinqResult<R> + 'static,
    {
        Seq::from_stage(ApplyResultSelector {
            table: Rc::clone(&self.table),
            result_selector: Rc::new(result_selector),
            base: IteratorBase::new(),
            next: 0,
        })
    }

    /// Groupings never passed out by `fetch_grouping`, in key order.
    pub fn unfetched_enumerator(&self) -> BoxEnumerator<Grouping<K, E>> {
        Box::new(UnfetchedCursor {
            table: Rc::clone(&self.table),
            next: 0,
            current: None,
        })
    }

    pub fn is_fetched(&self, key: &K) -> bool {
        self.table
            .slot_of(key)
            .is_some_and(|slot| self.table.fetched[slot].get())
    }
}

impl<K: Clone + 'static, E: Clone + 'static> Lookup<Option<K>, E> {
    /// Full-outer-join side table: elements whose key is `None` go to a single null-key grouping
    /// that is enumerated but never matched by key.
    pub fn create_for_full_join<S, F>(
        source: &S,
        key_selector: F,
        comparer: SharedComparer<K>,
    ) -> LinqResult<Self>
    where
        S: Enumerable<Item = E> + ?Sized,
        F: Fn(&E) -> LinqResult<Option<K>>,
    {
        let comparer: SharedComparer<Option<K>> = Rc::new(NullableComparer::new(comparer));
        let mut builder = LookupBuilder::new(comparer, LookupOptions::default())?;
        let mut cursor = open(source);
        while cursor.move_next()? {
            let item = current_of(&cursor)?;
            let group = match key_selector(item)? {
                Some(key) => builder.group_mut(Some(key))?,
                None => builder.null_key_group()?,
            };
            group.elements.add(item.clone());
        }
        Ok(builder.finish())
    }

    /// Look up `key` and mark its grouping as fetched. A `None` key fetches nothing.
    pub fn fetch_grouping(&self, key: &Option<K>) -> Option<&Grouping<Option<K>, E>> {
        if key.is_none() {
            return None;
        }
        let slot = self.table.slot_of(key)?;
        self.table.fetched[slot].set(true);
        Some(&self.table.groupings[slot])
    }

    pub fn fetch(&self, key: &Option<K>) -> Seq<E> {
        match self.fetch_grouping(key) {
            Some(grouping) => grouping.to_seq(),
            None => empty(),
        }
    }

    pub fn null_key_grouping(&self) -> Option<&Grouping<Option<K>, E>> {
        self.table.null_key.map(|slot| &self.table.groupings[slot])
    }
}

impl<K: Clone + 'static, E: Clone + 'static> Enumerable for Lookup<K, E> {
    type Item = Grouping<K, E>;

    fn enumerator(&self) -> BoxEnumerator<Grouping<K, E>> {
        Box::new(ListCursor::new(Rc::clone(&self.table.groupings)))
    }

    fn cheap_count(&self) -> Option<usize> {
        Some(self.len())
    }

    fn as_list(&self) -> Option<&dyn ListSource<Grouping<K, E>>> {
        Some(self)
    }

    fn to_vec(&self) -> LinqResult<Vec<Grouping<K, E>>> {
        Ok(self.table.groupings.to_vec())
    }
}

impl<K: Clone, E> ListSource<Grouping<K, E>> for Lookup<K, E> {
    fn len(&self) -> usize {
        self.table.groupings.len()
    }

    fn item(&self, index: usize) -> Option<Grouping<K, E>> {
        self.table.groupings.get(index).cloned()
    }
}

struct UnfetchedCursor<K, E> {
    table: Rc<LookupTable<K, E>>,
    next: usize,
    current: Option<usize>,
}

impl<K, E> Enumerator for UnfetchedCursor<K, E> {
    type Item = Grouping<K, E>;

    fn move_next(&mut self) -> LinqResult<bool> {
        while self.next < self.table.groupings.len() {
            let slot = self.next;
            self.next += 1;
            if !self.table.fetched[slot].get() {
                self.current = Some(slot);
                return Ok(true);
            }
        }
        self.close();
        Ok(false)
    }

    fn current(&self) -> Option<&Grouping<K, E>> {
        self.current.map(|slot| &self.table.groupings[slot])
    }

    fn close(&mut self) {
        self.next = self.table.groupings.len();
        self.current = None;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ApplyState {
    #[default]
    NextGroup,
}

struct ApplyResultSelector<K, E, R> {
    table: Rc<LookupTable<K, E>>,
    result_selector: Rc<dyn Fn(&K, Seq<E>) -> LinqResult<R>>,
    base: IteratorBase<R, ApplyState>,
    next: usize,
}

impl<K, E, R> ApplyResultSelector<K, E, R>
where
    K: Clone + 'static,
    E: Clone + 'static,
    R: Clone + 'static,
{
    fn advance(&mut self) -> LinqResult<bool> {
        match self.base.state() {
            Some(ApplyState::NextGroup) => {
                let Some(grouping) = self.table.groupings.get(self.next) else {
                    self.close();
                    return Ok(false);
                };
                self.next += 1;
                let value = (self.result_selector)(&grouping.key, grouping.to_seq())?;
                self.base.yield_value(value)
            }
            None => Ok(false),
        }
    }
}

impl<K, E, R> Enumerator for ApplyResultSelector<K, E, R>
where
    K: Clone + 'static,
    E: Clone + 'static,
    R: Clone + 'static,
{
    type Item = R;

    fn move_next(&mut self) -> LinqResult<bool> {
        guarded(self, Self::advance)
    }

    fn current(&self) -> Option<&R> {
        self.base.current()
    }

    fn close(&mut self) {
        self.base.close();
    }
}

impl<K, E, R> Stage for ApplyResultSelector<K, E, R>
where
    K: Clone + 'static,
    E: Clone + 'static,
    R: Clone + 'static,
{
    fn clone_stage(&self) -> Self {
        Self {
            table: Rc::clone(&self.table),
            result_selector: Rc::clone(&self.result_selector),
            base: IteratorBase::new(),
            next: 0,
        }
    }

    fn claim(&mut self) {
        self.base.claim();
    }

    fn cheap_count(&self) -> Option<usize> {
        Some(self.table.groupings.len())
    }

    fn to_vec(&self) -> LinqResult<Vec<R>> {
        let mut out = Vec::with_capacity(self.table.groupings.len());
        for grouping in self.table.groupings.iter() {
            out.push((self.result_selector)(&grouping.key, grouping.to_seq())?);
        }
        Ok(out)
    }
}

impl<T: Clone + 'static> Seq<T> {
    /// Eagerly group this sequence into a [`Lookup`].
    pub fn to_lookup<K, F>(&self, key_selector: F) -> LinqResult<Lookup<K, T>>
    where
        K: Eq + Hash + Clone + 'static,
        F: Fn(&T) -> K,
    {
        Lookup::create(self, |item| Ok(key_selector(item)), default_comparer())
    }

    pub fn to_lookup_by<K, F>(
        &self,
        key_selector: F,
        comparer: SharedComparer<K>,
    ) -> LinqResult<Lookup<K, T>>
    where
        K: Clone + 'static,
        F: Fn(&T) -> LinqResult<K>,
    {
        Lookup::create(self, key_selector, comparer)
    }
}
