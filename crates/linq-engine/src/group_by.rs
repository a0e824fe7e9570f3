use crate::comparer::{default_comparer, SharedComparer};
use crate::enumerator::{current_of, open, Enumerator, ScopedCursor};
use crate::error::LinqResult;
use crate::iterator::{guarded, open_cursor, IteratorBase, Stage};
use crate::lookup::{Grouping, Lookup};
use crate::seq::{Selector, Seq};
use std::hash::Hash;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum GroupState {
    #[default]
    Build,
    Yield,
}

/// Deferred grouping. The lookup is built on the first advance, never at composition time.
struct GroupBy<T, K, E, R> {
    source: Seq<T>,
    key_selector: Selector<T, K>,
    element_selector: Selector<T, E>,
    result_selector: Selector<Grouping<K, E>, R>,
    comparer: SharedComparer<K>,
    base: IteratorBase<R, GroupState>,
    groups: Option<ScopedCursor<Grouping<K, E>>>,
}

impl<T, K, E, R> GroupBy<T, K, E, R>
where
    T: Clone + 'static,
    K: Clone + 'static,
    E: Clone + 'static,
    R: Clone + 'static,
{
    fn build(&self) -> LinqResult<Lookup<K, E>> {
        let key_selector = &self.key_selector;
        let element_selector = &self.element_selector;
        Lookup::create_with_elements(
            &self.source,
            |item| key_selector(item),
            |item| element_selector(item),
            Rc::clone(&self.comparer),
        )
    }

    fn advance(&mut self) -> LinqResult<bool> {
        loop {
            match self.base.state() {
                Some(GroupState::Build) => {
                    let lookup = self.build()?;
                    self.groups = Some(open(&lookup));
                    self.base.goto(GroupState::Yield);
                }
                Some(GroupState::Yield) => {
                    let groups = open_cursor(&mut self.groups)?;
                    if !groups.move_next()? {
                        self.close();
                        return Ok(false);
                    }
                    let value = (self.result_selector)(current_of(groups)?)?;
                    return self.base.yield_value(value);
                }
                None => return Ok(false),
            }
        }
    }
}

impl<T, K, E, R> Enumerator for GroupBy<T, K, E, R>
where
    T: Clone + 'static,
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
        self.groups = None;
        self.base.close();
    }
}

impl<T, K, E, R> Stage for GroupBy<T, K, E, R>
where
    T: Clone + 'static,
    K: Clone + 'static,
    E: Clone + 'static,
    R: Clone + 'static,
{
    fn clone_stage(&self) -> Self {
        Self {
            source: self.source.clone(),
            key_selector: Rc::clone(&self.key_selector),
            element_selector: Rc::clone(&self.element_selector),
            result_selector: Rc::clone(&self.result_selector),
            comparer: Rc::clone(&self.comparer),
            base: IteratorBase::new(),
            groups: None,
        }
    }

    fn claim(&mut self) {
        self.base.claim();
    }

    fn count(&self) -> LinqResult<usize> {
        Ok(self.build()?.len())
    }

    fn to_vec(&self) -> LinqResult<Vec<R>> {
        let lookup = self.build()?;
        let mut out = Vec::with_capacity(lookup.len());
        for grouping in lookup.groupings() {
            out.push((self.result_selector)(grouping)?);
        }
        Ok(out)
    }
}

impl<T: Clone + 'static> Seq<T> {
    fn grouped<K, E, R>(
        &self,
        key_selector: Selector<T, K>,
        element_selector: Selector<T, E>,
        result_selector: Selector<Grouping<K, E>, R>,
        comparer: SharedComparer<K>,
    ) -> Seq<R>
    where
        K: Clone + 'static,
        E: Clone + 'static,
        R: Clone + 'static,
    {
        Seq::from_stage(GroupBy {
            source: self.clone(),
            key_selector,
            element_selector,
            result_selector,
            comparer,
            base: IteratorBase::new(),
            groups: None,
        })
    }

    /// Group elements by key, in first-seen key order.
    pub fn group_by<K, F>(&self, key_selector: F) -> Seq<Grouping<K, T>>
    where
        K: Eq + Hash + Clone + 'static,
        F: Fn(&T) -> K + 'static,
    {
        self.try_group_by(move |item| Ok(key_selector(item)), default_comparer())
    }

    pub fn try_group_by<K, F>(
        &self,
        key_selector: F,
        comparer: SharedComparer<K>,
    ) -> Seq<Grouping<K, T>>
    where
        K: Clone + 'static,
        F: Fn(&T) -> LinqResult<K> + 'static,
    {
        self.grouped(
            Rc::new(key_selector),
            Rc::new(|item: &T| Ok(item.clone())),
            Rc::new(|grouping: &Grouping<K, T>| Ok(grouping.clone())),
            comparer,
        )
    }

    /// Group `element_selector(item)` by `key_selector(item)`.
    pub fn group_by_element<K, E, FK, FE>(
        &self,
        key_selector: FK,
        element_selector: FE,
    ) -> Seq<Grouping<K, E>>
    where
        K: Eq + Hash + Clone + 'static,
        E: Clone + 'static,
        FK: Fn(&T) -> K + 'static,
        FE: Fn(&T) -> E + 'static,
    {
        self.grouped(
            Rc::new(move |item: &T| Ok(key_selector(item))),
            Rc::new(move |item: &T| Ok(element_selector(item))),
            Rc::new(|grouping: &Grouping<K, E>| Ok(grouping.clone())),
            default_comparer(),
        )
    }

    /// Group, then map every key and its elements to one result.
    pub fn group_by_result<K, E, R, FK, FE, FR>(
        &self,
        key_selector: FK,
        element_selector: FE,
        result_selector: FR,
    ) -> Seq<R>
    where
        K: Eq + Hash + Clone + 'static,
        E: Clone + 'static,
        R: Clone + 'static,
        FK: Fn(&T) -> K + 'static,
        FE: Fn(&T) -> E + 'static,
        FR: Fn(&K, Seq<E>) -> R + 'static,
    {
        self.try_group_by_result(
            move |item| Ok(key_selector(item)),
            move |item| Ok(element_selector(item)),
            move |key, elements| Ok(result_selector(key, elements)),
            default_comparer(),
        )
    }

    pub fn try_group_by_result<K, E, R, FK, FE, FR>(
        &self,
        key_selector: FK,
        element_selector: FE,
        result_selector: FR,
        comparer: SharedComparer<K>,
    ) -> Seq<R>
    where
        K: Clone + 'static,
        E: Clone + 'static,
        R: Clone + 'static,
        FK: Fn(&T) -> LinqResult<K> + 'static,
        FE: Fn(&T) -> LinqResult<E> + 'static,
        FR: Fn(&K, Seq<E>) -> LinqResult<R> + 'static,
    {
        self.grouped(
            Rc::new(key_selector),
            Rc::new(element_selector),
            Rc::new(move |grouping: &Grouping<K, E>| {
                result_selector(grouping.key(), grouping.to_seq())
            }),
            comparer,
        )
    }
}
