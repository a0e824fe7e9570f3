//! Hash joins.
//!
//! Every join drains its inner sequence into a [`Lookup`] on the first advance and then streams the
//! outer sequence. Key selectors return `Option<K>`; a `None` key never matches anything.
//! Inner, left and group joins build the lookup with [`Lookup::create_for_join`], which drops
//! `None`-keyed inner elements. The full join keeps them in the lookup's null-key grouping so they
//! come back out as unmatched inner rows.

use crate::comparer::{default_comparer, SharedComparer};
use crate::enumerator::{current_of, Enumerator, ScopedCursor};
use crate::error::{LinqError, LinqResult};
use crate::iterator::{guarded, open_cursor, reopen, IteratorBase, Stage};
use crate::lookup::{Grouping, Lookup};
use crate::seq::{Selector, Seq};
use crate::sources::empty;
use std::hash::Hash;
use std::rc::Rc;

type RowSelector<T, I, R> = Rc<dyn Fn(&T, Option<&I>) -> LinqResult<R>>;
type GroupSelector<T, I, R> = Rc<dyn Fn(&T, Seq<I>) -> LinqResult<R>>;
type FullRowSelector<T, I, R> = Rc<dyn Fn(Option<&T>, Option<&I>) -> LinqResult<R>>;

/// Immutable configuration shared by all join stages.
struct JoinKeys<T, I, K> {
    inner: Seq<I>,
    outer_key: Selector<T, Option<K>>,
    inner_key: Selector<I, Option<K>>,
    comparer: SharedComparer<K>,
}

impl<T, I, K> Clone for JoinKeys<T, I, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            outer_key: Rc::clone(&self.outer_key),
            inner_key: Rc::clone(&self.inner_key),
            comparer: Rc::clone(&self.comparer),
        }
    }
}

impl<T, I, K> JoinKeys<T, I, K>
where
    I: Clone + 'static,
    K: Clone + 'static,
{
    fn lookup(&self) -> LinqResult<Lookup<K, I>> {
        let inner_key = &self.inner_key;
        Lookup::create_for_join(&self.inner, |item| inner_key(item), Rc::clone(&self.comparer))
    }

    fn full_lookup(&self) -> LinqResult<Lookup<Option<K>, I>> {
        let inner_key = &self.inner_key;
        Lookup::create_for_full_join(&self.inner, |item| inner_key(item), Rc::clone(&self.comparer))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Unmatched {
    /// Inner join: outer rows without a match produce nothing.
    Skip,
    /// Left join: outer rows without a match produce one row with no inner element.
    Keep,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum JoinState {
    #[default]
    Start,
    Match,
    Emit,
    Advance,
}

struct EquiJoin<T, I, K, R> {
    outer_source: Seq<T>,
    keys: JoinKeys<T, I, K>,
    result_selector: RowSelector<T, I, R>,
    unmatched: Unmatched,
    base: IteratorBase<R, JoinState>,
    outer: Option<ScopedCursor<T>>,
    lookup: Option<Lookup<K, I>>,
    group: Option<Grouping<K, I>>,
    position: usize,
}

impl<T, I, K, R> EquiJoin<T, I, K, R>
where
    T: Clone + 'static,
    I: Clone + 'static,
    K: Clone + 'static,
    R: Clone + 'static,
{
    fn advance(&mut self) -> LinqResult<bool> {
        loop {
            match self.base.state() {
                Some(JoinState::Start) => {
                    reopen(&mut self.outer, &self.outer_source);
                    if !open_cursor(&mut self.outer)?.move_next()? {
                        self.close();
                        return Ok(false);
                    }
                    let lookup = self.keys.lookup()?;
                    if lookup.is_empty() && self.unmatched == Unmatched::Skip {
                        self.close();
                        return Ok(false);
                    }
                    self.lookup = Some(lookup);
                    self.base.goto(JoinState::Match);
                }
                Some(JoinState::Match) => {
                    let outer = open_cursor(&mut self.outer)?;
                    let item = current_of(outer)?;
                    self.group = match ((self.keys.outer_key)(item)?, &self.lookup) {
                        (Some(key), Some(lookup)) => lookup.grouping(&key).cloned(),
                        _ => None,
                    };
                    self.position = 0;
                    if self.group.is_some() {
                        self.base.goto(JoinState::Emit);
                        continue;
                    }
                    self.base.goto(JoinState::Advance);
                    if self.unmatched == Unmatched::Keep {
                        let value = (self.result_selector)(item, None)?;
                        return self.base.yield_value(value);
                    }
                }
                Some(JoinState::Emit) => {
                    let Some(inner) = self
                        .group
                        .as_ref()
                        .and_then(|group| group.elements().get(self.position))
                    else {
                        self.base.goto(JoinState::Advance);
                        continue;
                    };
                    self.position += 1;
                    let outer = open_cursor(&mut self.outer)?;
                    let value = (self.result_selector)(current_of(outer)?, Some(inner))?;
                    return self.base.yield_value(value);
                }
                Some(JoinState::Advance) => {
                    if !open_cursor(&mut self.outer)?.move_next()? {
                        self.close();
                        return Ok(false);
                    }
                    self.base.goto(JoinState::Match);
                }
                None => return Ok(false),
            }
        }
    }
}

impl<T, I, K, R> Enumerator for EquiJoin<T, I, K, R>
where
    T: Clone + 'static,
    I: Clone + 'static,
    K: Clone + 'static,
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
        self.outer = None;
        self.lookup = None;
        self.group = None;
        self.base.close();
    }
}

impl<T, I, K, R> Stage for EquiJoin<T, I, K, R>
where
    T: Clone + 'static,
    I: Clone + 'static,
    K: Clone + 'static,
    R: Clone + 'static,
{
    fn clone_stage(&self) -> Self {
        Self {
            outer_source: self.outer_source.clone(),
            keys: self.keys.clone(),
            result_selector: Rc::clone(&self.result_selector),
            unmatched: self.unmatched,
            base: IteratorBase::new(),
            outer: None,
            lookup: None,
            group: None,
            position: 0,
        }
    }

    fn claim(&mut self) {
        self.base.claim();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum GroupJoinState {
    #[default]
    Start,
    Pull,
}

struct GroupJoin<T, I, K, R> {
    outer_source: Seq<T>,
    keys: JoinKeys<T, I, K>,
    result_selector: GroupSelector<T, I, R>,
    base: IteratorBase<R, GroupJoinState>,
    outer: Option<ScopedCursor<T>>,
    lookup: Option<Lookup<K, I>>,
}

impl<T, I, K, R> GroupJoin<T, I, K, R>
where
    T: Clone + 'static,
    I: Clone + 'static,
    K: Clone + 'static,
    R: Clone + 'static,
{
    fn advance(&mut self) -> LinqResult<bool> {
        match self.base.state() {
            Some(GroupJoinState::Start) => {
                reopen(&mut self.outer, &self.outer_source);
                if !open_cursor(&mut self.outer)?.move_next()? {
                    self.close();
                    return Ok(false);
                }
                self.lookup = Some(self.keys.lookup()?);
                self.base.goto(GroupJoinState::Pull);
            }
            Some(GroupJoinState::Pull) => {
                if !open_cursor(&mut self.outer)?.move_next()? {
                    self.close();
                    return Ok(false);
                }
            }
            None => return Ok(false),
        }
        self.yield_current()
    }

    fn yield_current(&mut self) -> LinqResult<bool> {
        let outer = open_cursor(&mut self.outer)?;
        let item = current_of(outer)?;
        let elements = match ((self.keys.outer_key)(item)?, &self.lookup) {
            (Some(key), Some(lookup)) => lookup.get(&key),
            _ => empty(),
        };
        let value = (self.result_selector)(item, elements)?;
        self.base.yield_value(value)
    }
}

impl<T, I, K, R> Enumerator for GroupJoin<T, I, K, R>
where
    T: Clone + 'static,
    I: Clone + 'static,
    K: Clone + 'static,
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
        self.outer = None;
        self.lookup = None;
        self.base.close();
    }
}

impl<T, I, K, R> Stage for GroupJoin<T, I, K, R>
where
    T: Clone + 'static,
    I: Clone + 'static,
    K: Clone + 'static,
    R: Clone + 'static,
{
    fn clone_stage(&self) -> Self {
        Self {
            outer_source: self.outer_source.clone(),
            keys: self.keys.clone(),
            result_selector: Rc::clone(&self.result_selector),
            base: IteratorBase::new(),
            outer: None,
            lookup: None,
        }
    }

    fn claim(&mut self) {
        self.base.claim();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum FullJoinState {
    #[default]
    Start,
    Advance,
    Match,
    Emit,
    OpenUnfetched,
    PullUnfetched,
    EmitUnfetched,
}

struct FullJoin<T, I, K, R> {
    outer_source: Seq<T>,
    keys: JoinKeys<T, I, K>,
    result_selector: FullRowSelector<T, I, R>,
    base: IteratorBase<R, FullJoinState>,
    outer: Option<ScopedCursor<T>>,
    lookup: Option<Lookup<Option<K>, I>>,
    unfetched: Option<ScopedCursor<Grouping<Option<K>, I>>>,
    group: Option<Grouping<Option<K>, I>>,
    position: usize,
}

impl<T, I, K, R> FullJoin<T, I, K, R>
where
    T: Clone + 'static,
    I: Clone + 'static,
    K: Clone + 'static,
    R: Clone + 'static,
{
    fn next_in_group(&mut self) -> Option<I> {
        let inner = self.group.as_ref()?.elements().get(self.position)?.clone();
        self.position += 1;
        Some(inner)
    }

    fn advance(&mut self) -> LinqResult<bool> {
        loop {
            match self.base.state() {
                Some(FullJoinState::Start) => {
                    self.lookup = Some(self.keys.full_lookup()?);
                    reopen(&mut self.outer, &self.outer_source);
                    self.base.goto(FullJoinState::Advance);
                }
                Some(FullJoinState::Advance) => {
                    if open_cursor(&mut self.outer)?.move_next()? {
                        self.base.goto(FullJoinState::Match);
                    } else {
                        self.outer = None;
                        self.base.goto(FullJoinState::OpenUnfetched);
                    }
                }
                Some(FullJoinState::Match) => {
                    let outer = open_cursor(&mut self.outer)?;
                    let item = current_of(outer)?;
                    let key = (self.keys.outer_key)(item)?;
                    self.group = self
                        .lookup
                        .as_ref()
                        .and_then(|lookup| lookup.fetch_grouping(&key))
                        .cloned();
                    self.position = 0;
                    if self.group.is_some() {
                        self.base.goto(FullJoinState::Emit);
                        continue;
                    }
                    self.base.goto(FullJoinState::Advance);
                    let value = (self.result_selector)(Some(item), None)?;
                    return self.base.yield_value(value);
                }
                Some(FullJoinState::Emit) => {
                    let Some(inner) = self.next_in_group() else {
                        self.base.goto(FullJoinState::Advance);
                        continue;
                    };
                    let outer = open_cursor(&mut self.outer)?;
                    let value = (self.result_selector)(Some(current_of(outer)?), Some(&inner))?;
                    return self.base.yield_value(value);
                }
                Some(FullJoinState::OpenUnfetched) => {
                    let lookup = self.lookup.as_ref().ok_or_else(|| {
                        LinqError::InvalidOperation("full join lookup was not built".into())
                    })?;
                    self.unfetched = Some(ScopedCursor::new(lookup.unfetched_enumerator()));
                    self.base.goto(FullJoinState::PullUnfetched);
                }
                Some(FullJoinState::PullUnfetched) => {
                    let unfetched = open_cursor(&mut self.unfetched)?;
                    if !unfetched.move_next()? {
                        self.close();
                        return Ok(false);
                    }
                    self.group = Some(current_of(unfetched)?.clone());
                    self.position = 0;
                    self.base.goto(FullJoinState::EmitUnfetched);
                }
                Some(FullJoinState::EmitUnfetched) => {
                    let Some(inner) = self.next_in_group() else {
                        self.base.goto(FullJoinState::PullUnfetched);
                        continue;
                    };
                    let value = (self.result_selector)(None, Some(&inner))?;
                    return self.base.yield_value(value);
                }
                None => return Ok(false),
            }
        }
    }
}

impl<T, I, K, R> Enumerator for FullJoin<T, I, K, R>
where
    T: Clone + 'static,
    I: Clone + 'static,
    K: Clone + 'static,
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
        self.outer = None;
        self.unfetched = None;
        self.lookup = None;
        self.group = None;
        self.base.close();
    }
}

impl<T, I, K, R> Stage for FullJoin<T, I, K, R>
where
    T: Clone + 'static,
    I: Clone + 'static,
    K: Clone + 'static,
    R: Clone + 'static,
{
    fn clone_stage(&self) -> Self {
        Self {
            outer_source: self.outer_source.clone(),
            keys: self.keys.clone(),
            result_selector: Rc::clone(&self.result_selector),
            base: IteratorBase::new(),
            outer: None,
            lookup: None,
            unfetched: None,
            group: None,
            position: 0,
        }
    }

    fn claim(&mut self) {
        self.base.claim();
    }
}

fn natural_keys<T, I, K, FO, FI>(inner: &Seq<I>, outer_key: FO, inner_key: FI) -> JoinKeys<T, I, K>
where
    T: 'static,
    I: 'static,
    K: Eq + Hash + 'static,
    FO: Fn(&T) -> K + 'static,
    FI: Fn(&I) -> K + 'static,
{
    JoinKeys {
        inner: inner.clone(),
        outer_key: Rc::new(move |item: &T| Ok(Some(outer_key(item)))),
        inner_key: Rc::new(move |item: &I| Ok(Some(inner_key(item)))),
        comparer: default_comparer(),
    }
}

fn keys_with<T, I, K, FO, FI>(
    inner: &Seq<I>,
    outer_key: FO,
    inner_key: FI,
    comparer: SharedComparer<K>,
) -> JoinKeys<T, I, K>
where
    T: 'static,
    I: 'static,
    FO: Fn(&T) -> LinqResult<Option<K>> + 'static,
    FI: Fn(&I) -> LinqResult<Option<K>> + 'static,
{
    JoinKeys {
        inner: inner.clone(),
        outer_key: Rc::new(outer_key),
        inner_key: Rc::new(inner_key),
        comparer,
    }
}

impl<T: Clone + 'static> Seq<T> {
    fn equi_join<I, K, R>(
        &self,
        keys: JoinKeys<T, I, K>,
        result_selector: RowSelector<T, I, R>,
        unmatched: Unmatched,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Clone + 'static,
        R: Clone + 'static,
    {
        Seq::from_stage(EquiJoin {
            outer_source: self.clone(),
            keys,
            result_selector,
            unmatched,
            base: IteratorBase::new(),
            outer: None,
            lookup: None,
            group: None,
            position: 0,
        })
    }

    fn grouped_join<I, K, R>(
        &self,
        keys: JoinKeys<T, I, K>,
        result_selector: GroupSelector<T, I, R>,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Clone + 'static,
        R: Clone + 'static,
    {
        Seq::from_stage(GroupJoin {
            outer_source: self.clone(),
            keys,
            result_selector,
            base: IteratorBase::new(),
            outer: None,
            lookup: None,
        })
    }

    fn outer_join<I, K, R>(
        &self,
        keys: JoinKeys<T, I, K>,
        result_selector: FullRowSelector<T, I, R>,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Clone + 'static,
        R: Clone + 'static,
    {
        Seq::from_stage(FullJoin {
            outer_source: self.clone(),
            keys,
            result_selector,
            base: IteratorBase::new(),
            outer: None,
            lookup: None,
            unfetched: None,
            group: None,
            position: 0,
        })
    }

    /// Inner equi-join: one row per matching (outer, inner) pair, in outer order.
    pub fn join<I, K, R, FO, FI, FR>(
        &self,
        inner: &Seq<I>,
        outer_key: FO,
        inner_key: FI,
        result_selector: FR,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        R: Clone + 'static,
        FO: Fn(&T) -> K + 'static,
        FI: Fn(&I) -> K + 'static,
        FR: Fn(&T, &I) -> R + 'static,
    {
        self.equi_join(
            natural_keys(inner, outer_key, inner_key),
            Rc::new(move |outer: &T, inner: Option<&I>| match inner {
                Some(inner) => Ok(result_selector(outer, inner)),
                None => Err(unmatched_inner_row()),
            }),
            Unmatched::Skip,
        )
    }

    pub fn try_join<I, K, R, FO, FI, FR>(
        &self,
        inner: &Seq<I>,
        outer_key: FO,
        inner_key: FI,
        result_selector: FR,
        comparer: SharedComparer<K>,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Clone + 'static,
        R: Clone + 'static,
        FO: Fn(&T) -> LinqResult<Option<K>> + 'static,
        FI: Fn(&I) -> LinqResult<Option<K>> + 'static,
        FR: Fn(&T, &I) -> LinqResult<R> + 'static,
    {
        self.equi_join(
            keys_with(inner, outer_key, inner_key, comparer),
            Rc::new(move |outer: &T, inner: Option<&I>| match inner {
                Some(inner) => result_selector(outer, inner),
                None => Err(unmatched_inner_row()),
            }),
            Unmatched::Skip,
        )
    }

    /// Left outer join: unmatched outer elements produce one row with `None` inner.
    pub fn left_join<I, K, R, FO, FI, FR>(
        &self,
        inner: &Seq<I>,
        outer_key: FO,
        inner_key: FI,
        result_selector: FR,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        R: Clone + 'static,
        FO: Fn(&T) -> K + 'static,
        FI: Fn(&I) -> K + 'static,
        FR: Fn(&T, Option<&I>) -> R + 'static,
    {
        self.equi_join(
            natural_keys(inner, outer_key, inner_key),
            Rc::new(move |outer: &T, inner: Option<&I>| Ok(result_selector(outer, inner))),
            Unmatched::Keep,
        )
    }

    pub fn try_left_join<I, K, R, FO, FI, FR>(
        &self,
        inner: &Seq<I>,
        outer_key: FO,
        inner_key: FI,
        result_selector: FR,
        comparer: SharedComparer<K>,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Clone + 'static,
        R: Clone + 'static,
        FO: Fn(&T) -> LinqResult<Option<K>> + 'static,
        FI: Fn(&I) -> LinqResult<Option<K>> + 'static,
        FR: Fn(&T, Option<&I>) -> LinqResult<R> + 'static,
    {
        self.equi_join(
            keys_with(inner, outer_key, inner_key, comparer),
            Rc::new(result_selector),
            Unmatched::Keep,
        )
    }

    /// Each outer element paired with its (possibly empty) sequence of matching inner elements.
    pub fn group_join<I, K, R, FO, FI, FR>(
        &self,
        inner: &Seq<I>,
        outer_key: FO,
        inner_key: FI,
        result_selector: FR,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        R: Clone + 'static,
        FO: Fn(&T) -> K + 'static,
        FI: Fn(&I) -> K + 'static,
        FR: Fn(&T, Seq<I>) -> R + 'static,
    {
        self.grouped_join(
            natural_keys(inner, outer_key, inner_key),
            Rc::new(move |outer: &T, group: Seq<I>| Ok(result_selector(outer, group))),
        )
    }

    pub fn try_group_join<I, K, R, FO, FI, FR>(
        &self,
        inner: &Seq<I>,
        outer_key: FO,
        inner_key: FI,
        result_selector: FR,
        comparer: SharedComparer<K>,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Clone + 'static,
        R: Clone + 'static,
        FO: Fn(&T) -> LinqResult<Option<K>> + 'static,
        FI: Fn(&I) -> LinqResult<Option<K>> + 'static,
        FR: Fn(&T, Seq<I>) -> LinqResult<R> + 'static,
    {
        self.grouped_join(
            keys_with(inner, outer_key, inner_key, comparer),
            Rc::new(result_selector),
        )
    }

    /// Full outer join: matched rows and unmatched outer rows in outer order, then every inner
    /// element that matched nothing (including `None`-keyed ones) in first-seen key order.
    pub fn full_join<I, K, R, FO, FI, FR>(
        &self,
        inner: &Seq<I>,
        outer_key: FO,
        inner_key: FI,
        result_selector: FR,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Eq + Hash + Clone + 'static,
        R: Clone + 'static,
        FO: Fn(&T) -> K + 'static,
        FI: Fn(&I) -> K + 'static,
        FR: Fn(Option<&T>, Option<&I>) -> R + 'static,
    {
        self.outer_join(
            natural_keys(inner, outer_key, inner_key),
            Rc::new(move |outer: Option<&T>, inner: Option<&I>| Ok(result_selector(outer, inner))),
        )
    }

    pub fn try_full_join<I, K, R, FO, FI, FR>(
        &self,
        inner: &Seq<I>,
        outer_key: FO,
        inner_key: FI,
        result_selector: FR,
        comparer: SharedComparer<K>,
    ) -> Seq<R>
    where
        I: Clone + 'static,
        K: Clone + 'static,
        R: Clone + 'static,
        FO: Fn(&T) -> LinqResult<Option<K>> + 'static,
        FI: Fn(&I) -> LinqResult<Option<K>> + 'static,
        FR: Fn(Option<&T>, Option<&I>) -> LinqResult<R> + 'static,
    {
        self.outer_join(
            keys_with(inner, outer_key, inner_key, comparer),
            Rc::new(result_selector),
        )
    }
}

fn unmatched_inner_row() -> LinqError {
    LinqError::InvalidOperation("inner join produced a row without a matching element".into())
}
