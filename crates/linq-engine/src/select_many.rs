//! Flattening stages.
//!
//! Streaming walks `OpenOuter -> PullOuter -> PullInner`, returning to `PullOuter` each time an
//! inner sequence runs dry. The plain and indexed flavors also materialize in bulk: one pass over
//! the outer sequence reserves a region for every inner sequence with a cheap count and appends the
//! rest on the spot; a second pass copies only the reserved inner sequences into their regions.

use crate::array_builder::ArrayBuilder;
use crate::enumerator::{copy_into_slots, current_of, open, Enumerator, ScopedCursor};
use crate::error::{checked_add, LinqResult};
use crate::iterator::{guarded, open_cursor, reopen, IteratorBase, Stage};
use crate::seq::{Selector, Seq};
use crate::sparse_array_builder::{into_filled, SparseArrayBuilder};
use std::rc::Rc;

type IndexedSelector<T, R> = Rc<dyn Fn(&T, usize) -> LinqResult<R>>;
type Combiner<T, C, R> = Rc<dyn Fn(&T, &C) -> LinqResult<R>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum FlattenState {
    #[default]
    OpenOuter,
    PullOuter,
    PullInner,
}

/// Maps an outer element (and its position) to its inner sequence.
enum CollectionSelector<T, C> {
    Plain(Selector<T, Seq<C>>),
    Indexed(IndexedSelector<T, Seq<C>>),
}

impl<T, C> Clone for CollectionSelector<T, C> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(selector) => Self::Plain(Rc::clone(selector)),
            Self::Indexed(selector) => Self::Indexed(Rc::clone(selector)),
        }
    }
}

impl<T, C> CollectionSelector<T, C> {
    /// Apply the selector to the next outer element, advancing `position`.
    fn apply(&self, item: &T, position: &mut usize) -> LinqResult<Seq<C>> {
        let index = *position;
        *position = checked_add(index, 1, "select_many index")?;
        match self {
            Self::Plain(selector) => selector(item),
            Self::Indexed(selector) => selector(item, index),
        }
    }
}

struct SelectMany<T, R> {
    source: Seq<T>,
    collection: CollectionSelector<T, R>,
    base: IteratorBase<R, FlattenState>,
    outer: Option<ScopedCursor<T>>,
    inner: Option<ScopedCursor<R>>,
    position: usize,
}

impl<T: Clone + 'static, R: Clone + 'static> SelectMany<T, R> {
    fn advance(&mut self) -> LinqResult<bool> {
        loop {
            match self.base.state() {
                Some(FlattenState::OpenOuter) => {
                    reopen(&mut self.outer, &self.source);
                    self.base.goto(FlattenState::PullOuter);
                }
                Some(FlattenState::PullOuter) => {
                    let outer = open_cursor(&mut self.outer)?;
                    if !outer.move_next()? {
                        self.close();
                        return Ok(false);
                    }
                    let inner = self
                        .collection
                        .apply(current_of(outer)?, &mut self.position)?;
                    reopen(&mut self.inner, &inner);
                    self.base.goto(FlattenState::PullInner);
                }
                Some(FlattenState::PullInner) => {
                    let inner = open_cursor(&mut self.inner)?;
                    if inner.move_next()? {
                        let value = current_of(inner)?.clone();
                        return self.base.yield_value(value);
                    }
                    self.inner = None;
                    self.base.goto(FlattenState::PullOuter);
                }
                None => return Ok(false),
            }
        }
    }
}

impl<T: Clone + 'static, R: Clone + 'static> Enumerator for SelectMany<T, R> {
    type Item = R;

    fn move_next(&mut self) -> LinqResult<bool> {
        guarded(self, Self::advance)
    }

    fn current(&self) -> Option<&R> {
        self.base.current()
    }

    fn close(&mut self) {
        self.outer = None;
        self.inner = None;
        self.base.close();
    }
}

impl<T: Clone + 'static, R: Clone + 'static> Stage for SelectMany<T, R> {
    fn clone_stage(&self) -> Self {
        Self {
            source: self.source.clone(),
            collection: self.collection.clone(),
            base: IteratorBase::new(),
            outer: None,
            inner: None,
            position: 0,
        }
    }

    fn claim(&mut self) {
        self.base.claim();
    }

    fn count(&self) -> LinqResult<usize> {
        let mut outer = open(&self.source);
        let mut position = 0usize;
        let mut total = 0usize;
        while outer.move_next()? {
            let inner = self.collection.apply(current_of(&outer)?, &mut position)?;
            total = checked_add(total, inner.count()?, "select_many count")?;
        }
        Ok(total)
    }

    fn to_vec(&self) -> LinqResult<Vec<R>> {
        let mut builder = SparseArrayBuilder::new();
        let mut deferred: ArrayBuilder<Seq<R>> = ArrayBuilder::new();
        {
            let mut outer = open(&self.source);
            let mut position = 0usize;
            while outer.move_next()? {
                let inner = self.collection.apply(current_of(&outer)?, &mut position)?;
                if builder.reserve_or_add(&inner)? {
                    deferred.add(inner);
                }
            }
        }

        let (mut slots, markers) = builder.finish()?;
        debug_assert_eq!(markers.len(), deferred.len());
        for (marker, inner) in markers.iter().zip(deferred.iter()) {
            copy_into_slots(inner, &mut slots, marker.index, marker.count)?;
        }
        into_filled(slots)
    }
}

/// Flattening that pairs every inner element with the outer element it came from.
struct SelectManyResult<T, C, R> {
    source: Seq<T>,
    collection: CollectionSelector<T, C>,
    result_selector: Combiner<T, C, R>,
    base: IteratorBase<R, FlattenState>,
    outer: Option<ScopedCursor<T>>,
    inner: Option<ScopedCursor<C>>,
    position: usize,
}

impl<T, C, R> SelectManyResult<T, C, R>
where
    T: Clone + 'static,
    C: Clone + 'static,
    R: Clone + 'static,
{
    fn advance(&mut self) -> LinqResult<bool> {
        loop {
            match self.base.state() {
                Some(FlattenState::OpenOuter) => {
                    reopen(&mut self.outer, &self.source);
                    self.base.goto(FlattenState::PullOuter);
                }
                Some(FlattenState::PullOuter) => {
                    let outer = open_cursor(&mut self.outer)?;
                    if !outer.move_next()? {
                        self.close();
                        return Ok(false);
                    }
                    let inner = self
                        .collection
                        .apply(current_of(outer)?, &mut self.position)?;
                    reopen(&mut self.inner, &inner);
                    self.base.goto(FlattenState::PullInner);
                }
                Some(FlattenState::PullInner) => {
                    let inner = open_cursor(&mut self.inner)?;
                    if inner.move_next()? {
                        let outer = open_cursor(&mut self.outer)?;
                        let value =
                            (self.result_selector)(current_of(outer)?, current_of(inner)?)?;
                        return self.base.yield_value(value);
                    }
                    self.inner = None;
                    self.base.goto(FlattenState::PullOuter);
                }
                None => return Ok(false),
            }
        }
    }
}

impl<T, C, R> Enumerator for SelectManyResult<T, C, R>
where
    T: Clone + 'static,
    C: Clone + 'static,
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
        self.inner = None;
        self.base.close();
    }
}

impl<T, C, R> Stage for SelectManyResult<T, C, R>
where
    T: Clone + 'static,
    C: Clone + 'static,
    R: Clone + 'static,
{
    fn clone_stage(&self) -> Self {
        Self {
            source: self.source.clone(),
            collection: self.collection.clone(),
            result_selector: Rc::clone(&self.result_selector),
            base: IteratorBase::new(),
            outer: None,
            inner: None,
            position: 0,
        }
    }

    fn claim(&mut self) {
        self.base.claim();
    }
}

impl<T: Clone + 'static> Seq<T> {
    fn flatten<R: Clone + 'static>(&self, collection: CollectionSelector<T, R>) -> Seq<R> {
        Seq::from_stage(SelectMany {
            source: self.clone(),
            collection,
            base: IteratorBase::new(),
            outer: None,
            inner: None,
            position: 0,
        })
    }

    fn flatten_with<C, R>(
        &self,
        collection: CollectionSelector<T, C>,
        result_selector: Combiner<T, C, R>,
    ) -> Seq<R>
    where
        C: Clone + 'static,
        R: Clone + 'static,
    {
        Seq::from_stage(SelectManyResult {
            source: self.clone(),
            collection,
            result_selector,
            base: IteratorBase::new(),
            outer: None,
            inner: None,
            position: 0,
        })
    }

    /// Map each element to a sequence and concatenate the results in order.
    pub fn select_many<R, F>(&self, selector: F) -> Seq<R>
    where
        R: Clone + 'static,
        F: Fn(&T) -> Seq<R> + 'static,
    {
        self.try_select_many(move |item| Ok(selector(item)))
    }

    pub fn try_select_many<R, F>(&self, selector: F) -> Seq<R>
    where
        R: Clone + 'static,
        F: Fn(&T) -> LinqResult<Seq<R>> + 'static,
    {
        self.flatten(CollectionSelector::Plain(Rc::new(selector)))
    }

    /// Like [`Seq::select_many`], also passing each element's zero-based position.
    pub fn select_many_indexed<R, F>(&self, selector: F) -> Seq<R>
    where
        R: Clone + 'static,
        F: Fn(&T, usize) -> Seq<R> + 'static,
    {
        self.try_select_many_indexed(move |item, index| Ok(selector(item, index)))
    }

    pub fn try_select_many_indexed<R, F>(&self, selector: F) -> Seq<R>
    where
        R: Clone + 'static,
        F: Fn(&T, usize) -> LinqResult<Seq<R>> + 'static,
    {
        self.flatten(CollectionSelector::Indexed(Rc::new(selector)))
    }

    /// Flatten and combine every inner element with its outer element.
    pub fn select_many_with<C, R, FC, FR>(
        &self,
        collection_selector: FC,
        result_selector: FR,
    ) -> Seq<R>
    where
        C: Clone + 'static,
        R: Clone + 'static,
        FC: Fn(&T) -> Seq<C> + 'static,
        FR: Fn(&T, &C) -> R + 'static,
    {
        self.try_select_many_with(
            move |item| Ok(collection_selector(item)),
            move |outer, inner| Ok(result_selector(outer, inner)),
        )
    }

    pub fn try_select_many_with<C, R, FC, FR>(
        &self,
        collection_selector: FC,
        result_selector: FR,
    ) -> Seq<R>
    where
        C: Clone + 'static,
        R: Clone + 'static,
        FC: Fn(&T) -> LinqResult<Seq<C>> + 'static,
        FR: Fn(&T, &C) -> LinqResult<R> + 'static,
    {
        self.flatten_with(
            CollectionSelector::Plain(Rc::new(collection_selector)),
            Rc::new(result_selector),
        )
    }

    pub fn select_many_indexed_with<C, R, FC, FR>(
        &self,
        collection_selector: FC,
        result_selector: FR,
    ) -> Seq<R>
    where
        C: Clone + 'static,
        R: Clone + 'static,
        FC: Fn(&T, usize) -> Seq<C> + 'static,
        FR: Fn(&T, &C) -> R + 'static,
    {
        self.try_select_many_indexed_with(
            move |item, index| Ok(collection_selector(item, index)),
            move |outer, inner| Ok(result_selector(outer, inner)),
        )
    }

    pub fn try_select_many_indexed_with<C, R, FC, FR>(
        &self,
        collection_selector: FC,
        result_selector: FR,
    ) -> Seq<R>
    where
        C: Clone + 'static,
        R: Clone + 'static,
        FC: Fn(&T, usize) -> LinqResult<Seq<C>> + 'static,
        FR: Fn(&T, &C) -> LinqResult<R> + 'static,
    {
        self.flatten_with(
            CollectionSelector::Indexed(Rc::new(collection_selector)),
            Rc::new(result_selector),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::sources::{of, repeat};
    use pretty_assertions::assert_eq;

    #[test]
    fn bulk_path_mixes_reserved_and_appended_regions() {
        let seq = of(vec![1, 2, 3, 4]).select_many(|&x| {
            if x % 2 == 0 {
                repeat(x, x as usize)
            } else {
                repeat(x, x as usize).where_(|_| true)
            }
        });
        let expected = vec![1, 2, 2, 3, 3, 3, 4, 4, 4, 4];
        assert_eq!(seq.to_vec().unwrap(), expected);
        assert_eq!(seq.count().unwrap(), expected.len());
        assert_eq!(seq.cheap_count(), None);
    }

    #[test]
    fn indexed_selector_sees_positions() {
        let seq = of(vec!["a", "b", "c"]).select_many_indexed(|s, i| repeat(s.to_string(), i));
        assert_eq!(seq.to_vec().unwrap(), vec!["b", "c", "c"]);
    }

    #[test]
    fn result_combiner_pairs_with_outer() {
        let seq =
            of(vec![10, 20]).select_many_with(|_| of(vec![1, 2]), |outer, inner| outer + inner);
        assert_eq!(seq.to_vec().unwrap(), vec![11, 12, 21, 22]);
    }
}
