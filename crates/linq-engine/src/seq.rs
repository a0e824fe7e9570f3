use crate::enumerator::{
    current_of, list_shrunk, open, BoxEnumerator, Enumerable, Enumerator, ListSource, ScopedCursor,
};
use crate::error::{LinqError, LinqResult};
use crate::iterator::{Stage, StageSeq};
use std::fmt;
use std::rc::Rc;

/// Shared, fallible element transform.
pub(crate) type Selector<T, R> = Rc<dyn Fn(&T) -> LinqResult<R>>;

/// A cheaply cloneable handle to any [`Enumerable`].
///
/// This is the type pipelines are composed from: every operator takes `&self` and returns a new
/// `Seq` describing the deferred computation. Nothing runs until a cursor is advanced or a
/// terminal operation (`to_vec`, `count`, `first`, ...) is called.
pub struct Seq<T> {
    inner: Rc<dyn Enumerable<Item = T>>,
}

impl<T> Clone for Seq<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> fmt::Debug for Seq<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seq")
            .field("cheap_count", &self.inner.cheap_count())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Seq<T> {
    pub fn new<E: Enumerable<Item = T>>(source: E) -> Self {
        Self {
            inner: Rc::new(source),
        }
    }

    pub(crate) fn from_stage<S: Stage<Item = T>>(stage: S) -> Self {
        Self::new(StageSeq::new(stage))
    }

    pub fn enumerator(&self) -> BoxEnumerator<T> {
        self.inner.enumerator()
    }

    /// Iterate with a Rust iterator. Each item is a `LinqResult`; iteration stops after the first
    /// error.
    pub fn iter(&self) -> Iter<T> {
        Iter {
            cursor: open(self.inner.as_ref()),
            done: false,
        }
    }

    pub fn cheap_count(&self) -> Option<usize> {
        self.inner.cheap_count()
    }

    pub fn count(&self) -> LinqResult<usize> {
        self.inner.count()
    }

    /// The count, or `None` when `only_if_cheap` is set and counting would need a full pass.
    pub fn try_get_count(&self, only_if_cheap: bool) -> LinqResult<Option<usize>> {
        match self.inner.cheap_count() {
            Some(count) => Ok(Some(count)),
            None if only_if_cheap => Ok(None),
            None => self.inner.count().map(Some),
        }
    }

    pub fn to_vec(&self) -> LinqResult<Vec<T>> {
        self.inner.to_vec()
    }

    pub fn to_array(&self) -> LinqResult<Box<[T]>> {
        self.inner.to_vec().map(Vec::into_boxed_slice)
    }

    pub fn any(&self) -> LinqResult<bool> {
        if let Some(count) = self.inner.cheap_count() {
            return Ok(count > 0);
        }
        open(self.inner.as_ref()).move_next()
    }

    /// Whether any element satisfies `predicate`. Stops at the first match.
    pub fn any_by<F>(&self, mut predicate: F) -> LinqResult<bool>
    where
        F: FnMut(&T) -> bool,
    {
        let mut cursor = open(self.inner.as_ref());
        while cursor.move_next()? {
            if predicate(current_of(&cursor)?) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn first(&self) -> LinqResult<T> {
        if let Some(list) = self.inner.as_list() {
            return list.item(0).ok_or_else(LinqError::no_elements);
        }
        let mut cursor = open(self.inner.as_ref());
        if cursor.move_next()? {
            return Ok(current_of(&cursor)?.clone());
        }
        Err(LinqError::no_elements())
    }

    /// Left fold over the sequence.
    pub fn aggregate<A, F>(&self, seed: A, mut func: F) -> LinqResult<A>
    where
        F: FnMut(A, &T) -> LinqResult<A>,
    {
        let mut cursor = open(self.inner.as_ref());
        let mut acc = seed;
        while cursor.move_next()? {
            acc = func(acc, current_of(&cursor)?)?;
        }
        Ok(acc)
    }

    /// Fold seeded with the first element. Fails on an empty sequence.
    pub fn reduce<F>(&self, mut func: F) -> LinqResult<T>
    where
        F: FnMut(T, &T) -> LinqResult<T>,
    {
        let mut cursor = open(self.inner.as_ref());
        if !cursor.move_next()? {
            return Err(LinqError::no_elements());
        }
        let mut acc = current_of(&cursor)?.clone();
        while cursor.move_next()? {
            acc = func(acc, current_of(&cursor)?)?;
        }
        Ok(acc)
    }

    /// [`aggregate`](Self::aggregate), then map the accumulator through `result_selector`.
    pub fn aggregate_with<A, R, F, G>(&self, seed: A, func: F, result_selector: G) -> LinqResult<R>
    where
        F: FnMut(A, &T) -> LinqResult<A>,
        G: FnOnce(A) -> LinqResult<R>,
    {
        result_selector(self.aggregate(seed, func)?)
    }

    pub fn last(&self) -> LinqResult<T> {
        if let Some(list) = self.inner.as_list() {
            let index = list.len().checked_sub(1).ok_or_else(LinqError::no_elements)?;
            return list.item(index).ok_or_else(|| list_shrunk(index));
        }
        let mut cursor = open(self.inner.as_ref());
        let mut last = None;
        while cursor.move_next()? {
            last = Some(current_of(&cursor)?.clone());
        }
        last.ok_or_else(LinqError::no_elements)
    }

    /// Compare two sequences element by element.
    pub fn sequence_equal(&self, other: &Seq<T>) -> LinqResult<bool>
    where
        T: PartialEq,
    {
        let mut left = open(self.inner.as_ref());
        let mut right = open(other.inner.as_ref());
        loop {
            match (left.move_next()?, right.move_next()?) {
                (true, true) => {
                    if current_of(&left)? != current_of(&right)? {
                        return Ok(false);
                    }
                }
                (false, false) => return Ok(true),
                _ => return Ok(false),
            }
        }
    }
}

impl<T: Clone + 'static> Enumerable for Seq<T> {
    type Item = T;

    fn enumerator(&self) -> BoxEnumerator<T> {
        self.inner.enumerator()
    }

    fn cheap_count(&self) -> Option<usize> {
        self.inner.cheap_count()
    }

    fn count(&self) -> LinqResult<usize> {
        self.inner.count()
    }

    fn as_list(&self) -> Option<&dyn ListSource<T>> {
        self.inner.as_list()
    }

    fn to_vec(&self) -> LinqResult<Vec<T>> {
        self.inner.to_vec()
    }
}

impl<T: Clone + 'static> IntoIterator for &Seq<T> {
    type Item = LinqResult<T>;
    type IntoIter = Iter<T>;

    fn into_iter(self) -> Iter<T> {
        self.iter()
    }
}

/// Rust [`Iterator`] over a sequence. The underlying cursor is closed when this is dropped.
pub struct Iter<T> {
    cursor: ScopedCursor<T>,
    done: bool,
}

impl<T: Clone> Iterator for Iter<T> {
    type Item = LinqResult<T>;

    fn next(&mut self) -> Option<LinqResult<T>> {
        if self.done {
            return None;
        }
        let next = match self.cursor.move_next() {
            Ok(true) => current_of(&self.cursor).map(Clone::clone),
            Ok(false) => {
                self.done = true;
                self.cursor.close();
                return None;
            }
            Err(err) => Err(err),
        };
        if next.is_err() {
            self.done = true;
            self.cursor.close();
        }
        Some(next)
    }
}
