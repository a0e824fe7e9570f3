use crate::comparer::{default_comparer, SharedComparer};
use crate::enumerator::{current_of, Enumerator, ScopedCursor};
use crate::error::{LinqError, LinqResult};
use crate::iterator::{guarded, open_cursor, reopen, IteratorBase, Stage};
use crate::seq::Seq;
use crate::set::ElementSet;
use std::hash::Hash;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum SetState {
    #[default]
    Start,
    NextSource,
    Pull,
}

/// Streams the first occurrence of every element across one or more sources, in order.
///
/// `distinct` is the single-source case.
struct Union<T> {
    sources: Rc<[Seq<T>]>,
    comparer: SharedComparer<T>,
    base: IteratorBase<T, SetState>,
    set: Option<ElementSet<T>>,
    cursor: Option<ScopedCursor<T>>,
    next_source: usize,
}

impl<T: Clone + 'static> Union<T> {
    fn new(sources: Rc<[Seq<T>]>, comparer: SharedComparer<T>) -> Self {
        Self {
            sources,
            comparer,
            base: IteratorBase::new(),
            set: None,
            cursor: None,
            next_source: 0,
        }
    }

    fn advance(&mut self) -> LinqResult<bool> {
        loop {
            match self.base.state() {
                Some(SetState::Start) => {
                    self.set = Some(ElementSet::new(Rc::clone(&self.comparer))?);
                    self.base.goto(SetState::NextSource);
                }
                Some(SetState::NextSource) => {
                    let Some(source) = self.sources.get(self.next_source) else {
                        self.close();
                        return Ok(false);
                    };
                    reopen(&mut self.cursor, source);
                    self.next_source += 1;
                    self.base.goto(SetState::Pull);
                }
                Some(SetState::Pull) => {
                    let cursor = open_cursor(&mut self.cursor)?;
                    if !cursor.move_next()? {
                        self.cursor = None;
                        self.base.goto(SetState::NextSource);
                        continue;
                    }
                    let item = current_of(cursor)?;
                    let set = self.set.as_mut().ok_or_else(|| {
                        LinqError::InvalidOperation("element set is not initialized".into())
                    })?;
                    if set.add(item)? {
                        let item = item.clone();
                        return self.base.yield_value(item);
                    }
                }
                None => return Ok(false),
            }
        }
    }
}

impl<T: Clone + 'static> Enumerator for Union<T> {
    type Item = T;

    fn move_next(&mut self) -> LinqResult<bool> {
        guarded(self, Self::advance)
    }

    fn current(&self) -> Option<&T> {
        self.base.current()
    }

    fn close(&mut self) {
        self.cursor = None;
        self.set = None;
        self.base.close();
    }
}

impl<T: Clone + 'static> Stage for Union<T> {
    fn clone_stage(&self) -> Self {
        Self::new(Rc::clone(&self.sources), Rc::clone(&self.comparer))
    }

    fn claim(&mut self) {
        self.base.claim();
    }
}

impl<T: Clone + 'static> Seq<T> {
    /// Drop repeated elements, keeping first occurrences in order.
    pub fn distinct(&self) -> Seq<T>
    where
        T: Eq + Hash,
    {
        self.distinct_with(default_comparer())
    }

    pub fn distinct_with(&self, comparer: SharedComparer<T>) -> Seq<T> {
        Seq::from_stage(Union::new(Rc::from(vec![self.clone()]), comparer))
    }

    /// Elements of `self` then `other`, each value once.
    pub fn union(&self, other: &Seq<T>) -> Seq<T>
    where
        T: Eq + Hash,
    {
        self.union_with(other, default_comparer())
    }

    pub fn union_with(&self, other: &Seq<T>, comparer: SharedComparer<T>) -> Seq<T> {
        Seq::from_stage(Union::new(Rc::from(vec![self.clone(), other.clone()]), comparer))
    }

    /// Union of `self` and every sequence in `others`, evaluated by a single stage.
    pub fn union_many(&self, others: &[Seq<T>]) -> Seq<T>
    where
        T: Eq + Hash,
    {
        let sources: Vec<Seq<T>> = std::iter::once(self.clone())
            .chain(others.iter().cloned())
            .collect();
        Seq::from_stage(Union::new(Rc::from(sources), default_comparer()))
    }
}
