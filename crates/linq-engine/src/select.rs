use crate::enumerator::{
    current_of, list_shrunk, vec_with_capacity, Enumerable, Enumerator, ScopedCursor,
};
use crate::error::LinqResult;
use crate::iterator::{guarded, open_cursor, reopen, IteratorBase, Stage};
use crate::seq::{Selector, Seq};
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum PullState {
    #[default]
    Open,
    Pull,
}

struct Where<T> {
    source: Seq<T>,
    predicate: Selector<T, bool>,
    base: IteratorBase<T, PullState>,
    cursor: Option<ScopedCursor<T>>,
}

impl<T: Clone + 'static> Where<T> {
    fn advance(&mut self) -> LinqResult<bool> {
        loop {
            match self.base.state() {
                Some(PullState::Open) => {
                    reopen(&mut self.cursor, &self.source);
                    self.base.goto(PullState::Pull);
                }
                Some(PullState::Pull) => {
                    let cursor = open_cursor(&mut self.cursor)?;
                    if !cursor.move_next()? {
                        self.close();
                        return Ok(false);
                    }
                    let item = current_of(cursor)?;
                    if (self.predicate)(item)? {
                        let item = item.clone();
                        return self.base.yield_value(item);
                    }
                }
                None => return Ok(false),
            }
        }
    }
}

impl<T: Clone + 'static> Enumerator for Where<T> {
    type Item = T;

    fn move_next(&mut self) -> LinqResult<bool> {
        guarded(self, Self::advance)
    }

    fn current(&self) -> Option<&T> {
        self.base.current()
    }

    fn close(&mut self) {
        self.cursor = None;
        self.base.close();
    }
}

impl<T: Clone + 'static> Stage for Where<T> {
    fn clone_stage(&self) -> Self {
        Self {
            source: self.source.clone(),
            predicate: Rc::clone(&self.predicate),
            base: IteratorBase::new(),
            cursor: None,
        }
    }

    fn claim(&mut self) {
        self.base.claim();
    }
}

struct Select<T, R> {
    source: Seq<T>,
    selector: Selector<T, R>,
    base: IteratorBase<R, PullState>,
    cursor: Option<ScopedCursor<T>>,
}

impl<T: Clone + 'static, R: Clone + 'static> Select<T, R> {
    fn advance(&mut self) -> LinqResult<bool> {
        loop {
            match self.base.state() {
                Some(PullState::Open) => {
                    reopen(&mut self.cursor, &self.source);
                    self.base.goto(PullState::Pull);
                }
                Some(PullState::Pull) => {
                    let cursor = open_cursor(&mut self.cursor)?;
                    if !cursor.move_next()? {
                        self.close();
                        return Ok(false);
                    }
                    let value = (self.selector)(current_of(cursor)?)?;
                    return self.base.yield_value(value);
                }
                None => return Ok(false),
            }
        }
    }
}

impl<T: Clone + 'static, R: Clone + 'static> Enumerator for Select<T, R> {
    type Item = R;

    fn move_next(&mut self) -> LinqResult<bool> {
        guarded(self, Self::advance)
    }

    fn current(&self) -> Option<&R> {
        self.base.current()
    }

    fn close(&mut self) {
        self.cursor = None;
        self.base.close();
    }
}

impl<T: Clone + 'static, R: Clone + 'static> Stage for Select<T, R> {
    fn clone_stage(&self) -> Self {
        Self {
            source: self.source.clone(),
            selector: Rc::clone(&self.selector),
            base: IteratorBase::new(),
            cursor: None,
        }
    }

    fn claim(&mut self) {
        self.base.claim();
    }

    /// A projection has as many elements as its source; the selector is not run to count.
    fn cheap_count(&self) -> Option<usize> {
        self.source.cheap_count()
    }

    fn to_vec(&self) -> LinqResult<Vec<R>> {
        if let Some(list) = self.source.as_list() {
            let len = list.len();
            let mut out = vec_with_capacity(len)?;
            for index in 0..len {
                let item = list.item(index).ok_or_else(|| list_shrunk(index))?;
                out.push((self.selector)(&item)?);
            }
            return Ok(out);
        }
        let mut out = vec_with_capacity(self.source.cheap_count().unwrap_or(0))?;
        for item in self.source.iter() {
            out.push((self.selector)(&item?)?);
        }
        Ok(out)
    }
}

impl<T: Clone + 'static> Seq<T> {
    /// Elements for which `predicate` holds.
    pub fn where_<F>(&self, predicate: F) -> Seq<T>
    where
        F: Fn(&T) -> bool + 'static,
    {
        self.try_where(move |item| Ok(predicate(item)))
    }

    pub fn try_where<F>(&self, predicate: F) -> Seq<T>
    where
        F: Fn(&T) -> LinqResult<bool> + 'static,
    {
        Seq::from_stage(Where {
            source: self.clone(),
            predicate: Rc::new(predicate),
            base: IteratorBase::new(),
            cursor: None,
        })
    }

    /// Project every element through `selector`.
    pub fn select<R, F>(&self, selector: F) -> Seq<R>
    where
        R: Clone + 'static,
        F: Fn(&T) -> R + 'static,
    {
        self.try_select(move |item| Ok(selector(item)))
    }

    pub fn try_select<R, F>(&self, selector: F) -> Seq<R>
    where
        R: Clone + 'static,
        F: Fn(&T) -> LinqResult<R> + 'static,
    {
        Seq::from_stage(Select {
            source: self.clone(),
            selector: Rc::new(selector),
            base: IteratorBase::new(),
            cursor: None,
        })
    }
}
