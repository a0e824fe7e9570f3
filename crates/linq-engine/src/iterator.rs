//! Base machinery shared by every pipeline stage.
//!
//! A stage is a struct holding two kinds of fields:
//! - immutable configuration (the upstream [`Seq`](crate::Seq), selector closures, comparers),
//!   shared through `Rc` so copying it is cheap;
//! - execution state: an [`IteratorBase`] tracking the lifecycle plus a stage-specific sub-state
//!   enum, and whatever cursors/buffers the sub-states need.
//!
//! `move_next` is a loop over the sub-states. Returning `Ok(true)` with a value is the only
//! suspension point; all work runs synchronously inside the caller's `move_next`.
//!
//! [`StageSeq`] turns a stage into an [`Enumerable`]: the instance built at composition time is
//! handed out as the first cursor, later requests receive a [`Stage::clone_stage`] copy with fresh
//! execution state.

use crate::enumerator::{current_of, open, BoxEnumerator, Enumerable, Enumerator, ScopedCursor};
use crate::error::{checked_add, LinqError, LinqResult};
use std::cell::RefCell;
use std::fmt;

/// Lifecycle of a stage. `S` is the stage's own sub-state enum; its `Default` is the state a
/// freshly claimed cursor starts in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase<S> {
    /// Built but not yet handed out as a cursor.
    Unstarted,
    Running(S),
    /// Exhausted or explicitly closed. Terminal.
    Closed,
}

#[derive(Debug)]
pub struct IteratorBase<T, S> {
    phase: Phase<S>,
    current: Option<T>,
}

impl<T, S: Copy + Default> IteratorBase<T, S> {
    pub fn new() -> Self {
        Self {
            phase: Phase::Unstarted,
            current: None,
        }
    }

    pub fn phase(&self) -> Phase<S> {
        self.phase
    }

    /// The running sub-state, or `None` when unstarted or closed.
    pub fn state(&self) -> Option<S> {
        match self.phase {
            Phase::Running(state) => Some(state),
            Phase::Unstarted | Phase::Closed => None,
        }
    }

    pub fn is_unstarted(&self) -> bool {
        matches!(self.phase, Phase::Unstarted)
    }

    pub fn claim(&mut self) {
        if self.is_unstarted() {
            self.phase = Phase::Running(S::default());
        }
    }

    pub fn goto(&mut self, state: S) {
        if !matches!(self.phase, Phase::Closed) {
            self.phase = Phase::Running(state);
        }
    }

    pub fn yield_value(&mut self, value: T) -> LinqResult<bool> {
        self.current = Some(value);
        Ok(true)
    }

    pub fn current(&self) -> Option<&T> {
        match self.phase {
            Phase::Running(_) => self.current.as_ref(),
            Phase::Unstarted | Phase::Closed => None,
        }
    }

    pub fn close(&mut self) {
        self.phase = Phase::Closed;
        self.current = None;
    }
}

impl<T, S: Copy + Default> Default for IteratorBase<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// A pipeline stage: an [`Enumerator`] that can also reproduce itself from its configuration.
pub trait Stage: Enumerator + Sized + 'static {
    /// A new instance sharing this stage's configuration, reset to [`Phase::Unstarted`].
    fn clone_stage(&self) -> Self;

    /// Move an unstarted instance into its initial running state.
    fn claim(&mut self);

    fn cheap_count(&self) -> Option<usize> {
        None
    }

    fn count(&self) -> LinqResult<usize> {
        if let Some(count) = self.cheap_count() {
            return Ok(count);
        }
        let mut stage = self.clone_stage();
        stage.claim();
        let mut count = 0usize;
        let result = loop {
            match stage.move_next() {
                Ok(true) => match checked_add(count, 1, "count") {
                    Ok(next) => count = next,
                    Err(err) => break Err(err),
                },
                Ok(false) => break Ok(count),
                Err(err) => break Err(err),
            }
        };
        stage.close();
        result
    }

    fn to_vec(&self) -> LinqResult<Vec<Self::Item>>
    where
        Self::Item: Clone,
    {
        let mut stage = self.clone_stage();
        stage.claim();
        let mut out = Vec::new();
        let result = loop {
            match stage.move_next() {
                Ok(true) => match current_of(&stage) {
                    Ok(value) => out.push(value.clone()),
                    Err(err) => break Err(err),
                },
                Ok(false) => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        stage.close();
        result.map(|()| out)
    }
}

/// Run one `move_next` step, closing the stage before any error is returned.
pub(crate) fn guarded<S: Enumerator>(
    stage: &mut S,
    step: fn(&mut S) -> LinqResult<bool>,
) -> LinqResult<bool> {
    let result = step(stage);
    if result.is_err() {
        stage.close();
    }
    result
}

/// The cursor a sub-state expects to be open.
pub(crate) fn open_cursor<T>(
    slot: &mut Option<ScopedCursor<T>>,
) -> LinqResult<&mut ScopedCursor<T>> {
    slot.as_mut().ok_or_else(|| {
        LinqError::InvalidOperation("stage cursor is not open in the current state".into())
    })
}

/// Open `source` into `slot`, closing whatever was there.
pub(crate) fn reopen<S: Enumerable + ?Sized>(slot: &mut Option<ScopedCursor<S::Item>>, source: &S) {
    *slot = Some(open(source));
}

/// Exposes a [`Stage`] as an [`Enumerable`].
pub struct StageSeq<S: Stage> {
    template: S,
    pristine: RefCell<Option<S>>,
}

impl<S: Stage> StageSeq<S> {
    pub fn new(stage: S) -> Self {
        Self {
            template: stage.clone_stage(),
            pristine: RefCell::new(Some(stage)),
        }
    }
}

impl<S: Stage> fmt::Debug for StageSeq<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSeq")
            .field("stage", &std::any::type_name::<S>())
            .field("first_cursor_taken", &self.pristine.borrow().is_none())
            .finish()
    }
}

impl<S> Enumerable for StageSeq<S>
where
    S: Stage,
    S::Item: Clone + 'static,
{
    type Item = S::Item;

    fn enumerator(&self) -> BoxEnumerator<S::Item> {
        let first = self.pristine.borrow_mut().take();
        let mut stage = match first {
            Some(stage) => stage,
            None => {
                log::trace!(
                    "re-entrant enumeration of {}; cloning stage",
                    std::any::type_name::<S>()
                );
                self.template.clone_stage()
            }
        };
        stage.claim();
        Box::new(stage)
    }

    fn cheap_count(&self) -> Option<usize> {
        self.template.cheap_count()
    }

    fn count(&self) -> LinqResult<usize> {
        self.template.count()
    }

    fn to_vec(&self) -> LinqResult<Vec<S::Item>> {
        self.template.to_vec()
    }
}
