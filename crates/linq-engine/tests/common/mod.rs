#![allow(dead_code)]

use linq_engine::{
    BoxEnumerator, Enumerable, Enumerator, LinqError, LinqResult, ListSource, Seq,
};
use std::cell::Cell;
use std::rc::Rc;

/// Counters shared between a tracked source and the test observing it.
#[derive(Debug, Default)]
pub struct Probe {
    opened: Cell<usize>,
    closed: Cell<usize>,
    moves: Cell<usize>,
}

impl Probe {
    /// Cursors handed out so far.
    pub fn opened(&self) -> usize {
        self.opened.get()
    }

    /// Cursors closed at least once.
    pub fn closed(&self) -> usize {
        self.closed.get()
    }

    /// Cursors handed out and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.opened.get() - self.closed.get()
    }

    pub fn moves(&self) -> usize {
        self.moves.get()
    }
}

struct TrackedSource<T> {
    items: Rc<[T]>,
    probe: Rc<Probe>,
    report_count: bool,
    fail_at: Option<usize>,
}

impl<T: Clone + 'static> Enumerable for TrackedSource<T> {
    type Item = T;

    fn enumerator(&self) -> BoxEnumerator<T> {
        self.probe.opened.set(self.probe.opened.get() + 1);
        Box::new(TrackedCursor {
            items: Rc::clone(&self.items),
            probe: Rc::clone(&self.probe),
            fail_at: self.fail_at,
            next: 0,
            current: None,
            closed: false,
        })
    }

    fn cheap_count(&self) -> Option<usize> {
        self.report_count.then_some(self.items.len())
    }
}

struct TrackedCursor<T> {
    items: Rc<[T]>,
    probe: Rc<Probe>,
    fail_at: Option<usize>,
    next: usize,
    current: Option<T>,
    closed: bool,
}

impl<T: Clone> Enumerator for TrackedCursor<T> {
    type Item = T;

    fn move_next(&mut self) -> LinqResult<bool> {
        if self.closed {
            return Ok(false);
        }
        self.probe.moves.set(self.probe.moves.get() + 1);
        if self.fail_at == Some(self.next) {
            return Err(LinqError::transform("source failed"));
        }
        match self.items.get(self.next) {
            Some(item) => {
                self.current = Some(item.clone());
                self.next += 1;
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.current = None;
            self.probe.closed.set(self.probe.closed.get() + 1);
        }
    }
}

/// Index-addressable source whose reported length may exceed the elements it holds.
struct ListedSource<T> {
    items: Rc<[T]>,
    len: usize,
    probe: Rc<Probe>,
}

impl<T: Clone + 'static> Enumerable for ListedSource<T> {
    type Item = T;

    fn enumerator(&self) -> BoxEnumerator<T> {
        self.probe.opened.set(self.probe.opened.get() + 1);
        Box::new(TrackedCursor {
            items: Rc::clone(&self.items),
            probe: Rc::clone(&self.probe),
            fail_at: None,
            next: 0,
            current: None,
            closed: false,
        })
    }

    fn cheap_count(&self) -> Option<usize> {
        Some(self.len)
    }

    fn as_list(&self) -> Option<&dyn ListSource<T>> {
        Some(self)
    }
}

impl<T: Clone> ListSource<T> for ListedSource<T> {
    fn len(&self) -> usize {
        self.len
    }

    fn item(&self, index: usize) -> Option<T> {
        self.items.get(index).cloned()
    }
}

fn build<T: Clone + 'static>(
    items: Vec<T>,
    report_count: bool,
    fail_at: Option<usize>,
) -> (Seq<T>, Rc<Probe>) {
    let probe = Rc::new(Probe::default());
    let seq = Seq::new(TrackedSource {
        items: Rc::from(items),
        probe: Rc::clone(&probe),
        report_count,
        fail_at,
    });
    (seq, probe)
}

/// A source with no cheap count that records cursor activity.
pub fn tracked<T: Clone + 'static>(items: Vec<T>) -> (Seq<T>, Rc<Probe>) {
    build(items, false, None)
}

/// Like [`tracked`], but reports its length as a cheap count.
pub fn tracked_counted<T: Clone + 'static>(items: Vec<T>) -> (Seq<T>, Rc<Probe>) {
    build(items, true, None)
}

/// Yields `items[..fail_at]`, then fails on the next advance.
pub fn failing<T: Clone + 'static>(items: Vec<T>, fail_at: usize) -> (Seq<T>, Rc<Probe>) {
    build(items, false, Some(fail_at))
}

/// A list-backed source that records cursor activity.
pub fn listed<T: Clone + 'static>(items: Vec<T>) -> (Seq<T>, Rc<Probe>) {
    let len = items.len();
    listed_with_len(items, len)
}

/// Like [`listed`], but reports `len` elements regardless of how many it holds.
pub fn listed_with_len<T: Clone + 'static>(items: Vec<T>, len: usize) -> (Seq<T>, Rc<Probe>) {
    let probe = Rc::new(Probe::default());
    let seq = Seq::new(ListedSource {
        items: Rc::from(items),
        len,
        probe: Rc::clone(&probe),
    });
    (seq, probe)
}

/// Drain a cursor, panicking on error.
pub fn drain<T: Clone>(cursor: &mut BoxEnumerator<T>) -> Vec<T> {
    let mut out = Vec::new();
    while cursor.move_next().unwrap() {
        out.push(cursor.current().unwrap().clone());
    }
    out
}

pub fn collect<T: Clone + 'static>(seq: &Seq<T>) -> Vec<T> {
    seq.iter().collect::<LinqResult<Vec<T>>>().unwrap()
}
