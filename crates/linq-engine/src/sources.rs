//! Leaf sequences: list-backed, numeric range, repeated element and empty.
//!
//! All of them know their length up front, so they report a cheap count and expose
//! [`ListSource`] for index-based bulk copies.

use crate::enumerator::{BoxEnumerator, Enumerable, Enumerator, ListSource};
use crate::error::{LinqError, LinqResult};
use crate::seq::Seq;
use std::marker::PhantomData;
use std::rc::Rc;

/// A sequence over the given elements.
pub fn of<T: Clone + 'static>(items: Vec<T>) -> Seq<T> {
    Seq::new(ListSeq {
        items: Rc::from(items),
    })
}

pub fn from_iter<T, I>(items: I) -> Seq<T>
where
    T: Clone + 'static,
    I: IntoIterator<Item = T>,
{
    of(items.into_iter().collect())
}

pub fn singleton<T: Clone + 'static>(item: T) -> Seq<T> {
    of(vec![item])
}

pub fn empty<T: Clone + 'static>() -> Seq<T> {
    Seq::new(EmptySeq {
        _marker: PhantomData,
    })
}

/// `count` consecutive integers starting at `start`.
pub fn range(start: i32, count: usize) -> LinqResult<Seq<i32>> {
    if count == 0 {
        return Ok(empty());
    }
    let fits = i64::try_from(count - 1)
        .ok()
        .and_then(|span| i64::from(start).checked_add(span))
        .is_some_and(|last| last <= i64::from(i32::MAX));
    if !fits {
        return Err(LinqError::invalid_argument(
            "count",
            format!("range starting at {start} with {count} elements exceeds i32::MAX"),
        ));
    }
    Ok(Seq::new(RangeSeq { start, count }))
}

/// `element` repeated `count` times.
pub fn repeat<T: Clone + 'static>(element: T, count: usize) -> Seq<T> {
    Seq::new(RepeatSeq { element, count })
}

struct ListSeq<T> {
    items: Rc<[T]>,
}

impl<T: Clone + 'static> Enumerable for ListSeq<T> {
    type Item = T;

    fn enumerator(&self) -> BoxEnumerator<T> {
        Box::new(ListCursor::new(Rc::clone(&self.items)))
    }

    fn cheap_count(&self) -> Option<usize> {
        Some(self.items.len())
    }

    fn as_list(&self) -> Option<&dyn ListSource<T>> {
        Some(self)
    }

    fn to_vec(&self) -> LinqResult<Vec<T>> {
        Ok(self.items.to_vec())
    }
}

impl<T: Clone> ListSource<T> for ListSeq<T> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn item(&self, index: usize) -> Option<T> {
        self.items.get(index).cloned()
    }
}

/// Cursor over a shared slice. Also used by groupings.
pub(crate) struct ListCursor<T> {
    items: Rc<[T]>,
    // One past the current element; `None` once closed.
    next: Option<usize>,
    positioned: bool,
}

impl<T> ListCursor<T> {
    pub(crate) fn new(items: Rc<[T]>) -> Self {
        Self {
            items,
            next: Some(0),
            positioned: false,
        }
    }
}

impl<T> Enumerator for ListCursor<T> {
    type Item = T;

    fn move_next(&mut self) -> LinqResult<bool> {
        let Some(next) = self.next else {
            return Ok(false);
        };
        if next < self.items.len() {
            self.next = Some(next + 1);
            self.positioned = true;
            return Ok(true);
        }
        self.close();
        Ok(false)
    }

    fn current(&self) -> Option<&T> {
        match self.next {
            Some(next) if self.positioned => self.items.get(next - 1),
            _ => None,
        }
    }

    fn close(&mut self) {
        self.next = None;
        self.positioned = false;
    }
}

struct RangeSeq {
    start: i32,
    count: usize,
}

impl Enumerable for RangeSeq {
    type Item = i32;

    fn enumerator(&self) -> BoxEnumerator<i32> {
        Box::new(CountingCursor {
            remaining: self.count,
            next: i64::from(self.start),
            current: None,
            produce: |n: i64| n as i32,
        })
    }

    fn cheap_count(&self) -> Option<usize> {
        Some(self.count)
    }

    fn as_list(&self) -> Option<&dyn ListSource<i32>> {
        Some(self)
    }
}

impl ListSource<i32> for RangeSeq {
    fn len(&self) -> usize {
        self.count
    }

    fn item(&self, index: usize) -> Option<i32> {
        if index < self.count {
            Some((i64::from(self.start) + index as i64) as i32)
        } else {
            None
        }
    }
}

struct RepeatSeq<T> {
    element: T,
    count: usize,
}

impl<T: Clone + 'static> Enumerable for RepeatSeq<T> {
    type Item = T;

    fn enumerator(&self) -> BoxEnumerator<T> {
        let element = self.element.clone();
        Box::new(CountingCursor {
            remaining: self.count,
            next: 0,
            current: None,
            produce: move |_| element.clone(),
        })
    }

    fn cheap_count(&self) -> Option<usize> {
        Some(self.count)
    }

    fn as_list(&self) -> Option<&dyn ListSource<T>> {
        Some(self)
    }
}

impl<T: Clone> ListSource<T> for RepeatSeq<T> {
    fn len(&self) -> usize {
        self.count
    }

    fn item(&self, index: usize) -> Option<T> {
        (index < self.count).then(|| self.element.clone())
    }
}

/// Produces `remaining` values from a counter.
struct CountingCursor<T, F> {
    remaining: usize,
    next: i64,
    current: Option<T>,
    produce: F,
}

impl<T, F: Fn(i64) -> T> Enumerator for CountingCursor<T, F> {
    type Item = T;

    fn move_next(&mut self) -> LinqResult<bool> {
        if self.remaining == 0 {
            self.current = None;
            return Ok(false);
        }
        self.remaining -= 1;
        self.current = Some((self.produce)(self.next));
        self.next += 1;
        Ok(true)
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn close(&mut self) {
        self.remaining = 0;
        self.current = None;
    }
}

struct EmptySeq<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + 'static> Enumerable for EmptySeq<T> {
    type Item = T;

    fn enumerator(&self) -> BoxEnumerator<T> {
        Box::new(EmptyCursor {
            _marker: PhantomData,
        })
    }

    fn cheap_count(&self) -> Option<usize> {
        Some(0)
    }

    fn to_vec(&self) -> LinqResult<Vec<T>> {
        Ok(Vec::new())
    }
}

struct EmptyCursor<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Enumerator for EmptyCursor<T> {
    type Item = T;

    fn move_next(&mut self) -> LinqResult<bool> {
        Ok(false)
    }

    fn current(&self) -> Option<&T> {
        None
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_rejects_overflowing_end() {
        assert!(range(i32::MAX, 1).is_ok());
        assert!(matches!(
            range(i32::MAX, 2),
            Err(LinqError::InvalidArgument { name: "count", .. })
        ));
        assert_eq!(range(-2, 4).unwrap().to_vec().unwrap(), vec![-2, -1, 0, 1]);
    }

    #[test]
    fn list_cursor_stays_exhausted() {
        let mut cursor = ListCursor::new(Rc::from(vec![1, 2]));
        assert_eq!(cursor.current(), None);
        assert!(cursor.move_next().unwrap());
        assert_eq!(cursor.current(), Some(&1));
        assert!(cursor.move_next().unwrap());
        assert!(!cursor.move_next().unwrap());
        assert!(!cursor.move_next().unwrap());
        assert_eq!(cursor.current(), None);
    }

    #[test]
    fn repeat_zero_is_empty() {
        let seq = repeat("x", 0);
        assert_eq!(seq.cheap_count(), Some(0));
        assert!(seq.to_vec().unwrap().is_empty());
    }
}
