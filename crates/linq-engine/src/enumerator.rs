use crate::error::{checked_add, LinqError, LinqResult};

/// A cursor over one traversal of a sequence.
///
/// Contract:
/// - `move_next` returns `Ok(true)` when a new element is available through `current`. Once it has
///   returned `Ok(false)` (or the cursor was closed) it keeps returning `Ok(false)`.
/// - `current` is only meaningful right after `move_next` returned `Ok(true)`.
/// - `close` releases any nested cursors. It may be called any number of times.
pub trait Enumerator {
    type Item;

    fn move_next(&mut self) -> LinqResult<bool>;

    fn current(&self) -> Option<&Self::Item>;

    fn close(&mut self);
}

pub type BoxEnumerator<T> = Box<dyn Enumerator<Item = T>>;

impl<E: Enumerator + ?Sized> Enumerator for Box<E> {
    type Item = E::Item;

    fn move_next(&mut self) -> LinqResult<bool> {
        (**self).move_next()
    }

    fn current(&self) -> Option<&Self::Item> {
        (**self).current()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Random access capability exposed by list-shaped sources.
///
/// Bulk paths probe for it through [`Enumerable::as_list`] and copy by index instead of walking a
/// cursor.
pub trait ListSource<T> {
    fn len(&self) -> usize;

    fn item(&self, index: usize) -> Option<T>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A lazy, replayable producer of elements.
///
/// Requesting a cursor must not consume anything; work starts with the first `move_next`.
pub trait Enumerable: 'static {
    type Item: Clone + 'static;

    fn enumerator(&self) -> BoxEnumerator<Self::Item>;

    /// The element count if it is known without consuming the sequence.
    fn cheap_count(&self) -> Option<usize> {
        None
    }

    /// Count the elements, walking the sequence when the count is not cheap.
    fn count(&self) -> LinqResult<usize> {
        if let Some(count) = self.cheap_count() {
            return Ok(count);
        }
        drain_count(self)
    }

    fn as_list(&self) -> Option<&dyn ListSource<Self::Item>> {
        None
    }

    /// Materialize every element in order.
    fn to_vec(&self) -> LinqResult<Vec<Self::Item>> {
        if let Some(list) = self.as_list() {
            return list_to_vec(list);
        }
        drain_to_vec(self)
    }
}

/// Owns a cursor and closes it when dropped, so every exit path (including `?` and panics)
/// releases it.
pub struct ScopedCursor<T> {
    inner: BoxEnumerator<T>,
}

impl<T> ScopedCursor<T> {
    pub fn new(inner: BoxEnumerator<T>) -> Self {
        Self { inner }
    }
}

impl<T> Enumerator for ScopedCursor<T> {
    type Item = T;

    fn move_next(&mut self) -> LinqResult<bool> {
        self.inner.move_next()
    }

    fn current(&self) -> Option<&T> {
        self.inner.current()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

impl<T> Drop for ScopedCursor<T> {
    fn drop(&mut self) {
        self.inner.close();
    }
}

/// Open a scoped cursor over `source`.
pub fn open<S: Enumerable + ?Sized>(source: &S) -> ScopedCursor<S::Item> {
    ScopedCursor::new(source.enumerator())
}

/// `current` of a cursor that just reported an element.
pub(crate) fn current_of<E: Enumerator + ?Sized>(cursor: &E) -> LinqResult<&E::Item> {
    cursor.current().ok_or_else(LinqError::no_current)
}

pub(crate) fn drain_count<S: Enumerable + ?Sized>(source: &S) -> LinqResult<usize> {
    let mut cursor = open(source);
    let mut count = 0usize;
    while cursor.move_next()? {
        count = checked_add(count, 1, "count")?;
    }
    Ok(count)
}

pub(crate) fn drain_to_vec<S: Enumerable + ?Sized>(source: &S) -> LinqResult<Vec<S::Item>> {
    let mut cursor = open(source);
    let mut out = vec_with_capacity(source.cheap_count().unwrap_or(0))?;
    while cursor.move_next()? {
        out.push(current_of(&cursor)?.clone());
    }
    Ok(out)
}

pub(crate) fn list_to_vec<T>(list: &dyn ListSource<T>) -> LinqResult<Vec<T>> {
    let len = list.len();
    let mut out = vec_with_capacity(len)?;
    for index in 0..len {
        out.push(list.item(index).ok_or_else(|| list_shrunk(index))?);
    }
    Ok(out)
}

/// An empty vector able to hold `capacity` elements, or an error when that much cannot be
/// allocated.
pub(crate) fn vec_with_capacity<T>(capacity: usize) -> LinqResult<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(capacity).map_err(|_| {
        LinqError::InvalidOperation(format!("cannot allocate a buffer of {capacity} elements"))
    })?;
    Ok(out)
}

/// Copy exactly `count` elements of `source` into `slots[offset..offset + count]`.
///
/// Used to fill regions reserved by a [`SparseArrayBuilder`](crate::SparseArrayBuilder). The
/// destination is already sized, so this writes by index instead of appending.
pub(crate) fn copy_into_slots<S: Enumerable + ?Sized>(
    source: &S,
    slots: &mut [Option<S::Item>],
    offset: usize,
    count: usize,
) -> LinqResult<()> {
    let end = checked_add(offset, count, "copy")?;
    let dest = slots
        .get_mut(offset..end)
        .ok_or_else(|| LinqError::InvalidOperation("reserved region out of bounds".into()))?;

    if let Some(list) = source.as_list() {
        if list.len() != count {
            return Err(length_changed(count, list.len()));
        }
        for (index, slot) in dest.iter_mut().enumerate() {
            *slot = Some(list.item(index).ok_or_else(|| list_shrunk(index))?);
        }
        return Ok(());
    }

    let mut cursor = open(source);
    let mut written = 0usize;
    while cursor.move_next()? {
        let slot = dest
            .get_mut(written)
            .ok_or_else(|| length_changed(count, written + 1))?;
        *slot = Some(current_of(&cursor)?.clone());
        written += 1;
    }
    if written != count {
        return Err(length_changed(count, written));
    }
    Ok(())
}

fn length_changed(expected: usize, actual: usize) -> LinqError {
    LinqError::InvalidOperation(format!(
        "sequence length changed during materialization: expected {expected}, got {actual}"
    ))
}

pub(crate) fn list_shrunk(index: usize) -> LinqError {
    LinqError::InvalidOperation(format!("list source has no element at index {index}"))
}
