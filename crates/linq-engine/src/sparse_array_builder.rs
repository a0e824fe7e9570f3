use crate::array_builder::ArrayBuilder;
use crate::enumerator::{current_of, open, vec_with_capacity, Enumerable, Enumerator};
use crate::error::{checked_add, LinqError, LinqResult};

/// A region of the final buffer reserved for a sequence whose contents are copied later.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Marker {
    pub index: usize,
    pub count: usize,
}

/// An [`ArrayBuilder`] that can also leave holes.
///
/// [`SparseArrayBuilder::reserve_or_add`] reserves a [`Marker`] for sequences that know their
/// length cheaply and appends everything else immediately. Reserving only bumps a counter; element
/// storage is untouched until [`SparseArrayBuilder::finish`] lays out the final buffer with `None`
/// in every reserved slot.
#[derive(Debug)]
pub struct SparseArrayBuilder<T> {
    builder: ArrayBuilder<T>,
    markers: ArrayBuilder<Marker>,
    reserved: usize,
}

impl<T> SparseArrayBuilder<T> {
    pub fn new() -> Self {
        Self {
            builder: ArrayBuilder::new(),
            markers: ArrayBuilder::new(),
            reserved: 0,
        }
    }

    /// Appended plus reserved elements.
    pub fn len(&self) -> usize {
        self.builder.len() + self.reserved
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn markers(&self) -> &[Marker] {
        self.markers.as_slice()
    }

    pub fn add(&mut self, item: T) -> LinqResult<()> {
        checked_add(self.len(), 1, "sparse array length")?;
        self.builder.add(item);
        Ok(())
    }

    pub fn reserve(&mut self, count: usize) -> LinqResult<()> {
        let index = self.len();
        checked_add(index, count, "sparse array length")?;
        self.markers.add(Marker { index, count });
        self.reserved += count;
        Ok(())
    }

    /// Reserve room for `items` if its count is cheap, otherwise append all of it.
    ///
    /// Returns `true` when a marker was recorded and the caller still owes a copy into that
    /// region. Empty cheap-count sequences record nothing and return `false`.
    pub fn reserve_or_add<S>(&mut self, items: &S) -> LinqResult<bool>
    where
        S: Enumerable<Item = T> + ?Sized,
        T: Clone,
    {
        match items.cheap_count() {
            Some(0) => Ok(false),
            Some(count) => {
                self.reserve(count)?;
                Ok(true)
            }
            None => {
                let mut cursor = open(items);
                while cursor.move_next()? {
                    self.add(current_of(&cursor)?.clone())?;
                }
                Ok(false)
            }
        }
    }

    /// Lay out the final buffer: appended elements in place, `None` in every reserved region.
    pub fn finish(self) -> LinqResult<(Vec<Option<T>>, Vec<Marker>)> {
        let total = self.len();
        let markers = self.markers.into_vec();
        let mut slots: Vec<Option<T>> = vec_with_capacity(total)?;

        let mut items = self.builder.into_vec().into_iter();
        for marker in &markers {
            let before = marker.index - slots.len();
            slots.extend(items.by_ref().take(before).map(Some));
            slots.extend(std::iter::repeat_with(|| None).take(marker.count));
        }
        slots.extend(items.map(Some));
        Ok((slots, markers))
    }
}

impl<T> Default for SparseArrayBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Unwrap a buffer produced by [`SparseArrayBuilder::finish`] once every reservation was filled.
pub(crate) fn into_filled<T>(slots: Vec<Option<T>>) -> LinqResult<Vec<T>> {
    slots.into_iter().collect::<Option<Vec<T>>>().ok_or_else(|| {
        LinqError::InvalidOperation("reserved region was not filled before finalization".into())
    })
}
