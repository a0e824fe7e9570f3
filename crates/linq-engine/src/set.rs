use crate::comparer::SharedComparer;
use crate::error::LinqResult;
use crate::hash_index::{mask_hash, ChainedIndex, LookupOptions};

/// Insertion-ordered hash set driven by an [`EqualityComparer`](crate::EqualityComparer).
pub(crate) struct ElementSet<T> {
    comparer: SharedComparer<T>,
    index: ChainedIndex,
    items: Vec<T>,
}

impl<T: Clone> ElementSet<T> {
    pub(crate) fn new(comparer: SharedComparer<T>) -> LinqResult<Self> {
        Ok(Self {
            comparer,
            index: ChainedIndex::new(LookupOptions::default())?,
            items: Vec::new(),
        })
    }

    /// Insert `value` unless an equal element is present. Returns whether it was inserted.
    pub(crate) fn add(&mut self, value: &T) -> LinqResult<bool> {
        let hash = mask_hash(self.comparer.hash(value));
        let items = &self.items;
        let comparer = &self.comparer;
        if self
            .index
            .candidates(hash)
            .any(|slot| comparer.equals(&items[slot], value))
        {
            return Ok(false);
        }
        let slot = self.index.insert(hash)?;
        debug_assert_eq!(slot, self.items.len());
        self.items.push(value.clone());
        Ok(true)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
