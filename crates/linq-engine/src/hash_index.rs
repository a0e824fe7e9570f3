//! Open-chaining bucket index shared by [`Lookup`](crate::Lookup) and the element set behind
//! `distinct`/`union`.
//!
//! The index does not own values. Callers keep entries in an insertion-ordered arena and the
//! index stores, per arena slot, the masked hash and the next slot in the same bucket. Rehashing
//! walks the arena once in insertion order.

use crate::error::{LinqError, LinqResult};

pub const DEFAULT_INITIAL_BUCKETS: usize = 7;

/// Tuning for lookup and set hash tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupOptions {
    /// Bucket count before the first resize. Rounded up to an odd number.
    pub initial_buckets: usize,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            initial_buckets: DEFAULT_INITIAL_BUCKETS,
        }
    }
}

impl LookupOptions {
    pub(crate) fn bucket_count(&self) -> LinqResult<usize> {
        if self.initial_buckets == 0 {
            return Err(LinqError::invalid_argument(
                "initial_buckets",
                "a hash table needs at least one bucket",
            ));
        }
        Ok(self.initial_buckets | 1)
    }
}

/// Hash reduced to the non-negative 31-bit range used for bucket selection.
pub(crate) fn mask_hash(hash: u64) -> u32 {
    (hash as u32) & 0x7FFF_FFFF
}

#[derive(Clone, Copy, Debug)]
struct Link {
    hash: u32,
    next: Option<usize>,
}

#[derive(Clone, Debug)]
pub(crate) struct ChainedIndex {
    buckets: Vec<Option<usize>>,
    links: Vec<Link>,
}

impl ChainedIndex {
    pub(crate) fn new(options: LookupOptions) -> LinqResult<Self> {
        Ok(Self {
            buckets: vec![None; options.bucket_count()?],
            links: Vec::new(),
        })
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Arena slots whose masked hash equals `hash`, most recently inserted first.
    pub(crate) fn candidates(&self, hash: u32) -> Candidates<'_> {
        let bucket = hash as usize % self.buckets.len();
        Candidates {
            index: self,
            hash,
            next: self.buckets[bucket],
        }
    }

    /// Register arena slot `len()` with `hash`, growing the table first when it is full.
    pub(crate) fn insert(&mut self, hash: u32) -> LinqResult<usize> {
        if self.links.len() == self.buckets.len() {
            self.resize()?;
        }
        let slot = self.links.len();
        let bucket = hash as usize % self.buckets.len();
        self.links.push(Link {
            hash,
            next: self.buckets[bucket],
        });
        self.buckets[bucket] = Some(slot);
        Ok(slot)
    }

    fn resize(&mut self) -> LinqResult<()> {
        let size = self
            .links
            .len()
            .checked_mul(2)
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| LinqError::overflow("hash table resize"))?;
        log::trace!(
            "rehashing {} entries: {} -> {size} buckets",
            self.links.len(),
            self.buckets.len()
        );

        let mut buckets = vec![None; size];
        for (slot, link) in self.links.iter_mut().enumerate() {
            let bucket = link.hash as usize % size;
            link.next = buckets[bucket];
            buckets[bucket] = Some(slot);
        }
        self.buckets = buckets;
        Ok(())
    }
}

pub(crate) struct Candidates<'a> {
    index: &'a ChainedIndex,
    hash: u32,
    next: Option<usize>,
}

impl Iterator for Candidates<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while let Some(slot) = self.next {
            let link = self.index.links[slot];
            self.next = link.next;
            if link.hash == self.hash {
                return Some(slot);
            }
        }
        None
    }
}
