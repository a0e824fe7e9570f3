#![forbid(unsafe_code)]

mod array_builder;
mod comparer;
mod distinct;
mod enumerator;
mod error;
mod group_by;
mod hash_index;
mod iterator;
mod join;
mod lookup;
mod select;
mod select_many;
mod seq;
mod set;
mod sources;
mod sparse_array_builder;

pub use crate::array_builder::ArrayBuilder;
pub use crate::comparer::{
    default_comparer, DefaultComparer, EqualityComparer, FnComparer, NullableComparer,
    SharedComparer,
};
pub use crate::enumerator::{open, BoxEnumerator, Enumerable, Enumerator, ListSource, ScopedCursor};
pub use crate::error::{LinqError, LinqResult};
pub use crate::hash_index::{LookupOptions, DEFAULT_INITIAL_BUCKETS};
pub use crate::iterator::{IteratorBase, Phase, Stage, StageSeq};
pub use crate::lookup::{Grouping, Lookup};
pub use crate::seq::{Iter, Seq};
pub use crate::sources::{empty, from_iter, of, range, repeat, singleton};
pub use crate::sparse_array_builder::{Marker, SparseArrayBuilder};
