use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Equality and hashing capability used by lookups and sets.
///
/// Implementations must hash equal values identically.
pub trait EqualityComparer<T: ?Sized> {
    fn equals(&self, a: &T, b: &T) -> bool;

    fn hash(&self, value: &T) -> u64;
}

pub type SharedComparer<T> = Rc<dyn EqualityComparer<T>>;

/// Natural `Eq` + `Hash`, hashed with a fixed-key `ahash` hasher so bucket placement is the same
/// on every run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultComparer;

impl<T: Eq + Hash + ?Sized> EqualityComparer<T> for DefaultComparer {
    fn equals(&self, a: &T, b: &T) -> bool {
        a == b
    }

    fn hash(&self, value: &T) -> u64 {
        let mut hasher = ahash::AHasher::default();
        value.hash(&mut hasher);
        hasher.finish()
    }
}

pub fn default_comparer<T: Eq + Hash + 'static>() -> SharedComparer<T> {
    Rc::new(DefaultComparer)
}

/// A comparer assembled from two closures.
pub struct FnComparer<T: ?Sized> {
    equals: Box<dyn Fn(&T, &T) -> bool>,
    hash: Box<dyn Fn(&T) -> u64>,
}

impl<T: ?Sized> FnComparer<T> {
    pub fn new(
        equals: impl Fn(&T, &T) -> bool + 'static,
        hash: impl Fn(&T) -> u64 + 'static,
    ) -> Self {
        Self {
            equals: Box::new(equals),
            hash: Box::new(hash),
        }
    }

    /// Compare by a derived key using its natural equality.
    pub fn by_key<K, F>(key: F) -> Self
    where
        K: Eq + Hash,
        F: Fn(&T) -> K + 'static,
    {
        let key = Rc::new(key);
        let hash_key = Rc::clone(&key);
        Self::new(
            move |a, b| key(a) == key(b),
            move |value| DefaultComparer.hash(&hash_key(value)),
        )
    }

    pub fn shared(self) -> SharedComparer<T>
    where
        T: 'static,
    {
        Rc::new(self)
    }
}

impl<T: ?Sized> EqualityComparer<T> for FnComparer<T> {
    fn equals(&self, a: &T, b: &T) -> bool {
        (self.equals)(a, b)
    }

    fn hash(&self, value: &T) -> u64 {
        (self.hash)(value)
    }
}

/// Lifts a comparer over `T` to `Option<T>`: `None` equals only `None` and hashes to 0.
pub struct NullableComparer<T> {
    inner: SharedComparer<T>,
}

impl<T> NullableComparer<T> {
    pub fn new(inner: SharedComparer<T>) -> Self {
        Self { inner }
    }
}

impl<T> EqualityComparer<Option<T>> for NullableComparer<T> {
    fn equals(&self, a: &Option<T>, b: &Option<T>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.inner.equals(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn hash(&self, value: &Option<T>) -> u64 {
        value.as_ref().map_or(0, |value| self.inner.hash(value))
    }
}
