const DEFAULT_CAPACITY: usize = 4;

/// Append-only buffer for results whose final length is unknown.
///
/// Capacity doubles when full (starting at 4, or at whatever `with_capacity` asked for), so
/// appends are amortized O(1). [`ArrayBuilder::to_array`] trims to the exact length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayBuilder<T> {
    items: Vec<T>,
}

impl<T> ArrayBuilder<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn add(&mut self, item: T) {
        if self.items.len() == self.items.capacity() {
            self.grow(self.items.len() + 1);
        }
        self.items.push(item);
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Exactly-sized copy of the contents.
    pub fn to_array(self) -> Box<[T]> {
        self.items.into_boxed_slice()
    }

    pub fn into_vec(mut self) -> Vec<T> {
        self.items.shrink_to_fit();
        self.items
    }

    fn grow(&mut self, min: usize) {
        let capacity = self.items.capacity();
        let next = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity.saturating_mul(2)
        };
        let next = next.max(min);
        self.items.reserve_exact(next - self.items.len());
    }
}

impl<T> Default for ArrayBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Extend<T> for ArrayBuilder<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.add(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a ArrayBuilder<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_default_capacity() {
        let mut builder = ArrayBuilder::new();
        assert_eq!(builder.capacity(), 0);
        builder.add(1);
        assert_eq!(builder.capacity(), 4);
        for i in 2..=5 {
            builder.add(i);
        }
        assert_eq!(builder.capacity(), 8);
        assert_eq!(builder.len(), 5);
        assert_eq!(builder.get(4), Some(&5));
        assert_eq!(builder.get(5), None);
    }

    #[test]
    fn doubles_from_single_slot() {
        let mut builder = ArrayBuilder::with_capacity(1);
        let mut seen = Vec::new();
        for i in 0..5 {
            builder.add(i);
            seen.push(builder.capacity());
        }
        assert_eq!(seen, vec![1, 2, 4, 4, 8]);
    }

    #[test]
    fn to_array_is_exact() {
        let mut builder = ArrayBuilder::new();
        builder.extend(["a", "b", "c"]);
        let array = builder.to_array();
        assert_eq!(array.len(), 3);
        assert_eq!(&*array, &["a", "b", "c"]);
    }
}
