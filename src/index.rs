use std::ops::Range;

/// Items kept sorted by a scalar key so that every item whose key lies in
/// `[key - window, key + window]` is one contiguous slice.
///
/// Insertion is a binary search plus a splice; queries are two binary
/// searches. Items with equal keys keep their insertion order.
#[derive(Debug, Clone)]
pub struct NeighborhoodIndex<T> {
    keys: Vec<f64>,
    items: Vec<T>,
}

impl<T> Default for NeighborhoodIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NeighborhoodIndex<T> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            items: Vec::with_capacity(capacity),
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Inserts `item` at its sorted position and returns that position.
    ///
    /// # Panics
    /// On a non-finite key, or if the splice would leave the index unsorted.
    pub fn insert(&mut self, key: f64, item: T) -> usize {
        assert!(
            key.is_finite(),
            "index corruption: refusing non-finite sort key {}",
            key
        );

        let pos = self.keys.partition_point(|&k| k <= key);
        self.keys.insert(pos, key);
        self.items.insert(pos, item);

        let sorted_left = pos == 0 || self.keys[pos - 1] <= key;
        let sorted_right = pos + 1 == self.keys.len() || key <= self.keys[pos + 1];
        assert!(
            sorted_left && sorted_right,
            "index corruption: key {} spliced out of order at {}",
            key,
            pos
        );
        pos
    }

    /// Positions of all items with key in `[key - window, key + window]`.
    pub fn range(&self, key: f64, window: f64) -> Range<usize> {
        let lo_key = key - window;
        let hi_key = key + window;
        let lo = self.keys.partition_point(|&k| k < lo_key);
        let hi = self.keys.partition_point(|&k| k <= hi_key);
        lo..hi.max(lo)
    }

    pub fn query(&self, key: f64, window: f64) -> &[T] {
        let r = self.range(key, window);
        &self.items[r]
    }

    pub fn key_at(&self, pos: usize) -> f64 {
        self.keys[pos]
    }

    pub fn get(&self, pos: usize) -> Option<&T> {
        self.items.get(pos)
    }

    pub fn keys(&self) -> &[f64] {
        &self.keys
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Mutable access that cannot change ordering (keys stay untouched).
    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &T)> {
        self.keys.iter().copied().zip(self.items.iter())
    }
}
