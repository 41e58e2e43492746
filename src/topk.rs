//! Bounded top-k selection over a stream of scored items.

use std::collections::BinaryHeap;

use parking_lot::Mutex;

/// Scored entry kept in a min-heap (lowest score on top, evicted first).
struct Entry<T> {
    score: f64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.score.total_cmp(&other.score).is_eq()
    }
}

impl<T> Eq for Entry<T> {}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: smaller score = higher priority
        other.score.total_cmp(&self.score)
    }
}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Fixed-capacity container retaining the `capacity` highest-scoring items.
///
/// Inserts are `O(log capacity)` and internally synchronized, so one instance
/// can be shared (behind an `Arc`) by many workers. NaN scores are rejected.
pub struct BoundedTopK<T> {
    capacity: usize,
    heap: Mutex<BinaryHeap<Entry<T>>>,
}

impl<T> BoundedTopK<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: Mutex::new(BinaryHeap::with_capacity(capacity.saturating_add(1).min(4096))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Offer an item. Returns `true` if it was retained.
    pub fn push(&self, score: f64, item: T) -> bool {
        if self.capacity == 0 || score.is_nan() {
            return false;
        }
        let mut heap = self.heap.lock();
        if heap.len() < self.capacity {
            heap.push(Entry { score, item });
            return true;
        }
        match heap.peek() {
            Some(worst) if score > worst.score => {
                heap.pop();
                heap.push(Entry { score, item });
                true
            }
            _ => false,
        }
    }

    /// Lowest retained score, if any.
    pub fn min_score(&self) -> Option<f64> {
        self.heap.lock().peek().map(|e| e.score)
    }

    /// Consume the container, returning `(score, item)` pairs by descending score.
    pub fn into_sorted_vec(self) -> Vec<(f64, T)> {
        let heap = self.heap.into_inner();
        // BinaryHeap::into_sorted_vec is ascending by Ord, i.e. descending by score.
        heap.into_sorted_vec()
            .into_iter()
            .map(|e| (e.score, e.item))
            .collect()
    }

    /// Take the retained items by descending score, leaving the container empty.
    pub fn drain(&self) -> Vec<(f64, T)> {
        let heap = std::mem::take(&mut *self.heap.lock());
        heap.into_sorted_vec()
            .into_iter()
            .map(|e| (e.score, e.item))
            .collect()
    }
}

impl<T> std::fmt::Debug for BoundedTopK<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedTopK")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
