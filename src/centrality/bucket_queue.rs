use std::collections::VecDeque;

/// min-priority queue over a bounded range of integer priorities
///
/// One bucket per priority value, so `insert` is O(1) and `extract_min` is amortized
/// O(1) as long as priorities are only inserted at or above the last extracted one.
/// Items sharing a priority are extracted in insertion order.
#[derive(Debug, Clone)]
pub struct BucketQueue<T> {
    min_priority: i64,
    buckets: Vec<VecDeque<T>>,
    cursor: usize, // no bucket below this index holds an item
    len: usize,
}

impl<T> BucketQueue<T> {

    /// creates an empty queue accepting priorities in `[min_priority, max_priority]`
    pub fn new(min_priority: i64, max_priority: i64) -> Self {
        assert!(min_priority <= max_priority, "empty priority range [{}, {}]", min_priority, max_priority);

        let n_buckets = (max_priority - min_priority) as usize + 1;
        let mut buckets = Vec::with_capacity(n_buckets);
        buckets.resize_with(n_buckets, VecDeque::new);

        Self {
            min_priority,
            buckets,
            cursor: n_buckets,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn max_priority(&self) -> i64 {
        self.min_priority + self.buckets.len() as i64 - 1
    }

    pub fn insert(&mut self, priority: i64, item: T) {
        assert!(
            priority >= self.min_priority && priority <= self.max_priority(),
            "priority {} outside of [{}, {}]",
            priority,
            self.min_priority,
            self.max_priority()
        );

        let bucket = (priority - self.min_priority) as usize;
        self.buckets[bucket].push_back(item);
        self.cursor = self.cursor.min(bucket);
        self.len += 1;
    }

    /// removes the item with the smallest priority, `None` if the queue is empty
    pub fn extract_min(&mut self) -> Option<(i64, T)> {
        if self.is_empty() {
            return None;
        }

        while self.buckets[self.cursor].is_empty() {
            self.cursor += 1;
        }

        let item = self.buckets[self.cursor].pop_front()?;
        self.len -= 1;

        Some((self.min_priority + self.cursor as i64, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_in_priority_order() {
        let mut queue = BucketQueue::new(-10, 0);
        queue.insert(-3, 'a');
        queue.insert(-10, 'b');
        queue.insert(0, 'c');
        queue.insert(-7, 'd');

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.extract_min(), Some((-10, 'b')));
        assert_eq!(queue.extract_min(), Some((-7, 'd')));
        assert_eq!(queue.extract_min(), Some((-3, 'a')));
        assert_eq!(queue.extract_min(), Some((0, 'c')));
        assert_eq!(queue.extract_min(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn equal_priorities_are_fifo() {
        let mut queue = BucketQueue::new(0, 2);
        for item in 0..5 {
            queue.insert(1, item);
        }

        let order: Vec<_> = std::iter::from_fn(|| queue.extract_min()).map(|(_, item)| item).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn insert_below_cursor_after_extraction() {
        let mut queue = BucketQueue::new(0, 5);
        queue.insert(4, "late");
        assert_eq!(queue.extract_min(), Some((4, "late")));

        queue.insert(5, "last");
        queue.insert(1, "early");
        assert_eq!(queue.extract_min(), Some((1, "early")));
        assert_eq!(queue.extract_min(), Some((5, "last")));
    }

    #[test]
    #[should_panic]
    fn rejects_priority_out_of_range() {
        let mut queue = BucketQueue::new(-2, 2);
        queue.insert(3, ());
    }
}
