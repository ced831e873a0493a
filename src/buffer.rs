use crate::error::ConfigError;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// How many records a buffer may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Unbounded,
    Bounded(usize),
}

impl Capacity {
    /// `-1` for unbounded, the bound otherwise.
    pub fn as_i64(self) -> i64 {
        match self {
            Capacity::Unbounded => -1,
            Capacity::Bounded(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }
}

impl TryFrom<i64> for Capacity {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Capacity::Unbounded),
            n if n >= 0 => usize::try_from(n)
                .map(Capacity::Bounded)
                .map_err(|_| ConfigError::InvalidCapacity(n)),
            n => Err(ConfigError::InvalidCapacity(n)),
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Unbounded => f.write_str("unbounded"),
            Capacity::Bounded(n) => write!(f, "{n}"),
        }
    }
}

/// Ordered queue of deferred entries with oldest-first eviction.
///
/// Every operation takes the same lock, so a drain observes a consistent
/// snapshot: an entry is returned by exactly one drain or removed by a
/// clear, never both and never lost in between.
pub struct PastBuffer<T> {
    inner: Mutex<Inner<T>>,
    /// Entries dropped because an append overflowed the capacity.
    evicted: AtomicU64,
}

struct Inner<T> {
    items: VecDeque<T>,
    capacity: Capacity,
}

impl<T> PastBuffer<T> {
    pub fn new(capacity: Capacity) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                capacity,
            }),
            evicted: AtomicU64::new(0),
        }
    }

    // Nothing user-supplied runs under this lock, so a poisoned guard still
    // holds a consistent queue.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push `item` to the tail, evicting from the head while the buffer is
    /// over capacity. Returns the number of entries evicted.
    pub fn append(&self, item: T) -> usize {
        let mut inner = self.lock();
        inner.items.push_back(item);
        let excess = match inner.capacity {
            Capacity::Bounded(max) => inner.items.len().saturating_sub(max),
            Capacity::Unbounded => 0,
        };
        if excess > 0 {
            inner.items.drain(..excess);
            self.evicted.fetch_add(excess as u64, Ordering::Relaxed);
        }
        excess
    }

    /// Take every buffered entry, oldest first, leaving the buffer empty.
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.lock();
        inner.items.drain(..).collect()
    }

    /// Discard every buffered entry. Returns how many were discarded.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let n = inner.items.len();
        inner.items.clear();
        n
    }

    /// Change the bound for future appends. Entries already held are kept
    /// even if they exceed the new bound; the next append trims them.
    pub fn set_capacity(&self, capacity: Capacity) {
        self.lock().capacity = capacity;
    }

    pub fn capacity(&self) -> Capacity {
        self.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl<T> fmt::Debug for PastBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("PastBuffer")
            .field("len", &inner.items.len())
            .field("capacity", &inner.capacity)
            .field("evicted", &self.evicted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn capacity_from_sentinel_and_counts() {
        assert_eq!(Capacity::try_from(-1), Ok(Capacity::Unbounded));
        assert_eq!(Capacity::try_from(0), Ok(Capacity::Bounded(0)));
        assert_eq!(Capacity::try_from(-2), Err(ConfigError::InvalidCapacity(-2)));
        assert_eq!(Capacity::Bounded(7).as_i64(), 7);
    }

    #[test]
    fn huge_bound_does_not_read_as_unbounded() {
        assert_eq!(Capacity::Bounded(usize::MAX).as_i64(), i64::MAX);
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let buf = PastBuffer::new(Capacity::Bounded(2));
        assert_eq!(buf.append("a"), 0);
        assert_eq!(buf.append("b"), 0);
        assert_eq!(buf.append("c"), 1);
        assert_eq!(buf.append("d"), 1);
        assert_eq!(buf.evicted(), 2);
        assert_eq!(buf.drain(), vec!["c", "d"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn zero_capacity_holds_nothing() {
        let buf = PastBuffer::new(Capacity::Bounded(0));
        buf.append(1);
        buf.append(2);
        assert!(buf.drain().is_empty());
        assert_eq!(buf.evicted(), 2);
    }

    #[test]
    fn unbounded_keeps_everything() {
        let buf = PastBuffer::new(Capacity::Unbounded);
        for i in 0..5_000 {
            buf.append(i);
        }
        assert_eq!(buf.len(), 5_000);
        assert_eq!(buf.evicted(), 0);
    }

    #[test]
    fn shrinking_capacity_is_not_retroactive() {
        let buf = PastBuffer::new(Capacity::Bounded(10));
        for i in 0..5 {
            buf.append(i);
        }
        buf.set_capacity(Capacity::Bounded(2));
        assert_eq!(buf.len(), 5);
        buf.append(5);
        assert_eq!(buf.drain(), vec![4, 5]);
    }

    #[test]
    fn clear_discards_and_reports() {
        let buf = PastBuffer::new(Capacity::Unbounded);
        buf.append("x");
        buf.append("y");
        assert_eq!(buf.clear(), 2);
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn concurrent_appends_and_drains_lose_nothing() {
        let buf = Arc::new(PastBuffer::new(Capacity::Unbounded));
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let buf = Arc::clone(&buf);
                thread::spawn(move || {
                    for i in 0..1_000 {
                        buf.append(w * 1_000 + i);
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while writers.iter().any(|h| !h.is_finished()) {
            seen.extend(buf.drain());
        }
        for h in writers {
            h.join().unwrap();
        }
        seen.extend(buf.drain());

        seen.sort_unstable();
        assert_eq!(seen, (0..4_000).collect::<Vec<_>>());
    }
}
