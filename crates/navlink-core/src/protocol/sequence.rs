//! Thread-safe sequence counter for frame numbering.
//!
//! # What is the frame sequence byte? (for beginners)
//!
//! Every MAVLink frame carries a one-byte sequence number in its header.  Each
//! sender increments it per frame and lets it wrap from 255 back to 0.  A
//! receiver uses gaps in the sequence to estimate packet loss on the link.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU8` internally.  The harness sends from the driver
//! thread and emits heartbeats from the receive task, and both draw from the
//! same counter; an atomic `fetch_add` hands each of them a distinct value
//! without taking a lock.

use std::sync::atomic::{AtomicU8, Ordering};

/// A thread-safe, wrapping counter for frame sequence numbers.
///
/// # Examples
///
/// ```rust
/// use navlink_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU8,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose first value is `start`.
    pub fn starting_at(start: u8) -> Self {
        Self {
            inner: AtomicU8::new(start),
        }
    }

    /// Returns the next sequence number and atomically increments the counter.
    ///
    /// Wraps from 255 to 0 without panicking.
    pub fn next(&self) -> u8 {
        // `fetch_add` on atomics is wrapping and returns the value before the add.
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) would hand out.
    pub fn current(&self) -> u8 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequence_counter_starts_at_zero() {
        // Arrange
        let counter = SequenceCounter::new();

        // Act
        let first = counter.next();

        // Assert
        assert_eq!(first, 0);
    }

    #[test]
    fn test_sequence_counter_wraps_at_u8_max() {
        // Arrange
        let counter = SequenceCounter::starting_at(u8::MAX);

        // Act
        let last = counter.next();
        let wrapped = counter.next();

        // Assert
        assert_eq!(last, 255);
        assert_eq!(wrapped, 0);
    }

    #[test]
    fn test_sequence_counter_current_does_not_advance() {
        let counter = SequenceCounter::new();
        counter.next();
        assert_eq!(counter.current(), 1);
        assert_eq!(counter.current(), 1);
    }

    #[test]
    fn test_sequence_counter_concurrent_values_are_distinct() {
        // Arrange – 4 threads × 50 draws stays under one full wrap
        let counter = Arc::new(SequenceCounter::new());

        // Act
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || (0..50).map(|_| c.next()).collect::<Vec<u8>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for v in h.join().unwrap() {
                seen.insert(v);
            }
        }

        // Assert
        assert_eq!(seen.len(), 200);
    }
}
