//! Wait-free single-producer/single-consumer sample ring
//!
//! Bridges the input-delivery thread (producer) and the render thread
//! (consumer) of a channel. One slot is always left unused so that
//! `read == write` means empty and `write + 1 == read` means full without a
//! shared counter.
//!
//! # Memory ordering
//!
//! Each side owns one cursor and only reads the other:
//!
//! - The producer copies samples, then publishes the write cursor (`Release`).
//!   The consumer loads it with `Acquire` before touching those slots.
//! - The consumer copies samples out, then publishes the read cursor
//!   (`Release`). The producer loads it with `Acquire` before reusing them.
//!
//! Slots are stored as `AtomicU32` bit patterns of the `f32` samples, so the
//! whole structure is safe Rust and `Sync`. Relaxed slot accesses compile to
//! plain loads and stores on every target we care about.
//!
//! [`SampleRing::clear`] touches both cursors and must not overlap a
//! concurrent `write`/`read`/`skip`.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::types::Sample;

/// Fixed-size circular queue of interleaved samples
pub struct SampleRing {
    slots: Box<[AtomicU32]>,
    /// Next slot the consumer reads (owned by the consumer)
    read: AtomicUsize,
    /// Next slot the producer writes (owned by the producer)
    write: AtomicUsize,
}

impl SampleRing {
    /// Create a ring with `slots` storage slots, holding at most `slots - 1`
    /// samples at once.
    ///
    /// This is the only allocation the ring ever makes.
    pub fn new(slots: usize) -> Self {
        assert!(slots >= 2, "SampleRing needs at least 2 slots, got {}", slots);
        Self {
            slots: (0..slots).map(|_| AtomicU32::new(0)).collect(),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    /// Usable capacity in samples (one less than the slot count)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Number of buffered samples
    #[inline]
    pub fn len(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        self.occupied(read, write)
    }

    /// Free space in samples
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read.load(Ordering::Acquire) == self.write.load(Ordering::Acquire)
    }

    #[inline]
    fn occupied(&self, read: usize, write: usize) -> usize {
        let n = self.slots.len();
        (write + n - read) % n
    }

    #[inline]
    fn advance(&self, pos: usize, count: usize) -> usize {
        (pos + count) % self.slots.len()
    }

    /// Copy as many of `samples` as fit into the ring (producer side)
    ///
    /// Returns the number of samples accepted. Anything beyond the free space
    /// is left for the caller to report as dropped.
    pub fn write(&self, samples: &[Sample]) -> usize {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        let free = self.capacity() - self.occupied(read, write);
        let count = samples.len().min(free);
        if count == 0 {
            return 0;
        }

        let mut pos = write;
        for &sample in &samples[..count] {
            self.slots[pos].store(sample.to_bits(), Ordering::Relaxed);
            pos += 1;
            if pos == self.slots.len() {
                pos = 0;
            }
        }

        self.write.store(pos, Ordering::Release);
        count
    }

    /// Copy up to `dest.len()` buffered samples into `dest` (consumer side)
    ///
    /// Returns the number of samples copied. `dest[returned..]` is left
    /// untouched; silencing it is the caller's job.
    pub fn read(&self, dest: &mut [Sample]) -> usize {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        let count = dest.len().min(self.occupied(read, write));
        if count == 0 {
            return 0;
        }

        let mut pos = read;
        for out in &mut dest[..count] {
            *out = Sample::from_bits(self.slots[pos].load(Ordering::Relaxed));
            pos += 1;
            if pos == self.slots.len() {
                pos = 0;
            }
        }

        self.read.store(pos, Ordering::Release);
        count
    }

    /// Discard up to `count` buffered samples without copying (consumer side)
    ///
    /// Returns the number of samples discarded.
    pub fn skip(&self, count: usize) -> usize {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        let count = count.min(self.occupied(read, write));
        if count > 0 {
            self.read.store(self.advance(read, count), Ordering::Release);
        }
        count
    }

    /// Drop everything buffered by resetting both cursors
    ///
    /// Only valid while neither side is mid-operation (input connect and
    /// disconnect events).
    pub fn clear(&self) {
        self.read.store(0, Ordering::Release);
        self.write.store(0, Ordering::Release);
    }
}

impl std::fmt::Debug for SampleRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRing")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ramp(from: usize, to: usize) -> Vec<Sample> {
        (from..=to).map(|v| v as Sample).collect()
    }

    #[test]
    fn test_capacity_is_one_less_than_slots() {
        let ring = SampleRing::new(8);
        assert_eq!(ring.capacity(), 7);
        assert!(ring.is_empty());
        assert_eq!(ring.free(), 7);
    }

    #[test]
    fn test_round_trip_up_to_capacity() {
        for count in 0..=15 {
            let ring = SampleRing::new(16);
            let input = ramp(1, count);
            assert_eq!(ring.write(&input), count);

            let mut output = vec![0.0; count];
            assert_eq!(ring.read(&mut output), count);
            assert_eq!(output, input);
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn test_no_drops_while_within_capacity() {
        let ring = SampleRing::new(10);
        let mut scratch = [0.0; 9];
        let mut next = 0.0;
        let mut expected = 0.0;

        // Occupancy oscillates between 0 and 9 while the cursors wrap repeatedly
        for round in 0..50 {
            let write_len = 3 + round % 7;
            let chunk: Vec<Sample> = (0..write_len)
                .map(|_| {
                    next += 1.0;
                    next
                })
                .collect();
            assert!(ring.len() + write_len <= ring.capacity());
            assert_eq!(ring.write(&chunk), write_len);

            let read = ring.read(&mut scratch[..write_len]);
            assert_eq!(read, write_len);
            for &s in &scratch[..read] {
                expected += 1.0;
                assert_eq!(s, expected);
            }
        }
    }

    #[test]
    fn test_read_from_empty_returns_zero_and_leaves_dest() {
        let ring = SampleRing::new(8);
        let mut dest = [5.0; 4];
        assert_eq!(ring.read(&mut dest), 0);
        assert_eq!(dest, [5.0; 4]);
    }

    #[test]
    fn test_write_when_full_is_rejected() {
        let ring = SampleRing::new(4);
        assert_eq!(ring.write(&[1.0, 2.0, 3.0]), 3);
        assert_eq!(ring.free(), 0);

        assert_eq!(ring.write(&[9.0, 9.0]), 0);

        let mut dest = [0.0; 3];
        assert_eq!(ring.read(&mut dest), 3);
        assert_eq!(dest, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_partial_write_and_read() {
        // 8 slots, 7 usable
        let ring = SampleRing::new(8);
        assert_eq!(ring.write(&ramp(1, 5)), 5);

        let mut first = [0.0; 3];
        assert_eq!(ring.read(&mut first), 3);
        assert_eq!(first, [1.0, 2.0, 3.0]);
        assert_eq!(ring.len(), 2);

        let more = ramp(6, 11);
        let written = ring.write(&more);
        assert_eq!(written, 5);
        assert_eq!(more.len() - written, 1);

        let mut rest = [0.0; 7];
        assert_eq!(ring.read(&mut rest), 7);
        assert_eq!(rest, [4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_skip_is_bounded_by_occupancy() {
        let ring = SampleRing::new(8);
        ring.write(&ramp(1, 4));

        assert_eq!(ring.skip(2), 2);
        let mut dest = [0.0; 1];
        ring.read(&mut dest);
        assert_eq!(dest[0], 3.0);

        assert_eq!(ring.skip(100), 1);
        assert!(ring.is_empty());
        assert_eq!(ring.skip(3), 0);
    }

    #[test]
    fn test_clear_resets_cursors() {
        let ring = SampleRing::new(8);
        ring.write(&ramp(1, 6));
        let mut dest = [0.0; 4];
        ring.read(&mut dest);

        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.free(), 7);
        assert_eq!(ring.write(&ramp(1, 7)), 7);
    }

    #[test]
    fn test_concurrent_producer_consumer_preserves_order() {
        const TOTAL: usize = 200_000;
        let ring = Arc::new(SampleRing::new(257));

        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut next = 0usize;
                let mut chunk = [0.0; 64];
                while next < TOTAL {
                    let len = chunk.len().min(TOTAL - next);
                    for (i, s) in chunk[..len].iter_mut().enumerate() {
                        *s = (next + i) as Sample;
                    }
                    // Re-offer whatever did not fit
                    let written = ring.write(&chunk[..len]);
                    next += written;
                    if written == 0 {
                        thread::yield_now();
                    }
                }
            })
        };

        let mut expected = 0usize;
        let mut dest = [0.0; 48];
        while expected < TOTAL {
            let read = ring.read(&mut dest);
            for &s in &dest[..read] {
                assert_eq!(s, expected as Sample);
                expected += 1;
            }
            if read == 0 {
                thread::yield_now();
            }
        }

        producer.join().unwrap();
        assert!(ring.is_empty());
    }
}
