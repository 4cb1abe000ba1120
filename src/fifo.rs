//! Fixed-capacity circular FIFO
//!
//! Bridges data between a producer context (BLE host callback) and a consumer
//! task. Each single-item operation takes the raw mutex `M` only for the copy
//! and the cursor update; batch operations (`write_n`, `read_n`) release it
//! between items, so a concurrent reader may observe a partial batch.
//!
//! The queue is single-producer, single-consumer by convention only.
//!
//! A FIFO with zero depth or a zero-sized item type is treated as
//! uninitialised: every operation fails (`false`, `0` or `None`) and nothing
//! panics.

use core::cell::RefCell;
use core::mem::{size_of, MaybeUninit};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// What `write` does when the FIFO is already full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Refuse the new item, leaving the FIFO unchanged
    Reject,
    /// Store the new item and drop the single oldest one
    Overwrite,
}

impl OverflowPolicy {
    /// Policy from a boolean `overwritable` flag
    pub const fn from_overwritable(overwritable: bool) -> Self {
        if overwritable {
            Self::Overwrite
        } else {
            Self::Reject
        }
    }
}

/// Cursor state plus backing storage, only touched with the lock held
struct Ring<T, const N: usize> {
    buf: [MaybeUninit<T>; N],
    rd_idx: usize,
    wr_idx: usize,
    count: usize,
}

impl<T: Copy, const N: usize> Ring<T, N> {
    const fn new() -> Self {
        Self {
            buf: [MaybeUninit::uninit(); N],
            rd_idx: 0,
            wr_idx: 0,
            count: 0,
        }
    }

    const fn advance(idx: usize) -> usize {
        if idx + 1 == N {
            0
        } else {
            idx + 1
        }
    }

    fn is_full(&self) -> bool {
        self.count == N
    }

    fn push(&mut self, item: T, policy: OverflowPolicy) -> bool {
        if self.is_full() && policy == OverflowPolicy::Reject {
            return false;
        }

        self.buf[self.wr_idx].write(item);
        self.wr_idx = Self::advance(self.wr_idx);

        if self.is_full() {
            // The slot just written held the oldest item; the next one is now oldest
            self.rd_idx = self.wr_idx;
        } else {
            self.count += 1;
        }

        true
    }

    fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }

        // Safety: slots in rd_idx..rd_idx + count (mod N) have been written
        let item = unsafe { self.buf[self.rd_idx].assume_init() };
        self.rd_idx = Self::advance(self.rd_idx);
        self.count -= 1;
        Some(item)
    }

    fn peek(&self, position: usize) -> Option<T> {
        if position >= self.count {
            return None;
        }

        let idx = (self.rd_idx + position) % N;
        // Safety: idx lies within the written window checked above
        Some(unsafe { self.buf[idx].assume_init() })
    }

    fn clear(&mut self) {
        self.rd_idx = 0;
        self.wr_idx = 0;
        self.count = 0;
    }
}

/// Circular FIFO of `N` items of type `T`, guarded by raw mutex `M`.
///
/// Use `CriticalSectionRawMutex` when producer and consumer run in different
/// contexts (interrupt or host callback vs task), `NoopRawMutex` when both
/// sides live in the same executor.
pub struct Fifo<M: RawMutex, T, const N: usize> {
    policy: OverflowPolicy,
    ring: Mutex<M, RefCell<Ring<T, N>>>,
}

impl<M: RawMutex, T: Copy, const N: usize> Fifo<M, T, N> {
    /// Create an empty FIFO with the given overflow policy
    pub const fn new(policy: OverflowPolicy) -> Self {
        Self {
            policy,
            ring: Mutex::new(RefCell::new(Ring::new())),
        }
    }

    /// False for a zero-depth FIFO or a zero-sized item type
    pub const fn is_initialised(&self) -> bool {
        N != 0 && size_of::<T>() != 0
    }

    /// Write one item.
    ///
    /// Returns true if the item was stored, including when an overwritable
    /// FIFO dropped its oldest item to make room.
    pub fn write(&self, item: T) -> bool {
        if !self.is_initialised() {
            return false;
        }
        self.ring
            .lock(|ring| ring.borrow_mut().push(item, self.policy))
    }

    /// Write items until all are stored or one is rejected.
    ///
    /// Returns the number of items written.
    pub fn write_n(&self, items: &[T]) -> usize {
        let mut written = 0;
        for &item in items {
            if !self.write(item) {
                break;
            }
            written += 1;
        }
        written
    }

    /// Remove and return the oldest item
    pub fn read(&self) -> Option<T> {
        if !self.is_initialised() {
            return None;
        }
        self.ring.lock(|ring| ring.borrow_mut().pop())
    }

    /// Read items into `out` until it is full or the FIFO runs empty.
    ///
    /// Returns the number of items read.
    pub fn read_n(&self, out: &mut [T]) -> usize {
        let mut read = 0;
        for slot in out.iter_mut() {
            match self.read() {
                Some(item) => *slot = item,
                None => break,
            }
            read += 1;
        }
        read
    }

    /// Copy the item `position` places behind the read cursor without
    /// removing it. Position 0 is the item the next `read` returns.
    pub fn peek_at(&self, position: usize) -> Option<T> {
        if !self.is_initialised() {
            return None;
        }
        self.ring.lock(|ring| ring.borrow().peek(position))
    }

    /// Discard all items. The backing storage is not zeroed.
    pub fn clear(&self) {
        self.ring.lock(|ring| ring.borrow_mut().clear());
    }

    /// Number of items currently stored
    pub fn len(&self) -> usize {
        self.ring.lock(|ring| ring.borrow().count)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.is_initialised() && self.ring.lock(|ring| ring.borrow().is_full())
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};

    type ByteFifo<const N: usize> = Fifo<NoopRawMutex, u8, N>;

    #[test]
    fn test_order_preserved() {
        let fifo: Fifo<NoopRawMutex, u32, 10> = Fifo::new(OverflowPolicy::Reject);

        for i in 0..10 {
            assert!(fifo.write(i));
        }
        for i in 0..10 {
            assert_eq!(fifo.read(), Some(i));
        }
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_full_and_empty() {
        let fifo: ByteFifo<4> = Fifo::new(OverflowPolicy::Reject);
        assert!(fifo.is_empty());
        assert!(!fifo.is_full());

        // Scenario: depth 4, write [1,2,3,4], 5th write fails, one read frees a slot
        assert_eq!(fifo.write_n(&[1, 2, 3, 4]), 4);
        assert!(fifo.is_full());
        assert!(!fifo.write(5));
        assert!(fifo.is_full());
        assert_eq!(fifo.len(), 4);

        assert_eq!(fifo.read(), Some(1));
        assert!(!fifo.is_full());
        assert_eq!(fifo.len(), 3);
    }

    #[test]
    fn test_overwrite_drops_oldest() {
        let fifo: Fifo<NoopRawMutex, u32, 2> = Fifo::new(OverflowPolicy::Overwrite);

        assert!(fifo.write(1));
        assert!(fifo.write(2));
        assert!(fifo.is_full());

        // Overflow keeps the FIFO full and evicts 1
        assert!(fifo.write(100));
        assert_eq!(fifo.len(), 2);

        assert_eq!(fifo.read(), Some(2));
        assert_eq!(fifo.read(), Some(100));
        assert_eq!(fifo.read(), None);
    }

    #[test]
    fn test_overwrite_depth_plus_one() {
        let fifo: ByteFifo<8> = Fifo::new(OverflowPolicy::Overwrite);
        let items: [u8; 9] = [10, 11, 12, 13, 14, 15, 16, 17, 18];

        assert_eq!(fifo.write_n(&items), 9);

        let mut out = [0u8; 8];
        assert_eq!(fifo.read_n(&mut out), 8);
        assert_eq!(out, [11, 12, 13, 14, 15, 16, 17, 18]);
    }

    #[test]
    fn test_write_n_stops_when_full() {
        let fifo: ByteFifo<3> = Fifo::new(OverflowPolicy::Reject);

        assert_eq!(fifo.write_n(&[1, 2, 3, 4, 5]), 3);
        assert_eq!(fifo.write_n(&[6]), 0);
        assert_eq!(fifo.write_n(&[]), 0);
    }

    #[test]
    fn test_read_n_stops_when_empty() {
        let fifo: ByteFifo<8> = Fifo::new(OverflowPolicy::Reject);
        fifo.write_n(&[7, 8]);

        let mut out = [0u8; 5];
        assert_eq!(fifo.read_n(&mut out), 2);
        assert_eq!(&out[..2], &[7, 8]);
        assert_eq!(fifo.read_n(&mut out), 0);
    }

    #[test]
    fn test_wraparound_round_trip() {
        let fifo: ByteFifo<5> = Fifo::new(OverflowPolicy::Reject);

        // Move the cursors off zero so the batch wraps the end of storage
        fifo.write_n(&[0, 0, 0]);
        let mut sink = [0u8; 3];
        fifo.read_n(&mut sink);

        let payload = [0xA1, 0xB2, 0xC3, 0xD4, 0xE5];
        assert_eq!(fifo.write_n(&payload), 5);

        let mut out = [0u8; 5];
        assert_eq!(fifo.read_n(&mut out), 5);
        assert_eq!(out, payload);
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let fifo: ByteFifo<4> = Fifo::new(OverflowPolicy::Reject);
        fifo.write_n(&[42, 43, 44]);

        for _ in 0..5 {
            assert_eq!(fifo.peek_at(0), Some(42));
        }
        assert_eq!(fifo.peek_at(2), Some(44));
        assert_eq!(fifo.peek_at(3), None);
        assert_eq!(fifo.len(), 3);

        assert_eq!(fifo.read(), Some(42));
        assert_eq!(fifo.peek_at(0), Some(43));
    }

    #[test]
    fn test_peek_after_overwrite() {
        let fifo: ByteFifo<3> = Fifo::new(OverflowPolicy::Overwrite);
        fifo.write_n(&[1, 2, 3, 4, 5]);

        assert_eq!(fifo.peek_at(0), Some(3));
        assert_eq!(fifo.peek_at(1), Some(4));
        assert_eq!(fifo.peek_at(2), Some(5));
    }

    #[test]
    fn test_clear() {
        let fifo: ByteFifo<4> = Fifo::new(OverflowPolicy::Reject);
        fifo.write_n(&[1, 2, 3, 4]);

        fifo.clear();
        assert!(fifo.is_empty());
        assert_eq!(fifo.read(), None);
        assert_eq!(fifo.peek_at(0), None);

        assert!(fifo.write(9));
        assert_eq!(fifo.read(), Some(9));
    }

    #[test]
    fn test_uninitialised_fifo_fails_safely() {
        let zero_depth: ByteFifo<0> = Fifo::new(OverflowPolicy::Overwrite);
        assert!(!zero_depth.is_initialised());
        assert!(!zero_depth.write(1));
        assert_eq!(zero_depth.write_n(&[1, 2]), 0);
        assert_eq!(zero_depth.read(), None);
        assert_eq!(zero_depth.read_n(&mut [0u8; 4]), 0);
        assert_eq!(zero_depth.peek_at(0), None);
        assert!(zero_depth.is_empty());
        assert!(!zero_depth.is_full());
        zero_depth.clear();

        let zero_sized: Fifo<NoopRawMutex, (), 4> = Fifo::new(OverflowPolicy::Reject);
        assert!(!zero_sized.is_initialised());
        assert!(!zero_sized.write(()));
        assert_eq!(zero_sized.read(), None);
        assert!(!zero_sized.is_full());
    }

    #[test]
    fn test_policy_from_flag() {
        assert_eq!(OverflowPolicy::from_overwritable(true), OverflowPolicy::Overwrite);
        assert_eq!(OverflowPolicy::from_overwritable(false), OverflowPolicy::Reject);
    }

    #[test]
    fn test_spsc_across_threads() {
        const TOTAL: u32 = 2000;
        let fifo: Fifo<CriticalSectionRawMutex, u32, 16> = Fifo::new(OverflowPolicy::Reject);

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..TOTAL {
                    while !fifo.write(i) {
                        std::thread::yield_now();
                    }
                }
            });

            let mut expected = 0;
            while expected < TOTAL {
                match fifo.read() {
                    Some(v) => {
                        assert_eq!(v, expected);
                        expected += 1;
                    }
                    None => std::thread::yield_now(),
                }
            }
        });

        assert!(fifo.is_empty());
    }
}
