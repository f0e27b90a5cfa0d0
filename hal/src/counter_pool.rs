//! # Counter Pool
//!
//! Per-core allocation state for the PMU event counters. One pool instance
//! exists per core; a set bit marks the matching counter as taken.
//! Allocation is deterministic lowest-free-first so every core hands out
//! the same counter indices for the same event list.

use static_assertions::const_assert;

use crate::counters::{CounterError, CounterId, MAX_COUNTERS};

// The allocation word must cover every selectable counter
const_assert!(MAX_COUNTERS <= u32::BITS as usize);

/// Allocation bitmap over one core's event counters.
///
/// Counters below `reserved` are never handed out; they are left for guest
/// use when the hypervisor cedes part of the bank.
#[derive(Debug, Clone, Copy)]
pub struct CounterPool {
    /// One bit per counter, set when allocated.
    bitmap: u32,
    /// Counters implemented and usable on this core.
    usable: u8,
    /// Low counters withheld from allocation.
    reserved: u8,
}

impl CounterPool {
    /// Create a pool over `usable` counters, withholding the first
    /// `reserved` of them.
    ///
    /// The usable count is clamped to the 32-counter architectural maximum
    /// so the bitmap always covers the whole pool.
    pub const fn new(usable: u8, reserved: u8) -> Self {
        let usable = if usable as usize > MAX_COUNTERS {
            MAX_COUNTERS as u8
        } else {
            usable
        };
        Self {
            bitmap: 0,
            usable,
            reserved,
        }
    }

    /// Create an empty pool with no usable counters.
    pub const fn empty() -> Self {
        Self::new(0, 0)
    }

    /// Allocate the lowest free counter at or above the reserved offset.
    pub fn alloc(&mut self) -> Result<CounterId, CounterError> {
        for index in self.reserved..self.usable {
            let mask = 1u32 << index;
            if self.bitmap & mask == 0 {
                self.bitmap |= mask;
                return Ok(CounterId::new(index));
            }
        }
        Err(CounterError::Exhausted)
    }

    /// Return `counter` to the pool.
    pub fn free(&mut self, counter: CounterId) {
        debug_assert!(counter.index() < self.usable as usize);
        self.bitmap &= !(counter.mask());
    }

    /// Whether `counter` is currently allocated.
    pub fn is_allocated(&self, counter: CounterId) -> bool {
        self.bitmap & counter.mask() != 0
    }

    /// Number of counters still available for allocation.
    pub fn remaining(&self) -> usize {
        (self.reserved..self.usable)
            .filter(|index| self.bitmap & (1u32 << index) == 0)
            .count()
    }
}

// ============================================================================
// Tests
// ============================================================================
