//! # Completion Bitmaps
//!
//! Lock-free done-signalling for the sampling protocol. Completion is
//! tracked at two levels, each over a single atomic word:
//!
//! - per VM, one bit per vCPU: set when that core finishes its quota
//! - per session, one bit per VM: set when that VM's bitmap fills
//!
//! Signalling is a set-and-test `fetch_or`: the atomic read-modify-write
//! tells the caller whether it was a duplicate, left bits outstanding, or
//! set the final bit. Exactly one signaller per bitmap observes
//! [`SignalOutcome::NowFull`], which makes the "last one out" transition
//! race-free without locks. A duplicate signal can never unset progress.
//!
//! The `AcqRel` ordering on the signal doubles as the publication edge for
//! the sample writes that precede it: whoever observes the bitmap full also
//! observes every sample written by the cores that signalled.

use core::sync::atomic::{AtomicU64, Ordering};

use static_assertions::const_assert;

use crate::{MAX_CORES, MAX_VMS};

// Both completion levels must fit one atomic word
const_assert!(MAX_CORES <= u64::BITS as usize);
const_assert!(MAX_VMS <= u64::BITS as usize);

/// What a completion signal observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The bit was already set; duplicate signal, no state change.
    AlreadySet,
    /// The bit is now set but other participants are still outstanding.
    Pending,
    /// This signal set the final outstanding bit.
    NowFull,
}

/// Fixed-width completion bit set over one atomic word.
#[derive(Debug)]
pub struct CompletionBitmap {
    bits: AtomicU64,
    width: usize,
}

impl CompletionBitmap {
    /// Create an empty bitmap tracking `width` participants.
    pub const fn new(width: usize) -> Self {
        Self {
            bits: AtomicU64::new(0),
            width,
        }
    }

    /// Mask with one bit per participant.
    fn full_mask(&self) -> u64 {
        if self.width >= u64::BITS as usize {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Mark participant `index` complete and report what the transition saw.
    pub fn signal(&self, index: usize) -> SignalOutcome {
        debug_assert!(index < self.width);
        let mask = 1u64 << index;
        let previous = self.bits.fetch_or(mask, Ordering::AcqRel);

        if previous & mask != 0 {
            SignalOutcome::AlreadySet
        } else if previous | mask == self.full_mask() {
            SignalOutcome::NowFull
        } else {
            SignalOutcome::Pending
        }
    }

    /// Whether every participant has signalled.
    pub fn is_full(&self) -> bool {
        self.bits.load(Ordering::Acquire) == self.full_mask()
    }

    /// Clear the bit of a single participant.
    pub fn clear(&self, index: usize) {
        debug_assert!(index < self.width);
        self.bits.fetch_and(!(1u64 << index), Ordering::AcqRel);
    }

    /// Clear every bit.
    pub fn reset(&self) {
        self.bits.store(0, Ordering::Release);
    }

    /// Raw bit word, for diagnostics.
    pub fn bits(&self) -> u64 {
        self.bits.load(Ordering::Acquire)
    }

    /// Number of tracked participants.
    pub fn width(&self) -> usize {
        self.width
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_signals_stay_pending() {
        let bitmap = CompletionBitmap::new(3);
        assert_eq!(bitmap.signal(0), SignalOutcome::Pending);
        assert_eq!(bitmap.signal(1), SignalOutcome::Pending);
        assert!(!bitmap.is_full());
    }

    #[test]
    fn final_signal_fires_exactly_once() {
        let bitmap = CompletionBitmap::new(3);
        bitmap.signal(0);
        bitmap.signal(2);
        assert_eq!(bitmap.signal(1), SignalOutcome::NowFull);

        // Late and repeated signals observe a full bitmap, never NowFull
        assert_eq!(bitmap.signal(1), SignalOutcome::AlreadySet);
        assert_eq!(bitmap.signal(0), SignalOutcome::AlreadySet);
        assert!(bitmap.is_full());
    }

    #[test]
    fn duplicate_signal_cannot_undo_progress() {
        let bitmap = CompletionBitmap::new(2);
        assert_eq!(bitmap.signal(0), SignalOutcome::Pending);
        assert_eq!(bitmap.signal(0), SignalOutcome::AlreadySet);
        assert_eq!(bitmap.bits(), 0b01);

        assert_eq!(bitmap.signal(1), SignalOutcome::NowFull);
        assert_eq!(bitmap.signal(1), SignalOutcome::AlreadySet);
        assert!(bitmap.is_full());
    }

    #[test]
    fn single_participant_completes_immediately() {
        let bitmap = CompletionBitmap::new(1);
        assert!(!bitmap.is_full());
        assert_eq!(bitmap.signal(0), SignalOutcome::NowFull);
        assert!(bitmap.is_full());
    }

    #[test]
    fn full_word_width_works() {
        let bitmap = CompletionBitmap::new(64);
        for index in 0..63 {
            assert_eq!(bitmap.signal(index), SignalOutcome::Pending);
        }
        assert_eq!(bitmap.signal(63), SignalOutcome::NowFull);
        assert!(bitmap.is_full());
    }

    #[test]
    fn clear_and_reset_reopen_the_bitmap() {
        let bitmap = CompletionBitmap::new(2);
        bitmap.signal(0);
        bitmap.signal(1);
        assert!(bitmap.is_full());

        bitmap.clear(1);
        assert!(!bitmap.is_full());
        assert_eq!(bitmap.signal(1), SignalOutcome::NowFull);

        bitmap.reset();
        assert_eq!(bitmap.bits(), 0);
        assert!(!bitmap.is_full());
    }
}
