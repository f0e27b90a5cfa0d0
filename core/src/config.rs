//! # Session Configuration
//!
//! Validated sampling parameters and the memory-budget clamp. A session
//! records up to [`MAX_EVENTS`] events per core; the results buffer across
//! all cores may not exceed [`MEM_BUDGET_BYTES`], and a sample count that
//! would overrun the budget is clamped down with a warning rather than
//! rejected.

use arrayvec::ArrayVec;
use hvperf_hal::counters::{Event, MAX_COUNTERS};
use static_assertions::const_assert;

use crate::{SessionError, SessionResult};

/// Maximum events recorded per core in one session.
pub const MAX_EVENTS: usize = 6;

/// Results buffer budget across all cores: 1 GiB.
pub const MEM_BUDGET_BYTES: usize = 0x4000_0000;

// A full event list must be mappable onto hardware counters
const_assert!(MAX_EVENTS <= MAX_COUNTERS);

// ============================================================================
// Sample Count Clamp
// ============================================================================

/// Clamp `requested` samples so the results buffer fits the budget.
///
/// Each sample costs `8 * events * cpus` bytes. When the requested count
/// would overrun [`MEM_BUDGET_BYTES`] the largest affordable count is used
/// instead and a warning is logged; the session still runs.
pub fn clamp_samples(events: usize, cpus: usize, requested: usize) -> usize {
    if events == 0 || cpus == 0 {
        return requested;
    }

    let slot_bytes = core::mem::size_of::<u64>() * events * cpus;
    let bytes = slot_bytes.checked_mul(requested).unwrap_or(usize::MAX);
    if bytes <= MEM_BUDGET_BYTES {
        return requested;
    }

    let effective = MEM_BUDGET_BYTES / slot_bytes;
    log::warn!(
        "results buffer over budget: requested {} samples, keeping {} ({} dropped)",
        requested,
        effective,
        requested - effective
    );
    effective
}

// ============================================================================
// Sampling Configuration
// ============================================================================

/// Validated per-session sampling parameters.
///
/// The event order given here is the record order inside every sample row
/// and the order counters are allocated on each core.
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    events: ArrayVec<Event, MAX_EVENTS>,
    period_us: u64,
    requested_samples: usize,
}

impl SamplingConfig {
    /// Build a configuration from an event list, sampling period and
    /// requested sample count.
    pub fn new(events: &[Event], period_us: u64, samples: usize) -> SessionResult<Self> {
        if events.is_empty() {
            return Err(SessionError::NoEvents);
        }
        if events.len() > MAX_EVENTS {
            return Err(SessionError::TooManyEvents {
                requested: events.len(),
            });
        }

        let mut list = ArrayVec::new();
        list.extend(events.iter().copied());

        Ok(Self {
            events: list,
            period_us,
            requested_samples: samples,
        })
    }

    /// Events to record, in configured order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Sampling period in microseconds.
    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    /// Sample count as requested, before any budget clamp.
    pub fn requested_samples(&self) -> usize {
        self.requested_samples
    }
}

// ============================================================================
// Tests
// ============================================================================
