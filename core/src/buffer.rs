//! # Results Buffer
//!
//! Pre-sized shared store for every counter value a session records. The
//! layout is row-major over `(sample, event, cpu)` with the cpu dimension
//! innermost:
//!
//! ```text
//! index = sample * events * cpus  +  event * cpus  +  cpu
//!
//! sample 0 │ e0: c0 c1 … │ e1: c0 c1 … │ …
//! sample 1 │ e0: c0 c1 … │ e1: c0 c1 … │ …
//! ```
//!
//! Each core writes only the slots of its own cpu column, so concurrent
//! sampling never races. The master reads the whole buffer, but only after
//! the completion bitmaps prove every writer has finished; the bitmaps'
//! acquire/release ordering publishes the writes.

use core::ptr::NonNull;

use crate::platform::{pages_for, SharedPages};
use crate::{SessionError, SessionResult};

/// Shared `(sample, event, cpu)` value store.
pub struct ResultsBuffer {
    base: NonNull<u64>,
    samples: usize,
    events: usize,
    cpus: usize,
}

// Safety: slots are partitioned by cpu column, each core writes only its
// own column and the master reads only after completion is signalled.
unsafe impl Send for ResultsBuffer {}
unsafe impl Sync for ResultsBuffer {}

impl ResultsBuffer {
    /// Bytes needed for a `samples x events x cpus` buffer.
    pub const fn bytes_for(samples: usize, events: usize, cpus: usize) -> usize {
        core::mem::size_of::<u64>() * samples * events * cpus
    }

    /// Allocate a buffer from the platform's shared page allocator.
    pub fn allocate<P: SharedPages>(
        pages: &mut P,
        samples: usize,
        events: usize,
        cpus: usize,
    ) -> SessionResult<Self> {
        let bytes = Self::bytes_for(samples, events, cpus);
        let page_count = pages_for(bytes);

        let base = if page_count == 0 {
            // Zero-sample session records nothing
            NonNull::dangling()
        } else {
            pages
                .alloc_pages(page_count)
                .ok_or(SessionError::OutOfMemory { pages: page_count })?
                .cast()
        };

        // Safety: the allocation covers `bytes` and stays mapped for the
        // session lifetime.
        Ok(unsafe { Self::from_raw(base, samples, events, cpus) })
    }

    /// Wrap raw memory as a results buffer.
    ///
    /// # Safety
    /// `base` must point to at least [`Self::bytes_for`] `(samples, events,
    /// cpus)` bytes of writable memory that outlives the buffer, visible to
    /// every participating core.
    pub unsafe fn from_raw(
        base: NonNull<u64>,
        samples: usize,
        events: usize,
        cpus: usize,
    ) -> Self {
        Self {
            base,
            samples,
            events,
            cpus,
        }
    }

    /// Linear slot index of `(sample, event, cpu)`.
    pub fn index(&self, sample: usize, event: usize, cpu: usize) -> usize {
        sample * self.events * self.cpus + event * self.cpus + cpu
    }

    /// Record one counter value.
    pub fn write_sample(&self, sample: usize, event: usize, cpu: usize, value: u64) {
        debug_assert!(sample < self.samples && event < self.events && cpu < self.cpus);
        let index = self.index(sample, event, cpu);
        unsafe {
            self.base.as_ptr().add(index).write_volatile(value);
        }
    }

    /// Read one recorded value.
    pub fn read_sample(&self, sample: usize, event: usize, cpu: usize) -> u64 {
        debug_assert!(sample < self.samples && event < self.events && cpu < self.cpus);
        let index = self.index(sample, event, cpu);
        unsafe { self.base.as_ptr().add(index).read_volatile() }
    }

    /// Sample capacity.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Events per sample row.
    pub fn events(&self) -> usize {
        self.events
    }

    /// Cpu columns per event row.
    pub fn cpus(&self) -> usize {
        self.cpus
    }

    /// Total value slots.
    pub fn len(&self) -> usize {
        self.samples * self.events * self.cpus
    }

    /// Whether the buffer holds no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for ResultsBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResultsBuffer")
            .field("samples", &self.samples)
            .field("events", &self.events)
            .field("cpus", &self.cpus)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_over(mem: &mut [u64], samples: usize, events: usize, cpus: usize) -> ResultsBuffer {
        assert_eq!(mem.len(), samples * events * cpus);
        let base = NonNull::new(mem.as_mut_ptr()).unwrap();
        unsafe { ResultsBuffer::from_raw(base, samples, events, cpus) }
    }

    #[test]
    fn cpu_dimension_is_innermost() {
        let mut mem = [0u64; 24];
        let buf = buffer_over(&mut mem, 4, 3, 2);

        assert_eq!(buf.index(0, 0, 0), 0);
        assert_eq!(buf.index(0, 0, 1), 1);
        assert_eq!(buf.index(0, 1, 0), 2);
        assert_eq!(buf.index(1, 0, 0), 6);
        assert_eq!(buf.index(3, 2, 1), 23);
    }

    #[test]
    fn linear_index_is_injective() {
        let mut mem = [0u64; 24];
        let buf = buffer_over(&mut mem, 4, 3, 2);

        let mut seen = [false; 24];
        for sample in 0..4 {
            for event in 0..3 {
                for cpu in 0..2 {
                    let index = buf.index(sample, event, cpu);
                    assert!(index < buf.len());
                    assert!(!seen[index], "slot {} hit twice", index);
                    seen[index] = true;
                }
            }
        }
        assert!(seen.iter().all(|hit| *hit));
    }

    #[test]
    fn samples_round_trip_by_coordinate() {
        let mut mem = [0u64; 12];
        let buf = buffer_over(&mut mem, 2, 3, 2);

        for sample in 0..2 {
            for event in 0..3 {
                for cpu in 0..2 {
                    let value = (sample * 100 + event * 10 + cpu) as u64;
                    buf.write_sample(sample, event, cpu, value);
                }
            }
        }

        for sample in 0..2 {
            for event in 0..3 {
                for cpu in 0..2 {
                    let expected = (sample * 100 + event * 10 + cpu) as u64;
                    assert_eq!(buf.read_sample(sample, event, cpu), expected);
                }
            }
        }
    }

    #[test]
    fn distinct_coordinates_never_clobber() {
        let mut mem = [0u64; 8];
        let buf = buffer_over(&mut mem, 2, 2, 2);

        buf.write_sample(0, 0, 0, 11);
        buf.write_sample(0, 0, 1, 22);
        buf.write_sample(1, 1, 1, 33);

        assert_eq!(buf.read_sample(0, 0, 0), 11);
        assert_eq!(buf.read_sample(0, 0, 1), 22);
        assert_eq!(buf.read_sample(1, 1, 1), 33);
    }
}
