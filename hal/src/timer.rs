//! # Sampling Timer Interface
//!
//! Trait seam for the per-core countdown timer that paces the sampling
//! loop. The architecture driver programs the EL2 physical timer; mocks
//! implement the same primitives for host-side tests. Periods are given in
//! microseconds and converted against the system counter frequency with
//! truncating integer math.

use crate::irq::{IrqControl, IrqError, IrqHandler};

/// Convert a period in microseconds to timer ticks at `freq_hz`.
///
/// Plain integer math, the fractional part of the tick count is dropped.
pub fn us_to_ticks(period_us: u64, freq_hz: u64) -> u64 {
    (period_us * freq_hz) / 1_000_000
}

/// Operations on one core's sampling timer.
///
/// The required methods are raw register-level primitives; the provided
/// methods compose them into the arm/reschedule protocol the profiling
/// core uses. Nothing here may block.
pub trait SampleTimer {
    /// System counter frequency in Hz.
    fn frequency(&self) -> u64;

    /// Start the countdown and unmask the timer interrupt.
    fn enable(&mut self);

    /// Stop the countdown.
    fn disable(&mut self);

    /// Program the countdown register with `ticks`.
    ///
    /// Implementations may truncate to the width of the hardware count
    /// field.
    fn set_count(&mut self, ticks: u64);

    /// Current countdown value.
    fn value(&self) -> u64;

    /// Interrupt line this timer fires on.
    fn irq_line(&self) -> u32;

    /// Program a period of `period_us` and start the timer.
    ///
    /// Returns the tick count that was programmed so callers can reuse it
    /// for cheap re-arming via [`SampleTimer::reschedule`].
    fn init(&mut self, period_us: u64) -> u64 {
        let ticks = us_to_ticks(period_us, self.frequency());
        self.set_count(ticks);
        self.enable();
        ticks
    }

    /// Rewind the countdown with a previously computed tick count.
    ///
    /// Does not touch the enable bit; the interrupt handler re-enables
    /// separately after it has finished its work.
    fn reschedule(&mut self, ticks: u64) {
        self.set_count(ticks);
    }

    /// Rewind the countdown from a period in microseconds.
    ///
    /// Recomputes the tick count from the current frequency and returns it.
    fn reschedule_us(&mut self, period_us: u64) -> u64 {
        let ticks = us_to_ticks(period_us, self.frequency());
        self.set_count(ticks);
        ticks
    }

    /// Bind `handler` to this timer's interrupt line and unmask the line.
    fn register_callback<C: IrqControl>(
        &self,
        chip: &mut C,
        handler: IrqHandler,
    ) -> Result<(), IrqError> {
        let line = self.irq_line();
        chip.reserve(line, handler)?;
        chip.set_enabled(line, true);
        log::debug!("sample timer bound to irq line {}", line);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct MockTimer {
        freq: u64,
        count: u64,
        enabled: bool,
    }

    impl MockTimer {
        fn new(freq: u64) -> Self {
            Self {
                freq,
                count: 0,
                enabled: false,
            }
        }
    }

    impl SampleTimer for MockTimer {
        fn frequency(&self) -> u64 {
            self.freq
        }

        fn enable(&mut self) {
            self.enabled = true;
        }

        fn disable(&mut self) {
            self.enabled = false;
        }

        fn set_count(&mut self, ticks: u64) {
            self.count = ticks;
        }

        fn value(&self) -> u64 {
            self.count
        }

        fn irq_line(&self) -> u32 {
            26
        }
    }

    #[test]
    fn period_to_ticks_is_freq_scaled() {
        // 62.5 MHz system counter, 1ms period
        assert_eq!(us_to_ticks(1000, 62_500_000), 62_500);
        // 1s period at 1 MHz
        assert_eq!(us_to_ticks(1_000_000, 1_000_000), 1_000_000);
    }

    #[test]
    fn period_to_ticks_truncates() {
        // 7us at 19.2 MHz is 134.4 ticks, fraction dropped
        assert_eq!(us_to_ticks(7, 19_200_000), 134);
        // Sub-tick period collapses to zero
        assert_eq!(us_to_ticks(1, 500_000), 0);
    }

    #[test]
    fn init_programs_and_enables() {
        let mut timer = MockTimer::new(62_500_000);
        let ticks = timer.init(1000);

        assert_eq!(ticks, 62_500);
        assert_eq!(timer.value(), 62_500);
        assert!(timer.enabled);
    }

    #[test]
    fn reschedule_leaves_enable_alone() {
        let mut timer = MockTimer::new(62_500_000);
        let ticks = timer.init(1000);

        timer.disable();
        timer.reschedule(ticks);
        assert_eq!(timer.value(), 62_500);
        assert!(!timer.enabled);

        let again = timer.reschedule_us(2000);
        assert_eq!(again, 125_000);
        assert_eq!(timer.value(), 125_000);
        assert!(!timer.enabled);
    }

    #[test]
    fn same_period_reschedules_identically() {
        let mut timer = MockTimer::new(24_000_000);
        let armed = timer.init(333);
        let rearmed = timer.reschedule_us(333);
        assert_eq!(armed, rearmed);
    }
}
