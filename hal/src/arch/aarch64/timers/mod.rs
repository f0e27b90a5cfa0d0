//! # EL2 Physical Timer Driver
//!
//! [`SampleTimer`] implementation over the hypervisor physical timer
//! (CNTHP_*). One instance exists per core; the countdown paces that
//! core's sampling loop and fires PPI 26 on expiry.
//!
//! ## Register Set
//!
//! | Register        | Description                                     |
//! |-----------------|-------------------------------------------------|
//! | CNTHP_CTL_EL2   | Control (ENABLE, IMASK, ISTATUS)                |
//! | CNTHP_TVAL_EL2  | Countdown value, low 32 bits                    |
//! | CNTFRQ_EL0      | System counter frequency                        |
//!
//! The countdown is written with a low-32-bit splice: the upper word of
//! CNTHP_TVAL_EL2 is preserved and only the count field is replaced.

use core::arch::asm;

use crate::timer::SampleTimer;

// ============================================================================
// Timer Constants
// ============================================================================

/// Hypervisor Physical Timer PPI ID (EL2)
pub const TIMER_PPI_HYP_PHYS: u32 = 26;

// ============================================================================
// System Register Access
// ============================================================================

/// Read CNTHP_CTL_EL2 (Hypervisor Physical Timer Control)
#[inline]
pub fn read_cnthp_ctl_el2() -> u64 {
    let value: u64;
    unsafe {
        asm!("mrs {}, cnthp_ctl_el2", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write CNTHP_CTL_EL2
#[inline]
pub fn write_cnthp_ctl_el2(value: u64) {
    unsafe {
        asm!("msr cnthp_ctl_el2, {}", in(reg) value, options(nomem, nostack));
    }
}

/// Read CNTHP_TVAL_EL2 (Hypervisor Physical Timer Value)
#[inline]
pub fn read_cnthp_tval_el2() -> u64 {
    let value: u64;
    unsafe {
        asm!("mrs {}, cnthp_tval_el2", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write CNTHP_TVAL_EL2
#[inline]
pub fn write_cnthp_tval_el2(value: u64) {
    unsafe {
        asm!("msr cnthp_tval_el2, {}", in(reg) value, options(nomem, nostack));
    }
}

/// Read CNTFRQ_EL0 (Counter Frequency Register)
#[inline]
pub fn read_cntfrq_el0() -> u64 {
    let value: u64;
    unsafe {
        asm!("mrs {}, cntfrq_el0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

// ============================================================================
// Control Register Bits
// ============================================================================

/// Control register bit definitions
pub mod ctl {
    /// Timer enable bit
    pub const ENABLE: u64 = 1 << 0;
    /// Interrupt mask bit (1 = masked)
    pub const IMASK: u64 = 1 << 1;
    /// Interrupt status bit (read-only)
    pub const ISTATUS: u64 = 1 << 2;
}

// ============================================================================
// Hypervisor Physical Timer
// ============================================================================

/// EL2 Physical Timer
///
/// Uses CNTHP_* registers and generates PPI 26. Only accessible at EL2.
#[derive(Debug)]
pub struct HypTimer {
    /// Cached frequency, CNTFRQ_EL0 is fixed after boot
    frequency: u64,
}

impl HypTimer {
    /// Create a driver for the current core's EL2 physical timer.
    ///
    /// # Safety
    /// Only call this when running at EL2.
    pub unsafe fn new() -> Self {
        Self {
            frequency: read_cntfrq_el0() & 0xFFFF_FFFF,
        }
    }

    /// Whether the timer condition is met (ISTATUS set).
    pub fn is_pending(&self) -> bool {
        read_cnthp_ctl_el2() & ctl::ISTATUS != 0
    }
}

impl SampleTimer for HypTimer {
    fn frequency(&self) -> u64 {
        self.frequency
    }

    fn enable(&mut self) {
        let control = read_cnthp_ctl_el2();
        write_cnthp_ctl_el2((control | ctl::ENABLE) & !ctl::IMASK);
    }

    fn disable(&mut self) {
        let control = read_cnthp_ctl_el2();
        write_cnthp_ctl_el2(control & !ctl::ENABLE);
    }

    fn set_count(&mut self, ticks: u64) {
        // Splice the count into the low word, preserving the upper bits
        let tval = read_cnthp_tval_el2() & 0xFFFF_FFFF_0000_0000;
        write_cnthp_tval_el2(tval | (ticks & 0xFFFF_FFFF));
    }

    fn value(&self) -> u64 {
        read_cnthp_tval_el2()
    }

    fn irq_line(&self) -> u32 {
        TIMER_PPI_HYP_PHYS
    }
}
