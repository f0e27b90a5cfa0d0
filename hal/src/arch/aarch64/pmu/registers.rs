//! # PMUv3 System Register Access
//!
//! Raw accessors for the performance monitor registers plus their field
//! definitions. The PMXEV* registers are windowed: PMSELR_EL0 selects
//! which event counter the subsequent PMXEVTYPER/PMXEVCNTR access hits.
//!
//! | Register        | Description                                    |
//! |-----------------|------------------------------------------------|
//! | PMCR_EL0        | Control; N field gives implemented counters    |
//! | PMSELR_EL0      | Event counter select window                    |
//! | PMXEVTYPER_EL0  | Selected counter event type and filter         |
//! | PMXEVCNTR_EL0   | Selected counter value (32-bit)                |
//! | PMCNTENSET_EL0  | Per-counter enable, write-one-to-set           |
//! | PMCNTENCLR_EL0  | Per-counter enable, write-one-to-clear         |
//! | PMOVSCLR_EL0    | Overflow flags, write-one-to-clear             |
//! | MDCR_EL2        | EL2 debug/PMU gate (HPME, HPMN)                |

use core::arch::asm;

use bitflags::bitflags;

// ============================================================================
// System Register Access
// ============================================================================

/// Read PMCR_EL0 (Performance Monitors Control Register)
#[inline]
pub fn read_pmcr_el0() -> u64 {
    let value: u64;
    unsafe {
        asm!("mrs {}, pmcr_el0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write PMCR_EL0
#[inline]
pub fn write_pmcr_el0(value: u64) {
    unsafe {
        asm!("msr pmcr_el0, {}", in(reg) value, options(nomem, nostack));
    }
}

/// Read PMSELR_EL0 (Event Counter Selection Register)
#[inline]
pub fn read_pmselr_el0() -> u64 {
    let value: u64;
    unsafe {
        asm!("mrs {}, pmselr_el0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write PMSELR_EL0
#[inline]
pub fn write_pmselr_el0(value: u64) {
    unsafe {
        asm!("msr pmselr_el0, {}", in(reg) value, options(nomem, nostack));
    }
}

/// Read PMXEVTYPER_EL0 (Selected Event Type Register)
#[inline]
pub fn read_pmxevtyper_el0() -> u64 {
    let value: u64;
    unsafe {
        asm!("mrs {}, pmxevtyper_el0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write PMXEVTYPER_EL0
#[inline]
pub fn write_pmxevtyper_el0(value: u64) {
    unsafe {
        asm!("msr pmxevtyper_el0, {}", in(reg) value, options(nomem, nostack));
    }
}

/// Read PMXEVCNTR_EL0 (Selected Event Count Register)
#[inline]
pub fn read_pmxevcntr_el0() -> u64 {
    let value: u64;
    unsafe {
        asm!("mrs {}, pmxevcntr_el0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write PMXEVCNTR_EL0
#[inline]
pub fn write_pmxevcntr_el0(value: u64) {
    unsafe {
        asm!("msr pmxevcntr_el0, {}", in(reg) value, options(nomem, nostack));
    }
}

/// Read PMCNTENSET_EL0 (Count Enable Set Register)
#[inline]
pub fn read_pmcntenset_el0() -> u64 {
    let value: u64;
    unsafe {
        asm!("mrs {}, pmcntenset_el0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write PMCNTENSET_EL0
#[inline]
pub fn write_pmcntenset_el0(value: u64) {
    unsafe {
        asm!("msr pmcntenset_el0, {}", in(reg) value, options(nomem, nostack));
    }
}

/// Write PMCNTENCLR_EL0 (Count Enable Clear Register)
#[inline]
pub fn write_pmcntenclr_el0(value: u64) {
    unsafe {
        asm!("msr pmcntenclr_el0, {}", in(reg) value, options(nomem, nostack));
    }
}

/// Write PMOVSCLR_EL0 (Overflow Flag Status Clear Register)
#[inline]
pub fn write_pmovsclr_el0(value: u64) {
    unsafe {
        asm!("msr pmovsclr_el0, {}", in(reg) value, options(nomem, nostack));
    }
}

/// Read MDCR_EL2 (Monitor Debug Configuration Register)
#[inline]
pub fn read_mdcr_el2() -> u64 {
    let value: u64;
    unsafe {
        asm!("mrs {}, mdcr_el2", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Write MDCR_EL2
#[inline]
pub fn write_mdcr_el2(value: u64) {
    unsafe {
        asm!("msr mdcr_el2, {}", in(reg) value, options(nomem, nostack));
    }
}

// ============================================================================
// Register Fields
// ============================================================================

/// PMCR_EL0 field definitions
pub mod pmcr {
    /// Position of the N field (number of implemented event counters)
    pub const N_SHIFT: u64 = 11;
    /// Mask of the N field, bits [15:11]
    pub const N_MASK: u64 = 0x1F << N_SHIFT;
}

/// PMSELR_EL0 field definitions
pub mod pmselr {
    /// Counter select field, bits [4:0]
    pub const SEL_MASK: u64 = 0x1F;
}

/// MDCR_EL2 field definitions
pub mod mdcr {
    /// Hypervisor performance monitors enable, bit [7]
    ///
    /// Gates the counters in the HPMN..N range; with HPMN at zero it is
    /// the master enable for the whole bank.
    pub const HPME: u64 = 1 << 7;
    /// Count of counters left accessible to the guest, bits [4:0]
    pub const HPMN_MASK: u64 = 0x1F;
}

/// PMXEVTYPER_EL0 field definitions
pub mod evtyper {
    /// Event number field, bits [9:0]
    pub const EVTCOUNT_MASK: u64 = 0x3FF;
}

bitflags! {
    /// PMXEVTYPER_EL0 privilege filter bits.
    ///
    /// A cleared filter counts EL0 and EL1 and leaves EL2/EL3 execution
    /// out of the profile.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventFilter: u64 {
        /// Do not count events at EL1
        const P = 1 << 31;
        /// Do not count events at EL0
        const U = 1 << 30;
        /// Count Non-secure EL1 when equal to P
        const NSK = 1 << 29;
        /// Count Non-secure EL0 when equal to U
        const NSU = 1 << 28;
        /// Count events at EL2
        const NSH = 1 << 27;
        /// Count Secure EL3 when equal to P
        const M = 1 << 26;
        /// Count events on any PE with matching affinity
        const MT = 1 << 25;
        /// Count Secure EL2 when not equal to NSH
        const SH = 1 << 24;
    }
}
