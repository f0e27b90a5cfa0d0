//! # Event Counter Interface
//!
//! Logical event vocabulary and the [`CounterBank`] trait through which the
//! profiling core programs the per-core PMU. The trait hides the select/access
//! register protocol of the hardware; the architecture drivers in
//! [`crate::arch`] implement it, and host-side tests substitute mocks.
//!
//! ## Counter Lifecycle
//!
//! ```text
//!   enable() ──▶ configure(id, event) ──▶ arm(id, budget) ──▶ counting
//!                                                               │
//!                              read(id) ◀── sample tick ◀───────┘
//!                              clear_overflow(id)
//!                              arm(id, u32::MAX)   (re-arm for next period)
//! ```

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of event counters addressable through the PMU select
/// register (5-bit index field).
pub const MAX_COUNTERS: usize = 32;

// ============================================================================
// Counter Identity
// ============================================================================

/// Handle for one hardware event counter.
///
/// Produced by [`crate::CounterPool`] allocation; the raw index selects the
/// counter in the PMU select register and in the enable/overflow bit masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterId(u8);

impl CounterId {
    /// Create a counter handle from a raw index.
    ///
    /// The index must be below [`MAX_COUNTERS`]; higher values cannot be
    /// addressed by the select register.
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Raw counter index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Single-bit mask for the enable set/clear and overflow registers.
    pub const fn mask(self) -> u32 {
        1 << self.0
    }
}

/// Counter allocation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterError {
    /// Every usable counter is already allocated
    Exhausted,
}

impl core::fmt::Display for CounterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CounterError::Exhausted => write!(f, "All usable counters are allocated"),
        }
    }
}

// ============================================================================
// Logical Events
// ============================================================================

/// Countable PMU event.
///
/// Architectural events cover the ARMv8-A common set; the tail of the list
/// carries Cortex-A53 implementation-defined events. The architecture driver
/// maps each variant to its hardware encoding through a fixed table, one
/// encoding per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Software increment.
    SwIncr,
    /// L1 instruction cache refill.
    L1iCacheRefill,
    /// L1 instruction TLB refill.
    L1iTlbRefill,
    /// L1 data cache refill.
    L1dCacheRefill,
    /// L1 data cache access.
    L1dCache,
    /// L1 data TLB refill.
    L1dTlbRefill,
    /// Load instruction architecturally executed.
    LdRetired,
    /// Store instruction architecturally executed.
    StRetired,
    /// Instruction architecturally executed.
    InstRetired,
    /// Exception taken.
    ExcTaken,
    /// Exception return architecturally executed.
    ExcReturn,
    /// Write to CONTEXTIDR architecturally executed.
    CidWriteRetired,
    /// Software change of the PC architecturally executed.
    PcWriteRetired,
    /// Immediate branch architecturally executed.
    BrImmedRetired,
    /// Unaligned load or store architecturally executed.
    UnalignedLdstRetired,
    /// Mispredicted or not predicted branch speculatively executed.
    BrMisPred,
    /// Processor cycles.
    CpuCycles,
    /// Predictable branch speculatively executed.
    BrPred,
    /// Data memory access.
    MemAccess,
    /// L1 instruction cache access.
    L1iCache,
    /// L1 data cache write-back.
    L1dCacheWb,
    /// L2 data cache access.
    L2dCache,
    /// L2 data cache refill.
    L2dCacheRefill,
    /// L2 data cache write-back.
    L2dCacheWb,
    /// Bus access.
    BusAccess,
    /// Local memory error.
    MemoryError,
    /// Bus cycles.
    BusCycles,
    /// Odd-numbered counter chain increment.
    Chain,
    /// Bus access, read.
    BusAccessLd,
    /// Bus access, write.
    BusAccessSt,
    /// Indirect branch speculatively executed.
    BrIndirectSpec,
    /// IRQ exception taken.
    ExcIrq,
    /// FIQ exception taken.
    ExcFiq,

    // ------------------------------------------------------------------
    // Cortex-A53 implementation-defined events
    // ------------------------------------------------------------------
    /// External memory request.
    ExtMemReq,
    /// Non-cacheable external memory request.
    NcExtMemReq,
    /// Linefill caused by prefetch.
    LinefillPref,
    /// Instruction cache throttle occurred.
    IcacheThrottle,
    /// Entered read-allocate mode.
    EnterReadAlloc,
    /// Cycles in read-allocate mode.
    ReadAlloc,
    /// Pre-decode error.
    PredecodeError,
    /// Data write stalled the pipeline, store buffer full.
    StoreBufFullStall,
    /// SCU snooped data from another core for this core.
    ScuSnooped,
    /// Conditional branch executed.
    CondBrExec,
    /// Indirect branch mispredicted.
    IndBrMispred,
    /// Indirect branch mispredicted on address miscompare.
    IndBrMispredAddr,
    /// Conditional branch mispredicted.
    CondBrMispred,
    /// L1 instruction cache memory error.
    L1iMemError,
    /// L1 data cache memory error.
    L1dMemError,
    /// TLB memory error.
    TlbMemError,
    /// Cycles with the DPU issue queue empty, no miss in flight.
    StallDpuIqEmpty,
    /// Cycles with the DPU issue queue empty on an instruction cache miss.
    StallIcacheMiss,
    /// Cycles with the DPU issue queue empty on an instruction micro-TLB miss.
    StallItlbMiss,
    /// Cycles with the DPU issue queue empty on a pre-decode error.
    StallPredecodeError,
    /// Interlock cycles, not AGU or FP/SIMD related.
    StallInterlock,
    /// Interlock cycles on a load/store waiting for an AGU address operand.
    StallInterlockAgu,
    /// Interlock cycles on an FP/SIMD instruction.
    StallInterlockFpSimd,
    /// Write-stage stall cycles caused by a load miss.
    StallLoadMiss,
    /// Write-stage stall cycles caused by a store.
    StallStore,
}

impl Event {
    /// Every countable event, in ascending hardware-encoding order.
    pub const ALL: [Event; 58] = [
        Event::SwIncr,
        Event::L1iCacheRefill,
        Event::L1iTlbRefill,
        Event::L1dCacheRefill,
        Event::L1dCache,
        Event::L1dTlbRefill,
        Event::LdRetired,
        Event::StRetired,
        Event::InstRetired,
        Event::ExcTaken,
        Event::ExcReturn,
        Event::CidWriteRetired,
        Event::PcWriteRetired,
        Event::BrImmedRetired,
        Event::UnalignedLdstRetired,
        Event::BrMisPred,
        Event::CpuCycles,
        Event::BrPred,
        Event::MemAccess,
        Event::L1iCache,
        Event::L1dCacheWb,
        Event::L2dCache,
        Event::L2dCacheRefill,
        Event::L2dCacheWb,
        Event::BusAccess,
        Event::MemoryError,
        Event::BusCycles,
        Event::Chain,
        Event::BusAccessLd,
        Event::BusAccessSt,
        Event::BrIndirectSpec,
        Event::ExcIrq,
        Event::ExcFiq,
        Event::ExtMemReq,
        Event::NcExtMemReq,
        Event::LinefillPref,
        Event::IcacheThrottle,
        Event::EnterReadAlloc,
        Event::ReadAlloc,
        Event::PredecodeError,
        Event::StoreBufFullStall,
        Event::ScuSnooped,
        Event::CondBrExec,
        Event::IndBrMispred,
        Event::IndBrMispredAddr,
        Event::CondBrMispred,
        Event::L1iMemError,
        Event::L1dMemError,
        Event::TlbMemError,
        Event::StallDpuIqEmpty,
        Event::StallIcacheMiss,
        Event::StallItlbMiss,
        Event::StallPredecodeError,
        Event::StallInterlock,
        Event::StallInterlockAgu,
        Event::StallInterlockFpSimd,
        Event::StallLoadMiss,
        Event::StallStore,
    ];
}

// ============================================================================
// Counter Bank Operations Trait
// ============================================================================

/// Operations on one core's bank of PMU event counters.
///
/// All methods are register-level and non-blocking; nothing here may sleep
/// or take a lock, the sampling interrupt handler calls straight into this
/// trait.
pub trait CounterBank {
    /// Turn the bank on.
    ///
    /// Grants hypervisor-level access to the bank and returns how many
    /// counters this core implements.
    fn enable(&mut self) -> u8;

    /// Turn the bank off again, counterpart of [`CounterBank::enable`].
    fn disable(&mut self);

    /// Low counter indices ceded to guest use, unavailable for sampling.
    fn reserved(&self) -> u8 {
        0
    }

    /// Bind `counter` to a logical event, replacing any previous binding.
    ///
    /// The privilege filter is reset so guest execution at EL0/EL1 is
    /// counted while hypervisor execution stays filtered out.
    fn configure(&mut self, counter: CounterId, event: Event);

    /// Load `counter` so it overflows after roughly `budget` further events.
    ///
    /// The hardware register is written with `u32::MAX - budget`; arming
    /// with `u32::MAX` therefore restarts the count from zero with the
    /// full 32-bit range ahead of it.
    fn arm(&mut self, counter: CounterId, budget: u32);

    /// Snapshot the current value of `counter` without disturbing it.
    fn read(&mut self, counter: CounterId) -> u64;

    /// Clear the pending overflow flag of `counter`.
    fn clear_overflow(&mut self, counter: CounterId);

    /// Start or stop `counter` without touching its configuration.
    fn set_counting(&mut self, counter: CounterId, on: bool);
}
