//! # PMU Event Encodings
//!
//! Fixed mapping from the logical [`Event`] vocabulary to the PMUv3
//! `evtCount` encodings written into PMXEVTYPER_EL0. Architectural events
//! occupy the 0x00..0x1E range; the 0xC0..0xE8 tail is Cortex-A53
//! implementation defined.

use crate::counters::Event;

/// Hardware `evtCount` encoding for `event`.
pub const fn encoding(event: Event) -> u16 {
    match event {
        Event::SwIncr => 0x00,
        Event::L1iCacheRefill => 0x01,
        Event::L1iTlbRefill => 0x02,
        Event::L1dCacheRefill => 0x03,
        Event::L1dCache => 0x04,
        Event::L1dTlbRefill => 0x05,
        Event::LdRetired => 0x06,
        Event::StRetired => 0x07,
        Event::InstRetired => 0x08,
        Event::ExcTaken => 0x09,
        Event::ExcReturn => 0x0A,
        Event::CidWriteRetired => 0x0B,
        Event::PcWriteRetired => 0x0C,
        Event::BrImmedRetired => 0x0D,
        Event::UnalignedLdstRetired => 0x0F,
        Event::BrMisPred => 0x10,
        Event::CpuCycles => 0x11,
        Event::BrPred => 0x12,
        Event::MemAccess => 0x13,
        Event::L1iCache => 0x14,
        Event::L1dCacheWb => 0x15,
        Event::L2dCache => 0x16,
        Event::L2dCacheRefill => 0x17,
        Event::L2dCacheWb => 0x18,
        Event::BusAccess => 0x19,
        Event::MemoryError => 0x1A,
        Event::BusCycles => 0x1D,
        Event::Chain => 0x1E,
        Event::BusAccessLd => 0x60,
        Event::BusAccessSt => 0x61,
        Event::BrIndirectSpec => 0x7A,
        Event::ExcIrq => 0x86,
        Event::ExcFiq => 0x87,
        Event::ExtMemReq => 0xC0,
        Event::NcExtMemReq => 0xC1,
        Event::LinefillPref => 0xC2,
        Event::IcacheThrottle => 0xC3,
        Event::EnterReadAlloc => 0xC4,
        Event::ReadAlloc => 0xC5,
        Event::PredecodeError => 0xC6,
        Event::StoreBufFullStall => 0xC7,
        Event::ScuSnooped => 0xC8,
        Event::CondBrExec => 0xC9,
        Event::IndBrMispred => 0xCA,
        Event::IndBrMispredAddr => 0xCB,
        Event::CondBrMispred => 0xCC,
        Event::L1iMemError => 0xD0,
        Event::L1dMemError => 0xD1,
        Event::TlbMemError => 0xD2,
        Event::StallDpuIqEmpty => 0xE0,
        Event::StallIcacheMiss => 0xE1,
        Event::StallItlbMiss => 0xE2,
        Event::StallPredecodeError => 0xE3,
        Event::StallInterlock => 0xE4,
        Event::StallInterlockAgu => 0xE5,
        Event::StallInterlockFpSimd => 0xE6,
        Event::StallLoadMiss => 0xE7,
        Event::StallStore => 0xE8,
    }
}

// ============================================================================
// Tests
// ============================================================================
