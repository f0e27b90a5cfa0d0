//! # PMUv3 Counter Bank Driver
//!
//! [`CounterBank`] implementation over the AArch64 performance monitor
//! registers. Every access goes through the PMSELR_EL0 select window; the
//! driver is per-core and must only touch the bank of the core it runs on.
//!
//! Counter enable is layered: MDCR_EL2.HPME gates the hypervisor-owned
//! range of the bank while PMCNTENSET/CLR switch individual counters.
//! With HPMN programmed to zero the guest keeps no counters and HPME
//! controls the whole bank.

pub mod registers;

use crate::counters::{CounterBank, CounterId, Event};

use super::events;
use registers::{evtyper, mdcr, pmcr, pmselr, EventFilter};

/// Event counters ceded to guest use.
///
/// The profiler keeps the entire bank, so MDCR_EL2.HPMN is programmed to
/// zero and nothing below the reserved offset exists.
pub const GUEST_COUNTERS: u8 = 0;

/// One core's PMUv3 event counter bank.
#[derive(Debug)]
pub struct Pmu {
    /// Implemented counter count, latched from PMCR_EL0.N at construction.
    usable: u8,
}

impl Pmu {
    /// Create a driver for the current core's PMU.
    ///
    /// # Safety
    /// PMU programming and MDCR_EL2 access require execution at EL2.
    pub unsafe fn new() -> Self {
        let control = registers::read_pmcr_el0();
        let implemented = ((control & pmcr::N_MASK) >> pmcr::N_SHIFT) as u8;
        Self { usable: implemented }
    }

    /// Point the PMXEV* register window at `counter`.
    fn select(counter: CounterId) {
        let mut sel = registers::read_pmselr_el0();
        sel = (sel & !pmselr::SEL_MASK) | (counter.index() as u64 & pmselr::SEL_MASK);
        registers::write_pmselr_el0(sel);
    }
}

impl CounterBank for Pmu {
    fn enable(&mut self) -> u8 {
        let mut gate = registers::read_mdcr_el2();
        gate &= !mdcr::HPMN_MASK;
        gate |= mdcr::HPME | u64::from(GUEST_COUNTERS);
        registers::write_mdcr_el2(gate);

        log::debug!("pmu bank enabled: {} counters", self.usable);
        self.usable
    }

    fn disable(&mut self) {
        let gate = registers::read_mdcr_el2();
        registers::write_mdcr_el2(gate & !mdcr::HPME);
    }

    fn reserved(&self) -> u8 {
        GUEST_COUNTERS
    }

    fn configure(&mut self, counter: CounterId, event: Event) {
        debug_assert!(counter.index() < usize::from(self.usable));
        Self::select(counter);

        let mut typer = registers::read_pmxevtyper_el0();
        typer &= !EventFilter::all().bits();
        typer &= !evtyper::EVTCOUNT_MASK;
        typer |= u64::from(events::encoding(event));
        registers::write_pmxevtyper_el0(typer);
    }

    fn arm(&mut self, counter: CounterId, budget: u32) {
        debug_assert!(counter.index() < usize::from(self.usable));
        Self::select(counter);

        // Loaded so the counter overflows once `budget` events have passed
        registers::write_pmxevcntr_el0(u64::from(u32::MAX - budget));
    }

    fn read(&mut self, counter: CounterId) -> u64 {
        Self::select(counter);
        registers::read_pmxevcntr_el0()
    }

    fn clear_overflow(&mut self, counter: CounterId) {
        registers::write_pmovsclr_el0(u64::from(counter.mask()));
    }

    fn set_counting(&mut self, counter: CounterId, on: bool) {
        if on {
            let set = registers::read_pmcntenset_el0();
            registers::write_pmcntenset_el0(set | u64::from(counter.mask()));
        } else {
            registers::write_pmcntenclr_el0(u64::from(counter.mask()));
        }
    }
}
