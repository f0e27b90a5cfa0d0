//! # AArch64 Profiling Drivers
//!
//! EL2-level drivers for the two devices the sampler depends on.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     AArch64 profiling hardware                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌───────────────────────────┐  ┌───────────────────────────┐   │
//! │  │        PMU (PMUv3)        │  │    EL2 Physical Timer     │   │
//! │  │                           │  │                           │   │
//! │  │ PMCR_EL0.N   capability   │  │ CNTHP_CTL_EL2   control   │   │
//! │  │ PMSELR_EL0   select       │  │ CNTHP_TVAL_EL2  countdown │   │
//! │  │ PMXEVTYPER   event type   │  │ CNTFRQ_EL0      frequency │   │
//! │  │ PMXEVCNTR    count value  │  │                           │   │
//! │  │ PMCNTENSET/CLR, PMOVSCLR  │  │ IRQ: PPI 26               │   │
//! │  │ MDCR_EL2     EL2 gate     │  │                           │   │
//! │  └───────────────────────────┘  └───────────────────────────┘   │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The select-then-access PMU protocol (write the counter index to
//! PMSELR_EL0, then touch PMXEV* registers) is serialized per core by
//! construction: each core programs only its own bank and the sampler
//! never re-enters.

pub mod events;

#[cfg(target_arch = "aarch64")]
pub mod pmu;

#[cfg(target_arch = "aarch64")]
pub mod timers;

#[cfg(target_arch = "aarch64")]
pub use pmu::Pmu;

#[cfg(target_arch = "aarch64")]
pub use timers::HypTimer;
