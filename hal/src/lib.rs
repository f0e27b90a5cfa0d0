//! # hvperf Hardware Abstraction Layer
//!
//! Hardware access layer for the hypervisor self-profiling subsystem. It
//! covers the two devices profiling depends on, the per-core PMU and the
//! per-core EL2 generic timer, and defines the trait seams the profiling
//! core drives them through.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         hvperf-hal                                  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐   │
//! │  │  counters    │  │    timer     │  │          irq             │   │
//! │  │              │  │              │  │                          │   │
//! │  │ • Event      │  │ • SampleTimer│  │ • IrqHandler             │   │
//! │  │ • CounterId  │  │ • us_to_ticks│  │ • IrqControl             │   │
//! │  │ • CounterBank│  │              │  │                          │   │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────────────────────┘   │
//! │         │                 │                                         │
//! │  ┌──────┴───────┐         │          ┌──────────────────────────┐   │
//! │  │ counter_pool │         │          │      arch::aarch64       │   │
//! │  │              │         │          │                          │   │
//! │  │ • CounterPool│         └──────────│ • pmu (PMEV* access)     │   │
//! │  │   (bitmap)   │                    │ • timers (CNTHP_* EL2)   │   │
//! │  └──────────────┘                    │ • events (encodings)     │   │
//! │                                      └──────────────────────────┘   │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The portable modules carry no hardware dependencies and are exercised by
//! host-side unit tests. The `arch` drivers implement the same traits with
//! `mrs`/`msr` system register access and only build for their target.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod arch;
pub mod counter_pool;
pub mod counters;
pub mod irq;
pub mod timer;

pub use counter_pool::CounterPool;
pub use counters::{CounterBank, CounterError, CounterId, Event, MAX_COUNTERS};
pub use irq::{IrqControl, IrqHandler};
pub use timer::{us_to_ticks, SampleTimer};
