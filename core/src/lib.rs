//! # hvperf Profiling Core
//!
//! Coordination layer for hypervisor self-profiling: one profiling session
//! spans every participating core, samples PMU event counters on a periodic
//! EL2 timer interrupt and aggregates the results on the master core.
//!
//! ## Session Flow
//!
//! ```text
//!  master core                 every participating core
//! ┌────────────────────┐      ┌──────────────────────────────────────┐
//! │ configure_session  │      │ start_session                        │
//! │  • clamp samples   │      │  • barrier sync (config published)   │
//! │  • allocate buffer │ ───▶ │  • enable PMU, allocate counters     │
//! │  • install session │      │  • bind timer IRQ, arm period        │
//! └────────────────────┘      └──────────────┬───────────────────────┘
//!                                            │ timer tick (per core)
//!                                            ▼
//!                             ┌──────────────────────────────────────┐
//!                             │ sampler::tick                        │
//!                             │  • read counters → results buffer    │
//!                             │  • re-arm, or signal completion      │
//!                             │  • master: report when all VMs done  │
//!                             └──────────────────────────────────────┘
//! ```
//!
//! The only cross-core shared mutable state is the results buffer and the
//! two completion bitmaps; everything else is core-local by construction.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

#[cfg(test)]
extern crate std;

pub mod buffer;
pub mod completion;
pub mod config;
pub mod platform;
pub mod sampler;
pub mod session;

use hvperf_hal::counters::CounterError;
use hvperf_hal::irq::IrqError;

/// Maximum cores a session can span, across all VMs.
///
/// Bounded by the width of the per-VM completion bitmap word.
pub const MAX_CORES: usize = 64;

/// Maximum VMs a session can span.
///
/// Bounded by the width of the session-global completion bitmap word.
pub const MAX_VMS: usize = 64;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Session setup and control errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The event list is empty
    NoEvents,
    /// The event list exceeds the per-session maximum
    TooManyEvents {
        /// Number of events requested
        requested: usize,
    },
    /// The platform reports more cores than a session can track
    TooManyCores {
        /// Number of participating cores
        cores: usize,
    },
    /// The platform reports more VMs than a session can track
    TooManyVms {
        /// Number of participating VMs
        vms: usize,
    },
    /// The shared page allocator could not back the results buffer
    OutOfMemory {
        /// Number of pages that were requested
        pages: usize,
    },
    /// Counter allocation failed on this core
    Counter(CounterError),
    /// The timer interrupt line could not be claimed
    Irq(IrqError),
    /// No session has been configured yet
    NotConfigured,
    /// A session is already installed
    AlreadyConfigured,
}

impl core::fmt::Display for SessionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SessionError::NoEvents => write!(f, "The event list is empty"),
            SessionError::TooManyEvents { requested } => {
                write!(f, "{} events requested, sessions track at most {}", requested, MAX_EVENTS)
            }
            SessionError::TooManyCores { cores } => {
                write!(f, "{} cores exceed the session limit of {}", cores, MAX_CORES)
            }
            SessionError::TooManyVms { vms } => {
                write!(f, "{} VMs exceed the session limit of {}", vms, MAX_VMS)
            }
            SessionError::OutOfMemory { pages } => {
                write!(f, "Could not map {} pages for the results buffer", pages)
            }
            SessionError::Counter(err) => write!(f, "{}", err),
            SessionError::Irq(err) => write!(f, "{}", err),
            SessionError::NotConfigured => write!(f, "No session has been configured"),
            SessionError::AlreadyConfigured => write!(f, "A session is already installed"),
        }
    }
}

impl From<CounterError> for SessionError {
    fn from(err: CounterError) -> Self {
        SessionError::Counter(err)
    }
}

impl From<IrqError> for SessionError {
    fn from(err: IrqError) -> Self {
        SessionError::Irq(err)
    }
}

pub use buffer::ResultsBuffer;
pub use completion::{CompletionBitmap, SignalOutcome};
pub use config::{SamplingConfig, MAX_EVENTS};
pub use platform::{CoreIdentity, CpuBarrier, SharedPages, Topology};
#[cfg(target_arch = "aarch64")]
pub use sampler::timer_irq_entry;
pub use sampler::{tick, TickOutcome};
pub use session::{
    active, configure_session, start_session, ActiveSession, CoreStage, ProfilingSession,
    SessionMode,
};
