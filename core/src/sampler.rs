//! # Sampling Engine
//!
//! The timer-interrupt state machine. Every participating core runs
//! [`tick`] from its timer interrupt; no other code path mutates sampling
//! state once a session is started.
//!
//! ```text
//!             ┌────────── quota not reached: record row, re-arm ─────────┐
//!             ▼                                                          │
//!  Armed ──tick──▶ Sampling ──last row──▶ LocalDone ──master, all VMs──▶ Reported
//!                                            │            done
//!                                            └─ non-master: timer stays off
//! ```
//!
//! A tick always disables the timer first, so re-arming is an explicit
//! decision and a slow handler can never be re-entered. On the completing
//! tick the core raises its bit in the VM's completion bitmap; the one core
//! that fills the bitmap raises the VM's bit in the session-global bitmap.
//! Non-masters then stop ticking. The master keeps rescheduling itself to
//! poll the global bitmap and, once it fills, drains the whole results
//! buffer through the log sink in one pass.
//!
//! The handler never blocks and never allocates: counter reads, volatile
//! buffer writes and single-word atomics are the only effects until the
//! final report pass.

use hvperf_hal::counters::CounterBank;
use hvperf_hal::timer::SampleTimer;

use crate::completion::SignalOutcome;
use crate::platform::CoreIdentity;
use crate::session::{CoreStage, CoreState, ProfilingSession};

/// Externally visible effect of one timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A sample row was recorded and the timer re-armed.
    Sampled {
        /// Row index that was written.
        index: usize,
    },
    /// This core reached its quota and signalled completion. Non-masters
    /// stop here; the master keeps ticking until every VM is done.
    LocalComplete,
    /// Master poll: some VM is still sampling, timer re-armed.
    Waiting,
    /// Master found every VM complete and emitted the report. Terminal.
    Reported,
    /// Nothing to do: core not started, or session already reported.
    Idle,
}

/// Run one timer tick on the calling core.
///
/// This is the whole sampling engine; it must stay non-blocking and
/// lock-free. `who` is the calling core's identity and `bank`/`timer`
/// drive that core's own hardware.
pub fn tick<B, T>(
    session: &ProfilingSession,
    who: &CoreIdentity,
    bank: &mut B,
    timer: &mut T,
) -> TickOutcome
where
    B: CounterBank,
    T: SampleTimer,
{
    // Re-arming is always explicit; a tick can never re-enter itself
    timer.disable();

    // Safety: ticks run in interrupt context on the owning core only.
    let state = unsafe { session.core_state_mut(who.core) };

    match state.stage {
        CoreStage::Idle | CoreStage::GlobalDone | CoreStage::Reported => TickOutcome::Idle,
        CoreStage::LocalDone => poll_global(session, who, state, timer),
        CoreStage::Armed | CoreStage::Sampling => {
            if state.sample_index >= session.effective_samples() {
                // Zero-quota sessions complete on their first tick
                finish_core(session, who, state, timer)
            } else {
                record_row(session, who, state, bank, timer)
            }
        }
    }
}

/// Read every counter into this core's column of the current sample row.
fn record_row<B, T>(
    session: &ProfilingSession,
    who: &CoreIdentity,
    state: &mut CoreState,
    bank: &mut B,
    timer: &mut T,
) -> TickOutcome
where
    B: CounterBank,
    T: SampleTimer,
{
    let row = state.sample_index;
    for (position, &counter) in state.counters.iter().enumerate() {
        let value = bank.read(counter);
        session.buffer().write_sample(row, position, who.core, value);

        // Restart the interval from a known baseline
        bank.clear_overflow(counter);
        bank.arm(counter, u32::MAX);
    }
    state.sample_index += 1;

    if state.sample_index >= session.effective_samples() {
        finish_core(session, who, state, timer)
    } else {
        state.stage = CoreStage::Sampling;
        timer.reschedule(state.timer_ticks);
        timer.enable();
        TickOutcome::Sampled { index: row }
    }
}

/// Quota reached: signal completion upward and decide who keeps ticking.
fn finish_core<T>(
    session: &ProfilingSession,
    who: &CoreIdentity,
    state: &mut CoreState,
    timer: &mut T,
) -> TickOutcome
where
    T: SampleTimer,
{
    state.stage = CoreStage::LocalDone;

    // Exactly one core observes its VM's bitmap fill; that core raises the
    // VM's bit one level up. A duplicate signal cannot re-trigger this.
    if session.local(who.vm).signal(who.vcpu) == SignalOutcome::NowFull {
        session.global().signal(who.vm);
    }

    if !who.master {
        // Timer stays disabled; this core's share of the session is done
        return TickOutcome::LocalComplete;
    }

    if session.global().is_full() {
        report(session, state)
    } else {
        // Keep ticking to catch the stragglers' completion
        timer.reschedule(state.timer_ticks);
        timer.enable();
        TickOutcome::LocalComplete
    }
}

/// Master-only wait loop entered after its own quota is met.
fn poll_global<T>(
    session: &ProfilingSession,
    who: &CoreIdentity,
    state: &mut CoreState,
    timer: &mut T,
) -> TickOutcome
where
    T: SampleTimer,
{
    if !who.master {
        // A completed non-master should not be ticking; leave the timer off
        return TickOutcome::Idle;
    }

    if session.global().is_full() {
        report(session, state)
    } else {
        timer.reschedule(state.timer_ticks);
        timer.enable();
        TickOutcome::Waiting
    }
}

/// Terminal transition: drain the buffer and close the session.
fn report(session: &ProfilingSession, state: &mut CoreState) -> TickOutcome {
    state.stage = CoreStage::GlobalDone;
    emit_report(session);

    // Reopen the per-VM bitmaps; the global word stays set as the terminal
    // marker of the session
    for vm in 0..session.global().width() {
        session.local(vm).reset();
    }

    state.stage = CoreStage::Reported;
    TickOutcome::Reported
}

/// Dump every recorded value through the log sink, cores outermost.
fn emit_report(session: &ProfilingSession) {
    let buffer = session.buffer();
    let events = session.config().events();

    log::info!(
        "profiling report: {} cores, {} samples, {} events",
        buffer.cpus(),
        buffer.samples(),
        buffer.events()
    );

    for cpu in 0..buffer.cpus() {
        for sample in 0..buffer.samples() {
            for (position, event) in events.iter().enumerate() {
                let value = buffer.read_sample(sample, position, cpu);
                log::info!("cpu {} sample {} {:?}: {}", cpu, sample, event, value);
            }
        }
    }
}

/// Timer interrupt entry for hardware deployments, the handler the host
/// passes to [`crate::session::start_session`].
///
/// Looks up the installed session and runs one [`tick`] against the
/// current core's PMU and EL2 timer.
#[cfg(target_arch = "aarch64")]
pub fn timer_irq_entry(_line: u32) {
    use hvperf_hal::arch::aarch64::{HypTimer, Pmu};

    let Some(active) = crate::session::active() else {
        return;
    };

    let who = active.topology().current();
    // Safety: the handler runs at EL2 on the interrupted core.
    let mut bank = unsafe { Pmu::new() };
    let mut timer = unsafe { HypTimer::new() };
    tick(active.session(), &who, &mut bank, &mut timer);
}

// ============================================================================
// Tests
// ============================================================================
