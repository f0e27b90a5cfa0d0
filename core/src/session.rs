//! # Profiling Session
//!
//! Session construction and the per-core arming path. The master core
//! configures once (validating the topology, clamping the sample count and
//! allocating the shared results buffer), installs the session in the
//! process-wide slot, and every participating core then arms its own
//! counters and timer against it.
//!
//! A session is parameterized by [`SessionMode`]: a single-VM deployment
//! aggregates every core under one completion bitmap, a multi-VM deployment
//! rolls per-VM completion up into a session-global bitmap. After
//! construction the sampling path is identical in both modes; the mode only
//! shapes the bitmap widths.
//!
//! All mutable per-core state lives in [`CoreState`] slots that are owned
//! exclusively by their core. The session itself is shared read-only, which
//! is what lets the interrupt handler run without locks.

use core::array;
use core::cell::UnsafeCell;
use core::fmt;

use arrayvec::ArrayVec;
use hvperf_hal::counter_pool::CounterPool;
use hvperf_hal::counters::{CounterBank, CounterId};
use hvperf_hal::irq::{IrqControl, IrqHandler};
use hvperf_hal::timer::{us_to_ticks, SampleTimer};
use spin::Once;

use crate::buffer::ResultsBuffer;
use crate::completion::CompletionBitmap;
use crate::config::{clamp_samples, SamplingConfig, MAX_EVENTS};
use crate::platform::{CoreIdentity, CpuBarrier, SharedPages, Topology};
use crate::{SessionError, SessionResult, MAX_CORES, MAX_VMS};

// ============================================================================
// Session Shape
// ============================================================================

/// Aggregation shape of a session, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// One VM spans every participating core: a single completion bitmap
    /// over all cores, rolled up into a one-bit global.
    SingleVm,
    /// Cores are grouped per VM; each VM completes independently and VM
    /// completion rolls up into the session-global bitmap.
    MultiVm,
}

/// Per-core position in the sampling lifecycle.
///
/// Transitioned only inside the timer interrupt handler of the owning core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreStage {
    /// Not started, or not participating.
    Idle,
    /// Counters and timer armed; no sample recorded yet.
    Armed,
    /// At least one sample recorded, quota not yet reached.
    Sampling,
    /// Quota reached and completion signalled; only the master keeps
    /// ticking from here, polling for global completion.
    LocalDone,
    /// Master observed global completion; report pass in progress.
    GlobalDone,
    /// Report emitted. Terminal.
    Reported,
}

// ============================================================================
// Per-Core State
// ============================================================================

/// Mutable sampling state of one core.
#[derive(Debug)]
pub struct CoreState {
    pub(crate) stage: CoreStage,
    pub(crate) sample_index: usize,
    pub(crate) counters: ArrayVec<CounterId, MAX_EVENTS>,
    pub(crate) timer_ticks: u64,
    pub(crate) pool: CounterPool,
}

impl CoreState {
    /// Lifecycle stage this core is in.
    pub fn stage(&self) -> CoreStage {
        self.stage
    }

    /// Next sample row this core will write.
    pub fn sample_index(&self) -> usize {
        self.sample_index
    }

    fn reset(&mut self) {
        self.stage = CoreStage::Idle;
        self.sample_index = 0;
        self.counters.clear();
        self.timer_ticks = 0;
        self.pool = CounterPool::empty();
    }
}

impl Default for CoreState {
    fn default() -> Self {
        Self {
            stage: CoreStage::Idle,
            sample_index: 0,
            counters: ArrayVec::new(),
            timer_ticks: 0,
            pool: CounterPool::empty(),
        }
    }
}

/// Fixed array of per-core slots, each owned exclusively by its core.
///
/// No synchronization: the sampling handler is the only writer of a slot
/// and it always runs on the owning core.
pub(crate) struct PerCore<T> {
    slots: [UnsafeCell<T>; MAX_CORES],
}

// Safety: every slot is accessed only from the core whose index it carries,
// upheld by the callers of `get_mut`.
unsafe impl<T: Send> Sync for PerCore<T> {}

impl<T: Default> PerCore<T> {
    fn new() -> Self {
        Self {
            slots: array::from_fn(|_| UnsafeCell::new(T::default())),
        }
    }
}

impl<T> PerCore<T> {
    /// # Safety
    /// `index` must identify the calling core; slots are unsynchronized and
    /// a foreign access would race the owner.
    unsafe fn get_mut(&self, index: usize) -> &mut T {
        unsafe { &mut *self.slots[index].get() }
    }
}

// ============================================================================
// Profiling Session
// ============================================================================

/// One profiling run across every participating core.
///
/// Shared read-only between cores; the only interior mutability is the
/// per-core slot array and the completion bitmaps.
pub struct ProfilingSession {
    mode: SessionMode,
    config: SamplingConfig,
    effective_samples: usize,
    total_cores: usize,
    buffer: ResultsBuffer,
    per_core: PerCore<CoreState>,
    local: [CompletionBitmap; MAX_VMS],
    global: CompletionBitmap,
}

impl ProfilingSession {
    /// Build a session for the given topology.
    ///
    /// Validates the topology against the bitmap widths, clamps the sample
    /// count to the memory budget and allocates the results buffer. Called
    /// once, by the master core.
    pub fn configure<P: SharedPages>(
        mode: SessionMode,
        config: SamplingConfig,
        topology: &dyn Topology,
        pages: &mut P,
    ) -> SessionResult<Self> {
        let vms = topology.vm_count();
        if vms > MAX_VMS {
            return Err(SessionError::TooManyVms { vms });
        }
        let total = topology.total_cores();
        if total > MAX_CORES {
            return Err(SessionError::TooManyCores { cores: total });
        }

        let events = config.events().len();
        let effective = clamp_samples(events, total, config.requested_samples());
        let buffer = ResultsBuffer::allocate(pages, effective, events, total)?;

        let local = match mode {
            SessionMode::SingleVm => {
                array::from_fn(|vm| CompletionBitmap::new(if vm == 0 { total } else { 0 }))
            }
            SessionMode::MultiVm => array::from_fn(|vm| {
                let width = if vm < vms { topology.cores_of(vm) } else { 0 };
                CompletionBitmap::new(width)
            }),
        };
        let global = CompletionBitmap::new(match mode {
            SessionMode::SingleVm => 1,
            SessionMode::MultiVm => vms,
        });

        Ok(Self {
            mode,
            config,
            effective_samples: effective,
            total_cores: total,
            buffer,
            per_core: PerCore::new(),
            local,
            global,
        })
    }

    /// Arm the calling core: reset its slot, allocate and program one
    /// counter per configured event, bind the timer interrupt and start the
    /// sampling period.
    pub fn start_core<B, T, C>(
        &self,
        who: &CoreIdentity,
        bank: &mut B,
        timer: &mut T,
        chip: &mut C,
        handler: IrqHandler,
    ) -> SessionResult<()>
    where
        B: CounterBank,
        T: SampleTimer,
        C: IrqControl,
    {
        // Safety: `who` names the calling core, the sole owner of this slot.
        let state = unsafe { self.core_state_mut(who.core) };
        state.reset();
        self.local(who.vm).clear(who.vcpu);

        let usable = bank.enable();
        state.pool = CounterPool::new(usable, bank.reserved());

        for &event in self.config.events() {
            let counter = state.pool.alloc()?;
            bank.configure(counter, event);
            bank.arm(counter, u32::MAX);
            bank.clear_overflow(counter);
            bank.set_counting(counter, true);
            state.counters.push(counter);
        }

        timer.register_callback(chip, handler)?;

        // The slot must be fully armed before the first tick can land
        state.timer_ticks = us_to_ticks(self.config.period_us(), timer.frequency());
        state.stage = CoreStage::Armed;
        timer.reschedule(state.timer_ticks);
        timer.enable();
        Ok(())
    }

    /// Aggregation shape the session was built with.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Sampling parameters the session was built with.
    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// The shared results buffer.
    pub fn buffer(&self) -> &ResultsBuffer {
        &self.buffer
    }

    /// Authoritative per-core sample quota, after the budget clamp.
    pub fn effective_samples(&self) -> usize {
        self.effective_samples
    }

    /// Participating cores across all VMs.
    pub fn total_cores(&self) -> usize {
        self.total_cores
    }

    /// Completion bitmap of one VM's cores.
    pub fn local(&self, vm: usize) -> &CompletionBitmap {
        &self.local[vm]
    }

    /// Session-global completion bitmap, one bit per VM.
    pub fn global(&self) -> &CompletionBitmap {
        &self.global
    }

    /// # Safety
    /// `core` must be the calling core's own index; the slot is owned
    /// exclusively by that core and carries no synchronization.
    pub(crate) unsafe fn core_state_mut(&self, core: usize) -> &mut CoreState {
        unsafe { self.per_core.get_mut(core) }
    }
}

impl fmt::Debug for ProfilingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilingSession")
            .field("mode", &self.mode)
            .field("effective_samples", &self.effective_samples)
            .field("total_cores", &self.total_cores)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session Singleton
// ============================================================================

static ACTIVE: Once<ActiveSession> = Once::new();

/// The installed session together with the topology it was built against.
pub struct ActiveSession {
    session: ProfilingSession,
    topology: &'static (dyn Topology + Sync),
}

impl ActiveSession {
    /// The installed session.
    pub fn session(&self) -> &ProfilingSession {
        &self.session
    }

    /// Topology provider backing core identity queries.
    pub fn topology(&self) -> &dyn Topology {
        self.topology
    }
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Currently installed session, if one has been configured.
pub fn active() -> Option<&'static ActiveSession> {
    ACTIVE.get()
}

/// Configure and install the process-wide profiling session.
///
/// Master core only, once per boot; a second call fails with
/// [`SessionError::AlreadyConfigured`]. Returns the effective sample count
/// after the memory-budget clamp, the value every core runs to.
pub fn configure_session<P: SharedPages>(
    mode: SessionMode,
    config: SamplingConfig,
    topology: &'static (dyn Topology + Sync),
    pages: &mut P,
) -> SessionResult<usize> {
    if ACTIVE.is_completed() {
        return Err(SessionError::AlreadyConfigured);
    }

    let session = ProfilingSession::configure(mode, config, topology, pages)?;
    let effective = session.effective_samples();
    log::info!(
        "profiling session: {} events, period {} us, {} samples on {} cores",
        session.config().events().len(),
        session.config().period_us(),
        effective,
        session.total_cores()
    );

    ACTIVE.call_once(|| ActiveSession { session, topology });
    Ok(effective)
}

/// Arm the calling core against the installed session.
///
/// Every participating core calls this once. The barrier runs first so no
/// core reads session fields before the master has published them; after it
/// returns, the timer interrupt alone drives this core.
pub fn start_session<R, B, T, C>(
    barrier: &R,
    bank: &mut B,
    timer: &mut T,
    chip: &mut C,
    handler: IrqHandler,
) -> SessionResult<()>
where
    R: CpuBarrier,
    B: CounterBank,
    T: SampleTimer,
    C: IrqControl,
{
    barrier.sync();

    let active = ACTIVE.get().ok_or(SessionError::NotConfigured)?;
    let who = active.topology.current();
    active.session.start_core(&who, bank, timer, chip, handler)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PAGE_SIZE;
    use core::cell::Cell;
    use core::ptr::NonNull;
    use hvperf_hal::counters::Event;
    use hvperf_hal::irq::IrqError;
    use std::vec::Vec;

    struct GridTopo {
        vms: usize,
        per_vm: usize,
    }

    impl Topology for GridTopo {
        fn current(&self) -> CoreIdentity {
            CoreIdentity {
                core: 0,
                vcpu: 0,
                vm: 0,
                master: true,
            }
        }

        fn vm_count(&self) -> usize {
            self.vms
        }

        fn cores_of(&self, _vm: usize) -> usize {
            self.per_vm
        }
    }

    struct MockPages {
        arena: Vec<u64>,
        granted: Vec<usize>,
    }

    impl MockPages {
        fn new() -> Self {
            Self {
                arena: Vec::new(),
                granted: Vec::new(),
            }
        }
    }

    impl SharedPages for MockPages {
        fn alloc_pages(&mut self, pages: usize) -> Option<NonNull<u8>> {
            self.granted.push(pages);
            self.arena = std::vec![0u64; pages * PAGE_SIZE / 8];
            NonNull::new(self.arena.as_mut_ptr().cast())
        }
    }

    // Grants without backing memory; for tests that never touch the buffer.
    struct PhantomPages;

    impl SharedPages for PhantomPages {
        fn alloc_pages(&mut self, _pages: usize) -> Option<NonNull<u8>> {
            Some(NonNull::dangling())
        }
    }

    struct DeniedPages;

    impl SharedPages for DeniedPages {
        fn alloc_pages(&mut self, _pages: usize) -> Option<NonNull<u8>> {
            None
        }
    }

    #[derive(Default)]
    struct RecordingBank {
        usable: u8,
        enabled: bool,
        configured: Vec<(usize, Event)>,
        armed: Vec<(usize, u32)>,
        cleared: Vec<usize>,
        counting: Vec<(usize, bool)>,
    }

    impl CounterBank for RecordingBank {
        fn enable(&mut self) -> u8 {
            self.enabled = true;
            self.usable
        }

        fn disable(&mut self) {
            self.enabled = false;
        }

        fn configure(&mut self, counter: CounterId, event: Event) {
            self.configured.push((counter.index(), event));
        }

        fn arm(&mut self, counter: CounterId, budget: u32) {
            self.armed.push((counter.index(), budget));
        }

        fn read(&mut self, _counter: CounterId) -> u64 {
            0
        }

        fn clear_overflow(&mut self, counter: CounterId) {
            self.cleared.push(counter.index());
        }

        fn set_counting(&mut self, counter: CounterId, on: bool) {
            self.counting.push((counter.index(), on));
        }
    }

    struct MockTimer {
        freq: u64,
        count: u64,
        enabled: bool,
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

    #[derive(Default)]
    struct MockChip {
        reserved: Vec<u32>,
        enabled: Vec<(u32, bool)>,
        taken: Option<u32>,
    }

    impl IrqControl for MockChip {
        fn reserve(&mut self, line: u32, _handler: IrqHandler) -> Result<(), IrqError> {
            if self.taken == Some(line) {
                return Err(IrqError::LineTaken(line));
            }
            self.reserved.push(line);
            Ok(())
        }

        fn set_enabled(&mut self, line: u32, on: bool) {
            self.enabled.push((line, on));
        }
    }

    fn two_event_config(samples: usize) -> SamplingConfig {
        SamplingConfig::new(&[Event::MemAccess, Event::L2dCache], 1000, samples).unwrap()
    }

    fn noop_handler(_line: u32) {}

    #[test]
    fn configure_validates_topology_limits() {
        let too_many_vms = GridTopo { vms: 65, per_vm: 1 };
        let err = ProfilingSession::configure(
            SessionMode::MultiVm,
            two_event_config(4),
            &too_many_vms,
            &mut PhantomPages,
        )
        .unwrap_err();
        assert_eq!(err, SessionError::TooManyVms { vms: 65 });

        let too_many_cores = GridTopo { vms: 1, per_vm: 65 };
        let err = ProfilingSession::configure(
            SessionMode::MultiVm,
            two_event_config(4),
            &too_many_cores,
            &mut PhantomPages,
        )
        .unwrap_err();
        assert_eq!(err, SessionError::TooManyCores { cores: 65 });
    }

    #[test]
    fn configure_sizes_buffer_and_bitmaps() {
        let topo = GridTopo { vms: 2, per_vm: 3 };
        let mut pages = MockPages::new();
        let session = ProfilingSession::configure(
            SessionMode::MultiVm,
            two_event_config(4),
            &topo,
            &mut pages,
        )
        .unwrap();

        assert_eq!(session.effective_samples(), 4);
        assert_eq!(session.total_cores(), 6);
        assert_eq!(session.buffer().samples(), 4);
        assert_eq!(session.buffer().events(), 2);
        assert_eq!(session.buffer().cpus(), 6);

        // 4 samples x 2 events x 6 cores x 8 bytes = 384 bytes, one page
        assert_eq!(pages.granted, [1]);

        assert_eq!(session.local(0).width(), 3);
        assert_eq!(session.local(1).width(), 3);
        assert_eq!(session.local(2).width(), 0);
        assert_eq!(session.global().width(), 2);
    }

    #[test]
    fn single_vm_mode_collapses_aggregation() {
        let topo = GridTopo { vms: 1, per_vm: 4 };
        let session = ProfilingSession::configure(
            SessionMode::SingleVm,
            two_event_config(2),
            &topo,
            &mut PhantomPages,
        )
        .unwrap();

        assert_eq!(session.local(0).width(), 4);
        assert_eq!(session.global().width(), 1);
    }

    #[test]
    fn configure_applies_the_budget_clamp() {
        let topo = GridTopo { vms: 2, per_vm: 4 };
        let config =
            SamplingConfig::new(&[Event::CpuCycles; 4], 500, 10_000_000).unwrap();
        let session =
            ProfilingSession::configure(SessionMode::MultiVm, config, &topo, &mut PhantomPages)
                .unwrap();

        // 8 cores x 4 events x 8 bytes against 1 GiB
        assert_eq!(session.effective_samples(), 4_194_304);
    }

    #[test]
    fn allocation_failure_aborts_configuration() {
        let topo = GridTopo { vms: 1, per_vm: 2 };
        let err = ProfilingSession::configure(
            SessionMode::SingleVm,
            two_event_config(16),
            &topo,
            &mut DeniedPages,
        )
        .unwrap_err();
        assert_eq!(err, SessionError::OutOfMemory { pages: 1 });
    }

    #[test]
    fn start_core_programs_the_full_chain() {
        let topo = GridTopo { vms: 1, per_vm: 2 };
        let mut pages = MockPages::new();
        let session = ProfilingSession::configure(
            SessionMode::MultiVm,
            two_event_config(4),
            &topo,
            &mut pages,
        )
        .unwrap();

        let who = topo.current();
        let mut bank = RecordingBank {
            usable: 6,
            ..RecordingBank::default()
        };
        let mut timer = MockTimer {
            freq: 62_500_000,
            count: 0,
            enabled: false,
        };
        let mut chip = MockChip::default();

        session
            .start_core(&who, &mut bank, &mut timer, &mut chip, noop_handler)
            .unwrap();

        assert!(bank.enabled);
        assert_eq!(
            bank.configured,
            [(0, Event::MemAccess), (1, Event::L2dCache)]
        );
        assert_eq!(bank.armed, [(0, u32::MAX), (1, u32::MAX)]);
        assert_eq!(bank.cleared, [0, 1]);
        assert_eq!(bank.counting, [(0, true), (1, true)]);

        assert_eq!(chip.reserved, [26]);
        assert_eq!(chip.enabled, [(26, true)]);

        // 1000 us at 62.5 MHz
        assert!(timer.enabled);
        assert_eq!(timer.count, 62_500);

        let state = unsafe { session.core_state_mut(who.core) };
        assert_eq!(state.stage(), CoreStage::Armed);
        assert_eq!(state.sample_index(), 0);
        assert_eq!(state.counters.len(), 2);
        assert_eq!(state.timer_ticks, 62_500);
        assert_eq!(state.pool.remaining(), 4);
    }

    #[test]
    fn start_core_surfaces_irq_conflicts() {
        let topo = GridTopo { vms: 1, per_vm: 1 };
        let session = ProfilingSession::configure(
            SessionMode::SingleVm,
            two_event_config(4),
            &topo,
            &mut PhantomPages,
        )
        .unwrap();

        let mut bank = RecordingBank {
            usable: 6,
            ..RecordingBank::default()
        };
        let mut timer = MockTimer {
            freq: 62_500_000,
            count: 0,
            enabled: false,
        };
        let mut chip = MockChip {
            taken: Some(26),
            ..MockChip::default()
        };

        let err = session
            .start_core(
                &topo.current(),
                &mut bank,
                &mut timer,
                &mut chip,
                noop_handler,
            )
            .unwrap_err();
        assert_eq!(err, SessionError::Irq(IrqError::LineTaken(26)));
        assert!(!timer.enabled);
    }

    #[test]
    fn counter_exhaustion_aborts_startup() {
        let topo = GridTopo { vms: 1, per_vm: 1 };
        let session = ProfilingSession::configure(
            SessionMode::SingleVm,
            two_event_config(4),
            &topo,
            &mut PhantomPages,
        )
        .unwrap();

        let mut bank = RecordingBank {
            usable: 1,
            ..RecordingBank::default()
        };
        let mut timer = MockTimer {
            freq: 62_500_000,
            count: 0,
            enabled: false,
        };
        let mut chip = MockChip::default();

        let err = session
            .start_core(
                &topo.current(),
                &mut bank,
                &mut timer,
                &mut chip,
                noop_handler,
            )
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::Counter(hvperf_hal::counters::CounterError::Exhausted)
        );
    }

    struct CountingBarrier {
        arrivals: Cell<usize>,
    }

    impl CountingBarrier {
        fn new() -> Self {
            Self {
                arrivals: Cell::new(0),
            }
        }
    }

    impl CpuBarrier for CountingBarrier {
        fn sync(&self) {
            self.arrivals.set(self.arrivals.get() + 1);
        }
    }

    // The singleton is process-wide, so its whole lifecycle lives in one
    // test to keep ordering deterministic.
    #[test]
    fn global_install_lifecycle() {
        static TOPO: GridTopo = GridTopo { vms: 1, per_vm: 1 };

        let mut bank = RecordingBank {
            usable: 6,
            ..RecordingBank::default()
        };
        let mut timer = MockTimer {
            freq: 62_500_000,
            count: 0,
            enabled: false,
        };
        let mut chip = MockChip::default();
        let barrier = CountingBarrier::new();

        // Starting before any configuration must fail cleanly, and the
        // rendezvous still runs ahead of the session lookup
        let err = start_session(&barrier, &mut bank, &mut timer, &mut chip, noop_handler)
            .unwrap_err();
        assert_eq!(err, SessionError::NotConfigured);
        assert_eq!(barrier.arrivals.get(), 1);

        let pages = std::boxed::Box::leak(std::boxed::Box::new(MockPages::new()));
        let effective =
            configure_session(SessionMode::SingleVm, two_event_config(3), &TOPO, pages).unwrap();
        assert_eq!(effective, 3);
        assert!(active().is_some());

        let err = configure_session(SessionMode::SingleVm, two_event_config(3), &TOPO, pages)
            .unwrap_err();
        assert_eq!(err, SessionError::AlreadyConfigured);

        start_session(&barrier, &mut bank, &mut timer, &mut chip, noop_handler).unwrap();
        assert!(timer.enabled);
        assert_eq!(barrier.arrivals.get(), 2);
        assert_eq!(active().unwrap().session().effective_samples(), 3);
    }
}
