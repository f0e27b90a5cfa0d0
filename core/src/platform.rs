//! # Platform Interfaces
//!
//! What the profiling core consumes from the host hypervisor: core and VM
//! identity, a boot-style synchronization barrier, and shared memory pages
//! for the results buffer. VM and vCPU lifecycle stay entirely on the host
//! side; a session only reads the static topology.

use core::ptr::NonNull;

/// Page size of the shared-memory allocator.
pub const PAGE_SIZE: usize = 4096;

/// Pages needed to back `bytes` of results.
pub fn pages_for(bytes: usize) -> usize {
    bytes.div_ceil(PAGE_SIZE)
}

// ============================================================================
// Core Identity
// ============================================================================

/// Identity of one core within the session topology.
///
/// Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreIdentity {
    /// Global core index; the column this core writes in the results buffer.
    pub core: usize,
    /// Index of this vCPU within its VM; the bit this core owns in its VM's
    /// completion bitmap.
    pub vcpu: usize,
    /// Index of this core's VM; the bit the VM owns in the session-global
    /// completion bitmap.
    pub vm: usize,
    /// Whether this core is the session master that allocates the results
    /// buffer and emits the final report.
    pub master: bool,
}

// ============================================================================
// Platform Traits
// ============================================================================

/// Static VM/vCPU topology of the deployment.
pub trait Topology {
    /// Identity of the calling core.
    fn current(&self) -> CoreIdentity;

    /// Number of VMs participating in profiling.
    fn vm_count(&self) -> usize;

    /// Number of vCPUs the given VM runs.
    fn cores_of(&self, vm: usize) -> usize;

    /// Total participating cores across all VMs.
    fn total_cores(&self) -> usize {
        (0..self.vm_count()).map(|vm| self.cores_of(vm)).sum()
    }
}

/// Rendezvous barrier across every participating core.
///
/// Used once at session start so no core arms its counters before the
/// master has published the session.
pub trait CpuBarrier {
    /// Block until all participating cores have arrived.
    fn sync(&self);
}

/// Allocator for memory pages visible to every core.
pub trait SharedPages {
    /// Allocate `pages` contiguous pages, returning the base address.
    ///
    /// The pages need not be zeroed; every buffer slot is written before
    /// it is read.
    fn alloc_pages(&mut self, pages: usize) -> Option<NonNull<u8>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoVmTopo;

    impl Topology for TwoVmTopo {
        fn current(&self) -> CoreIdentity {
            CoreIdentity {
                core: 0,
                vcpu: 0,
                vm: 0,
                master: true,
            }
        }

        fn vm_count(&self) -> usize {
            2
        }

        fn cores_of(&self, vm: usize) -> usize {
            match vm {
                0 => 4,
                _ => 2,
            }
        }
    }

    #[test]
    fn total_cores_sums_every_vm() {
        assert_eq!(TwoVmTopo.total_cores(), 6);
    }

    #[test]
    fn page_rounding_covers_the_tail() {
        assert_eq!(pages_for(0), 0);
        assert_eq!(pages_for(1), 1);
        assert_eq!(pages_for(PAGE_SIZE), 1);
        assert_eq!(pages_for(PAGE_SIZE + 1), 2);
    }
}
