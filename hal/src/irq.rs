//! # Interrupt Plumbing
//!
//! Minimal seam between the sampling timer and the platform interrupt
//! controller. The profiling core only needs to claim one private line per
//! core and unmask it; routing, priorities and EOI stay with the host
//! hypervisor's interrupt layer.

/// Interrupt callback, invoked with the line that fired.
///
/// Runs in interrupt context; implementations must not block.
pub type IrqHandler = fn(u32);

/// Interrupt controller errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqError {
    /// The line is already bound to another handler
    LineTaken(u32),
}

impl core::fmt::Display for IrqError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IrqError::LineTaken(line) => write!(f, "Interrupt line {} is already bound", line),
        }
    }
}

/// Claim and unmask interrupt lines on the platform controller.
pub trait IrqControl {
    /// Bind `handler` to `line`, failing if the line is already claimed.
    fn reserve(&mut self, line: u32, handler: IrqHandler) -> Result<(), IrqError>;

    /// Unmask or mask `line` at the controller.
    fn set_enabled(&mut self, line: u32, on: bool);
}
