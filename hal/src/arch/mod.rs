//! # Architecture Drivers
//!
//! Per-architecture implementations of the portable counter and timer
//! traits. Only the AArch64 backend exists today; the event encoding
//! tables build everywhere so host tests can exercise them, the register
//! drivers build for their target only.

pub mod aarch64;
