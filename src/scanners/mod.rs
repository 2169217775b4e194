//! # Scanners Module
//!
//! Platform backends for the wireless survey a fixed node runs each cycle.
//!
//! Exactly one backend is compiled in, selected by feature flag. A backend
//! provides a `Scanner` type implementing
//! [`NetworkScanner`](crate::NetworkScanner); the sampling logic itself is
//! backend-independent and lives in the crate root.
//!
//! ## Available implementations
//!
//! - **simulator**: replays scripted scan results fed through a queue, for
//!   host-side tests and multi-node demos.

#[cfg(feature = "scanner-simulator")]
pub mod simulator;

#[cfg(feature = "scanner-simulator")]
pub use simulator::Scanner;
