//! # Frames Module
//!
//! Data structures for the telemetry wire format and the raw link-layer payloads
//! it travels in.
//!
//! ## Architecture
//!
//! The frames module is organized into two components:
//!
//! - **TelemetryFrame**: the fixed 5-byte telemetry record `(node_id, rssi)`
//! - **LinkFrame**: a raw link-layer payload as handed over by a radio backend
//!
//! ## Key Types
//!
//! - `TelemetryFrame`: encode/decode of the deployment's wire contract
//! - `LinkFrame`: capacity-bounded byte buffer plus the length that actually arrived
//! - `FrameError`: decode failure (wrong payload length)
//!
//! ## Wire Contract
//!
//! Every telemetry frame is exactly [`TELEMETRY_FRAME_SIZE`](crate::TELEMETRY_FRAME_SIZE)
//! bytes, little-endian, with no padding and no payload checksum. Both ends of the
//! link share this constant out of band; there is no negotiation.

// Module declarations
pub mod link_frame;
pub mod telemetry_frame;

// Re-export public types for convenient access
pub use link_frame::LinkFrame;
pub use telemetry_frame::{FrameError, TelemetryFrame};
