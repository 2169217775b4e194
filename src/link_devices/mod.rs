//! # Link Devices Module
//!
//! Backends for the point-to-point packet link between fixed nodes and the
//! collector.
//!
//! ## Architecture
//!
//! Exactly one backend is compiled in, selected by feature flag. All backends
//! expose the same surface: a `LinkDevice` handle plus a `link_device_task`
//! that owns the hardware (or its stand-in) and services three queues:
//!
//! - outbound frames to put on the air
//! - send reports back to the producer, one per submitted frame
//! - inbound frames received off the air
//!
//! ## Available implementations
//!
//! - **simulator**: exchanges frames with an external medium task over queues.
//!   Supports many endpoints per process, configurable loss, host-side tests.
//! - **echo**: loops every submitted frame straight back to the local receive
//!   queue. Useful for exercising a full node without any radio.
//!
//! ## Mode exclusivity
//!
//! The kind of transceiver this crate targets is half-duplex: it either
//! listens or transmits, never both. A device task therefore tracks which
//! mode it is in, switches before sending, and drops traffic that arrives
//! while the radio is pointed the other way.

use crate::PipeAddress;

#[cfg(feature = "link-device-echo")]
pub mod echo;
#[cfg(feature = "link-device-simulator")]
pub mod simulator;

#[cfg(feature = "link-device-echo")]
pub use echo::{link_device_task, LinkDevice};
#[cfg(feature = "link-device-simulator")]
pub use simulator::{link_device_task, LinkDevice};

/// Which end of the link a device serves.
///
/// The role fixes the device's home mode: a `Transmitter` sits ready to send,
/// a `Receiver` listens and only leaves that mode for the duration of a send.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum LinkRole {
    /// Fixed-node side: originates telemetry frames.
    Transmitter,
    /// Collector side: listens for telemetry frames.
    Receiver,
}

/// Current half-duplex state of a link device.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub(crate) enum LinkMode {
    Listening,
    Transmitting,
}

/// Over-the-air bit rate.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum DataRate {
    _250Kbps,
    _1Mbps,
    _2Mbps,
}

/// Transmit power setting.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum PowerLevel {
    Min,
    Low,
    High,
    Max,
}

/// Radio parameters both ends of a link must agree on.
///
/// Frames only travel between devices configured with the same channel and
/// pipe address.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct LinkProfile {
    /// RF channel number.
    pub channel: u8,
    /// Address of the logical pipe the two ends share.
    pub pipe_address: PipeAddress,
    /// Over-the-air bit rate.
    pub data_rate: DataRate,
    /// Transmit power setting.
    pub power: PowerLevel,
}

impl Default for LinkProfile {
    fn default() -> Self {
        LinkProfile {
            channel: crate::DEFAULT_LINK_CHANNEL,
            pipe_address: crate::DEFAULT_PIPE_ADDRESS,
            data_rate: DataRate::_1Mbps,
            power: PowerLevel::Max,
        }
    }
}

/// How much of a requested [`LinkProfile`] a backend actually applied.
///
/// Reported once, when the device comes up. Callers that care whether tuning
/// parameters took effect check this instead of probing the device at runtime.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum LinkConfigStatus {
    /// Every profile parameter was applied as requested.
    FullyApplied,
    /// Channel and pipe address were applied; the backend kept its own
    /// defaults for the tuning parameters it does not model.
    AppliedWithDefaults,
}

impl core::fmt::Display for LinkConfigStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkConfigStatus::FullyApplied => write!(f, "profile fully applied"),
            LinkConfigStatus::AppliedWithDefaults => {
                write!(f, "profile applied with backend defaults")
            }
        }
    }
}

/// Outcome of one frame submission, delivered on the send report queue.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum SendOutcome {
    /// The link accepted the frame. For acknowledged links this means the
    /// far end confirmed reception.
    Sent,
    /// The frame did not make it out, or was never acknowledged.
    Failed,
}
