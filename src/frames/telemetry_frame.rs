//! # Telemetry Frame
//!
//! The single wire format exchanged between fixed nodes and the collector.
//!
//! ## Layout
//!
//! | Offset | Size | Field   | Encoding              |
//! |--------|------|---------|-----------------------|
//! | 0      | 1    | node_id | u8                    |
//! | 1      | 4    | rssi    | i32, little-endian    |
//!
//! A frame is always exactly 5 bytes. The rssi field carries the node's signal
//! estimate in dBm, or the not-detected sentinel
//! [`RSSI_NOT_DETECTED_DBM`](crate::RSSI_NOT_DETECTED_DBM) when the node saw no
//! usable reading in a cycle.
//!
//! ## Usage
//!
//! ```ignore
//! let frame = TelemetryFrame::with(7, -57);
//! let decoded = TelemetryFrame::from_payload(frame.as_bytes())?;
//! assert_eq!(decoded.node_id(), 7);
//! assert_eq!(decoded.rssi_dbm(), -57);
//! ```

use crate::frames::link_frame::LinkFrame;
use crate::TELEMETRY_FRAME_SIZE;

/// Errors that can occur when decoding a received payload.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum FrameError {
    /// The payload length does not match the fixed frame size.
    ///
    /// Carries the length that actually arrived. Short or long payloads are
    /// never partially decoded; the whole payload is rejected.
    InvalidLength(usize),
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::InvalidLength(length) => {
                write!(
                    f,
                    "invalid payload length: {} bytes (expected {})",
                    length, TELEMETRY_FRAME_SIZE
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

/// A decoded or to-be-sent telemetry record.
///
/// Stores the frame in its encoded form and exposes typed accessors, so the
/// same representation serves both directions of the link.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct TelemetryFrame {
    data: [u8; TELEMETRY_FRAME_SIZE],
}

impl TelemetryFrame {
    /// Creates a frame from a node identifier and a signal estimate in dBm.
    pub fn with(node_id: u8, rssi_dbm: i32) -> Self {
        let mut data = [0u8; TELEMETRY_FRAME_SIZE];
        data[0] = node_id;
        data[1..5].copy_from_slice(&rssi_dbm.to_le_bytes());
        TelemetryFrame { data }
    }

    /// Decodes a frame from a received payload.
    ///
    /// Returns `FrameError::InvalidLength` if the payload is not exactly
    /// [`TELEMETRY_FRAME_SIZE`](crate::TELEMETRY_FRAME_SIZE) bytes.
    pub fn from_payload(payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() != TELEMETRY_FRAME_SIZE {
            return Err(FrameError::InvalidLength(payload.len()));
        }

        let mut data = [0u8; TELEMETRY_FRAME_SIZE];
        data.copy_from_slice(payload);
        Ok(TelemetryFrame { data })
    }

    /// Returns the identifier of the node that produced this frame.
    pub fn node_id(&self) -> u8 {
        self.data[0]
    }

    /// Returns the signal estimate in dBm.
    pub fn rssi_dbm(&self) -> i32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[1..5]);
        i32::from_le_bytes(bytes)
    }

    /// Returns the encoded frame bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Wraps the encoded frame in a link-layer payload ready for transmission.
    pub fn to_link_frame(&self) -> LinkFrame {
        LinkFrame::from_payload(&self.data)
    }
}
