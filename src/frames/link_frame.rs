//! # Link Frame
//!
//! Raw link-layer payload exchanged with a radio backend.
//!
//! A `LinkFrame` is a fixed-capacity buffer sized for the largest payload the
//! link hardware can carry in one transmission
//! ([`LINK_FRAME_CAPACITY`](crate::LINK_FRAME_CAPACITY) bytes), together with
//! the number of bytes that are actually in use. The link layer does not
//! interpret the payload; validation against the telemetry wire contract
//! happens at the collector when the frame is decoded.

use crate::LINK_FRAME_CAPACITY;

/// A raw payload as submitted to or delivered by a link device.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct LinkFrame {
    /// Buffer holding the payload bytes.
    ///
    /// Public alongside `length` so device backends can fill a frame in place
    /// without an intermediate copy.
    pub data: [u8; LINK_FRAME_CAPACITY],
    /// Number of bytes of `data` in use. Never exceeds the buffer capacity.
    pub length: usize,
}

impl LinkFrame {
    /// Creates a frame holding a copy of the given payload.
    ///
    /// Payload bytes beyond the link capacity are discarded.
    pub fn from_payload(payload: &[u8]) -> Self {
        let length = payload.len().min(LINK_FRAME_CAPACITY);
        let mut data = [0u8; LINK_FRAME_CAPACITY];
        data[..length].copy_from_slice(&payload[..length]);
        LinkFrame { data, length }
    }

    /// Returns the in-use portion of the buffer.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.length]
    }
}
