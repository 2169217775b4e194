//! # Echo Link Device - Loopback Backend for Testing
//!
//! The simplest possible link backend: every frame submitted for
//! transmission is delivered straight back to the local receive queue, and
//! every send is reported as successful.
//!
//! ## Architecture
//!
//! - Receives frames from the TX queue
//! - Immediately forwards them to the RX queue
//! - Reports [`SendOutcome::Sent`] for each frame
//! - No medium, no loss, no timing
//!
//! ## Use Cases
//!
//! - Exercising a complete node (sampler, codec, collector) in one process
//! - Debugging frame layout issues without any radio in the loop
//! - Smoke tests where delivery must be deterministic
//!
//! ## Limitations
//!
//! - Single endpoint only; there is no topology and no loss model
//! - A node running this backend receives its own telemetry

use crate::link_devices::{LinkConfigStatus, LinkRole, SendOutcome};
use crate::{
    LinkProfile, RxFrameQueueSender, SendReportQueueSender, TxFrameQueueReceiver, MAX_NODE_COUNT,
};
use log::{log, Level};

/// Echo link device - loopback implementation for testing
///
/// Zero-sized and stateless. The device requires no configuration; the
/// profile it is started with is logged and otherwise ignored.
#[cfg_attr(feature = "std", derive(Debug))]
pub struct LinkDevice {}

impl Default for LinkDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkDevice {
    /// Creates a new echo link device.
    pub const fn new() -> Self {
        LinkDevice {}
    }

    /// Reports how much of a [`LinkProfile`] this backend honors.
    ///
    /// The loopback applies nothing; frames never leave the process.
    pub fn config_status() -> LinkConfigStatus {
        LinkConfigStatus::AppliedWithDefaults
    }

    /// Main echo loop. Forwards each submitted frame to the receive queue
    /// and acknowledges it, forever.
    async fn run(
        &mut self,
        tx_frame_queue_receiver: TxFrameQueueReceiver,
        send_report_queue_sender: SendReportQueueSender,
        rx_frame_queue_sender: RxFrameQueueSender,
    ) -> ! {
        loop {
            let frame = tx_frame_queue_receiver.receive().await;
            log::trace!("Echoing frame: {} bytes", frame.length);
            if rx_frame_queue_sender.try_send(frame).is_err() {
                log!(Level::Warn, "Receive queue full, dropping echoed frame");
            }
            if send_report_queue_sender.try_send(SendOutcome::Sent).is_err() {
                log!(Level::Warn, "Send report queue full, dropping outcome");
            }
        }
    }
}

/// Task servicing one echo link endpoint.
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub async fn link_device_task(
    mut link_device: LinkDevice,
    link_profile: LinkProfile,
    _link_role: LinkRole,
    tx_frame_queue_receiver: TxFrameQueueReceiver,
    send_report_queue_sender: SendReportQueueSender,
    rx_frame_queue_sender: RxFrameQueueSender,
) -> ! {
    log!(
        Level::Info,
        "Echo link up on channel {} ({})",
        link_profile.channel,
        LinkDevice::config_status()
    );
    link_device
        .run(
            tx_frame_queue_receiver,
            send_report_queue_sender,
            rx_frame_queue_sender,
        )
        .await
}
