//! # Simulated Link Device
//!
//! Link backend that trades frames with an external "medium" task instead of
//! real radio hardware. Many devices can run in one process, which makes it
//! the backend for host-side tests and multi-node demos.
//!
//! ## Architecture
//!
//! Each device owns two queues shared with the medium:
//!
//! - **output queue** (device to medium): mode announcements and frames to
//!   put on the air
//! - **input queue** (medium to device): delivered frames and send results
//!
//! The medium implements propagation however the experiment needs: route on
//! channel and pipe address, drop frames to model loss, delay them, or hand
//! them to every listener. This module only defines the device half.
//!
//! ## Message Flow
//!
//! 1. At startup the device announces `OpenTransmitter` or `OpenReceiver`
//!    according to its role, so the medium knows where it is tuned.
//! 2. To send, the device ensures it is in transmit mode, emits
//!    `SendFrame`, and waits for the medium's `SendResult` acknowledgement.
//! 3. Frames the medium delivers while the device is listening are forwarded
//!    to the receive queue. Frames delivered while it is transmitting are
//!    dropped, as a half-duplex radio would.
//!
//! ## Usage
//!
//! ```ignore
//! static LINK_OUTPUT_QUEUE: LinkOutputQueue = Channel::new();
//! static LINK_INPUT_QUEUE: LinkInputQueue = Channel::new();
//!
//! let link_device = LinkDevice::with(LINK_OUTPUT_QUEUE.sender(), LINK_INPUT_QUEUE.receiver());
//! // hand LINK_OUTPUT_QUEUE.receiver() and LINK_INPUT_QUEUE.sender() to the medium task
//! ```

use crate::link_devices::{LinkConfigStatus, LinkMode, LinkProfile, LinkRole, SendOutcome};
use crate::{
    LinkFrame, PipeAddress, RxFrameQueueSender, SendReportQueueSender, TxFrameQueueReceiver,
    MAX_NODE_COUNT,
};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{log, Level};

/// Size of the device-to-medium queue
const LINK_OUTPUT_QUEUE_SIZE: usize = 8;
/// Size of the medium-to-device queue
const LINK_INPUT_QUEUE_SIZE: usize = 8;

/// Messages a device sends to the medium.
#[cfg_attr(feature = "std", derive(Debug))]
pub enum LinkOutputMessage {
    /// The device is now tuned for transmission on this channel and pipe.
    OpenTransmitter {
        channel: u8,
        pipe_address: PipeAddress,
    },
    /// The device is now listening on this channel and pipe.
    OpenReceiver {
        channel: u8,
        pipe_address: PipeAddress,
    },
    /// Put this frame on the air. The medium must answer with a
    /// [`LinkInputMessage::SendResult`].
    SendFrame(LinkFrame),
}

/// Messages the medium sends to a device.
#[cfg_attr(feature = "std", derive(Debug))]
pub enum LinkInputMessage {
    /// A frame arrived on the channel and pipe this device listens on.
    DeliverFrame(LinkFrame),
    /// Acknowledgement for the most recent `SendFrame`. True when the
    /// addressed receiver took the frame.
    SendResult(bool),
}

/// Queue for messages from a device to the medium
pub type LinkOutputQueue = Channel<CriticalSectionRawMutex, LinkOutputMessage, LINK_OUTPUT_QUEUE_SIZE>;
/// Sender half of the device-to-medium queue
pub type LinkOutputQueueSender =
    embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, LinkOutputMessage, LINK_OUTPUT_QUEUE_SIZE>;
/// Receiver half of the device-to-medium queue, held by the medium
pub type LinkOutputQueueReceiver =
    embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, LinkOutputMessage, LINK_OUTPUT_QUEUE_SIZE>;

/// Queue for messages from the medium to a device
pub type LinkInputQueue = Channel<CriticalSectionRawMutex, LinkInputMessage, LINK_INPUT_QUEUE_SIZE>;
/// Sender half of the medium-to-device queue, held by the medium
pub type LinkInputQueueSender =
    embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, LinkInputMessage, LINK_INPUT_QUEUE_SIZE>;
/// Receiver half of the medium-to-device queue
pub type LinkInputQueueReceiver =
    embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, LinkInputMessage, LINK_INPUT_QUEUE_SIZE>;

/// Handle to one simulated link endpoint.
pub struct LinkDevice {
    output_queue_sender: LinkOutputQueueSender,
    input_queue_receiver: LinkInputQueueReceiver,
}

impl LinkDevice {
    /// Creates a device from its two medium-facing queue endpoints.
    pub const fn with(
        output_queue_sender: LinkOutputQueueSender,
        input_queue_receiver: LinkInputQueueReceiver,
    ) -> Self {
        LinkDevice {
            output_queue_sender,
            input_queue_receiver,
        }
    }

    /// Reports how much of a [`LinkProfile`] this backend honors.
    ///
    /// The medium routes on channel and pipe address only, so data rate and
    /// power settings are recorded but have no effect.
    pub fn config_status() -> LinkConfigStatus {
        LinkConfigStatus::AppliedWithDefaults
    }
}

/// Forwards one medium message according to the current half-duplex mode.
fn handle_medium_message(
    message: LinkInputMessage,
    mode: LinkMode,
    rx_frame_queue_sender: RxFrameQueueSender,
) {
    match message {
        LinkInputMessage::DeliverFrame(frame) => match mode {
            LinkMode::Listening => {
                if rx_frame_queue_sender.try_send(frame).is_err() {
                    log!(Level::Warn, "Receive queue full, dropping frame");
                }
            }
            LinkMode::Transmitting => {
                log::trace!("Frame arrived while transmitting, dropped");
            }
        },
        LinkInputMessage::SendResult(_) => {
            log!(Level::Warn, "Send result with no transmission in flight, ignored");
        }
    }
}

/// Switches the device to transmit mode if it is not there already.
///
/// The switch flushes frames the medium delivered before the device retuned.
/// A half-duplex radio clears its receive FIFO the same way.
async fn ensure_transmit_mode(
    mode: &mut LinkMode,
    link_profile: &LinkProfile,
    output_queue_sender: LinkOutputQueueSender,
    input_queue_receiver: LinkInputQueueReceiver,
) {
    if matches!(*mode, LinkMode::Transmitting) {
        return;
    }

    while let Ok(message) = input_queue_receiver.try_receive() {
        match message {
            LinkInputMessage::DeliverFrame(_) => {
                log::trace!("Flushed frame pending from listen mode");
            }
            LinkInputMessage::SendResult(_) => {
                log!(Level::Warn, "Stale send result flushed on mode switch");
            }
        }
    }

    output_queue_sender
        .send(LinkOutputMessage::OpenTransmitter {
            channel: link_profile.channel,
            pipe_address: link_profile.pipe_address,
        })
        .await;
    *mode = LinkMode::Transmitting;
    log!(Level::Debug, "Switched to transmit mode");
}

/// Puts one frame on the air and reports the medium's acknowledgement.
///
/// Requires the device to be in transmit mode. Frames the medium delivers
/// while the acknowledgement is pending are dropped.
async fn transmit_frame(
    frame: LinkFrame,
    output_queue_sender: LinkOutputQueueSender,
    input_queue_receiver: LinkInputQueueReceiver,
    send_report_queue_sender: SendReportQueueSender,
) {
    output_queue_sender
        .send(LinkOutputMessage::SendFrame(frame))
        .await;

    loop {
        match input_queue_receiver.receive().await {
            LinkInputMessage::DeliverFrame(_) => {
                log::trace!("Frame arrived while awaiting send result, dropped");
            }
            LinkInputMessage::SendResult(success) => {
                let outcome = if success {
                    SendOutcome::Sent
                } else {
                    SendOutcome::Failed
                };
                if send_report_queue_sender.try_send(outcome).is_err() {
                    log!(Level::Warn, "Send report queue full, dropping outcome");
                }
                return;
            }
        }
    }
}

/// Returns the device to its listening home mode after a send.
async fn resume_listening(
    mode: &mut LinkMode,
    link_profile: &LinkProfile,
    output_queue_sender: LinkOutputQueueSender,
) {
    output_queue_sender
        .send(LinkOutputMessage::OpenReceiver {
            channel: link_profile.channel,
            pipe_address: link_profile.pipe_address,
        })
        .await;
    *mode = LinkMode::Listening;
    log!(Level::Debug, "Resumed listening");
}

/// Task servicing one simulated link endpoint.
///
/// Announces the role's home mode to the medium, then forwards traffic
/// between the medium queues and the crate's frame queues until the end of
/// time.
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub async fn link_device_task(
    link_device: LinkDevice,
    link_profile: LinkProfile,
    link_role: LinkRole,
    tx_frame_queue_receiver: TxFrameQueueReceiver,
    send_report_queue_sender: SendReportQueueSender,
    rx_frame_queue_sender: RxFrameQueueSender,
) -> ! {
    let mut mode = match link_role {
        LinkRole::Transmitter => {
            link_device
                .output_queue_sender
                .send(LinkOutputMessage::OpenTransmitter {
                    channel: link_profile.channel,
                    pipe_address: link_profile.pipe_address,
                })
                .await;
            LinkMode::Transmitting
        }
        LinkRole::Receiver => {
            link_device
                .output_queue_sender
                .send(LinkOutputMessage::OpenReceiver {
                    channel: link_profile.channel,
                    pipe_address: link_profile.pipe_address,
                })
                .await;
            LinkMode::Listening
        }
    };

    log!(
        Level::Info,
        "Simulated link up on channel {} ({})",
        link_profile.channel,
        LinkDevice::config_status()
    );

    loop {
        match select(
            link_device.input_queue_receiver.receive(),
            tx_frame_queue_receiver.receive(),
        )
        .await
        {
            Either::First(message) => {
                handle_medium_message(message, mode, rx_frame_queue_sender);
            }
            Either::Second(frame) => {
                ensure_transmit_mode(
                    &mut mode,
                    &link_profile,
                    link_device.output_queue_sender,
                    link_device.input_queue_receiver,
                )
                .await;
                transmit_frame(
                    frame,
                    link_device.output_queue_sender,
                    link_device.input_queue_receiver,
                    send_report_queue_sender,
                )
                .await;
                if matches!(link_role, LinkRole::Receiver) {
                    resume_listening(&mut mode, &link_profile, link_device.output_queue_sender)
                        .await;
                }
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::{RxFrameQueue, SendReportQueue, RX_FRAME_QUEUE_SIZE};
    use futures::executor::block_on;

    #[test]
    fn test_delivery_forwarded_while_listening() {
        let rx_frame_queue: &'static RxFrameQueue = Box::leak(Box::new(Channel::new()));
        let frame = LinkFrame::from_payload(&[1, 2, 3, 4, 5]);

        handle_medium_message(
            LinkInputMessage::DeliverFrame(frame),
            LinkMode::Listening,
            rx_frame_queue.sender(),
        );

        let forwarded = rx_frame_queue.receiver().try_receive().unwrap();
        assert_eq!(forwarded.payload(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_delivery_dropped_while_transmitting() {
        let rx_frame_queue: &'static RxFrameQueue = Box::leak(Box::new(Channel::new()));
        let frame = LinkFrame::from_payload(&[1, 2, 3, 4, 5]);

        handle_medium_message(
            LinkInputMessage::DeliverFrame(frame),
            LinkMode::Transmitting,
            rx_frame_queue.sender(),
        );

        assert!(rx_frame_queue.receiver().try_receive().is_err());
    }

    #[test]
    fn test_delivery_dropped_when_receive_queue_full() {
        let rx_frame_queue: &'static RxFrameQueue = Box::leak(Box::new(Channel::new()));
        for _ in 0..RX_FRAME_QUEUE_SIZE {
            rx_frame_queue
                .sender()
                .try_send(LinkFrame::from_payload(&[0; 5]))
                .unwrap();
        }

        handle_medium_message(
            LinkInputMessage::DeliverFrame(LinkFrame::from_payload(&[9; 5])),
            LinkMode::Listening,
            rx_frame_queue.sender(),
        );

        let mut drained = 0;
        while rx_frame_queue.receiver().try_receive().is_ok() {
            drained += 1;
        }
        assert_eq!(drained, RX_FRAME_QUEUE_SIZE);
    }

    #[test]
    fn test_mode_switch_announces_and_flushes() {
        let output_queue: &'static LinkOutputQueue = Box::leak(Box::new(Channel::new()));
        let input_queue: &'static LinkInputQueue = Box::leak(Box::new(Channel::new()));
        let stale = LinkFrame::from_payload(&[7, 7, 7, 7, 7]);
        input_queue
            .sender()
            .try_send(LinkInputMessage::DeliverFrame(stale))
            .unwrap();

        let mut mode = LinkMode::Listening;
        let link_profile = LinkProfile::default();
        block_on(ensure_transmit_mode(
            &mut mode,
            &link_profile,
            output_queue.sender(),
            input_queue.receiver(),
        ));

        assert_eq!(mode, LinkMode::Transmitting);
        assert!(input_queue.receiver().try_receive().is_err());
        match output_queue.receiver().try_receive().unwrap() {
            LinkOutputMessage::OpenTransmitter {
                channel,
                pipe_address,
            } => {
                assert_eq!(channel, link_profile.channel);
                assert_eq!(pipe_address, link_profile.pipe_address);
            }
            _ => panic!("expected a transmitter announcement"),
        }
    }

    #[test]
    fn test_mode_switch_is_idempotent() {
        let output_queue: &'static LinkOutputQueue = Box::leak(Box::new(Channel::new()));
        let input_queue: &'static LinkInputQueue = Box::leak(Box::new(Channel::new()));

        let mut mode = LinkMode::Transmitting;
        block_on(ensure_transmit_mode(
            &mut mode,
            &LinkProfile::default(),
            output_queue.sender(),
            input_queue.receiver(),
        ));

        assert_eq!(mode, LinkMode::Transmitting);
        assert!(output_queue.receiver().try_receive().is_err());
    }

    #[test]
    fn test_transmit_reports_acknowledged_send() {
        let output_queue: &'static LinkOutputQueue = Box::leak(Box::new(Channel::new()));
        let input_queue: &'static LinkInputQueue = Box::leak(Box::new(Channel::new()));
        let send_report_queue: &'static SendReportQueue = Box::leak(Box::new(Channel::new()));
        input_queue
            .sender()
            .try_send(LinkInputMessage::SendResult(true))
            .unwrap();

        block_on(transmit_frame(
            LinkFrame::from_payload(&[3, 0xC7, 0xFF, 0xFF, 0xFF]),
            output_queue.sender(),
            input_queue.receiver(),
            send_report_queue.sender(),
        ));

        match output_queue.receiver().try_receive().unwrap() {
            LinkOutputMessage::SendFrame(frame) => {
                assert_eq!(frame.payload(), &[3, 0xC7, 0xFF, 0xFF, 0xFF]);
            }
            _ => panic!("expected a frame submission"),
        }
        assert_eq!(
            send_report_queue.receiver().try_receive().unwrap(),
            SendOutcome::Sent
        );
    }

    #[test]
    fn test_transmit_reports_failed_send() {
        let output_queue: &'static LinkOutputQueue = Box::leak(Box::new(Channel::new()));
        let input_queue: &'static LinkInputQueue = Box::leak(Box::new(Channel::new()));
        let send_report_queue: &'static SendReportQueue = Box::leak(Box::new(Channel::new()));
        input_queue
            .sender()
            .try_send(LinkInputMessage::SendResult(false))
            .unwrap();

        block_on(transmit_frame(
            LinkFrame::from_payload(&[1; 5]),
            output_queue.sender(),
            input_queue.receiver(),
            send_report_queue.sender(),
        ));

        assert_eq!(
            send_report_queue.receiver().try_receive().unwrap(),
            SendOutcome::Failed
        );
    }

    #[test]
    fn test_frames_during_acknowledgement_wait_are_dropped() {
        let output_queue: &'static LinkOutputQueue = Box::leak(Box::new(Channel::new()));
        let input_queue: &'static LinkInputQueue = Box::leak(Box::new(Channel::new()));
        let send_report_queue: &'static SendReportQueue = Box::leak(Box::new(Channel::new()));
        let interleaved = LinkFrame::from_payload(&[8, 8, 8, 8, 8]);
        input_queue
            .sender()
            .try_send(LinkInputMessage::DeliverFrame(interleaved))
            .unwrap();
        input_queue
            .sender()
            .try_send(LinkInputMessage::SendResult(true))
            .unwrap();

        block_on(transmit_frame(
            LinkFrame::from_payload(&[2; 5]),
            output_queue.sender(),
            input_queue.receiver(),
            send_report_queue.sender(),
        ));

        assert_eq!(
            send_report_queue.receiver().try_receive().unwrap(),
            SendOutcome::Sent
        );
        assert!(input_queue.receiver().try_receive().is_err());
    }

    #[test]
    fn test_resume_listening_announces_receiver() {
        let output_queue: &'static LinkOutputQueue = Box::leak(Box::new(Channel::new()));

        let mut mode = LinkMode::Transmitting;
        let link_profile = LinkProfile::default();
        block_on(resume_listening(
            &mut mode,
            &link_profile,
            output_queue.sender(),
        ));

        assert_eq!(mode, LinkMode::Listening);
        match output_queue.receiver().try_receive().unwrap() {
            LinkOutputMessage::OpenReceiver { channel, .. } => {
                assert_eq!(channel, link_profile.channel);
            }
            _ => panic!("expected a receiver announcement"),
        }
    }
}
