//! # Collector Loop
//!
//! Receives link frames from the collector's link device, validates them
//! against the telemetry wire contract, and publishes decoded node records
//! for the application.
//!
//! Frames with any other length than the contract's are logged and dropped
//! whole; a record is only ever produced from a frame that decodes cleanly.
//! The loop wakes on its own at the idle poll interval even when nothing
//! arrives, matching the polling rhythm of the radio hardware this stands
//! in for.

use crate::frames::{FrameError, TelemetryFrame};
use crate::{LinkFrame, NodeRecord, RecordQueueSender, RxFrameQueueReceiver};
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};
use log::{log, Level};

/// Validates and decodes one received frame, publishing the record.
///
/// Malformed frames are dropped here and never reach the record queue. If
/// the application falls behind and the record queue is full, the newest
/// record is dropped and the loss is logged.
pub(crate) fn process_link_frame(frame: &LinkFrame, record_queue_sender: RecordQueueSender) {
    match TelemetryFrame::from_payload(frame.payload()) {
        Ok(telemetry) => {
            let record = NodeRecord {
                node_id: telemetry.node_id(),
                rssi_dbm: telemetry.rssi_dbm(),
                receipt_time: Instant::now(),
            };
            log!(
                Level::Info,
                "Record from node {}: {} dBm",
                record.node_id,
                record.rssi_dbm
            );
            if record_queue_sender.try_send(record).is_err() {
                log!(Level::Warn, "Record queue full, dropping record");
            }
        }
        Err(FrameError::InvalidLength(length)) => {
            log!(
                Level::Warn,
                "Dropping frame with unexpected length: {} bytes",
                length
            );
        }
    }
}

/// Collector Task
///
/// Waits for frames from the link device and turns them into node records.
/// The idle poll interval bounds how long the loop sleeps between checks
/// when the air is quiet.
#[cfg_attr(feature = "std", embassy_executor::task(pool_size = 4))]
#[cfg_attr(feature = "embedded", embassy_executor::task(pool_size = 1))]
pub(crate) async fn collector_task(
    idle_poll_interval: Duration,
    rx_frame_queue_receiver: RxFrameQueueReceiver,
    record_queue_sender: RecordQueueSender,
) -> ! {
    log!(Level::Info, "Collector task started");

    loop {
        match select(
            rx_frame_queue_receiver.receive(),
            Timer::after(idle_poll_interval),
        )
        .await
        {
            Either::First(frame) => {
                process_link_frame(&frame, record_queue_sender);
            }
            Either::Second(_) => {
                // Idle tick, nothing pending
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::RecordQueue;
    use embassy_sync::channel::Channel;

    #[test]
    fn valid_frame_becomes_record() {
        let record_queue: &'static RecordQueue = Box::leak(Box::new(Channel::new()));
        let frame = LinkFrame::from_payload(&[0x07, 0xC7, 0xFF, 0xFF, 0xFF]);

        process_link_frame(&frame, record_queue.sender());

        let record = record_queue.receiver().try_receive().unwrap();
        assert_eq!(record.node_id, 7);
        assert_eq!(record.rssi_dbm, -57);
    }

    #[test]
    fn short_frame_is_dropped() {
        let record_queue: &'static RecordQueue = Box::leak(Box::new(Channel::new()));
        let frame = LinkFrame::from_payload(&[0x01, 0x02, 0x03]);

        process_link_frame(&frame, record_queue.sender());

        assert!(record_queue.receiver().try_receive().is_err());
    }

    #[test]
    fn long_frame_is_dropped() {
        let record_queue: &'static RecordQueue = Box::leak(Box::new(Channel::new()));
        let frame = LinkFrame::from_payload(&[0u8; 8]);

        process_link_frame(&frame, record_queue.sender());

        assert!(record_queue.receiver().try_receive().is_err());
    }

    #[test]
    fn sentinel_frame_still_becomes_record() {
        let record_queue: &'static RecordQueue = Box::leak(Box::new(Channel::new()));
        let telemetry = TelemetryFrame::with(4, crate::RSSI_NOT_DETECTED_DBM);
        let frame = telemetry.to_link_frame();

        process_link_frame(&frame, record_queue.sender());

        let record = record_queue.receiver().try_receive().unwrap();
        assert_eq!(record.node_id, 4);
        assert_eq!(record.rssi_dbm, crate::RSSI_NOT_DETECTED_DBM);
    }

    #[test]
    fn full_record_queue_drops_newest() {
        let record_queue: &'static RecordQueue = Box::leak(Box::new(Channel::new()));
        let frame = TelemetryFrame::with(1, -40).to_link_frame();
        for _ in 0..crate::RECORD_QUEUE_SIZE {
            process_link_frame(&frame, record_queue.sender());
        }

        let overflow = TelemetryFrame::with(2, -99).to_link_frame();
        process_link_frame(&overflow, record_queue.sender());

        let mut from_node_two = 0;
        while let Ok(record) = record_queue.receiver().try_receive() {
            if record.node_id == 2 {
                from_node_two += 1;
            }
        }
        assert_eq!(from_node_two, 0);
    }
}
