//! # Fixed Node Loop
//!
//! The measure-and-report cycle a fixed node runs forever:
//!
//! 1. Sample the target beacon's signal strength (a burst of scans)
//! 2. Encode the estimate as a telemetry frame
//! 3. Hand the frame to the link device and wait for its send report
//! 4. Sleep out the cycle interval and start over
//!
//! A cycle always produces exactly one frame. Failed sends are logged and
//! forgotten; the next cycle starts on schedule regardless, so a dead link
//! never wedges the sampling loop.

use crate::frames::TelemetryFrame;
use crate::link_devices::SendOutcome;
use crate::rssi_sampler::{sample_target, NetworkScanner};
use crate::scanners::Scanner;
use crate::{SamplerConfig, SendReportQueueReceiver, TxFrameQueueSender, MAX_NODE_COUNT};
use embassy_time::{Duration, Timer};
use log::log;

/// Runs one measure-and-report cycle.
///
/// The frame is submitted with a non-blocking send so a stalled link device
/// can never hold up sampling. When the link is busy the cycle's report is
/// dropped and counted as a failed send.
pub(crate) async fn run_cycle<S: NetworkScanner>(
    node_id: u8,
    sampler_config: &SamplerConfig,
    scanner: &mut S,
    tx_frame_queue_sender: TxFrameQueueSender,
    send_report_queue_receiver: SendReportQueueReceiver,
) {
    let rssi_dbm = sample_target(scanner, sampler_config).await;
    let frame = TelemetryFrame::with(node_id, rssi_dbm);

    match tx_frame_queue_sender.try_send(frame.to_link_frame()) {
        Ok(()) => match send_report_queue_receiver.receive().await {
            SendOutcome::Sent => {
                log!(log::Level::Info, "[{}] Reported {} dBm", node_id, rssi_dbm);
            }
            SendOutcome::Failed => {
                log!(
                    log::Level::Warn,
                    "[{}] Send failed, report lost for this cycle",
                    node_id
                );
            }
        },
        Err(embassy_sync::channel::TrySendError::Full(_)) => {
            log!(
                log::Level::Warn,
                "[{}] TX frame queue full, dropping report",
                node_id
            );
        }
    }
}

/// Fixed Node Task
///
/// Drives the node's cycle forever. The scanner and the queue endpoints are
/// owned by the task; nothing else touches them once it is spawned.
///
/// The cycle interval paces the start of consecutive cycles from the end of
/// the previous one, so sampling and transmission time add on top of it.
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub(crate) async fn fixed_node_task(
    node_id: u8,
    sampler_config: SamplerConfig,
    cycle_interval: Duration,
    mut scanner: Scanner,
    tx_frame_queue_sender: TxFrameQueueSender,
    send_report_queue_receiver: SendReportQueueReceiver,
) -> ! {
    log!(
        log::Level::Info,
        "[{}] Fixed node task started, target '{}', cycle {}s",
        node_id,
        sampler_config.target_ssid,
        cycle_interval.as_secs()
    );

    loop {
        run_cycle(
            node_id,
            &sampler_config,
            &mut scanner,
            tx_frame_queue_sender,
            send_report_queue_receiver,
        )
        .await;

        if cycle_interval > Duration::from_secs(0) {
            Timer::after(cycle_interval).await;
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::rssi_sampler::{ScanError, ScanTable};
    use crate::{SendReportQueue, TxFrameQueue, TX_FRAME_QUEUE_SIZE};
    use embassy_sync::channel::Channel;
    use futures::executor::block_on;

    struct ScriptedScanner {
        script: Vec<Result<ScanTable, ScanError>>,
        position: usize,
    }

    impl NetworkScanner for ScriptedScanner {
        async fn scan(&mut self) -> Result<ScanTable, ScanError> {
            let result = self.script[self.position].clone();
            self.position += 1;
            result
        }
    }

    fn sampler_config(sample_count: u8) -> SamplerConfig {
        SamplerConfig {
            target_ssid: "BeaconNet",
            sample_count,
            sample_delay: Duration::from_secs(0),
            ..SamplerConfig::default()
        }
    }

    fn table_with_target(rssi_dbm: i32) -> ScanTable {
        let mut table = ScanTable::new();
        table.add_network(b"BeaconNet", rssi_dbm).unwrap();
        table
    }

    #[test]
    fn cycle_sends_exactly_one_frame_with_estimate() {
        let tx_frame_queue: &'static TxFrameQueue = Box::leak(Box::new(Channel::new()));
        let send_report_queue: &'static SendReportQueue = Box::leak(Box::new(Channel::new()));
        send_report_queue
            .sender()
            .try_send(SendOutcome::Sent)
            .unwrap();

        let mut scanner = ScriptedScanner {
            script: vec![
                Ok(table_with_target(-60)),
                Ok(table_with_target(-62)),
                Ok(table_with_target(-61)),
            ],
            position: 0,
        };

        block_on(run_cycle(
            7,
            &sampler_config(3),
            &mut scanner,
            tx_frame_queue.sender(),
            send_report_queue.receiver(),
        ));

        let frame = tx_frame_queue.receiver().try_receive().unwrap();
        assert_eq!(frame.payload(), &[0x07, 0xC3, 0xFF, 0xFF, 0xFF]);
        assert!(tx_frame_queue.receiver().try_receive().is_err());
    }

    #[test]
    fn cycle_reports_sentinel_when_target_missing() {
        let tx_frame_queue: &'static TxFrameQueue = Box::leak(Box::new(Channel::new()));
        let send_report_queue: &'static SendReportQueue = Box::leak(Box::new(Channel::new()));
        send_report_queue
            .sender()
            .try_send(SendOutcome::Sent)
            .unwrap();

        let mut scanner = ScriptedScanner {
            script: vec![Ok(ScanTable::new())],
            position: 0,
        };

        block_on(run_cycle(
            3,
            &sampler_config(1),
            &mut scanner,
            tx_frame_queue.sender(),
            send_report_queue.receiver(),
        ));

        let frame = tx_frame_queue.receiver().try_receive().unwrap();
        let telemetry = TelemetryFrame::from_payload(frame.payload()).unwrap();
        assert_eq!(telemetry.node_id(), 3);
        assert_eq!(telemetry.rssi_dbm(), crate::RSSI_NOT_DETECTED_DBM);
    }

    #[test]
    fn failed_send_does_not_block_next_cycle() {
        let tx_frame_queue: &'static TxFrameQueue = Box::leak(Box::new(Channel::new()));
        let send_report_queue: &'static SendReportQueue = Box::leak(Box::new(Channel::new()));

        let mut scanner = ScriptedScanner {
            script: vec![Ok(table_with_target(-50)), Ok(table_with_target(-52))],
            position: 0,
        };
        let config = sampler_config(1);

        send_report_queue
            .sender()
            .try_send(SendOutcome::Failed)
            .unwrap();
        block_on(run_cycle(
            1,
            &config,
            &mut scanner,
            tx_frame_queue.sender(),
            send_report_queue.receiver(),
        ));

        send_report_queue
            .sender()
            .try_send(SendOutcome::Sent)
            .unwrap();
        block_on(run_cycle(
            1,
            &config,
            &mut scanner,
            tx_frame_queue.sender(),
            send_report_queue.receiver(),
        ));

        let first = tx_frame_queue.receiver().try_receive().unwrap();
        let second = tx_frame_queue.receiver().try_receive().unwrap();
        assert_eq!(
            TelemetryFrame::from_payload(first.payload()).unwrap().rssi_dbm(),
            -50
        );
        assert_eq!(
            TelemetryFrame::from_payload(second.payload()).unwrap().rssi_dbm(),
            -52
        );
    }

    #[test]
    fn busy_link_drops_frame_without_waiting_for_report() {
        let tx_frame_queue: &'static TxFrameQueue = Box::leak(Box::new(Channel::new()));
        let send_report_queue: &'static SendReportQueue = Box::leak(Box::new(Channel::new()));
        for _ in 0..TX_FRAME_QUEUE_SIZE {
            tx_frame_queue
                .sender()
                .try_send(crate::LinkFrame::from_payload(&[0; 5]))
                .unwrap();
        }

        let mut scanner = ScriptedScanner {
            script: vec![Ok(table_with_target(-44))],
            position: 0,
        };

        // Report queue is empty; the cycle must finish anyway
        block_on(run_cycle(
            2,
            &sampler_config(1),
            &mut scanner,
            tx_frame_queue.sender(),
            send_report_queue.receiver(),
        ));

        let mut queued = 0;
        while tx_frame_queue.receiver().try_receive().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, TX_FRAME_QUEUE_SIZE);
    }
}
