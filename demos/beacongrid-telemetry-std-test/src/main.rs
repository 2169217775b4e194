//! Host-side demo of the full pipeline: three fixed nodes sample a wandering
//! beacon, report over a lossy simulated link, and the collector prints every
//! record it decodes.

use beacongrid_telemetry_lib::link_devices::simulator::{
    LinkDevice, LinkInputMessage, LinkInputQueue, LinkInputQueueSender, LinkOutputMessage,
    LinkOutputQueue, LinkOutputQueueReceiver,
};
use beacongrid_telemetry_lib::scanners::simulator::{
    ScanScript, ScanScriptQueue, ScanScriptQueueSender, Scanner,
};
use beacongrid_telemetry_lib::{
    CollectorConfig, CollectorManager, FixedNodeConfig, FixedNodeManager, LinkProfile,
    PipeAddress, SamplerConfig, ScanTable, RSSI_NOT_DETECTED_DBM,
};
use embassy_executor::Spawner;
use embassy_futures::select::select_array;
use embassy_sync::channel::Channel;
use embassy_time::Duration;
use env_logger::Builder;
use log::{log, LevelFilter};
use rand_core::{RngCore, SeedableRng};
use rand_wyrand::WyRand;

const NODE_COUNT: usize = 3;
const ENDPOINT_COUNT: usize = NODE_COUNT + 1; // fixed nodes plus the collector
const TARGET_SSID: &str = "BeaconNet";
/// Frame loss injected by the medium, out of 1000 sends
const LOSS_PERMILLE: u64 = 100;

/// How one endpoint is currently tuned, as last announced to the medium.
#[derive(Clone, Copy)]
struct Tuning {
    listening: bool,
    channel: u8,
    pipe_address: PipeAddress,
}

/// The shared medium: routes frames between endpoints tuned to the same
/// channel and pipe address, drops a fraction of sends, and acknowledges
/// every transmission.
#[embassy_executor::task]
async fn medium_task(
    output_receivers: [LinkOutputQueueReceiver; ENDPOINT_COUNT],
    input_senders: [LinkInputQueueSender; ENDPOINT_COUNT],
    rng_seed: u64,
) -> ! {
    let mut rng = WyRand::seed_from_u64(rng_seed);
    let mut tuning: [Option<Tuning>; ENDPOINT_COUNT] = [None; ENDPOINT_COUNT];

    loop {
        let request_futures: [_; ENDPOINT_COUNT] =
            core::array::from_fn(|i| output_receivers[i].receive());
        let (message, index) = select_array(request_futures).await;

        match message {
            LinkOutputMessage::OpenTransmitter {
                channel,
                pipe_address,
            } => {
                tuning[index] = Some(Tuning {
                    listening: false,
                    channel,
                    pipe_address,
                });
            }
            LinkOutputMessage::OpenReceiver {
                channel,
                pipe_address,
            } => {
                tuning[index] = Some(Tuning {
                    listening: true,
                    channel,
                    pipe_address,
                });
            }
            LinkOutputMessage::SendFrame(frame) => {
                let Some(sender_tuning) = tuning[index] else {
                    input_senders[index]
                        .send(LinkInputMessage::SendResult(false))
                        .await;
                    continue;
                };

                let lost = rng.next_u64() % 1000 < LOSS_PERMILLE;
                let mut delivered = false;
                if !lost {
                    for peer_index in 0..ENDPOINT_COUNT {
                        if peer_index == index {
                            continue;
                        }
                        if let Some(peer) = tuning[peer_index] {
                            if peer.listening
                                && peer.channel == sender_tuning.channel
                                && peer.pipe_address == sender_tuning.pipe_address
                            {
                                input_senders[peer_index]
                                    .send(LinkInputMessage::DeliverFrame(frame.clone()))
                                    .await;
                                delivered = true;
                            }
                        }
                    }
                } else {
                    log!(log::Level::Debug, "Medium dropped a frame from endpoint {}", index);
                }
                input_senders[index]
                    .send(LinkInputMessage::SendResult(delivered))
                    .await;
            }
        }
    }
}

/// Feeds one node's scanner with what its airspace looks like: the beacon
/// random-walking through the signal range, a neighbor network for clutter,
/// an occasional scan fault, and stretches where the beacon is out of range.
#[embassy_executor::task(pool_size = NODE_COUNT)]
async fn beacon_task(script_queue_sender: ScanScriptQueueSender, rng_seed: u64) -> ! {
    let mut rng = WyRand::seed_from_u64(rng_seed);
    let mut attenuation: i32 = 20;

    loop {
        let step = (rng.next_u64() % 5) as i32 - 2;
        attenuation = (attenuation + step).clamp(5, 60);
        let noise = (rng.next_u64() % 7) as i32 - 3;
        let rssi_dbm = -40 - attenuation - noise;

        let roll = rng.next_u64() % 100;
        if roll < 2 {
            script_queue_sender.send(ScanScript::Fault).await;
            continue;
        }

        let mut table = ScanTable::new();
        let _ = table.add_network(b"NeighborNet", -71);
        if roll >= 10 {
            // Below 10 the beacon is out of range this scan
            let _ = table.add_network(TARGET_SSID.as_bytes(), rssi_dbm);
        }
        script_queue_sender.send(ScanScript::Networks(table)).await;
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    Builder::new().filter_level(LevelFilter::Info).init();

    log!(
        log::Level::Info,
        "Starting beacon grid demo: {} fixed nodes, one collector",
        NODE_COUNT
    );

    let mut output_receivers: [Option<LinkOutputQueueReceiver>; ENDPOINT_COUNT] =
        [None; ENDPOINT_COUNT];
    let mut input_senders: [Option<LinkInputQueueSender>; ENDPOINT_COUNT] =
        [None; ENDPOINT_COUNT];

    for node_index in 0..NODE_COUNT {
        let output_queue: &'static LinkOutputQueue = Box::leak(Box::new(Channel::new()));
        let input_queue: &'static LinkInputQueue = Box::leak(Box::new(Channel::new()));
        output_receivers[node_index] = Some(output_queue.receiver());
        input_senders[node_index] = Some(input_queue.sender());
        let link_device = LinkDevice::with(output_queue.sender(), input_queue.receiver());

        let script_queue: &'static ScanScriptQueue = Box::leak(Box::new(Channel::new()));
        let scanner = Scanner::with(script_queue.receiver());
        spawner
            .spawn(beacon_task(
                script_queue.sender(),
                0xBEAC + node_index as u64,
            ))
            .unwrap();

        let node_id = node_index as u8 + 1;
        let config = FixedNodeConfig {
            node_id,
            sampler: SamplerConfig {
                target_ssid: TARGET_SSID,
                sample_delay: Duration::from_millis(20),
                ..SamplerConfig::default()
            },
            cycle_interval: Duration::from_secs(2),
            link: LinkProfile::default(),
        };

        let mut fixed_node_manager = FixedNodeManager::new();
        if fixed_node_manager
            .initialize(config, spawner, link_device, scanner)
            .is_err()
        {
            log!(log::Level::Error, "Error initializing fixed node {}", node_id);
        }
    }

    let output_queue: &'static LinkOutputQueue = Box::leak(Box::new(Channel::new()));
    let input_queue: &'static LinkInputQueue = Box::leak(Box::new(Channel::new()));
    output_receivers[NODE_COUNT] = Some(output_queue.receiver());
    input_senders[NODE_COUNT] = Some(input_queue.sender());
    let link_device = LinkDevice::with(output_queue.sender(), input_queue.receiver());

    let mut collector_manager_temp = CollectorManager::new();
    if collector_manager_temp
        .initialize(CollectorConfig::default(), spawner, link_device)
        .is_err()
    {
        log!(log::Level::Error, "Error initializing collector");
    }
    let collector_manager: &'static CollectorManager =
        Box::leak(Box::new(collector_manager_temp));

    spawner
        .spawn(medium_task(
            output_receivers.map(|receiver| receiver.unwrap()),
            input_senders.map(|sender| sender.unwrap()),
            0x5EED,
        ))
        .unwrap();

    log!(log::Level::Info, "Pipeline up, waiting for records");
    loop {
        match collector_manager.next_record().await {
            Ok(record) => {
                if record.rssi_dbm == RSSI_NOT_DETECTED_DBM {
                    log!(
                        log::Level::Info,
                        "node {}: beacon not detected",
                        record.node_id
                    );
                } else {
                    log!(
                        log::Level::Info,
                        "node {}: {} dBm",
                        record.node_id,
                        record.rssi_dbm
                    );
                }
            }
            Err(_) => {
                log!(log::Level::Error, "Error receiving record");
                continue;
            }
        }
    }
}
