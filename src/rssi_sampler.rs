//! # RSSI Sampler
//!
//! Turns a burst of noisy wireless scans into a single signal estimate for the
//! target beacon.
//!
//! ## Sampling strategy
//!
//! Individual RSSI readings from commodity radios jitter by several dBm from
//! one scan to the next. Instead of reporting raw readings, a node performs a
//! short burst of scans ([`SamplerConfig::sample_count`](crate::SamplerConfig)
//! attempts, spaced by `sample_delay`) and averages the readings that fall
//! inside the plausible range. Readings outside
//! `[min_valid_dbm, max_valid_dbm]` are treated as radio artifacts and
//! discarded. If no attempt yields a usable reading, the burst resolves to the
//! [`RSSI_NOT_DETECTED_DBM`](crate::RSSI_NOT_DETECTED_DBM) sentinel so that
//! "beacon out of range" is itself a reportable observation.
//!
//! A failed scan attempt only costs that attempt. The burst carries on, and
//! the average is taken over however many attempts succeeded.
//!
//! ## Key Components
//!
//! - `NetworkScanner`: trait a platform scan backend implements
//! - `ScanTable` / `ScanEntry`: bounded snapshot of the networks one scan saw
//! - `sample_target`: the burst-and-average routine itself

use crate::{SamplerConfig, MAX_SCAN_ENTRIES, MAX_SSID_LEN, RSSI_NOT_DETECTED_DBM};
use embassy_time::{Duration, Timer};
use log::{log, Level};

/// Error type returned when a wireless scan attempt fails.
///
/// The scan interface deliberately collapses backend failures into a single
/// opaque error. The sampler reacts the same way to all of them: log the
/// attempt, skip it, and keep the burst going.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ScanError;

impl core::fmt::Display for ScanError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "wireless scan failed")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ScanError {}

/// One visible network in a scan result.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ScanEntry {
    ssid: [u8; MAX_SSID_LEN],
    ssid_length: usize,
    rssi_dbm: i32,
}

impl ScanEntry {
    const EMPTY: ScanEntry = ScanEntry {
        ssid: [0; MAX_SSID_LEN],
        ssid_length: 0,
        rssi_dbm: 0,
    };

    /// Returns the network name as raw bytes.
    ///
    /// SSIDs are octet strings on the air, so no UTF-8 validity is assumed.
    pub fn ssid(&self) -> &[u8] {
        &self.ssid[..self.ssid_length]
    }

    /// Returns the received signal strength for this network in dBm.
    pub fn rssi_dbm(&self) -> i32 {
        self.rssi_dbm
    }
}

/// Result of a single wireless scan: the networks that were visible.
///
/// Bounded at [`MAX_SCAN_ENTRIES`](crate::MAX_SCAN_ENTRIES) entries so scan
/// results can cross task boundaries without allocation. Entries keep the
/// order the backend reported them in.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ScanTable {
    entries: [ScanEntry; MAX_SCAN_ENTRIES],
    count: usize,
}

impl ScanTable {
    /// Creates an empty scan table.
    pub const fn new() -> Self {
        ScanTable {
            entries: [ScanEntry::EMPTY; MAX_SCAN_ENTRIES],
            count: 0,
        }
    }

    /// Records one visible network.
    ///
    /// Returns Err if the table is full or the name exceeds
    /// [`MAX_SSID_LEN`](crate::MAX_SSID_LEN) bytes.
    pub fn add_network(&mut self, ssid: &[u8], rssi_dbm: i32) -> Result<(), ()> {
        if self.count >= MAX_SCAN_ENTRIES || ssid.len() > MAX_SSID_LEN {
            return Err(());
        }

        let entry = &mut self.entries[self.count];
        entry.ssid[..ssid.len()].copy_from_slice(ssid);
        entry.ssid_length = ssid.len();
        entry.rssi_dbm = rssi_dbm;
        self.count += 1;
        Ok(())
    }

    /// Returns the visible networks in scan order.
    pub fn networks(&self) -> &[ScanEntry] {
        &self.entries[..self.count]
    }
}

impl Default for ScanTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Interface a platform wireless scanner implements.
///
/// One call performs one full scan and returns everything that was visible.
/// Implementations are free to take as long as a real scan takes; the sampler
/// awaits them.
pub trait NetworkScanner {
    async fn scan(&mut self) -> Result<ScanTable, ScanError>;
}

/// Runs one sampling burst against the target beacon and returns the estimate
/// in dBm, or [`RSSI_NOT_DETECTED_DBM`](crate::RSSI_NOT_DETECTED_DBM) if no
/// attempt produced a usable reading.
///
/// Per attempt: scan, look the target SSID up in the result, range-check the
/// reading. When several visible networks advertise the target SSID the first
/// one in scan order is used; which physical transmitter that is depends on
/// the backend's reporting order. The estimate is the arithmetic mean of the
/// accepted readings, rounded toward negative infinity to stay on the
/// conservative (weaker) side.
pub async fn sample_target<S: NetworkScanner>(scanner: &mut S, config: &SamplerConfig) -> i32 {
    let mut rssi_sum: i32 = 0;
    let mut valid_count: u32 = 0;

    log!(
        Level::Debug,
        "Starting sampling burst: {} attempts for target '{}'",
        config.sample_count,
        config.target_ssid
    );

    for attempt in 0..config.sample_count {
        match scanner.scan().await {
            Ok(scan_table) => {
                let target = scan_table
                    .networks()
                    .iter()
                    .find(|entry| entry.ssid() == config.target_ssid.as_bytes());

                match target {
                    Some(entry) => {
                        let rssi_dbm = entry.rssi_dbm();
                        if rssi_dbm >= config.min_valid_dbm && rssi_dbm <= config.max_valid_dbm {
                            rssi_sum += rssi_dbm;
                            valid_count += 1;
                            log!(
                                Level::Debug,
                                "Attempt {}/{}: target at {} dBm",
                                attempt + 1,
                                config.sample_count,
                                rssi_dbm
                            );
                        } else {
                            log!(
                                Level::Debug,
                                "Attempt {}/{}: reading {} dBm outside [{}, {}], discarded",
                                attempt + 1,
                                config.sample_count,
                                rssi_dbm,
                                config.min_valid_dbm,
                                config.max_valid_dbm
                            );
                        }
                    }
                    None => {
                        log!(
                            Level::Debug,
                            "Attempt {}/{}: target not visible",
                            attempt + 1,
                            config.sample_count
                        );
                    }
                }
            }
            Err(ScanError) => {
                log!(
                    Level::Warn,
                    "Attempt {}/{}: scan failed, skipping",
                    attempt + 1,
                    config.sample_count
                );
            }
        }

        // No settling pause after the last attempt
        if attempt + 1 < config.sample_count && config.sample_delay > Duration::from_secs(0) {
            Timer::after(config.sample_delay).await;
        }
    }

    if valid_count > 0 {
        // Floor division keeps the estimate pessimistic for negative sums
        let estimate = rssi_sum.div_euclid(valid_count as i32);
        log!(
            Level::Info,
            "Sampling done: {} dBm from {} of {} attempts",
            estimate,
            valid_count,
            config.sample_count
        );
        estimate
    } else {
        log!(
            Level::Info,
            "Sampling done: target not detected in {} attempts",
            config.sample_count
        );
        RSSI_NOT_DETECTED_DBM
    }
}
