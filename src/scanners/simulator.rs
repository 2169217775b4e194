//! # Simulated Scanner
//!
//! Scanner backend that replays scripted results instead of surveying real
//! airspace. A feeder task (or a test) pushes one [`ScanScript`] entry per
//! expected scan call; the scanner hands them out in order.
//!
//! Because each scan consumes exactly one script entry, a scenario controls
//! precisely what every sampling attempt sees: which networks are visible,
//! at what strength, and when the survey itself fails.
//!
//! ## Usage
//!
//! ```ignore
//! static SCAN_SCRIPT_QUEUE: ScanScriptQueue = Channel::new();
//!
//! let scanner = Scanner::with(SCAN_SCRIPT_QUEUE.receiver());
//! // feeder side: SCAN_SCRIPT_QUEUE.sender().send(ScanScript::Networks(table)).await
//! ```

use crate::rssi_sampler::{NetworkScanner, ScanError, ScanTable};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Size of the script queue feeding a simulated scanner
const SCAN_SCRIPT_QUEUE_SIZE: usize = 8;

/// One scripted outcome for a single scan call.
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ScanScript {
    /// The scan completes and sees exactly these networks.
    Networks(ScanTable),
    /// The scan fails, as a busy or wedged radio would.
    Fault,
}

/// Queue carrying scripted scan outcomes to a scanner
pub type ScanScriptQueue = Channel<CriticalSectionRawMutex, ScanScript, SCAN_SCRIPT_QUEUE_SIZE>;
/// Sender half of the script queue, held by the scenario feeder
pub type ScanScriptQueueSender =
    embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, ScanScript, SCAN_SCRIPT_QUEUE_SIZE>;
/// Receiver half of the script queue, held by the scanner
pub type ScanScriptQueueReceiver =
    embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, ScanScript, SCAN_SCRIPT_QUEUE_SIZE>;

/// Scanner that replays scripted scan results.
pub struct Scanner {
    script_queue_receiver: ScanScriptQueueReceiver,
}

impl Scanner {
    /// Creates a scanner draining the given script queue.
    pub const fn with(script_queue_receiver: ScanScriptQueueReceiver) -> Self {
        Scanner {
            script_queue_receiver,
        }
    }
}

impl NetworkScanner for Scanner {
    /// Waits for the next scripted outcome and returns it.
    async fn scan(&mut self) -> Result<ScanTable, ScanError> {
        match self.script_queue_receiver.receive().await {
            ScanScript::Networks(scan_table) => Ok(scan_table),
            ScanScript::Fault => Err(ScanError),
        }
    }
}
