//! Printer adapters for sending ESC/POS data
//!
//! Supports:
//! - Network printers (TCP port 9100)
//! - USB printer-class devices (libusb)
//! - Serial printers
//! - OS print spooler (Win32 raw jobs, CUPS `lp -o raw`)
//! - Local print agent over a framed TCP channel

pub mod agent;
mod network;
mod serial;
mod spool;
mod usb;

pub use agent::{AgentClient, AgentPrinter, AgentTarget};
pub use network::NetworkPrinter;
pub use serial::SerialPrinter;
pub use spool::SpoolPrinter;
pub use usb::{UsbDeviceInfo, UsbPrinter};

use crate::error::{PrintError, PrintResult};
use std::fmt;
use tracing::{debug, warn};

/// Dispatch state of a single print job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Resolving,
    Connected,
    Writing,
    Closed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Closed | JobState::Failed)
    }

    fn can_advance_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (s, Failed) => !s.is_terminal(),
            (Idle, Resolving) | (Resolving, Connected) | (Connected, Writing) | (Writing, Closed) => {
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Records the state transitions of one job
///
/// `Idle -> Resolving -> Connected -> Writing -> Closed`, with `Failed`
/// reachable from every non-terminal state.
#[derive(Debug, Clone)]
pub struct JobProgress {
    history: Vec<JobState>,
}

impl JobProgress {
    pub fn new() -> Self {
        Self {
            history: vec![JobState::Idle],
        }
    }

    pub fn state(&self) -> JobState {
        self.history.last().copied().unwrap_or(JobState::Idle)
    }

    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    /// Move to `next`; invalid transitions are ignored and reported
    pub fn advance(&mut self, next: JobState) -> bool {
        let current = self.state();
        if !current.can_advance_to(next) {
            warn!(from = %current, to = %next, "invalid job transition ignored");
            return false;
        }
        debug!(from = %current, to = %next, "job transition");
        self.history.push(next);
        true
    }

    pub fn fail(&mut self) -> bool {
        self.advance(JobState::Failed)
    }
}

impl Default for JobProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// What a transport reports after a successful write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Bytes handed to the device
    pub bytes: usize,
    /// Non-fatal problems, e.g. a device handle that failed to release
    pub warnings: Vec<String>,
}

impl Delivery {
    pub fn new(bytes: usize) -> Self {
        Self {
            bytes,
            warnings: Vec::new(),
        }
    }
}

/// Trait for printer adapters
#[allow(async_fn_in_trait)]
pub trait Printer {
    /// Send raw ESC/POS data to the printer
    ///
    /// Implementations advance `progress` through `Connected`, `Writing`
    /// and `Closed`; the caller marks `Failed` on error.
    async fn print(&self, data: &[u8], progress: &mut JobProgress) -> PrintResult<Delivery>;

    /// Check if the printer is online/reachable
    async fn is_online(&self) -> bool;
}

/// Any of the supported output channels
#[derive(Debug, Clone)]
pub enum Transport {
    Network(NetworkPrinter),
    Usb(UsbPrinter),
    Serial(SerialPrinter),
    Spool(SpoolPrinter),
    Agent(AgentPrinter),
}

impl Transport {
    /// Identity used to serialize access to one physical device
    pub fn device_key(&self) -> String {
        match self {
            Transport::Network(p) => format!("network:{}:{}", p.host(), p.port()),
            Transport::Usb(p) => p.device_key(),
            Transport::Serial(p) => format!("serial:{}", p.path()),
            Transport::Spool(p) => format!("spool:{}", p.name()),
            Transport::Agent(p) => format!("agent:{}", p.client().addr()),
        }
    }

    /// Pin the transport to one concrete device
    ///
    /// Only USB needs this: "first printer found" becomes a vendor/product
    /// pair so it locks under the same key as an explicit request.
    pub async fn resolve(self) -> PrintResult<Self> {
        match self {
            Transport::Usb(p) => {
                let resolved = tokio::task::spawn_blocking(move || p.resolve())
                    .await
                    .map_err(join_error)??;
                Ok(Transport::Usb(resolved))
            }
            other => Ok(other),
        }
    }
}

impl Printer for Transport {
    async fn print(&self, data: &[u8], progress: &mut JobProgress) -> PrintResult<Delivery> {
        match self {
            Transport::Network(p) => p.print(data, progress).await,
            Transport::Usb(p) => p.print(data, progress).await,
            Transport::Serial(p) => p.print(data, progress).await,
            Transport::Spool(p) => p.print(data, progress).await,
            Transport::Agent(p) => p.print(data, progress).await,
        }
    }

    async fn is_online(&self) -> bool {
        match self {
            Transport::Network(p) => p.is_online().await,
            Transport::Usb(p) => p.is_online().await,
            Transport::Serial(p) => p.is_online().await,
            Transport::Spool(p) => p.is_online().await,
            Transport::Agent(p) => p.is_online().await,
        }
    }
}

/// Map a failed blocking task to an IO error
pub(crate) fn join_error(e: tokio::task::JoinError) -> PrintError {
    PrintError::Io(std::io::Error::other(format!("Task join failed: {}", e)))
}
