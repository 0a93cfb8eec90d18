//! Serial printers

use super::{Delivery, JobProgress, JobState, Printer, join_error};
use crate::error::{PrintError, PrintResult};
use std::io::Write;
use std::time::Duration;
use tracing::{info, instrument};

/// Default line speed for thermal printers
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial printer on a device path (`/dev/ttyUSB0`, `COM3`)
#[derive(Debug, Clone)]
pub struct SerialPrinter {
    path: String,
    baud_rate: u32,
}

impl SerialPrinter {
    pub fn new(path: &str, baud_rate: u32) -> PrintResult<Self> {
        let path = path.trim();
        if path.is_empty() {
            return Err(PrintError::InvalidConfig(
                "Serial printer needs a device path".to_string(),
            ));
        }
        if baud_rate == 0 {
            return Err(PrintError::InvalidConfig(format!(
                "Invalid baud rate for {}: 0",
                path
            )));
        }
        Ok(Self {
            path: path.to_string(),
            baud_rate,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Names of the serial ports present on this host
    pub fn list() -> PrintResult<Vec<String>> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect())
    }

    fn open_blocking(&self) -> PrintResult<Box<dyn serialport::SerialPort>> {
        // Port timeout only bounds individual reads; writes block until done
        serialport::new(&self.path, self.baud_rate)
            .timeout(Duration::from_secs(60))
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PrintError::DeviceNotFound(self.path.clone()),
                _ => PrintError::Serial(e),
            })
    }
}

impl Printer for SerialPrinter {
    #[instrument(skip(self, data, progress), fields(path = %self.path, baud = self.baud_rate, data_len = data.len()))]
    async fn print(&self, data: &[u8], progress: &mut JobProgress) -> PrintResult<Delivery> {
        let printer = self.clone();
        let mut port = tokio::task::spawn_blocking(move || printer.open_blocking())
            .await
            .map_err(join_error)??;
        progress.advance(JobState::Connected);

        progress.advance(JobState::Writing);
        let payload = data.to_vec();
        tokio::task::spawn_blocking(move || {
            port.write_all(&payload)?;
            port.flush()
        })
        .await
        .map_err(join_error)??;

        progress.advance(JobState::Closed);
        info!("Serial print job sent");
        Ok(Delivery::new(data.len()))
    }

    async fn is_online(&self) -> bool {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            serialport::available_ports()
                .map(|ports| ports.iter().any(|p| p.port_name == path))
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}
