//! Network printer (raw TCP, port 9100)

use super::{Delivery, JobProgress, JobState, Printer};
use crate::error::{PrintError, PrintResult};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

/// Liveness probe window
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(800);

/// Network printer (TCP port 9100)
///
/// Most thermal printers support raw TCP printing on port 9100.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    host: String,
    port: u16,
    connect_timeout: Duration,
    probe_timeout: Duration,
}

impl NetworkPrinter {
    /// Create a new network printer
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(PrintError::InvalidConfig(
                "Network printer needs an address".to_string(),
            ));
        }
        if port == 0 {
            return Err(PrintError::InvalidConfig(format!(
                "Invalid port for {}: 0",
                host
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            connect_timeout: Duration::from_secs(5),
            probe_timeout: PROBE_TIMEOUT,
        })
    }

    /// Create from an address string (e.g., "192.168.1.100:9100")
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| PrintError::InvalidConfig(format!("Invalid address: {}", addr)))?;
        let port = port
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr)))?;
        Self::new(host, port)
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set liveness probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn connect(&self, timeout: Duration) -> PrintResult<TcpStream> {
        tokio::time::timeout(timeout, TcpStream::connect((self.host.as_str(), self.port)))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.target())))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.target(), e)))
    }
}

impl Printer for NetworkPrinter {
    #[instrument(skip(self, data, progress), fields(addr = %self.target(), data_len = data.len()))]
    async fn print(&self, data: &[u8], progress: &mut JobProgress) -> PrintResult<Delivery> {
        info!("Connecting to printer");

        let mut stream = self.connect(self.connect_timeout).await?;
        progress.advance(JobState::Connected);

        info!("Connected, sending {} bytes", data.len());
        progress.advance(JobState::Writing);

        stream.write_all(data).await.map_err(|e| {
            PrintError::Io(std::io::Error::new(
                e.kind(),
                format!("Write failed: {}", e),
            ))
        })?;
        stream.flush().await?;

        if let Err(e) = stream.shutdown().await {
            warn!(error = %e, "Socket shutdown failed after write");
        }
        progress.advance(JobState::Closed);

        info!("Print job sent successfully");
        Ok(Delivery::new(data.len()))
    }

    #[instrument(skip(self), fields(addr = %self.target()))]
    async fn is_online(&self) -> bool {
        match self.connect(self.probe_timeout).await {
            Ok(_) => {
                info!("Printer online");
                true
            }
            Err(PrintError::Timeout(_)) => {
                warn!("Printer check timeout");
                false
            }
            Err(e) => {
                warn!(error = %e, "Printer offline");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_network_printer_new() {
        let printer = NetworkPrinter::new("192.168.1.100", 9100).unwrap();
        assert_eq!(printer.port(), 9100);
        assert_eq!(printer.host(), "192.168.1.100");
    }

    #[test]
    fn test_network_printer_from_addr() {
        let printer = NetworkPrinter::from_addr("printer.local:9100").unwrap();
        assert_eq!(printer.port(), 9100);
        assert_eq!(printer.host(), "printer.local");
    }

    #[test]
    fn test_invalid_addr() {
        assert!(NetworkPrinter::from_addr("invalid").is_err());
        assert!(NetworkPrinter::new("", 9100).unwrap_err().is_config());
        assert!(NetworkPrinter::new("10.0.0.1", 0).unwrap_err().is_config());
    }

    #[tokio::test]
    async fn test_print_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let printer = NetworkPrinter::new("127.0.0.1", port).unwrap();
        let mut progress = JobProgress::new();
        progress.advance(JobState::Resolving);
        let delivery = printer.print(b"\x1B@hello", &mut progress).await.unwrap();

        assert_eq!(delivery.bytes, 7);
        assert_eq!(progress.state(), JobState::Closed);
        assert_eq!(server.await.unwrap(), b"\x1B@hello".to_vec());
    }

    #[tokio::test]
    async fn test_probe_closed_port_is_offline() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let printer = NetworkPrinter::new("127.0.0.1", port).unwrap();
        assert!(!printer.is_online().await);
    }
}
