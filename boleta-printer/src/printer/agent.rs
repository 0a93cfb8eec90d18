//! Local print agent channel
//!
//! Used when this process cannot reach hardware itself. Jobs travel over
//! one persistent TCP connection as binary frames:
//!
//! ```text
//! kind: u8 | request_id: [u8; 16] | len: u32 LE | payload: [u8; len]
//! ```
//!
//! Payloads are JSON. The agent answers every request with a frame that
//! carries the same request id.

use super::{Delivery, JobProgress, JobState, Printer};
use crate::error::{PrintError, PrintResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Upper bound for a single frame payload
pub const MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Frame type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    PrintJob = 1,
    ListPrinters = 2,
    Ack = 3,
    Nack = 4,
    PrinterList = 5,
}

impl TryFrom<u8> for FrameKind {
    type Error = PrintError;

    fn try_from(value: u8) -> PrintResult<Self> {
        match value {
            1 => Ok(FrameKind::PrintJob),
            2 => Ok(FrameKind::ListPrinters),
            3 => Ok(FrameKind::Ack),
            4 => Ok(FrameKind::Nack),
            5 => Ok(FrameKind::PrinterList),
            other => Err(PrintError::Agent(format!("Unknown frame kind: {}", other))),
        }
    }
}

/// One message on the agent channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub request_id: Uuid,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(kind: FrameKind, request_id: Uuid, payload: Vec<u8>) -> Self {
        Self {
            kind,
            request_id,
            payload,
        }
    }

    /// Frame with a JSON payload
    pub fn json<T: Serialize>(kind: FrameKind, request_id: Uuid, body: &T) -> PrintResult<Self> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| PrintError::Agent(format!("Encode payload: {}", e)))?;
        Ok(Self::new(kind, request_id, payload))
    }

    /// Decode the JSON payload
    pub fn parse<T: for<'de> Deserialize<'de>>(&self) -> PrintResult<T> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| PrintError::Agent(format!("Decode {:?} payload: {}", self.kind, e)))
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> PrintResult<Self> {
        // Read frame kind (1 byte)
        let mut kind_buf = [0u8; 1];
        reader.read_exact(&mut kind_buf).await?;
        let kind = FrameKind::try_from(kind_buf[0])?;

        // Read Request ID (16 bytes)
        let mut uuid_buf = [0u8; 16];
        reader.read_exact(&mut uuid_buf).await?;
        let request_id = Uuid::from_bytes(uuid_buf);

        // Read payload length (4 bytes)
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_PAYLOAD {
            return Err(PrintError::Agent(format!(
                "Frame payload too large: {} bytes",
                len
            )));
        }

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).await?;

        Ok(Self {
            kind,
            request_id,
            payload,
        })
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> PrintResult<()> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(PrintError::Agent(format!(
                "Frame payload too large: {} bytes",
                self.payload.len()
            )));
        }
        let mut data = Vec::with_capacity(21 + self.payload.len());
        data.push(self.kind as u8);
        data.extend_from_slice(self.request_id.as_bytes());
        data.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&self.payload);
        writer.write_all(&data).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Which printer the agent should use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTarget {
    /// Printer name known to the agent; `None` means its default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer_name: Option<String>,
    /// The transport the caller originally asked for, e.g. `usb`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// `PrintJob` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPrintJob {
    pub target: AgentTarget,
    /// ESC/POS bytes, base64
    pub data: String,
}

impl AgentPrintJob {
    pub fn new(target: AgentTarget, bytes: &[u8]) -> Self {
        Self {
            target,
            data: BASE64.encode(bytes),
        }
    }

    pub fn decode_data(&self) -> PrintResult<Vec<u8>> {
        BASE64
            .decode(&self.data)
            .map_err(|e| PrintError::Agent(format!("Invalid job data: {}", e)))
    }
}

/// `Nack` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentNack {
    pub error: String,
}

/// `PrinterList` payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPrinterList {
    pub printers: Vec<String>,
}

/// Connect-once client for the print agent
///
/// The connection is opened on first use and kept. Any error drops it so
/// the next request reconnects; a failed request is not retried.
#[derive(Debug)]
pub struct AgentClient {
    addr: String,
    connect_timeout: Duration,
    conn: Mutex<Option<TcpStream>>,
}

impl AgentClient {
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            connect_timeout: Duration::from_secs(5),
            conn: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether a connection is currently held open
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    async fn connect(&self) -> PrintResult<TcpStream> {
        info!(addr = %self.addr, "Connecting to print agent");
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Agent connection timeout: {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("Agent {}: {}", self.addr, e)))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Send one request and wait for the reply with the same id
    ///
    /// `on_connected` runs once the channel is usable.
    async fn request(&self, frame: Frame, on_connected: impl FnOnce()) -> PrintResult<Frame> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        on_connected();

        let result = match guard.as_mut() {
            Some(stream) => exchange(stream, &frame).await,
            None => Err(PrintError::Connection(format!(
                "Agent {} not connected",
                self.addr
            ))),
        };
        if let Err(e) = &result {
            warn!(addr = %self.addr, error = %e, "Agent channel dropped");
            *guard = None;
        }
        result
    }

    /// Printers the agent can reach
    #[instrument(skip(self), fields(addr = %self.addr))]
    pub async fn list_printers(&self) -> PrintResult<Vec<String>> {
        let frame = Frame::new(FrameKind::ListPrinters, Uuid::new_v4(), Vec::new());
        let reply = self.request(frame, || {}).await?;
        match reply.kind {
            FrameKind::PrinterList => Ok(reply.parse::<AgentPrinterList>()?.printers),
            FrameKind::Nack => Err(PrintError::Agent(reply.parse::<AgentNack>()?.error)),
            other => Err(PrintError::Agent(format!("Unexpected reply: {:?}", other))),
        }
    }

    /// Forward a job and wait for its acknowledgement
    pub async fn submit(
        &self,
        target: &AgentTarget,
        data: &[u8],
        progress: &mut JobProgress,
    ) -> PrintResult<()> {
        let job = AgentPrintJob::new(target.clone(), data);
        let frame = Frame::json(FrameKind::PrintJob, Uuid::new_v4(), &job)?;
        let request_id = frame.request_id;

        let reply = self
            .request(frame, || {
                progress.advance(JobState::Connected);
                progress.advance(JobState::Writing);
            })
            .await?;

        match reply.kind {
            FrameKind::Ack => {
                debug!(%request_id, "Agent acknowledged job");
                Ok(())
            }
            FrameKind::Nack => Err(PrintError::Agent(reply.parse::<AgentNack>()?.error)),
            other => Err(PrintError::Agent(format!("Unexpected reply: {:?}", other))),
        }
    }
}

async fn exchange(stream: &mut TcpStream, frame: &Frame) -> PrintResult<Frame> {
    frame.write_to(stream).await?;
    let reply = Frame::read_from(stream).await?;
    if reply.request_id != frame.request_id {
        return Err(PrintError::Agent(format!(
            "Reply for {} while waiting for {}",
            reply.request_id, frame.request_id
        )));
    }
    Ok(reply)
}

/// Printer reached through the agent
#[derive(Debug, Clone)]
pub struct AgentPrinter {
    client: Arc<AgentClient>,
    target: AgentTarget,
}

impl AgentPrinter {
    pub fn new(client: Arc<AgentClient>, target: AgentTarget) -> Self {
        Self { client, target }
    }

    pub fn client(&self) -> &Arc<AgentClient> {
        &self.client
    }

    pub fn target(&self) -> &AgentTarget {
        &self.target
    }
}

impl Printer for AgentPrinter {
    #[instrument(skip(self, data, progress), fields(addr = %self.client.addr(), data_len = data.len()))]
    async fn print(&self, data: &[u8], progress: &mut JobProgress) -> PrintResult<Delivery> {
        self.client.submit(&self.target, data, progress).await?;
        progress.advance(JobState::Closed);
        info!("Print job accepted by agent");
        Ok(Delivery::new(data.len()))
    }

    async fn is_online(&self) -> bool {
        self.client.list_printers().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_frame_layout() {
        let id = Uuid::new_v4();
        let frame = Frame::new(FrameKind::Ack, id, b"{}".to_vec());
        let mut out = Vec::new();
        frame.write_to(&mut out).await.unwrap();

        assert_eq!(out[0], 3);
        assert_eq!(&out[1..17], id.as_bytes());
        assert_eq!(&out[17..21], &2u32.to_le_bytes());
        assert_eq!(&out[21..], b"{}");

        let parsed = Frame::read_from(&mut out.as_slice()).await.unwrap();
        assert_eq!(parsed, frame);
    }

    #[tokio::test]
    async fn test_rejects_oversized_and_unknown() {
        let mut bad = vec![9u8];
        bad.extend_from_slice(&[0; 20]);
        assert!(Frame::read_from(&mut bad.as_slice()).await.is_err());

        let mut huge = vec![1u8];
        huge.extend_from_slice(&[0; 16]);
        huge.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(Frame::read_from(&mut huge.as_slice()).await.is_err());
    }

    #[test]
    fn test_print_job_payload() {
        let target = AgentTarget {
            printer_name: Some("POS-80".into()),
            hint: Some("usb".into()),
        };
        let job = AgentPrintJob::new(target, b"\x1B@");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["target"]["printer_name"], "POS-80");
        assert_eq!(json["data"], "G0A=");
        assert_eq!(job.decode_data().unwrap(), b"\x1B@");
    }

    /// Agent that acks the first job, nacks the second, then lists printers
    async fn spawn_agent() -> (String, tokio::task::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut jobs = 0;
            while let Ok(frame) = Frame::read_from(&mut socket).await {
                let reply = match frame.kind {
                    FrameKind::PrintJob => {
                        jobs += 1;
                        if jobs == 1 {
                            Frame::new(FrameKind::Ack, frame.request_id, Vec::new())
                        } else {
                            let nack = AgentNack {
                                error: "paper out".into(),
                            };
                            Frame::json(FrameKind::Nack, frame.request_id, &nack).unwrap()
                        }
                    }
                    _ => {
                        let list = AgentPrinterList {
                            printers: vec!["POS-80".into()],
                        };
                        Frame::json(FrameKind::PrinterList, frame.request_id, &list).unwrap()
                    }
                };
                reply.write_to(&mut socket).await.unwrap();
            }
            jobs
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_connection_is_reused() {
        let (addr, server) = spawn_agent().await;
        let client = Arc::new(AgentClient::new(&addr));
        let printer = AgentPrinter::new(client.clone(), AgentTarget::default());

        let mut progress = JobProgress::new();
        progress.advance(JobState::Resolving);
        printer.print(b"\x1B@one", &mut progress).await.unwrap();
        assert_eq!(progress.state(), JobState::Closed);

        // Same connection: the listener only accepts once
        let mut progress = JobProgress::new();
        progress.advance(JobState::Resolving);
        let err = printer.print(b"\x1B@two", &mut progress).await.unwrap_err();
        assert!(err.to_string().contains("paper out"));
        assert!(client.is_connected().await);

        assert_eq!(client.list_printers().await.unwrap(), vec!["POS-80"]);
        drop(printer);
        drop(client);
        assert_eq!(server.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_agent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = AgentClient::new(&addr).with_timeout(Duration::from_millis(300));
        assert!(client.list_printers().await.is_err());
        assert!(!client.is_connected().await);
    }
}
