//! Print job dispatcher
//!
//! Sends finalized ESC/POS data through a transport, one job per device
//! at a time, and reports the outcome as a [`TransportResult`].

use std::sync::Arc;

use boleta_printer::{JobProgress, JobState, PrintData, Printer, PrintResult, Transport};
use dashmap::DashMap;
use shared::models::{TransportKind, TransportResult};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Serializes writes per physical device
#[derive(Debug, Default)]
pub struct Dispatcher {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Deliver `data`; never fails, errors become `success: false`
    #[instrument(skip(self, transport, data), fields(channel = %channel, data_len = data.len()))]
    pub async fn dispatch(
        &self,
        transport: Transport,
        channel: TransportKind,
        data: &PrintData,
    ) -> TransportResult {
        let mut progress = JobProgress::new();
        let outcome = self.run(transport, data, &mut progress).await;
        debug!(history = ?progress.history(), "Job finished");

        match outcome {
            Ok(warnings) => TransportResult::ok(channel).with_warnings(warnings),
            Err(e) => {
                progress.fail();
                error!(error = %e, "Print job failed");
                TransportResult::failed(channel, e.to_string())
            }
        }
    }

    async fn run(
        &self,
        transport: Transport,
        data: &PrintData,
        progress: &mut JobProgress,
    ) -> PrintResult<Vec<String>> {
        progress.advance(JobState::Resolving);
        let transport = transport.resolve().await?;
        let key = transport.device_key();

        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;
        info!(device = %key, "Device acquired");

        let delivery = transport.print(data.as_bytes(), progress).await?;
        Ok(delivery.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boleta_printer::NetworkPrinter;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_unreachable_reports_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let printer = NetworkPrinter::new("127.0.0.1", port)
            .unwrap()
            .with_timeout(Duration::from_millis(300));
        let result = Dispatcher::new()
            .dispatch(
                Transport::Network(printer),
                TransportKind::Network,
                &PrintData::from(b"\x1B@".to_vec()),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.channel_used, TransportKind::Network);
        assert!(!result.error_detail.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_same_device_jobs_do_not_interleave() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let mut jobs = Vec::new();
            for _ in 0..2 {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut received = Vec::new();
                socket.read_to_end(&mut received).await.unwrap();
                jobs.push(received);
            }
            jobs
        });

        let dispatcher = Arc::new(Dispatcher::new());
        let mut handles = Vec::new();
        for fill in [b'a', b'b'] {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                let printer = NetworkPrinter::new("127.0.0.1", port).unwrap();
                let data = PrintData::from(vec![fill; 64 * 1024]);
                dispatcher
                    .dispatch(Transport::Network(printer), TransportKind::Network, &data)
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().success);
        }

        let jobs = server.await.unwrap();
        for job in jobs {
            assert_eq!(job.len(), 64 * 1024);
            assert!(job.iter().all(|b| *b == job[0]));
        }
        assert_eq!(dispatcher.locks.len(), 1);
    }
}
