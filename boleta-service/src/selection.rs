//! Host environment detection and transport selection
//!
//! Decided once when the service starts: a process with USB access talks
//! to printers directly, a sandboxed one forwards everything to the local
//! print agent.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use boleta_printer::{
    AgentClient, AgentPrinter, AgentTarget, NetworkPrinter, PrintError, PrintResult,
    SerialPrinter, SpoolPrinter, Transport, UsbPrinter,
};
use shared::models::{DeviceId, PrintOptions, TransportKind};
use tracing::{info, warn};

/// Where the process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEnvironment {
    /// Devices are reachable from this process
    Direct,
    /// No hardware access; the print agent does the I/O
    Sandboxed,
}

/// Configured way of picking the host environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostMode {
    /// Probe the USB subsystem
    #[default]
    Auto,
    Direct,
    Sandboxed,
}

impl FromStr for HostMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(HostMode::Auto),
            "direct" => Ok(HostMode::Direct),
            "sandboxed" | "agent" => Ok(HostMode::Sandboxed),
            other => Err(format!("unknown host mode: {}", other)),
        }
    }
}

impl HostEnvironment {
    /// Resolve the configured mode, probing when it is `Auto`
    pub fn detect(mode: HostMode) -> Self {
        let env = match mode {
            HostMode::Direct => HostEnvironment::Direct,
            HostMode::Sandboxed => HostEnvironment::Sandboxed,
            HostMode::Auto if UsbPrinter::subsystem_available() => HostEnvironment::Direct,
            HostMode::Auto => HostEnvironment::Sandboxed,
        };
        info!(?mode, environment = %env, "Host environment selected");
        env
    }
}

impl fmt::Display for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEnvironment::Direct => write!(f, "direct"),
            HostEnvironment::Sandboxed => write!(f, "sandboxed"),
        }
    }
}

/// A transport ready for dispatch, plus the channel it reports as
#[derive(Debug, Clone)]
pub struct Selected {
    pub transport: Transport,
    pub channel: TransportKind,
}

/// Builds transports from per-request options
#[derive(Debug, Clone)]
pub struct TransportSelector {
    environment: HostEnvironment,
    agent: Arc<AgentClient>,
    connect_timeout: Duration,
    probe_timeout: Duration,
}

impl TransportSelector {
    pub fn new(
        environment: HostEnvironment,
        agent_addr: &str,
        connect_timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            environment,
            agent: Arc::new(AgentClient::new(agent_addr).with_timeout(connect_timeout)),
            connect_timeout,
            probe_timeout,
        }
    }

    pub fn environment(&self) -> HostEnvironment {
        self.environment
    }

    pub fn agent(&self) -> &Arc<AgentClient> {
        &self.agent
    }

    /// Channel that will actually carry a request of this kind
    pub fn channel_for(&self, kind: TransportKind) -> TransportKind {
        match self.environment {
            HostEnvironment::Direct => kind,
            HostEnvironment::Sandboxed => TransportKind::Agent,
        }
    }

    /// Validate options and build the transport, without any I/O
    pub fn select(&self, options: &PrintOptions) -> PrintResult<Selected> {
        let direct = self.direct_transport(options)?;
        let channel = self.channel_for(options.transport);

        let transport = match (self.environment, direct) {
            (HostEnvironment::Direct, Some(transport)) => transport,
            _ => Transport::Agent(AgentPrinter::new(
                self.agent.clone(),
                AgentTarget {
                    printer_name: options.printer_name.clone(),
                    hint: target_hint(options),
                },
            )),
        };

        Ok(Selected { transport, channel })
    }

    /// Transport for the requested kind; `None` for the agent
    fn direct_transport(&self, options: &PrintOptions) -> PrintResult<Option<Transport>> {
        let transport = match options.transport {
            TransportKind::Network => {
                let address = options.address.as_deref().unwrap_or_default();
                let printer = NetworkPrinter::new(address, options.port_or_default())?
                    .with_timeout(self.connect_timeout)
                    .with_probe_timeout(self.probe_timeout);
                Transport::Network(printer)
            }
            TransportKind::Usb => {
                let printer = match (options.vendor_id, options.product_id) {
                    (Some(vid), Some(pid)) => UsbPrinter::new(vid, pid),
                    (None, None) => UsbPrinter::first_available(),
                    _ => {
                        return Err(PrintError::InvalidConfig(
                            "USB printing needs both vendor and product id, or neither"
                                .to_string(),
                        ));
                    }
                };
                Transport::Usb(printer)
            }
            TransportKind::Serial => {
                let path = options.serial_path.as_deref().unwrap_or_default();
                Transport::Serial(SerialPrinter::new(path, options.baud_rate_or_default())?)
            }
            TransportKind::SystemSpool => {
                let name = options.printer_name.as_deref().unwrap_or_default();
                Transport::Spool(SpoolPrinter::new(name)?)
            }
            TransportKind::Agent => return Ok(None),
        };
        Ok(Some(transport))
    }

    /// Probe a network printer
    pub async fn probe(&self, host: &str, port: u16) -> bool {
        use boleta_printer::Printer;

        match NetworkPrinter::new(host, port) {
            Ok(printer) => {
                printer
                    .with_probe_timeout(self.probe_timeout)
                    .is_online()
                    .await
            }
            Err(e) => {
                warn!(error = %e, "Probe skipped");
                false
            }
        }
    }

    /// Enumerate reachable printers; failures yield an empty list
    pub async fn list_devices(&self) -> Vec<DeviceId> {
        match self.environment {
            HostEnvironment::Direct => list_direct().await,
            HostEnvironment::Sandboxed => match self.agent.list_printers().await {
                Ok(names) => names
                    .into_iter()
                    .map(|name| DeviceId::Printer { name })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "Agent enumeration failed");
                    Vec::new()
                }
            },
        }
    }
}

async fn list_direct() -> Vec<DeviceId> {
    let mut devices = Vec::new();

    let hardware = tokio::task::spawn_blocking(|| (UsbPrinter::list(), SerialPrinter::list()))
        .await;
    match hardware {
        Ok((usb, serial)) => {
            match usb {
                Ok(found) => devices.extend(found.into_iter().map(|d| DeviceId::Usb {
                    vendor_id: d.vendor_id,
                    product_id: d.product_id,
                })),
                Err(e) => warn!(error = %e, "USB enumeration failed"),
            }
            match serial {
                Ok(paths) => devices.extend(paths.into_iter().map(|path| DeviceId::Serial { path })),
                Err(e) => warn!(error = %e, "Serial enumeration failed"),
            }
        }
        Err(e) => warn!(error = %e, "Enumeration task failed"),
    }

    match SpoolPrinter::list().await {
        Ok(names) => devices.extend(names.into_iter().map(|name| DeviceId::Printer { name })),
        Err(e) => warn!(error = %e, "Spooler enumeration failed"),
    }

    devices
}

/// Describe the requested device for the agent
fn target_hint(options: &PrintOptions) -> Option<String> {
    let hint = match options.transport {
        TransportKind::Network => format!(
            "network:{}:{}",
            options.address.as_deref().unwrap_or_default(),
            options.port_or_default()
        ),
        TransportKind::Usb => match (options.vendor_id, options.product_id) {
            (Some(v), Some(p)) => format!("usb:{:04x}:{:04x}", v, p),
            _ => "usb".to_string(),
        },
        TransportKind::Serial => format!(
            "serial:{}:{}",
            options.serial_path.as_deref().unwrap_or_default(),
            options.baud_rate_or_default()
        ),
        TransportKind::SystemSpool => "system-spool".to_string(),
        TransportKind::Agent => return None,
    };
    Some(hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(environment: HostEnvironment) -> TransportSelector {
        TransportSelector::new(
            environment,
            "127.0.0.1:9101",
            Duration::from_secs(1),
            Duration::from_millis(800),
        )
    }

    #[test]
    fn test_host_mode_parse() {
        assert_eq!("direct".parse::<HostMode>(), Ok(HostMode::Direct));
        assert_eq!("SANDBOXED".parse::<HostMode>(), Ok(HostMode::Sandboxed));
        assert!("cloud".parse::<HostMode>().is_err());
        assert_eq!(HostEnvironment::detect(HostMode::Direct), HostEnvironment::Direct);
    }

    #[test]
    fn test_direct_maps_one_to_one() {
        let s = selector(HostEnvironment::Direct);
        let selected = s.select(&PrintOptions::network("192.0.2.10", 9100)).unwrap();
        assert!(matches!(selected.transport, Transport::Network(_)));
        assert_eq!(selected.channel, TransportKind::Network);

        let selected = s.select(&PrintOptions::usb(Some(0x04b8), Some(0x0202))).unwrap();
        assert_eq!(selected.transport.device_key(), "usb:04b8:0202");

        let selected = s.select(&PrintOptions::agent(Some("POS".into()))).unwrap();
        assert!(matches!(selected.transport, Transport::Agent(_)));
        assert_eq!(selected.channel, TransportKind::Agent);
    }

    #[test]
    fn test_sandboxed_routes_to_agent_with_hint() {
        let s = selector(HostEnvironment::Sandboxed);
        let selected = s.select(&PrintOptions::usb(Some(0x04b8), Some(0x0202))).unwrap();
        assert_eq!(selected.channel, TransportKind::Agent);
        match selected.transport {
            Transport::Agent(p) => assert_eq!(p.target().hint.as_deref(), Some("usb:04b8:0202")),
            other => panic!("expected agent, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_options_are_config_errors() {
        for env in [HostEnvironment::Direct, HostEnvironment::Sandboxed] {
            let s = selector(env);
            let mut opts = PrintOptions::network("", 9100);
            assert!(s.select(&opts).unwrap_err().is_config());
            opts = PrintOptions::system_spool(" ");
            assert!(s.select(&opts).unwrap_err().is_config());
            opts = PrintOptions::serial("", None);
            assert!(s.select(&opts).unwrap_err().is_config());
            opts = PrintOptions::usb(Some(1), None);
            assert!(s.select(&opts).unwrap_err().is_config());
        }
    }

    #[tokio::test]
    async fn test_sandboxed_enumeration_without_agent_is_empty() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let s = TransportSelector::new(
            HostEnvironment::Sandboxed,
            &addr,
            Duration::from_millis(300),
            Duration::from_millis(300),
        );
        assert!(s.list_devices().await.is_empty());
    }
}
