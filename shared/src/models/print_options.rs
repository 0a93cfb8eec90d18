//! Print Options Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default raw TCP port for network printers
pub const DEFAULT_NETWORK_PORT: u16 = 9100;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Physical or mediated channel used to reach a printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    Network,
    Usb,
    Serial,
    SystemSpool,
    Agent,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Network => "network",
            TransportKind::Usb => "usb",
            TransportKind::Serial => "serial",
            TransportKind::SystemSpool => "system-spool",
            TransportKind::Agent => "agent",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network" => Ok(TransportKind::Network),
            "usb" => Ok(TransportKind::Usb),
            "serial" => Ok(TransportKind::Serial),
            "system-spool" | "spool" => Ok(TransportKind::SystemSpool),
            "agent" => Ok(TransportKind::Agent),
            other => Err(format!("unknown transport: {}", other)),
        }
    }
}

/// Per-request print configuration
///
/// Only the fields relevant to `transport` are read. Values are
/// validated by the dispatcher before any I/O is attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintOptions {
    pub transport: TransportKind,
    /// Network printer host
    pub address: Option<String>,
    /// Network printer port (default 9100)
    pub port: Option<u16>,
    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub serial_path: Option<String>,
    /// Serial baud rate (default 9600)
    pub baud_rate: Option<u32>,
    /// Installed printer name (spooler / agent)
    pub printer_name: Option<String>,
    /// USB vendor id
    pub vendor_id: Option<u16>,
    /// USB product id
    pub product_id: Option<u16>,
    /// Barcode payload used instead of the TED extracted from the document
    pub barcode_payload: Option<String>,
    /// Printer codepage name, e.g. "windows-1252"
    pub codepage: Option<String>,
}

impl PrintOptions {
    fn empty(transport: TransportKind) -> Self {
        Self {
            transport,
            address: None,
            port: None,
            serial_path: None,
            baud_rate: None,
            printer_name: None,
            vendor_id: None,
            product_id: None,
            barcode_payload: None,
            codepage: None,
        }
    }

    /// Raw TCP printer at `address:port`
    pub fn network(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: Some(address.into()),
            port: Some(port),
            ..Self::empty(TransportKind::Network)
        }
    }

    /// USB printer; `None` ids select the first printer-class device
    pub fn usb(vendor_id: Option<u16>, product_id: Option<u16>) -> Self {
        Self {
            vendor_id,
            product_id,
            ..Self::empty(TransportKind::Usb)
        }
    }

    pub fn serial(path: impl Into<String>, baud_rate: Option<u32>) -> Self {
        Self {
            serial_path: Some(path.into()),
            baud_rate,
            ..Self::empty(TransportKind::Serial)
        }
    }

    pub fn system_spool(printer_name: impl Into<String>) -> Self {
        Self {
            printer_name: Some(printer_name.into()),
            ..Self::empty(TransportKind::SystemSpool)
        }
    }

    /// Forward to the local print agent, optionally naming the target printer
    pub fn agent(printer_name: Option<String>) -> Self {
        Self {
            printer_name,
            ..Self::empty(TransportKind::Agent)
        }
    }

    /// Copy with a barcode payload override
    pub fn with_barcode_payload(self, payload: impl Into<String>) -> Self {
        Self {
            barcode_payload: Some(payload.into()),
            ..self
        }
    }

    /// Copy with a codepage selection
    pub fn with_codepage(self, codepage: impl Into<String>) -> Self {
        Self {
            codepage: Some(codepage.into()),
            ..self
        }
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_NETWORK_PORT)
    }

    pub fn baud_rate_or_default(&self) -> u32 {
        self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_wire_names() {
        let json = serde_json::to_string(&TransportKind::SystemSpool).unwrap();
        assert_eq!(json, "\"system-spool\"");
        let kind: TransportKind = serde_json::from_str("\"usb\"").unwrap();
        assert_eq!(kind, TransportKind::Usb);
        assert_eq!("system-spool".parse::<TransportKind>(), Ok(TransportKind::SystemSpool));
        assert!("bluetooth".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_defaults() {
        let opts = PrintOptions::serial("/dev/ttyS0", None);
        assert_eq!(opts.baud_rate_or_default(), 9600);
        let opts = PrintOptions::usb(None, None);
        assert_eq!(opts.port_or_default(), 9100);
    }

    #[test]
    fn test_with_overrides_keep_transport() {
        let opts = PrintOptions::network("192.0.2.10", 9100)
            .with_codepage("iso-8859-15")
            .with_barcode_payload("TED");
        assert_eq!(opts.transport, TransportKind::Network);
        assert_eq!(opts.address.as_deref(), Some("192.0.2.10"));
        assert_eq!(opts.codepage.as_deref(), Some("iso-8859-15"));
        assert_eq!(opts.barcode_payload.as_deref(), Some("TED"));
    }
}
