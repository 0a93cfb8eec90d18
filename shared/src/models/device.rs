//! Device Enumeration Model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized printer identifier returned by device enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceId {
    /// Hardware channel: USB printer-class device
    Usb { vendor_id: u16, product_id: u16 },
    /// Hardware channel: serial port
    Serial { path: String },
    /// Spooler or agent printer name
    Printer { name: String },
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Usb {
                vendor_id,
                product_id,
            } => write!(f, "usb:{:04x}:{:04x}", vendor_id, product_id),
            DeviceId::Serial { path } => write!(f, "serial:{}", path),
            DeviceId::Printer { name } => write!(f, "printer:{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let id = DeviceId::Usb {
            vendor_id: 0x04b8,
            product_id: 0x0202,
        };
        assert_eq!(id.to_string(), "usb:04b8:0202");
    }

    #[test]
    fn test_tagged_json() {
        let id = DeviceId::Printer {
            name: "TM-T20".into(),
        };
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"kind":"printer","name":"TM-T20"}"#);
    }
}
