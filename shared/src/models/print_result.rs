//! Transport Result Model

use super::print_options::TransportKind;
use serde::{Deserialize, Serialize};

/// Outcome of one dispatch attempt
///
/// `success` is true only when the bytes reached a device. Degraded but
/// successful tickets (logo or barcode omitted) report `success = true`
/// with the reason listed in `warnings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportResult {
    pub success: bool,
    pub channel_used: TransportKind,
    pub error_detail: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl TransportResult {
    pub fn ok(channel_used: TransportKind) -> Self {
        Self {
            success: true,
            channel_used,
            error_detail: None,
            warnings: Vec::new(),
        }
    }

    pub fn failed(channel_used: TransportKind, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            channel_used,
            error_detail: Some(detail.into()),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// Succeeded with at least one omitted part
    pub fn is_degraded(&self) -> bool {
        self.success && !self.warnings.is_empty()
    }
}
