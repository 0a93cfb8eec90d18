//! Service configuration

use std::str::FromStr;
use std::time::Duration;

use boleta_printer::{Codepage, PaperProfile};
use tracing::warn;

use crate::renderer::RenderConfig;
use crate::selection::HostMode;

/// Service configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | BOLETA_PAPER | 80mm | Paper profile: 58mm, 76mm, 80mm |
/// | BOLETA_CODEPAGE | windows-1252 | Printer codepage |
/// | BOLETA_HOST_MODE | auto | direct, sandboxed or auto (probe USB) |
/// | BOLETA_AGENT_ADDR | 127.0.0.1:9101 | Print agent address |
/// | BOLETA_CONNECT_TIMEOUT_MS | 5000 | Connection timeout |
/// | BOLETA_PROBE_TIMEOUT_MS | 800 | Liveness probe timeout |
/// | BOLETA_LOGO_WIDTH | 380 | Logo width in dots |
/// | BOLETA_DOCUMENT_LABEL | BOLETA ELECTRONICA | Header document name |
/// | BOLETA_TAX_BREAKDOWN | false | Print net/IVA above the total |
/// | BOLETA_FEED_LINES | 4 | Lines fed before the cut |
///
/// # Example
///
/// ```ignore
/// BOLETA_PAPER=58mm BOLETA_HOST_MODE=direct boleta devices
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub paper: PaperProfile,
    pub codepage: Codepage,
    pub host_mode: HostMode,
    pub agent_addr: String,
    pub connect_timeout: Duration,
    pub probe_timeout: Duration,
    pub logo_width: u32,
    pub document_label: String,
    pub tax_breakdown: bool,
    pub feed_lines: u8,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            paper: PaperProfile::default(),
            codepage: Codepage::default(),
            host_mode: HostMode::Auto,
            agent_addr: "127.0.0.1:9101".into(),
            connect_timeout: Duration::from_millis(5000),
            probe_timeout: Duration::from_millis(800),
            logo_width: boleta_printer::raster::LOGO_TARGET_WIDTH,
            document_label: "BOLETA ELECTRONICA".into(),
            tax_breakdown: false,
            feed_lines: 4,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables use the defaults; unparsable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            paper: env_parse("BOLETA_PAPER").unwrap_or(defaults.paper),
            codepage: env_parse("BOLETA_CODEPAGE").unwrap_or(defaults.codepage),
            host_mode: env_parse("BOLETA_HOST_MODE").unwrap_or(defaults.host_mode),
            agent_addr: std::env::var("BOLETA_AGENT_ADDR").unwrap_or(defaults.agent_addr),
            connect_timeout: env_parse("BOLETA_CONNECT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            probe_timeout: env_parse("BOLETA_PROBE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.probe_timeout),
            logo_width: env_parse("BOLETA_LOGO_WIDTH").unwrap_or(defaults.logo_width),
            document_label: std::env::var("BOLETA_DOCUMENT_LABEL")
                .unwrap_or(defaults.document_label),
            tax_breakdown: env_parse("BOLETA_TAX_BREAKDOWN").unwrap_or(defaults.tax_breakdown),
            feed_lines: env_parse("BOLETA_FEED_LINES").unwrap_or(defaults.feed_lines),
        }
    }

    /// Receipt layout derived from this configuration
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            profile: self.paper,
            codepage: self.codepage,
            document_label: self.document_label.clone(),
            tax_breakdown: self.tax_breakdown,
            feed_lines: self.feed_lines,
            ..RenderConfig::default()
        }
    }
}

fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Ignoring invalid config value");
            None
        }
    }
}
