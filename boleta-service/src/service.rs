//! Print service facade
//!
//! The one entry point callers use: compile a sale into a ticket, pick a
//! transport and deliver it.

use std::sync::Arc;

use boleta_printer::{PrintData, PrintError, PrintResult, RasterBlock, to_device_raster_gray};
use shared::models::{DeviceId, PrintOptions, SaleRecord, TransportResult};
use tracing::{info, instrument, warn};

use crate::config::ServiceConfig;
use crate::dispatcher::Dispatcher;
use crate::logo::LogoCache;
use crate::renderer::TicketRenderer;
use crate::selection::{HostEnvironment, TransportSelector};
use crate::ted::{Pdf417Generator, SymbolGenerator, extract_ted};

/// A compiled ticket and what was left out of it
#[derive(Debug, Clone)]
pub struct CompiledTicket {
    pub data: PrintData,
    /// Degradations such as a missing logo or stamp
    pub warnings: Vec<String>,
}

/// Receipt printing service
pub struct PrintService {
    renderer: TicketRenderer,
    symbols: Arc<dyn SymbolGenerator>,
    logos: LogoCache,
    selector: TransportSelector,
    dispatcher: Dispatcher,
}

impl PrintService {
    /// Build the service, detecting the host environment once
    pub fn new(config: &ServiceConfig) -> Self {
        let environment = HostEnvironment::detect(config.host_mode);
        Self::with_environment(config, environment)
    }

    pub fn with_environment(config: &ServiceConfig, environment: HostEnvironment) -> Self {
        Self {
            renderer: TicketRenderer::new(config.render_config()),
            symbols: Arc::new(Pdf417Generator::default()),
            logos: LogoCache::new(config.logo_width),
            selector: TransportSelector::new(
                environment,
                &config.agent_addr,
                config.connect_timeout,
                config.probe_timeout,
            ),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Replace the 2D symbol generator
    pub fn with_symbol_generator(mut self, symbols: Arc<dyn SymbolGenerator>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn environment(&self) -> HostEnvironment {
        self.selector.environment()
    }

    pub fn logos(&self) -> &LogoCache {
        &self.logos
    }

    /// Print a sale; never fails, problems are reported in the result
    #[instrument(skip(self, sale, options), fields(receipt = %sale.receipt_id, transport = %options.transport))]
    pub async fn print(&self, sale: &SaleRecord, options: &PrintOptions) -> TransportResult {
        let channel = self.selector.channel_for(options.transport);

        let selected = match self.selector.select(options) {
            Ok(selected) => selected,
            Err(e) => {
                warn!(error = %e, "Rejected print options");
                return TransportResult::failed(channel, e.to_string());
            }
        };

        let ticket = match self.compile(sale, options).await {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(error = %e, "Ticket compilation failed");
                return TransportResult::failed(channel, e.to_string());
            }
        };

        let result = self
            .dispatcher
            .dispatch(selected.transport, selected.channel, &ticket.data)
            .await;
        if result.success {
            info!(warnings = ticket.warnings.len(), "Ticket printed");
        }
        result.with_warnings(ticket.warnings)
    }

    /// Compile a sale into finalized ESC/POS bytes
    ///
    /// A missing logo or stamp degrades the ticket and is listed in
    /// `warnings`; only configuration problems fail.
    pub async fn compile(
        &self,
        sale: &SaleRecord,
        options: &PrintOptions,
    ) -> PrintResult<CompiledTicket> {
        // Reject a bad codepage before doing any image work
        self.renderer.codepage_for(options)?;

        let mut warnings = Vec::new();
        let logo = self.resolve_logo(sale, &mut warnings).await;
        let barcode = self.resolve_barcode(sale, options, &mut warnings).await;

        let buffer = self.renderer.compile_ticket(sale, options, logo, barcode)?;
        Ok(CompiledTicket {
            data: buffer.finalize(),
            warnings,
        })
    }

    async fn resolve_logo(
        &self,
        sale: &SaleRecord,
        warnings: &mut Vec<String>,
    ) -> Option<Arc<RasterBlock>> {
        let company_id = &sale.company.id;
        if let Some(cached) = self.logos.get(company_id).await {
            return self.fits_paper(cached, "logo", warnings);
        }
        if !sale.has_logo() {
            return None;
        }
        let source = sale.company.logo.as_deref().unwrap_or_default();
        match self.logos.refresh(company_id, source).await {
            Ok(raster) => self.fits_paper(raster, "logo", warnings),
            Err(e) => {
                warn!(error = %e, "Logo omitted");
                warnings.push(format!("logo omitted: {}", e));
                None
            }
        }
    }

    async fn resolve_barcode(
        &self,
        sale: &SaleRecord,
        options: &PrintOptions,
        warnings: &mut Vec<String>,
    ) -> Option<Arc<RasterBlock>> {
        let payload = match options.barcode_payload.as_deref() {
            Some(payload) => payload.to_string(),
            None => match sale.document.as_deref().and_then(extract_ted) {
                Some(ted) => ted.to_string(),
                None => {
                    warnings.push("barcode omitted: no TED element in document".to_string());
                    return None;
                }
            },
        };

        let symbols = self.symbols.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            let img = symbols
                .render(&payload)
                .map_err(|e| PrintError::Encoding(e.to_string()))?;
            to_device_raster_gray(&img)
        })
        .await;

        match rendered {
            Ok(Ok(raster)) => self.fits_paper(Arc::new(raster), "barcode", warnings),
            Ok(Err(e)) => {
                warn!(error = %e, "Barcode omitted");
                warnings.push(format!("barcode omitted: {}", e));
                None
            }
            Err(e) => {
                warnings.push(format!("barcode omitted: {}", e));
                None
            }
        }
    }

    /// Drop rasters wider than the paper
    fn fits_paper(
        &self,
        raster: Arc<RasterBlock>,
        what: &str,
        warnings: &mut Vec<String>,
    ) -> Option<Arc<RasterBlock>> {
        let max = self.renderer.config().profile.printable_dots() as u32;
        if raster.width() > max {
            warnings.push(format!(
                "{} omitted: {} dots wide, paper holds {}",
                what,
                raster.width(),
                max
            ));
            return None;
        }
        Some(raster)
    }

    /// Printers reachable in this environment; empty on failure
    pub async fn list_devices(&self) -> Vec<DeviceId> {
        self.selector.list_devices().await
    }

    /// Whether a network printer answers within the probe window
    pub async fn probe(&self, host: &str, port: u16) -> bool {
        self.selector.probe(host, port).await
    }

    /// Reconvert a company logo and replace the cached copy
    pub async fn refresh_logo(&self, company_id: &str, source: &str) -> bool {
        match self.logos.refresh(company_id, source).await {
            Ok(_) => true,
            Err(e) => {
                warn!(company_id, error = %e, "Logo refresh failed");
                false
            }
        }
    }
}
