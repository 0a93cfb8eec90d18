//! Electronic receipt (boleta) renderer
//!
//! Renders a SaleRecord into an ESC/POS command buffer for thermal printers.

use std::sync::Arc;

use boleta_printer::{
    Codepage, CommandBuffer, EscPosBuilder, PaperProfile, PrintResult, RasterBlock,
};
use shared::models::{PrintOptions, SaleRecord};

use crate::format::{format_date, format_money, split_tax};

/// Printed when no PDF417 stamp could be produced
pub const NO_STAMP_PLACEHOLDER: &str = "SIN TIMBRE ELECTRONICO";

/// Layout settings for the receipt
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub profile: PaperProfile,
    /// Used when the request does not select a codepage
    pub codepage: Codepage,
    /// Document name in the header line
    pub document_label: String,
    /// Print net amount and IVA above the total
    pub tax_breakdown: bool,
    /// Legal lines under the stamp
    pub footer: Vec<String>,
    /// Blank lines fed before the cut
    pub feed_lines: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            profile: PaperProfile::default(),
            codepage: Codepage::default(),
            document_label: "BOLETA ELECTRONICA".to_string(),
            tax_breakdown: false,
            footer: vec![
                "Timbre Electrónico SII".to_string(),
                "Verifique documento: www.sii.cl".to_string(),
            ],
            feed_lines: 4,
        }
    }
}

/// Receipt renderer
pub struct TicketRenderer {
    config: RenderConfig,
}

impl TicketRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Codepage for a request; an unknown name is a configuration error
    pub fn codepage_for(&self, options: &PrintOptions) -> PrintResult<Codepage> {
        match options.codepage.as_deref() {
            Some(name) => name.parse(),
            None => Ok(self.config.codepage),
        }
    }

    /// Compile a sale into printer primitives
    ///
    /// `logo` and `barcode` are optional; a missing barcode prints a
    /// placeholder line instead.
    pub fn compile_ticket(
        &self,
        sale: &SaleRecord,
        options: &PrintOptions,
        logo: Option<Arc<RasterBlock>>,
        barcode: Option<Arc<RasterBlock>>,
    ) -> PrintResult<CommandBuffer> {
        let codepage = self.codepage_for(options)?;
        let mut b = EscPosBuilder::new(self.config.profile, codepage);

        self.render_header(&mut b, sale, logo);
        self.render_items(&mut b, sale);
        self.render_total(&mut b, sale);
        self.render_footer(&mut b, barcode);

        Ok(b.into_buffer())
    }

    fn render_header(
        &self,
        b: &mut EscPosBuilder,
        sale: &SaleRecord,
        logo: Option<Arc<RasterBlock>>,
    ) {
        b.center();
        if let Some(logo) = logo {
            b.raster(logo);
        }

        let company = &sale.company;
        b.bold();
        b.line(&company.legal_name);
        if !company.tax_id.is_empty() {
            b.line(&format!("RUT: {}", company.tax_id));
        }
        if !company.address.is_empty() {
            b.line(&company.address);
        }
        b.bold_off();

        b.left();
        let title = format!("{} N° {}", self.config.document_label, sale.receipt_id);
        let date = format_date(&sale.issued_at);
        let budget = b.budget();
        let fits = budget.width(&title) + 1 + budget.width(&date) <= b.width();
        if fits {
            b.line_lr(&title, &date);
        } else {
            // The receipt number is never truncated: title and date get their own lines
            b.line(&title);
            b.line_lr("", &date);
        }
        b.sep_single();
    }

    fn render_items(&self, b: &mut EscPosBuilder, sale: &SaleRecord) {
        for item in &sale.items {
            b.line(&format!("{} x {}", item.quantity, format_money(item.unit_price)));
            b.line_lr(&item.description, &format_money(item.subtotal));
        }
        b.sep_single();
    }

    fn render_total(&self, b: &mut EscPosBuilder, sale: &SaleRecord) {
        if self.config.tax_breakdown {
            let split = split_tax(sale.total);
            b.line_lr("NETO", &format_money(split.net));
            b.line_lr("IVA 19%", &format_money(split.tax));
        }

        b.right();
        b.bold();
        b.double_height();
        b.line(&format!("TOTAL {}", format_money(sale.total)));
        b.reset_size();
        b.bold_off();
    }

    fn render_footer(&self, b: &mut EscPosBuilder, barcode: Option<Arc<RasterBlock>>) {
        b.center();
        match barcode {
            Some(symbol) => {
                b.raster(symbol);
            }
            None => {
                b.line(NO_STAMP_PLACEHOLDER);
            }
        }
        for line in &self.config.footer {
            b.line(line);
        }
        b.left();
        b.feed(self.config.feed_lines);
        b.cut();
    }
}

impl Default for TicketRenderer {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}
