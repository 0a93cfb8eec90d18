//! Electronic stamp (TED) extraction and PDF417 rendering
//!
//! The signed tax document carries a `<TED …>…</TED>` element. Its inner
//! content is what the receipt encodes as a PDF417 symbol.

use image::{GrayImage, Luma};
use pdf417::{END_PATTERN, PDF417, PDF417Encoder, START_PATTERN};
use thiserror::Error;
use tracing::debug;

const TED_OPEN: &str = "<TED";
const TED_CLOSE: &str = "</TED>";

/// PDF417 allows 3 to 90 rows
const MIN_ROWS: u8 = 3;
const MAX_ROWS: u8 = 90;

/// Symbol rendering failures
#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("empty barcode payload")]
    EmptyPayload,

    /// The text encoder only handles ASCII
    #[error("barcode payload has non-ASCII character {0:?}")]
    UnsupportedCharacter(char),

    #[error("barcode payload of {len} bytes does not fit {columns} columns x {MAX_ROWS} rows")]
    Capacity { len: usize, columns: u8 },

    #[error("invalid symbol settings: {0}")]
    InvalidSettings(String),
}

/// Renders a text payload into a two-dimensional symbol bitmap
pub trait SymbolGenerator: Send + Sync {
    fn render(&self, payload: &str) -> Result<GrayImage, SymbolError>;
}

/// Inner content of the `<TED …>` element, if present
///
/// Only the first element is used. A missing closing tag counts as absent.
pub fn extract_ted(document: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(rel) = document[search_from..].find(TED_OPEN) {
        let start = search_from + rel;
        let after_name = start + TED_OPEN.len();
        // Skip look-alikes such as <TEDx>
        match document[after_name..].chars().next() {
            Some(c) if c == '>' || c.is_whitespace() => {}
            _ => {
                search_from = after_name;
                continue;
            }
        }
        let open_end = after_name + document[after_name..].find('>')? + 1;
        let close = open_end + document[open_end..].find(TED_CLOSE)?;
        return Some(&document[open_end..close]);
    }
    None
}

/// PDF417 generator backed by the `pdf417` crate
///
/// Rows grow until the payload fits; the encoder picks the strongest
/// error correction level the grid can hold.
#[derive(Debug, Clone)]
pub struct Pdf417Generator {
    /// Data columns (1..=30)
    pub columns: u8,
    /// Dots per module horizontally
    pub module_width: u32,
    /// Dots per row vertically
    pub row_height: u32,
    /// Blank modules around the symbol
    pub quiet_zone: u32,
}

impl Default for Pdf417Generator {
    fn default() -> Self {
        Self {
            columns: 6,
            module_width: 2,
            row_height: 6,
            quiet_zone: 2,
        }
    }
}

impl Pdf417Generator {
    /// Symbol width in modules, quiet zone excluded
    pub fn modules_wide(&self) -> u32 {
        START_PATTERN.size() as u32 + 17 + self.columns as u32 * 17 + 17 + END_PATTERN.size() as u32
    }

    /// Width in dots of any symbol this generator produces
    pub fn width_dots(&self) -> u32 {
        (self.modules_wide() + 2 * self.quiet_zone) * self.module_width
    }

    fn validate(&self, payload: &str) -> Result<(), SymbolError> {
        if !(1..=30).contains(&self.columns) {
            return Err(SymbolError::InvalidSettings(format!(
                "{} columns",
                self.columns
            )));
        }
        if self.module_width == 0 || self.row_height == 0 {
            return Err(SymbolError::InvalidSettings("zero module size".to_string()));
        }
        if payload.is_empty() {
            return Err(SymbolError::EmptyPayload);
        }
        if let Some(c) = payload.chars().find(|c| !c.is_ascii()) {
            return Err(SymbolError::UnsupportedCharacter(c));
        }
        Ok(())
    }

    /// Encode into the smallest grid that fits, returning rows and module bits
    fn encode(&self, payload: &str) -> Result<(u8, Vec<bool>), SymbolError> {
        let width = self.modules_wide() as usize;
        for rows in MIN_ROWS..=MAX_ROWS {
            let mut codewords = vec![0u16; rows as usize * self.columns as usize];
            let Some((level, filled)) = PDF417Encoder::new(codewords.as_mut_slice(), false)
                .append_ascii(payload)
                .fit_seal()
            else {
                continue;
            };
            debug!(rows, columns = self.columns, level, "PDF417 grid chosen");
            let mut bits = vec![false; width * rows as usize];
            let symbol = PDF417::new(filled, rows, self.columns, level);
            for (slot, bit) in bits.iter_mut().zip(symbol.bits()) {
                *slot = bit;
            }
            return Ok((rows, bits));
        }
        Err(SymbolError::Capacity {
            len: payload.len(),
            columns: self.columns,
        })
    }
}

impl SymbolGenerator for Pdf417Generator {
    fn render(&self, payload: &str) -> Result<GrayImage, SymbolError> {
        self.validate(payload)?;
        let (rows, bits) = self.encode(payload)?;

        let modules = self.modules_wide();
        let quiet_x = self.quiet_zone * self.module_width;
        let quiet_y = self.quiet_zone * self.module_width;
        let width = self.width_dots();
        let height = rows as u32 * self.row_height + 2 * quiet_y;

        let img = GrayImage::from_fn(width, height, |x, y| {
            if x < quiet_x || y < quiet_y || y >= height - quiet_y {
                return Luma([255]);
            }
            let col = (x - quiet_x) / self.module_width;
            let row = (y - quiet_y) / self.row_height;
            if col >= modules {
                return Luma([255]);
            }
            let dark = bits
                .get((row * modules + col) as usize)
                .copied()
                .unwrap_or(false);
            if dark { Luma([0]) } else { Luma([255]) }
        });
        Ok(img)
    }
}
