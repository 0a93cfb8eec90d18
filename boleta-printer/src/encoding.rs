//! Single-byte codepage utilities for thermal printers
//!
//! Printer firmware renders text through a single-byte code table chosen
//! with `ESC t n`. This module provides utilities for:
//! - Selecting the table matching a supported encoding
//! - Transcoding UTF-8 text to that table (lossy, library substitution)
//! - Measuring, truncating and padding strings by encoded width

use crate::error::{PrintError, PrintResult};
use encoding_rs::Encoding;
use std::str::FromStr;
use tracing::debug;

/// Printer codepage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codepage {
    /// WPC1252, Western European
    #[default]
    Windows1252,
    /// ISO 8859-15 (Latin-9, with €)
    Iso8859_15,
    /// PC866, Cyrillic
    Ibm866,
    /// WPC1250, Central European
    Windows1250,
}

impl Codepage {
    /// encoding_rs encoder for this table
    pub fn encoding(&self) -> &'static Encoding {
        match self {
            Codepage::Windows1252 => encoding_rs::WINDOWS_1252,
            Codepage::Iso8859_15 => encoding_rs::ISO_8859_15,
            Codepage::Ibm866 => encoding_rs::IBM866,
            Codepage::Windows1250 => encoding_rs::WINDOWS_1250,
        }
    }

    /// Table number `n` for `ESC t n` (Epson numbering)
    pub fn escpos_table(&self) -> u8 {
        match self {
            Codepage::Windows1252 => 16,
            Codepage::Ibm866 => 17,
            Codepage::Iso8859_15 => 40,
            Codepage::Windows1250 => 45,
        }
    }

    pub fn name(&self) -> &'static str {
        self.encoding().name()
    }

    /// Transcode text to printer bytes
    ///
    /// Characters missing from the table are replaced with the encoder's
    /// numeric character reference (`&#NNNN;`).
    pub fn encode(&self, s: &str) -> Vec<u8> {
        let (cow, _, had_errors) = self.encoding().encode(s);
        if had_errors {
            debug!(codepage = self.name(), text = s, "unmappable characters substituted");
        }
        cow.into_owned()
    }

    /// Encoded byte width of a string (one byte = one column)
    pub fn width(&self, s: &str) -> usize {
        let (cow, _, _) = self.encoding().encode(s);
        cow.len()
    }

    /// Truncate a string to fit within an encoded width
    pub fn truncate(&self, s: &str, max_width: usize) -> String {
        let mut width = 0;
        let mut result = String::new();
        let mut tmp = [0u8; 4];
        for c in s.chars() {
            let char_len = self.width(c.encode_utf8(&mut tmp));
            if width + char_len > max_width {
                break;
            }
            result.push(c);
            width += char_len;
        }
        result
    }

    /// Pad a string to a specific encoded width
    ///
    /// If the string is longer than the width, it will be truncated.
    pub fn pad(&self, s: &str, width: usize, align_right: bool) -> String {
        let current_width = self.width(s);
        if current_width >= width {
            return self.truncate(s, width);
        }
        let spaces = width - current_width;
        if align_right {
            format!("{}{}", " ".repeat(spaces), s)
        } else {
            format!("{}{}", s, " ".repeat(spaces))
        }
    }
}

impl FromStr for Codepage {
    type Err = PrintError;

    fn from_str(s: &str) -> PrintResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows-1252" | "cp1252" | "wpc1252" | "1252" => Ok(Codepage::Windows1252),
            "iso-8859-15" | "latin9" | "latin-9" => Ok(Codepage::Iso8859_15),
            "ibm866" | "cp866" | "pc866" | "866" => Ok(Codepage::Ibm866),
            "windows-1250" | "cp1250" | "wpc1250" | "1250" => Ok(Codepage::Windows1250),
            other => Err(PrintError::InvalidConfig(format!(
                "Unsupported codepage: {}",
                other
            ))),
        }
    }
}
