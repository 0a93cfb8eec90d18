//! # boleta-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building with a per-line width budget
//! - Single-byte codepage transcoding (`encoding_rs`)
//! - Raster conversion for `GS v 0` (logos, 2D symbols)
//! - Transports: network, USB, serial, OS spooler, print agent
//!
//! Business logic (WHAT to print) lives in `boleta-service`.
//!
//! ## Example
//!
//! ```ignore
//! use boleta_printer::{Codepage, EscPosBuilder, JobProgress, NetworkPrinter, PaperProfile, Printer};
//!
//! let mut builder = EscPosBuilder::new(PaperProfile::MM80, Codepage::Windows1252);
//! builder.center().bold().line("ACME SpA").bold_off();
//! builder.left().line_lr("Café", "$ 1.500");
//! builder.feed(4).cut();
//!
//! let printer = NetworkPrinter::new("192.168.1.100", 9100)?;
//! printer.print(&builder.build(), &mut JobProgress::new()).await?;
//! ```

mod encoding;
mod error;
mod escpos;
mod layout;
pub mod printer;
pub mod raster;

// Re-exports
pub use encoding::Codepage;
pub use error::{PrintError, PrintResult};
pub use escpos::{CommandBuffer, EscPosBuilder, PrintData, Segment};
pub use layout::{LineBudget, PairLayout, PaperProfile};
pub use printer::{
    AgentClient, AgentPrinter, AgentTarget, Delivery, JobProgress, JobState, NetworkPrinter,
    Printer, SerialPrinter, SpoolPrinter, Transport, UsbDeviceInfo, UsbPrinter,
};
pub use raster::RasterBlock;

#[cfg(feature = "image")]
pub use raster::{load_logo, prepare_logo, to_device_raster, to_device_raster_gray};
