//! # boleta-service
//!
//! Electronic receipt printing: WHAT goes on the ticket and WHERE it goes.
//!
//! - Ticket layout for Chilean electronic receipts (boleta)
//! - TED extraction and PDF417 stamp rendering
//! - Company logo cache
//! - Host environment detection and transport selection
//! - Per-device dispatch with uniform results
//!
//! Byte-level ESC/POS and device I/O live in `boleta-printer`.

pub mod config;
pub mod dispatcher;
pub mod format;
pub mod logo;
pub mod renderer;
pub mod selection;
pub mod service;
pub mod ted;

pub use config::ServiceConfig;
pub use dispatcher::Dispatcher;
pub use logo::LogoCache;
pub use renderer::{RenderConfig, TicketRenderer};
pub use selection::{HostEnvironment, HostMode, TransportSelector};
pub use service::{CompiledTicket, PrintService};
pub use ted::{Pdf417Generator, SymbolError, SymbolGenerator, extract_ted};
