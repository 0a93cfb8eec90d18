//! # boleta CLI
//!
//! Command-line front end for the receipt printing service.
//!
//! ## Usage
//!
//! ```bash
//! # Print a sale to a network printer
//! boleta print sale.json --transport network --address 192.168.1.50
//!
//! # Print through the OS spooler
//! boleta print sale.json --transport system-spool --printer POS-80
//!
//! # Dump the ESC/POS bytes instead of printing
//! boleta render sale.json -o ticket.bin
//!
//! # List printers and probe one
//! boleta devices
//! boleta probe 192.168.1.50
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use boleta_service::{PrintService, ServiceConfig};
use clap::{Parser, Subcommand};
use shared::models::{PrintOptions, SaleRecord, TransportKind};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boleta - electronic receipt printing
#[derive(Parser, Debug)]
#[command(name = "boleta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Printer selection shared by `print` and `render`
#[derive(clap::Args, Debug)]
struct TargetArgs {
    /// network, usb, serial, system-spool or agent
    #[arg(long, default_value = "network")]
    transport: TransportKind,

    /// Network printer host
    #[arg(long)]
    address: Option<String>,

    /// Network printer port
    #[arg(long)]
    port: Option<u16>,

    /// Serial device path
    #[arg(long)]
    serial_path: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Installed printer name (spooler or agent)
    #[arg(long)]
    printer: Option<String>,

    /// USB vendor id, hex
    #[arg(long, value_parser = parse_hex)]
    vendor_id: Option<u16>,

    /// USB product id, hex
    #[arg(long, value_parser = parse_hex)]
    product_id: Option<u16>,

    /// Printer codepage, e.g. windows-1252
    #[arg(long)]
    codepage: Option<String>,

    /// Encode this text in the stamp instead of the document's TED
    #[arg(long)]
    barcode_payload: Option<String>,
}

impl TargetArgs {
    fn options(&self) -> PrintOptions {
        PrintOptions {
            transport: self.transport,
            address: self.address.clone(),
            port: self.port,
            serial_path: self.serial_path.clone(),
            baud_rate: self.baud,
            printer_name: self.printer.clone(),
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            barcode_payload: self.barcode_payload.clone(),
            codepage: self.codepage.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a sale (JSON file)
    Print {
        sale: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Compile a sale and write the raw ESC/POS bytes
    Render {
        sale: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List reachable printers
    Devices,

    /// Check whether a network printer answers
    Probe {
        host: String,
        #[arg(default_value_t = 9100)]
        port: u16,
    },

    /// Convert a logo image and cache it for a company
    RefreshLogo { company_id: String, source: String },
}

fn parse_hex(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex id {}: {}", s, e))
}

fn read_sale(path: &Path) -> Result<SaleRecord, BoxError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boleta=info,boleta_service=info,boleta_printer=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ServiceConfig::from_env();
    let service = PrintService::new(&config);

    match cli.command {
        Commands::Print { sale, target } => {
            let sale = read_sale(&sale)?;
            let result = service.print(&sale, &target.options()).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Render {
            sale,
            output,
            target,
        } => {
            let sale = read_sale(&sale)?;
            let ticket = service.compile(&sale, &target.options()).await?;
            for warning in &ticket.warnings {
                tracing::warn!("{}", warning);
            }
            match output {
                Some(path) => std::fs::write(&path, ticket.data.as_bytes())?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(ticket.data.as_bytes())?;
                    stdout.flush()?;
                }
            }
        }
        Commands::Devices => {
            let devices = service.list_devices().await;
            if devices.is_empty() {
                println!("No printers found ({} mode)", service.environment());
            }
            for device in devices {
                println!("{}", device);
            }
        }
        Commands::Probe { host, port } => {
            let online = service.probe(&host, port).await;
            println!("{}:{} {}", host, port, if online { "online" } else { "offline" });
            if !online {
                std::process::exit(1);
            }
        }
        Commands::RefreshLogo { company_id, source } => {
            if !service.refresh_logo(&company_id, &source).await {
                return Err(format!("could not convert logo {}", source).into());
            }
            if let Some(raster) = service.logos().get(&company_id).await {
                println!("{}: {}x{} dots", company_id, raster.width(), raster.height());
            }
        }
    }

    Ok(())
}
