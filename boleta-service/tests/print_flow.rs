//! End-to-end print flow: compile, select, dispatch

use std::time::Duration;

use boleta_printer::printer::agent::{AgentPrintJob, AgentPrinterList, Frame, FrameKind};
use boleta_service::{HostEnvironment, PrintService, ServiceConfig};
use chrono::NaiveDate;
use shared::models::{CompanyInfo, LineItem, PrintOptions, SaleRecord, TransportKind};
use tokio::net::TcpListener;

fn acme_sale() -> SaleRecord {
    SaleRecord {
        company: CompanyInfo {
            id: "acme".into(),
            legal_name: "ACME".into(),
            tax_id: "1-9".into(),
            address: "Av. Siempre Viva 742".into(),
            logo: None,
        },
        receipt_id: "1001".into(),
        issued_at: NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap(),
        items: vec![LineItem::new("Widget", 2, 1000)],
        total: 2000,
        document: None,
    }
}

fn config(agent_addr: &str) -> ServiceConfig {
    ServiceConfig {
        agent_addr: agent_addr.to_string(),
        connect_timeout: Duration::from_millis(500),
        probe_timeout: Duration::from_millis(300),
        ..ServiceConfig::default()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

async fn closed_port_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

#[tokio::test]
async fn acme_ticket_compiles_and_unreachable_network_fails() {
    let service = PrintService::with_environment(&config("127.0.0.1:9"), HostEnvironment::Direct);
    let options = PrintOptions::network("192.0.2.10", 9100);

    let ticket = service.compile(&acme_sale(), &options).await.unwrap();
    let data = ticket.data.as_bytes();
    assert!(data.starts_with(&[0x1B, 0x40]));
    assert!(contains(data, b"ACME"));
    assert!(contains(data, b"2 x $ 1.000"));
    assert!(contains(data, b"\x1B\x24\xEC\x01$ 2.000\n"));
    assert!(data.ends_with(&[0x1B, 0x64, 4, 0x1D, 0x56, 0x00]));
    // No document: the stamp degrades to a placeholder
    assert_eq!(ticket.warnings.len(), 1);

    let result = service.print(&acme_sale(), &options).await;
    assert!(!result.success);
    assert_eq!(result.channel_used, TransportKind::Network);
    assert!(!result.error_detail.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn missing_address_is_rejected_before_io() {
    let service = PrintService::with_environment(&config("127.0.0.1:9"), HostEnvironment::Direct);
    let mut options = PrintOptions::network("192.0.2.10", 9100);
    options.address = None;

    let result = service.print(&acme_sale(), &options).await;
    assert!(!result.success);
    assert!(result.error_detail.unwrap().contains("Invalid config"));
}

#[tokio::test]
async fn sandboxed_print_goes_through_agent() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let agent = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let frame = Frame::read_from(&mut socket).await.unwrap();
        assert_eq!(frame.kind, FrameKind::PrintJob);
        let job: AgentPrintJob = frame.parse().unwrap();
        Frame::new(FrameKind::Ack, frame.request_id, Vec::new())
            .write_to(&mut socket)
            .await
            .unwrap();
        (job.target.clone(), job.decode_data().unwrap())
    });

    let service = PrintService::with_environment(&config(&addr), HostEnvironment::Sandboxed);
    let options = PrintOptions::usb(Some(0x04b8), Some(0x0202));
    let expected = service.compile(&acme_sale(), &options).await.unwrap();

    let result = service.print(&acme_sale(), &options).await;
    assert!(result.success, "{:?}", result.error_detail);
    assert_eq!(result.channel_used, TransportKind::Agent);
    assert!(result.is_degraded());

    let (target, bytes) = agent.await.unwrap();
    assert_eq!(target.hint.as_deref(), Some("usb:04b8:0202"));
    assert_eq!(bytes, expected.data.as_bytes());
}

#[tokio::test]
async fn sandboxed_enumeration_asks_agent() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let frame = Frame::read_from(&mut socket).await.unwrap();
        let list = AgentPrinterList {
            printers: vec!["POS-80".into(), "Cocina".into()],
        };
        Frame::json(FrameKind::PrinterList, frame.request_id, &list)
            .unwrap()
            .write_to(&mut socket)
            .await
            .unwrap();
    });

    let service = PrintService::with_environment(&config(&addr), HostEnvironment::Sandboxed);
    let devices = service.list_devices().await;
    let names: Vec<String> = devices.iter().map(|d| d.to_string()).collect();
    assert_eq!(names, vec!["printer:POS-80", "printer:Cocina"]);
}

#[tokio::test]
async fn enumeration_without_agent_is_empty() {
    let addr = closed_port_addr().await;
    let service = PrintService::with_environment(&config(&addr), HostEnvironment::Sandboxed);
    assert!(service.list_devices().await.is_empty());
    assert!(!service.probe("127.0.0.1", 1).await);
}

#[tokio::test]
async fn ted_stamp_and_logo_are_rendered() {
    let dir = tempfile::tempdir().unwrap();
    let logo_path = dir.path().join("logo.png");
    image::RgbaImage::from_pixel(200, 100, image::Rgba([0, 0, 0, 255]))
        .save(&logo_path)
        .unwrap();

    let mut sale = acme_sale();
    sale.company.logo = Some(logo_path.to_string_lossy().into_owned());
    sale.document = Some(
        "<DTE><TED version=\"1.0\"><DD><RE>1-9</RE><F>1001</F><MNT>2000</MNT></DD></TED></DTE>"
            .to_string(),
    );

    let service = PrintService::with_environment(&config("127.0.0.1:9"), HostEnvironment::Direct);
    let ticket = service
        .compile(&sale, &PrintOptions::agent(None))
        .await
        .unwrap();
    assert!(ticket.warnings.is_empty(), "{:?}", ticket.warnings);

    let data = ticket.data.as_bytes();
    let raster_headers = data.windows(4).filter(|w| w == b"\x1D\x76\x30\x00").count();
    assert!(raster_headers >= 2);
    assert!(!contains(data, b"SIN TIMBRE"));
    assert!(service.logos().get("acme").await.is_some());
}

#[tokio::test]
async fn broken_logo_degrades_without_failing() {
    let mut sale = acme_sale();
    sale.company.logo = Some("/nonexistent/logo.png".into());

    let service = PrintService::with_environment(&config("127.0.0.1:9"), HostEnvironment::Direct);
    let ticket = service
        .compile(&sale, &PrintOptions::agent(None))
        .await
        .unwrap();
    assert!(ticket.warnings.iter().any(|w| w.starts_with("logo omitted")));
    assert!(contains(ticket.data.as_bytes(), b"ACME"));
    assert!(!service.refresh_logo("acme", "/nonexistent/logo.png").await);
}
