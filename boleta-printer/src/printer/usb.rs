//! USB printer-class devices (libusb via rusb)

use super::{Delivery, JobProgress, JobState, Printer, join_error};
use crate::error::{PrintError, PrintResult};
use rusb::{Device, DeviceHandle, Direction, GlobalContext, TransferType, UsbContext};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// USB interface class code for printers
pub const PRINTER_CLASS: u8 = 7;

/// Vendor/product pair of an attached printer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
}

/// USB printer, either a specific device or the first printer found
#[derive(Debug, Clone, Default)]
pub struct UsbPrinter {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
}

/// Interface and bulk OUT endpoint to write to
#[derive(Debug, Clone, Copy)]
struct Endpoint {
    config: u8,
    interface: u8,
    setting: u8,
    address: u8,
}

impl UsbPrinter {
    /// Target a device by vendor and product id
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
        }
    }

    /// Target the first printer-class device found
    pub fn first_available() -> Self {
        Self::default()
    }

    pub fn vendor_id(&self) -> Option<u16> {
        self.vendor_id
    }

    pub fn product_id(&self) -> Option<u16> {
        self.product_id
    }

    /// Lock key; `usb:*` until resolved to concrete ids
    pub fn device_key(&self) -> String {
        match (self.vendor_id, self.product_id) {
            (Some(v), Some(p)) => format!("usb:{:04x}:{:04x}", v, p),
            _ => "usb:*".to_string(),
        }
    }

    fn wants(&self, vid: u16, pid: u16) -> bool {
        self.vendor_id.is_none_or(|v| v == vid) && self.product_id.is_none_or(|p| p == pid)
    }

    fn is_explicit(&self) -> bool {
        self.vendor_id.is_some() || self.product_id.is_some()
    }

    /// Whether this process can talk to the USB subsystem at all
    pub fn subsystem_available() -> bool {
        match rusb::devices() {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "USB subsystem unavailable");
                false
            }
        }
    }

    /// List attached printer-class devices
    pub fn list() -> PrintResult<Vec<UsbDeviceInfo>> {
        let mut found = Vec::new();
        for device in rusb::devices()?.iter() {
            let Ok(desc) = device.device_descriptor() else {
                continue;
            };
            if find_endpoint(&device, false).is_some() {
                found.push(UsbDeviceInfo {
                    vendor_id: desc.vendor_id(),
                    product_id: desc.product_id(),
                });
            }
        }
        debug!(count = found.len(), "USB printers enumerated");
        Ok(found)
    }

    /// Pin down concrete ids so the device can be locked precisely
    ///
    /// An explicit id pair is returned as is, without touching the bus.
    pub fn resolve(&self) -> PrintResult<Self> {
        if let (Some(v), Some(p)) = (self.vendor_id, self.product_id) {
            return Ok(Self::new(v, p));
        }
        let (device, _) = self.locate()?;
        let desc = device.device_descriptor()?;
        Ok(Self::new(desc.vendor_id(), desc.product_id()))
    }

    fn locate(&self) -> PrintResult<(Device<GlobalContext>, Endpoint)> {
        let explicit = self.is_explicit();
        for device in rusb::devices()?.iter() {
            let Ok(desc) = device.device_descriptor() else {
                continue;
            };
            if !self.wants(desc.vendor_id(), desc.product_id()) {
                continue;
            }
            // Explicit ids may point at vendor-class devices
            if let Some(endpoint) = find_endpoint(&device, explicit) {
                return Ok((device, endpoint));
            }
        }
        Err(PrintError::DeviceNotFound(self.device_key()))
    }

    fn open_blocking(&self) -> PrintResult<ClaimedInterface> {
        let (device, endpoint) = self.locate()?;
        let handle = device.open().map_err(map_open_error)?;
        let claimed = ClaimedInterface::claim(handle, endpoint)?;
        info!(
            interface = endpoint.interface,
            endpoint = endpoint.address,
            "USB interface claimed"
        );
        Ok(claimed)
    }
}

/// Find a bulk OUT endpoint, on a printer-class interface unless `any_class`
fn find_endpoint<T: UsbContext>(device: &Device<T>, any_class: bool) -> Option<Endpoint> {
    let desc = device.device_descriptor().ok()?;
    for n in 0..desc.num_configurations() {
        let Ok(config) = device.config_descriptor(n) else {
            continue;
        };
        for interface in config.interfaces() {
            for alt in interface.descriptors() {
                if !any_class && alt.class_code() != PRINTER_CLASS {
                    continue;
                }
                let out = alt.endpoint_descriptors().find(|ep| {
                    ep.direction() == Direction::Out && ep.transfer_type() == TransferType::Bulk
                });
                if let Some(ep) = out {
                    return Some(Endpoint {
                        config: config.number(),
                        interface: alt.interface_number(),
                        setting: alt.setting_number(),
                        address: ep.address(),
                    });
                }
            }
        }
    }
    None
}

fn map_open_error(e: rusb::Error) -> PrintError {
    match e {
        rusb::Error::Busy | rusb::Error::NoDevice | rusb::Error::NotFound => {
            PrintError::DeviceNotFound(e.to_string())
        }
        other => PrintError::Usb(other),
    }
}

/// Claimed interface, released on every exit path
struct ClaimedInterface {
    handle: DeviceHandle<GlobalContext>,
    endpoint: Endpoint,
    reattach: bool,
    released: bool,
}

impl ClaimedInterface {
    fn claim(mut handle: DeviceHandle<GlobalContext>, endpoint: Endpoint) -> PrintResult<Self> {
        let iface = endpoint.interface;
        let reattach = matches!(handle.kernel_driver_active(iface), Ok(true));
        if reattach {
            handle.detach_kernel_driver(iface).map_err(map_open_error)?;
        }
        if let Ok(active) = handle.active_configuration()
            && active != endpoint.config
        {
            handle.set_active_configuration(endpoint.config)?;
        }
        handle.claim_interface(iface).map_err(map_open_error)?;
        let mut claimed = Self {
            handle,
            endpoint,
            reattach,
            released: false,
        };
        if endpoint.setting != 0 {
            claimed
                .handle
                .set_alternate_setting(iface, endpoint.setting)?;
        }
        Ok(claimed)
    }

    fn write_all(&mut self, mut data: &[u8]) -> PrintResult<()> {
        while !data.is_empty() {
            // Zero timeout: the write itself is never timed out
            let n = self
                .handle
                .write_bulk(self.endpoint.address, data, Duration::ZERO)?;
            if n == 0 {
                return Err(PrintError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "USB bulk write accepted no data",
                )));
            }
            data = &data[n..];
        }
        Ok(())
    }

    /// Release the interface; a failure comes back as a warning
    fn release(&mut self) -> Option<String> {
        if self.released {
            return None;
        }
        self.released = true;
        let iface = self.endpoint.interface;
        let mut problem = self
            .handle
            .release_interface(iface)
            .err()
            .map(|e| format!("USB interface {} release failed: {}", iface, e));
        if self.reattach
            && let Err(e) = self.handle.attach_kernel_driver(iface)
        {
            problem.get_or_insert_with(|| format!("USB kernel driver reattach failed: {}", e));
        }
        if let Some(msg) = &problem {
            warn!("{}", msg);
        }
        problem
    }
}

impl Drop for ClaimedInterface {
    fn drop(&mut self) {
        self.release();
    }
}

impl Printer for UsbPrinter {
    #[instrument(skip(self, data, progress), fields(device = %self.device_key(), data_len = data.len()))]
    async fn print(&self, data: &[u8], progress: &mut JobProgress) -> PrintResult<Delivery> {
        let printer = self.clone();
        let mut claimed = tokio::task::spawn_blocking(move || printer.open_blocking())
            .await
            .map_err(join_error)??;
        progress.advance(JobState::Connected);

        progress.advance(JobState::Writing);
        let payload = data.to_vec();
        let warning = tokio::task::spawn_blocking(move || {
            claimed.write_all(&payload)?;
            Ok::<_, PrintError>(claimed.release())
        })
        .await
        .map_err(join_error)??;

        progress.advance(JobState::Closed);
        info!("USB print job sent");

        let mut delivery = Delivery::new(data.len());
        delivery.warnings.extend(warning);
        Ok(delivery)
    }

    async fn is_online(&self) -> bool {
        let printer = self.clone();
        tokio::task::spawn_blocking(move || printer.locate().is_ok())
            .await
            .unwrap_or(false)
    }
}
