//! OS print spooler, raw jobs only
//!
//! Windows submits a `RAW` document through the Win32 print API; other
//! platforms pipe the bytes into CUPS with `lp -o raw`.

use super::{Delivery, JobProgress, JobState, Printer};
use crate::error::{PrintError, PrintResult};
use tracing::{info, instrument};

/// Installed printer, addressed by its spooler name
#[derive(Debug, Clone)]
pub struct SpoolPrinter {
    name: String,
}

impl SpoolPrinter {
    pub fn new(name: &str) -> PrintResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PrintError::InvalidConfig(
                "System spool printing needs a printer name".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
        })
    }

    /// Get the printer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installed printers, virtual ones excluded
    pub async fn list() -> PrintResult<Vec<String>> {
        platform::list().await
    }
}

impl Printer for SpoolPrinter {
    #[instrument(skip(self, data, progress), fields(printer = %self.name, data_len = data.len()))]
    async fn print(&self, data: &[u8], progress: &mut JobProgress) -> PrintResult<Delivery> {
        let job = platform::RawJob::start(&self.name).await?;
        progress.advance(JobState::Connected);

        progress.advance(JobState::Writing);
        job.write(data).await?;
        progress.advance(JobState::Closed);
        info!("Raw job handed to spooler");
        Ok(Delivery::new(data.len()))
    }

    async fn is_online(&self) -> bool {
        platform::is_online(&self.name).await
    }
}

#[cfg(windows)]
mod platform {
    use super::super::join_error;
    use crate::error::{PrintError, PrintResult};
    use windows::Win32::Graphics::Printing::{ClosePrinter, OpenPrinterW, PRINTER_HANDLE};
    use windows::core::PCWSTR;

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    /// Ports that never reach a physical printer
    fn is_virtual_port(port: &str) -> bool {
        const VIRTUAL: [&str; 4] = ["file:", "portprompt:", "xpsport:", "nul:"];
        let port = port.to_lowercase();
        VIRTUAL.contains(&port.as_str())
            || port.starts_with("onenote")
            || port.starts_with("wfsport:")
    }

    /// Spooler handle, closed on drop
    struct PrinterHandle(PRINTER_HANDLE);

    // SAFETY: spooler handles are not bound to the thread that opened them
    unsafe impl Send for PrinterHandle {}

    impl PrinterHandle {
        fn open(name: &str) -> PrintResult<Self> {
            let mut handle = PRINTER_HANDLE::default();
            let name_w = to_wide(name);
            let opened =
                unsafe { OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None) };
            opened.map_err(|_| PrintError::DeviceNotFound(name.to_string()))?;
            Ok(Self(handle))
        }

        fn is_offline(&self) -> bool {
            use windows::Win32::Graphics::Printing::{
                GetPrinterW, PRINTER_INFO_6, PRINTER_STATUS_OFFLINE,
            };

            let mut needed: u32 = 0;
            unsafe {
                let _ = GetPrinterW(self.0, 6, None, &mut needed);
                if needed == 0 {
                    return false;
                }
                let mut buf: Vec<u8> = vec![0; needed as usize];
                if GetPrinterW(self.0, 6, Some(buf.as_mut_slice()), &mut needed).is_err() {
                    return false;
                }
                let info = std::ptr::read_unaligned(buf.as_ptr() as *const PRINTER_INFO_6);
                info.dwStatus & PRINTER_STATUS_OFFLINE != 0
            }
        }
    }

    impl Drop for PrinterHandle {
        fn drop(&mut self) {
            let _ = unsafe { ClosePrinter(self.0) };
        }
    }

    /// Open RAW document with one page; ended on drop
    pub struct RawJob {
        printer: PrinterHandle,
    }

    impl RawJob {
        fn start_blocking(name: &str) -> PrintResult<Self> {
            use windows::Win32::Graphics::Printing::{
                DOC_INFO_1W, EndDocPrinter, StartDocPrinterW, StartPagePrinter,
            };
            use windows::core::PWSTR;

            let printer = PrinterHandle::open(name)?;
            let doc_name_w = to_wide("Boleta");
            let datatype_w = to_wide("RAW");
            let doc_info = DOC_INFO_1W {
                pDocName: PWSTR(doc_name_w.as_ptr() as *mut _),
                pOutputFile: PWSTR::null(),
                pDatatype: PWSTR(datatype_w.as_ptr() as *mut _),
            };

            unsafe {
                if StartDocPrinterW(printer.0, 1, &doc_info as *const DOC_INFO_1W) == 0 {
                    return Err(PrintError::Spooler(format!(
                        "StartDocPrinter failed for {}",
                        name
                    )));
                }
                if !StartPagePrinter(printer.0).as_bool() {
                    let _ = EndDocPrinter(printer.0);
                    return Err(PrintError::Spooler(format!(
                        "StartPagePrinter failed for {}",
                        name
                    )));
                }
            }
            Ok(Self { printer })
        }

        fn write_blocking(&self, data: &[u8]) -> PrintResult<()> {
            use core::ffi::c_void;
            use windows::Win32::Graphics::Printing::WritePrinter;

            let mut written: u32 = 0;
            let ok = unsafe {
                WritePrinter(
                    self.printer.0,
                    data.as_ptr() as *const c_void,
                    data.len() as u32,
                    &mut written,
                )
            };
            if !ok.as_bool() {
                return Err(PrintError::Spooler("WritePrinter failed".to_string()));
            }
            if written as usize != data.len() {
                return Err(PrintError::Spooler(format!(
                    "Incomplete write: {} of {} bytes",
                    written,
                    data.len()
                )));
            }
            Ok(())
        }

        pub async fn start(name: &str) -> PrintResult<Self> {
            let name = name.to_string();
            tokio::task::spawn_blocking(move || Self::start_blocking(&name))
                .await
                .map_err(join_error)?
        }

        pub async fn write(self, data: &[u8]) -> PrintResult<()> {
            let data = data.to_vec();
            tokio::task::spawn_blocking(move || self.write_blocking(&data))
                .await
                .map_err(join_error)?
        }
    }

    impl Drop for RawJob {
        fn drop(&mut self) {
            use windows::Win32::Graphics::Printing::{EndDocPrinter, EndPagePrinter};

            unsafe {
                let _ = EndPagePrinter(self.printer.0);
                let _ = EndDocPrinter(self.printer.0);
            }
        }
    }

    fn list_blocking() -> PrintResult<Vec<String>> {
        use windows::Win32::Graphics::Printing::{
            EnumPrintersW, PRINTER_ENUM_CONNECTIONS, PRINTER_ENUM_LOCAL, PRINTER_INFO_5W,
        };
        use windows::core::PWSTR;

        let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
        let mut needed: u32 = 0;
        let mut returned: u32 = 0;
        unsafe {
            let _ = EnumPrintersW(flags, None, 5, None, &mut needed, &mut returned);
        }
        if needed == 0 {
            return Ok(Vec::new());
        }

        let mut buf: Vec<u8> = vec![0; needed as usize];
        let entries = unsafe {
            EnumPrintersW(
                flags,
                None,
                5,
                Some(buf.as_mut_slice()),
                &mut needed,
                &mut returned,
            )
            .map_err(|e| PrintError::Spooler(format!("EnumPrintersW failed: {}", e)))?;
            std::slice::from_raw_parts(buf.as_ptr() as *const PRINTER_INFO_5W, returned as usize)
        };

        let wide = |p: PWSTR| -> String {
            if p.is_null() {
                String::new()
            } else {
                unsafe { p.to_string() }.unwrap_or_default()
            }
        };
        Ok(entries
            .iter()
            .filter(|info| !info.pPrinterName.is_null())
            .filter(|info| !is_virtual_port(&wide(info.pPortName)))
            .map(|info| wide(info.pPrinterName))
            .collect())
    }

    pub async fn list() -> PrintResult<Vec<String>> {
        tokio::task::spawn_blocking(list_blocking)
            .await
            .map_err(join_error)?
    }

    pub async fn is_online(name: &str) -> bool {
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            PrinterHandle::open(&name).is_ok_and(|printer| !printer.is_offline())
        })
        .await
        .unwrap_or(false)
    }
}

#[cfg(not(windows))]
mod platform {
    use crate::error::{PrintError, PrintResult};
    use std::process::Stdio;
    use tokio::io::AsyncWriteExt;
    use tokio::process::{Child, Command};

    pub async fn list() -> PrintResult<Vec<String>> {
        let output = Command::new("lpstat")
            .arg("-e")
            .output()
            .await
            .map_err(|e| PrintError::Spooler(format!("lpstat unavailable: {}", e)))?;
        if !output.status.success() {
            return Err(PrintError::Spooler(format!(
                "lpstat failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(parse_destinations(&String::from_utf8_lossy(&output.stdout)))
    }

    /// One destination per line, as printed by `lpstat -e`
    pub(super) fn parse_destinations(stdout: &str) -> Vec<String> {
        stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub async fn is_online(name: &str) -> bool {
        match Command::new("lpstat").args(["-p", name]).output().await {
            Ok(out) if out.status.success() => {
                let text = String::from_utf8_lossy(&out.stdout).to_lowercase();
                !text.contains("disabled")
            }
            _ => false,
        }
    }

    /// Running `lp -o raw` process waiting for the job on stdin
    pub struct RawJob {
        name: String,
        child: Child,
    }

    impl RawJob {
        pub async fn start(name: &str) -> PrintResult<Self> {
            Self::start_with("lp", name)
        }

        pub(super) fn start_with(program: &str, name: &str) -> PrintResult<Self> {
            let child = Command::new(program)
                .args(["-d", name, "-o", "raw"])
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| PrintError::Spooler(format!("{} unavailable: {}", program, e)))?;
            Ok(Self {
                name: name.to_string(),
                child,
            })
        }

        pub async fn write(mut self, data: &[u8]) -> PrintResult<()> {
            if let Some(mut stdin) = self.child.stdin.take() {
                let sent = match stdin.write_all(data).await {
                    Ok(()) => stdin.shutdown().await,
                    Err(e) => Err(e),
                };
                // lp exiting early closes the pipe; its exit status says why
                if let Err(e) = sent
                    && e.kind() != std::io::ErrorKind::BrokenPipe
                {
                    return Err(e.into());
                }
            }

            let output = self.child.wait_with_output().await?;
            if !output.status.success() {
                return Err(PrintError::Spooler(format!(
                    "lp -d {} failed: {}",
                    self.name,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            Ok(())
        }
    }
}
