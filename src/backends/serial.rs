//! Serial bridge over the `serialport` crate.
//!
//! [`SerialPortBridge`] opens the configured port, reads it on a background thread and
//! pushes [`SerialEvent`]s into a channel that [`SerialBridge::poll`] drains from the
//! event loop. Incoming bytes are split into lines on `\n` (a trailing `\r` is dropped);
//! each line becomes one `Data` event.
//!
//! Open failures and read errors (e.g. the cable was pulled) are reported as `Error`
//! events, not as `Err` returns, so the lifecycle tracker sees them in order with the
//! rest of the stream.

use crate::device::DeviceDescriptor;
use crate::error::{Error, Result};
use crate::metadata::DeviceMeta;
use crate::serial::{SerialBridge, SerialEvent};
use crate::settings::SerialConfig;
use flume::{Receiver, Sender};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Read timeout; also bounds how long `disconnect` waits for the reader thread.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// A line longer than this is flushed as-is.
const MAX_LINE_LEN: usize = 4096;

struct Link {
    path: String,
    port: Box<dyn SerialPort>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

pub struct SerialPortBridge {
    events_tx: Sender<SerialEvent>,
    events_rx: Receiver<SerialEvent>,
    link: Option<Link>,
}

impl SerialPortBridge {
    pub fn new() -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            events_tx,
            events_rx,
            link: None,
        }
    }

    fn push(&self, event: SerialEvent) {
        // The receiver lives in `self`; sending cannot fail while we exist.
        let _ = self.events_tx.send(event);
    }

    fn close_link(&mut self) -> bool {
        let Some(mut link) = self.link.take() else {
            return false;
        };
        link.stop.store(true, Ordering::Relaxed);
        if let Some(reader) = link.reader.take() {
            if reader.join().is_err() {
                log::warn!("serial: reader thread for {} panicked", link.path);
            }
        }
        log::info!("serial: closed {}", link.path);
        true
    }
}

impl Default for SerialPortBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SerialPortBridge {
    fn drop(&mut self) {
        self.close_link();
    }
}

impl SerialBridge for SerialPortBridge {
    fn list_ports(&mut self) -> Result<Vec<DeviceDescriptor>> {
        let ports = serialport::available_ports()?;
        Ok(ports.iter().map(descriptor).collect())
    }

    fn connect(&mut self, config: &SerialConfig) -> Result<()> {
        // At most one open port per bridge.
        self.close_link();

        let opened = serialport::new(config.path.as_str(), config.baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .and_then(|port| {
                let reader = port.try_clone()?;
                Ok((port, reader))
            });

        let (port, reader_port) = match opened {
            Ok(pair) => pair,
            Err(e) => {
                self.push(SerialEvent::Error(format!("{}: {e}", config.path)));
                return Ok(());
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let stop = stop.clone();
            let tx = self.events_tx.clone();
            let path = config.path.clone();
            std::thread::Builder::new()
                .name(format!("serial-read:{path}"))
                .spawn(move || read_lines(reader_port, &path, &stop, &tx))?
        };

        log::info!("serial: opened {} @ {}", config.path, config.baud_rate);
        self.link = Some(Link {
            path: config.path.clone(),
            port,
            stop,
            reader: Some(reader),
        });
        self.push(SerialEvent::Opened);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.close_link();
        self.push(SerialEvent::Closed);
        Ok(())
    }

    fn write(&mut self, value: &str) -> Result<()> {
        let link = self.link.as_mut().ok_or(Error::NotConnected("serial"))?;
        link.port.write_all(value.as_bytes())?;
        link.port.flush()?;
        Ok(())
    }

    fn poll(&mut self) -> Vec<SerialEvent> {
        self.events_rx.try_iter().collect()
    }
}

fn read_lines(mut port: Box<dyn SerialPort>, path: &str, stop: &AtomicBool, tx: &Sender<SerialEvent>) {
    let mut buf = [0u8; 256];
    let mut line: Vec<u8> = Vec::with_capacity(128);

    while !stop.load(Ordering::Relaxed) {
        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                for &b in &buf[..n] {
                    if b == b'\n' || line.len() >= MAX_LINE_LEN {
                        if tx.send(SerialEvent::Data(take_line(&mut line))).is_err() {
                            return;
                        }
                    }
                    if b != b'\n' {
                        line.push(b);
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) => {
                if !stop.load(Ordering::Relaxed) {
                    log::error!("serial: read from {path} failed: {e}");
                    let _ = tx.send(SerialEvent::Error(format!("{path}: {e}")));
                }
                return;
            }
        }
    }
}

fn take_line(line: &mut Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    let text = String::from_utf8_lossy(line).into_owned();
    line.clear();
    text
}

fn descriptor(info: &SerialPortInfo) -> DeviceDescriptor {
    let path = info.port_name.as_str();
    let (meta, name) = match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            let meta = DeviceMeta {
                bus: Some("usb".into()),
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product.clone(),
                manufacturer: usb.manufacturer.clone(),
                serial_number: usb.serial_number.clone(),
                path: Some(path.to_string()),
            };
            let name = match &usb.product {
                Some(product) => format!("{path} ({product})"),
                None => path.to_string(),
            };
            (meta, name)
        }
        SerialPortType::PciPort => (DeviceMeta::with_bus("pci", Some(path)), path.to_string()),
        SerialPortType::BluetoothPort => {
            (DeviceMeta::with_bus("bluetooth", Some(path)), path.to_string())
        }
        SerialPortType::Unknown => (
            DeviceMeta {
                path: Some(path.to_string()),
                ..DeviceMeta::default()
            },
            path.to_string(),
        ),
    };
    DeviceDescriptor::new(path, name).with_meta(meta)
}
