//! Device metadata snapshot.
//!
//! [`DeviceMeta`] is a lightweight, cloneable description of a device suitable
//! for UI display, logging, and persistence. Backends populate what they know;
//! unknown fields remain `None`.
//!
//! # Conventions
//! - `bus` is a short, human-readable bus hint like `"usb"`, `"pci"`, `"bluetooth"` or `"midi"`.
//! - `product` should be a friendly, user-facing name when available.
//! - `path` is an OS path (opaque string) such as `/dev/ttyUSB0` or `COM3`.
//!
//! ## Persistence notes
//! - `vid`/`pid` and `serial_number` (when present) are generally stable and useful for re-identification.
//! - `path` may change across reconnects (`ttyUSB0` → `ttyUSB1`); the panels still persist it
//!   because that is what the user picked, and fall back to "unset" when it disappears.

use serde::{Deserialize, Serialize};

/// Snapshot of metadata describing a single device.
///
/// All fields are optional; populate what is known on the current platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// High-level bus classification (e.g., `"usb"`, `"bluetooth"`, `"midi"`).
    pub bus: Option<String>,

    /// USB Vendor ID (VID), if known.
    pub vid: Option<u16>,

    /// USB Product ID (PID), if known.
    pub pid: Option<u16>,

    /// Human-readable product name from the driver/firmware.
    pub product: Option<String>,

    /// Manufacturer string, if the OS reports one.
    pub manufacturer: Option<String>,

    /// Device serial number supplied by firmware/OS, if present.
    ///
    /// On USB, this usually maps to the iSerialNumber string.
    pub serial_number: Option<String>,

    /// OS path to the device. Opaque.
    pub path: Option<String>,
}

impl DeviceMeta {
    /// Metadata carrying only a bus hint and path.
    pub fn with_bus(bus: &str, path: Option<&str>) -> Self {
        Self {
            bus: Some(bus.to_string()),
            path: path.map(str::to_string),
            ..Self::default()
        }
    }

    /// `vid:pid` in hex, when both are known.
    pub fn usb_id(&self) -> Option<String> {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => Some(format!("{vid:04x}:{pid:04x}")),
            _ => None,
        }
    }
}
