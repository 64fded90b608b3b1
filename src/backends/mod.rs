//! Transport backends for `sketchbridge`.
//!
//! Implementations of [`SerialBridge`](crate::serial::SerialBridge),
//! [`MidiAccess`](crate::midi::MidiAccess) and [`OscSink`](crate::osc::OscSink).
//!
//! # Feature flags
//! - **`serial`**: native serial ports through `serialport` (default).
//! - **`midi`**: native MIDI inputs through `midir` (default).
//!
//! The in-memory transports in [`virtual_input`] are always available.

use crate::device::DeviceDescriptor;

#[cfg(feature = "midi")]
#[cfg_attr(docsrs, doc(cfg(feature = "midi")))]
pub mod midi;
#[cfg(feature = "serial")]
#[cfg_attr(docsrs, doc(cfg(feature = "serial")))]
pub mod serial;
pub mod virtual_input;

/// Unified discovery across enabled backends.
///
/// Serial ports first, then MIDI inputs (with `bus = "midi"`). Backends that fail to
/// enumerate are logged and skipped.
pub fn probe_devices() -> Vec<DeviceDescriptor> {
    #[allow(unused_mut)]
    let mut out: Vec<DeviceDescriptor> = Vec::new();

    #[cfg(feature = "serial")]
    {
        use crate::serial::SerialBridge;
        let mut bridge = serial::SerialPortBridge::new();
        match bridge.list_ports() {
            Ok(ports) => out.extend(ports),
            Err(e) => log::warn!("probe: serial enumeration failed: {e}"),
        }
    }

    #[cfg(feature = "midi")]
    {
        use crate::metadata::DeviceMeta;
        use crate::midi::MidiAccess;
        match midi::MidirAccess::new("sketchbridge-probe").request_access() {
            Ok(inputs) => out.extend(inputs.iter().map(|i| {
                DeviceDescriptor::new(i.name(), i.name()).with_meta(DeviceMeta::with_bus("midi", None))
            })),
            Err(e) => log::warn!("probe: midi enumeration failed: {e}"),
        }
    }

    out
}
