//! Point-in-time view of the panel state for the UI layer.
//!
//! [`Snapshot`] is an **owned**, read-only copy produced by
//! [`Manager::snapshot`](crate::manager::Manager::snapshot). The UI calls it after each
//! loop iteration and refreshes its bound fields from it; nothing in a snapshot updates
//! by itself.
//!
//! # Example
//! ```no_run
//! # fn show(mgr: &sketchbridge::Manager) {
//! let snap = mgr.snapshot();
//! println!("serial {} / midi {}", snap.serial.status, snap.midi.status);
//! if let Some(err) = &snap.serial.error {
//!     eprintln!("serial error: {err}");
//! }
//! # }
//! ```

use crate::error::Result;
use crate::lifecycle::{ConnectionStatus, LifecycleTracker};
use serde::Serialize;

/// State of one device channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnapshot {
    pub enabled: bool,
    pub status: ConnectionStatus,
    /// Selected device (serial path or MIDI device name); empty when unset.
    pub device: String,
    pub error: Option<String>,
    /// Whether the sections gated on an open connection are hidden.
    pub sections_hidden: bool,
    /// Debug-area text: last line read (serial) or last decoded message (MIDI).
    pub debug: String,
}

impl ChannelSnapshot {
    pub(crate) fn capture(enabled: bool, device: &str, tracker: &LifecycleTracker, debug: &str) -> Self {
        Self {
            enabled,
            status: tracker.status(),
            device: device.to_string(),
            error: tracker.last_error().map(str::to_string),
            sections_hidden: tracker.sections_hidden(),
            debug: debug.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub serial: ChannelSnapshot,
    pub midi: ChannelSnapshot,
    pub osc_enabled: bool,
    /// Last OSC message received.
    pub osc_debug: String,
    /// A settings save is scheduled but has not happened yet.
    pub save_pending: bool,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
