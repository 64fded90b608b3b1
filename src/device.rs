//! Device descriptors and enumeration results.
//!
//! Enumeration is an external query (serial port listing, MIDI access). Its
//! result is a [`DeviceList`]: an ordered mapping of identifier → display name
//! that a UI binds a selector to. A list is owned by whoever asked for it and is
//! replaced wholesale on the next enumeration.

use crate::error::Result;
use crate::metadata::DeviceMeta;
use std::fmt;

/// One enumerated device: opaque identifier plus a human-readable name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Identifier used to open the device (serial path, MIDI port name).
    pub id: String,
    /// Display name for selectors.
    pub name: String,
    pub meta: DeviceMeta,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            meta: DeviceMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: DeviceMeta) -> Self {
        self.meta = meta;
        self
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == self.name {
            f.write_str(&self.name)
        } else {
            write!(f, "{} ({})", self.name, self.id)
        }
    }
}

/// Result of one enumeration, in the order the backend reported devices.
///
/// Identifiers are unique; a later duplicate replaces nothing and is skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceList(Vec<DeviceDescriptor>);

impl DeviceList {
    pub fn new(devices: impl IntoIterator<Item = DeviceDescriptor>) -> Self {
        let mut out: Vec<DeviceDescriptor> = Vec::new();
        for d in devices {
            if out.iter().any(|seen| seen.id == d.id) {
                continue;
            }
            out.push(d);
        }
        Self(out)
    }

    /// Collapse an enumeration result into a list.
    ///
    /// Failure is non-fatal: it is logged and yields an empty list.
    pub fn from_result(what: &str, result: Result<Vec<DeviceDescriptor>>) -> Self {
        match result {
            Ok(devices) => {
                let list = Self::new(devices);
                log::debug!("{what}: enumerated {} device(s)", list.len());
                list
            }
            Err(e) => {
                log::error!("{what}: device enumeration failed: {e}");
                Self::default()
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|d| d.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.0.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(display name, identifier)` pairs for a selector binding.
    pub fn options(&self) -> Vec<(String, String)> {
        self.0.iter().map(|d| (d.name.clone(), d.id.clone())).collect()
    }
}

impl IntoIterator for DeviceList {
    type Item = DeviceDescriptor;
    type IntoIter = std::vec::IntoIter<DeviceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
