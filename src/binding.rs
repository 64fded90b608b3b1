//! UI field bindings.
//!
//! The UI layer renders fields bound to panel properties. Panels describe what to
//! bind with [`FieldBinding`]s grouped into a [`PanelLayout`]; the UI refreshes
//! displayed values from [`Snapshot`](crate::snapshot::Snapshot).
use serde::{Deserialize, Serialize};

/// How a field is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlType {
    Text,
    Number,
    Select,
    Toggle,
    Button,
    /// Read-only value the panel updates (status, debug text).
    Monitor,
}

/// Panel sub-section a field lives in.
///
/// `Write` and `Read` are the debug folders that only make sense while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Section {
    #[default]
    Main,
    Write,
    Read,
}

impl Section {
    /// Whether this section is hidden unless the connection is open.
    pub fn is_gated(&self) -> bool {
        matches!(self, Section::Write | Section::Read)
    }
}

/// Binds one property (`key`) to a labelled control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBinding {
    pub key: String,
    pub label: String,
    pub control: ControlType,
    pub section: Section,
    /// `(label, value)` choices for `Select` controls.
    pub options: Vec<(String, String)>,
    pub readonly: bool,
    pub multiline: bool,
    pub rows: u8,
}

impl FieldBinding {
    pub fn new(key: &str, label: &str, control: ControlType) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            control,
            section: Section::Main,
            options: Vec::new(),
            readonly: control == ControlType::Monitor,
            multiline: false,
            rows: 1,
        }
    }

    pub fn with_options(mut self, options: Vec<(String, String)>) -> Self {
        self.options = options;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn multiline(mut self, rows: u8) -> Self {
        self.multiline = true;
        self.rows = rows;
        self
    }

    pub fn in_section(mut self, section: Section) -> Self {
        self.section = section;
        self
    }
}

/// A panel (folder) of bound fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelLayout {
    pub title: String,
    /// The whole panel is hidden when its plugin is disabled.
    pub hidden: bool,
    /// Gated sections are hidden (connection not open).
    pub gated_hidden: bool,
    pub fields: Vec<FieldBinding>,
}

impl PanelLayout {
    /// Fields the UI should currently show.
    pub fn visible_fields(&self) -> impl Iterator<Item = &FieldBinding> {
        let panel_hidden = self.hidden;
        let gated_hidden = self.gated_hidden;
        self.fields
            .iter()
            .filter(move |f| !panel_hidden && !(gated_hidden && f.section.is_gated()))
    }

    pub fn field(&self, key: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(hidden: bool, gated_hidden: bool) -> PanelLayout {
        PanelLayout {
            title: "Serial Config".into(),
            hidden,
            gated_hidden,
            fields: vec![
                FieldBinding::new("path", "Path", ControlType::Select),
                FieldBinding::new("writeValue", "Value", ControlType::Text).in_section(Section::Write),
                FieldBinding::new("readValue", "Value", ControlType::Monitor)
                    .in_section(Section::Read)
                    .multiline(2),
            ],
        }
    }

    #[test]
    fn gated_sections_follow_flag() {
        let keys = |l: &PanelLayout| l.visible_fields().map(|f| f.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&layout(false, true)), vec!["path"]);
        assert_eq!(keys(&layout(false, false)), vec!["path", "writeValue", "readValue"]);
        assert!(keys(&layout(true, false)).is_empty());
    }

    #[test]
    fn monitors_are_readonly() {
        let l = layout(false, false);
        let read = l.field("readValue").unwrap();
        assert!(read.readonly && read.multiline);
        assert_eq!(read.rows, 2);
        assert!(!l.field("writeValue").unwrap().readonly);
    }
}
