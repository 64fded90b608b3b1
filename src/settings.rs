//! Application settings and their persistence.
//!
//! [`AppSettings`] is the object the host hands to the panel on startup and receives
//! back on every (debounced) change. Keys are camelCase so the same file can be shared
//! with a host that stores it as JSON.
//!
//! The host store is the [`ConfigStore`] trait. [`FileStore`] is the standalone
//! implementation: TOML or JSON picked by file extension, defaults when the file does
//! not exist yet.
//!
//! [`DebouncedSaver`] implements the save policy: any number of edits inside the quiet
//! period collapse into one save of the settings as they are when the period ends.

use crate::debounce::Debouncer;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Quiet period before a changed setting is written.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerialConfig {
    pub path: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/tty.usb".into(),
            baud_rate: 9600,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MidiConfig {
    pub device_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelOptions {
    pub serial_port: SerialConfig,
    pub midi: MidiConfig,
}

/// Which channels are enabled; a disabled channel's panel is hidden.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginFlags {
    pub gui_display: bool,
    pub use_serial_port: bool,
    pub use_osc: bool,
    pub use_midi: bool,
}

impl Default for PluginFlags {
    fn default() -> Self {
        Self {
            gui_display: true,
            use_serial_port: false,
            use_osc: false,
            use_midi: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// OSC target host.
    pub ip: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub frame: bool,
    pub kiosk: bool,
    pub always_on_top: bool,
    pub auto_hide_menu_bar: bool,
    pub use_dev_tools: bool,
    pub options: ChannelOptions,
    pub plugin: PluginFlags,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".into(),
            x: 0,
            y: 0,
            width: 1280,
            height: 720,
            fullscreen: false,
            frame: true,
            kiosk: false,
            always_on_top: false,
            auto_hide_menu_bar: false,
            use_dev_tools: false,
            options: ChannelOptions::default(),
            plugin: PluginFlags::default(),
        }
    }
}

/// Host-managed settings store.
pub trait ConfigStore: Send {
    fn load(&mut self) -> Result<AppSettings>;
    fn save(&mut self, settings: &AppSettings) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Json,
}

/// Settings file on disk. `.json` files are JSON, everything else TOML.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    format: FileFormat,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        };
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileStore {
    fn load(&mut self) -> Result<AppSettings> {
        if !self.path.exists() {
            log::info!("settings: {} not found, using defaults", self.path.display());
            return Ok(AppSettings::default());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let settings = match self.format {
            FileFormat::Toml => toml::from_str(&text)?,
            FileFormat::Json => serde_json::from_str(&text)?,
        };
        Ok(settings)
    }

    fn save(&mut self, settings: &AppSettings) -> Result<()> {
        let text = match self.format {
            FileFormat::Toml => toml::to_string_pretty(settings)?,
            FileFormat::Json => serde_json::to_string_pretty(settings)?,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, text)?;
        log::debug!("settings: saved to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store. Clones share state, so a host (or a test) can keep a handle
/// and inspect what was saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    current: AppSettings,
    saves: Vec<AppSettings>,
    fail_load: Option<String>,
}

impl MemoryStore {
    pub fn new(initial: AppSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState {
                current: initial,
                ..MemoryState::default()
            })),
        }
    }

    /// Every settings object passed to `save`, oldest first.
    pub fn saves(&self) -> Vec<AppSettings> {
        self.inner.lock().saves.clone()
    }

    pub fn fail_load(&self, message: &str) {
        self.inner.lock().fail_load = Some(message.to_string());
    }
}

impl ConfigStore for MemoryStore {
    fn load(&mut self) -> Result<AppSettings> {
        let state = self.inner.lock();
        match &state.fail_load {
            Some(message) => Err(Error::Config(message.clone())),
            None => Ok(state.current.clone()),
        }
    }

    fn save(&mut self, settings: &AppSettings) -> Result<()> {
        let mut state = self.inner.lock();
        state.current = settings.clone();
        state.saves.push(settings.clone());
        Ok(())
    }
}

/// Debounced pass-through to a [`ConfigStore`].
pub struct DebouncedSaver {
    store: Box<dyn ConfigStore>,
    debounce: Debouncer,
}

impl DebouncedSaver {
    pub fn new(store: Box<dyn ConfigStore>) -> Self {
        Self::with_delay(store, SAVE_DEBOUNCE)
    }

    pub fn with_delay(store: Box<dyn ConfigStore>, delay: Duration) -> Self {
        Self {
            store,
            debounce: Debouncer::new(delay),
        }
    }

    pub fn load(&mut self) -> Result<AppSettings> {
        self.store.load()
    }

    /// A bound value changed at `now`; (re)start the quiet period.
    pub fn changed(&mut self, now: Instant) {
        self.debounce.trigger(now);
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Save once the quiet period is over. `current` is only evaluated when saving,
    /// so the stored values are the merged state at that moment.
    pub fn tick(&mut self, now: Instant, current: impl FnOnce() -> AppSettings) -> Result<bool> {
        if !self.debounce.fire_due(now) {
            return Ok(false);
        }
        self.store.save(&current())?;
        Ok(true)
    }

    /// Save immediately if a change is pending.
    pub fn flush(&mut self, current: impl FnOnce() -> AppSettings) -> Result<bool> {
        if !self.debounce.is_pending() {
            return Ok(false);
        }
        self.debounce.cancel();
        self.store.save(&current())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_json_shape_round_trips() {
        let json = r#"{
            "ip": "192.168.0.10", "x": 0, "y": 0, "width": 1920, "height": 1080,
            "fullscreen": true, "frame": false, "kiosk": false, "alwaysOnTop": true,
            "autoHideMenuBar": true, "useDevTools": false,
            "options": { "serialPort": { "path": "/dev/ttyUSB0", "baudRate": 115200 },
                         "midi": { "deviceName": "nanoKONTROL2" } },
            "plugin": { "guiDisplay": true, "useSerialPort": true, "useOsc": false, "useMidi": true }
        }"#;
        let settings: AppSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.options.serial_port.baud_rate, 115200);
        assert_eq!(settings.options.midi.device_name, "nanoKONTROL2");
        assert!(settings.always_on_top && settings.plugin.use_midi);

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["options"]["serialPort"]["path"], "/dev/ttyUSB0");
        assert_eq!(back["autoHideMenuBar"], true);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let settings: AppSettings = toml::from_str("ip = \"10.0.0.2\"\n[plugin]\nuseMidi = true\n").unwrap();
        assert_eq!(settings.ip, "10.0.0.2");
        assert_eq!(settings.options.serial_port, SerialConfig::default());
        assert!(settings.plugin.use_midi && settings.plugin.gui_display);
    }

    #[test]
    fn file_store_toml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["settings.toml", "nested/settings.json"] {
            let mut store = FileStore::new(dir.path().join(name));
            assert_eq!(store.load().unwrap(), AppSettings::default());

            let mut s = AppSettings::default();
            s.options.serial_port.path = "COM4".into();
            s.plugin.use_serial_port = true;
            store.save(&s).unwrap();
            assert_eq!(store.load().unwrap(), s);
        }
        let json = std::fs::read_to_string(dir.path().join("nested/settings.json")).unwrap();
        assert!(json.contains("\"serialPort\""));
    }

    #[test]
    fn rapid_edits_save_once_with_final_values() {
        let store = MemoryStore::new(AppSettings::default());
        let mut saver = DebouncedSaver::new(Box::new(store.clone()));
        let t0 = Instant::now();
        let ms = Duration::from_millis;

        let mut live = AppSettings::default();
        for (i, rate) in [19200u32, 38400, 57600, 115200].into_iter().enumerate() {
            live.options.serial_port.baud_rate = rate;
            let at = t0 + ms(20 * i as u64);
            saver.changed(at);
            assert!(!saver.tick(at, || live.clone()).unwrap());
        }
        assert!(!saver.tick(t0 + ms(150), || live.clone()).unwrap());
        assert!(saver.tick(t0 + ms(160), || live.clone()).unwrap());
        assert!(!saver.tick(t0 + ms(400), || live.clone()).unwrap());

        let saves = store.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].options.serial_port.baud_rate, 115200);
    }

    #[test]
    fn flush_only_when_pending() {
        let store = MemoryStore::default();
        let mut saver = DebouncedSaver::new(Box::new(store.clone()));
        assert!(!saver.flush(AppSettings::default).unwrap());
        saver.changed(Instant::now());
        assert!(saver.flush(AppSettings::default).unwrap());
        assert_eq!(store.saves().len(), 1);
        assert!(!saver.is_pending());
    }
}
