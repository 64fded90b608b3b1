//! The context object tying settings, panels and transports together.
//!
//! A [`Manager`] is built once at startup from a set of [`Backends`] and then driven by
//! the host's event loop: call [`Manager::pump`] every iteration (a few ms apart is
//! plenty) and refresh the UI from [`Manager::snapshot`].
//!
//! `pump` drains every transport queue in order (serial, MIDI, OSC), so lifecycle
//! trackers, forwarders and listeners all run on the caller's thread. It then gives the
//! debounced saver a chance to write the settings.

use crate::binding::PanelLayout;
use crate::error::{Error, Result};
use crate::eventbus::{EventFilter, ListenerId, MessageListener};
use crate::midi::{MidiAccess, MidiMessage, MidiPanel};
use crate::osc::{OscArg, OscChannel, OscMessage, OscSink};
use crate::serial::{SerialBridge, SerialPanel};
use crate::settings::{AppSettings, ConfigStore, DebouncedSaver};
use crate::snapshot::{ChannelSnapshot, Snapshot};
use std::time::Instant;

/// Host hook for the "restart to apply" action (window settings only take effect on
/// a fresh window).
pub trait HostControl: Send {
    fn restart(&mut self, settings: &AppSettings) -> Result<()>;
}

impl<F> HostControl for F
where
    F: FnMut(&AppSettings) -> Result<()> + Send,
{
    fn restart(&mut self, settings: &AppSettings) -> Result<()> {
        self(settings)
    }
}

/// Everything the manager talks to.
pub struct Backends {
    pub serial: Box<dyn SerialBridge>,
    pub midi: Box<dyn MidiAccess>,
    pub osc: Option<Box<dyn OscSink>>,
    pub store: Box<dyn ConfigStore>,
    pub host: Option<Box<dyn HostControl>>,
}

pub struct Manager {
    settings: AppSettings,
    serial: SerialPanel,
    midi: MidiPanel,
    midi_access: Box<dyn MidiAccess>,
    osc: OscChannel,
    saver: DebouncedSaver,
    host: Option<Box<dyn HostControl>>,
}

impl Manager {
    /// Load settings and set up the enabled panels.
    ///
    /// Disabled panels are created (so their layout can report itself hidden) but never
    /// enumerate or connect.
    pub fn setup(backends: Backends) -> Result<Self> {
        let Backends {
            serial,
            midi,
            osc,
            store,
            host,
        } = backends;

        let mut saver = DebouncedSaver::new(store);
        let settings = saver.load()?;
        let plugin = &settings.plugin;

        let mut manager = Self {
            serial: SerialPanel::new(serial, &settings.options.serial_port, plugin.use_serial_port),
            midi: MidiPanel::new(&settings.options.midi, plugin.use_midi),
            midi_access: midi,
            osc: OscChannel::new(osc, plugin.use_osc),
            saver,
            host,
            settings,
        };

        if manager.serial.is_enabled() {
            manager.serial.setup();
        }
        if manager.midi.is_enabled() {
            manager.midi.setup(manager.midi_access.as_mut());
        }
        log::info!(
            "manager: ready (serial: {}, midi: {}, osc: {})",
            manager.serial.is_enabled(),
            manager.midi.is_enabled(),
            manager.osc.is_enabled()
        );
        Ok(manager)
    }

    /// Native backends with settings in the file at `path`.
    #[cfg(all(feature = "serial", feature = "midi"))]
    #[cfg_attr(docsrs, doc(cfg(all(feature = "serial", feature = "midi"))))]
    pub fn discover(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        use crate::backends::{midi::MidirAccess, serial::SerialPortBridge};
        use crate::settings::FileStore;

        Self::setup(Backends {
            serial: Box::new(SerialPortBridge::new()),
            midi: Box::new(MidirAccess::default()),
            osc: None,
            store: Box::new(FileStore::new(path)),
            host: None,
        })
    }

    /// A bound value changed at `now`; schedules a save.
    pub fn on_change(&mut self, now: Instant) {
        self.saver.changed(now);
    }

    pub fn set_serial_path(&mut self, path: &str, now: Instant) {
        if self.serial.set_path(path) {
            self.on_change(now);
        }
    }

    pub fn set_serial_baud_rate(&mut self, baud_rate: u32, now: Instant) {
        if self.serial.set_baud_rate(baud_rate) {
            self.on_change(now);
        }
    }

    /// Switch the MIDI input; an empty name releases the current one.
    pub fn select_midi_device(&mut self, name: &str, now: Instant) -> Result<()> {
        if self.midi.select(name)? {
            self.on_change(now);
        }
        Ok(())
    }

    /// Edit the non-panel settings (window, OSC host, plugin flags).
    ///
    /// Panel configs are owned by the panels and overwrite `options` on merge; use the
    /// panel setters for those.
    pub fn edit_settings(&mut self, now: Instant, edit: impl FnOnce(&mut AppSettings)) {
        edit(&mut self.settings);
        self.on_change(now);
    }

    /// Settings as they would be saved right now.
    pub fn current_settings(&self) -> AppSettings {
        merge(&self.settings, &self.serial, &self.midi)
    }

    /// Re-enumerate MIDI inputs, restoring the selected device if it is still there.
    pub fn refresh_midi(&mut self) {
        if self.midi.is_enabled() {
            self.midi.setup(self.midi_access.as_mut());
        }
    }

    /// Drain all transport queues, then save if the quiet period has passed.
    ///
    /// Returns the number of events handled. A failed save is logged and returned; the
    /// queues have been drained by then.
    pub fn pump(&mut self, now: Instant) -> Result<usize> {
        let mut handled = self.serial.pump();
        handled += self.midi.pump();
        handled += self.osc.pump();

        let (settings, serial, midi) = (&self.settings, &self.serial, &self.midi);
        self.saver
            .tick(now, || merge(settings, serial, midi))
            .inspect_err(|e| log::error!("settings: save failed: {e}"))?;
        Ok(handled)
    }

    /// Write a pending save now.
    pub fn flush(&mut self) -> Result<bool> {
        let (settings, serial, midi) = (&self.settings, &self.serial, &self.midi);
        self.saver.flush(|| merge(settings, serial, midi))
    }

    /// Save pending changes and ask the host to restart with the current settings.
    pub fn restart(&mut self) -> Result<()> {
        self.flush()?;
        let settings = self.current_settings();
        let host = self.host.as_mut().ok_or(Error::NotConnected("host"))?;
        log::info!("manager: restart requested");
        host.restart(&settings)
    }

    pub fn send_osc(&mut self, address: &str, args: Vec<OscArg>) -> Result<()> {
        self.osc.send(address, args)
    }

    pub fn add_serial_listener(
        &mut self,
        listener: impl MessageListener<String> + 'static,
        filter: EventFilter<String>,
    ) -> ListenerId {
        self.serial.add_listener(listener, filter)
    }

    pub fn add_midi_listener(
        &mut self,
        listener: impl MessageListener<MidiMessage> + 'static,
        filter: EventFilter<MidiMessage>,
    ) -> ListenerId {
        self.midi.add_listener(listener, filter)
    }

    pub fn add_osc_listener(
        &mut self,
        listener: impl MessageListener<OscMessage> + 'static,
        filter: EventFilter<OscMessage>,
    ) -> ListenerId {
        self.osc.add_listener(listener, filter)
    }

    pub fn serial(&self) -> &SerialPanel {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut SerialPanel {
        &mut self.serial
    }

    pub fn midi(&self) -> &MidiPanel {
        &self.midi
    }

    pub fn midi_mut(&mut self) -> &mut MidiPanel {
        &mut self.midi
    }

    pub fn osc_mut(&mut self) -> &mut OscChannel {
        &mut self.osc
    }

    pub fn layouts(&self) -> Vec<PanelLayout> {
        vec![self.serial.layout(), self.midi.layout()]
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            serial: ChannelSnapshot::capture(
                self.serial.is_enabled(),
                &self.serial.config().path,
                self.serial.tracker(),
                self.serial.read_value(),
            ),
            midi: ChannelSnapshot::capture(
                self.midi.is_enabled(),
                self.midi.device_name(),
                self.midi.tracker(),
                self.midi.debug(),
            ),
            osc_enabled: self.osc.is_enabled(),
            osc_debug: self.osc.debug().to_string(),
            save_pending: self.saver.is_pending(),
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("settings: final save failed: {e}");
        }
    }
}

fn merge(base: &AppSettings, serial: &SerialPanel, midi: &MidiPanel) -> AppSettings {
    let mut settings = base.clone();
    settings.options.serial_port = serial.config().clone();
    settings.options.midi = midi.config();
    settings
}
