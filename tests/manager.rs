use parking_lot::Mutex;
use sketchbridge::backends::virtual_input::{VirtualMidiAccess, VirtualOscSink, VirtualSerial};
use sketchbridge::settings::SAVE_DEBOUNCE;
use sketchbridge::{
    AppSettings, Backends, ConfigStore, ConnectionStatus, EventFilter, FileStore, FilteredListener,
    Manager, MidiMessage, OscArg, OscMessage, SerialEvent,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn enabled_settings() -> AppSettings {
    let mut s = AppSettings::default();
    s.plugin.use_serial_port = true;
    s.plugin.use_midi = true;
    s.plugin.use_osc = true;
    s.options.serial_port.path = "/dev/ttyACM0".into();
    s.options.midi.device_name = "nanoKONTROL2".into();
    s
}

#[test]
fn full_session_against_virtual_backends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    FileStore::new(&path).save(&enabled_settings()).unwrap();

    let (serial, serial_dev) = VirtualSerial::new(&["/dev/ttyACM0"]);
    let access = VirtualMidiAccess::new(&["nanoKONTROL2", "Launchpad"]);
    let knobs = access.handle("nanoKONTROL2").unwrap();
    let pads = access.handle("Launchpad").unwrap();
    let osc_out = VirtualOscSink::default();

    let mut mgr = Manager::setup(Backends {
        serial: Box::new(serial),
        midi: Box::new(access),
        osc: Some(Box::new(osc_out.clone())),
        store: Box::new(FileStore::new(&path)),
        host: None,
    })
    .unwrap();

    // Saved MIDI device is restored on setup.
    assert_eq!(mgr.snapshot().midi.status, ConnectionStatus::Open);

    let order = Arc::new(Mutex::new(Vec::new()));
    let first = order.clone();
    let second = order.clone();
    mgr.add_midi_listener(
        move |m: &MidiMessage| first.lock().push(("all", m.note)),
        EventFilter::All,
    );
    mgr.add_midi_listener(
        FilteredListener::new(
            |m: &MidiMessage| m.is_control_change(),
            move |m: &MidiMessage| second.lock().push(("cc", m.note)),
        ),
        EventFilter::All,
    );

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let seen = statuses.clone();
    mgr.serial_mut()
        .tracker_mut()
        .add_observer(move |s: ConnectionStatus, _: Option<&str>| seen.lock().push(s));

    let t0 = Instant::now();
    mgr.serial_mut().toggle().unwrap();
    knobs.send(&[0xB0, 16, 64]);
    knobs.send(&[0x90, 36, 100]);
    mgr.pump(t0).unwrap();

    assert_eq!(
        *order.lock(),
        vec![("all", 16), ("cc", 16), ("all", 36)]
    );
    assert!(mgr.snapshot().midi.debug.contains("note: 36"));
    assert_eq!(*statuses.lock(), vec![ConnectionStatus::Open]);

    serial_dev.push(SerialEvent::Data("512".into()));
    mgr.pump(t0).unwrap();
    assert_eq!(mgr.snapshot().serial.debug, "512");

    mgr.serial_mut().set_write_value("led:1");
    mgr.serial_mut().write().unwrap();
    assert_eq!(serial_dev.writes(), vec!["led:1"]);

    // Switching devices drops what the old one sends afterwards.
    mgr.select_midi_device("Launchpad", t0).unwrap();
    knobs.send(&[0xB0, 17, 1]);
    pads.send(&[0x90, 40, 1]);
    mgr.pump(t0 + Duration::from_millis(10)).unwrap();
    assert_eq!(order.lock().last(), Some(&("all", 40)));
    assert!(!order.lock().contains(&("cc", 17)));

    mgr.send_osc("/sketch/fader", vec![OscArg::Float(0.25)]).unwrap();
    assert_eq!(osc_out.sent()[0].address, "/sketch/fader");

    let inbox = mgr.osc_mut().sender();
    inbox
        .send(OscMessage::new("/sketch/reset", vec![true.into()]).unwrap())
        .unwrap();
    mgr.pump(t0 + Duration::from_millis(20)).unwrap();
    assert_eq!(mgr.snapshot().osc_debug, "/sketch/reset true");

    // Nothing written until the quiet period is over.
    assert_eq!(
        FileStore::new(&path).load().unwrap().options.midi.device_name,
        "nanoKONTROL2"
    );
    mgr.pump(t0 + SAVE_DEBOUNCE).unwrap();
    let saved = FileStore::new(&path).load().unwrap();
    assert_eq!(saved.options.midi.device_name, "Launchpad");
    assert_eq!(saved.options.serial_port.path, "/dev/ttyACM0");
}

#[test]
fn first_run_uses_defaults_and_hides_panels() {
    let dir = tempfile::tempdir().unwrap();
    let (serial, _dev) = VirtualSerial::new(&[]);
    let mgr = Manager::setup(Backends {
        serial: Box::new(serial),
        midi: Box::new(VirtualMidiAccess::new(&[])),
        osc: None,
        store: Box::new(FileStore::new(dir.path().join("settings.toml"))),
        host: None,
    })
    .unwrap();

    assert_eq!(mgr.current_settings(), AppSettings::default());
    let snap = mgr.snapshot();
    assert!(!snap.serial.enabled && !snap.midi.enabled);
    assert!(snap.serial.sections_hidden);
    let json = snap.to_json().unwrap();
    assert!(json.contains("\"sectionsHidden\": true"));
    assert!(json.contains("\"status\": \"closed\""));
}
