use sketchbridge::backends::probe_devices;
use sketchbridge::{EventFilter, LogListener, Manager};
use std::time::{Duration, Instant};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "sketchbridge.toml".into());

    println!("Devices:");
    for d in probe_devices() {
        println!("- {d}");
    }

    let mut mgr = Manager::discover(&path).expect("load settings");
    mgr.add_serial_listener(LogListener::new("serial"), EventFilter::All);
    mgr.add_midi_listener(LogListener::new("midi"), EventFilter::All);
    mgr.add_osc_listener(LogListener::new("osc"), EventFilter::All);

    if mgr.serial().is_enabled() {
        if let Err(e) = mgr.serial_mut().connect() {
            eprintln!("serial connect failed: {e}");
        }
    }

    let mut last = mgr.snapshot();
    loop {
        if let Err(e) = mgr.pump(Instant::now()) {
            eprintln!("pump: {e}");
        }
        let snap = mgr.snapshot();
        if snap.serial.status != last.serial.status || snap.midi.status != last.midi.status {
            println!("serial: {} / midi: {}", snap.serial.status, snap.midi.status);
        }
        last = snap;
        // Sleep a touch to avoid pegging the CPU in the demo
        std::thread::sleep(Duration::from_millis(5));
    }
}
