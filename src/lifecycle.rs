//! Connection lifecycle tracking.
//!
//! [`LifecycleTracker`] mirrors an external device's open/closed/error state for one
//! panel. It never polls: the transport reports [`LifecycleEvent`]s, the manager's loop
//! hands them to [`LifecycleTracker::handle`], and the tracker updates its status and
//! the visibility of the panel sections that only make sense while connected
//! (debug write/read areas).
//!
//! ## State machine
//! - `Closed → Open` on [`LifecycleEvent::Opened`]
//! - `Open → Closed` on [`LifecycleEvent::Closed`]
//! - `any → Error` on [`LifecycleEvent::Error`]
//! - `Error → Closed` only when the user explicitly retries a connect
//!
//! Connect/disconnect requests are guarded by the current status. A guarded-out request
//! is a no-op, not an error, and issues nothing to the transport.
//!
//! An error event is a recoverable transition: it is logged, recorded, and reported to
//! observers; the process and the event loop keep running.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection status of one tracked device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Closed,
    Open,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Error => "error",
        })
    }
}

/// Lifecycle notification pushed by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Opened,
    Closed,
    Error(String),
}

impl LifecycleEvent {
    /// Status the tracker must be in after this event.
    pub fn implied_status(&self) -> ConnectionStatus {
        match self {
            LifecycleEvent::Opened => ConnectionStatus::Open,
            LifecycleEvent::Closed => ConnectionStatus::Closed,
            LifecycleEvent::Error(_) => ConnectionStatus::Error,
        }
    }
}

/// Typed observer for status changes.
pub trait LifecycleObserver: Send {
    fn on_status(&mut self, status: ConnectionStatus, error: Option<&str>);
}

impl<F> LifecycleObserver for F
where
    F: FnMut(ConnectionStatus, Option<&str>) + Send,
{
    fn on_status(&mut self, status: ConnectionStatus, error: Option<&str>) {
        self(status, error)
    }
}

pub struct LifecycleTracker {
    label: &'static str,
    status: ConnectionStatus,
    sections_hidden: bool,
    last_error: Option<String>,
    observers: Vec<Box<dyn LifecycleObserver>>,
}

impl LifecycleTracker {
    /// `label` names the channel in logs (`"serial"`, `"midi"`).
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            status: ConnectionStatus::Closed,
            sections_hidden: true,
            last_error: None,
            observers: Vec::new(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == ConnectionStatus::Open
    }

    /// Whether sections gated on an open connection are hidden.
    pub fn sections_hidden(&self) -> bool {
        self.sections_hidden
    }

    /// Message of the most recent error event, until the next successful open or retry.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Title for the connect toggle button.
    pub fn button_title(&self) -> &'static str {
        if self.is_open() {
            "Disconnect"
        } else {
            "Connect"
        }
    }

    pub fn add_observer(&mut self, observer: impl LifecycleObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Issue a connect request if the status allows it.
    ///
    /// Valid from `Closed` and `Error`; from `Error` the tracker first resets to `Closed`.
    /// Returns `Ok(false)` when already open (nothing is issued). The status does not
    /// become `Open` here, only when the transport reports [`LifecycleEvent::Opened`].
    ///
    /// If `issue` itself fails the tracker moves to `Error` and the failure is returned.
    /// That is the only way a request changes the status directly.
    pub fn request_connect(&mut self, issue: impl FnOnce() -> Result<()>) -> Result<bool> {
        match self.status {
            ConnectionStatus::Open => {
                log::debug!("{}: connect ignored, already open", self.label);
                return Ok(false);
            }
            ConnectionStatus::Error => self.apply(ConnectionStatus::Closed, None),
            ConnectionStatus::Closed => {}
        }

        log::info!("{}: connect requested", self.label);
        if let Err(e) = issue() {
            self.handle(&LifecycleEvent::Error(e.to_string()));
            return Err(e);
        }
        Ok(true)
    }

    /// Issue a disconnect request if currently open. Returns `Ok(false)` otherwise.
    pub fn request_disconnect(&mut self, issue: impl FnOnce() -> Result<()>) -> Result<bool> {
        if !self.is_open() {
            log::debug!("{}: disconnect ignored, status is {}", self.label, self.status);
            return Ok(false);
        }

        log::info!("{}: disconnect requested", self.label);
        if let Err(e) = issue() {
            self.handle(&LifecycleEvent::Error(e.to_string()));
            return Err(e);
        }
        Ok(true)
    }

    /// Apply one lifecycle event. Events are applied in the order received, duplicates included.
    pub fn handle(&mut self, event: &LifecycleEvent) -> ConnectionStatus {
        match event {
            LifecycleEvent::Opened => {
                log::info!("{}: opened", self.label);
                self.apply(ConnectionStatus::Open, None);
            }
            LifecycleEvent::Closed => {
                log::info!("{}: closed", self.label);
                self.apply(ConnectionStatus::Closed, None);
            }
            LifecycleEvent::Error(message) => {
                log::error!("{} error: {message}", self.label);
                self.apply(ConnectionStatus::Error, Some(message.clone()));
            }
        }
        self.status
    }

    fn apply(&mut self, status: ConnectionStatus, error: Option<String>) {
        self.status = status;
        self.sections_hidden = status != ConnectionStatus::Open;
        self.last_error = error;

        let error = self.last_error.as_deref();
        for observer in self.observers.iter_mut() {
            observer.on_status(status, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn ok() -> Result<()> {
        Ok(())
    }

    #[test]
    fn status_follows_last_event() {
        use LifecycleEvent as Ev;

        let alphabet = [Ev::Opened, Ev::Closed, Ev::Error("unplugged".into())];
        let mut sequences: Vec<Vec<LifecycleEvent>> = vec![Vec::new()];
        let mut all = Vec::new();
        for _ in 0..4 {
            sequences = sequences
                .iter()
                .flat_map(|prefix| {
                    alphabet.iter().map(move |ev| {
                        let mut seq = prefix.clone();
                        seq.push(ev.clone());
                        seq
                    })
                })
                .collect();
            all.extend(sequences.iter().cloned());
        }
        assert_eq!(all.len(), 3 + 9 + 27 + 81);

        for seq in all {
            let mut tracker = LifecycleTracker::new("test");
            for event in &seq {
                tracker.handle(event);
            }
            let last = seq.last().expect("non-empty");
            assert_eq!(tracker.status(), last.implied_status(), "sequence {seq:?}");
            assert_eq!(tracker.sections_hidden(), tracker.status() != ConnectionStatus::Open);
        }
    }

    #[test]
    fn connect_while_open_issues_nothing() {
        let mut tracker = LifecycleTracker::new("test");
        let mut issued = 0;

        assert!(tracker.request_connect(|| {
            issued += 1;
            ok()
        })
        .unwrap());
        // Requesting does not open.
        assert_eq!(tracker.status(), ConnectionStatus::Closed);

        tracker.handle(&LifecycleEvent::Opened);
        for _ in 0..3 {
            assert!(!tracker
                .request_connect(|| {
                    issued += 1;
                    ok()
                })
                .unwrap());
        }
        assert_eq!(issued, 1);
        assert_eq!(tracker.button_title(), "Disconnect");
    }

    #[test]
    fn disconnect_only_when_open() {
        let mut tracker = LifecycleTracker::new("test");
        let mut issued = 0;
        assert!(!tracker
            .request_disconnect(|| {
                issued += 1;
                ok()
            })
            .unwrap());

        tracker.handle(&LifecycleEvent::Opened);
        assert!(tracker
            .request_disconnect(|| {
                issued += 1;
                ok()
            })
            .unwrap());
        assert_eq!(issued, 1);
        // Still open until the transport confirms.
        assert!(tracker.is_open());
    }

    #[test]
    fn error_is_recoverable_and_retry_resets() {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();

        let mut tracker = LifecycleTracker::new("test");
        tracker.add_observer(move |s: ConnectionStatus, e: Option<&str>| {
            sink.lock().push((s, e.map(str::to_string)));
        });

        tracker.handle(&LifecycleEvent::Opened);
        tracker.handle(&LifecycleEvent::Error("device vanished".into()));
        assert_eq!(tracker.status(), ConnectionStatus::Error);
        assert!(tracker.sections_hidden());
        assert_eq!(tracker.last_error(), Some("device vanished"));

        assert!(tracker.request_connect(ok).unwrap());
        assert_eq!(tracker.status(), ConnectionStatus::Closed);
        assert_eq!(tracker.last_error(), None);

        assert_eq!(
            *changes.lock(),
            vec![
                (ConnectionStatus::Open, None),
                (ConnectionStatus::Error, Some("device vanished".to_string())),
                (ConnectionStatus::Closed, None),
            ]
        );
    }

    #[test]
    fn failed_issue_moves_to_error() {
        let mut tracker = LifecycleTracker::new("test");
        let err = tracker
            .request_connect(|| Err(Error::Serial("permission denied".into())))
            .unwrap_err();
        assert!(matches!(err, Error::Serial(_)));
        assert_eq!(tracker.status(), ConnectionStatus::Error);
        assert!(tracker.last_error().unwrap().contains("permission denied"));
    }
}
