//! OSC channel.
//!
//! Outgoing messages go to an [`OscSink`]; encoding them on the wire is the sink's
//! business. Incoming messages are pushed by whatever receives them (a UDP listener in
//! the host, a test) through [`OscChannel::sender`] and delivered to OSC listeners when
//! the manager pumps the channel.

use crate::error::{Error, Result};
use crate::eventbus::{EventFilter, EventKind, ListenerId, MessageListener};
use crate::forwarder::{DebugRecord, EventForwarder};
use flume::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
    Bool(bool),
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::Int(v) => write!(f, "{v}"),
            OscArg::Float(v) => write!(f, "{v}"),
            OscArg::Str(v) => write!(f, "{v:?}"),
            OscArg::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for OscArg {
    fn from(v: i32) -> Self {
        OscArg::Int(v)
    }
}

impl From<f32> for OscArg {
    fn from(v: f32) -> Self {
        OscArg::Float(v)
    }
}

impl From<&str> for OscArg {
    fn from(v: &str) -> Self {
        OscArg::Str(v.to_string())
    }
}

impl From<bool> for OscArg {
    fn from(v: bool) -> Self {
        OscArg::Bool(v)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    /// Address patterns must start with `/`.
    pub fn new(address: &str, args: Vec<OscArg>) -> Result<Self> {
        if !address.starts_with('/') {
            return Err(Error::Config(format!("invalid OSC address `{address}`")));
        }
        Ok(Self {
            address: address.to_string(),
            args,
        })
    }
}

impl DebugRecord for OscMessage {
    fn debug_text(&self) -> String {
        let mut out = self.address.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.to_string());
        }
        out
    }
}

impl EventKind for OscMessage {}

pub trait OscSink: Send {
    fn send(&mut self, message: &OscMessage) -> Result<()>;
}

pub struct OscChannel {
    enabled: bool,
    sink: Option<Box<dyn OscSink>>,
    inbox_tx: Sender<OscMessage>,
    inbox_rx: Receiver<OscMessage>,
    forwarder: EventForwarder<OscMessage>,
}

impl OscChannel {
    pub fn new(sink: Option<Box<dyn OscSink>>, enabled: bool) -> Self {
        let (inbox_tx, inbox_rx) = flume::unbounded();
        Self {
            enabled,
            sink,
            inbox_tx,
            inbox_rx,
            forwarder: EventForwarder::new(),
        }
    }

    /// Sender for incoming messages; safe to hand to a receiver thread.
    pub fn sender(&self) -> Sender<OscMessage> {
        self.inbox_tx.clone()
    }

    /// Send `address` with `args`. Best-effort: failures are logged and returned.
    pub fn send(&mut self, address: &str, args: Vec<OscArg>) -> Result<()> {
        if !self.enabled {
            log::debug!("osc: disabled, not sending {address}");
            return Ok(());
        }
        let message = OscMessage::new(address, args)?;
        let sink = self.sink.as_mut().ok_or(Error::NotConnected("osc"))?;
        sink.send(&message).inspect_err(|e| {
            log::warn!("osc: send {} failed: {e}", message.address);
        })
    }

    /// Deliver one incoming message now.
    pub fn receive(&mut self, message: &OscMessage) -> usize {
        self.forwarder.forward(message)
    }

    /// Deliver everything queued through [`sender`](Self::sender).
    pub fn pump(&mut self) -> usize {
        let queued: Vec<OscMessage> = self.inbox_rx.try_iter().collect();
        for message in &queued {
            self.forwarder.forward(message);
        }
        queued.len()
    }

    pub fn add_listener(
        &mut self,
        listener: impl MessageListener<OscMessage> + 'static,
        filter: EventFilter<OscMessage>,
    ) -> ListenerId {
        self.forwarder.add_listener(listener, filter)
    }

    pub fn debug(&self) -> &str {
        self.forwarder.debug()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::VirtualOscSink;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn send_goes_to_sink() {
        let sink = VirtualOscSink::default();
        let mut osc = OscChannel::new(Some(Box::new(sink.clone())), true);
        osc.send("/keyboard", vec![65.into()]).unwrap();
        assert!(osc.send("keyboard", vec![]).is_err());

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].address, "/keyboard");
        assert_eq!(sent[0].args, vec![OscArg::Int(65)]);
    }

    #[test]
    fn missing_sink_is_not_connected() {
        let mut osc = OscChannel::new(None, true);
        assert!(matches!(osc.send("/x", vec![]), Err(Error::NotConnected("osc"))));
        let mut off = OscChannel::new(None, false);
        assert!(off.send("/x", vec![]).is_ok());
    }

    #[test]
    fn receive_delivers_immediately() {
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = got.clone();
        let mut osc = OscChannel::new(None, true);
        osc.add_listener(move |m: &OscMessage| sink.lock().push(m.args.clone()), EventFilter::All);

        let msg = OscMessage::new("/mouse", vec![OscArg::Int(3), OscArg::Str("left".into())]).unwrap();
        assert_eq!(osc.receive(&msg), 1);
        assert_eq!(*got.lock(), vec![msg.args.clone()]);
        assert_eq!(osc.debug(), "/mouse 3 \"left\"");
        assert_eq!(osc.pump(), 0);
    }

    #[test]
    fn queued_messages_reach_listeners_on_pump() {
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = got.clone();
        let mut osc = OscChannel::new(None, true);
        osc.add_listener(
            move |m: &OscMessage| sink.lock().push(m.address.clone()),
            EventFilter::Custom(|m| m.address.starts_with("/fader")),
        );

        let tx = osc.sender();
        std::thread::spawn(move || {
            for addr in ["/fader/1", "/button/1", "/fader/2"] {
                tx.send(OscMessage::new(addr, vec![0.5f32.into()]).unwrap()).unwrap();
            }
        })
        .join()
        .unwrap();

        assert_eq!(osc.pump(), 3);
        assert_eq!(*got.lock(), vec!["/fader/1", "/fader/2"]);
        assert_eq!(osc.debug(), "/fader/2 0.5");
    }
}
