//! Simulated push channel.
//!
//! [`SimPush`] is the subscription handed to the runtime. [`PushControl`] is
//! the server side: it publishes events and flips connectivity. Events
//! published while the link is down are lost, the way a real socket drops
//! them, and the client has to catch up through polling or the reconnect
//! fetch.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use carelink_app::{PushChannel, PushSignal};
use carelink_proto::PushEvent;
use tokio::sync::mpsc;

/// Create a linked subscription and control pair.
pub fn channel(connected: bool) -> (SimPush, PushControl) {
    let (tx, rx) = mpsc::unbounded_channel();
    let link = Arc::new(Link {
        sender: Mutex::new(Some(tx)),
        connected: AtomicBool::new(connected),
        dropped: AtomicU64::new(0),
    });

    let push = SimPush { signals: rx, link: Arc::clone(&link) };
    (push, PushControl { link })
}

struct Link {
    sender: Mutex<Option<mpsc::UnboundedSender<PushSignal>>>,
    connected: AtomicBool,
    dropped: AtomicU64,
}

impl Link {
    fn send(&self, signal: PushSignal) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        sender.as_ref().is_some_and(|tx| tx.send(signal).is_ok())
    }
}

/// Push subscription consumed by the runtime.
pub struct SimPush {
    signals: mpsc::UnboundedReceiver<PushSignal>,
    link: Arc<Link>,
}

impl PushChannel for SimPush {
    fn next_signal(&mut self) -> impl Future<Output = Option<PushSignal>> + Send {
        self.signals.recv()
    }

    fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }
}

/// Server side of a [`SimPush`].
#[derive(Clone)]
pub struct PushControl {
    link: Arc<Link>,
}

impl PushControl {
    /// Whether the link is up.
    pub fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    /// Bring the link up for the first time.
    pub fn connect(&self) {
        if !self.link.connected.swap(true, Ordering::SeqCst) {
            self.link.send(PushSignal::Connected);
        }
    }

    /// Drop the link. The transport keeps retrying.
    pub fn disconnect(&self) {
        if self.link.connected.swap(false, Ordering::SeqCst) {
            self.link.send(PushSignal::Disconnected);
        }
    }

    /// Restore a dropped link.
    pub fn reconnect(&self) {
        if !self.link.connected.swap(true, Ordering::SeqCst) {
            self.link.send(PushSignal::Reconnected);
        }
    }

    /// Deliver an event. Returns `false` if it was lost to a down link.
    pub fn publish(&self, event: PushEvent) -> bool {
        if !self.is_connected() {
            self.link.dropped.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(kind = event.kind(), "push event lost, link down");
            return false;
        }
        self.link.send(PushSignal::Event(event))
    }

    /// Deliver a raw text frame, bypassing connectivity.
    pub fn publish_frame(&self, frame: impl Into<String>) -> bool {
        self.link.send(PushSignal::Frame(frame.into()))
    }

    /// Close the channel for good.
    pub fn close(&self) {
        self.link.connected.store(false, Ordering::SeqCst);
        self.link.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Events lost while the link was down.
    pub fn dropped(&self) -> u64 {
        self.link.dropped.load(Ordering::SeqCst)
    }
}
