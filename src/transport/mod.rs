//! Line-oriented duplex link between the two peers.
//!
//! A [`Transport`] is polled from the single-threaded session loop: `send`
//! enqueues and returns at once, `try_receive` never blocks. Delivery is
//! best-effort and FIFO per sender.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::protocol::{Envelope, Message};

pub mod in_memory;
pub mod link;

/// Connection status shared by the link tasks and the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Which side of the connection this peer took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    None,
    /// Accepted the connection.
    Server,
    /// Initiated the connection.
    Client,
}

/// Out-of-band notifications that preempt normal message flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// An established connection failed or was closed by the peer.
    Lost,
    /// The peer sent `DISCONNECT`.
    PeerDisconnected,
}

pub trait Transport {
    /// Start a fresh connection attempt, discarding any previous one.
    fn open(&mut self);

    /// Tear the connection down. Frames already queued are flushed best-effort.
    fn close(&mut self);

    /// Queue `message` for delivery. Returns the sequence number it was sent
    /// under, or `None` when the link is down and the message was dropped.
    fn send(&mut self, message: Message) -> Option<u64>;

    /// Next buffered message, if any.
    fn try_receive(&mut self) -> Option<Envelope>;

    fn status(&self) -> LinkStatus;

    fn mode(&self) -> LinkMode;

    /// Take the pending out-of-band event. `PeerDisconnected` wins over `Lost`.
    fn take_event(&mut self) -> Option<LinkEvent>;
}

/// Flags raced on by the reader, writer and session loop.
#[derive(Debug)]
pub(crate) struct SharedStatus {
    status: AtomicU8,
    mode: AtomicU8,
    lost: AtomicBool,
    peer_quit: AtomicBool,
}

impl SharedStatus {
    pub(crate) fn new() -> Self {
        Self {
            status: AtomicU8::new(0),
            mode: AtomicU8::new(0),
            lost: AtomicBool::new(false),
            peer_quit: AtomicBool::new(false),
        }
    }

    pub(crate) fn status(&self) -> LinkStatus {
        match self.status.load(Ordering::SeqCst) {
            2 => LinkStatus::Connected,
            1 => LinkStatus::Connecting,
            _ => LinkStatus::Disconnected,
        }
    }

    pub(crate) fn set_status(&self, status: LinkStatus) {
        let raw = match status {
            LinkStatus::Disconnected => 0,
            LinkStatus::Connecting => 1,
            LinkStatus::Connected => 2,
        };
        self.status.store(raw, Ordering::SeqCst);
    }

    pub(crate) fn mode(&self) -> LinkMode {
        match self.mode.load(Ordering::SeqCst) {
            1 => LinkMode::Server,
            2 => LinkMode::Client,
            _ => LinkMode::None,
        }
    }

    pub(crate) fn set_mode(&self, mode: LinkMode) {
        let raw = match mode {
            LinkMode::None => 0,
            LinkMode::Server => 1,
            LinkMode::Client => 2,
        };
        self.mode.store(raw, Ordering::SeqCst);
    }

    pub(crate) fn mark_lost(&self) {
        self.lost.store(true, Ordering::SeqCst);
    }

    pub(crate) fn mark_peer_quit(&self) {
        self.peer_quit.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_event(&self) -> Option<LinkEvent> {
        if self.peer_quit.swap(false, Ordering::SeqCst) {
            self.lost.store(false, Ordering::SeqCst);
            Some(LinkEvent::PeerDisconnected)
        } else if self.lost.swap(false, Ordering::SeqCst) {
            Some(LinkEvent::Lost)
        } else {
            None
        }
    }
}
