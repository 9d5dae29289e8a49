use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, trace};

use crate::config::MAX_FRAME_LEN;
use crate::protocol::codec::{Codec, FrameBuffer};
use crate::protocol::{Envelope, Message};
use crate::transport::{LinkEvent, LinkMode, LinkStatus, Transport};

#[derive(Debug, Default)]
struct Side {
    opened: bool,
    /// The connection this end was part of is gone; only `open` revives it.
    dead: bool,
    lost: bool,
    peer_quit: bool,
    inbound: VecDeque<Envelope>,
}

impl Side {
    fn reset(&mut self) {
        self.dead = false;
        self.lost = false;
        self.peer_quit = false;
        self.inbound.clear();
    }

    fn deliver(&mut self, frames: &mut FrameBuffer, bytes: &[u8]) {
        for frame in frames.push(bytes) {
            match frame.and_then(|f| Codec::decode(&f)) {
                Ok(env) if env.message == Message::Disconnect => {
                    self.dead = true;
                    self.peer_quit = true;
                }
                Ok(env) => self.inbound.push_back(env),
                Err(e) => debug!("loopback: discarding frame: {}", e),
            }
        }
    }
}

#[derive(Debug, Default)]
struct Wire {
    sides: [Side; 2],
}

impl Wire {
    fn connected(&self) -> bool {
        self.sides.iter().all(|s| s.opened && !s.dead)
    }
}

/// One end of a synchronous in-process link. Frames still pass through the
/// codec, so garbage injected with [`LoopbackTransport::inject`] is handled
/// exactly as a socket peer's would be.
#[derive(Debug)]
pub struct LoopbackTransport {
    wire: Arc<Mutex<Wire>>,
    me: usize,
    codec: Codec,
    frames: FrameBuffer,
}

impl LoopbackTransport {
    /// Two linked ends. The first reports `Server` mode, the second `Client`.
    pub fn pair() -> (Self, Self) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        (Self::end(wire.clone(), 0), Self::end(wire, 1))
    }

    fn end(wire: Arc<Mutex<Wire>>, me: usize) -> Self {
        Self {
            wire,
            me,
            codec: Codec::new(),
            frames: FrameBuffer::new(MAX_FRAME_LEN),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Wire> {
        self.wire.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Feed raw bytes to this end as if the peer had written them.
    pub fn inject(&mut self, bytes: &[u8]) {
        let wire = self.wire.clone();
        let mut wire = wire.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        wire.sides[self.me].deliver(&mut self.frames, bytes);
    }

    /// Messages waiting at this end.
    pub fn queued(&self) -> usize {
        self.lock().sides[self.me].inbound.len()
    }

    /// Sequence number the next frame from this end will carry.
    pub fn next_seq(&self) -> u64 {
        self.codec.peek_seq()
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self) {
        let me = self.me;
        let mut wire = self.lock();
        wire.sides[me].opened = true;
        wire.sides[me].reset();
        drop(wire);
        self.frames = FrameBuffer::new(MAX_FRAME_LEN);
    }

    fn close(&mut self) {
        let me = self.me;
        let mut wire = self.lock();
        if !wire.sides[me].opened {
            return;
        }
        if wire.connected() {
            wire.sides[1 - me].dead = true;
            wire.sides[1 - me].lost = true;
        }
        wire.sides[me].opened = false;
        wire.sides[me].reset();
    }

    fn send(&mut self, message: Message) -> Option<u64> {
        let me = self.me;
        let wire = self.wire.clone();
        let mut wire = wire.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !wire.connected() {
            debug!("loopback down; dropping {}", message.kind());
            return None;
        }
        let (seq, frame) = match self.codec.encode(message) {
            Ok(encoded) => encoded,
            Err(e) => {
                debug!("loopback: {}", e);
                return None;
            }
        };
        trace!("loopback {} -> {}", me, frame.trim_end());
        // A fresh buffer per frame: the sender never splits frames itself.
        let mut frames = FrameBuffer::new(MAX_FRAME_LEN);
        wire.sides[1 - me].deliver(&mut frames, frame.as_bytes());
        Some(seq)
    }

    fn try_receive(&mut self) -> Option<Envelope> {
        let me = self.me;
        self.lock().sides[me].inbound.pop_front()
    }

    fn status(&self) -> LinkStatus {
        let wire = self.lock();
        if !wire.sides[self.me].opened {
            LinkStatus::Disconnected
        } else if wire.connected() {
            LinkStatus::Connected
        } else {
            LinkStatus::Connecting
        }
    }

    fn mode(&self) -> LinkMode {
        match (self.status(), self.me) {
            (LinkStatus::Connected, 0) => LinkMode::Server,
            (LinkStatus::Connected, _) => LinkMode::Client,
            _ => LinkMode::None,
        }
    }

    fn take_event(&mut self) -> Option<LinkEvent> {
        let me = self.me;
        let mut wire = self.lock();
        let side = &mut wire.sides[me];
        if side.peer_quit {
            side.peer_quit = false;
            side.lost = false;
            Some(LinkEvent::PeerDisconnected)
        } else if side.lost {
            side.lost = false;
            Some(LinkEvent::Lost)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Coord;

    #[test]
    fn connected_only_when_both_open() {
        let (mut a, mut b) = LoopbackTransport::pair();
        assert_eq!(a.status(), LinkStatus::Disconnected);
        a.open();
        assert_eq!(a.status(), LinkStatus::Connecting);
        assert_eq!(a.send(Message::Hello), None);
        b.open();
        assert_eq!(a.status(), LinkStatus::Connected);
        assert_eq!(a.mode(), LinkMode::Server);
        assert_eq!(b.mode(), LinkMode::Client);
    }

    #[test]
    fn delivers_in_order_with_sequence_numbers() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.open();
        b.open();
        assert_eq!(a.send(Message::Hello), Some(0));
        assert_eq!(
            a.send(Message::Shot {
                coord: Coord::new(1, 1)
            }),
            Some(1)
        );
        assert_eq!(b.try_receive().map(|e| e.message), Some(Message::Hello));
        let env = b.try_receive().unwrap();
        assert_eq!(env.seq, 1);
        assert!(b.try_receive().is_none());
    }

    #[test]
    fn disconnect_becomes_event() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.open();
        b.open();
        a.send(Message::Disconnect);
        assert_eq!(b.queued(), 0);
        assert_eq!(b.take_event(), Some(LinkEvent::PeerDisconnected));
        assert_eq!(b.take_event(), None);
    }

    #[test]
    fn close_marks_peer_lost() {
        let (mut a, mut b) = LoopbackTransport::pair();
        a.open();
        b.open();
        a.close();
        assert_eq!(b.take_event(), Some(LinkEvent::Lost));
        assert_eq!(b.status(), LinkStatus::Connecting);
        // The surviving side's reopen brings the link back once the peer returns.
        b.open();
        a.open();
        assert_eq!(b.status(), LinkStatus::Connected);
    }

    #[test]
    fn injected_garbage_is_discarded() {
        let (mut a, _b) = LoopbackTransport::pair();
        a.open();
        a.inject(b"not json\n{\"type\":\"HELLO\"}\n{\"type\":\"HEL");
        assert_eq!(a.queued(), 0);
        a.inject(b"LO\",\"seq\":4}\n");
        assert_eq!(a.try_receive().map(|e| e.seq), Some(4));
    }
}
