//! Messages exchanged between the two peers.
//!
//! Every frame on the wire is one JSON object terminated by `\n`, tagged by a
//! `type` field and carrying the sender's sequence number in `seq`.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::common::{Coord, ShotResult};

pub mod codec;

/// Byte that terminates each frame.
pub const FRAME_TERMINATOR: u8 = b'\n';

/// Connection role of a peer. Exactly one of each per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    /// The role the peer must hold for the pairing to be valid.
    pub fn complement(self) -> Role {
        match self {
            Role::Master => Role::Slave,
            Role::Slave => Role::Master,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => f.write_str("MASTER"),
            Role::Slave => f.write_str("SLAVE"),
        }
    }
}

/// Game protocol messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Announce the sender's chosen role.
    RoleAnnouncement { role: Role },
    /// Liveness handshake when roles are fixed a priori.
    Hello,
    /// Sender finished placing its fleet.
    ShipsPlaced,
    /// Sender is ready for first-turn arbitration.
    ReadyToStart,
    /// Fire at the receiver's board.
    Shot { coord: Coord },
    /// Outcome of a previously received shot.
    ShotResult { coord: Coord, result: ShotResult },
    /// Sender is leaving the session.
    Disconnect,
}

impl Message {
    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::RoleAnnouncement { .. } => "ROLE_ANNOUNCEMENT",
            Message::Hello => "HELLO",
            Message::ShipsPlaced => "SHIPS_PLACED",
            Message::ReadyToStart => "READY_TO_START",
            Message::Shot { .. } => "SHOT",
            Message::ShotResult { .. } => "SHOT_RESULT",
            Message::Disconnect => "DISCONNECT",
        }
    }
}

/// A message together with the sequence number it was sent under.
///
/// Sequence numbers are advisory; nothing rejects gaps or reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: Message,
    pub seq: u64,
}
