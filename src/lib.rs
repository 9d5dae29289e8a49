pub mod arbitration;
pub mod autopilot;
mod bitboard;
pub mod board;
mod common;
pub mod config;
mod logging;
pub mod protocol;
pub mod session;
mod ship;
pub mod transport;
pub mod ui;

pub use arbitration::{
    identity_role, moves_first, parse_hw_address, role_for_side, Arbiter, ArbitrationError,
    HandshakeArbiter, Identity, IdentityArbiter,
};
pub use autopilot::Autopilot;
pub use bitboard::{BitBoard, BitBoardError};
pub use board::{Board, ShotRecord};
pub use common::*;
pub use config::{AppConfig, LinkConfig, SessionConfig, DEFAULT_SHIPS, GRID_SIZE};
pub use logging::{init_logging, parse_level, LOG_ENV};
pub use protocol::codec::{Codec, CodecError, FrameBuffer};
pub use protocol::{Envelope, Message, Role};
pub use session::{Input, Notice, Outcome, ResetReason, Session, SessionSnapshot, TurnState};
pub use ship::{ship_cells, Mask, Ship, ShipPart};
pub use transport::in_memory::LoopbackTransport;
pub use transport::link::{Conduit, Connector, Link, TcpAcceptor, TcpInitiator};
pub use transport::{LinkEvent, LinkMode, LinkStatus, Transport};
