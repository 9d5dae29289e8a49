//! Role and first-turn arbitration.
//!
//! Two strategies decide which peer is MASTER: an explicit exchange of
//! `ROLE_ANNOUNCEMENT`s that must be complementary, or a role fixed ahead of
//! time from a hardware address followed by a `HELLO` liveness exchange.
//! First move always goes to MASTER.

use core::fmt;

use crate::protocol::{Message, Role};
use crate::transport::LinkMode;

/// Reasons a connection attempt fails arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrationError {
    /// Both peers claimed the same role.
    RoleConflict { local: Role, remote: Role },
    /// The peer never answered the opening message.
    Timeout,
}

impl fmt::Display for ArbitrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArbitrationError::RoleConflict { local, remote } => {
                write!(f, "Role conflict: local {} vs opponent {}", local, remote)
            }
            ArbitrationError::Timeout => write!(f, "Handshake timed out"),
        }
    }
}

impl std::error::Error for ArbitrationError {}

/// Strategy that confirms the local role once the link is up.
pub trait Arbiter: Send {
    /// The message sent once when the link comes up.
    fn opening(&self) -> Message;

    /// Feed a message received while connecting. `None` means keep waiting.
    fn on_message(&mut self, message: &Message) -> Option<Result<Role, ArbitrationError>>;

    /// Whether a silent peer should fail the attempt after the handshake timeout.
    fn times_out(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Each side announces its role; the pair is valid only if complementary.
#[derive(Debug, Clone)]
pub struct HandshakeArbiter {
    local: Role,
}

impl HandshakeArbiter {
    pub fn new(local: Role) -> Self {
        Self { local }
    }
}

impl Arbiter for HandshakeArbiter {
    fn opening(&self) -> Message {
        Message::RoleAnnouncement { role: self.local }
    }

    fn on_message(&mut self, message: &Message) -> Option<Result<Role, ArbitrationError>> {
        match message {
            Message::RoleAnnouncement { role } if *role == self.local.complement() => {
                Some(Ok(self.local))
            }
            Message::RoleAnnouncement { role } => Some(Err(ArbitrationError::RoleConflict {
                local: self.local,
                remote: *role,
            })),
            _ => None,
        }
    }

    fn times_out(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "handshake"
    }
}

/// Role fixed a priori; only liveness is confirmed with `HELLO`.
///
/// `HELLO` carries no role, so the role comes from the device identity or
/// the link side, both of which differ between the two ends.
#[derive(Debug, Clone)]
pub struct IdentityArbiter {
    local: Role,
}

impl IdentityArbiter {
    /// The accepting side is MASTER, the initiating side SLAVE.
    pub fn for_side(mode: LinkMode) -> Self {
        Self {
            local: role_for_side(mode),
        }
    }

    pub fn role(&self) -> Role {
        self.local
    }
}

impl From<&Identity> for IdentityArbiter {
    fn from(identity: &Identity) -> Self {
        Self {
            local: identity.role,
        }
    }
}

/// Role implied by a link side. An unset side falls back to MASTER, the same
/// fallback [`identity_role`] uses.
pub fn role_for_side(mode: LinkMode) -> Role {
    match mode {
        LinkMode::Client => Role::Slave,
        LinkMode::Server | LinkMode::None => Role::Master,
    }
}

impl Arbiter for IdentityArbiter {
    fn opening(&self) -> Message {
        Message::Hello
    }

    fn on_message(&mut self, message: &Message) -> Option<Result<Role, ArbitrationError>> {
        match message {
            Message::Hello => Some(Ok(self.local)),
            _ => None,
        }
    }

    fn times_out(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Whether `role` takes the first shot.
pub fn moves_first(role: Role) -> bool {
    role == Role::Master
}

/// Role, link side and connection target derived from a device address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub role: Role,
    pub mode: LinkMode,
    /// Address to initiate toward when `mode` is `Client`.
    pub target: Option<String>,
}

/// Normalize a `XX:XX:XX:XX:XX:XX` hardware address to upper case, or `None`
/// when it is not one.
pub fn parse_hw_address(addr: &str) -> Option<String> {
    let addr = addr.trim();
    let octets: Vec<&str> = addr.split(':').collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    well_formed.then(|| addr.to_ascii_uppercase())
}

/// Derive the local identity by comparing `local` against the two known
/// device addresses. `device_a` accepts as MASTER, `device_b` initiates toward
/// `device_a` as SLAVE, anything else falls back to accepting as MASTER.
pub fn identity_role(local: &str, device_a: &str, device_b: &str) -> Identity {
    let fallback = Identity {
        role: Role::Master,
        mode: LinkMode::Server,
        target: None,
    };
    let Some(local) = parse_hw_address(local) else {
        return fallback;
    };
    if parse_hw_address(device_a).as_deref() == Some(local.as_str()) {
        fallback
    } else if parse_hw_address(device_b).as_deref() == Some(local.as_str()) {
        Identity {
            role: Role::Slave,
            mode: LinkMode::Client,
            target: parse_hw_address(device_a),
        }
    } else {
        fallback
    }
}
