//! Fixed game geometry plus the tunable session and link settings.

use core::time::Duration;
use serde::Deserialize;

/// Width and height of the square grid.
pub const GRID_SIZE: usize = 5;
/// Ship lengths placed in order by each player.
pub const DEFAULT_SHIPS: [usize; 2] = [3, 2];

/// Largest frame accepted before a terminator must appear.
pub const MAX_FRAME_LEN: usize = 4096;

pub const RESULT_HOLD: Duration = Duration::from_secs(3);
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub const ACCEPT_RETRY: Duration = Duration::from_secs(0);
pub const CONNECT_RETRY: Duration = Duration::from_secs(2);
pub const CLOSE_GRACE: Duration = Duration::from_millis(500);

// How long each transient display text stays up.
pub const SHOW_INVALID_PLACEMENT: Duration = Duration::from_millis(1500);
pub const SHOW_ALL_PLACED: Duration = Duration::from_secs(2);
pub const SHOW_OPPONENT_READY: Duration = Duration::from_secs(2);
pub const SHOW_FIRST_TURN: Duration = Duration::from_secs(2);
pub const SHOW_FIRING: Duration = Duration::from_secs(1);
pub const SHOW_RESULT: Duration = Duration::from_secs(3);
pub const SHOW_ALREADY_SHOT: Duration = Duration::from_millis(1500);
pub const SHOW_CONNECTION_FAILURE: Duration = Duration::from_secs(3);

/// Settings for one game session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ship_lengths: Vec<usize>,
    /// Minimum time a shot outcome stays up before the turn passes.
    pub result_hold_ms: u64,
    pub handshake_timeout_ms: u64,
    /// Gate `CONNECTING` behind an explicit start trigger.
    pub start_screen: bool,
}

impl SessionConfig {
    pub fn result_hold(&self) -> Duration {
        Duration::from_millis(self.result_hold_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ship_lengths: DEFAULT_SHIPS.to_vec(),
            result_hold_ms: RESULT_HOLD.as_millis() as u64,
            handshake_timeout_ms: HANDSHAKE_TIMEOUT.as_millis() as u64,
            start_screen: false,
        }
    }
}

/// Settings for the background link tasks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub accept_retry_ms: u64,
    pub connect_retry_ms: u64,
    pub close_grace_ms: u64,
    pub max_frame_len: usize,
}

impl LinkConfig {
    pub fn accept_retry(&self) -> Duration {
        Duration::from_millis(self.accept_retry_ms)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            accept_retry_ms: ACCEPT_RETRY.as_millis() as u64,
            connect_retry_ms: CONNECT_RETRY.as_millis() as u64,
            close_grace_ms: CLOSE_GRACE.as_millis() as u64,
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub link: LinkConfig,
}

impl AppConfig {
    /// Parse a JSON configuration document. Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
