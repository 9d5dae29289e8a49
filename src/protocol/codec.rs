//! Newline-delimited JSON framing with per-sender sequence numbers.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::{Envelope, Message, FRAME_TERMINATOR};

/// Errors produced while encoding or decoding frames.
#[derive(Debug)]
pub enum CodecError {
    /// The payload could not be serialized.
    Json(serde_json::Error),
    /// Garbled JSON, unknown `type`, or a missing field.
    Malformed(String),
    /// More than `max` bytes arrived without a terminator.
    FrameTooLarge { size: usize, max: usize },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Json(e) => write!(f, "JSON serialization error: {}", e),
            CodecError::Malformed(reason) => write!(f, "Malformed frame: {}", reason),
            CodecError::FrameTooLarge { size, max } => {
                write!(f, "Frame too large: {} bytes (max: {})", size, max)
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Encoder side of the codec. Owns the sender's sequence counter, so one
/// `Codec` must back every frame a peer sends.
#[derive(Debug, Default)]
pub struct Codec {
    next_seq: AtomicU64,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next encoded frame will carry.
    pub fn peek_seq(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }

    /// Serialize `message` into one terminated frame under a fresh sequence
    /// number. The number is consumed even if serialization fails.
    pub fn encode(&self, message: Message) -> Result<(u64, String), CodecError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut frame =
            serde_json::to_string(&Envelope { message, seq }).map_err(CodecError::Json)?;
        frame.push(FRAME_TERMINATOR as char);
        Ok((seq, frame))
    }

    /// Parse one frame, with or without its terminator.
    pub fn decode(frame: &[u8]) -> Result<Envelope, CodecError> {
        let text = trim_ascii(frame);
        if text.is_empty() {
            return Err(CodecError::Malformed("empty frame".into()));
        }
        serde_json::from_slice(text).map_err(|e| CodecError::Malformed(e.to_string()))
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Reassembles frames from arbitrary read chunks. A partial frame is kept
/// until its terminator arrives.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    max_len: usize,
}

impl FrameBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
        }
    }

    /// Append `bytes`, returning every frame completed by them. Blank lines
    /// are skipped. If the unterminated remainder grows beyond the limit it is
    /// discarded and reported as the last item.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<Vec<u8>, CodecError>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == FRAME_TERMINATOR) {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if trim_ascii(&line).is_empty() {
                continue;
            }
            frames.push(Ok(line));
        }
        if self.buf.len() > self.max_len {
            let size = self.buf.len();
            self.buf.clear();
            frames.push(Err(CodecError::FrameTooLarge {
                size,
                max: self.max_len,
            }));
        }
        frames
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
