//! Rest representation.
//!
//! A rest is a synthesized object marking silence between two same-key
//! objects. Rests never come from input data; the detector in
//! [`crate::ops::rests`] creates them.

use serde::{Deserialize, Serialize};

/// The grouping key a rest was detected under.
///
/// Either component may be absent: a rest detected across all channels
/// and pitches carries neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestKey {
    pub channel: Option<u8>,
    pub note_number: Option<u8>,
}

impl RestKey {
    /// A key distinguishing nothing: all objects share it.
    pub const ANY: RestKey = RestKey {
        channel: None,
        note_number: None,
    };

    pub fn channel(channel: u8) -> Self {
        Self {
            channel: Some(channel),
            note_number: None,
        }
    }

    pub fn note_number(note_number: u8) -> Self {
        Self {
            channel: None,
            note_number: Some(note_number),
        }
    }

    pub fn channel_and_note(channel: u8, note_number: u8) -> Self {
        Self {
            channel: Some(channel),
            note_number: Some(note_number),
        }
    }
}

/// A silence gap between two same-key objects. Always has length > 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rest {
    /// Start position in ticks.
    pub start: u64,
    /// Length in ticks, always positive.
    pub length: u64,
    /// The key the gap was detected under.
    pub key: RestKey,
}

impl Rest {
    pub fn new(start: u64, length: u64, key: RestKey) -> Self {
        Self { start, length, key }
    }

    /// Returns the end tick (start + length).
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Returns a copy spanning `[start, end)` with the same key.
    pub fn with_range(&self, start: u64, end: u64) -> Self {
        Self {
            start,
            length: end.saturating_sub(start),
            key: self.key,
        }
    }
}
