//! Note representation.
//!
//! A note is the basic lengthed object: a pitch sounding on a channel for
//! some tick range, with on and off velocities.

use serde::{Deserialize, Serialize};

/// A single note with timing and dynamics.
///
/// All timing is stored in raw ticks; other units are views computed on
/// demand through a tempo map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI channel (0-15).
    pub channel: u8,

    /// MIDI note number (0-127). 60 = Middle C.
    pub note_number: u8,

    /// Note-on velocity (0-127).
    pub velocity: u8,

    /// Note-off velocity (0-127).
    pub off_velocity: u8,

    /// Start position in ticks.
    pub start: u64,

    /// Length in ticks. Zero is valid.
    pub length: u64,
}

impl Note {
    /// Creates a new note, clamping out-of-range fields.
    ///
    /// # Arguments
    ///
    /// * `channel` - MIDI channel (clamped to 0-15)
    /// * `note_number` - MIDI note number (clamped to 0-127)
    /// * `start` - Start position in ticks
    /// * `length` - Length in ticks
    pub fn new(channel: u8, note_number: u8, start: u64, length: u64) -> Self {
        Self {
            channel: channel.min(15),
            note_number: note_number.min(127),
            velocity: 100,
            off_velocity: 0,
            start,
            length,
        }
    }

    /// Sets the on velocity (clamped to 0-127), builder style.
    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity.min(127);
        self
    }

    /// Sets the off velocity (clamped to 0-127), builder style.
    pub fn with_off_velocity(mut self, off_velocity: u8) -> Self {
        self.off_velocity = off_velocity.min(127);
        self
    }

    /// Returns the end tick (start + length).
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Returns a copy spanning `[start, end)`, keeping all non-temporal
    /// fields.
    pub fn with_range(&self, start: u64, end: u64) -> Self {
        Self {
            start,
            length: end.saturating_sub(start),
            ..self.clone()
        }
    }
}
