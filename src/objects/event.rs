//! Instantaneous timed events.
//!
//! A timed event has a start tick and no length; its payload is opaque to
//! the engines, which only route it around notes, chords and rests.

use serde::{Deserialize, Serialize};

/// The payload of a timed event or a track event.
///
/// Covers the channel and meta messages the merging and tempo-map
/// extraction paths need; everything else travels as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    NoteOn {
        channel: u8,
        note_number: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note_number: u8,
        velocity: u8,
    },
    Controller {
        channel: u8,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        channel: u8,
        program: u8,
    },
    /// Pitch wheel position; 8192 is center (no bend).
    PitchBend {
        channel: u8,
        value: u16,
    },
    /// Tempo change, microseconds per quarter note.
    SetTempo {
        micros_per_quarter: u32,
    },
    /// Meter change. The denominator is the beat unit itself (4 for
    /// quarter notes), not a power of two.
    TimeSignature {
        numerator: u8,
        denominator: u8,
    },
    TrackName(String),
    EndOfTrack,
    /// Raw system-exclusive bytes, carried through untouched.
    Other(Vec<u8>),
}

/// Center position of the pitch wheel (no bend applied).
pub const PITCH_BEND_DEFAULT: u16 = 8192;

/// A zero-length object carrying an opaque payload at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Start position in ticks.
    pub start: u64,
    /// The event payload.
    pub kind: EventKind,
}

impl TimedEvent {
    pub fn new(start: u64, kind: EventKind) -> Self {
        Self { start, kind }
    }
}
