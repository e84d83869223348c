//! Time-tagged object model.
//!
//! Everything the engines operate on has a start tick and a non-negative
//! tick length: notes, chords, rests and zero-length timed events. The
//! engines never mutate objects in place; every transformation produces
//! new instances.

mod chord;
mod event;
mod note;
mod rest;

pub use chord::Chord;
pub use event::{EventKind, TimedEvent, PITCH_BEND_DEFAULT};
pub use note::Note;
pub use rest::{Rest, RestKey};

use serde::{Deserialize, Serialize};

/// The two halves produced by splitting an object at a point.
///
/// When the cut lies at or outside the object's bounds, one side is None
/// and the other holds an unsplit clone.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSplit {
    pub left: Option<TimedObject>,
    pub right: Option<TimedObject>,
}

/// Any object the engines understand, wrapped for mixed collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimedObject {
    Note(Note),
    Chord(Chord),
    Rest(Rest),
    Event(TimedEvent),
}

impl TimedObject {
    /// Start position in ticks.
    pub fn start(&self) -> u64 {
        match self {
            TimedObject::Note(n) => n.start,
            TimedObject::Chord(c) => c.start(),
            TimedObject::Rest(r) => r.start,
            TimedObject::Event(e) => e.start,
        }
    }

    /// Length in ticks; zero for events.
    pub fn length(&self) -> u64 {
        match self {
            TimedObject::Note(n) => n.length,
            TimedObject::Chord(c) => c.length(),
            TimedObject::Rest(r) => r.length,
            TimedObject::Event(_) => 0,
        }
    }

    /// End position in ticks (start + length).
    pub fn end(&self) -> u64 {
        self.start() + self.length()
    }

    /// Splits the object at an absolute tick.
    ///
    /// A cut at or before the start yields `(None, clone)`; a cut at or
    /// after the end yields `(clone, None)`; otherwise both halves are
    /// produced, together covering the original range exactly.
    pub fn split_at(&self, time: u64) -> ObjectSplit {
        if time <= self.start() {
            return ObjectSplit {
                left: None,
                right: Some(self.clone()),
            };
        }
        if time >= self.end() {
            return ObjectSplit {
                left: Some(self.clone()),
                right: None,
            };
        }

        match self {
            TimedObject::Note(n) => ObjectSplit {
                left: Some(TimedObject::Note(n.with_range(n.start, time))),
                right: Some(TimedObject::Note(n.with_range(time, n.end()))),
            },
            TimedObject::Chord(c) => {
                let (left, right) = c.split_at(time);
                ObjectSplit {
                    left: left.map(TimedObject::Chord),
                    right: right.map(TimedObject::Chord),
                }
            }
            TimedObject::Rest(r) => ObjectSplit {
                left: Some(TimedObject::Rest(r.with_range(r.start, time))),
                right: Some(TimedObject::Rest(r.with_range(time, r.end()))),
            },
            // Events are zero-length; the guards above always return.
            TimedObject::Event(_) => ObjectSplit {
                left: Some(self.clone()),
                right: None,
            },
        }
    }

    /// Returns a zero-length copy of the object placed at the given tick,
    /// keeping all non-temporal fields.
    pub fn collapsed_at(&self, time: u64) -> TimedObject {
        match self {
            TimedObject::Note(n) => TimedObject::Note(n.with_range(time, time)),
            TimedObject::Chord(c) => TimedObject::Chord(c.collapsed_at(time)),
            TimedObject::Rest(r) => TimedObject::Rest(r.with_range(time, time)),
            TimedObject::Event(e) => TimedObject::Event(TimedEvent::new(time, e.kind.clone())),
        }
    }
}

impl From<Note> for TimedObject {
    fn from(note: Note) -> Self {
        TimedObject::Note(note)
    }
}

impl From<Chord> for TimedObject {
    fn from(chord: Chord) -> Self {
        TimedObject::Chord(chord)
    }
}

impl From<Rest> for TimedObject {
    fn from(rest: Rest) -> Self {
        TimedObject::Rest(rest)
    }
}

impl From<TimedEvent> for TimedObject {
    fn from(event: TimedEvent) -> Self {
        TimedObject::Event(event)
    }
}
