//! miditime - Time-aware manipulation of tick-tagged musical data.
//!
//! This library provides a time span algebra over several musical units
//! (ticks, wall clock, note fractions, bars and beats), conversion of
//! those spans through a tempo map, and three engines over timed
//! objects: splitting, rest detection and merging, including sequential
//! and simultaneous merging of whole score files.

pub mod file;
pub mod objects;
pub mod ops;
pub mod time;

// Re-export commonly used types
pub use file::{ScoreFile, TrackChunk, TrackEvent};
pub use objects::{Chord, Note, Rest, RestKey, TimedEvent, TimedObject};
pub use time::{Fraction, TempoMap, TimeSpan, TimeSpanKind, TimeSpanMode};
