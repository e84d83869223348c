//! Chord representation.
//!
//! A chord is an ordered set of notes treated as one lengthed object. Its
//! start is the earliest member start and its length reaches to the
//! latest member end.

use super::note::Note;
use serde::{Deserialize, Serialize};

/// An ordered group of notes manipulated as a single object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    notes: Vec<Note>,
}

impl Chord {
    /// Creates a chord from its member notes.
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    /// The member notes, in their stored order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Earliest member start, or 0 for an empty chord.
    pub fn start(&self) -> u64 {
        self.notes.iter().map(|n| n.start).min().unwrap_or(0)
    }

    /// Latest member end, or 0 for an empty chord.
    pub fn end(&self) -> u64 {
        self.notes.iter().map(|n| n.end()).max().unwrap_or(0)
    }

    /// Distance from the earliest start to the latest end.
    pub fn length(&self) -> u64 {
        self.end() - self.start()
    }

    /// Splits the chord at an absolute tick, distributing the cut over
    /// member notes.
    ///
    /// Notes ending at or before the cut go entirely left, notes starting
    /// at or after it entirely right; notes straddling the cut are split
    /// in two.
    ///
    /// # Returns
    ///
    /// (left, right) where either side is None when the cut lies outside
    /// the chord's open interval
    pub fn split_at(&self, time: u64) -> (Option<Chord>, Option<Chord>) {
        if time <= self.start() {
            return (None, Some(self.clone()));
        }
        if time >= self.end() {
            return (Some(self.clone()), None);
        }

        let mut left = Vec::new();
        let mut right = Vec::new();
        for note in &self.notes {
            if note.end() <= time {
                left.push(note.clone());
            } else if note.start >= time {
                right.push(note.clone());
            } else {
                left.push(note.with_range(note.start, time));
                right.push(note.with_range(time, note.end()));
            }
        }
        (Some(Chord::new(left)), Some(Chord::new(right)))
    }

    /// Returns a zero-length copy at the given tick: every member note
    /// collapses to a point there.
    pub fn collapsed_at(&self, time: u64) -> Chord {
        Chord::new(
            self.notes
                .iter()
                .map(|n| n.with_range(time, time))
                .collect(),
        )
    }

    /// Returns a copy shifted so the chord starts at `start`, preserving
    /// member offsets.
    pub fn moved_to(&self, start: u64) -> Chord {
        let base = self.start();
        Chord::new(
            self.notes
                .iter()
                .map(|n| {
                    let offset = n.start - base;
                    n.with_range(start + offset, start + offset + n.length)
                })
                .collect(),
        )
    }
}
