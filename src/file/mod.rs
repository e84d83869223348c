//! In-memory score file container.
//!
//! A score file mirrors the shape of a Standard MIDI File: a tick
//! resolution plus a list of track chunks, each an ordered list of
//! delta-timed events. The cross-file merge reads and rewrites this
//! structure; the binary bridge to the actual format lives in
//! [`crate::file::smf`].

pub mod smf;

use crate::objects::EventKind;
use crate::time::{Tempo, TempoMap, TimeSignature};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A delta-timed event inside a track chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    /// Ticks since the previous event in the same chunk.
    pub delta: u64,
    /// The event payload.
    pub kind: EventKind,
}

impl TrackEvent {
    pub fn new(delta: u64, kind: EventKind) -> Self {
        Self { delta, kind }
    }
}

/// An ordered list of delta-timed events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackChunk {
    pub events: Vec<TrackEvent>,
}

impl TrackChunk {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn from_events(events: Vec<TrackEvent>) -> Self {
        Self { events }
    }

    /// Sum of all deltas: the absolute tick of the last event.
    pub fn duration_ticks(&self) -> u64 {
        self.events.iter().map(|e| e.delta).sum()
    }

    /// Iterates events paired with their absolute tick positions.
    pub fn absolute_events(&self) -> impl Iterator<Item = (u64, &TrackEvent)> {
        self.events.iter().scan(0u64, |tick, event| {
            *tick += event.delta;
            Some((*tick, event))
        })
    }
}

/// A complete score file: resolution plus track chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFile {
    /// Tick resolution: ticks per quarter note.
    pub ticks_per_quarter: u16,
    /// The file's track chunks.
    pub tracks: Vec<TrackChunk>,
}

impl ScoreFile {
    /// Creates an empty file with the given resolution.
    pub fn new(ticks_per_quarter: u16) -> Self {
        Self {
            ticks_per_quarter,
            tracks: Vec::new(),
        }
    }

    /// Total duration in ticks: the latest last-event position across
    /// all chunks.
    pub fn duration_ticks(&self) -> u64 {
        self.tracks
            .iter()
            .map(|t| t.duration_ticks())
            .max()
            .unwrap_or(0)
    }

    /// Builds the tempo map declared by this file's tempo and time
    /// signature events.
    pub fn tempo_map(&self) -> TempoMap {
        let mut map = TempoMap::new(self.ticks_per_quarter);
        for track in &self.tracks {
            for (tick, event) in track.absolute_events() {
                match &event.kind {
                    EventKind::SetTempo { micros_per_quarter } => {
                        map.set_tempo_change(
                            tick,
                            Tempo::from_micros_per_quarter(*micros_per_quarter as u64),
                        );
                    }
                    EventKind::TimeSignature {
                        numerator,
                        denominator,
                    } => {
                        map.set_time_signature_change(
                            tick,
                            TimeSignature::new(*numerator as u32, *denominator as u32),
                        );
                    }
                    _ => {}
                }
            }
        }
        map
    }

    /// Serializes the file to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a file from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Saves the file as JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Loads a file saved as JSON.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Saves the file in a compact binary form.
    pub fn save_to_binary<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let data = bincode::serialize(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, data)
    }

    /// Loads a file saved in the compact binary form.
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let data = fs::read(path)?;
        bincode::deserialize(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with_tempo_events() -> ScoreFile {
        let mut file = ScoreFile::new(480);
        file.tracks.push(TrackChunk::from_events(vec![
            TrackEvent::new(
                0,
                EventKind::SetTempo {
                    micros_per_quarter: 600_000,
                },
            ),
            TrackEvent::new(
                960,
                EventKind::TimeSignature {
                    numerator: 3,
                    denominator: 4,
                },
            ),
            TrackEvent::new(0, EventKind::EndOfTrack),
        ]));
        file
    }

    #[test]
    fn test_duration() {
        let mut file = ScoreFile::new(480);
        file.tracks.push(TrackChunk::from_events(vec![
            TrackEvent::new(100, EventKind::EndOfTrack),
        ]));
        file.tracks.push(TrackChunk::from_events(vec![
            TrackEvent::new(250, EventKind::EndOfTrack),
        ]));
        assert_eq!(file.duration_ticks(), 250);
    }

    #[test]
    fn test_tempo_map_extraction() {
        let file = file_with_tempo_events();
        let map = file.tempo_map();
        assert_eq!(map.tempo_at(0).micros_per_quarter(), 600_000);
        assert_eq!(map.time_signature_at(959), TimeSignature::new(4, 4));
        assert_eq!(map.time_signature_at(960), TimeSignature::new(3, 4));
    }

    #[test]
    fn test_absolute_events() {
        let file = file_with_tempo_events();
        let ticks: Vec<u64> = file.tracks[0]
            .absolute_events()
            .map(|(tick, _)| tick)
            .collect();
        assert_eq!(ticks, vec![0, 960, 960]);
    }

    #[test]
    fn test_json_round_trip() {
        let file = file_with_tempo_events();
        let json = file.to_json().unwrap();
        let loaded = ScoreFile::from_json(&json).unwrap();
        assert_eq!(loaded, file);
    }
}
