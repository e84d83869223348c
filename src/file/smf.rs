//! Standard MIDI File bridge.
//!
//! Converts between the in-memory [`ScoreFile`] model and the binary SMF
//! format via the `midly` crate. Only metrical (ticks-per-quarter-note)
//! timing is supported; SMPTE-timed files are rejected.

use super::{ScoreFile, TrackChunk, TrackEvent};
use crate::objects::EventKind;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::fs;
use std::path::Path;

/// Errors produced by reading or writing Standard MIDI Files.
#[derive(Debug, thiserror::Error)]
pub enum SmfError {
    /// File could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The binary data is not a valid MIDI file.
    #[error("MIDI parse error: {0}")]
    Parse(String),
    /// The file uses a timing scheme the model does not represent.
    #[error("unsupported timing: {0}")]
    UnsupportedTiming(String),
}

/// Reads a Standard MIDI File from disk.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<ScoreFile, SmfError> {
    let data = fs::read(path)?;
    read_bytes(&data)
}

/// Parses a Standard MIDI File from a byte buffer.
pub fn read_bytes(data: &[u8]) -> Result<ScoreFile, SmfError> {
    let smf = Smf::parse(data).map_err(|e| SmfError::Parse(e.to_string()))?;
    from_midly(&smf)
}

/// Writes a score file to disk as a Standard MIDI File.
pub fn write_file<P: AsRef<Path>>(file: &ScoreFile, path: P) -> Result<(), SmfError> {
    let bytes = write_bytes(file)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Serializes a score file to Standard MIDI File bytes.
pub fn write_bytes(file: &ScoreFile) -> Result<Vec<u8>, SmfError> {
    let format = if file.tracks.len() == 1 {
        Format::SingleTrack
    } else {
        Format::Parallel
    };
    let header = Header::new(format, Timing::Metrical(u15::new(file.ticks_per_quarter.min(0x7FFF))));

    let mut smf = Smf::new(header);
    for track in &file.tracks {
        let mut events = Vec::with_capacity(track.events.len() + 1);
        for event in &track.events {
            if let Some(kind) = to_midly_kind(&event.kind) {
                events.push(midly::TrackEvent {
                    delta: u28::new(event.delta.min(0x0FFF_FFFF) as u32),
                    kind,
                });
            }
        }
        let ends_properly = matches!(
            events.last(),
            Some(midly::TrackEvent {
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
                ..
            })
        );
        if !ends_properly {
            events.push(midly::TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            });
        }
        smf.tracks.push(events);
    }

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;
    Ok(bytes)
}

/// Converts a parsed `midly` file into the in-memory model.
pub fn from_midly(smf: &Smf) -> Result<ScoreFile, SmfError> {
    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) => tpq.as_int(),
        Timing::Timecode(fps, subframe) => {
            return Err(SmfError::UnsupportedTiming(format!(
                "SMPTE timecode ({:?} fps, {} subframes)",
                fps, subframe
            )))
        }
    };

    let mut file = ScoreFile::new(ticks_per_quarter);
    for track in &smf.tracks {
        let mut chunk = TrackChunk::new();
        // Skipped events donate their delta to the next kept one.
        let mut pending_delta = 0u64;
        for event in track {
            pending_delta += event.delta.as_int() as u64;
            if let Some(kind) = from_midly_kind(&event.kind) {
                chunk.events.push(TrackEvent::new(pending_delta, kind));
                pending_delta = 0;
            }
        }
        file.tracks.push(chunk);
    }
    Ok(file)
}

fn from_midly_kind(kind: &TrackEventKind) -> Option<EventKind> {
    match kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } => Some(EventKind::NoteOn {
                    channel,
                    note_number: key.as_int(),
                    velocity: vel.as_int(),
                }),
                MidiMessage::NoteOff { key, vel } => Some(EventKind::NoteOff {
                    channel,
                    note_number: key.as_int(),
                    velocity: vel.as_int(),
                }),
                MidiMessage::Controller { controller, value } => Some(EventKind::Controller {
                    channel,
                    controller: controller.as_int(),
                    value: value.as_int(),
                }),
                MidiMessage::ProgramChange { program } => Some(EventKind::ProgramChange {
                    channel,
                    program: program.as_int(),
                }),
                MidiMessage::PitchBend { bend } => Some(EventKind::PitchBend {
                    channel,
                    value: bend.0.as_int(),
                }),
                _ => None,
            }
        }
        TrackEventKind::Meta(meta) => match meta {
            MetaMessage::Tempo(micros) => Some(EventKind::SetTempo {
                micros_per_quarter: micros.as_int(),
            }),
            MetaMessage::TimeSignature(numerator, denominator_power, _, _) => {
                // The power byte is unbounded in the wire format; 2^7 is
                // the largest beat unit the model stores.
                Some(EventKind::TimeSignature {
                    numerator: *numerator,
                    denominator: 1u8 << (*denominator_power).min(7),
                })
            }
            MetaMessage::TrackName(bytes) => Some(EventKind::TrackName(
                String::from_utf8_lossy(bytes).into_owned(),
            )),
            MetaMessage::EndOfTrack => Some(EventKind::EndOfTrack),
            _ => None,
        },
        TrackEventKind::SysEx(data) => Some(EventKind::Other(data.to_vec())),
        TrackEventKind::Escape(_) => None,
    }
}

fn to_midly_kind(kind: &EventKind) -> Option<TrackEventKind<'_>> {
    match kind {
        EventKind::NoteOn {
            channel,
            note_number,
            velocity,
        } => Some(TrackEventKind::Midi {
            channel: u4::new(*channel),
            message: MidiMessage::NoteOn {
                key: u7::new(*note_number),
                vel: u7::new(*velocity),
            },
        }),
        EventKind::NoteOff {
            channel,
            note_number,
            velocity,
        } => Some(TrackEventKind::Midi {
            channel: u4::new(*channel),
            message: MidiMessage::NoteOff {
                key: u7::new(*note_number),
                vel: u7::new(*velocity),
            },
        }),
        EventKind::Controller {
            channel,
            controller,
            value,
        } => Some(TrackEventKind::Midi {
            channel: u4::new(*channel),
            message: MidiMessage::Controller {
                controller: u7::new(*controller),
                value: u7::new(*value),
            },
        }),
        EventKind::ProgramChange { channel, program } => Some(TrackEventKind::Midi {
            channel: u4::new(*channel),
            message: MidiMessage::ProgramChange {
                program: u7::new(*program),
            },
        }),
        EventKind::PitchBend { channel, value } => Some(TrackEventKind::Midi {
            channel: u4::new(*channel),
            message: MidiMessage::PitchBend {
                bend: midly::PitchBend(midly::num::u14::new(*value)),
            },
        }),
        EventKind::SetTempo { micros_per_quarter } => Some(TrackEventKind::Meta(
            MetaMessage::Tempo(u24::new((*micros_per_quarter).min(0x00FF_FFFF))),
        )),
        EventKind::TimeSignature {
            numerator,
            denominator,
        } => {
            let power = if denominator.is_power_of_two() {
                denominator.trailing_zeros() as u8
            } else {
                2
            };
            Some(TrackEventKind::Meta(MetaMessage::TimeSignature(
                *numerator, power, 24, 8,
            )))
        }
        EventKind::TrackName(name) => {
            Some(TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())))
        }
        EventKind::EndOfTrack => Some(TrackEventKind::Meta(MetaMessage::EndOfTrack)),
        EventKind::Other(data) => Some(TrackEventKind::SysEx(data)),
    }
}
