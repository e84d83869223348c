//! Merging engine.
//!
//! Two jobs live here: coalescing runs of adjacent same-identity objects
//! within one stream, and concatenating or stacking whole score files
//! with tick-resolution rescaling and cross-file state carryover.

use crate::file::{ScoreFile, TrackChunk, TrackEvent};
use crate::objects::{
    Chord, EventKind, Note, Rest, RestKey, TimedObject, PITCH_BEND_DEFAULT,
};
use crate::time::convert::length_to_ticks;
use crate::time::{TempoMap, TimeSpan, TimeSpanError};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Errors produced by the merging operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    /// An empty file collection was handed to a file merge.
    #[error("no files to merge")]
    NoFiles,
    /// The least common multiple of the files' resolutions does not fit
    /// the format's 16-bit header field.
    #[error("common resolution {0} exceeds the representable limit")]
    ResolutionOverflow(u64),
    /// Files stacked simultaneously resolved to different tempo maps.
    #[error("files have different tempo maps")]
    TempoMapMismatch,
    /// A time span failed to resolve against the tempo map.
    #[error(transparent)]
    TimeSpan(#[from] TimeSpanError),
}

/// How the velocities of merged notes are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityPolicy {
    /// Take the first member's velocity.
    First,
    /// Take the last member's velocity.
    Last,
    Min,
    Max,
    /// Average across members, rounded half away from zero.
    Average,
}

impl VelocityPolicy {
    fn combine<I: IntoIterator<Item = u8>>(&self, values: I) -> u8 {
        let values: Vec<u8> = values.into_iter().collect();
        let first = values.first().copied().unwrap_or(0);
        match self {
            VelocityPolicy::First => first,
            VelocityPolicy::Last => values.last().copied().unwrap_or(0),
            VelocityPolicy::Min => values.iter().copied().min().unwrap_or(0),
            VelocityPolicy::Max => values.iter().copied().max().unwrap_or(0),
            VelocityPolicy::Average => {
                let sum: u32 = values.iter().map(|&v| v as u32).sum();
                (sum as f64 / values.len().max(1) as f64 + 0.5).floor() as u8
            }
        }
    }
}

/// Settings for the per-stream object merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSettings {
    /// Maximum gap between a group's end and the next candidate's start
    /// for the candidate to join. Converted to ticks at the group's end.
    pub tolerance: TimeSpan,
    /// Combines on-velocities of merged notes.
    pub velocity_policy: VelocityPolicy,
    /// Combines off-velocities of merged notes.
    pub off_velocity_policy: VelocityPolicy,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            tolerance: TimeSpan::Ticks(0),
            velocity_policy: VelocityPolicy::First,
            off_velocity_policy: VelocityPolicy::Last,
        }
    }
}

/// The identity under which objects are merge candidates for each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ObjectId {
    Note { channel: u8, note_number: u8 },
    Chord(Vec<(u8, u8)>),
    Rest(RestKey),
}

fn object_id(object: &TimedObject) -> Option<ObjectId> {
    match object {
        TimedObject::Note(n) => Some(ObjectId::Note {
            channel: n.channel,
            note_number: n.note_number,
        }),
        TimedObject::Chord(c) => {
            let mut members: Vec<(u8, u8)> = c
                .notes()
                .iter()
                .map(|n| (n.channel, n.note_number))
                .collect();
            members.sort_unstable();
            Some(ObjectId::Chord(members))
        }
        TimedObject::Rest(r) => Some(ObjectId::Rest(r.key)),
        TimedObject::Event(_) => None,
    }
}

struct MergeGroup {
    members: Vec<TimedObject>,
    end: u64,
}

enum SlotEntry {
    /// A non-mergeable object waiting its turn in the emission order.
    Passthrough(TimedObject),
    Group(MergeGroup),
}

struct GroupSlot {
    entry: Option<SlotEntry>,
    completed: bool,
}

/// Coalesces runs of adjacent same-identity objects.
///
/// Objects are walked in ascending start order. A group stays open while
/// each next same-identity candidate starts within `tolerance` of the
/// group's running end; an incompatible candidate closes the group and
/// opens a fresh one. Because groups for several identities can be open
/// concurrently, finished groups are held back until every group ahead
/// of them in arrival order has finished too, which keeps the output
/// ordered by original starts.
///
/// Non-mergeable objects (timed events) flow through in position.
pub fn merge_objects(
    objects: &[TimedObject],
    map: &TempoMap,
    settings: &MergeSettings,
) -> Result<Vec<TimedObject>, MergeError> {
    let mut ordered: Vec<&TimedObject> = objects.iter().collect();
    ordered.sort_by_key(|o| o.start());

    let mut slots: Vec<GroupSlot> = Vec::new();
    let mut order: VecDeque<usize> = VecDeque::new();
    let mut key_map: HashMap<ObjectId, usize> = HashMap::new();
    let mut out: Vec<TimedObject> = Vec::new();

    for object in ordered {
        let Some(id) = object_id(object) else {
            if order.is_empty() {
                out.push(object.clone());
            } else {
                slots.push(GroupSlot {
                    entry: Some(SlotEntry::Passthrough(object.clone())),
                    completed: true,
                });
                order.push_back(slots.len() - 1);
            }
            continue;
        };

        let open_group = key_map.get(&id).copied().filter(|&idx| !slots[idx].completed);
        match open_group {
            Some(idx) => {
                let joined = match slots[idx].entry.as_mut() {
                    Some(SlotEntry::Group(group)) => {
                        let tolerance_ticks =
                            length_to_ticks(&settings.tolerance, group.end, map)?;
                        let gap = object.start().saturating_sub(group.end);
                        if gap <= tolerance_ticks {
                            group.members.push(object.clone());
                            group.end = group.end.max(object.end());
                            true
                        } else {
                            false
                        }
                    }
                    _ => false,
                };
                if !joined {
                    slots[idx].completed = true;
                    if order.front() == Some(&idx) {
                        flush_completed(&mut slots, &mut order, &mut out, settings);
                    }
                    open_new_group(object, id, &mut slots, &mut order, &mut key_map);
                }
            }
            None => open_new_group(object, id, &mut slots, &mut order, &mut key_map),
        }
    }

    for idx in order {
        if let Some(entry) = slots[idx].entry.take() {
            out.extend(finalize(entry, settings));
        }
    }
    Ok(out)
}

fn open_new_group(
    object: &TimedObject,
    id: ObjectId,
    slots: &mut Vec<GroupSlot>,
    order: &mut VecDeque<usize>,
    key_map: &mut HashMap<ObjectId, usize>,
) {
    slots.push(GroupSlot {
        entry: Some(SlotEntry::Group(MergeGroup {
            members: vec![object.clone()],
            end: object.end(),
        })),
        completed: false,
    });
    let idx = slots.len() - 1;
    order.push_back(idx);
    key_map.insert(id, idx);
}

fn flush_completed(
    slots: &mut [GroupSlot],
    order: &mut VecDeque<usize>,
    out: &mut Vec<TimedObject>,
    settings: &MergeSettings,
) {
    let mut flushed = 0;
    while let Some(&idx) = order.front() {
        if !slots[idx].completed {
            break;
        }
        if let Some(entry) = slots[idx].entry.take() {
            out.extend(finalize(entry, settings));
        }
        order.pop_front();
        flushed += 1;
    }
    debug!(flushed, pending = order.len(), "flushed completed merge groups");
}

fn finalize(entry: SlotEntry, settings: &MergeSettings) -> Option<TimedObject> {
    match entry {
        SlotEntry::Passthrough(object) => Some(object),
        SlotEntry::Group(group) => merge_group(group, settings),
    }
}

fn merge_group(group: MergeGroup, settings: &MergeSettings) -> Option<TimedObject> {
    let end = group.end;
    let mut members = group.members.into_iter();
    let first = members.next()?;
    let rest: Vec<TimedObject> = members.collect();
    if rest.is_empty() {
        return Some(first);
    }

    Some(match first {
        TimedObject::Note(first_note) => {
            let all = std::iter::once(&first_note)
                .chain(rest.iter().filter_map(|o| match o {
                    TimedObject::Note(n) => Some(n),
                    _ => None,
                }))
                .collect::<Vec<_>>();
            let velocity = settings
                .velocity_policy
                .combine(all.iter().map(|n| n.velocity));
            let off_velocity = settings
                .off_velocity_policy
                .combine(all.iter().map(|n| n.off_velocity));
            TimedObject::Note(Note {
                channel: first_note.channel,
                note_number: first_note.note_number,
                velocity,
                off_velocity,
                start: first_note.start,
                length: end - first_note.start,
            })
        }
        TimedObject::Rest(first_rest) => {
            TimedObject::Rest(Rest::new(first_rest.start, end - first_rest.start, first_rest.key))
        }
        TimedObject::Chord(first_chord) => {
            let chords: Vec<&Chord> = rest
                .iter()
                .filter_map(|o| match o {
                    TimedObject::Chord(c) => Some(c),
                    _ => None,
                })
                .collect();
            // Same identity means the same sorted member multiset, so
            // position-wise pairing after sorting is well defined.
            let mut base = first_chord.notes().to_vec();
            base.sort_unstable_by_key(|n| (n.channel, n.note_number, n.start));
            let sorted_others: Vec<Vec<Note>> = chords
                .iter()
                .map(|c| {
                    let mut notes = c.notes().to_vec();
                    notes.sort_unstable_by_key(|n| (n.channel, n.note_number, n.start));
                    notes
                })
                .collect();

            let mut merged = Vec::with_capacity(base.len());
            for (i, note) in base.iter().enumerate() {
                let counterparts: Vec<&Note> = sorted_others
                    .iter()
                    .filter_map(|notes| notes.get(i))
                    .collect();
                let member_end = counterparts
                    .iter()
                    .map(|n| n.end())
                    .fold(note.end(), u64::max);
                let velocity = settings.velocity_policy.combine(
                    std::iter::once(note.velocity).chain(counterparts.iter().map(|n| n.velocity)),
                );
                let off_velocity = settings.off_velocity_policy.combine(
                    std::iter::once(note.off_velocity)
                        .chain(counterparts.iter().map(|n| n.off_velocity)),
                );
                merged.push(Note {
                    channel: note.channel,
                    note_number: note.note_number,
                    velocity,
                    off_velocity,
                    start: note.start,
                    length: member_end - note.start,
                });
            }
            TimedObject::Chord(Chord::new(merged))
        }
        TimedObject::Event(_) => first,
    })
}

/// Chooses how destination track chunks are allocated during a
/// sequential merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackChunkPolicy {
    /// Every source file contributes fresh chunks to the result.
    #[default]
    CreatePerFile,
    /// Source chunks are appended into existing result chunks by
    /// position, keeping the chunk count low.
    MinimizeCount,
}

/// Settings for [`merge_sequentially`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequentialMergeSettings {
    /// Rounds each file's duration up to a multiple of this step before
    /// advancing the running offset.
    pub file_duration_rounding_step: Option<TimeSpan>,
    /// Extra silence between consecutive files, resolved as a length at
    /// each file's end.
    pub delay_between_files: Option<TimeSpan>,
    pub track_chunk_policy: TrackChunkPolicy,
}

/// Settings for [`merge_simultaneously`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimultaneousMergeSettings {
    /// Skip the tempo map equality check.
    pub ignore_different_tempo_maps: bool,
}

/// Playback state carried across a file boundary.
struct BoundaryContext {
    tempo_micros: u32,
    time_signature: (u8, u8),
    pitch_bend: [u16; 16],
}

impl Default for BoundaryContext {
    fn default() -> Self {
        Self {
            tempo_micros: 500_000,
            time_signature: (4, 4),
            pitch_bend: [PITCH_BEND_DEFAULT; 16],
        }
    }
}

/// Concatenates files end to end into one file.
///
/// The result's resolution is the least common multiple of the inputs'
/// resolutions; every file's deltas are rescaled by the corresponding
/// integer factor and offset by the running total duration. Tempo, meter
/// and per-channel pitch bend are tracked across boundaries: when a file
/// leaves one of them undeclared at its very start while the carried
/// value differs from the unit default, a default-restoring event is
/// inserted so each file sounds as it would standalone.
pub fn merge_sequentially(
    files: &[ScoreFile],
    settings: &SequentialMergeSettings,
) -> Result<ScoreFile, MergeError> {
    if files.is_empty() {
        return Err(MergeError::NoFiles);
    }

    let common = common_resolution(files)?;
    let mut result = ScoreFile::new(common);
    let mut offset: u64 = 0;
    let mut context = BoundaryContext::default();

    for (file_index, file) in files.iter().enumerate() {
        let tempo_map = file.tempo_map();
        let factor = common as u64 / file.ticks_per_quarter.max(1) as u64;
        let mut chunks: Vec<TrackChunk> =
            file.tracks.iter().map(|t| scale_chunk(t, factor)).collect();
        debug!(file_index, factor, offset, "appending file");

        if file_index > 0 {
            restore_context(&mut chunks, file, &context);
        }

        let own_duration = file.duration_ticks();
        let mut advance = own_duration;
        if let Some(step) = &settings.file_duration_rounding_step {
            let step_ticks = length_to_ticks(step, 0, &tempo_map)?;
            if step_ticks > 0 {
                advance = own_duration.div_ceil(step_ticks) * step_ticks;
            }
        }
        if let Some(delay) = &settings.delay_between_files {
            advance += length_to_ticks(delay, own_duration, &tempo_map)?;
        }

        for chunk in &mut chunks {
            if let Some(first) = chunk.events.first_mut() {
                first.delta += offset;
            }
        }
        offset += advance * factor;

        update_context(&mut context, file);

        match settings.track_chunk_policy {
            TrackChunkPolicy::CreatePerFile => result.tracks.extend(chunks),
            TrackChunkPolicy::MinimizeCount => append_minimizing(&mut result, chunks),
        }
    }

    Ok(result)
}

/// Stacks files on top of each other into one file.
///
/// All chunks are rescaled to the common resolution and kept in parallel.
/// Unless suppressed, every file's resolved tempo map must equal the
/// first file's.
pub fn merge_simultaneously(
    files: &[ScoreFile],
    settings: &SimultaneousMergeSettings,
) -> Result<ScoreFile, MergeError> {
    if files.is_empty() {
        return Err(MergeError::NoFiles);
    }

    let common = common_resolution(files)?;
    let mut result = ScoreFile::new(common);
    let mut maps: Vec<TempoMap> = Vec::with_capacity(files.len());

    for file in files {
        let factor = common as u64 / file.ticks_per_quarter.max(1) as u64;
        let mut rescaled = ScoreFile::new(common);
        rescaled.tracks = file.tracks.iter().map(|t| scale_chunk(t, factor)).collect();
        maps.push(rescaled.tempo_map());
        result.tracks.extend(rescaled.tracks);
    }

    if !settings.ignore_different_tempo_maps {
        if let Some(reference) = maps.first() {
            if maps.iter().any(|m| m != reference) {
                return Err(MergeError::TempoMapMismatch);
            }
        }
    }

    Ok(result)
}

fn common_resolution(files: &[ScoreFile]) -> Result<u16, MergeError> {
    let mut resolution: u64 = 1;
    for file in files {
        resolution = lcm(resolution, file.ticks_per_quarter.max(1) as u64);
        if resolution > i16::MAX as u64 {
            return Err(MergeError::ResolutionOverflow(resolution));
        }
    }
    Ok(resolution as u16)
}

fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn scale_chunk(chunk: &TrackChunk, factor: u64) -> TrackChunk {
    TrackChunk::from_events(
        chunk
            .events
            .iter()
            .map(|e| TrackEvent::new(e.delta * factor, e.kind.clone()))
            .collect(),
    )
}

/// Inserts default-restoring events at the head of the first chunk for
/// every piece of carried state the file does not redeclare at tick 0.
fn restore_context(chunks: &mut [TrackChunk], file: &ScoreFile, context: &BoundaryContext) {
    let mut tempo_declared = false;
    let mut signature_declared = false;
    let mut bend_declared = [false; 16];
    for track in &file.tracks {
        for (tick, event) in track.absolute_events() {
            if tick > 0 {
                break;
            }
            match &event.kind {
                EventKind::SetTempo { .. } => tempo_declared = true,
                EventKind::TimeSignature { .. } => signature_declared = true,
                EventKind::PitchBend { channel, .. } => {
                    if let Some(flag) = bend_declared.get_mut(*channel as usize) {
                        *flag = true;
                    }
                }
                _ => {}
            }
        }
    }

    let mut restoring: Vec<EventKind> = Vec::new();
    if !tempo_declared && context.tempo_micros != 500_000 {
        restoring.push(EventKind::SetTempo {
            micros_per_quarter: 500_000,
        });
    }
    if !signature_declared && context.time_signature != (4, 4) {
        restoring.push(EventKind::TimeSignature {
            numerator: 4,
            denominator: 4,
        });
    }
    for (channel, bend) in context.pitch_bend.iter().enumerate() {
        if !bend_declared[channel] && *bend != PITCH_BEND_DEFAULT {
            restoring.push(EventKind::PitchBend {
                channel: channel as u8,
                value: PITCH_BEND_DEFAULT,
            });
        }
    }

    if restoring.is_empty() {
        return;
    }
    debug!(count = restoring.len(), "restoring default state at file boundary");
    if let Some(first) = chunks.first_mut() {
        for kind in restoring.into_iter().rev() {
            first.events.insert(0, TrackEvent::new(0, kind));
        }
    }
}

/// Updates the carried state to what is in effect at the end of `file`.
///
/// Boundary restoration has already reset anything undeclared to the
/// defaults, so the state after the file is its latest declaration of
/// each value, or the default.
fn update_context(context: &mut BoundaryContext, file: &ScoreFile) {
    *context = BoundaryContext::default();
    let mut latest_tempo: Option<(u64, u32)> = None;
    let mut latest_signature: Option<(u64, (u8, u8))> = None;
    let mut latest_bend: [Option<(u64, u16)>; 16] = [None; 16];

    for track in &file.tracks {
        for (tick, event) in track.absolute_events() {
            match &event.kind {
                EventKind::SetTempo { micros_per_quarter } => {
                    if latest_tempo.map_or(true, |(t, _)| tick >= t) {
                        latest_tempo = Some((tick, *micros_per_quarter));
                    }
                }
                EventKind::TimeSignature {
                    numerator,
                    denominator,
                } => {
                    if latest_signature.map_or(true, |(t, _)| tick >= t) {
                        latest_signature = Some((tick, (*numerator, *denominator)));
                    }
                }
                EventKind::PitchBend { channel, value } => {
                    if let Some(slot) = latest_bend.get_mut(*channel as usize) {
                        if slot.map_or(true, |(t, _)| tick >= t) {
                            *slot = Some((tick, *value));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if let Some((_, tempo)) = latest_tempo {
        context.tempo_micros = tempo;
    }
    if let Some((_, signature)) = latest_signature {
        context.time_signature = signature;
    }
    for (channel, slot) in latest_bend.iter().enumerate() {
        if let Some((_, value)) = slot {
            context.pitch_bend[channel] = *value;
        }
    }
}

fn append_minimizing(result: &mut ScoreFile, chunks: Vec<TrackChunk>) {
    for (i, mut chunk) in chunks.into_iter().enumerate() {
        match result.tracks.get_mut(i) {
            Some(existing) => {
                if chunk.events.is_empty() {
                    continue;
                }
                // The chunk's first delta is absolute; make it relative
                // to the end of the existing events.
                let consumed = existing.duration_ticks();
                chunk.events[0].delta = chunk.events[0].delta.saturating_sub(consumed);
                existing.events.extend(chunk.events);
            }
            None => result.tracks.push(chunk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::TimedEvent;

    fn note_on(channel: u8, number: u8, start: u64, length: u64, velocity: u8) -> TimedObject {
        Note::new(channel, number, start, length)
            .with_velocity(velocity)
            .into()
    }

    #[test]
    fn test_adjacent_notes_merge() {
        let map = TempoMap::new(480);
        let objects = vec![
            note_on(0, 60, 0, 100, 100),
            note_on(0, 60, 100, 100, 50),
        ];
        let merged = merge_objects(&objects, &map, &MergeSettings::default()).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start(), 0);
        assert_eq!(merged[0].length(), 200);
    }

    #[test]
    fn test_tolerance_boundary() {
        let map = TempoMap::new(480);
        let settings = MergeSettings {
            tolerance: TimeSpan::Ticks(10),
            ..Default::default()
        };

        // Gap exactly at the tolerance merges.
        let at = vec![note_on(0, 60, 0, 100, 100), note_on(0, 60, 110, 100, 100)];
        assert_eq!(merge_objects(&at, &map, &settings).unwrap().len(), 1);

        // One tick more stays distinct.
        let over = vec![note_on(0, 60, 0, 100, 100), note_on(0, 60, 111, 100, 100)];
        assert_eq!(merge_objects(&over, &map, &settings).unwrap().len(), 2);
    }

    #[test]
    fn test_different_identities_do_not_merge() {
        let map = TempoMap::new(480);
        let objects = vec![
            note_on(0, 60, 0, 100, 100),
            note_on(0, 62, 100, 100, 100),
            note_on(1, 60, 200, 100, 100),
        ];
        let merged = merge_objects(&objects, &map, &MergeSettings::default()).unwrap();
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_velocity_policies() {
        let map = TempoMap::new(480);
        let objects = vec![
            note_on(0, 60, 0, 100, 40),
            note_on(0, 60, 100, 100, 101),
        ];

        let velocity_of = |policy| {
            let settings = MergeSettings {
                velocity_policy: policy,
                ..Default::default()
            };
            match &merge_objects(&objects, &map, &settings).unwrap()[0] {
                TimedObject::Note(n) => n.velocity,
                other => panic!("expected note, got {:?}", other),
            }
        };

        assert_eq!(velocity_of(VelocityPolicy::First), 40);
        assert_eq!(velocity_of(VelocityPolicy::Last), 101);
        assert_eq!(velocity_of(VelocityPolicy::Min), 40);
        assert_eq!(velocity_of(VelocityPolicy::Max), 101);
        // (40 + 101) / 2 = 70.5, rounded half away from zero.
        assert_eq!(velocity_of(VelocityPolicy::Average), 71);
    }

    #[test]
    fn test_interleaved_keys_keep_start_order() {
        let map = TempoMap::new(480);
        let objects = vec![
            note_on(0, 60, 0, 10, 100),    // key A
            note_on(0, 62, 5, 10, 100),    // key B, overlaps A
            note_on(0, 60, 1000, 10, 100), // key A again, far away
            note_on(0, 62, 2000, 10, 100), // key B again, far away
        ];
        let merged = merge_objects(&objects, &map, &MergeSettings::default()).unwrap();
        let starts: Vec<u64> = merged.iter().map(|o| o.start()).collect();
        assert_eq!(starts, vec![0, 5, 1000, 2000]);
    }

    #[test]
    fn test_out_of_order_completion_holds_pending_groups() {
        let map = TempoMap::new(480);
        let objects = vec![
            note_on(0, 60, 0, 10, 100), // A opens
            note_on(0, 62, 5, 10, 100), // B opens
            note_on(0, 64, 8, 10, 100), // C opens
            note_on(0, 62, 1000, 10, 100), // B completes out of order: no flush yet
            note_on(0, 60, 2000, 10, 100), // A completes at the head: flush A and B
        ];
        let merged = merge_objects(&objects, &map, &MergeSettings::default()).unwrap();
        let starts: Vec<u64> = merged.iter().map(|o| o.start()).collect();
        assert_eq!(starts, vec![0, 5, 8, 1000, 2000]);
    }

    #[test]
    fn test_events_pass_through() {
        let map = TempoMap::new(480);
        let objects = vec![
            TimedEvent::new(0, EventKind::EndOfTrack).into(),
            note_on(0, 60, 10, 100, 100),
            TimedEvent::new(50, EventKind::EndOfTrack).into(),
        ];
        let merged = merge_objects(&objects, &map, &MergeSettings::default()).unwrap();
        assert_eq!(merged.len(), 3);
        assert!(matches!(merged[0], TimedObject::Event(_)));
        assert!(matches!(merged[2], TimedObject::Event(_)));
    }

    #[test]
    fn test_chord_merge() {
        let map = TempoMap::new(480);
        let chord = |start: u64| {
            TimedObject::Chord(Chord::new(vec![
                Note::new(0, 60, start, 100),
                Note::new(0, 64, start, 100),
            ]))
        };
        let merged =
            merge_objects(&[chord(0), chord(100)], &map, &MergeSettings::default()).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start(), 0);
        assert_eq!(merged[0].end(), 200);
        match &merged[0] {
            TimedObject::Chord(c) => assert_eq!(c.notes().len(), 2),
            other => panic!("expected chord, got {:?}", other),
        }
    }

    #[test]
    fn test_rests_merge_by_key() {
        let map = TempoMap::new(480);
        let objects = vec![
            TimedObject::Rest(Rest::new(0, 100, RestKey::channel(1))),
            TimedObject::Rest(Rest::new(100, 50, RestKey::channel(1))),
            TimedObject::Rest(Rest::new(100, 50, RestKey::channel(2))),
        ];
        let merged = merge_objects(&objects, &map, &MergeSettings::default()).unwrap();
        assert_eq!(merged.len(), 2);
    }

    fn file_with_note(ticks_per_quarter: u16, note_end: u64) -> ScoreFile {
        let mut file = ScoreFile::new(ticks_per_quarter);
        file.tracks.push(TrackChunk::from_events(vec![
            TrackEvent::new(
                0,
                EventKind::NoteOn {
                    channel: 0,
                    note_number: 60,
                    velocity: 100,
                },
            ),
            TrackEvent::new(
                note_end,
                EventKind::NoteOff {
                    channel: 0,
                    note_number: 60,
                    velocity: 0,
                },
            ),
        ]));
        file
    }

    #[test]
    fn test_sequential_merge_rescales_and_offsets() {
        let files = [file_with_note(480, 480), file_with_note(960, 960)];
        let merged = merge_sequentially(&files, &SequentialMergeSettings::default()).unwrap();
        assert_eq!(merged.ticks_per_quarter, 960);
        assert_eq!(merged.tracks.len(), 2);

        // First file scaled by 2: note off at 960.
        assert_eq!(merged.tracks[0].events[1].delta, 960);
        // Second file starts after the first file's duration.
        assert_eq!(merged.tracks[1].events[0].delta, 960);
    }

    #[test]
    fn test_sequential_merge_duration_rounding_and_delay() {
        let files = [file_with_note(480, 500), file_with_note(480, 480)];
        let settings = SequentialMergeSettings {
            file_duration_rounding_step: Some(TimeSpan::Ticks(480)),
            delay_between_files: Some(TimeSpan::Ticks(100)),
            ..Default::default()
        };
        let merged = merge_sequentially(&files, &settings).unwrap();
        // 500 rounds up to 960, plus 100 delay.
        assert_eq!(merged.tracks[1].events[0].delta, 1060);
    }

    #[test]
    fn test_sequential_merge_restores_tempo_at_boundary() {
        let mut first = file_with_note(480, 480);
        first.tracks[0].events.insert(
            0,
            TrackEvent::new(
                0,
                EventKind::SetTempo {
                    micros_per_quarter: 250_000,
                },
            ),
        );
        let second = file_with_note(480, 480);

        let merged =
            merge_sequentially(&[first, second], &SequentialMergeSettings::default()).unwrap();
        // The second file declares no tempo, so the default is restored.
        assert_eq!(
            merged.tracks[1].events[0].kind,
            EventKind::SetTempo {
                micros_per_quarter: 500_000,
            }
        );
    }

    #[test]
    fn test_sequential_merge_restores_pitch_bend() {
        let mut first = file_with_note(480, 480);
        first.tracks[0].events.push(TrackEvent::new(
            0,
            EventKind::PitchBend {
                channel: 3,
                value: 5000,
            },
        ));
        let second = file_with_note(480, 480);

        let merged =
            merge_sequentially(&[first, second], &SequentialMergeSettings::default()).unwrap();
        assert_eq!(
            merged.tracks[1].events[0].kind,
            EventKind::PitchBend {
                channel: 3,
                value: PITCH_BEND_DEFAULT,
            }
        );
    }

    #[test]
    fn test_sequential_merge_no_restore_when_redeclared() {
        let mut first = file_with_note(480, 480);
        first.tracks[0].events.insert(
            0,
            TrackEvent::new(
                0,
                EventKind::SetTempo {
                    micros_per_quarter: 250_000,
                },
            ),
        );
        let mut second = file_with_note(480, 480);
        second.tracks[0].events.insert(
            0,
            TrackEvent::new(
                0,
                EventKind::SetTempo {
                    micros_per_quarter: 300_000,
                },
            ),
        );

        let merged =
            merge_sequentially(&[first, second], &SequentialMergeSettings::default()).unwrap();
        assert_eq!(
            merged.tracks[1].events[0].kind,
            EventKind::SetTempo {
                micros_per_quarter: 300_000,
            }
        );
    }

    #[test]
    fn test_sequential_merge_minimize_count() {
        let files = [file_with_note(480, 480), file_with_note(480, 480)];
        let settings = SequentialMergeSettings {
            track_chunk_policy: TrackChunkPolicy::MinimizeCount,
            ..Default::default()
        };
        let merged = merge_sequentially(&files, &settings).unwrap();
        assert_eq!(merged.tracks.len(), 1);
        assert_eq!(merged.tracks[0].events.len(), 4);
        // Second file's note-on lands at absolute tick 480.
        assert_eq!(merged.tracks[0].events[2].delta, 0);
    }

    #[test]
    fn test_resolution_overflow() {
        let files = [file_with_note(25000, 100), file_with_note(3, 100)];
        assert!(matches!(
            merge_sequentially(&files, &SequentialMergeSettings::default()),
            Err(MergeError::ResolutionOverflow(_))
        ));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(
            merge_sequentially(&[], &SequentialMergeSettings::default()),
            Err(MergeError::NoFiles)
        );
        assert_eq!(
            merge_simultaneously(&[], &SimultaneousMergeSettings::default()),
            Err(MergeError::NoFiles)
        );
    }

    #[test]
    fn test_simultaneous_merge_stacks_tracks() {
        let files = [file_with_note(480, 480), file_with_note(960, 960)];
        let merged =
            merge_simultaneously(&files, &SimultaneousMergeSettings::default()).unwrap();
        assert_eq!(merged.ticks_per_quarter, 960);
        assert_eq!(merged.tracks.len(), 2);
        // Both notes end at the same rescaled tick.
        assert_eq!(merged.tracks[0].events[1].delta, 960);
        assert_eq!(merged.tracks[1].events[1].delta, 960);
    }

    #[test]
    fn test_simultaneous_merge_tempo_map_validation() {
        let mut slow = file_with_note(480, 480);
        slow.tracks[0].events.insert(
            0,
            TrackEvent::new(
                0,
                EventKind::SetTempo {
                    micros_per_quarter: 250_000,
                },
            ),
        );
        let plain = file_with_note(480, 480);

        assert_eq!(
            merge_simultaneously(
                &[slow.clone(), plain.clone()],
                &SimultaneousMergeSettings::default()
            ),
            Err(MergeError::TempoMapMismatch)
        );
        assert!(merge_simultaneously(
            &[slow, plain],
            &SimultaneousMergeSettings {
                ignore_different_tempo_maps: true,
            }
        )
        .is_ok());
    }
}
