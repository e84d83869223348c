//! Rest detection engine.
//!
//! Infers the silence gaps between consecutive same-key objects. The key
//! selector decides which objects share a voice: objects mapped to the
//! same key close each other's gaps, and an object mapped to no key is
//! invisible to the bookkeeping entirely.

use crate::objects::{Rest, RestKey, TimedObject};
use std::collections::HashMap;

/// Ready-made grouping policies for the common note separations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestDetectionPolicy {
    /// All notes share one voice; a rest is a gap in the whole stream.
    NoSeparation,
    /// Notes on different channels rest independently.
    SeparateByChannel,
    /// Notes with different pitches rest independently.
    SeparateByNoteNumber,
    /// Every (channel, pitch) pair rests independently.
    SeparateByChannelAndNoteNumber,
}

impl RestDetectionPolicy {
    /// The key this policy assigns to an object, or None for objects the
    /// policy ignores (anything that is not a note).
    pub fn key_for(&self, object: &TimedObject) -> Option<RestKey> {
        let TimedObject::Note(note) = object else {
            return None;
        };
        Some(match self {
            RestDetectionPolicy::NoSeparation => RestKey::ANY,
            RestDetectionPolicy::SeparateByChannel => RestKey::channel(note.channel),
            RestDetectionPolicy::SeparateByNoteNumber => RestKey::note_number(note.note_number),
            RestDetectionPolicy::SeparateByChannelAndNoteNumber => {
                RestKey::channel_and_note(note.channel, note.note_number)
            }
        })
    }
}

/// Detects the rests in a collection of objects.
///
/// Objects are processed in ascending start order regardless of input
/// order. For each key the detector tracks the rightmost end seen so far,
/// starting at tick 0; when an object of that key starts later than the
/// tracked end, the gap becomes a rest. Zero-length gaps are never
/// reported.
///
/// # Returns
///
/// The detected rests, ordered by start tick
pub fn rests<F>(objects: &[TimedObject], key_selector: F) -> Vec<Rest>
where
    F: Fn(&TimedObject) -> Option<RestKey>,
{
    let mut found = scan(objects, key_selector);
    found.sort_by_key(|r| (r.start, r.length));
    found
}

/// Detects rests using one of the ready-made policies.
pub fn rests_by_policy(objects: &[TimedObject], policy: RestDetectionPolicy) -> Vec<Rest> {
    rests(objects, |object| policy.key_for(object))
}

/// Returns the input objects with the detected rests interleaved in time
/// order.
///
/// The input objects keep their relative order; each rest is placed at
/// its start boundary, before any object starting at the same tick.
/// Filtering the rests back out reproduces the input sequence exactly.
pub fn with_rests<F>(objects: &[TimedObject], key_selector: F) -> Vec<TimedObject>
where
    F: Fn(&TimedObject) -> Option<RestKey>,
{
    let detected = scan(objects, key_selector);

    // Tag entries so the sort is total: rests win ties at a boundary,
    // and objects keep their input order via the stable sort.
    let mut combined: Vec<(u64, u8, TimedObject)> = Vec::with_capacity(objects.len() + detected.len());
    for rest in detected {
        combined.push((rest.start, 0, TimedObject::Rest(rest)));
    }
    for object in objects {
        combined.push((object.start(), 1, object.clone()));
    }
    combined.sort_by_key(|(start, tag, _)| (*start, *tag));
    combined.into_iter().map(|(_, _, object)| object).collect()
}

/// Interleaves rests using one of the ready-made policies.
pub fn with_rests_by_policy(
    objects: &[TimedObject],
    policy: RestDetectionPolicy,
) -> Vec<TimedObject> {
    with_rests(objects, |object| policy.key_for(object))
}

fn scan<F>(objects: &[TimedObject], key_selector: F) -> Vec<Rest>
where
    F: Fn(&TimedObject) -> Option<RestKey>,
{
    let mut order: Vec<&TimedObject> = objects.iter().collect();
    order.sort_by_key(|o| o.start());

    let mut tracked_ends: HashMap<RestKey, u64> = HashMap::new();
    let mut found = Vec::new();
    for object in order {
        let Some(key) = key_selector(object) else {
            continue;
        };
        let end = tracked_ends.entry(key).or_insert(0);
        let start = object.start();
        if *end < start {
            found.push(Rest::new(*end, start - *end, key));
        }
        *end = (*end).max(start + object.length());
    }
    found
}
