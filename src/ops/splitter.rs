//! Splitting engine.
//!
//! Cuts lengthed objects into consecutive parts: at a fixed repeating
//! step, into a target number of parts, at the lines of a repeating grid,
//! or once at a distance/ratio from an endpoint. Input collections may
//! contain `None` placeholders, which pass through untouched. All entry
//! points preserve the relative start order of the input.

use crate::objects::TimedObject;
use crate::time::convert::{length_to_ticks, span_to_ticks, ticks_to_length};
use crate::time::{TempoMap, TimeSpan, TimeSpanError, TimeSpanKind};
use tracing::debug;

/// Errors produced by split configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplitError {
    /// The step converts to zero ticks at some position, so the split
    /// would never advance.
    #[error("step is too small: it converts to zero ticks")]
    StepTooSmall,
    /// A parts count of zero was requested.
    #[error("parts number must be at least 1")]
    InvalidPartsNumber,
    /// A ratio outside `[0, 1]` was requested.
    #[error("ratio {0} is out of the [0, 1] range")]
    InvalidRatio(f64),
    /// A time span failed to resolve against the tempo map.
    #[error(transparent)]
    TimeSpan(#[from] TimeSpanError),
}

/// Which end of an object a distance or ratio is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAnchor {
    Start,
    End,
}

/// A repeating grid of split lines.
///
/// Lines are laid out from `start` forward, cycling through `steps`; an
/// empty step list yields no lines at all.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub start: TimeSpan,
    pub steps: Vec<TimeSpan>,
}

impl Grid {
    /// Creates a grid with a single repeating step.
    pub fn new(start: TimeSpan, step: TimeSpan) -> Self {
        Self {
            start,
            steps: vec![step],
        }
    }

    /// Creates a grid cycling through several steps.
    pub fn with_steps(start: TimeSpan, steps: Vec<TimeSpan>) -> Self {
        Self { start, steps }
    }

    /// Absolute tick positions of grid lines below `limit`.
    fn lines_below(&self, limit: u64, map: &TempoMap) -> Result<Vec<u64>, SplitError> {
        let mut lines = Vec::new();
        if self.steps.is_empty() {
            return Ok(lines);
        }

        let mut time = span_to_ticks(&self.start, 0, map)?;
        let mut step_index = 0;
        while time < limit {
            lines.push(time);
            let step = &self.steps[step_index % self.steps.len()];
            let step_ticks = length_to_ticks(step, time, map)?;
            if step_ticks == 0 {
                return Err(SplitError::StepTooSmall);
            }
            time += step_ticks;
            step_index += 1;
        }
        Ok(lines)
    }
}

/// Splits each object at `start + n*step` for n = 1, 2, ... while the
/// remainder still has positive length.
///
/// The step is re-converted to ticks at each running position, so a
/// metric step tracks tempo changes. A step that converts to zero ticks
/// anywhere is rejected.
pub fn split_by_step(
    objects: &[Option<TimedObject>],
    step: &TimeSpan,
    map: &TempoMap,
) -> Result<Vec<Option<TimedObject>>, SplitError> {
    let mut result = Vec::new();
    for slot in objects {
        let Some(object) = slot else {
            result.push(None);
            continue;
        };

        let mut time = object.start();
        let mut tail = Some(object.clone());
        while let Some(current) = tail {
            let step_ticks = length_to_ticks(step, time, map)?;
            if step_ticks == 0 {
                return Err(SplitError::StepTooSmall);
            }
            time += step_ticks;

            let split = current.split_at(time);
            if let Some(left) = split.left {
                result.push(Some(left));
            }
            tail = split.right;
        }
    }
    Ok(result)
}

/// Splits each object into exactly `parts_number` consecutive parts.
///
/// Each cut takes `round(remaining / remaining_parts)` measured in
/// `length_kind` (rounded half away from zero), so rounding error drifts
/// toward the final part. Zero-length objects yield `parts_number`
/// zero-length clones; if the object runs out early, the missing parts
/// are zero-length clones at its end.
pub fn split_by_parts(
    objects: &[Option<TimedObject>],
    parts_number: usize,
    length_kind: TimeSpanKind,
    map: &TempoMap,
) -> Result<Vec<Option<TimedObject>>, SplitError> {
    if parts_number == 0 {
        return Err(SplitError::InvalidPartsNumber);
    }

    let mut result = Vec::new();
    for slot in objects {
        let Some(object) = slot else {
            result.push(None);
            continue;
        };

        if parts_number == 1 {
            result.push(Some(object.clone()));
            continue;
        }
        if object.length() == 0 {
            for _ in 0..parts_number {
                result.push(Some(object.clone()));
            }
            continue;
        }

        let mut time = object.start();
        let mut tail = Some(object.clone());
        for parts_remaining in (2..=parts_number).rev() {
            let Some(current) = tail.take() else {
                // Tail exhausted by rounding: pad with parts of zero
                // length at the object's end.
                result.push(Some(object.collapsed_at(object.end())));
                continue;
            };

            let remaining_ticks = current.end() - time;
            let remaining = ticks_to_length(length_kind, remaining_ticks, time, map);
            let part = remaining.divide(parts_remaining as f64)?;
            let part_ticks = length_to_ticks(&part, time, map)?;
            time += part_ticks;

            let split = current.split_at(time);
            match split.left {
                Some(left) => result.push(Some(left)),
                // A part that rounded to nothing still occupies a slot.
                None => result.push(Some(object.collapsed_at(time))),
            }
            tail = split.right;
        }
        if let Some(last) = tail {
            result.push(Some(last));
        } else {
            result.push(Some(object.collapsed_at(object.end())));
        }
    }
    Ok(result)
}

/// Splits each object at every grid line strictly inside its time range.
///
/// Grid lines are absolute: each object's phase into the repeating step
/// cycle depends only on where its start falls relative to the grid
/// origin.
pub fn split_by_grid(
    objects: &[Option<TimedObject>],
    grid: &Grid,
    map: &TempoMap,
) -> Result<Vec<Option<TimedObject>>, SplitError> {
    let last_end = objects
        .iter()
        .flatten()
        .map(|o| o.end())
        .max()
        .unwrap_or(0);
    let lines = grid.lines_below(last_end, map)?;
    debug!(lines = lines.len(), last_end, "computed grid lines");

    let mut result = Vec::new();
    for slot in objects {
        let Some(object) = slot else {
            result.push(None);
            continue;
        };

        let mut tail = Some(object.clone());
        for &line in lines
            .iter()
            .filter(|&&line| line > object.start() && line < object.end())
        {
            let Some(current) = tail.take() else { break };
            let split = current.split_at(line);
            if let Some(left) = split.left {
                result.push(Some(left));
            }
            tail = split.right;
        }
        if let Some(last) = tail {
            result.push(Some(last));
        }
    }
    Ok(result)
}

/// Splits each object once at a fixed distance from one of its ends.
///
/// A distance of zero, or one reaching at or past the other end, yields
/// a single unsplit clone.
pub fn split_at_distance(
    objects: &[Option<TimedObject>],
    distance: &TimeSpan,
    from: SplitAnchor,
    map: &TempoMap,
) -> Result<Vec<Option<TimedObject>>, SplitError> {
    let mut result = Vec::new();
    for slot in objects {
        let Some(object) = slot else {
            result.push(None);
            continue;
        };
        let time = split_point(object, distance, from, map)?;
        push_single_split(&mut result, object, time);
    }
    Ok(result)
}

/// Splits each object once at `ratio` of its length, measured in
/// `length_kind` from one of its ends.
pub fn split_at_ratio(
    objects: &[Option<TimedObject>],
    ratio: f64,
    length_kind: TimeSpanKind,
    from: SplitAnchor,
    map: &TempoMap,
) -> Result<Vec<Option<TimedObject>>, SplitError> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(SplitError::InvalidRatio(ratio));
    }

    let mut result = Vec::new();
    for slot in objects {
        let Some(object) = slot else {
            result.push(None);
            continue;
        };
        let length = ticks_to_length(length_kind, object.length(), object.start(), map);
        let distance = length.multiply(ratio)?;
        let time = split_point(object, &distance, from, map)?;
        push_single_split(&mut result, object, time);
    }
    Ok(result)
}

fn split_point(
    object: &TimedObject,
    distance: &TimeSpan,
    from: SplitAnchor,
    map: &TempoMap,
) -> Result<u64, SplitError> {
    Ok(match from {
        SplitAnchor::Start => {
            let ticks = length_to_ticks(distance, object.start(), map)?;
            object.start().saturating_add(ticks)
        }
        SplitAnchor::End => {
            let ticks = length_to_ticks(distance, object.end(), map)?;
            object.end().saturating_sub(ticks)
        }
    })
}

fn push_single_split(result: &mut Vec<Option<TimedObject>>, object: &TimedObject, time: u64) {
    if time <= object.start() || time >= object.end() {
        result.push(Some(object.clone()));
        return;
    }
    let split = object.split_at(time);
    if let Some(left) = split.left {
        result.push(Some(left));
    }
    if let Some(right) = split.right {
        result.push(Some(right));
    }
}
