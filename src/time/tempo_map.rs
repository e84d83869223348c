//! Tempo and meter schedule.
//!
//! A tempo map is an immutable snapshot of tempo and time signature
//! changes over absolute ticks, plus the file's tick resolution. The
//! conversion routines in [`crate::time::convert`] read it; nothing in
//! the engine ever mutates a map it was handed.

use serde::{Deserialize, Serialize};

/// Default tick resolution (ticks per quarter note).
pub const DEFAULT_TICKS_PER_QUARTER: u16 = 480;

/// A tempo value, stored as microseconds per quarter note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tempo {
    micros_per_quarter: u64,
}

impl Tempo {
    /// The MIDI default tempo: 120 BPM.
    pub const DEFAULT: Tempo = Tempo {
        micros_per_quarter: 500_000,
    };

    /// Creates a tempo from microseconds per quarter note.
    pub fn from_micros_per_quarter(micros_per_quarter: u64) -> Self {
        Self { micros_per_quarter }
    }

    /// Creates a tempo from beats per minute.
    pub fn from_bpm(bpm: f64) -> Self {
        Self {
            micros_per_quarter: (60_000_000.0 / bpm + 0.5).floor() as u64,
        }
    }

    /// Microseconds per quarter note.
    pub fn micros_per_quarter(&self) -> u64 {
        self.micros_per_quarter
    }

    /// Beats (quarter notes) per minute.
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.micros_per_quarter as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A time signature: beats per bar over the beat unit (a power of two).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    /// The MIDI default meter: 4/4.
    pub const DEFAULT: TimeSignature = TimeSignature {
        numerator: 4,
        denominator: 4,
    };

    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Length of one beat in ticks at the given resolution.
    pub fn ticks_per_beat(&self, ticks_per_quarter: u16) -> u64 {
        ticks_per_quarter as u64 * 4 / self.denominator as u64
    }

    /// Length of one bar in ticks at the given resolution.
    pub fn ticks_per_bar(&self, ticks_per_quarter: u16) -> u64 {
        self.ticks_per_beat(ticks_per_quarter) * self.numerator as u64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// An ordered schedule of value changes keyed by absolute tick.
///
/// Before the first change the default value is in effect. Changes are
/// kept sorted by tick; setting a value at an existing tick replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueLine<T> {
    default: T,
    changes: Vec<(u64, T)>,
}

impl<T: Clone> ValueLine<T> {
    /// Creates a line with the given default value and no changes.
    pub fn new(default: T) -> Self {
        Self {
            default,
            changes: Vec::new(),
        }
    }

    /// The value in effect before any change.
    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Records a value change at the given tick.
    pub fn set(&mut self, tick: u64, value: T) {
        match self.changes.binary_search_by_key(&tick, |(t, _)| *t) {
            Ok(i) => self.changes[i].1 = value,
            Err(i) => self.changes.insert(i, (tick, value)),
        }
    }

    /// The value in effect at the given tick.
    pub fn value_at(&self, tick: u64) -> &T {
        match self
            .changes
            .iter()
            .rev()
            .find(|(change_tick, _)| *change_tick <= tick)
        {
            Some((_, value)) => value,
            None => &self.default,
        }
    }

    /// All recorded changes in ascending tick order.
    pub fn changes(&self) -> &[(u64, T)] {
        &self.changes
    }

    /// Changes with ticks in `[start, end)`.
    pub fn changes_in(&self, start: u64, end: u64) -> impl Iterator<Item = &(u64, T)> {
        self.changes
            .iter()
            .filter(move |(tick, _)| *tick >= start && *tick < end)
    }
}

/// An immutable schedule of tempo and meter changes over ticks.
///
/// Callers build a map once and hand it to the engines read-only; every
/// conversion anchors on it. Equality compares resolution and both change
/// lines, which is what the simultaneous file merge validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    ticks_per_quarter: u16,
    tempo_line: ValueLine<Tempo>,
    time_signature_line: ValueLine<TimeSignature>,
}

impl TempoMap {
    /// Creates a map with the given resolution, default tempo (120 BPM)
    /// and default meter (4/4).
    pub fn new(ticks_per_quarter: u16) -> Self {
        Self {
            ticks_per_quarter,
            tempo_line: ValueLine::new(Tempo::DEFAULT),
            time_signature_line: ValueLine::new(TimeSignature::DEFAULT),
        }
    }

    /// Creates a map with a single constant tempo.
    pub fn with_tempo(ticks_per_quarter: u16, tempo: Tempo) -> Self {
        let mut map = Self::new(ticks_per_quarter);
        map.tempo_line = ValueLine::new(tempo);
        map
    }

    /// Creates a map with a single constant time signature.
    pub fn with_time_signature(ticks_per_quarter: u16, time_signature: TimeSignature) -> Self {
        let mut map = Self::new(ticks_per_quarter);
        map.time_signature_line = ValueLine::new(time_signature);
        map
    }

    /// Records a tempo change at the given tick.
    pub fn set_tempo_change(&mut self, tick: u64, tempo: Tempo) {
        self.tempo_line.set(tick, tempo);
    }

    /// Records a time signature change at the given tick.
    pub fn set_time_signature_change(&mut self, tick: u64, time_signature: TimeSignature) {
        self.time_signature_line.set(tick, time_signature);
    }

    /// Tick resolution (ticks per quarter note).
    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    /// Ticks per whole note.
    pub fn ticks_per_whole(&self) -> u64 {
        self.ticks_per_quarter as u64 * 4
    }

    /// The tempo in effect at the given tick.
    pub fn tempo_at(&self, tick: u64) -> Tempo {
        *self.tempo_line.value_at(tick)
    }

    /// The time signature in effect at the given tick.
    pub fn time_signature_at(&self, tick: u64) -> TimeSignature {
        *self.time_signature_line.value_at(tick)
    }

    /// The tempo change line.
    pub fn tempo_line(&self) -> &ValueLine<Tempo> {
        &self.tempo_line
    }

    /// The time signature change line.
    pub fn time_signature_line(&self) -> &ValueLine<TimeSignature> {
        &self.time_signature_line
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(DEFAULT_TICKS_PER_QUARTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_bpm_conversion() {
        assert_eq!(Tempo::from_bpm(120.0), Tempo::DEFAULT);
        assert!((Tempo::DEFAULT.bpm() - 120.0).abs() < 1e-9);
        assert_eq!(Tempo::from_bpm(60.0).micros_per_quarter(), 1_000_000);
    }

    #[test]
    fn test_value_line_lookup() {
        let mut line = ValueLine::new(Tempo::DEFAULT);
        line.set(1000, Tempo::from_bpm(60.0));
        line.set(2000, Tempo::from_bpm(90.0));

        assert_eq!(*line.value_at(0), Tempo::DEFAULT);
        assert_eq!(*line.value_at(999), Tempo::DEFAULT);
        assert_eq!(*line.value_at(1000), Tempo::from_bpm(60.0));
        assert_eq!(*line.value_at(5000), Tempo::from_bpm(90.0));
    }

    #[test]
    fn test_value_line_replace_at_same_tick() {
        let mut line = ValueLine::new(TimeSignature::DEFAULT);
        line.set(100, TimeSignature::new(3, 4));
        line.set(100, TimeSignature::new(6, 8));
        assert_eq!(line.changes().len(), 1);
        assert_eq!(*line.value_at(100), TimeSignature::new(6, 8));
    }

    #[test]
    fn test_value_line_keeps_order() {
        let mut line = ValueLine::new(0u32);
        line.set(300, 3);
        line.set(100, 1);
        line.set(200, 2);
        let ticks: Vec<u64> = line.changes().iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![100, 200, 300]);
    }

    #[test]
    fn test_time_signature_tick_geometry() {
        let sig = TimeSignature::new(6, 8);
        assert_eq!(sig.ticks_per_beat(480), 240);
        assert_eq!(sig.ticks_per_bar(480), 1440);
    }

    #[test]
    fn test_tempo_map_equality() {
        let mut a = TempoMap::new(480);
        a.set_tempo_change(100, Tempo::from_bpm(90.0));
        let mut b = TempoMap::new(480);
        b.set_tempo_change(100, Tempo::from_bpm(90.0));
        assert_eq!(a, b);

        b.set_time_signature_change(0, TimeSignature::new(3, 4));
        assert_ne!(a, b);
    }
}
