//! Time span value types and their arithmetic.
//!
//! A time span expresses a musical position or duration in one of several
//! units: raw ticks, metric (clock) time, a fraction of a whole note, or
//! bar/beat coordinates in three flavors. Same-unit arithmetic is closed
//! form on components; combining spans of different units produces a
//! deferred [`MathTimeSpan`] that a tempo-map-aware converter resolves
//! later (see [`crate::time::convert`]).

use super::fraction::Fraction;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Tolerance used when comparing the cents component of a
/// bar/beat/cents span.
pub const CENTS_EPSILON: f64 = 1e-5;

/// Tolerance used when comparing the fractional beats component of a
/// bar/beat/fraction span.
pub const BEAT_EPSILON: f64 = 1e-5;

/// Errors produced by time span arithmetic and parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeSpanError {
    /// Subtraction would produce a negative span.
    #[error("subtraction produces a negative time span")]
    NegativeResult,
    /// Multiplier is negative, or divisor is not strictly positive.
    #[error("invalid scalar {0} for time span scaling")]
    InvalidScalar(f64),
    /// The requested combination of operands is not defined.
    #[error("incompatible time span operands: {0}")]
    IncompatibleOperands(String),
    /// Text does not match any canonical time span format.
    #[error("cannot parse time span from '{0}'")]
    Parse(String),
}

/// Names the unit a time span is expressed in.
///
/// Used to request a target unit for tick conversions without carrying a
/// span value around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSpanKind {
    Ticks,
    Metric,
    Musical,
    BarBeatTicks,
    BarBeatFraction,
    BarBeatCents,
}

/// How the operands of a deferred combination should be anchored when a
/// tempo map resolves it.
///
/// A "time" operand is an absolute position; a "length" operand is a
/// relative duration that must be anchored at a concrete tick before it
/// can be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSpanMode {
    /// Both operands are absolute positions. Addition is not defined in
    /// this mode; subtraction yields a length.
    TimeTime,
    /// The left operand is a position, the right a duration.
    TimeLength,
    /// Both operands are durations.
    LengthLength,
}

/// The operation a deferred combination performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathOperation {
    Add,
    Subtract,
}

/// A deferred combination of two spans expressed in different units.
///
/// Carries everything a tempo-map evaluator needs to resolve the pair to
/// ticks: both operands, the operation, and the anchoring mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathTimeSpan {
    pub lhs: TimeSpan,
    pub rhs: TimeSpan,
    pub operation: MathOperation,
    pub mode: TimeSpanMode,
}

/// A metric (wall clock) duration stored as total microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricTime {
    micros: u64,
}

impl MetricTime {
    /// Creates a metric time from hour/minute/second/millisecond components.
    pub fn new(hours: u64, minutes: u64, seconds: u64, milliseconds: u64) -> Self {
        let micros =
            (((hours * 60 + minutes) * 60 + seconds) * 1000 + milliseconds) * 1000;
        Self { micros }
    }

    /// Creates a metric time from a total microsecond count.
    pub fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    /// Total duration in microseconds.
    pub fn total_micros(&self) -> u64 {
        self.micros
    }

    /// Hours component.
    pub fn hours(&self) -> u64 {
        self.micros / 3_600_000_000
    }

    /// Minutes component (0-59).
    pub fn minutes(&self) -> u64 {
        self.micros / 60_000_000 % 60
    }

    /// Seconds component (0-59).
    pub fn seconds(&self) -> u64 {
        self.micros / 1_000_000 % 60
    }

    /// Milliseconds component (0-999).
    pub fn milliseconds(&self) -> u64 {
        self.micros / 1000 % 1000
    }
}

impl fmt::Display for MetricTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.hours(),
            self.minutes(),
            self.seconds(),
            self.milliseconds()
        )
    }
}

/// A musical position or duration in one of the supported units.
///
/// Bar/beat variants are purely positional: arithmetic never renormalizes
/// beats against a meter, so a span of 0 bars and 7 beats stays 7 beats.
/// The cents component of [`TimeSpan::BarBeatCents`] is the one exception;
/// it is kept in `[0, 100)` by carrying overflow into beats, which is
/// meter-independent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TimeSpan {
    /// Raw tick count.
    Ticks(u64),
    /// Clock-time duration.
    Metric(MetricTime),
    /// Fraction of a whole note.
    Musical(Fraction),
    /// Bars, beats and leftover ticks; compared lexicographically.
    BarBeatTicks { bars: u64, beats: u64, ticks: u64 },
    /// Bars plus a fractional beat count; compared lexicographically.
    BarBeatFraction { bars: u64, beats: f64 },
    /// Bars, beats and hundredths of a beat in `[0, 100)`.
    BarBeatCents { bars: u64, beats: u64, cents: f64 },
    /// A deferred cross-unit combination.
    Math(Box<MathTimeSpan>),
}

impl TimeSpan {
    pub const WHOLE: TimeSpan = TimeSpan::Musical(Fraction::from_lowest_terms(1, 1));
    pub const HALF: TimeSpan = TimeSpan::Musical(Fraction::from_lowest_terms(1, 2));
    pub const QUARTER: TimeSpan = TimeSpan::Musical(Fraction::from_lowest_terms(1, 4));
    pub const EIGHTH: TimeSpan = TimeSpan::Musical(Fraction::from_lowest_terms(1, 8));
    pub const SIXTEENTH: TimeSpan = TimeSpan::Musical(Fraction::from_lowest_terms(1, 16));
    pub const THIRTY_SECOND: TimeSpan = TimeSpan::Musical(Fraction::from_lowest_terms(1, 32));
    pub const SIXTY_FOURTH: TimeSpan = TimeSpan::Musical(Fraction::from_lowest_terms(1, 64));

    /// Creates a musical span of `numerator/denominator` of a whole note.
    ///
    /// # Returns
    ///
    /// None if `denominator` is zero
    pub fn musical(numerator: u64, denominator: u64) -> Option<TimeSpan> {
        Fraction::new(numerator, denominator).map(TimeSpan::Musical)
    }

    /// Creates a dotted musical span: each dot extends the base duration
    /// by half of the previous extension.
    pub fn musical_dotted(numerator: u64, denominator: u64, dots: u32) -> Option<TimeSpan> {
        let base = Fraction::new(numerator, denominator)?;
        let factor = Fraction::new(2u64.checked_pow(dots + 1)? - 1, 2u64.checked_pow(dots)?)?;
        Some(TimeSpan::Musical(base.multiply(&factor)))
    }

    /// Creates a tuplet span: `tuplet_notes` notes played in the space of
    /// `space_notes` notes of the base duration.
    pub fn musical_tuplet(
        numerator: u64,
        denominator: u64,
        tuplet_notes: u64,
        space_notes: u64,
    ) -> Option<TimeSpan> {
        let base = Fraction::new(numerator, denominator)?;
        let factor = Fraction::new(space_notes, tuplet_notes)?;
        Some(TimeSpan::Musical(base.multiply(&factor)))
    }

    /// Creates a triplet span (three notes in the space of two).
    pub fn musical_triplet(numerator: u64, denominator: u64) -> Option<TimeSpan> {
        Self::musical_tuplet(numerator, denominator, 3, 2)
    }

    /// Returns the unit this span is expressed in, or None for a deferred
    /// combination.
    pub fn kind(&self) -> Option<TimeSpanKind> {
        match self {
            TimeSpan::Ticks(_) => Some(TimeSpanKind::Ticks),
            TimeSpan::Metric(_) => Some(TimeSpanKind::Metric),
            TimeSpan::Musical(_) => Some(TimeSpanKind::Musical),
            TimeSpan::BarBeatTicks { .. } => Some(TimeSpanKind::BarBeatTicks),
            TimeSpan::BarBeatFraction { .. } => Some(TimeSpanKind::BarBeatFraction),
            TimeSpan::BarBeatCents { .. } => Some(TimeSpanKind::BarBeatCents),
            TimeSpan::Math(_) => None,
        }
    }

    /// Returns the zero span of the given unit.
    pub fn zero(kind: TimeSpanKind) -> TimeSpan {
        match kind {
            TimeSpanKind::Ticks => TimeSpan::Ticks(0),
            TimeSpanKind::Metric => TimeSpan::Metric(MetricTime::from_micros(0)),
            TimeSpanKind::Musical => TimeSpan::Musical(Fraction::ZERO),
            TimeSpanKind::BarBeatTicks => TimeSpan::BarBeatTicks {
                bars: 0,
                beats: 0,
                ticks: 0,
            },
            TimeSpanKind::BarBeatFraction => TimeSpan::BarBeatFraction {
                bars: 0,
                beats: 0.0,
            },
            TimeSpanKind::BarBeatCents => TimeSpan::BarBeatCents {
                bars: 0,
                beats: 0,
                cents: 0.0,
            },
        }
    }

    /// Returns true if this span denotes zero duration.
    ///
    /// A deferred combination is never considered zero, since its value
    /// depends on a tempo map.
    pub fn is_zero(&self) -> bool {
        match self {
            TimeSpan::Ticks(t) => *t == 0,
            TimeSpan::Metric(m) => m.total_micros() == 0,
            TimeSpan::Musical(f) => f.is_zero(),
            TimeSpan::BarBeatTicks { bars, beats, ticks } => {
                *bars == 0 && *beats == 0 && *ticks == 0
            }
            TimeSpan::BarBeatFraction { bars, beats } => *bars == 0 && *beats == 0.0,
            TimeSpan::BarBeatCents { bars, beats, cents } => {
                *bars == 0 && *beats == 0 && cents.abs() < CENTS_EPSILON
            }
            TimeSpan::Math(_) => false,
        }
    }

    /// Adds another span to this one.
    ///
    /// Same-unit pairs are combined component-wise; different units produce
    /// a deferred combination resolved later against a tempo map.
    ///
    /// # Errors
    ///
    /// [`TimeSpanError::IncompatibleOperands`] when `mode` is
    /// [`TimeSpanMode::TimeTime`]: adding two absolute positions is
    /// meaningless.
    pub fn add(&self, other: &TimeSpan, mode: TimeSpanMode) -> Result<TimeSpan, TimeSpanError> {
        if mode == TimeSpanMode::TimeTime {
            return Err(TimeSpanError::IncompatibleOperands(
                "cannot add two absolute times".to_string(),
            ));
        }

        match (self, other) {
            (TimeSpan::Ticks(a), TimeSpan::Ticks(b)) => Ok(TimeSpan::Ticks(a + b)),
            (TimeSpan::Metric(a), TimeSpan::Metric(b)) => Ok(TimeSpan::Metric(
                MetricTime::from_micros(a.total_micros() + b.total_micros()),
            )),
            (TimeSpan::Musical(a), TimeSpan::Musical(b)) => Ok(TimeSpan::Musical(a.add(b))),
            (
                TimeSpan::BarBeatTicks { bars, beats, ticks },
                TimeSpan::BarBeatTicks {
                    bars: b2,
                    beats: bt2,
                    ticks: t2,
                },
            ) => Ok(TimeSpan::BarBeatTicks {
                bars: bars + b2,
                beats: beats + bt2,
                ticks: ticks + t2,
            }),
            (
                TimeSpan::BarBeatFraction { bars, beats },
                TimeSpan::BarBeatFraction {
                    bars: b2,
                    beats: bt2,
                },
            ) => Ok(TimeSpan::BarBeatFraction {
                bars: bars + b2,
                beats: beats + bt2,
            }),
            (
                TimeSpan::BarBeatCents { bars, beats, cents },
                TimeSpan::BarBeatCents {
                    bars: b2,
                    beats: bt2,
                    cents: c2,
                },
            ) => Ok(normalize_cents(bars + b2, beats + bt2, cents + c2)),
            _ => Ok(TimeSpan::Math(Box::new(MathTimeSpan {
                lhs: self.clone(),
                rhs: other.clone(),
                operation: MathOperation::Add,
                mode,
            }))),
        }
    }

    /// Subtracts another span from this one.
    ///
    /// Same-unit pairs are combined component-wise without borrowing
    /// between bar/beat components (arithmetic is positional, not
    /// meter-aware); different units produce a deferred combination.
    ///
    /// # Errors
    ///
    /// [`TimeSpanError::NegativeResult`] if any component of a same-unit
    /// subtraction would go negative.
    pub fn subtract(
        &self,
        other: &TimeSpan,
        mode: TimeSpanMode,
    ) -> Result<TimeSpan, TimeSpanError> {
        match (self, other) {
            (TimeSpan::Ticks(a), TimeSpan::Ticks(b)) => a
                .checked_sub(*b)
                .map(TimeSpan::Ticks)
                .ok_or(TimeSpanError::NegativeResult),
            (TimeSpan::Metric(a), TimeSpan::Metric(b)) => a
                .total_micros()
                .checked_sub(b.total_micros())
                .map(|m| TimeSpan::Metric(MetricTime::from_micros(m)))
                .ok_or(TimeSpanError::NegativeResult),
            (TimeSpan::Musical(a), TimeSpan::Musical(b)) => a
                .checked_sub(b)
                .map(TimeSpan::Musical)
                .ok_or(TimeSpanError::NegativeResult),
            (
                TimeSpan::BarBeatTicks { bars, beats, ticks },
                TimeSpan::BarBeatTicks {
                    bars: b2,
                    beats: bt2,
                    ticks: t2,
                },
            ) => {
                let bars = bars.checked_sub(*b2).ok_or(TimeSpanError::NegativeResult)?;
                let beats = beats
                    .checked_sub(*bt2)
                    .ok_or(TimeSpanError::NegativeResult)?;
                let ticks = ticks
                    .checked_sub(*t2)
                    .ok_or(TimeSpanError::NegativeResult)?;
                Ok(TimeSpan::BarBeatTicks { bars, beats, ticks })
            }
            (
                TimeSpan::BarBeatFraction { bars, beats },
                TimeSpan::BarBeatFraction {
                    bars: b2,
                    beats: bt2,
                },
            ) => {
                let bars = bars.checked_sub(*b2).ok_or(TimeSpanError::NegativeResult)?;
                let beats = beats - bt2;
                if beats < -BEAT_EPSILON {
                    return Err(TimeSpanError::NegativeResult);
                }
                Ok(TimeSpan::BarBeatFraction {
                    bars,
                    beats: beats.max(0.0),
                })
            }
            (
                TimeSpan::BarBeatCents { bars, beats, cents },
                TimeSpan::BarBeatCents {
                    bars: b2,
                    beats: bt2,
                    cents: c2,
                },
            ) => {
                let bars = bars.checked_sub(*b2).ok_or(TimeSpanError::NegativeResult)?;
                let beats = beats
                    .checked_sub(*bt2)
                    .ok_or(TimeSpanError::NegativeResult)?;
                let cents = cents - c2;
                if cents < -CENTS_EPSILON {
                    return Err(TimeSpanError::NegativeResult);
                }
                Ok(TimeSpan::BarBeatCents {
                    bars,
                    beats,
                    cents: cents.max(0.0),
                })
            }
            _ => Ok(TimeSpan::Math(Box::new(MathTimeSpan {
                lhs: self.clone(),
                rhs: other.clone(),
                operation: MathOperation::Subtract,
                mode,
            }))),
        }
    }

    /// Scales this span by a non-negative multiplier, rounding each
    /// integer component half away from zero.
    pub fn multiply(&self, multiplier: f64) -> Result<TimeSpan, TimeSpanError> {
        if multiplier < 0.0 || !multiplier.is_finite() {
            return Err(TimeSpanError::InvalidScalar(multiplier));
        }
        Ok(self.scale(multiplier))
    }

    /// Divides this span by a strictly positive divisor, rounding each
    /// integer component half away from zero.
    pub fn divide(&self, divisor: f64) -> Result<TimeSpan, TimeSpanError> {
        if divisor <= 0.0 || !divisor.is_finite() {
            return Err(TimeSpanError::InvalidScalar(divisor));
        }
        Ok(self.scale(1.0 / divisor))
    }

    fn scale(&self, factor: f64) -> TimeSpan {
        match self {
            TimeSpan::Ticks(t) => TimeSpan::Ticks(round_scaled(*t, factor)),
            TimeSpan::Metric(m) => {
                TimeSpan::Metric(MetricTime::from_micros(round_scaled(m.total_micros(), factor)))
            }
            TimeSpan::Musical(f) => {
                let numerator = round_scaled(f.numerator(), factor);
                // Denominator is untouched, so reduction cannot fail.
                match Fraction::new(numerator, f.denominator()) {
                    Some(scaled) => TimeSpan::Musical(scaled),
                    None => TimeSpan::Musical(Fraction::ZERO),
                }
            }
            TimeSpan::BarBeatTicks { bars, beats, ticks } => TimeSpan::BarBeatTicks {
                bars: round_scaled(*bars, factor),
                beats: round_scaled(*beats, factor),
                ticks: round_scaled(*ticks, factor),
            },
            TimeSpan::BarBeatFraction { bars, beats } => TimeSpan::BarBeatFraction {
                bars: round_scaled(*bars, factor),
                beats: beats * factor,
            },
            TimeSpan::BarBeatCents { bars, beats, cents } => normalize_cents(
                round_scaled(*bars, factor),
                round_scaled(*beats, factor),
                cents * factor,
            ),
            TimeSpan::Math(m) => TimeSpan::Math(Box::new(MathTimeSpan {
                lhs: m.lhs.scale(factor),
                rhs: m.rhs.scale(factor),
                operation: m.operation,
                mode: m.mode,
            })),
        }
    }
}

impl PartialEq for TimeSpan {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TimeSpan::Ticks(a), TimeSpan::Ticks(b)) => a == b,
            (TimeSpan::Metric(a), TimeSpan::Metric(b)) => a == b,
            (TimeSpan::Musical(a), TimeSpan::Musical(b)) => a == b,
            (
                TimeSpan::BarBeatTicks { bars, beats, ticks },
                TimeSpan::BarBeatTicks {
                    bars: b2,
                    beats: bt2,
                    ticks: t2,
                },
            ) => bars == b2 && beats == bt2 && ticks == t2,
            (
                TimeSpan::BarBeatFraction { bars, beats },
                TimeSpan::BarBeatFraction {
                    bars: b2,
                    beats: bt2,
                },
            ) => bars == b2 && (beats - bt2).abs() < BEAT_EPSILON,
            (
                TimeSpan::BarBeatCents { bars, beats, cents },
                TimeSpan::BarBeatCents {
                    bars: b2,
                    beats: bt2,
                    cents: c2,
                },
            ) => bars == b2 && beats == bt2 && (cents - c2).abs() < CENTS_EPSILON,
            (TimeSpan::Math(a), TimeSpan::Math(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for TimeSpan {
    /// Orders two spans of the same unit; spans of different units (and
    /// deferred combinations) are not comparable without a tempo map.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (TimeSpan::Ticks(a), TimeSpan::Ticks(b)) => Some(a.cmp(b)),
            (TimeSpan::Metric(a), TimeSpan::Metric(b)) => Some(a.cmp(b)),
            (TimeSpan::Musical(a), TimeSpan::Musical(b)) => Some(a.cmp(b)),
            (
                TimeSpan::BarBeatTicks { bars, beats, ticks },
                TimeSpan::BarBeatTicks {
                    bars: b2,
                    beats: bt2,
                    ticks: t2,
                },
            ) => Some((bars, beats, ticks).cmp(&(b2, bt2, t2))),
            (
                TimeSpan::BarBeatFraction { bars, beats },
                TimeSpan::BarBeatFraction {
                    bars: b2,
                    beats: bt2,
                },
            ) => match bars.cmp(b2) {
                Ordering::Equal => beats.partial_cmp(bt2),
                ord => Some(ord),
            },
            (
                TimeSpan::BarBeatCents { bars, beats, cents },
                TimeSpan::BarBeatCents {
                    bars: b2,
                    beats: bt2,
                    cents: c2,
                },
            ) => match (bars, beats).cmp(&(b2, bt2)) {
                Ordering::Equal => {
                    if (cents - c2).abs() < CENTS_EPSILON {
                        Some(Ordering::Equal)
                    } else {
                        cents.partial_cmp(c2)
                    }
                }
                ord => Some(ord),
            },
            _ => None,
        }
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSpan::Ticks(t) => write!(f, "{}", t),
            TimeSpan::Metric(m) => write!(f, "{}", m),
            TimeSpan::Musical(fr) => write!(f, "{}", fr),
            TimeSpan::BarBeatTicks { bars, beats, ticks } => {
                write!(f, "{}.{}.{}", bars, beats, ticks)
            }
            TimeSpan::BarBeatFraction { bars, beats } => write!(f, "{}_{}", bars, beats),
            TimeSpan::BarBeatCents { bars, beats, cents } => {
                write!(f, "{}_{}_{}", bars, beats, cents)
            }
            TimeSpan::Math(m) => {
                let op = match m.operation {
                    MathOperation::Add => '+',
                    MathOperation::Subtract => '-',
                };
                write!(f, "({} {} {})", m.lhs, op, m.rhs)
            }
        }
    }
}

impl FromStr for TimeSpan {
    type Err = TimeSpanError;

    /// Parses a span from its canonical form. Formats are mutually
    /// unambiguous:
    ///
    /// * `h:m:s:ms` - metric
    /// * `bars_beats_cents` - bar/beat/cents
    /// * `bars_beats` (fractional beats) - bar/beat/fraction
    /// * `n/d` - musical
    /// * `bars.beats.ticks` - bar/beat/ticks
    /// * plain integer - ticks
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || TimeSpanError::Parse(s.to_string());

        if s.contains(':') {
            let parts: Vec<&str> = s.split(':').collect();
            let nums: Vec<u64> = parts
                .iter()
                .map(|p| p.trim().parse::<u64>())
                .collect::<Result<_, _>>()
                .map_err(|_| err())?;
            return match nums.as_slice() {
                [h, m, sec, ms] => Ok(TimeSpan::Metric(MetricTime::new(*h, *m, *sec, *ms))),
                [m, sec, ms] => Ok(TimeSpan::Metric(MetricTime::new(0, *m, *sec, *ms))),
                _ => Err(err()),
            };
        }

        if s.contains('_') {
            let parts: Vec<&str> = s.split('_').collect();
            return match parts.as_slice() {
                [bars, beats, cents] => {
                    let bars = bars.parse::<u64>().map_err(|_| err())?;
                    let beats = beats.parse::<u64>().map_err(|_| err())?;
                    let cents = cents.parse::<f64>().map_err(|_| err())?;
                    if !(0.0..100.0).contains(&cents) {
                        return Err(err());
                    }
                    Ok(TimeSpan::BarBeatCents { bars, beats, cents })
                }
                [bars, beats] => {
                    let bars = bars.parse::<u64>().map_err(|_| err())?;
                    let beats = beats.parse::<f64>().map_err(|_| err())?;
                    if beats < 0.0 {
                        return Err(err());
                    }
                    Ok(TimeSpan::BarBeatFraction { bars, beats })
                }
                _ => Err(err()),
            };
        }

        if s.contains('/') {
            let fraction: Fraction = s.parse().map_err(|_| err())?;
            return Ok(TimeSpan::Musical(fraction));
        }

        if s.contains('.') {
            let parts: Vec<&str> = s.split('.').collect();
            if let [bars, beats, ticks] = parts.as_slice() {
                let bars = bars.parse::<u64>().map_err(|_| err())?;
                let beats = beats.parse::<u64>().map_err(|_| err())?;
                let ticks = ticks.parse::<u64>().map_err(|_| err())?;
                return Ok(TimeSpan::BarBeatTicks { bars, beats, ticks });
            }
            return Err(err());
        }

        s.parse::<u64>().map(TimeSpan::Ticks).map_err(|_| err())
    }
}

/// Rounds `value * factor` half away from zero. Both inputs are
/// non-negative.
pub(crate) fn round_scaled(value: u64, factor: f64) -> u64 {
    (value as f64 * factor + 0.5).floor() as u64
}

fn normalize_cents(bars: u64, beats: u64, cents: f64) -> TimeSpan {
    if cents >= 100.0 {
        let carry = (cents / 100.0).floor();
        TimeSpan::BarBeatCents {
            bars,
            beats: beats + carry as u64,
            cents: cents - carry * 100.0,
        }
    } else {
        TimeSpan::BarBeatCents { bars, beats, cents }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_components() {
        let m = MetricTime::new(1, 2, 3, 456);
        assert_eq!(m.hours(), 1);
        assert_eq!(m.minutes(), 2);
        assert_eq!(m.seconds(), 3);
        assert_eq!(m.milliseconds(), 456);
        assert_eq!(m.total_micros(), 3_723_456_000);
    }

    #[test]
    fn test_same_variant_add() {
        let a = TimeSpan::Ticks(100);
        let b = TimeSpan::Ticks(50);
        assert_eq!(
            a.add(&b, TimeSpanMode::TimeLength).unwrap(),
            TimeSpan::Ticks(150)
        );

        let q = TimeSpan::QUARTER;
        assert_eq!(
            q.add(&q, TimeSpanMode::LengthLength).unwrap(),
            TimeSpan::HALF
        );
    }

    #[test]
    fn test_time_time_add_rejected() {
        let a = TimeSpan::Ticks(100);
        let b = TimeSpan::Ticks(50);
        assert!(matches!(
            a.add(&b, TimeSpanMode::TimeTime),
            Err(TimeSpanError::IncompatibleOperands(_))
        ));
    }

    #[test]
    fn test_same_variant_subtract_negative() {
        let a = TimeSpan::Ticks(10);
        let b = TimeSpan::Ticks(20);
        assert_eq!(
            a.subtract(&b, TimeSpanMode::TimeTime),
            Err(TimeSpanError::NegativeResult)
        );
        assert_eq!(
            b.subtract(&a, TimeSpanMode::TimeTime).unwrap(),
            TimeSpan::Ticks(10)
        );
    }

    #[test]
    fn test_bar_beat_subtract_no_borrowing() {
        let a = TimeSpan::BarBeatTicks {
            bars: 2,
            beats: 0,
            ticks: 0,
        };
        let b = TimeSpan::BarBeatTicks {
            bars: 1,
            beats: 1,
            ticks: 0,
        };
        // Beats cannot borrow from bars: the meter is unknown here.
        assert_eq!(
            a.subtract(&b, TimeSpanMode::LengthLength),
            Err(TimeSpanError::NegativeResult)
        );
    }

    #[test]
    fn test_cross_variant_produces_math_span() {
        let a = TimeSpan::Ticks(480);
        let b = TimeSpan::QUARTER;
        let sum = a.add(&b, TimeSpanMode::TimeLength).unwrap();
        match sum {
            TimeSpan::Math(m) => {
                assert_eq!(m.operation, MathOperation::Add);
                assert_eq!(m.mode, TimeSpanMode::TimeLength);
                assert_eq!(m.lhs, TimeSpan::Ticks(480));
            }
            other => panic!("expected math span, got {:?}", other),
        }
    }

    #[test]
    fn test_multiply_rounds_half_away() {
        assert_eq!(
            TimeSpan::Ticks(5).multiply(0.5).unwrap(),
            TimeSpan::Ticks(3)
        );
        assert_eq!(
            TimeSpan::Ticks(100).multiply(1.5).unwrap(),
            TimeSpan::Ticks(150)
        );
        assert!(TimeSpan::Ticks(1).multiply(-1.0).is_err());
    }

    #[test]
    fn test_divide_validates_divisor() {
        assert!(TimeSpan::Ticks(100).divide(0.0).is_err());
        assert!(TimeSpan::Ticks(100).divide(-2.0).is_err());
        assert_eq!(
            TimeSpan::Ticks(100).divide(3.0).unwrap(),
            TimeSpan::Ticks(33)
        );
    }

    #[test]
    fn test_cents_carry() {
        let a = TimeSpan::BarBeatCents {
            bars: 0,
            beats: 1,
            cents: 60.0,
        };
        let b = TimeSpan::BarBeatCents {
            bars: 0,
            beats: 0,
            cents: 50.0,
        };
        assert_eq!(
            a.add(&b, TimeSpanMode::LengthLength).unwrap(),
            TimeSpan::BarBeatCents {
                bars: 0,
                beats: 2,
                cents: 10.0,
            }
        );
    }

    #[test]
    fn test_cents_epsilon_equality() {
        let a = TimeSpan::BarBeatCents {
            bars: 1,
            beats: 2,
            cents: 50.0,
        };
        let b = TimeSpan::BarBeatCents {
            bars: 1,
            beats: 2,
            cents: 50.0 + CENTS_EPSILON / 2.0,
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_fractional_beats_epsilon() {
        let a = TimeSpan::BarBeatFraction {
            bars: 1,
            beats: 2.5,
        };
        let b = TimeSpan::BarBeatFraction {
            bars: 1,
            beats: 2.5 + BEAT_EPSILON / 2.0,
        };
        assert_eq!(a, b);
        // A sub-tolerance deficit clamps to zero instead of erroring.
        assert_eq!(
            a.subtract(&b, TimeSpanMode::LengthLength).unwrap(),
            TimeSpan::BarBeatFraction {
                bars: 0,
                beats: 0.0,
            }
        );
    }

    #[test]
    fn test_lexicographic_comparison() {
        let a = TimeSpan::BarBeatTicks {
            bars: 1,
            beats: 0,
            ticks: 0,
        };
        let b = TimeSpan::BarBeatTicks {
            bars: 0,
            beats: 100,
            ticks: 0,
        };
        // No meter normalization: one bar always sorts above any beat count.
        assert!(a > b);
    }

    #[test]
    fn test_dotted_and_triplet() {
        assert_eq!(
            TimeSpan::musical_dotted(1, 4, 1).unwrap(),
            TimeSpan::musical(3, 8).unwrap()
        );
        assert_eq!(
            TimeSpan::musical_triplet(1, 8).unwrap(),
            TimeSpan::musical(1, 12).unwrap()
        );
    }

    #[test]
    fn test_parse_all_variants() {
        assert_eq!("480".parse::<TimeSpan>().unwrap(), TimeSpan::Ticks(480));
        assert_eq!(
            "0:0:1:500".parse::<TimeSpan>().unwrap(),
            TimeSpan::Metric(MetricTime::new(0, 0, 1, 500))
        );
        assert_eq!("3/4".parse::<TimeSpan>().unwrap(), TimeSpan::musical(3, 4).unwrap());
        assert_eq!(
            "1.2.3".parse::<TimeSpan>().unwrap(),
            TimeSpan::BarBeatTicks {
                bars: 1,
                beats: 2,
                ticks: 3,
            }
        );
        assert_eq!(
            "1_2.5".parse::<TimeSpan>().unwrap(),
            TimeSpan::BarBeatFraction {
                bars: 1,
                beats: 2.5,
            }
        );
        assert_eq!(
            "1_2_50".parse::<TimeSpan>().unwrap(),
            TimeSpan::BarBeatCents {
                bars: 1,
                beats: 2,
                cents: 50.0,
            }
        );
        assert!("garbage".parse::<TimeSpan>().is_err());
        assert!("1_2_150".parse::<TimeSpan>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let spans = [
            TimeSpan::Ticks(42),
            TimeSpan::Metric(MetricTime::new(0, 1, 30, 250)),
            TimeSpan::musical(3, 16).unwrap(),
            TimeSpan::BarBeatTicks {
                bars: 2,
                beats: 1,
                ticks: 120,
            },
        ];
        for span in &spans {
            let parsed: TimeSpan = span.to_string().parse().unwrap();
            assert_eq!(&parsed, span);
        }
    }
}
