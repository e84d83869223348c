//! Conversion between ticks and time span units, anchored on a tempo map.
//!
//! Every conversion takes an anchor: the absolute tick where the span
//! starts. An absolute position is just a length anchored at tick zero,
//! so one pair of primitives ([`span_to_ticks`] / [`ticks_to_span`])
//! serves both the time and the length entry points.

use super::fraction::Fraction;
use super::span::{MathOperation, MetricTime, TimeSpan, TimeSpanError, TimeSpanKind, TimeSpanMode};
use super::tempo_map::TempoMap;
use std::cmp::Ordering;
use tracing::trace;

/// Converts an absolute position to ticks.
pub fn time_to_ticks(span: &TimeSpan, map: &TempoMap) -> Result<u64, TimeSpanError> {
    span_to_ticks(span, 0, map)
}

/// Converts an absolute tick position to the requested unit.
pub fn ticks_to_time(kind: TimeSpanKind, ticks: u64, map: &TempoMap) -> TimeSpan {
    ticks_to_span(kind, ticks, 0, map)
}

/// Converts a length anchored at `anchor` to ticks.
pub fn length_to_ticks(span: &TimeSpan, anchor: u64, map: &TempoMap) -> Result<u64, TimeSpanError> {
    span_to_ticks(span, anchor, map)
}

/// Converts a tick length anchored at `anchor` to the requested unit.
pub fn ticks_to_length(kind: TimeSpanKind, ticks: u64, anchor: u64, map: &TempoMap) -> TimeSpan {
    ticks_to_span(kind, ticks, anchor, map)
}

/// Compares two spans of any units by resolving both to absolute ticks.
pub fn compare(a: &TimeSpan, b: &TimeSpan, map: &TempoMap) -> Result<Ordering, TimeSpanError> {
    Ok(time_to_ticks(a, map)?.cmp(&time_to_ticks(b, map)?))
}

/// Resolves a span starting at absolute tick `anchor` to a tick count.
///
/// Deferred combinations are resolved here: for addition the right
/// operand is anchored where the left one ends; for subtraction both
/// operands are anchored at the same base and the difference is taken.
pub fn span_to_ticks(span: &TimeSpan, anchor: u64, map: &TempoMap) -> Result<u64, TimeSpanError> {
    match span {
        TimeSpan::Ticks(t) => Ok(*t),
        TimeSpan::Metric(m) => Ok(micros_to_ticks(map, anchor, m.total_micros())),
        TimeSpan::Musical(f) => Ok(fraction_to_ticks(f, map)),
        TimeSpan::BarBeatTicks { bars, beats, ticks } => {
            let after_bars = advance_by_bars(map, anchor, *bars);
            let beat_len = map
                .time_signature_at(after_bars)
                .ticks_per_beat(map.ticks_per_quarter());
            Ok(after_bars - anchor + beats * beat_len + ticks)
        }
        TimeSpan::BarBeatFraction { bars, beats } => {
            let after_bars = advance_by_bars(map, anchor, *bars);
            let beat_len = map
                .time_signature_at(after_bars)
                .ticks_per_beat(map.ticks_per_quarter());
            Ok(after_bars - anchor + (beats * beat_len as f64 + 0.5).floor() as u64)
        }
        TimeSpan::BarBeatCents { bars, beats, cents } => {
            let after_bars = advance_by_bars(map, anchor, *bars);
            let beat_len = map
                .time_signature_at(after_bars)
                .ticks_per_beat(map.ticks_per_quarter());
            let beats_f = *beats as f64 + cents / 100.0;
            Ok(after_bars - anchor + (beats_f * beat_len as f64 + 0.5).floor() as u64)
        }
        TimeSpan::Math(m) => match m.operation {
            MathOperation::Add => {
                let lhs = span_to_ticks(&m.lhs, anchor, map)?;
                let rhs_anchor = match m.mode {
                    TimeSpanMode::TimeLength | TimeSpanMode::LengthLength => anchor + lhs,
                    TimeSpanMode::TimeTime => {
                        return Err(TimeSpanError::IncompatibleOperands(
                            "cannot add two absolute times".to_string(),
                        ))
                    }
                };
                Ok(lhs + span_to_ticks(&m.rhs, rhs_anchor, map)?)
            }
            MathOperation::Subtract => {
                let lhs = span_to_ticks(&m.lhs, anchor, map)?;
                let rhs = span_to_ticks(&m.rhs, anchor, map)?;
                lhs.checked_sub(rhs).ok_or(TimeSpanError::NegativeResult)
            }
        },
    }
}

/// Expresses a tick count starting at absolute tick `anchor` in the
/// requested unit.
pub fn ticks_to_span(kind: TimeSpanKind, ticks: u64, anchor: u64, map: &TempoMap) -> TimeSpan {
    match kind {
        TimeSpanKind::Ticks => TimeSpan::Ticks(ticks),
        TimeSpanKind::Metric => TimeSpan::Metric(MetricTime::from_micros(ticks_to_micros(
            map,
            anchor,
            anchor + ticks,
        ))),
        TimeSpanKind::Musical => TimeSpan::Musical(ticks_to_fraction(ticks, map)),
        TimeSpanKind::BarBeatTicks => {
            let (bars, cur) = count_bars(map, anchor, anchor + ticks);
            let beat_len = map
                .time_signature_at(cur)
                .ticks_per_beat(map.ticks_per_quarter());
            let remainder = anchor + ticks - cur;
            if beat_len == 0 {
                return TimeSpan::BarBeatTicks {
                    bars,
                    beats: 0,
                    ticks: remainder,
                };
            }
            TimeSpan::BarBeatTicks {
                bars,
                beats: remainder / beat_len,
                ticks: remainder % beat_len,
            }
        }
        TimeSpanKind::BarBeatFraction => {
            let (bars, cur) = count_bars(map, anchor, anchor + ticks);
            let beat_len = map
                .time_signature_at(cur)
                .ticks_per_beat(map.ticks_per_quarter());
            let remainder = anchor + ticks - cur;
            let beats = if beat_len == 0 {
                0.0
            } else {
                remainder as f64 / beat_len as f64
            };
            TimeSpan::BarBeatFraction { bars, beats }
        }
        TimeSpanKind::BarBeatCents => {
            let (bars, cur) = count_bars(map, anchor, anchor + ticks);
            let beat_len = map
                .time_signature_at(cur)
                .ticks_per_beat(map.ticks_per_quarter());
            let remainder = anchor + ticks - cur;
            if beat_len == 0 {
                return TimeSpan::BarBeatCents {
                    bars,
                    beats: 0,
                    cents: 0.0,
                };
            }
            TimeSpan::BarBeatCents {
                bars,
                beats: remainder / beat_len,
                cents: (remainder % beat_len) as f64 / beat_len as f64 * 100.0,
            }
        }
    }
}

/// Microseconds elapsed between two absolute tick positions, integrating
/// across tempo changes.
fn ticks_to_micros(map: &TempoMap, start: u64, end: u64) -> u64 {
    let tpq = map.ticks_per_quarter() as u128;
    if tpq == 0 || end <= start {
        return 0;
    }

    let mut micros: u128 = 0;
    let mut cur = start;
    for (tick, _) in map.tempo_line().changes() {
        if *tick <= cur {
            continue;
        }
        if *tick >= end {
            break;
        }
        let mpq = map.tempo_at(cur).micros_per_quarter() as u128;
        micros += (*tick - cur) as u128 * mpq / tpq;
        cur = *tick;
    }
    let mpq = map.tempo_at(cur).micros_per_quarter() as u128;
    micros += (end - cur) as u128 * mpq / tpq;
    micros as u64
}

/// Tick count covered by a microsecond duration starting at `anchor`,
/// walking tempo segments until the budget runs out.
fn micros_to_ticks(map: &TempoMap, anchor: u64, micros: u64) -> u64 {
    let tpq = map.ticks_per_quarter() as u128;
    if tpq == 0 {
        return 0;
    }

    let mut remaining = micros as u128;
    let mut cur = anchor;
    for (tick, _) in map.tempo_line().changes() {
        if *tick <= cur {
            continue;
        }
        let mpq = map.tempo_at(cur).micros_per_quarter() as u128;
        if mpq == 0 {
            cur = *tick;
            continue;
        }
        let segment_micros = (*tick - cur) as u128 * mpq / tpq;
        if segment_micros >= remaining {
            break;
        }
        remaining -= segment_micros;
        cur = *tick;
    }

    let mpq = map.tempo_at(cur).micros_per_quarter() as u128;
    if mpq == 0 {
        return cur - anchor;
    }
    // Round half away from zero.
    let ticks_in_segment = (remaining * tpq * 2 + mpq) / (mpq * 2);
    cur - anchor + ticks_in_segment as u64
}

fn fraction_to_ticks(fraction: &Fraction, map: &TempoMap) -> u64 {
    let tpw = map.ticks_per_whole() as u128;
    let n = fraction.numerator() as u128;
    let d = fraction.denominator() as u128;
    ((n * tpw * 2 + d) / (d * 2)) as u64
}

fn ticks_to_fraction(ticks: u64, map: &TempoMap) -> Fraction {
    match Fraction::new(ticks, map.ticks_per_whole()) {
        Some(f) => f,
        None => Fraction::ZERO,
    }
}

/// Advances `bars` whole bars forward from `cur`. A time signature change
/// cuts the current bar short and starts a new one at the change tick.
fn advance_by_bars(map: &TempoMap, mut cur: u64, bars: u64) -> u64 {
    for _ in 0..bars {
        let bar_len = map
            .time_signature_at(cur)
            .ticks_per_bar(map.ticks_per_quarter());
        if bar_len == 0 {
            break;
        }
        cur = match next_signature_change(map, cur) {
            Some(change) if change < cur + bar_len => change,
            _ => cur + bar_len,
        };
    }
    cur
}

/// Counts whole bars that fit between `start` and `end`, returning the
/// count and the tick where the last complete bar ended.
fn count_bars(map: &TempoMap, start: u64, end: u64) -> (u64, u64) {
    let mut bars = 0;
    let mut cur = start;
    loop {
        let bar_len = map
            .time_signature_at(cur)
            .ticks_per_bar(map.ticks_per_quarter());
        if bar_len == 0 {
            break;
        }
        let bar_end = match next_signature_change(map, cur) {
            Some(change) if change < cur + bar_len => change,
            _ => cur + bar_len,
        };
        if bar_end > end {
            break;
        }
        bars += 1;
        cur = bar_end;
    }
    trace!(start, end, bars, "counted bars");
    (bars, cur)
}

fn next_signature_change(map: &TempoMap, after: u64) -> Option<u64> {
    map.time_signature_line()
        .changes()
        .iter()
        .map(|(tick, _)| *tick)
        .find(|tick| *tick > after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::tempo_map::{Tempo, TimeSignature};

    #[test]
    fn test_musical_conversion() {
        let map = TempoMap::new(480);
        assert_eq!(time_to_ticks(&TimeSpan::QUARTER, &map).unwrap(), 480);
        assert_eq!(time_to_ticks(&TimeSpan::WHOLE, &map).unwrap(), 1920);
        assert_eq!(
            ticks_to_time(TimeSpanKind::Musical, 480, &map),
            TimeSpan::QUARTER
        );
    }

    #[test]
    fn test_metric_conversion_constant_tempo() {
        // 120 BPM: one quarter note is half a second.
        let map = TempoMap::new(480);
        assert_eq!(
            ticks_to_time(TimeSpanKind::Metric, 480, &map),
            TimeSpan::Metric(MetricTime::new(0, 0, 0, 500))
        );
        assert_eq!(
            time_to_ticks(&TimeSpan::Metric(MetricTime::new(0, 0, 1, 0)), &map).unwrap(),
            960
        );
    }

    #[test]
    fn test_metric_conversion_across_tempo_change() {
        let mut map = TempoMap::new(480);
        map.set_tempo_change(480, Tempo::from_bpm(60.0));

        // First quarter at 120 BPM (0.5 s), second at 60 BPM (1.0 s).
        assert_eq!(
            ticks_to_time(TimeSpanKind::Metric, 960, &map),
            TimeSpan::Metric(MetricTime::new(0, 0, 1, 500))
        );
        assert_eq!(
            time_to_ticks(&TimeSpan::Metric(MetricTime::new(0, 0, 1, 500)), &map).unwrap(),
            960
        );
    }

    #[test]
    fn test_metric_length_anchoring_matters() {
        let mut map = TempoMap::new(480);
        map.set_tempo_change(480, Tempo::from_bpm(60.0));

        let half_second = TimeSpan::Metric(MetricTime::new(0, 0, 0, 500));
        // At tick 0 the tempo is 120 BPM: 0.5 s covers a full quarter.
        assert_eq!(length_to_ticks(&half_second, 0, &map).unwrap(), 480);
        // At tick 480 the tempo is 60 BPM: 0.5 s covers only half of one.
        assert_eq!(length_to_ticks(&half_second, 480, &map).unwrap(), 240);
    }

    #[test]
    fn test_bar_beat_ticks_conversion() {
        let map = TempoMap::new(480);
        // 4/4 at 480: bar = 1920, beat = 480.
        assert_eq!(
            ticks_to_time(TimeSpanKind::BarBeatTicks, 2410, &map),
            TimeSpan::BarBeatTicks {
                bars: 1,
                beats: 1,
                ticks: 10,
            }
        );
        assert_eq!(
            time_to_ticks(
                &TimeSpan::BarBeatTicks {
                    bars: 1,
                    beats: 1,
                    ticks: 10,
                },
                &map
            )
            .unwrap(),
            2410
        );
    }

    #[test]
    fn test_bar_beat_across_signature_change() {
        let mut map = TempoMap::new(480);
        // Switch to 3/4 after the first bar; bars shrink to 1440 ticks.
        map.set_time_signature_change(1920, TimeSignature::new(3, 4));

        assert_eq!(
            ticks_to_time(TimeSpanKind::BarBeatTicks, 1920 + 1440 + 480, &map),
            TimeSpan::BarBeatTicks {
                bars: 2,
                beats: 1,
                ticks: 0,
            }
        );
        assert_eq!(
            time_to_ticks(
                &TimeSpan::BarBeatTicks {
                    bars: 2,
                    beats: 1,
                    ticks: 0,
                },
                &map
            )
            .unwrap(),
            1920 + 1440 + 480
        );
    }

    #[test]
    fn test_bar_beat_cents() {
        let map = TempoMap::new(480);
        // 240 ticks into a 480-tick beat is 50 cents.
        assert_eq!(
            ticks_to_time(TimeSpanKind::BarBeatCents, 1920 + 480 + 240, &map),
            TimeSpan::BarBeatCents {
                bars: 1,
                beats: 1,
                cents: 50.0,
            }
        );
    }

    #[test]
    fn test_math_span_resolution() {
        let map = TempoMap::new(480);
        let sum = TimeSpan::Ticks(480)
            .add(&TimeSpan::QUARTER, TimeSpanMode::TimeLength)
            .unwrap();
        assert_eq!(time_to_ticks(&sum, &map).unwrap(), 960);

        let diff = TimeSpan::Ticks(960)
            .subtract(&TimeSpan::QUARTER, TimeSpanMode::TimeLength)
            .unwrap();
        assert_eq!(time_to_ticks(&diff, &map).unwrap(), 480);
    }

    #[test]
    fn test_math_span_negative_resolution() {
        let map = TempoMap::new(480);
        let diff = TimeSpan::Ticks(100)
            .subtract(&TimeSpan::QUARTER, TimeSpanMode::TimeLength)
            .unwrap();
        assert_eq!(
            time_to_ticks(&diff, &map),
            Err(TimeSpanError::NegativeResult)
        );
    }

    #[test]
    fn test_cross_variant_compare() {
        let map = TempoMap::new(480);
        assert_eq!(
            compare(&TimeSpan::QUARTER, &TimeSpan::Ticks(480), &map).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            compare(&TimeSpan::HALF, &TimeSpan::Ticks(480), &map).unwrap(),
            Ordering::Greater
        );
    }
}
