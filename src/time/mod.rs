//! Time representation: spans, rational fractions, tempo maps and the
//! tick conversion routines tying them together.

pub mod convert;
mod fraction;
mod span;
mod tempo_map;

pub use fraction::{Fraction, ParseFractionError};
pub use span::{
    MathOperation, MathTimeSpan, MetricTime, TimeSpan, TimeSpanError, TimeSpanKind, TimeSpanMode,
    BEAT_EPSILON, CENTS_EPSILON,
};
pub use tempo_map::{
    Tempo, TempoMap, TimeSignature, ValueLine, DEFAULT_TICKS_PER_QUARTER,
};
