use std::f64::consts::TAU;

/// Sine oscillation mapped onto `[min, max]`.
///
/// `phase = 0.5 + 0.5 * sin(2π * freq_hz * elapsed)` and the result is
/// `min * (1 - phase) + max * phase`, which stays finite even when
/// `max - min` would overflow. A negative frequency mirrors the wave. When
/// `min <= max` the result is clamped so rounding never leaves the range.
pub fn value(elapsed: f64, freq_hz: f64, min: f64, max: f64) -> f64 {
    let phase = 0.5 + 0.5 * (TAU * freq_hz * elapsed).sin();
    let v = min * (1.0 - phase) + max * phase;
    if min <= max {
        v.clamp(min, max)
    } else {
        v
    }
}
