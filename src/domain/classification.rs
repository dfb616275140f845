// Classification engine - level, ratio and severity of a reading against a preset
use super::preset::{Preset, Thresholds};
use super::status::{BarSegment, Level, Palette, StatusResult};

/// Segments thinner than this (in percent) are not rendered.
const MIN_SEGMENT_PERCENT: f64 = 0.05;

/// Warn severities occupy `[0, WARN_SEVERITY_SPAN]`, bad severities the rest
/// of `[0, 1]`.
const WARN_SEVERITY_SPAN: f64 = 0.5;

pub fn classify(preset: &Preset, value: Option<f64>, palette: &Palette) -> StatusResult {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return StatusResult::unknown(palette);
    };

    let ratio = ratio(preset, v);
    let (level, severity) = match preset.thresholds {
        Thresholds::Rising { good_max, warn_max } => {
            if v <= good_max {
                (Level::Good, 0.0)
            } else if v <= warn_max {
                (Level::Warn, ratio)
            } else {
                (Level::Bad, ratio)
            }
        }
        Thresholds::Band {
            warn_low_min,
            good_min,
            good_max,
            warn_high_max,
        } => {
            if (good_min..=good_max).contains(&v) {
                (Level::Good, 0.0)
            } else if v >= warn_low_min && v < good_min {
                let frac = fraction(good_min - v, good_min - warn_low_min);
                (Level::Warn, frac * WARN_SEVERITY_SPAN)
            } else if v > good_max && v <= warn_high_max {
                let frac = fraction(v - good_max, warn_high_max - good_max);
                (Level::Warn, frac * WARN_SEVERITY_SPAN)
            } else if v < warn_low_min {
                let frac = fraction(warn_low_min - v, warn_low_min - preset.min);
                (Level::Bad, bad_severity(frac))
            } else {
                let frac = fraction(v - warn_high_max, preset.max - warn_high_max);
                (Level::Bad, bad_severity(frac))
            }
        }
    };

    let label = match level {
        Level::Good => &preset.labels.good,
        Level::Warn => &preset.labels.warn,
        _ => &preset.labels.bad,
    };

    StatusResult {
        level,
        label: label.clone(),
        color: palette.color(level).to_string(),
        ratio,
        severity,
    }
}

/// Position of `v` on the preset scale, clamped to `[0, 1]`.
pub fn ratio(preset: &Preset, v: f64) -> f64 {
    let span = preset.max - preset.min;
    if span > 0.0 {
        ((v - preset.min) / span).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Distance over zone width, clamped. A zero-width zone is entered at full
/// intensity.
fn fraction(distance: f64, width: f64) -> f64 {
    if width > 0.0 {
        (distance / width).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn bad_severity(frac: f64) -> f64 {
    WARN_SEVERITY_SPAN + frac * (1.0 - WARN_SEVERITY_SPAN)
}

/// Proportional slices of the threshold track. Percentages sum to 100; the
/// last slice absorbs rounding. Never empty.
pub fn bar_segments(preset: &Preset) -> Vec<BarSegment> {
    let (min, max) = (preset.min, preset.max);
    let span = max - min;
    if !min.is_finite() || !max.is_finite() || span <= 0.0 {
        return fallback_segments();
    }

    let stop = |v: f64| v.clamp(min, max);
    let zones: Vec<(Level, f64, f64)> = match preset.thresholds {
        Thresholds::Rising { good_max, warn_max } => {
            let (g, w) = (stop(good_max), stop(warn_max));
            vec![(Level::Good, min, g), (Level::Warn, g, w), (Level::Bad, w, max)]
        }
        Thresholds::Band {
            warn_low_min,
            good_min,
            good_max,
            warn_high_max,
        } => {
            let (wl, gl, gh, wh) = (stop(warn_low_min), stop(good_min), stop(good_max), stop(warn_high_max));
            vec![
                (Level::Bad, min, wl),
                (Level::Warn, wl, gl),
                (Level::Good, gl, gh),
                (Level::Warn, gh, wh),
                (Level::Bad, wh, max),
            ]
        }
    };

    let mut segments: Vec<BarSegment> = zones
        .into_iter()
        .map(|(level, from, to)| BarSegment {
            level,
            percent: ((to - from) / span * 100.0).clamp(0.0, 100.0),
        })
        .filter(|s| s.percent > MIN_SEGMENT_PERCENT)
        .collect();

    let sum: f64 = segments.iter().map(|s| s.percent).sum();
    match segments.last_mut() {
        Some(last) => last.percent = (last.percent + 100.0 - sum).max(0.0),
        None => return fallback_segments(),
    }
    segments
}

fn fallback_segments() -> Vec<BarSegment> {
    vec![
        BarSegment { level: Level::Good, percent: 33.333 },
        BarSegment { level: Level::Warn, percent: 33.333 },
        BarSegment { level: Level::Bad, percent: 33.334 },
    ]
}
