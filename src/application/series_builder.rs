// Series builder - raw samples to chart-ready points
use crate::domain::classification::classify;
use crate::domain::preset::Preset;
use crate::domain::status::{Level, Palette};
use crate::domain::telemetry::{ChartPoint, HistorySample};
use serde::Serialize;

pub const COMPACT_MAX_POINTS: usize = 220;
pub const FULL_MAX_POINTS: usize = 600;

const HOUR_MS: i64 = 3_600_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    #[error("insufficient data: {usable} usable samples")]
    InsufficientData { usable: usize },
}

/// Where the vertical range comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueScale {
    /// The preset's declared `[min, max]`
    #[default]
    Preset,
    /// Observed min/max of the retained samples
    Observed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesOptions {
    pub max_points: usize,
    pub width: f64,
    pub height: f64,
    /// Window used to place untimed samples
    pub window_hours: u32,
    /// Right edge of the window for untimed samples, epoch ms
    pub now_ms: i64,
    pub smooth: bool,
    /// Fraction of the value range added above and below
    pub padding: f64,
    pub scale: ValueScale,
}

impl SeriesOptions {
    /// Mini chart under a sensor header
    pub fn compact(window_hours: u32, now_ms: i64) -> Self {
        Self {
            max_points: COMPACT_MAX_POINTS,
            width: 400.0,
            height: 100.0,
            window_hours,
            now_ms,
            smooth: false,
            padding: 0.05,
            scale: ValueScale::Preset,
        }
    }

    /// Interactive full-screen view
    pub fn full(window_hours: u32, now_ms: i64, smooth: bool) -> Self {
        Self {
            max_points: FULL_MAX_POINTS,
            width: 1000.0,
            height: 300.0,
            window_hours,
            now_ms,
            smooth,
            padding: 0.06,
            scale: ValueScale::Preset,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Extracted {
    value: f64,
    timestamp_ms: Option<i64>,
}

/// Build a bounded, time-proportional point series. Inputs are not modified.
pub fn build_series(
    samples: &[HistorySample],
    preset: &Preset,
    options: &SeriesOptions,
) -> Result<Vec<ChartPoint>, SeriesError> {
    let mut extracted: Vec<Extracted> = samples
        .iter()
        .filter_map(|s| {
            s.value().map(|value| Extracted {
                value,
                timestamp_ms: s.timestamp_ms(),
            })
        })
        .collect();

    if extracted.len() < 2 {
        return Err(SeriesError::InsufficientData {
            usable: extracted.len(),
        });
    }

    if has_time_axis(&extracted) {
        let before = extracted.len();
        extracted.retain(|e| e.timestamp_ms.is_some());
        if extracted.len() < before {
            tracing::debug!("Dropped {} untimed samples from a timed series", before - extracted.len());
        }
        // Stable, so equal timestamps keep host order.
        extracted.sort_by_key(|e| e.timestamp_ms);
    }

    let mut series = downsample(&extracted, options.max_points.max(2));
    if options.smooth && series.len() >= 4 {
        series = smooth(&series);
    }

    Ok(map_to_chart(&series, preset, options))
}

/// True when at least two samples carry distinct timestamps.
fn has_time_axis(extracted: &[Extracted]) -> bool {
    let mut times = extracted.iter().filter_map(|e| e.timestamp_ms);
    match times.next() {
        Some(first) => times.any(|t| t != first),
        None => false,
    }
}

/// Keep every Nth sample, `N = ceil(len / budget)`, always ending on the
/// final sample without exceeding the budget.
fn downsample(extracted: &[Extracted], budget: usize) -> Vec<Extracted> {
    let len = extracted.len();
    let step = len.div_ceil(budget).max(1);
    let mut kept: Vec<Extracted> = extracted.iter().step_by(step).copied().collect();

    if (len - 1) % step != 0 {
        let last = extracted[len - 1];
        if kept.len() < budget {
            kept.push(last);
        } else if let Some(tail) = kept.last_mut() {
            *tail = last;
        }
    }
    kept
}

/// Three-point moving average; the ends reuse their own value as the
/// missing neighbour.
fn smooth(series: &[Extracted]) -> Vec<Extracted> {
    let last = series.len() - 1;
    series
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let a = series[i.saturating_sub(1)].value;
            let c = series[(i + 1).min(last)].value;
            Extracted {
                value: (a + p.value + c) / 3.0,
                timestamp_ms: p.timestamp_ms,
            }
        })
        .collect()
}

fn map_to_chart(series: &[Extracted], preset: &Preset, options: &SeriesOptions) -> Vec<ChartPoint> {
    let n = series.len();
    let last = (n - 1) as f64;

    let known: Vec<i64> = series.iter().filter_map(|p| p.timestamp_ms).collect();
    let earliest = known.iter().min().copied();
    let latest = known.iter().max().copied();
    let (t0, t1, timed) = match (earliest, latest) {
        (Some(a), Some(b)) if b > a => (a, b, true),
        _ => {
            let end = options.now_ms;
            let window = i64::from(options.window_hours).saturating_mul(HOUR_MS);
            (end.saturating_sub(window), end, false)
        }
    };
    let span = t1 as f64 - t0 as f64;

    let (min_v, max_v) = match options.scale {
        ValueScale::Preset if preset.min.is_finite() && preset.max.is_finite() => (preset.min, preset.max),
        _ => series.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.value), hi.max(p.value))
        }),
    };
    let mut pad = (max_v - min_v) * options.padding;
    if pad == 0.0 || !pad.is_finite() {
        pad = 1.0;
    }
    let y0 = min_v - pad;
    let y1 = max_v + pad;

    series
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let interpolated = t0.saturating_add(((i as f64 / last) * span).round() as i64);
            let t = match p.timestamp_ms {
                Some(t) if timed => t,
                _ => interpolated,
            };
            let x = if span > 0.0 {
                (t as f64 - t0 as f64) / span * options.width
            } else {
                i as f64 / last * options.width
            };
            let y = options.height - (p.value - y0) / (y1 - y0) * options.height;
            ChartPoint::new(x, y, p.value, t)
        })
        .collect()
}

/// Summary of a built series, in value units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Last minus first
    pub delta: f64,
}

impl SeriesStats {
    pub fn from_points(points: &[ChartPoint]) -> Option<Self> {
        let first = points.first()?;
        let last = points.last()?;
        let (min, max, sum) = points.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(lo, hi, sum), p| (lo.min(p.value), hi.max(p.value), sum + p.value),
        );
        Some(Self {
            current: last.value,
            min,
            max,
            mean: sum / points.len() as f64,
            delta: last.value - first.value,
        })
    }
}

/// Level of each line segment, judged at its midpoint value.
pub fn segment_levels(points: &[ChartPoint], preset: &Preset) -> Vec<Level> {
    let palette = Palette::default();
    points
        .windows(2)
        .map(|w| classify(preset, Some((w[0].value + w[1].value) / 2.0), &palette).level)
        .collect()
}

/// Indices of points classified warn or bad.
pub fn peak_indices(points: &[ChartPoint], preset: &Preset) -> Vec<usize> {
    let palette = Palette::default();
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            matches!(
                classify(preset, Some(p.value), &palette).level,
                Level::Warn | Level::Bad
            )
        })
        .map(|(i, _)| i)
        .collect()
}
