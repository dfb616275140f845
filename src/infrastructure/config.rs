use crate::application::aggregator::KindFilter;
use crate::application::history_cache::{DEFAULT_CAPACITY, DEFAULT_FRESHNESS};
use crate::application::series_builder::{SeriesOptions, COMPACT_MAX_POINTS, FULL_MAX_POINTS};
use crate::domain::preset::{CustomPresetConfig, MetricKind};
use crate::domain::status::Palette;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

pub const MIN_HOURS: u32 = 1;
pub const MAX_HOURS: u32 = 168;
const DEFAULT_HOUR_RANGES: &str = "6,12,24,72,168";
const MAX_HOUR_RANGES: usize = 12;
const MAX_RANGE_HOURS: f64 = 720.0;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub home_assistant: HomeAssistantSettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub chart: ChartSettings,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default)]
    pub aggregate: AggregateSettings,
    #[serde(default)]
    pub custom_preset: Option<CustomPresetConfig>,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HomeAssistantSettings {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistorySettings {
    pub cache_capacity: usize,
    pub freshness_secs: u64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            freshness_secs: DEFAULT_FRESHNESS.as_secs(),
        }
    }
}

impl HistorySettings {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }
}

/// Which chart the report builds for each sensor.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartView {
    #[default]
    Compact,
    Full,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChartSettings {
    pub view: ChartView,
    pub hours_to_show: f64,
    pub compact_budget: usize,
    pub full_budget: usize,
    pub smooth: bool,
    pub hour_ranges: String,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            view: ChartView::Compact,
            hours_to_show: 24.0,
            compact_budget: COMPACT_MAX_POINTS,
            full_budget: FULL_MAX_POINTS,
            smooth: false,
            hour_ranges: DEFAULT_HOUR_RANGES.to_string(),
        }
    }
}

impl ChartSettings {
    /// Chart window, clamped to 1..=168 hours
    pub fn hours(&self) -> u32 {
        clamp_hours(self.hours_to_show)
    }

    /// Series options for the configured view, with its point budget.
    pub fn series_options(&self, now_ms: i64) -> SeriesOptions {
        match self.view {
            ChartView::Compact => SeriesOptions {
                max_points: self.compact_budget,
                smooth: self.smooth,
                ..SeriesOptions::compact(self.hours(), now_ms)
            },
            ChartView::Full => SeriesOptions {
                max_points: self.full_budget,
                ..SeriesOptions::full(self.hours(), now_ms, self.smooth)
            },
        }
    }

    pub fn ranges(&self) -> Vec<u32> {
        parse_hour_ranges(&self.hour_ranges, DEFAULT_HOUR_RANGES)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AggregateSettings {
    /// Only air-quality metrics count toward the global status
    pub air_only: bool,
    /// Explicit kinds; takes precedence over `air_only`
    pub kinds: Vec<MetricKind>,
}

impl AggregateSettings {
    pub fn kind_filter(&self) -> Option<KindFilter> {
        if !self.kinds.is_empty() {
            Some(KindFilter::new(self.kinds.iter().copied()))
        } else if self.air_only {
            Some(KindFilter::air_quality())
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    pub entity_id: String,
    #[serde(default)]
    pub preset: Option<MetricKind>,
    #[serde(default)]
    pub name: Option<String>,
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/airq"))
        .add_source(config::Environment::with_prefix("AIRQ").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn clamp_hours(hours: f64) -> u32 {
    if !hours.is_finite() {
        return 24;
    }
    hours.round().clamp(MIN_HOURS as f64, MAX_HOURS as f64) as u32
}

/// Parse a list of chart window lengths such as `"6, 12;24 72"`.
///
/// Values are rounded and kept within 1..=720, duplicates dropped, at most
/// twelve kept. If nothing usable remains the fallback list is parsed instead.
pub fn parse_hour_ranges(raw: &str, fallback: &str) -> Vec<u32> {
    let parse = |s: &str| -> Vec<u32> {
        let mut seen = HashSet::new();
        s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .filter_map(|t| t.parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .map(f64::round)
            .filter(|n| (1.0..=MAX_RANGE_HOURS).contains(n))
            .map(|n| n as u32)
            .filter(|n| seen.insert(*n))
            .take(MAX_HOUR_RANGES)
            .collect()
    };

    let ranges = parse(raw);
    if ranges.is_empty() { parse(fallback) } else { ranges }
}

/// Short label for a window length: `12h`, `3d`, `36h`.
pub fn format_hour_label(hours: u32) -> String {
    if hours >= 24 && hours % 24 == 0 {
        format!("{}d", hours / 24)
    } else {
        format!("{}h", hours)
    }
}
