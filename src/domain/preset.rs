// Preset registry - scale bounds, thresholds and labels per metric kind
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Metric a sensor reports. Drives which preset is used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Radon,
    Co2,
    Voc,
    Pm1,
    Pm25,
    Temperature,
    Humidity,
    Pressure,
    Custom,
}

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::Radon,
        MetricKind::Co2,
        MetricKind::Voc,
        MetricKind::Pm1,
        MetricKind::Pm25,
        MetricKind::Temperature,
        MetricKind::Humidity,
        MetricKind::Pressure,
        MetricKind::Custom,
    ];

    /// Kinds considered by the "air quality only" aggregation mode.
    pub const AIR_QUALITY: [MetricKind; 5] = [
        MetricKind::Co2,
        MetricKind::Voc,
        MetricKind::Pm1,
        MetricKind::Pm25,
        MetricKind::Radon,
    ];

    pub fn is_air_quality(self) -> bool {
        Self::AIR_QUALITY.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Radon => "radon",
            MetricKind::Co2 => "co2",
            MetricKind::Voc => "voc",
            MetricKind::Pm1 => "pm1",
            MetricKind::Pm25 => "pm25",
            MetricKind::Temperature => "temperature",
            MetricKind::Humidity => "humidity",
            MetricKind::Pressure => "pressure",
            MetricKind::Custom => "custom",
        }
    }

    /// Guess the metric from what the host knows about an entity.
    ///
    /// Order matters: comfort metrics are matched first because their units
    /// (`%`, `°C`, `hPa`) are unambiguous, then gases, particulates and radon.
    /// Anything unrecognised is treated as CO₂. Fahrenheit units are not
    /// matched since the temperature preset is a Celsius band.
    pub fn detect(entity_id: &str, unit: Option<&str>, device_class: Option<&str>) -> Self {
        let id = entity_id.to_lowercase();
        let unit: String = unit
            .unwrap_or_default()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let dc = device_class.unwrap_or_default().to_lowercase();

        if dc.contains("temperature") || unit == "°c" || id.contains("temp") {
            return MetricKind::Temperature;
        }
        if dc.contains("humidity") || unit == "%" || id.contains("humid") {
            return MetricKind::Humidity;
        }
        if dc.contains("pressure")
            || unit.contains("hpa")
            || unit.contains("mbar")
            || unit.ends_with("pa")
            || id.contains("press")
        {
            return MetricKind::Pressure;
        }
        if dc.contains("carbon_dioxide") || id.contains("co2") || unit == "ppm" {
            return MetricKind::Co2;
        }
        if dc.contains("volatile") || id.contains("voc") || unit == "ppb" {
            return MetricKind::Voc;
        }
        if id.contains("pm2") || id.contains("pm25") || id.contains("pm_2_5") {
            return MetricKind::Pm25;
        }
        if id.contains("pm1") {
            return MetricKind::Pm1;
        }
        if id.contains("radon") || unit.contains("bq") {
            return MetricKind::Radon;
        }
        if unit.contains("µg") || unit.contains("ug") {
            return MetricKind::Pm25;
        }
        MetricKind::Co2
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric kind: {0}")]
pub struct UnknownMetricKind(pub String);

impl FromStr for MetricKind {
    type Err = UnknownMetricKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['.', '_', ' '], "");
        MetricKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| UnknownMetricKind(s.to_string()))
    }
}

/// Threshold topology of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Thresholds {
    /// Higher is uniformly worse.
    Rising { good_max: f64, warn_max: f64 },
    /// Comfort zone in the middle, degrading on both sides.
    Band {
        warn_low_min: f64,
        good_min: f64,
        good_max: f64,
        warn_high_max: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Labels {
    pub good: String,
    pub warn: String,
    pub bad: String,
}

impl Labels {
    pub fn new(good: &str, warn: &str, bad: &str) -> Self {
        Self {
            good: good.to_string(),
            warn: warn.to_string(),
            bad: bad.to_string(),
        }
    }
}

/// Fully resolved preset. Bounds satisfy `min < max` and thresholds lie in
/// `[min, max]` in non-decreasing order; see [`Preset::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preset {
    pub metric: MetricKind,
    pub min: f64,
    pub max: f64,
    pub decimals: u8,
    pub unit_fallback: String,
    pub labels: Labels,
    pub thresholds: Thresholds,
}

const MAX_DECIMALS: u8 = 6;

impl Preset {
    /// Builds a preset, repairing bounds and thresholds instead of rejecting them.
    pub fn new(
        metric: MetricKind,
        min: f64,
        max: f64,
        decimals: u8,
        unit_fallback: &str,
        labels: Labels,
        thresholds: Thresholds,
    ) -> Self {
        let min = if min.is_finite() { min } else { 0.0 };
        let max = if max.is_finite() && max > min {
            max
        } else {
            min + 100.0
        };

        let thresholds = match thresholds {
            Thresholds::Rising { good_max, warn_max } => {
                let good_max = clamp_into(good_max, min, max);
                let warn_max = clamp_into(warn_max, min, max).max(good_max);
                Thresholds::Rising { good_max, warn_max }
            }
            Thresholds::Band {
                warn_low_min,
                good_min,
                good_max,
                warn_high_max,
            } => {
                let warn_low_min = clamp_into(warn_low_min, min, max);
                let good_min = clamp_into(good_min, min, max).max(warn_low_min);
                let good_max = clamp_into(good_max, min, max).max(good_min);
                let warn_high_max = clamp_into(warn_high_max, min, max).max(good_max);
                Thresholds::Band {
                    warn_low_min,
                    good_min,
                    good_max,
                    warn_high_max,
                }
            }
        };

        Self {
            metric,
            min,
            max,
            decimals: decimals.min(MAX_DECIMALS),
            unit_fallback: unit_fallback.to_string(),
            labels,
            thresholds,
        }
    }

    pub fn builtin(metric: MetricKind) -> Self {
        use MetricKind::*;
        match metric {
            Radon => Self::rising(metric, 0.0, 400.0, 0, "Bq/m³", 99.0, 299.0, Labels::new("Good", "Moderate", "Poor")),
            Co2 => Self::rising(metric, 400.0, 2000.0, 0, "ppm", 800.0, 1000.0, Labels::new("Good", "Ventilate", "High")),
            Voc => Self::rising(metric, 0.0, 3000.0, 0, "ppb", 250.0, 2000.0, Labels::new("Low", "Ventilate", "Very high")),
            Pm1 => Self::rising(metric, 0.0, 100.0, 1, "µg/m³", 10.0, 25.0, Labels::new("Good", "Moderate", "Poor")),
            Pm25 => Self::rising(metric, 0.0, 150.0, 1, "µg/m³", 12.0, 35.4, Labels::new("Good", "Moderate", "Poor")),
            Temperature => Self::band(metric, 0.0, 35.0, 1, "°C", [16.0, 18.0, 24.0, 26.0], Labels::new("Comfortable", "Watch", "Alert")),
            Humidity => Self::band(metric, 0.0, 100.0, 0, "%", [30.0, 40.0, 60.0, 70.0], Labels::new("Comfortable", "Watch", "Uncomfortable")),
            Pressure => Self::band(metric, 950.0, 1050.0, 0, "hPa", [970.0, 980.0, 1030.0, 1040.0], Labels::new("Normal", "Variable", "Extreme")),
            Custom => CustomPresetConfig::default().resolve(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn rising(
        metric: MetricKind,
        min: f64,
        max: f64,
        decimals: u8,
        unit: &str,
        good_max: f64,
        warn_max: f64,
        labels: Labels,
    ) -> Self {
        Self::new(metric, min, max, decimals, unit, labels, Thresholds::Rising { good_max, warn_max })
    }

    fn band(metric: MetricKind, min: f64, max: f64, decimals: u8, unit: &str, stops: [f64; 4], labels: Labels) -> Self {
        let [warn_low_min, good_min, good_max, warn_high_max] = stops;
        Self::new(
            metric,
            min,
            max,
            decimals,
            unit,
            labels,
            Thresholds::Band {
                warn_low_min,
                good_min,
                good_max,
                warn_high_max,
            },
        )
    }

    pub fn is_band(&self) -> bool {
        matches!(self.thresholds, Thresholds::Band { .. })
    }

    pub fn format_value(&self, value: f64) -> String {
        format!("{:.*}", self.decimals as usize, value)
    }
}

fn clamp_into(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() { lo } else { v.clamp(lo, hi) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    #[default]
    Rising,
    Band,
}

/// User-defined preset as it arrives from configuration. Every field is
/// optional; missing or blank values take the custom defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomPresetConfig {
    #[serde(default, rename = "type")]
    pub topology: Option<Topology>,
    pub decimals: Option<f64>,
    pub unit_fallback: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub good_max: Option<f64>,
    pub warn_max: Option<f64>,
    pub warn_low_min: Option<f64>,
    pub good_min: Option<f64>,
    pub good_max_band: Option<f64>,
    pub warn_high_max: Option<f64>,
    pub label_good: Option<String>,
    pub label_warn: Option<String>,
    pub label_bad: Option<String>,
}

impl CustomPresetConfig {
    pub fn resolve(&self) -> Preset {
        let num = |v: Option<f64>, d: f64| v.filter(|n| n.is_finite()).unwrap_or(d);
        let text = |v: &Option<String>, d: &str| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(d)
                .to_string()
        };

        let decimals = num(self.decimals, 0.0).round().clamp(0.0, MAX_DECIMALS as f64) as u8;
        let labels = Labels {
            good: text(&self.label_good, "Good"),
            warn: text(&self.label_warn, "Moderate"),
            bad: text(&self.label_bad, "Poor"),
        };
        let thresholds = match self.topology.unwrap_or_default() {
            Topology::Rising => Thresholds::Rising {
                good_max: num(self.good_max, 50.0),
                warn_max: num(self.warn_max, 80.0),
            },
            Topology::Band => Thresholds::Band {
                warn_low_min: num(self.warn_low_min, 30.0),
                good_min: num(self.good_min, 40.0),
                good_max: num(self.good_max_band, 60.0),
                warn_high_max: num(self.warn_high_max, 70.0),
            },
        };

        Preset::new(
            MetricKind::Custom,
            num(self.min, 0.0),
            num(self.max, 100.0),
            decimals,
            &text(&self.unit_fallback, ""),
            labels,
            thresholds,
        )
    }
}

/// Resolved presets for every metric kind, including the user-defined one.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    presets: HashMap<MetricKind, Preset>,
}

impl PresetRegistry {
    pub fn new(custom: Option<&CustomPresetConfig>) -> Self {
        let mut presets: HashMap<MetricKind, Preset> = MetricKind::ALL
            .into_iter()
            .map(|kind| (kind, Preset::builtin(kind)))
            .collect();
        if let Some(custom) = custom {
            presets.insert(MetricKind::Custom, custom.resolve());
        }
        Self { presets }
    }

    pub fn get(&self, kind: MetricKind) -> &Preset {
        // Every kind is inserted in `new`.
        &self.presets[&kind]
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}
