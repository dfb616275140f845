// Status domain models
use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative level. Variant order is the aggregation rank:
/// `Unknown < Good < Warn < Bad`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Unknown,
    Good,
    Warn,
    Bad,
}

impl Level {
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Unknown => "unknown",
            Level::Good => "good",
            Level::Warn => "warn",
            Level::Bad => "bad",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colors attached to each level. Values are opaque to the engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Palette {
    pub good: String,
    pub warn: String,
    pub bad: String,
    pub neutral: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            good: "#45d58e".to_string(),
            warn: "#ffb74d".to_string(),
            bad: "#ff6363".to_string(),
            neutral: "var(--secondary-text-color)".to_string(),
        }
    }
}

impl Palette {
    pub fn color(&self, level: Level) -> &str {
        match level {
            Level::Good => &self.good,
            Level::Warn => &self.warn,
            Level::Bad => &self.bad,
            Level::Unknown => &self.neutral,
        }
    }
}

pub const UNKNOWN_LABEL: &str = "—";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusResult {
    pub level: Level,
    pub label: String,
    pub color: String,
    /// Position of the reading on `[min, max]`, clamped to `[0, 1]`.
    pub ratio: f64,
    /// Intensity within `level`, in `[0, 1]`. Only meaningful for ranking.
    pub severity: f64,
}

impl StatusResult {
    pub fn unknown(palette: &Palette) -> Self {
        Self {
            level: Level::Unknown,
            label: UNKNOWN_LABEL.to_string(),
            color: palette.neutral.clone(),
            ratio: 0.0,
            severity: 0.0,
        }
    }
}

/// One colored slice of the threshold track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarSegment {
    pub level: Level,
    pub percent: f64,
}

/// The sensor that determines a composite status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub entity_id: Option<String>,
    pub level: Level,
    pub label: String,
    pub color: String,
    pub severity: f64,
}

impl AggregationResult {
    pub fn unknown(palette: &Palette) -> Self {
        Self {
            entity_id: None,
            level: Level::Unknown,
            label: UNKNOWN_LABEL.to_string(),
            color: palette.neutral.clone(),
            severity: 0.0,
        }
    }

    pub fn from_status(entity_id: &str, status: &StatusResult) -> Self {
        Self {
            entity_id: Some(entity_id.to_string()),
            level: status.level,
            label: status.label.clone(),
            color: status.color.clone(),
            severity: status.severity,
        }
    }
}
