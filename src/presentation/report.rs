// Report rendering - JSON view of sensor status and history
use crate::application::aggregator::{Aggregator, KindFilter, SensorReading};
use crate::application::series_builder::{
    build_series, peak_indices, SeriesError, SeriesOptions, SeriesStats,
};
use crate::domain::classification::bar_segments;
use crate::domain::preset::{MetricKind, PresetRegistry};
use crate::domain::status::{AggregationResult, BarSegment, Palette, StatusResult, UNKNOWN_LABEL};
use crate::domain::telemetry::{ChartPoint, HistorySample};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub global: AggregationResult,
    pub ranges: Vec<String>,
    pub sensors: Vec<SensorReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorReport {
    pub entity_id: String,
    pub name: String,
    pub metric: MetricKind,
    pub value_text: String,
    pub unit: String,
    pub status: StatusResult,
    pub bar: Vec<BarSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<SeriesReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    pub window_hours: u32,
    pub points: Vec<ChartPoint>,
    pub stats: Option<SeriesStats>,
    pub peaks: Vec<usize>,
}

pub struct ReportBuilder<'a> {
    registry: &'a PresetRegistry,
    palette: &'a Palette,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(registry: &'a PresetRegistry, palette: &'a Palette) -> Self {
        Self { registry, palette }
    }

    /// Header, status and threshold bar for one sensor. History is attached
    /// separately with [`SensorReport::with_history`].
    pub fn sensor(&self, sensor: &SensorReading, name: Option<&str>) -> SensorReport {
        let preset = self.registry.get(sensor.metric);
        let status = Aggregator::new(self.registry, self.palette).classify(sensor).status;

        let value_text = match sensor.reading.value {
            Some(v) => preset.format_value(v),
            None => UNKNOWN_LABEL.to_string(),
        };
        let unit = if sensor.reading.unit.is_empty() {
            preset.unit_fallback.clone()
        } else {
            sensor.reading.unit.clone()
        };

        SensorReport {
            entity_id: sensor.entity_id.clone(),
            name: name.map(str::to_string).unwrap_or_else(|| format_name(&sensor.entity_id)),
            metric: sensor.metric,
            value_text,
            unit,
            status,
            bar: bar_segments(preset),
            history: None,
            history_error: None,
        }
    }

    pub fn series(
        &self,
        metric: MetricKind,
        samples: &[HistorySample],
        options: &SeriesOptions,
    ) -> Result<SeriesReport, SeriesError> {
        let preset = self.registry.get(metric);
        let points = build_series(samples, preset, options)?;
        Ok(SeriesReport {
            window_hours: options.window_hours,
            stats: SeriesStats::from_points(&points),
            peaks: peak_indices(&points, preset),
            points,
        })
    }

    pub fn report(
        &self,
        sensors: Vec<SensorReport>,
        readings: &[SensorReading],
        filter: Option<&KindFilter>,
        ranges: Vec<String>,
    ) -> Report {
        Report {
            global: Aggregator::new(self.registry, self.palette).aggregate(readings, filter),
            ranges,
            sensors,
        }
    }
}

impl SensorReport {
    pub fn with_history(mut self, history: Result<SeriesReport, String>) -> Self {
        match history {
            Ok(series) => self.history = Some(series),
            Err(e) => self.history_error = Some(e),
        }
        self
    }
}

/// Display name derived from an entity id: `sensor.living_room_co2` becomes
/// `Living Room Co2`.
pub fn format_name(entity_id: &str) -> String {
    let object_id = entity_id.split_once('.').map_or(entity_id, |(_, rest)| rest);
    object_id
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::Level;
    use crate::domain::telemetry::Reading;

    const T0: i64 = 1_709_251_200_000;

    #[test]
    fn test_format_name() {
        assert_eq!(format_name("sensor.living_room_co2"), "Living Room Co2");
        assert_eq!(format_name("radon"), "Radon");
        assert_eq!(format_name("sensor.__pm25"), "Pm25");
    }

    #[test]
    fn test_sensor_report() {
        let registry = PresetRegistry::default();
        let palette = Palette::default();
        let builder = ReportBuilder::new(&registry, &palette);

        let sensor = SensorReading::new("sensor.office_co2", MetricKind::Co2, Reading::new(Some(950.4), "", None));
        let report = builder.sensor(&sensor, None);
        assert_eq!(report.name, "Office Co2");
        assert_eq!(report.value_text, "950");
        assert_eq!(report.unit, "ppm");
        assert_eq!(report.status.level, Level::Warn);
        assert!(!report.bar.is_empty());

        let missing = SensorReading::new("sensor.office_co2", MetricKind::Co2, Reading::unavailable());
        let report = builder.sensor(&missing, Some("Office"));
        assert_eq!(report.name, "Office");
        assert_eq!(report.value_text, UNKNOWN_LABEL);
        assert_eq!(report.status.level, Level::Unknown);
    }

    #[test]
    fn test_series_report() {
        let registry = PresetRegistry::default();
        let palette = Palette::default();
        let builder = ReportBuilder::new(&registry, &palette);

        let samples: Vec<HistorySample> = [600.0, 1200.0, 700.0]
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let t = chrono::DateTime::from_timestamp_millis(T0 + i as i64 * 60_000)
                    .unwrap()
                    .to_rfc3339();
                HistorySample::new(*v, Some(&t))
            })
            .collect();

        let series = builder
            .series(MetricKind::Co2, &samples, &SeriesOptions::compact(24, T0))
            .unwrap();
        assert_eq!(series.points.len(), 3);
        assert_eq!(series.peaks, vec![1]);
        assert_eq!(series.stats.unwrap().max, 1200.0);

        let err = builder
            .series(MetricKind::Co2, &samples[..1], &SeriesOptions::compact(24, T0))
            .unwrap_err();
        assert_eq!(err, SeriesError::InsufficientData { usable: 1 });
    }
}
