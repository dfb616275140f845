// Aggregator - picks the limiting sensor for a composite status
use crate::application::host::StateLookup;
use crate::domain::classification::classify;
use crate::domain::preset::{MetricKind, PresetRegistry};
use crate::domain::status::{AggregationResult, Level, Palette, StatusResult};
use crate::domain::telemetry::Reading;
use std::collections::HashSet;

/// A sensor with its resolved metric and current reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub entity_id: String,
    pub metric: MetricKind,
    pub reading: Reading,
}

impl SensorReading {
    pub fn new(entity_id: impl Into<String>, metric: MetricKind, reading: Reading) -> Self {
        Self {
            entity_id: entity_id.into(),
            metric,
            reading,
        }
    }

    /// Resolve a sensor against host state. `metric` overrides detection;
    /// entities the host does not know read as unavailable.
    pub fn from_host(entity_id: &str, metric: Option<MetricKind>, host: &dyn StateLookup) -> Self {
        let metric = metric.unwrap_or_else(|| host.detect_metric(entity_id));
        let reading = host.current_reading(entity_id).unwrap_or_else(|| {
            tracing::debug!("No state for {}, treating as unavailable", entity_id);
            Reading::unavailable()
        });
        Self::new(entity_id, metric, reading)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorStatus {
    pub entity_id: String,
    pub metric: MetricKind,
    pub status: StatusResult,
}

/// Metric kinds a composite status may consider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindFilter(HashSet<MetricKind>);

impl KindFilter {
    pub fn new(kinds: impl IntoIterator<Item = MetricKind>) -> Self {
        Self(kinds.into_iter().collect())
    }

    /// Ignore comfort metrics (temperature, humidity, pressure, custom)
    pub fn air_quality() -> Self {
        Self::new(MetricKind::AIR_QUALITY)
    }

    pub fn allows(&self, kind: MetricKind) -> bool {
        self.0.contains(&kind)
    }
}

pub struct Aggregator<'a> {
    registry: &'a PresetRegistry,
    palette: &'a Palette,
}

impl<'a> Aggregator<'a> {
    pub fn new(registry: &'a PresetRegistry, palette: &'a Palette) -> Self {
        Self { registry, palette }
    }

    pub fn classify(&self, sensor: &SensorReading) -> SensorStatus {
        let preset = self.registry.get(sensor.metric);
        SensorStatus {
            entity_id: sensor.entity_id.clone(),
            metric: sensor.metric,
            status: classify(preset, sensor.reading.value, self.palette),
        }
    }

    pub fn classify_all(&self, sensors: &[SensorReading]) -> Vec<SensorStatus> {
        sensors.iter().map(|s| self.classify(s)).collect()
    }

    /// Worst sensor by `(level, severity)`. Ties go to the earliest sensor;
    /// with nothing classifiable the result is the unknown placeholder.
    pub fn aggregate(&self, sensors: &[SensorReading], filter: Option<&KindFilter>) -> AggregationResult {
        let statuses = self.classify_all(sensors);
        self.worst(&statuses, filter)
    }

    pub fn worst(&self, statuses: &[SensorStatus], filter: Option<&KindFilter>) -> AggregationResult {
        let mut worst: Option<&SensorStatus> = None;

        for candidate in statuses {
            if filter.is_some_and(|f| !f.allows(candidate.metric)) {
                continue;
            }
            if candidate.status.level == Level::Unknown {
                continue;
            }
            let beats = match worst {
                None => true,
                Some(current) => outranks(&candidate.status, &current.status),
            };
            if beats {
                worst = Some(candidate);
            }
        }

        match worst {
            Some(s) => AggregationResult::from_status(&s.entity_id, &s.status),
            None => AggregationResult::unknown(self.palette),
        }
    }
}

/// Strictly greater `(level rank, severity)`.
fn outranks(a: &StatusResult, b: &StatusResult) -> bool {
    match a.level.rank().cmp(&b.level.rank()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => a.severity > b.severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::host::{EntityState, StateSnapshot};
    use serde_json::json;

    fn reading(v: f64) -> Reading {
        Reading::new(Some(v), "", None)
    }

    fn aggregate(sensors: &[SensorReading], filter: Option<&KindFilter>) -> AggregationResult {
        let registry = PresetRegistry::default();
        let palette = Palette::default();
        Aggregator::new(&registry, &palette).aggregate(sensors, filter)
    }

    #[test]
    fn test_empty_and_unavailable_are_unknown() {
        let result = aggregate(&[], None);
        assert_eq!(result.level, Level::Unknown);
        assert_eq!(result.entity_id, None);

        let sensors = vec![SensorReading::new("sensor.co2", MetricKind::Co2, Reading::unavailable())];
        let result = aggregate(&sensors, None);
        assert_eq!(result.level, Level::Unknown);
        assert_eq!(result.entity_id, None);
    }

    #[test]
    fn test_worst_level_wins() {
        let sensors = vec![
            SensorReading::new("sensor.co2", MetricKind::Co2, reading(900.0)),
            SensorReading::new("sensor.radon", MetricKind::Radon, reading(350.0)),
            SensorReading::new("sensor.voc", MetricKind::Voc, reading(100.0)),
        ];
        let result = aggregate(&sensors, None);
        assert_eq!(result.level, Level::Bad);
        assert_eq!(result.entity_id.as_deref(), Some("sensor.radon"));
    }

    #[test]
    fn test_severity_breaks_level_ties() {
        let sensors = vec![
            SensorReading::new("sensor.co2_a", MetricKind::Co2, reading(850.0)),
            SensorReading::new("sensor.co2_b", MetricKind::Co2, reading(990.0)),
        ];
        let result = aggregate(&sensors, None);
        assert_eq!(result.entity_id.as_deref(), Some("sensor.co2_b"));
    }

    #[test]
    fn test_identical_candidates_keep_input_order() {
        let sensors = vec![
            SensorReading::new("sensor.first", MetricKind::Co2, reading(950.0)),
            SensorReading::new("sensor.second", MetricKind::Co2, reading(950.0)),
        ];
        for _ in 0..3 {
            assert_eq!(aggregate(&sensors, None).entity_id.as_deref(), Some("sensor.first"));
        }
    }

    #[test]
    fn test_air_quality_filter_ignores_comfort() {
        let sensors = vec![
            SensorReading::new("sensor.temp", MetricKind::Temperature, reading(34.0)),
            SensorReading::new("sensor.co2", MetricKind::Co2, reading(900.0)),
        ];
        assert_eq!(aggregate(&sensors, None).entity_id.as_deref(), Some("sensor.temp"));

        let filter = KindFilter::air_quality();
        let result = aggregate(&sensors, Some(&filter));
        assert_eq!(result.entity_id.as_deref(), Some("sensor.co2"));
        assert_eq!(result.level, Level::Warn);
    }

    #[test]
    fn test_everything_filtered_out_is_unknown() {
        let sensors = vec![SensorReading::new("sensor.hum", MetricKind::Humidity, reading(90.0))];
        let result = aggregate(&sensors, Some(&KindFilter::air_quality()));
        assert_eq!(result.level, Level::Unknown);
    }

    #[test]
    fn test_from_host() {
        let states: Vec<EntityState> = serde_json::from_value(json!([
            { "entity_id": "sensor.kitchen_pm25", "state": "40.1", "attributes": { "unit_of_measurement": "µg/m³" } }
        ]))
        .unwrap();
        let snapshot = StateSnapshot::new(states);

        let sensor = SensorReading::from_host("sensor.kitchen_pm25", None, &snapshot);
        assert_eq!(sensor.metric, MetricKind::Pm25);
        assert_eq!(sensor.reading.value, Some(40.1));

        let missing = SensorReading::from_host("sensor.gone", Some(MetricKind::Radon), &snapshot);
        assert_eq!(missing.metric, MetricKind::Radon);
        assert_eq!(missing.reading.value, None);
    }
}
