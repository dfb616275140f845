// Host interfaces - current sensor state and historical samples
use crate::domain::preset::MetricKind;
use crate::domain::telemetry::{value_to_f64, HistorySample, Reading};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch raw samples for one entity over `[start, end]`
    async fn fetch_history(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<HistorySample>>;
}

pub trait StateLookup {
    /// Current reading for an entity, `None` if the host does not know it
    fn current_reading(&self, entity_id: &str) -> Option<Reading>;

    /// Metric inferred from the entity's id, unit and device class
    fn detect_metric(&self, entity_id: &str) -> MetricKind;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityAttributes {
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
    #[serde(default)]
    pub device_class: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub attributes: EntityAttributes,
    #[serde(default)]
    pub last_changed: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl EntityState {
    pub fn reading(&self, unit_fallback: &str) -> Reading {
        let unit = self
            .attributes
            .unit_of_measurement
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| unit_fallback.to_string());
        let sample = HistorySample {
            state: Some(self.state.clone()),
            last_changed: self.last_changed.clone().map(Value::String),
            last_updated: self.last_updated.clone().map(Value::String),
            ..Default::default()
        };
        Reading::new(value_to_f64(&self.state), unit, sample.timestamp_ms())
    }
}

/// Point-in-time copy of host state, keyed by entity id.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    entities: HashMap<String, EntityState>,
}

impl StateSnapshot {
    pub fn new(states: Vec<EntityState>) -> Self {
        let entities = states
            .into_iter()
            .map(|s| (s.entity_id.clone(), s))
            .collect();
        Self { entities }
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.entities.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl StateLookup for StateSnapshot {
    fn current_reading(&self, entity_id: &str) -> Option<Reading> {
        self.get(entity_id).map(|s| s.reading(""))
    }

    fn detect_metric(&self, entity_id: &str) -> MetricKind {
        let attrs = self.get(entity_id).map(|s| &s.attributes);
        MetricKind::detect(
            entity_id,
            attrs.and_then(|a| a.unit_of_measurement.as_deref()),
            attrs.and_then(|a| a.device_class.as_deref()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> StateSnapshot {
        let states: Vec<EntityState> = serde_json::from_value(json!([
            {
                "entity_id": "sensor.office_co2",
                "state": "812",
                "attributes": { "unit_of_measurement": "ppm", "device_class": "carbon_dioxide" },
                "last_changed": "2024-03-01T09:00:00Z"
            },
            {
                "entity_id": "sensor.office_humidity",
                "state": "unavailable",
                "attributes": { "unit_of_measurement": "%" }
            }
        ]))
        .unwrap();
        StateSnapshot::new(states)
    }

    #[test]
    fn test_current_reading() {
        let snap = snapshot();
        let reading = snap.current_reading("sensor.office_co2").unwrap();
        assert_eq!(reading.value, Some(812.0));
        assert_eq!(reading.unit, "ppm");
        assert_eq!(reading.timestamp_ms, Some(1_709_283_600_000));

        let reading = snap.current_reading("sensor.office_humidity").unwrap();
        assert_eq!(reading.value, None);
        assert!(snap.current_reading("sensor.missing").is_none());
    }

    #[test]
    fn test_detect_metric_uses_attributes() {
        let snap = snapshot();
        assert_eq!(snap.detect_metric("sensor.office_co2"), MetricKind::Co2);
        assert_eq!(snap.detect_metric("sensor.office_humidity"), MetricKind::Humidity);
        assert_eq!(snap.detect_metric("sensor.unknown_radon"), MetricKind::Radon);
    }

    #[test]
    fn test_unit_fallback() {
        let state: EntityState = serde_json::from_value(json!({
            "entity_id": "sensor.pm",
            "state": 4.2
        }))
        .unwrap();
        assert_eq!(state.reading("µg/m³").unit, "µg/m³");
    }
}
