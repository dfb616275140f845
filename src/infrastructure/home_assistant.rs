// Home Assistant REST client
use crate::application::host::{EntityState, HistorySource, StateSnapshot};
use crate::domain::telemetry::HistorySample;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl HomeAssistantClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn build_history_url(&self, entity_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        let start = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = end.to_rfc3339_opts(SecondsFormat::Secs, true);
        format!(
            "{}/api/history/period/{}?filter_entity_id={}&end_time={}&minimal_response",
            self.base_url,
            urlencoding::encode(&start),
            urlencoding::encode(entity_id),
            urlencoding::encode(&end)
        )
    }

    fn build_states_url(&self) -> String {
        format!("{}/api/states", self.base_url)
    }

    async fn execute<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to Home Assistant")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Home Assistant request failed with status {}: {}", status, body);
        }

        response
            .json::<T>()
            .await
            .context("Failed to parse Home Assistant response")
    }

    /// Current state of every entity the host exposes.
    pub async fn fetch_states(&self) -> Result<StateSnapshot> {
        let states: Vec<EntityState> = self.execute(&self.build_states_url()).await?;
        tracing::debug!("Fetched {} entity states", states.len());
        Ok(StateSnapshot::new(states))
    }
}

#[async_trait]
impl HistorySource for HomeAssistantClient {
    async fn fetch_history(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistorySample>> {
        let url = self.build_history_url(entity_id, start, end);
        // One inner list per filtered entity
        let series: Vec<Vec<HistorySample>> = self
            .execute(&url)
            .await
            .with_context(|| format!("Failed to fetch history for {}", entity_id))?;

        let samples = series.into_iter().next().unwrap_or_default();
        tracing::debug!("Fetched {} history samples for {}", samples.len(), entity_id);
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_history_url() {
        let client = HomeAssistantClient::new("http://ha.local:8123/".to_string(), "token".to_string());
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();

        let url = client.build_history_url("sensor.living_room_co2", start, end);
        assert_eq!(
            url,
            "http://ha.local:8123/api/history/period/2024-03-01T00%3A00%3A00Z\
             ?filter_entity_id=sensor.living_room_co2&end_time=2024-03-02T00%3A00%3A00Z&minimal_response"
        );
    }

    #[test]
    fn test_build_states_url() {
        let client = HomeAssistantClient::new("https://ha.example.com".to_string(), "token".to_string());
        assert_eq!(client.build_states_url(), "https://ha.example.com/api/states");
    }

    #[test]
    fn test_history_response_shape() {
        let body = r#"[[
            {"entity_id": "sensor.co2", "state": "612", "last_changed": "2024-03-01T00:00:00+00:00"},
            {"state": "640", "last_changed": "2024-03-01T00:05:00+00:00"},
            {"state": "unavailable", "last_changed": "2024-03-01T00:10:00+00:00"}
        ]]"#;
        let series: Vec<Vec<HistorySample>> = serde_json::from_str(body).unwrap();
        let samples = &series[0];
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1].value(), Some(640.0));
        assert_eq!(samples[2].value(), None);
        assert_eq!(samples[0].timestamp_ms(), Some(1_709_251_200_000));
    }
}
