// Main entry point - Dependency injection and report generation
use std::sync::Arc;

use airq_telemetry::application::aggregator::SensorReading;
use airq_telemetry::application::history_service::HistoryService;
use airq_telemetry::domain::preset::PresetRegistry;
use airq_telemetry::infrastructure::config::{format_hour_label, load_app_config};
use airq_telemetry::infrastructure::home_assistant::HomeAssistantClient;
use airq_telemetry::presentation::report::ReportBuilder;
use futures::future::join_all;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = load_app_config()?;

    // Create host client (infrastructure layer)
    let client = Arc::new(HomeAssistantClient::new(
        config.home_assistant.base_url.clone(),
        config.home_assistant.token.clone(),
    ));

    // Create services (application layer)
    let registry = PresetRegistry::new(config.custom_preset.as_ref());
    let history = HistoryService::new(
        client.clone(),
        config.history.cache_capacity,
        config.history.freshness(),
    );
    let builder = ReportBuilder::new(&registry, &config.palette);

    let snapshot = client.fetch_states().await?;
    tracing::info!("Loaded {} entities from Home Assistant", snapshot.len());

    let readings: Vec<SensorReading> = config
        .sensors
        .iter()
        .map(|s| SensorReading::from_host(&s.entity_id, s.preset, &snapshot))
        .collect();

    let hours = config.chart.hours();
    let now_ms = chrono::Utc::now().timestamp_millis();
    let options = config.chart.series_options(now_ms);

    let histories = join_all(readings.iter().map(|r| history.get_history(&r.entity_id, hours))).await;

    let sensors = config
        .sensors
        .iter()
        .zip(&readings)
        .zip(histories)
        .map(|((sensor, reading), samples)| {
            let series = samples
                .map_err(|e| e.to_string())
                .and_then(|samples| {
                    builder
                        .series(reading.metric, &samples, &options)
                        .map_err(|e| e.to_string())
                });
            if let Err(e) = &series {
                tracing::warn!("No chart for {}: {}", reading.entity_id, e);
            }
            builder
                .sensor(reading, sensor.name.as_deref())
                .with_history(series)
        })
        .collect();

    let ranges = config.chart.ranges().into_iter().map(format_hour_label).collect();
    let filter = config.aggregate.kind_filter();
    let report = builder.report(sensors, &readings, filter.as_ref(), ranges);

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
