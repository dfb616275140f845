// Air quality telemetry - sensor classification, history and chart series
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
