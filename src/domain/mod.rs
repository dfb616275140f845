// Domain layer - Core business entities and rules
pub mod classification;
pub mod preset;
pub mod status;
pub mod telemetry;
