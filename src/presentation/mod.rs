// Presentation layer - Output formatting
pub mod report;
