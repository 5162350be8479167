pub mod logging;
pub mod telemetry;
