/// climate_api: read-only HTTP API over a station climate dataset.
///
/// # Module structure
///
/// ```text
/// climate_api
/// ├── model     — table rows and query results (Measurement, Station, TemperatureSummary, …)
/// ├── config    — service configuration loader (climate_api.toml)
/// ├── db        — PostgreSQL connection and table verification
/// ├── store
/// │   ├── pg     — ClimateStore over postgres::Client
/// │   └── memory — ClimateStore over in-process vectors
/// ├── query     — the five read operations, date validation, number rendering
/// └── endpoint  — URL routing and the tiny_http worker pool
/// ```

/// Public modules
pub mod config;
pub mod db;
pub mod endpoint;
pub mod model;
pub mod query;
pub mod store;
