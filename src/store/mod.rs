/// Store access for the query service.
///
/// Handlers never talk to the database directly; they receive something
/// implementing `ClimateStore`. Each endpoint worker owns one.
///
/// Submodules:
/// - `pg`       — SQL implementation over a `postgres::Client`.
/// - `memory`   — in-process implementation over plain vectors.

pub mod memory;
pub mod pg;

use crate::model::{DailyObservation, DateSpan, TemperatureSummary};
use chrono::NaiveDate;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Query(#[from] postgres::Error),

    #[error("Database setup invalid: {0}")]
    Setup(#[from] crate::db::DbConfigError),
}

/// Read-only queries over the `measurement` and `station` tables.
///
/// Dates are passed as validated `NaiveDate`s and compared against the
/// stored `YYYY-MM-DD` text.
pub trait ClimateStore {
    /// All (date, tobs) pairs ordered by date ascending.
    fn precipitation_history(&mut self) -> Result<Vec<DailyObservation>, StoreError>;

    /// Station names in store order.
    fn station_names(&mut self) -> Result<Vec<String>, StoreError>;

    /// `tobs` values for one station with `from <= date <= to`.
    fn station_temperatures(
        &mut self,
        station: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<f64>, StoreError>;

    /// Whether any measurement row carries exactly this date.
    fn date_exists(&mut self, date: NaiveDate) -> Result<bool, StoreError>;

    /// Earliest and latest measurement dates; `None` for an empty table.
    fn date_span(&mut self) -> Result<Option<DateSpan>, StoreError>;

    /// min/avg/max of `tobs` over `start <= date` and, when given,
    /// `date <= end`. `None` when no row matches.
    fn temperature_summary(
        &mut self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Option<TemperatureSummary>, StoreError>;
}
