/// Shared data types for the climate query service.
///
/// `Measurement` and `Station` mirror the two tables populated by the
/// external import step. The remaining types are the shapes the query layer
/// hands back to the endpoint.

use serde::{Deserialize, Serialize};

/// Canonical textual date format used by the `measurement.date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Table rows
// ---------------------------------------------------------------------------

/// One daily observation for one station (`measurement` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Station identifier, e.g. "USC00519281".
    pub station: String,
    /// Observation date as stored, `YYYY-MM-DD`.
    pub date: String,
    /// Precipitation in inches; missing readings are common.
    pub precipitation: Option<f64>,
    /// Observed temperature.
    pub tobs: f64,
}

/// A monitoring site (`station` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub station: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// Entry of the precipitation history listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyObservation {
    pub date: String,
    pub tobs: f64,
}

/// min/avg/max of `tobs` over a date range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSummary {
    pub lowest: f64,
    pub average: f64,
    pub highest: f64,
}

/// Earliest and latest measurement dates present in the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub first: String,
    pub last: String,
}

impl From<&Measurement> for DailyObservation {
    fn from(m: &Measurement) -> Self {
        DailyObservation {
            date: m.date.clone(),
            tobs: m.tobs,
        }
    }
}
