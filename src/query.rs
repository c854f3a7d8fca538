/// Query layer for the climate API.
///
/// `QueryService` owns one store handle and implements the five read
/// operations behind the `/api/v1.0` routes. Path parameters arrive as raw
/// strings and are validated here before they reach the store.

use crate::config::TobsConfig;
use crate::model::{DailyObservation, DateSpan, TemperatureSummary, DATE_FORMAT};
use crate::store::{ClimateStore, StoreError};
use chrono::{Days, NaiveDate};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("'{input}' is not a valid date, expected YYYY-MM-DD")]
    InvalidDate { input: String },

    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: String, end: String },

    #[error("no measurements recorded on {date}")]
    DateNotFound {
        date: String,
        available: Option<DateSpan>,
    },

    #[error("no temperature observations from {start}")]
    NoObservations { start: String },

    #[error("store access failed: {0}")]
    Store(#[from] StoreError),

    #[error("stored date '{0}' is malformed")]
    MalformedStoredDate(String),

    #[error("lookback of {lookback_days} days from {reference} is out of the date range")]
    WindowOutOfRange {
        reference: NaiveDate,
        lookback_days: u32,
    },

    #[error("failed to encode response: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidDate { .. } | ApiError::InvalidRange { .. } => 400,
            ApiError::DateNotFound { .. } | ApiError::NoObservations { .. } => 404,
            ApiError::Store(_)
            | ApiError::MalformedStoredDate(_)
            | ApiError::WindowOutOfRange { .. }
            | ApiError::Encoding(_) => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidDate { .. } => "invalid_date",
            ApiError::InvalidRange { .. } => "invalid_range",
            ApiError::DateNotFound { .. } => "date_not_found",
            ApiError::NoObservations { .. } => "no_observations",
            ApiError::Store(_) => "store_error",
            ApiError::MalformedStoredDate(_)
            | ApiError::WindowOutOfRange { .. }
            | ApiError::Encoding(_) => "internal_error",
        }
    }

    /// JSON error payload. Server-side failures get a generic message.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": self.kind(),
            "status": self.status_code(),
        });

        match self {
            ApiError::Store(_)
            | ApiError::MalformedStoredDate(_)
            | ApiError::WindowOutOfRange { .. }
            | ApiError::Encoding(_) => {
                body["message"] = json!("internal server error");
            }
            ApiError::InvalidDate { input } => {
                body["message"] = json!(self.to_string());
                body["input"] = json!(input);
            }
            ApiError::InvalidRange { start, end } => {
                body["message"] = json!(self.to_string());
                body["start"] = json!(start);
                body["end"] = json!(end);
            }
            ApiError::DateNotFound { date, available } => {
                body["message"] = json!(self.to_string());
                body["date"] = json!(date);
                if let Some(span) = available {
                    body["available_range"] = json!(span);
                }
            }
            ApiError::NoObservations { start } => {
                body["message"] = json!(self.to_string());
                body["start"] = json!(start);
            }
        }

        body
    }
}

// ---------------------------------------------------------------------------
// Path parameter validation
// ---------------------------------------------------------------------------

/// Parses a path date, accepting only the canonical zero-padded form.
///
/// The canonical form is required because the stored dates are compared as
/// text; "2017-1-5" would parse but sort after "2017-01-31".
pub fn parse_path_date(input: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .ok()
        .filter(|date| date.format(DATE_FORMAT).to_string() == input)
        .ok_or_else(|| ApiError::InvalidDate {
            input: input.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Number rendering
// ---------------------------------------------------------------------------

/// Shortest decimal rendering of a reading: 60.0 -> "60", 61.5 -> "61.5".
pub fn format_reading(value: f64) -> String {
    format!("{}", value)
}

/// Rounds to `digits` significant digits and renders positionally without
/// trailing zeros: (65.0, 2) -> "65", (72.37, 2) -> "72", (123.4, 2) -> "120".
pub fn format_significant(value: f64, digits: u32) -> String {
    if value == 0.0 || !value.is_finite() {
        return format_reading(value);
    }

    let digits = digits.max(1) as i32;
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = digits - 1 - magnitude;

    if decimals >= 0 {
        let text = format!("{:.*}", decimals as usize, value);
        trim_fraction(&text)
    } else {
        let scale = 10f64.powi(-decimals);
        format!("{}", (value / scale).round() * scale)
    }
}

fn trim_fraction(text: &str) -> String {
    if !text.contains('.') {
        return text.to_string();
    }
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct QueryService<S> {
    store: S,
    tobs: TobsConfig,
}

impl<S: ClimateStore> QueryService<S> {
    pub fn new(store: S, tobs: TobsConfig) -> Self {
        Self { store, tobs }
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// All (date, tobs) pairs in date order.
    pub fn precipitation(&mut self) -> Result<Vec<DailyObservation>, ApiError> {
        Ok(self.store.precipitation_history()?)
    }

    /// Station names as a flat list.
    pub fn stations(&mut self) -> Result<Vec<String>, ApiError> {
        Ok(self.store.station_names()?)
    }

    /// Observations for the configured station over the lookback window.
    ///
    /// The window ends at the configured reference date or, when none is set,
    /// at the latest measurement date in the dataset.
    pub fn recent_temperatures(&mut self) -> Result<Vec<f64>, ApiError> {
        let Some(reference) = self.reference_date()? else {
            return Ok(Vec::new());
        };
        let lookback_days = self.tobs.lookback_days;
        let from = reference
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .ok_or(ApiError::WindowOutOfRange {
                reference,
                lookback_days,
            })?;

        debug!(station = %self.tobs.station, %from, %reference, "recent temperatures window");
        Ok(self
            .store
            .station_temperatures(&self.tobs.station, from, reference)?)
    }

    fn reference_date(&mut self) -> Result<Option<NaiveDate>, ApiError> {
        if let Some(date) = self.tobs.reference_date {
            return Ok(Some(date));
        }

        match self.store.date_span()? {
            Some(span) => match NaiveDate::parse_from_str(&span.last, DATE_FORMAT) {
                Ok(date) => Ok(Some(date)),
                Err(e) => {
                    error!(last = %span.last, "latest measurement date is malformed: {}", e);
                    Err(ApiError::MalformedStoredDate(span.last))
                }
            },
            None => Ok(None),
        }
    }

    /// Statistics from `start` to the end of the dataset.
    pub fn start_statistics(&mut self, start: &str) -> Result<Vec<String>, ApiError> {
        let start_date = parse_path_date(start)?;
        self.require_date(start_date, start)?;

        let summary = self.summary(start_date, None, start)?;
        Ok(vec![
            format!("Entered Start Date: {}", start),
            format!("Lowest Temperature: {}", format_reading(summary.lowest)),
            format!("Average Temperature: {}", format_significant(summary.average, 2)),
            format!("Highest Temperature: {}", format_reading(summary.highest)),
        ])
    }

    /// Statistics over `start..=end`.
    pub fn range_statistics(&mut self, start: &str, end: &str) -> Result<Vec<String>, ApiError> {
        let start_date = parse_path_date(start)?;
        let end_date = parse_path_date(end)?;
        if start_date > end_date {
            return Err(ApiError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        self.require_date(start_date, start)?;
        self.require_date(end_date, end)?;

        let summary = self.summary(start_date, Some(end_date), start)?;
        Ok(vec![
            format!("Entered Start Date: {}", start),
            format!("Entered End Date: {}", end),
            format!("Lowest Temperature: {}", format_reading(summary.lowest)),
            format!("Average Temperature: {}", format_significant(summary.average, 2)),
            format!("Highest Temperature: {}", format_reading(summary.highest)),
        ])
    }

    fn require_date(&mut self, date: NaiveDate, input: &str) -> Result<(), ApiError> {
        if self.store.date_exists(date)? {
            return Ok(());
        }
        Err(ApiError::DateNotFound {
            date: input.to_string(),
            available: self.store.date_span()?,
        })
    }

    fn summary(
        &mut self,
        start: NaiveDate,
        end: Option<NaiveDate>,
        input: &str,
    ) -> Result<TemperatureSummary, ApiError> {
        self.store
            .temperature_summary(start, end)?
            .ok_or_else(|| ApiError::NoObservations {
                start: input.to_string(),
            })
    }
}
