/// PostgreSQL-backed `ClimateStore`.
///
/// `measurement.date` is text in `YYYY-MM-DD` form, so range predicates
/// compare strings; bound parameters are rendered in the same format.

use super::{ClimateStore, StoreError};
use crate::db;
use crate::model::{DailyObservation, DateSpan, TemperatureSummary, DATE_FORMAT};
use chrono::NaiveDate;
use postgres::Client;

pub struct PgStore {
    client: Client,
}

impl PgStore {
    /// Wrap an already verified client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Open a connection, select `schema` and verify the climate tables.
    pub fn connect(db_url: &str, schema: &str) -> Result<Self, StoreError> {
        let client = db::connect_and_verify(db_url, schema)?;
        Ok(Self::new(client))
    }
}

fn date_param(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl ClimateStore for PgStore {
    fn precipitation_history(&mut self) -> Result<Vec<DailyObservation>, StoreError> {
        let rows = self
            .client
            .query("SELECT date, tobs::float8 FROM measurement ORDER BY date", &[])?;

        rows.iter()
            .map(|row| {
                Ok(DailyObservation {
                    date: row.try_get(0)?,
                    tobs: row.try_get(1)?,
                })
            })
            .collect()
    }

    fn station_names(&mut self) -> Result<Vec<String>, StoreError> {
        let rows = self.client.query("SELECT name FROM station", &[])?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }

    fn station_temperatures(
        &mut self,
        station: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<f64>, StoreError> {
        let rows = self.client.query(
            "SELECT tobs::float8
             FROM measurement
             WHERE station = $1 AND date >= $2 AND date <= $3",
            &[&station, &date_param(from), &date_param(to)],
        )?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }

    fn date_exists(&mut self, date: NaiveDate) -> Result<bool, StoreError> {
        let row = self.client.query_one(
            "SELECT EXISTS(SELECT 1 FROM measurement WHERE date = $1)",
            &[&date_param(date)],
        )?;
        Ok(row.try_get(0)?)
    }

    fn date_span(&mut self) -> Result<Option<DateSpan>, StoreError> {
        let row = self
            .client
            .query_one("SELECT MIN(date), MAX(date) FROM measurement", &[])?;

        let first: Option<String> = row.try_get(0)?;
        let last: Option<String> = row.try_get(1)?;
        Ok(first.zip(last).map(|(first, last)| DateSpan { first, last }))
    }

    fn temperature_summary(
        &mut self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Option<TemperatureSummary>, StoreError> {
        let start = date_param(start);
        let row = match end {
            Some(end) => self.client.query_one(
                "SELECT MIN(tobs)::float8, AVG(tobs)::float8, MAX(tobs)::float8
                 FROM measurement
                 WHERE date >= $1 AND date <= $2",
                &[&start, &date_param(end)],
            )?,
            None => self.client.query_one(
                "SELECT MIN(tobs)::float8, AVG(tobs)::float8, MAX(tobs)::float8
                 FROM measurement
                 WHERE date >= $1",
                &[&start],
            )?,
        };

        let lowest: Option<f64> = row.try_get(0)?;
        let average: Option<f64> = row.try_get(1)?;
        let highest: Option<f64> = row.try_get(2)?;

        Ok(match (lowest, average, highest) {
            (Some(lowest), Some(average), Some(highest)) => Some(TemperatureSummary {
                lowest,
                average,
                highest,
            }),
            _ => None,
        })
    }
}
