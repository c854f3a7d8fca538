/// In-process `ClimateStore` over plain vectors.
///
/// Applies the same textual date comparisons the SQL store does, so it can
/// stand in for the database when exercising the query layer and endpoint.

use super::{ClimateStore, StoreError};
use crate::model::{DailyObservation, DateSpan, Measurement, Station, TemperatureSummary, DATE_FORMAT};
use chrono::NaiveDate;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    measurements: Vec<Measurement>,
    stations: Vec<Station>,
}

impl MemoryStore {
    pub fn new(measurements: Vec<Measurement>, stations: Vec<Station>) -> Self {
        Self {
            measurements,
            stations,
        }
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl ClimateStore for MemoryStore {
    fn precipitation_history(&mut self) -> Result<Vec<DailyObservation>, StoreError> {
        let mut history: Vec<DailyObservation> =
            self.measurements.iter().map(DailyObservation::from).collect();
        // stable, so equal dates keep insertion order
        history.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(history)
    }

    fn station_names(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(self.stations.iter().map(|s| s.name.clone()).collect())
    }

    fn station_temperatures(
        &mut self,
        station: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<f64>, StoreError> {
        let (from, to) = (date_key(from), date_key(to));
        Ok(self
            .measurements
            .iter()
            .filter(|m| m.station == station && m.date >= from && m.date <= to)
            .map(|m| m.tobs)
            .collect())
    }

    fn date_exists(&mut self, date: NaiveDate) -> Result<bool, StoreError> {
        let key = date_key(date);
        Ok(self.measurements.iter().any(|m| m.date == key))
    }

    fn date_span(&mut self) -> Result<Option<DateSpan>, StoreError> {
        let first = self.measurements.iter().map(|m| &m.date).min();
        let last = self.measurements.iter().map(|m| &m.date).max();
        Ok(first.zip(last).map(|(first, last)| DateSpan {
            first: first.clone(),
            last: last.clone(),
        }))
    }

    fn temperature_summary(
        &mut self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Option<TemperatureSummary>, StoreError> {
        let start = date_key(start);
        let end = end.map(date_key);

        let temps: Vec<f64> = self
            .measurements
            .iter()
            .filter(|m| m.date >= start && end.as_ref().is_none_or(|end| &m.date <= end))
            .map(|m| m.tobs)
            .collect();

        if temps.is_empty() {
            return Ok(None);
        }

        let lowest = temps.iter().copied().fold(f64::INFINITY, f64::min);
        let highest = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let average = temps.iter().sum::<f64>() / temps.len() as f64;

        Ok(Some(TemperatureSummary {
            lowest,
            average,
            highest,
        }))
    }
}
