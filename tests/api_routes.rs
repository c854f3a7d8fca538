/// Integration tests for the query routes
///
/// Drives the public router against an in-memory dataset shaped like the
/// Hawaii station data, checking the response contract of every route:
/// 1. Listings (precipitation, stations, tobs)
/// 2. Start-date and range statistics
/// 3. Error responses for malformed and unknown dates
/// 4. A round trip through a real tiny_http listener
///
/// Run with: cargo test --test api_routes

use chrono::NaiveDate;
use climate_api::config::{ServerConfig, TobsConfig};
use climate_api::endpoint::{self, ApiResponse, Body};
use climate_api::db::DbConfigError;
use climate_api::model::{DailyObservation, DateSpan, Measurement, Station, TemperatureSummary};
use climate_api::query::QueryService;
use climate_api::store::{ClimateStore, MemoryStore, StoreError};
use serde_json::Value;
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const PRIMARY_STATION: &str = "USC00519281";
const SECOND_STATION: &str = "USC00513117";

fn measurement(station: &str, date: &str, precipitation: Option<f64>, tobs: f64) -> Measurement {
    Measurement {
        station: station.to_string(),
        date: date.to_string(),
        precipitation,
        tobs,
    }
}

fn stations() -> Vec<Station> {
    vec![
        Station {
            station: PRIMARY_STATION.to_string(),
            name: "WAIHEE 837.5, HI US".to_string(),
            latitude: 21.45167,
            longitude: -157.84889,
            elevation: 32.9,
        },
        Station {
            station: SECOND_STATION.to_string(),
            name: "KANEOHE 838.1, HI US".to_string(),
            latitude: 21.4234,
            longitude: -157.8015,
            elevation: 14.6,
        },
        Station {
            station: "USC00519397".to_string(),
            name: "WAIKIKI 717.2, HI US".to_string(),
            latitude: 21.2716,
            longitude: -157.8168,
            elevation: 3.0,
        },
    ]
}

/// Two stations over early January 2017 plus the last day of the dataset.
/// Rows are deliberately not in date order.
fn measurements() -> Vec<Measurement> {
    vec![
        measurement(PRIMARY_STATION, "2017-01-03", Some(0.0), 70.0),
        measurement(PRIMARY_STATION, "2017-01-01", Some(0.29), 60.0),
        measurement(SECOND_STATION, "2017-01-02", None, 66.0),
        measurement(PRIMARY_STATION, "2017-01-02", Some(0.01), 65.0),
        measurement(SECOND_STATION, "2017-01-01", Some(0.03), 62.0),
        measurement(SECOND_STATION, "2017-08-23", Some(0.0), 81.0),
        measurement(PRIMARY_STATION, "2017-08-23", Some(0.45), 76.0),
        measurement(PRIMARY_STATION, "2016-08-23", Some(1.79), 77.0),
        measurement(PRIMARY_STATION, "2016-08-22", Some(0.4), 78.0),
    ]
}

fn service() -> QueryService<MemoryStore> {
    QueryService::new(
        MemoryStore::new(measurements(), stations()),
        TobsConfig::default(),
    )
}

fn get(service: &mut QueryService<MemoryStore>, url: &str) -> ApiResponse {
    endpoint::route(service, "GET", url)
}

fn json(response: &ApiResponse) -> &Value {
    match &response.body {
        Body::Json(value) => value,
        Body::Html(_) => panic!("expected a JSON body"),
    }
}

fn strings(response: &ApiResponse) -> Vec<String> {
    serde_json::from_value(json(response).clone()).expect("body should be an array of strings")
}

/// Parses the number after "<label>: " in a statistics line.
fn value_of(lines: &[String], label: &str) -> f64 {
    let prefix = format!("{}: ", label);
    lines
        .iter()
        .find_map(|line| line.strip_prefix(&prefix))
        .unwrap_or_else(|| panic!("missing '{}' line in {:?}", label, lines))
        .parse()
        .expect("statistic should be numeric")
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Store whose every query fails, as when the database has gone away.
struct UnavailableStore;

fn unavailable() -> StoreError {
    StoreError::Setup(DbConfigError::MissingTable {
        schema: "public".to_string(),
        table: "measurement".to_string(),
    })
}

impl ClimateStore for UnavailableStore {
    fn precipitation_history(&mut self) -> Result<Vec<DailyObservation>, StoreError> {
        Err(unavailable())
    }
    fn station_names(&mut self) -> Result<Vec<String>, StoreError> {
        Err(unavailable())
    }
    fn station_temperatures(
        &mut self,
        _station: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<f64>, StoreError> {
        Err(unavailable())
    }
    fn date_exists(&mut self, _date: NaiveDate) -> Result<bool, StoreError> {
        Err(unavailable())
    }
    fn date_span(&mut self) -> Result<Option<DateSpan>, StoreError> {
        Err(unavailable())
    }
    fn temperature_summary(
        &mut self,
        _start: NaiveDate,
        _end: Option<NaiveDate>,
    ) -> Result<Option<TemperatureSummary>, StoreError> {
        Err(unavailable())
    }
}

fn http_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// 1. Listings
// ---------------------------------------------------------------------------

#[test]
fn test_precipitation_is_date_ordered_and_complete() {
    let mut service = service();
    let response = get(&mut service, "/api/v1.0/precipitation");
    assert_eq!(response.status, 200);

    let entries = json(&response).as_array().expect("array body");
    assert_eq!(entries.len(), measurements().len());

    let dates: Vec<&str> = entries
        .iter()
        .map(|e| e["date"].as_str().expect("date string"))
        .collect();
    assert!(dates.windows(2).all(|w| w[0] <= w[1]), "dates not ordered: {:?}", dates);

    for entry in entries {
        let object = entry.as_object().unwrap();
        assert_eq!(object.len(), 2, "entries carry only date and tobs");
        assert!(object["tobs"].is_number());
    }
}

#[test]
fn test_precipitation_empty_dataset_is_empty_array() {
    let mut service = QueryService::new(MemoryStore::default(), TobsConfig::default());
    let response = get(&mut service, "/api/v1.0/precipitation");
    assert_eq!(response.status, 200);
    assert_eq!(json(&response), &Value::Array(Vec::new()));
}

#[test]
fn test_stations_are_flat_names_without_duplicates() {
    let mut service = service();
    let names = strings(&get(&mut service, "/api/v1.0/stations"));

    assert_eq!(names.len(), stations().len());
    let unique: HashSet<&String> = names.iter().collect();
    assert_eq!(unique.len(), names.len());
    assert_eq!(names[0], "WAIHEE 837.5, HI US");
}

#[test]
fn test_tobs_covers_last_year_of_primary_station() {
    let mut service = service();
    let response = get(&mut service, "/api/v1.0/tobs");
    assert_eq!(response.status, 200);

    // 2016-08-23 ..= 2017-08-23 for the primary station only, in store order
    assert_eq!(
        json(&response),
        &serde_json::json!([70.0, 60.0, 65.0, 76.0, 77.0])
    );
}

// ---------------------------------------------------------------------------
// 2. Statistics
// ---------------------------------------------------------------------------

// The fixture temperatures are two-digit integers, so rounding the average
// to two significant digits cannot move it outside [lowest, highest].
#[test]
fn test_start_statistics_shape_and_ordering() {
    let mut service = service();
    let lines = strings(&get(&mut service, "/api/v1.0/2017-01-02"));

    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Entered Start Date: 2017-01-02");
    assert_eq!(lines[1], "Lowest Temperature: 65");
    assert_eq!(lines[3], "Highest Temperature: 81");

    let lowest = value_of(&lines, "Lowest Temperature");
    let average = value_of(&lines, "Average Temperature");
    let highest = value_of(&lines, "Highest Temperature");
    assert!(lowest <= average && average <= highest);
}

#[test]
fn test_range_statistics_shape_and_ordering() {
    let mut service = service();
    let lines = strings(&get(&mut service, "/api/v1.0/2017-01-01/2017-01-03"));

    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "Entered Start Date: 2017-01-01");
    assert_eq!(lines[1], "Entered End Date: 2017-01-03");
    assert_eq!(lines[2], "Lowest Temperature: 60");
    assert_eq!(lines[3], "Average Temperature: 65");
    assert_eq!(lines[4], "Highest Temperature: 70");
}

#[test]
fn test_single_day_range_matches_direct_aggregate() {
    let mut service = service();
    let lines = strings(&get(&mut service, "/api/v1.0/2017-01-01/2017-01-01"));

    let day: Vec<f64> = measurements()
        .iter()
        .filter(|m| m.date == "2017-01-01")
        .map(|m| m.tobs)
        .collect();
    let lowest = day.iter().copied().fold(f64::INFINITY, f64::min);
    let highest = day.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let average = day.iter().sum::<f64>() / day.len() as f64;

    assert_eq!(value_of(&lines, "Lowest Temperature"), lowest);
    assert_eq!(value_of(&lines, "Highest Temperature"), highest);
    assert_eq!(value_of(&lines, "Average Temperature"), average);

    let summary = service
        .store_mut()
        .temperature_summary(date("2017-01-01"), Some(date("2017-01-01")))
        .unwrap()
        .unwrap();
    assert_eq!(summary.lowest, lowest);
    assert_eq!(summary.highest, highest);
}

// ---------------------------------------------------------------------------
// 3. Error responses
// ---------------------------------------------------------------------------

#[test]
fn test_unknown_start_date_is_404_with_payload() {
    let mut service = service();
    let response = get(&mut service, "/api/v1.0/2099-01-01");

    assert_eq!(response.status, 404);
    let body = json(&response);
    assert_eq!(body["error"], "date_not_found");
    assert_eq!(body["date"], "2099-01-01");
    assert_eq!(body["available_range"]["first"], "2016-08-22");
    assert_eq!(body["available_range"]["last"], "2017-08-23");
}

#[test]
fn test_unknown_end_date_is_404() {
    let mut service = service();
    let response = get(&mut service, "/api/v1.0/2017-01-01/2017-01-04");
    assert_eq!(response.status, 404);
    assert_eq!(json(&response)["date"], "2017-01-04");
}

#[test]
fn test_malformed_dates_are_400() {
    let mut service = service();
    for url in [
        "/api/v1.0/2017-13-45",
        "/api/v1.0/not-a-date",
        "/api/v1.0/2017-1-1",
        "/api/v1.0/2017-01-01/2017-02-30",
        "/api/v1.0/2017-01-01%27%20OR%201=1",
    ] {
        let response = get(&mut service, url);
        assert_eq!(response.status, 400, "{} should be rejected", url);
        assert_eq!(json(&response)["error"], "invalid_date");
    }
}

#[test]
fn test_reversed_range_is_400() {
    let mut service = service();
    let response = get(&mut service, "/api/v1.0/2017-01-03/2017-01-01");
    assert_eq!(response.status, 400);
    assert_eq!(json(&response)["error"], "invalid_range");
}

#[test]
fn test_unavailable_store_is_500_on_every_data_route() {
    let mut service = QueryService::new(UnavailableStore, TobsConfig::default());
    for url in [
        "/api/v1.0/precipitation",
        "/api/v1.0/stations",
        "/api/v1.0/tobs",
        "/api/v1.0/2017-01-01",
        "/api/v1.0/2017-01-01/2017-01-03",
    ] {
        let response = endpoint::route(&mut service, "GET", url);
        assert_eq!(response.status, 500, "{} should fail with a server error", url);

        let body = json(&response);
        assert_eq!(body["error"], "store_error");
        assert_eq!(body["message"], "internal server error");
        assert!(!body.to_string().contains("measurement"), "store detail leaked for {}", url);
    }

    // routes that never touch the store still answer
    let response = endpoint::route(&mut service, "GET", "/health");
    assert_eq!(response.status, 200);
}

// ---------------------------------------------------------------------------
// 4. Live listener
// ---------------------------------------------------------------------------

#[test]
fn test_round_trip_over_http() {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        workers: 2,
    };
    let server = endpoint::bind(&config).expect("bind to an ephemeral port");
    let addr = server
        .server_addr()
        .to_ip()
        .expect("TCP listener address");

    let stores = vec![
        MemoryStore::new(measurements(), stations()),
        MemoryStore::new(measurements(), stations()),
    ];
    let listener = server.clone();
    let _serving = thread::spawn(move || endpoint::serve(listener, TobsConfig::default(), stores));

    let base = format!("http://{}", addr);

    let ok = reqwest::blocking::get(format!("{}/api/v1.0/2017-01-01/2017-01-03", base)).unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    assert!(
        ok.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );
    let lines: Vec<String> = ok.json().unwrap();
    assert_eq!(lines[3], "Average Temperature: 65");

    let missing = reqwest::blocking::get(format!("{}/api/v1.0/2099-01-01", base)).unwrap();
    assert_eq!(missing.status().as_u16(), 404);
    let body: Value = missing.json().unwrap();
    assert_eq!(body["error"], "date_not_found");

    let index = reqwest::blocking::get(format!("{}/", base)).unwrap();
    assert_eq!(index.status().as_u16(), 200);
    assert!(index.text().unwrap().contains("Available Routes"));
}

#[test]
fn test_single_worker_keeps_serving_after_failed_tobs_window() {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        workers: 1,
    };
    let server = endpoint::bind(&config).expect("bind to an ephemeral port");
    let addr = server
        .server_addr()
        .to_ip()
        .expect("TCP listener address");

    // window start falls before the earliest representable date
    let tobs = TobsConfig {
        reference_date: Some(NaiveDate::MIN),
        lookback_days: 365,
        ..TobsConfig::default()
    };
    let stores = vec![MemoryStore::new(measurements(), stations())];
    let listener = server.clone();
    let _serving = thread::spawn(move || endpoint::serve(listener, tobs, stores));

    let base = format!("http://{}", addr);
    let client = http_client();

    for _ in 0..3 {
        let failed = client.get(format!("{}/api/v1.0/tobs", base)).send().unwrap();
        assert_eq!(failed.status().as_u16(), 500);
    }

    let names: Vec<String> = client
        .get(format!("{}/api/v1.0/stations", base))
        .send()
        .expect("worker should still answer")
        .json()
        .unwrap();
    assert_eq!(names.len(), stations().len());
}
