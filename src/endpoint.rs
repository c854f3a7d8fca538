/// HTTP endpoint for the climate query service
///
/// Endpoints (all GET):
/// - /                         - HTML index of routes
/// - /health                   - Service health check
/// - /api/v1.0/precipitation   - [{date, tobs}, ...] in date order
/// - /api/v1.0/stations        - station names
/// - /api/v1.0/tobs            - recent observations for the configured station
/// - /api/v1.0/{start}         - temperature statistics from start onwards
/// - /api/v1.0/{start}/{end}   - temperature statistics for start..=end
///
/// Routing is a pure function of (method, url, service) so it can be
/// exercised without a socket; `serve` wires it to a tiny_http listener.

use crate::config::{ServerConfig, TobsConfig};
use crate::query::{ApiError, QueryService};
use crate::store::ClimateStore;
use serde::Serialize;
use serde_json::{Value, json};
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use threadpool::ThreadPool;
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{error, info, warn};

const API_PREFIX: &str = "/api/v1.0";

const AVAILABLE_ROUTES: &[&str] = &[
    "/api/v1.0/precipitation",
    "/api/v1.0/stations",
    "/api/v1.0/tobs",
    "/api/v1.0/<start>",
    "/api/v1.0/<start>/<end>",
];

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Failed to start HTTP server on {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("At least one worker store is required")]
    NoWorkers,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Html(String),
}

/// Status plus body, independent of the HTTP library
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Body,
}

impl ApiResponse {
    fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            body: Body::Json(value),
        }
    }

    fn ok<T: Serialize>(payload: &T) -> Result<Self, ApiError> {
        Ok(Self::json(200, serde_json::to_value(payload)?))
    }

    fn error(err: &ApiError) -> Self {
        Self::json(err.status_code(), err.to_json())
    }

    fn content_type(&self) -> &'static str {
        match self.body {
            Body::Json(_) => "application/json; charset=utf-8",
            Body::Html(_) => "text/html; charset=utf-8",
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        match self.body {
            Body::Json(value) => value.to_string().into_bytes(),
            Body::Html(html) => html.into_bytes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Dispatch one request to the query service
pub fn route<S: ClimateStore>(service: &mut QueryService<S>, method: &str, url: &str) -> ApiResponse {
    if !method.eq_ignore_ascii_case("GET") {
        return ApiResponse::json(
            405,
            json!({
                "error": "method_not_allowed",
                "status": 405,
                "message": format!("{} is not supported, use GET", method),
            }),
        );
    }

    let path = request_path(url);

    match path {
        "/" => return index(),
        "/health" => return handle_health(),
        _ => {}
    }

    let Some(segments) = api_segments(path) else {
        return not_found(path);
    };

    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    let result = match segments.as_slice() {
        ["precipitation"] => service.precipitation().and_then(|v| ApiResponse::ok(&v)),
        ["stations"] => service.stations().and_then(|v| ApiResponse::ok(&v)),
        ["tobs"] => service.recent_temperatures().and_then(|v| ApiResponse::ok(&v)),
        [start] => service.start_statistics(start).and_then(|v| ApiResponse::ok(&v)),
        [start, end] => service
            .range_statistics(start, end)
            .and_then(|v| ApiResponse::ok(&v)),
        _ => return not_found(path),
    };

    result.unwrap_or_else(|err| {
        if err.status_code() >= 500 {
            error!(path, "request failed: {}", err);
        }
        ApiResponse::error(&err)
    })
}

/// Path without query string, with a single trailing slash removed
fn request_path(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}

/// Percent-decoded segments after /api/v1.0, or None for other paths
fn api_segments(path: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix(API_PREFIX)?.strip_prefix('/')?;
    rest.split('/')
        .map(|segment| {
            if segment.is_empty() {
                return None;
            }
            urlencoding::decode(segment).ok().map(|s| s.into_owned())
        })
        .collect()
}

fn index() -> ApiResponse {
    let mut html = String::from("Hawaii Climate Analysis<br/>Available Routes:<br/>");
    html.push_str(&AVAILABLE_ROUTES.join("<br/>"));
    ApiResponse {
        status: 200,
        body: Body::Html(html),
    }
}

fn handle_health() -> ApiResponse {
    ApiResponse::json(
        200,
        json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

fn not_found(path: &str) -> ApiResponse {
    ApiResponse::json(
        404,
        json!({
            "error": "not_found",
            "status": 404,
            "message": format!("no route for {}", path),
            "available_endpoints": AVAILABLE_ROUTES,
        }),
    )
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Bind the listener described by `config`
pub fn bind(config: &ServerConfig) -> Result<Arc<Server>, EndpointError> {
    let addr = format!("{}:{}", config.host, config.port);
    let server = Server::http(&addr).map_err(|e| EndpointError::Bind {
        addr: addr.clone(),
        message: e.to_string(),
    })?;
    Ok(Arc::new(server))
}

/// Serve requests with one worker thread per store.
///
/// Each worker pulls requests from the shared listener and answers them with
/// its own store handle. Blocks until every worker has stopped.
pub fn serve<S>(server: Arc<Server>, tobs: TobsConfig, stores: Vec<S>) -> Result<(), EndpointError>
where
    S: ClimateStore + Send + 'static,
{
    if stores.is_empty() {
        return Err(EndpointError::NoWorkers);
    }

    let pool = ThreadPool::with_name("climate-api-worker".to_string(), stores.len());

    for (worker, store) in stores.into_iter().enumerate() {
        let server = Arc::clone(&server);
        let tobs = tobs.clone();
        pool.execute(move || {
            let mut service = QueryService::new(store, tobs);
            info!(worker, "worker ready");
            for request in server.incoming_requests() {
                handle_request(&mut service, request);
            }
            info!(worker, "worker stopped");
        });
    }

    pool.join();
    Ok(())
}

/// Bind and serve until the listener shuts down
pub fn start_endpoint_server<S>(
    config: &ServerConfig,
    tobs: TobsConfig,
    stores: Vec<S>,
) -> Result<(), EndpointError>
where
    S: ClimateStore + Send + 'static,
{
    let server = bind(config)?;

    info!("HTTP endpoint listening on http://{}:{}", config.host, config.port);
    for route in AVAILABLE_ROUTES {
        info!("  GET {}", route);
    }

    serve(server, tobs, stores)
}

fn handle_request<S: ClimateStore>(service: &mut QueryService<S>, request: Request) {
    let started = Instant::now();
    let method = request.method().to_string();
    let url = request.url().to_string();

    let response = route_guarded(service, &method, &url);
    let status = response.status;

    info!(
        %method,
        %url,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    if let Err(e) = request.respond(create_response(response)) {
        warn!(%url, "Failed to send response: {}", e);
    }
}

/// `route`, with a panic turned into a 500 so the worker keeps serving
fn route_guarded<S: ClimateStore>(service: &mut QueryService<S>, method: &str, url: &str) -> ApiResponse {
    match panic::catch_unwind(AssertUnwindSafe(|| route(service, method, url))) {
        Ok(response) => response,
        Err(_) => {
            error!(%method, %url, "request handler panicked");
            ApiResponse::json(
                500,
                json!({
                    "error": "internal_error",
                    "status": 500,
                    "message": "internal server error",
                }),
            )
        }
    }
}

/// Convert an ApiResponse into a tiny_http response
fn create_response(response: ApiResponse) -> Response<Cursor<Vec<u8>>> {
    let status = StatusCode(response.status);
    let content_type = response.content_type();
    let mut http = Response::from_data(response.into_bytes()).with_status_code(status);

    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        http = http.with_header(header);
    }
    http
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
