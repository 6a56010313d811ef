//! Mock geocoder - local Nominatim-compatible search server
//!
//! Serves `GET /search?q=<place>&format=json&limit=N` from a small built-in gazetteer so the
//! planner can run offline. Unknown names return an empty array, which the planner treats
//! as "not found".
//!
//! Behavior:
//! 1. Listens on configurable port (default 8089)
//! 2. Optionally sleeps before answering, to exercise superseded analyses
//! 3. `GET /health` answers "ok"
//!
//! Usage:
//!   cargo run --bin mock_geocoder -- --port 8089 --delay-ms 500
//!   CONFIG_FILE=config/dev.toml cargo run --bin route-planner -- -o Mumbai -d Pune

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use route_planner::infra::logging;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// name, lat, lon, display name
const GAZETTEER: &[(&str, f64, f64, &str)] = &[
    ("mumbai", 19.0760, 72.8777, "Mumbai, Maharashtra, India"),
    ("pune", 18.5204, 73.8567, "Pune, Maharashtra, India"),
    ("delhi", 28.6139, 77.2090, "Delhi, India"),
    ("new delhi", 28.6139, 77.2090, "New Delhi, Delhi, India"),
    ("bengaluru", 12.9716, 77.5946, "Bengaluru, Karnataka, India"),
    ("bangalore", 12.9716, 77.5946, "Bengaluru, Karnataka, India"),
    ("chennai", 13.0827, 80.2707, "Chennai, Tamil Nadu, India"),
    ("kolkata", 22.5726, 88.3639, "Kolkata, West Bengal, India"),
    ("hyderabad", 17.3850, 78.4867, "Hyderabad, Telangana, India"),
    ("jaipur", 26.9124, 75.7873, "Jaipur, Rajasthan, India"),
    ("goa", 15.2993, 74.1240, "Goa, India"),
    ("ahmedabad", 23.0225, 72.5714, "Ahmedabad, Gujarat, India"),
    ("london", 51.5074, -0.1278, "London, Greater London, England, United Kingdom"),
    ("tokyo", 35.6762, 139.6503, "Tokyo, Japan"),
];

#[derive(Parser, Debug)]
#[command(name = "mock_geocoder")]
#[command(about = "Mock Nominatim search server for local planning")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "8089")]
    port: u16,

    /// Delay before each search answer (ms)
    #[arg(long, default_value = "0")]
    delay_ms: u64,
}

/// First comma-separated part, case-insensitive
fn lookup(query: &str) -> Option<&'static (&'static str, f64, f64, &'static str)> {
    let key = query.split(',').next().unwrap_or_default().trim().to_lowercase();
    GAZETTEER.iter().find(|(name, ..)| *name == key)
}

/// Nominatim-shaped body: degrees as strings, empty array when nothing matches
fn search_body(query: &str, limit: usize) -> String {
    let candidates: Vec<serde_json::Value> = lookup(query)
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (_, lat, lon, display_name))| {
            serde_json::json!({
                "place_id": i + 1,
                "lat": format!("{:.7}", lat),
                "lon": format!("{:.7}", lon),
                "display_name": display_name,
            })
        })
        .collect();
    serde_json::Value::Array(candidates).to_string()
}

/// `q` and `limit` from the request query string
fn search_params(req: &Request<hyper::body::Incoming>) -> (String, usize) {
    let Some(raw) = req.uri().query() else {
        return (String::new(), 1);
    };
    let Ok(url) = reqwest::Url::parse(&format!("http://mock/search?{}", raw)) else {
        return (String::new(), 1);
    };

    let mut q = String::new();
    let mut limit = 1;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "q" => q = value.into_owned(),
            "limit" => limit = value.parse().unwrap_or(1),
            _ => {}
        }
    }
    (q, limit)
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    delay: Arc<Duration>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/search") => {
            let (q, limit) = search_params(&req);
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            let body = search_body(&q, limit);
            debug!(q = %q, found = %(body != "[]"), "search_answered");
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    logging::init(false);
    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = TcpListener::bind(addr).await?;
    let delay = Arc::new(Duration::from_millis(args.delay_ms));

    info!(
        addr = %addr,
        delay_ms = %args.delay_ms,
        places = %GAZETTEER.len(),
        "mock_geocoder_started"
    );

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let delay = delay.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let delay = delay.clone();
                                async move { handle_request(req, delay).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "mock_geocoder_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "mock_geocoder_accept_error");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("mock_geocoder_shutdown");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("  MUMBAI ").map(|p| p.1), Some(19.0760));
        assert_eq!(lookup("Pune, Maharashtra").map(|p| p.2), Some(73.8567));
        assert!(lookup("Xyzzyplonk123").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn test_search_body_shape() {
        let body: serde_json::Value = serde_json::from_str(&search_body("Delhi", 1)).unwrap();
        assert_eq!(body[0]["lat"], "28.6139000");
        assert_eq!(body[0]["lon"], "77.2090000");

        assert_eq!(search_body("Atlantis", 1), "[]");
        assert_eq!(search_body("Delhi", 0), "[]");
    }

    #[test]
    fn test_body_parses_as_planner_response() {
        let coord = route_planner::io::geocoder::parse_search_response(&search_body("Goa", 1))
            .unwrap();
        assert_eq!(coord.lat(), 15.2993);
        assert_eq!(coord.lon(), 74.1240);
    }
}
