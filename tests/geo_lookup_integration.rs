//! Geolocation client tests against a local stand-in for the ipapi.co service

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use trackly::geo::{CachedGeoLookup, GeoLookup, IpApiClient, LookupUnavailable};

async fn whoami() -> impl IntoResponse {
    Json(json!({
        "ip": "1.2.3.4",
        "city": "Testville",
        "region": "TS",
        "country_name": "Testland",
        "country_code": "TL",
        "latitude": 1.5
    }))
}

async fn lookup_ip(Path(ip): Path<String>) -> impl IntoResponse {
    match ip.as_str() {
        "9.9.9.9" => Json(json!({
            "ip": ip,
            "error": true,
            "reason": "RateLimited"
        }))
        .into_response(),
        "9.9.9.10" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "9.9.9.11" => "this is not json".into_response(),
        "9.9.9.12" => Json(json!({ "latitude": 1.5 })).into_response(),
        _ => Json(json!({
            "ip": ip,
            "city": "Lookupville",
            "region": null,
            "country_name": "Testland"
        }))
        .into_response(),
    }
}

/// Serve the fake provider on an ephemeral port
async fn spawn_fake_provider() -> SocketAddr {
    let app = Router::new()
        .route("/json/", get(whoami))
        .route("/{ip}/json/", get(lookup_ip));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> IpApiClient {
    IpApiClient::new(
        format!("http://{addr}/json/"),
        format!("http://{addr}/{{ip}}/json/"),
    )
    .unwrap()
}

fn ip(s: &str) -> Option<IpAddr> {
    Some(s.parse().unwrap())
}

#[tokio::test]
async fn test_lookup_caller_address() {
    let client = client_for(spawn_fake_provider().await);

    let info = client.lookup(None).await.unwrap();
    assert_eq!(info.ip.as_deref(), Some("1.2.3.4"));
    assert_eq!(info.city.as_deref(), Some("Testville"));
    assert_eq!(info.region.as_deref(), Some("TS"));
    assert_eq!(info.country.as_deref(), Some("Testland"));
}

#[tokio::test]
async fn test_lookup_specific_address() {
    let client = client_for(spawn_fake_provider().await);

    let info = client.lookup(ip("8.8.8.8")).await.unwrap();
    assert_eq!(info.ip.as_deref(), Some("8.8.8.8"));
    assert_eq!(info.city.as_deref(), Some("Lookupville"));
    assert_eq!(info.region, None);
}

#[tokio::test]
async fn test_provider_errors_are_unavailable() {
    let client = client_for(spawn_fake_provider().await);

    assert!(matches!(
        client.lookup(ip("9.9.9.9")).await,
        Err(LookupUnavailable::Rejected(reason)) if reason == "RateLimited"
    ));
    assert!(matches!(
        client.lookup(ip("9.9.9.10")).await,
        Err(LookupUnavailable::Status(500))
    ));
    assert!(matches!(
        client.lookup(ip("9.9.9.11")).await,
        Err(LookupUnavailable::Malformed(_))
    ));
    assert!(matches!(
        client.lookup(ip("9.9.9.12")).await,
        Err(LookupUnavailable::Malformed(_))
    ));
}

#[tokio::test]
async fn test_unreachable_provider_is_unavailable() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr);
    assert!(matches!(
        client.lookup(None).await,
        Err(LookupUnavailable::Network(_))
    ));
}

#[tokio::test]
async fn test_cache_in_front_of_http_client() {
    let client = Arc::new(client_for(spawn_fake_provider().await));
    let cached = CachedGeoLookup::new(client, 100, Duration::from_secs(60));

    let first = cached.lookup(ip("8.8.4.4")).await.unwrap();
    let second = cached.lookup(ip("8.8.4.4")).await.unwrap();
    assert_eq!(first, second);

    assert!(cached.lookup(ip("9.9.9.10")).await.is_err());
}
