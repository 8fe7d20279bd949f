use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{MatchedPath, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::state::AppState;

/// In-process request counters keyed by route template. Quota rejections
/// (429) are counted apart from other failures.
#[derive(Clone, Default)]
pub struct GatewayMetrics {
    inner: Arc<Mutex<MetricsInner>>,
}

#[derive(Default)]
struct MetricsInner {
    total_requests: u64,
    total_errors: u64,
    total_throttled: u64,
    routes: HashMap<String, RouteStats>,
}

#[derive(Default)]
struct RouteStats {
    request_count: u64,
    error_count: u64,
    throttled_count: u64,
    total_latency_ms: u64,
}

impl GatewayMetrics {
    pub async fn record(&self, route: &str, status: StatusCode, latency: Duration) {
        let throttled = status == StatusCode::TOO_MANY_REQUESTS;
        let failed = !throttled && (status.is_client_error() || status.is_server_error());

        let mut inner = self.inner.lock().await;
        inner.total_requests += 1;
        inner.total_errors += u64::from(failed);
        inner.total_throttled += u64::from(throttled);
        let stats = inner.routes.entry(route.to_string()).or_default();
        stats.request_count += 1;
        stats.error_count += u64::from(failed);
        stats.throttled_count += u64::from(throttled);
        stats.total_latency_ms += latency.as_millis() as u64;
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().await;
        let mut routes: Vec<RouteMetrics> = inner
            .routes
            .iter()
            .map(|(route, stats)| RouteMetrics {
                route: route.clone(),
                requests: stats.request_count,
                errors: stats.error_count,
                throttled: stats.throttled_count,
                avg_latency_ms: (stats.request_count > 0)
                    .then(|| stats.total_latency_ms as f64 / stats.request_count as f64),
            })
            .collect();
        routes.sort_by(|a, b| a.route.cmp(&b.route));
        MetricsSnapshot {
            total_requests: inner.total_requests,
            total_errors: inner.total_errors,
            total_throttled: inner.total_throttled,
            routes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_throttled: u64,
    pub routes: Vec<RouteMetrics>,
}

#[derive(Debug, Serialize)]
pub struct RouteMetrics {
    pub route: String,
    pub requests: u64,
    pub errors: u64,
    pub throttled: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<f64>,
}

pub async fn metrics_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    // Templates keep user-specific paths from growing the table.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let start = Instant::now();
    let response = next.run(req).await;
    state
        .metrics
        .record(&route, response.status(), start.elapsed())
        .await;
    Ok(response)
}
