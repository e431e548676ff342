// HTTP API for the trigger executor
//
// Routes (all JSON responses wrapped in the v1 envelope):
// - GET  /api/v1/authorization/triggers?platform=
// - POST /api/v1/authorization/trigger-all      {deviceId, platform}
// - POST /api/v1/authorization/{group}/{action} {serial | udid}
// - GET  /health
// - GET  /metrics (Prometheus text, when enabled)

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::TriggerError;
use crate::metrics;
use crate::triggers::{
    get_all_available_triggers, trigger_all_available_authorizations, AuthorizationTriggers,
    IdentifierKind, TriggerDispatch, TriggerId,
};

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const API_VERSION: &str = "v1";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub triggers: Arc<dyn TriggerDispatch>,
    pub metrics_enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    ts: String,
    correlation_id: String,
    api_version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
    meta: Meta,
}

/// Request correlation id: echoed from the client or freshly generated
fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn respond<T: Serialize>(
    status: StatusCode,
    correlation: String,
    data: Option<T>,
    error: Option<ErrorBody>,
) -> Response {
    let envelope = Envelope {
        ok: error.is_none(),
        data,
        error,
        meta: Meta {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            correlation_id: correlation.clone(),
            api_version: API_VERSION,
        },
    };

    let mut response = (status, Json(envelope)).into_response();
    if let Ok(value) = HeaderValue::from_str(&correlation) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
    response
}

fn ok<T: Serialize>(correlation: String, data: T) -> Response {
    respond(StatusCode::OK, correlation, Some(data), None)
}

fn fail(
    status: StatusCode,
    correlation: String,
    code: &'static str,
    message: impl Into<String>,
    details: Option<Value>,
) -> Response {
    respond::<()>(
        status,
        correlation,
        None,
        Some(ErrorBody {
            code,
            message: message.into(),
            details,
        }),
    )
}

fn trigger_error(correlation: String, e: TriggerError, context: &str) -> Response {
    match e {
        TriggerError::InvalidInput => fail(
            StatusCode::BAD_REQUEST,
            correlation,
            "VALIDATION_ERROR",
            e.to_string(),
            None,
        ),
        other => {
            error!("{}: {}", context, other);
            fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                correlation,
                "INTERNAL_ERROR",
                context,
                Some(serde_json::json!({ "error": other.to_string() })),
            )
        }
    }
}

/// Parse an optional JSON body; an empty body is the default value
fn parse_body<T>(body: &Bytes) -> Result<T, serde_json::Error>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(T::default())
    } else {
        serde_json::from_slice(body)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    platform: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest {
    device_id: Option<String>,
    platform: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TriggerRequest {
    serial: Option<String>,
    udid: Option<String>,
}

async fn list_triggers(headers: HeaderMap, Query(query): Query<ListQuery>) -> Response {
    let platform = non_empty(query.platform).unwrap_or_else(|| "all".to_string());
    ok(correlation_id(&headers), get_all_available_triggers(&platform))
}

async fn trigger_all(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let correlation = correlation_id(&headers);
    let request: BatchRequest = parse_body(&body).unwrap_or_default();

    let (Some(device_id), Some(platform)) =
        (non_empty(request.device_id), non_empty(request.platform))
    else {
        return fail(
            StatusCode::BAD_REQUEST,
            correlation,
            "VALIDATION_ERROR",
            "Device ID and platform required",
            None,
        );
    };

    match trigger_all_available_authorizations(state.triggers.as_ref(), &device_id, &platform).await {
        Ok(report) => ok(correlation, report),
        Err(e) => trigger_error(correlation, e, "Failed to trigger all authorizations"),
    }
}

async fn run_trigger(
    State(state): State<AppState>,
    Path((group, action)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation = correlation_id(&headers);
    let route = format!("{}/{}", group, action);

    let Some(trigger) = TriggerId::from_route(&route) else {
        return not_found_for(correlation, &route);
    };

    let request: TriggerRequest = parse_body(&body).unwrap_or_default();
    let kind = trigger.identifier_kind();
    let identifier = match kind {
        IdentifierKind::Udid => non_empty(request.udid),
        IdentifierKind::Serial => non_empty(request.serial),
    };
    let Some(identifier) = identifier else {
        return fail(
            StatusCode::BAD_REQUEST,
            correlation,
            "VALIDATION_ERROR",
            kind.missing_message(),
            None,
        );
    };

    match state.triggers.dispatch(trigger, &identifier).await {
        Ok(result) => ok(correlation, result),
        Err(e) => trigger_error(correlation, e, &format!("Failed to run {}", trigger.name())),
    }
}

async fn health_handler(headers: HeaderMap) -> Response {
    ok(
        correlation_id(&headers),
        serde_json::json!({ "status": "ok", "healthy": true }),
    )
}

async fn metrics_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.metrics_enabled {
        return not_found_for(correlation_id(&headers), "metrics");
    }
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

fn not_found_for(correlation: String, what: &str) -> Response {
    warn!("No route for {}", what);
    fail(
        StatusCode::NOT_FOUND,
        correlation,
        "NOT_FOUND",
        format!("Route not found: {}", what),
        None,
    )
}

async fn fallback(headers: HeaderMap, uri: axum::http::Uri) -> Response {
    not_found_for(correlation_id(&headers), uri.path())
}

/// Build the API router over any dispatcher
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/authorization/triggers", get(list_triggers))
        .route("/api/v1/authorization/trigger-all", post(trigger_all))
        .route("/api/v1/authorization/{group}/{action}", post(run_trigger))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API with the production executor until the process exits
pub async fn serve(config: &Config) -> Result<()> {
    if config.metrics.enabled {
        metrics::init().context("Failed to initialize metrics")?;
    }

    let state = AppState {
        triggers: Arc::new(AuthorizationTriggers::from_config(config)),
        metrics_enabled: config.metrics.enabled,
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    info!("Starting authorization API on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, router(state))
        .await
        .context("Authorization API server error")?;

    Ok(())
}
