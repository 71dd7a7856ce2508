// SPDX-License-Identifier: MIT OR Apache-2.0
//! The MCP dispatcher and admission chain (spec §2, §4): wires the Token
//! Verifier, App Loader, Permission Resolver/Constraint Evaluator, Rate
//! Limiter, Setup Orchestrator, Sandbox Gateway, Billing Settler, and Call
//! Logger behind `POST /mcp/{appId}`.
#![deny(unsafe_code)]

mod ai_provider;
mod dispatch;
mod inter_app;
pub mod middleware;
mod sandbox_engine;
mod state;

pub use ai_provider::OpenRouterAiProvider;
pub use inter_app::LocalInterAppInvoker;
pub use sandbox_engine::UnimplementedSandboxEngine;
pub use state::{AppState, AppStateDeps};

use axum::{
    extract::{Path as AxPath, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use middleware::request_id_middleware;

/// Assemble the full router: the MCP endpoint, the discovery document, and
/// transport-level middleware.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/mcp/{app_id}", post(handle_mcp_post).get(handle_mcp_get).delete(handle_mcp_delete))
        .route("/a/{app_id}/.well-known/mcp.json", get(handle_discovery))
        .layer(axum::middleware::from_fn(middleware::RequestLogger::layer))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_mcp_get() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert("allow", HeaderValue::from_static("POST, DELETE"));
    (StatusCode::METHOD_NOT_ALLOWED, headers)
}

/// `DELETE /mcp/{appId}` tears down a session client-side; the host has no
/// session state worth destroying, so this is an acknowledging no-op
/// (spec §4.1).
async fn handle_mcp_delete() -> impl IntoResponse {
    StatusCode::ACCEPTED
}

async fn handle_mcp_post(
    State(state): State<Arc<AppState>>,
    AxPath(app_id): AxPath<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let auth_header = headers.get("authorization").and_then(|v| v.to_str().ok());
    let client_ip = client_ip_of(&headers);
    dispatch::handle_request(&state, &app_id, auth_header, client_ip.as_deref(), &body).await
}

/// Extract the caller's address from `X-Forwarded-For` (spec §4.4's IP
/// allowlist constraint), trusting the first hop since this host is always
/// deployed behind a reverse proxy.
fn client_ip_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

async fn handle_discovery(
    State(state): State<Arc<AppState>>,
    AxPath(app_id): AxPath<String>,
    headers: HeaderMap,
) -> Response {
    let auth_header = headers.get("authorization").and_then(|v| v.to_str().ok());

    match dispatch::discovery_document(&state, &app_id, auth_header).await {
        Some(doc) => Json(doc).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "App not found"}))).into_response(),
    }
}
