// SPDX-License-Identifier: MIT OR Apache-2.0
//! The admission chain and method dispatch (spec §4): parse, authenticate,
//! load the app, resolve permissions, rate-limit, then run whichever MCP
//! method was requested.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use ulh_audit::{extract_call_fields, truncate_output, CallLogBuilder};
use ulh_billing::settle;
use ulh_capability::{Byok, CapabilitySurface};
use ulh_core::App;
use ulh_error::{ErrorCode, HostError};
use ulh_policy::EvalContext;
use ulh_protocol::{
    skills_resource_uri, CallToolParams, CallToolResult, InitializeResult, JsonRpcId, JsonRpcRequest,
    JsonRpcResponse, McpMethod, ReadResourceParams, ReadResourceResult, ResourceContent, ResourceEntry,
    ResourcesListResult, ToolDefinition, ToolsListResult, SDK_TOOL_NAMES,
};
use ulh_ratelimit::RateLimitRequest;

use crate::state::AppState;

const OUTPUT_TRUNCATION_BYTES: usize = 32 * 1024;

/// Handle one parsed HTTP request body for `POST /mcp/{appId}`.
pub async fn handle_request(
    state: &Arc<AppState>,
    app_id: &str,
    auth_header: Option<&str>,
    client_ip: Option<&str>,
    body: &[u8],
) -> Response {
    let request = match ulh_protocol::parse_request(body) {
        Ok(r) => r,
        Err(err) => return error_response(state, JsonRpcId::Null, &err),
    };

    if request.is_notification() {
        return StatusCode::ACCEPTED.into_response();
    }
    let id = request.id.clone().unwrap_or(JsonRpcId::Null);

    let Some(method) = McpMethod::parse(&request.method) else {
        let err = HostError::new(ErrorCode::MethodNotFound, format!("unknown method: {}", request.method));
        return error_response(state, id, &err);
    };

    let now = Utc::now();
    let caller = match ulh_auth::verify(auth_header, now, &*state.tokens, &*state.users).await {
        Ok(c) => c,
        Err(err) => return error_response(state, id, &err),
    };

    let app = match state.apps.find_by_id(app_id).await {
        Ok(Some(app)) if !app.hosting_suspended => app,
        Ok(_) => {
            let err = HostError::new(ErrorCode::NotFoundOrSuspended, "App not found");
            return error_response(state, id, &err);
        }
        Err(e) => {
            let err = HostError::new(ErrorCode::Internal, "app lookup failed").with_source(e);
            return error_response(state, id, &err);
        }
    };

    if let Some(scope) = caller.scope.as_ref() {
        let app_in_scope = scope.app_ids.is_empty() || scope.app_ids.iter().any(|a| a == "*" || a == app_id);
        if !app_in_scope {
            let err = HostError::new(ErrorCode::NotFoundOrSuspended, "App not found");
            return error_response(state, id, &err);
        }
    }

    let is_owner = caller.user_id == app.owner_id;
    let resolved = state
        .permission_cache
        .get_or_resolve(&caller.user_id, app_id, now, || async {
            if is_owner {
                return None;
            }
            let rows = state.permissions.list_for(&caller.user_id, app_id).await.unwrap_or_else(|e| {
                warn!(error = %e, "permission lookup failed, denying by default");
                Vec::new()
            });
            ulh_policy::resolve(&caller.user_id, &app.owner_id, app.visibility, rows)
        })
        .await;

    if let Some(set) = &resolved {
        if set.allowed.is_empty() {
            let err = HostError::new(ErrorCode::NotFoundOrSuspended, "App not found");
            return error_response(state, id, &err);
        }
    }

    let wire_method = match method {
        McpMethod::Initialize => "initialize",
        McpMethod::NotificationsInitialized => "notifications/initialized",
        McpMethod::ToolsList => "tools/list",
        McpMethod::ToolsCall => "tools/call",
        McpMethod::ResourcesList => "resources/list",
        McpMethod::ResourcesRead => "resources/read",
    };
    let rate_req = RateLimitRequest {
        method: wire_method,
        user_id: &caller.user_id,
        tier: caller.tier,
        app_id,
        is_owner,
        app_calls_per_minute: app.rate_limit_config.calls_per_minute,
        app_calls_per_day: app.rate_limit_config.calls_per_day,
    };
    if let Err(kind) = state.rate_limiter.check(&rate_req).await {
        let err = HostError::new(ErrorCode::RateLimited, "rate limit exceeded")
            .with_data(json!({"kind": format!("{kind:?}")}));
        return error_response(state, id, &err);
    }

    match method {
        McpMethod::Initialize => handle_initialize(id, &app),
        McpMethod::NotificationsInitialized => StatusCode::ACCEPTED.into_response(),
        McpMethod::ToolsList => handle_tools_list(id, &app, resolved.as_ref()),
        McpMethod::ToolsCall => {
            handle_tools_call(
                state,
                id,
                &app,
                &caller,
                is_owner,
                resolved.as_ref(),
                request,
                auth_header,
                client_ip,
                now,
            )
            .await
        }
        McpMethod::ResourcesList => handle_resources_list(id, &app),
        McpMethod::ResourcesRead => handle_resources_read(state, id, &app, request.params),
    }
}

fn handle_initialize(id: JsonRpcId, app: &App) -> Response {
    let result = InitializeResult::for_app(app.slug.clone(), app.skills_md.as_deref());
    let session_id = Uuid::new_v4().to_string();
    let body = JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null));
    let mut response = Json(body).into_response();
    if let Ok(header) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert("mcp-session-id", header);
    }
    response
}

fn sdk_tool_definitions() -> Vec<ToolDefinition> {
    SDK_TOOL_NAMES
        .iter()
        .map(|name| ToolDefinition {
            name: (*name).to_string(),
            title: None,
            description: format!("Ultralight SDK capability: {name}"),
            input_schema: json!({"type": "object"}),
            output_schema: None,
        })
        .collect()
}

fn handle_tools_list(id: JsonRpcId, app: &App, resolved: Option<&ulh_core::PermissionSet>) -> Response {
    let mut tools: Vec<ToolDefinition> = Vec::new();
    for name in app.function_names() {
        if let Some(set) = resolved {
            if !set.is_allowed(name) {
                continue;
            }
        }
        if let Some(f) = app.find_function(name) {
            tools.push(ToolDefinition {
                name: f.name.clone(),
                title: f.title.clone(),
                description: f.description.clone().unwrap_or_default(),
                input_schema: f.input_schema.clone(),
                output_schema: f.output_schema.clone(),
            });
        }
    }
    tools.extend(sdk_tool_definitions());

    let result = ToolsListResult { tools };
    Json(JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))).into_response()
}

fn handle_resources_list(id: JsonRpcId, app: &App) -> Response {
    let resources = match &app.skills_md {
        Some(_) => vec![ResourceEntry {
            uri: skills_resource_uri(&app.id),
            name: "skills.md".to_string(),
            description: "App documentation and skill reference".to_string(),
            mime_type: "text/markdown".to_string(),
        }],
        None => Vec::new(),
    };
    let result = ResourcesListResult { resources };
    Json(JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))).into_response()
}

fn handle_resources_read(state: &Arc<AppState>, id: JsonRpcId, app: &App, params: Value) -> Response {
    let parsed: Result<ReadResourceParams, _> = serde_json::from_value(params);
    let expected_uri = skills_resource_uri(&app.id);

    match (parsed, &app.skills_md) {
        (Ok(p), Some(text)) if p.uri == expected_uri => {
            let result = ReadResourceResult {
                contents: vec![ResourceContent { uri: p.uri, mime_type: "text/markdown".to_string(), text: text.clone() }],
            };
            Json(JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))).into_response()
        }
        _ => {
            let err = HostError::new(ErrorCode::InvalidParams, "unknown resource uri");
            error_response(state, id, &err)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_tools_call(
    state: &Arc<AppState>,
    id: JsonRpcId,
    app: &App,
    caller: &ulh_core::VerifiedCaller,
    is_owner: bool,
    resolved: Option<&ulh_core::PermissionSet>,
    request: JsonRpcRequest,
    auth_header: Option<&str>,
    client_ip: Option<&str>,
    now: chrono::DateTime<Utc>,
) -> Response {
    let params: CallToolParams = match serde_json::from_value(request.params) {
        Ok(p) => p,
        Err(e) => {
            let err = HostError::new(ErrorCode::InvalidParams, format!("invalid tools/call params: {e}"));
            return error_response(state, id, &err);
        }
    };

    if let Some(scope) = caller.scope.as_ref() {
        if !scope.allows(&app.id, &params.name) {
            let err = HostError::new(ErrorCode::NotFoundOrSuspended, "App not found");
            return error_response(state, id, &err);
        }
    }

    if params.name.starts_with("ultralight.") {
        return handle_sdk_tool_call(state, id, app, caller, auth_header, params).await;
    }

    if app.find_function(&params.name).is_none() {
        let err = HostError::new(ErrorCode::InvalidParams, format!("unknown tool: {}", params.name));
        return error_response(state, id, &err);
    }

    if let Some(set) = resolved {
        if !set.is_allowed(&params.name) {
            let err = HostError::new(ErrorCode::NotFoundOrSuspended, "App not found");
            return error_response(state, id, &err);
        }
        if let Some(row) = set.row_for(&params.name) {
            let ctx = EvalContext { client_ip, now: Some(now), args: Some(&params.arguments) };
            let decision = ulh_policy::evaluate(row, &ctx);
            if !decision.allowed {
                let reason = decision.reason.map(|r| format!("{r:?}")).unwrap_or_default();
                let err = HostError::new(ErrorCode::PermissionDenied, format!("Permission denied: {reason}"));
                return error_response(state, id, &err);
            }
            if let Some(limit) = row.budget_limit {
                if limit > 0 {
                    let _ = state.permission_cache.increment_budget(&caller.user_id, &app.id, &params.name, 1);
                    if let Err(e) = state.permissions.increment_budget(&caller.user_id, &app.id, &params.name, 1).await {
                        warn!(error = %e, "best-effort budget write-back failed");
                    }
                }
            }
        }
    }

    let started_at = Utc::now();
    let setup = match run_setup_orchestrator(state, app, &caller.user_id).await {
        Ok(s) => s,
        Err(err) => return error_response(state, id, &err),
    };

    let (clean_args, extracted) = extract_call_fields(params.arguments);
    let surface = Arc::new(CapabilitySurface::new(
        caller.user_id.clone(),
        app.id.clone(),
        auth_header.and_then(|h| h.strip_prefix("Bearer ")).unwrap_or_default().to_string(),
        state.kv_backend.clone(),
        state.memory_backend.clone(),
        state.ai_provider.clone(),
        state.inter_app.clone(),
        setup.byok,
        setup.env_vars,
    ));

    let outcome = state
        .sandbox
        .invoke(setup.code.source_text.clone(), params.name.clone(), clean_args.clone(), surface)
        .await;
    let finished_at = Utc::now();

    let mut tool_result = if outcome.success {
        let text = match &outcome.result {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        CallToolResult::ok(text, outcome.result.clone())
    } else {
        CallToolResult::error(outcome.error.clone().unwrap_or_else(|| "execution failed".to_string()))
    };

    let price = app.price_for(&params.name);
    let settlement = settle(outcome.success, is_owner, &caller.user_id, &app.owner_id, price, &*state.ledger).await;
    if settlement.requires_payment_required_response() {
        tool_result = CallToolResult::error(ulh_billing::payment_required_message(price));
    }

    let output_value = serde_json::to_value(&tool_result).unwrap_or(Value::Null);
    let mut builder = CallLogBuilder::new(&caller.user_id, &app.id, &params.name, "tools/call")
        .app_metadata(&app.slug, &app.current_version)
        .tier(caller.tier)
        .input(clean_args)
        .timed(started_at, finished_at)
        .ai_cost_cents(outcome.ai_cost_cents)
        .estimated_execution_cost_cents(0)
        .balance_charge_cents(settlement.charged_cents);
    if let Some(session_id) = extracted.session_id {
        let sequence = state.sequencer.next(&session_id);
        builder = builder.session(session_id, sequence);
    }
    if let Some(query) = extracted.user_query {
        builder = builder.user_query(query);
    }
    let record = if outcome.success {
        builder.success(truncate_output(&output_value, OUTPUT_TRUNCATION_BYTES)).build()
    } else {
        builder.failure(outcome.error.unwrap_or_default()).build()
    };
    if state.call_log_queue.try_enqueue(record).is_err() {
        warn!(app_id = %app.id, "call log queue is full, dropping record");
    }

    Json(JsonRpcResponse::success(id, output_value)).into_response()
}

async fn handle_sdk_tool_call(
    state: &Arc<AppState>,
    id: JsonRpcId,
    app: &App,
    caller: &ulh_core::VerifiedCaller,
    auth_header: Option<&str>,
    params: CallToolParams,
) -> Response {
    let bearer_token = auth_header.and_then(|h| h.strip_prefix("Bearer ")).unwrap_or_default().to_string();
    let profile = state.profiles.fetch(&caller.user_id).await.unwrap_or_default();
    let byok = resolve_byok(state, &profile);

    let surface = CapabilitySurface::new(
        caller.user_id.clone(),
        app.id.clone(),
        bearer_token,
        state.kv_backend.clone(),
        state.memory_backend.clone(),
        state.ai_provider.clone(),
        state.inter_app.clone(),
        byok,
        BTreeMap::new(),
    );

    let result = dispatch_sdk_tool(&surface, app, &params.name, params.arguments).await;
    Json(JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))).into_response()
}

fn str_field(args: &Value, field: &str) -> Result<String, String> {
    args.get(field).and_then(Value::as_str).map(str::to_string).ok_or_else(|| format!("missing '{field}' argument"))
}

async fn dispatch_sdk_tool(surface: &CapabilitySurface, app: &App, name: &str, args: Value) -> CallToolResult {
    let tool_name = name.trim_start_matches("ultralight.");
    let outcome = match tool_name {
        "getSkills" => Ok(json!(app.skills_md.clone().unwrap_or_default())),
        "store" => match str_field(&args, "key") {
            Ok(key) => surface.store(&key, args["value"].clone()).await.map(|()| Value::Null).map_err(|e| e.to_string()),
            Err(e) => Err(e),
        },
        "load" => match str_field(&args, "key") {
            Ok(key) => surface.load(&key).await.map(|v| v.unwrap_or(Value::Null)).map_err(|e| e.to_string()),
            Err(e) => Err(e),
        },
        "list" => {
            let prefix = args.get("prefix").and_then(Value::as_str);
            surface.list(prefix).await.map(|keys| json!(keys)).map_err(|e| e.to_string())
        }
        "query" => {
            let prefix = args.get("prefix").and_then(Value::as_str).unwrap_or("");
            let limit = args.get("limit").and_then(Value::as_u64).map(|n| n as usize);
            let offset = args.get("offset").and_then(Value::as_u64).map(|n| n as usize);
            surface
                .query(prefix, limit, offset)
                .await
                .map(|page| json!(page.entries.into_iter().collect::<BTreeMap<_, _>>()))
                .map_err(|e| e.to_string())
        }
        "remove" => match str_field(&args, "key") {
            Ok(key) => surface.remove(&key).await.map(|()| Value::Null).map_err(|e| e.to_string()),
            Err(e) => Err(e),
        },
        "remember" => match str_field(&args, "key") {
            Ok(key) => {
                let scope = args.get("scope").and_then(Value::as_str);
                surface.remember(&key, args["value"].clone(), scope).await.map(|()| Value::Null).map_err(|e| e.to_string())
            }
            Err(e) => Err(e),
        },
        "recall" => match str_field(&args, "key") {
            Ok(key) => {
                let scope = args.get("scope").and_then(Value::as_str);
                surface.recall(&key, scope).await.map(|v| v.unwrap_or(Value::Null)).map_err(|e| e.to_string())
            }
            Err(e) => Err(e),
        },
        "ai" => {
            let request: ulh_capability::AiRequest = serde_json::from_value(args).unwrap_or_default();
            let response = surface.ai(request).await;
            serde_json::to_value(response).map_err(|e| e.to_string())
        }
        "call" => match (str_field(&args, "appId"), str_field(&args, "functionName")) {
            (Ok(target_app), Ok(function_name)) => surface
                .call(&target_app, &function_name, args["arguments"].clone())
                .await
                .map_err(|e| e.to_string()),
            (Err(e), _) | (_, Err(e)) => Err(e),
        },
        _ => Err(format!("unknown sdk tool: {name}")),
    };

    match outcome {
        Ok(value) => CallToolResult::ok(String::new(), Some(value)),
        Err(e) => CallToolResult::error(e),
    }
}

struct SetupResult {
    code: Arc<ulh_cache::CodeCacheEntry>,
    env_vars: BTreeMap<String, String>,
    byok: Option<Byok>,
}

async fn run_setup_orchestrator(state: &Arc<AppState>, app: &App, user_id: &str) -> Result<SetupResult, HostError> {
    let code_fut = state.code_cache.get(&app.id, &app.storage_key, &*state.object_store);
    let secrets_fut = async {
        if app.per_user_keys().is_empty() {
            Ok(BTreeMap::new())
        } else {
            state.secrets.fetch_for(user_id, &app.id).await
        }
    };
    let profile_fut = state.profiles.fetch(user_id);

    let (code_result, secrets_result, profile_result) = tokio::join!(code_fut, secrets_fut, profile_fut);

    let code = code_result.map_err(|e| HostError::new(ErrorCode::Internal, "app code unavailable").with_source(e))?;

    let per_user_secrets = secrets_result.unwrap_or_else(|e| {
        warn!(error = %e, "per-user secret fetch failed, continuing without them");
        BTreeMap::new()
    });
    let have_keys: Vec<String> = per_user_secrets.keys().cloned().collect();
    let missing = app.missing_required_secrets(&have_keys);
    if !missing.is_empty() {
        return Err(HostError::new(ErrorCode::MissingSecrets, "missing required per-user secrets")
            .with_data(json!({"type": "MISSING_SECRETS", "missing": missing})));
    }

    let profile = profile_result.unwrap_or_else(|e| {
        warn!(error = %e, "user profile fetch failed, continuing with defaults");
        ulh_repository::UserProfile::default()
    });

    let master_key = state.config.crypto_master_key.as_bytes();
    let mut universal_env = BTreeMap::new();
    for (key, blob) in &app.env_vars {
        match ulh_crypto::decrypt(master_key, blob) {
            Ok((plaintext, _version)) => {
                universal_env.insert(key.clone(), plaintext);
            }
            Err(e) => warn!(error = %e, key = %key, "env var decryption failed, dropping"),
        }
    }
    let byok = resolve_byok_from(master_key, &profile);
    let merged_env = ulh_capability::merge(&universal_env, &per_user_secrets);

    Ok(SetupResult { code, env_vars: merged_env, byok })
}

fn resolve_byok(state: &Arc<AppState>, profile: &ulh_repository::UserProfile) -> Option<Byok> {
    resolve_byok_from(state.config.crypto_master_key.as_bytes(), profile)
}

fn resolve_byok_from(master_key: &[u8], profile: &ulh_repository::UserProfile) -> Option<Byok> {
    if !profile.byok_enabled {
        return None;
    }
    let blob = profile.byok_encrypted_key.as_ref()?;
    let (decrypted_key, _version) = ulh_crypto::decrypt(master_key, blob).ok()?;
    Some(Byok { provider: profile.byok_provider.clone().unwrap_or_else(|| "openrouter".to_string()), decrypted_key })
}

/// The `GET /a/{appId}/.well-known/mcp.json` discovery document. Returns
/// `None` when the app doesn't exist, is suspended, or is private and the
/// caller isn't its owner (private-app existence must not leak, spec §6).
pub async fn discovery_document(state: &Arc<AppState>, app_id: &str, auth_header: Option<&str>) -> Option<Value> {
    let app = state.apps.find_by_id(app_id).await.ok().flatten()?;
    if app.hosting_suspended {
        return None;
    }

    if app.visibility == ulh_core::Visibility::Private {
        let now = Utc::now();
        let caller = ulh_auth::verify(auth_header, now, &*state.tokens, &*state.users).await.ok()?;
        if caller.user_id != app.owner_id {
            return None;
        }
    }

    let app_tools: Vec<&str> = app.function_names();
    let resources_count = usize::from(app.skills_md.is_some());

    Some(json!({
        "name": app.slug,
        "transport": {"type": "http-post", "url": format!("/mcp/{}", app.id)},
        "capabilities": ulh_protocol::ServerCapabilities::default(),
        "tools_count": app_tools.len() + SDK_TOOL_NAMES.len(),
        "app_tools": app_tools,
        "sdk_tools": SDK_TOOL_NAMES,
        "resources_count": resources_count,
    }))
}

fn error_response(state: &Arc<AppState>, id: JsonRpcId, err: &HostError) -> Response {
    let status = StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(JsonRpcResponse::error(id, err))).into_response();
    if err.code == ErrorCode::AuthFailed {
        let value = format!("Bearer resource_metadata=\"{}\"", state.config.oauth_protected_resource_url());
        if let Ok(header) = HeaderValue::from_str(&value) {
            response.headers_mut().insert("www-authenticate", header);
        }
    }
    response
}
