#![deny(unsafe_code)]
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use reqwest::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ulh_audit::{CallLogRecord, CallLogger};
use ulh_cache::{CodeCache, PermissionCache, SessionSequencer};
use ulh_capability::{InMemoryKv, InMemoryMemory};
use ulh_config::HostConfig;
use ulh_host::{AppState, OpenRouterAiProvider, UnimplementedSandboxEngine};
use ulh_queue::WorkQueue;
use ulh_ratelimit::{EndpointLimits, InProcessCounterStore, RateLimiter, WeeklyLimits};
use ulh_repository::memory::InMemoryStore;
use ulh_sandbox::SandboxGateway;

#[derive(Parser, Debug)]
#[command(name = "ulh-host", version, about = "Ultralight MCP host")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: String,

    /// Maximum number of app source blobs held in the code cache.
    #[arg(long, default_value_t = 256)]
    code_cache_capacity: usize,

    /// Maximum number of resolved permission sets held in the permission cache.
    #[arg(long, default_value_t = 4096)]
    permission_cache_capacity: usize,

    /// Bounded capacity of the call-log delivery queue.
    #[arg(long, default_value_t = 1024)]
    call_log_queue_capacity: usize,

    /// Enable verbose request/response logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("ulh_host=debug,ulh_core=debug,tower_http=debug")
    } else {
        EnvFilter::new("ulh_host=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = HostConfig::from_process_env().context("load host configuration")?;

    // No relational/object-store backend is wired up yet; the in-memory
    // store stands in until one is configured (spec §1 Non-goals: "the
    // relational store and object store themselves").
    let store = Arc::new(InMemoryStore::new());

    let call_logger: Arc<dyn CallLogger> = Arc::new(TracingCallLogger);
    let call_log_queue = WorkQueue::spawn(args.call_log_queue_capacity, move |record: CallLogRecord| {
        let logger = call_logger.clone();
        async move { logger.log(record).await }
    });

    let state = AppState::new(ulh_host::AppStateDeps {
        apps: store.clone(),
        users: store.clone(),
        tokens: store.clone(),
        permissions: store.clone(),
        ledger: store.clone(),
        object_store: store.clone(),
        secrets: store.clone(),
        profiles: store.clone(),

        code_cache: CodeCache::new(args.code_cache_capacity),
        permission_cache: PermissionCache::with_default_ttl(args.permission_cache_capacity),
        sequencer: SessionSequencer::new(),
        rate_limiter: RateLimiter::new(Arc::new(InProcessCounterStore::new())).with_limits(
            EndpointLimits {
                tools_list_per_minute: config.rate_limits.tools_list_per_minute,
                tools_call_per_minute: config.rate_limits.tools_call_per_minute,
                initialize_per_minute: config.rate_limits.initialize_per_minute,
            },
            WeeklyLimits::default(),
        ),
        sandbox: SandboxGateway::new(Arc::new(UnimplementedSandboxEngine)),
        call_log_queue,

        ai_provider: Arc::new(OpenRouterAiProvider::new(Client::new())),
        kv_backend: Arc::new(InMemoryKv::new()),
        memory_backend: Arc::new(InMemoryMemory::new()),

        config,
    });

    let app = ulh_host::build_app(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, "ulh-host listening");

    axum::serve(listener, app).await.context("serve")
}

/// Delivers call log records into the structured log stream. Stands in
/// for whatever durable audit sink a deployment plugs in until one is
/// configured, the way [`UnimplementedSandboxEngine`] stands in for a
/// real sandbox runtime.
struct TracingCallLogger;

#[async_trait]
impl CallLogger for TracingCallLogger {
    async fn log(&self, record: CallLogRecord) {
        info!(
            user_id = %record.user_id,
            app_id = %record.app_id,
            function_name = %record.function_name,
            method = %record.method,
            success = record.success,
            duration_ms = record.duration_ms,
            ai_cost_cents = record.ai_cost_cents,
            balance_charge_cents = record.balance_charge_cents,
            "call logged"
        );
    }
}
