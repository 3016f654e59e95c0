//! Gateway server: routes the control surface onto a `FunctionRuntime`

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fnexec_core::{
    Error, FunctionId, GatewayConfig, Health, InvokeRequest, InvokeResponse, RuntimeConfig,
    RuntimeId,
};
use fnexec_runtime::FunctionRuntime;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone, Debug, Default)]
pub struct ExtendedConfig {
    pub gateway: GatewayConfig,
    pub runtime: RuntimeConfig,
}

/// Runtime errors as HTTP responses: `{"detail": "..."}` with 404 for
/// unknown functions or executions and 500 for everything else.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            error!("Request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(serde_json::json!({ "detail": self.0.to_string() }))).into_response()
    }
}

/// Build the router. Routes live under `/<route_prefix>` from the runtime
/// config; `/` always answers the health probe.
pub fn build_router(runtime: Arc<FunctionRuntime>) -> Router {
    let prefix = runtime.config().executor.route_prefix.trim_matches('/').to_string();
    let base = if prefix.is_empty() {
        String::new()
    } else {
        format!("/{}", prefix)
    };

    let mut app = Router::new().route("/", get(health_handler));
    if !base.is_empty() {
        app = app.route(&base, get(health_handler));
    }
    app.route(&format!("{}/functions", base), get(functions_handler))
        .route(&format!("{}/running_functions", base), get(running_handler))
        .route(&format!("{}/reload", base), get(reload_handler))
        .route(&format!("{}/function/:function_id", base), post(invoke_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(runtime)
}

/// Prepare the runtime, run the first sync and serve until shutdown.
/// A failed first sync aborts start-up before anything is bound.
pub async fn start_gateway(config: ExtendedConfig) -> anyhow::Result<()> {
    let runtime = Arc::new(FunctionRuntime::new(config.runtime));
    let functions = runtime
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("initial function sync failed: {}", e))?;

    let bind_addr: SocketAddr =
        format!("{}:{}", config.gateway.bind.to_addr(), config.gateway.port).parse()?;
    let runtime_config = runtime.config().clone();
    let app = build_router(runtime);

    info!("fnexec Gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Routes:       /{}", runtime_config.executor.route_prefix.trim_matches('/'));
    info!("  Storage:      {:?}", runtime_config.storage_driver);
    info!("  Functions:    {}", runtime_config.functions_location);
    info!("  Logs:         {}", runtime_config.logs_location);
    info!("  Run dir:      {}", runtime_config.run_directory.display());
    info!("  Serving:      {:?}", functions.iter().map(|f| f.as_str()).collect::<Vec<_>>());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(State(runtime): State<Arc<FunctionRuntime>>) -> Json<Health> {
    Json(runtime.health())
}

async fn functions_handler(
    State(runtime): State<Arc<FunctionRuntime>>,
) -> Result<Json<Vec<FunctionId>>, ApiError> {
    Ok(Json(runtime.list_functions()?))
}

async fn running_handler(State(runtime): State<Arc<FunctionRuntime>>) -> Json<Vec<RuntimeId>> {
    Json(runtime.list_running_executions())
}

async fn reload_handler(
    State(runtime): State<Arc<FunctionRuntime>>,
) -> Result<Json<Vec<FunctionId>>, ApiError> {
    info!("Reload requested");
    Ok(Json(runtime.reload().await?))
}

async fn invoke_handler(
    AxumPath(function_id): AxumPath<String>,
    State(runtime): State<Arc<FunctionRuntime>>,
    Json(request): Json<InvokeRequest>,
) -> Result<Json<InvokeResponse>, ApiError> {
    let response = runtime.invoke(FunctionId::new(function_id), request)?;
    info!("({}): Accepted invocation of {}", response.runtime_id, response.function_id);
    Ok(Json(response))
}
