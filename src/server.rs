use anyhow::Context;
use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use http::{StatusCode, header};
use sonic_rs::json;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};
use tracing::Level;

use crate::{
    db::{connection::Connector, pool::ConnectionPool, postgres::PgConnector},
    error::{AppError, Result},
    models::envelope::Envelope,
    services::dispatcher::Dispatcher,
    state::AppState,
};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Schema applied by `init-db`.
const SCHEMA: &str = include_str!("../migrations/schema.sql");

/// Entry point shared by the HTTP and file transports.
pub struct Gateway<C: Connector = PgConnector> {
    state: AppState<C>,
    dispatcher: Arc<Dispatcher<AppState<C>>>,
}

impl<C: Connector> Clone for Gateway<C> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<C: Connector> Gateway<C> {
    pub fn new(state: AppState<C>, dispatcher: Dispatcher<AppState<C>>) -> Self {
        Self {
            state,
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn state(&self) -> &AppState<C> {
        &self.state
    }

    /// Sweeps expired sessions, then dispatches one raw request.
    ///
    /// A request still running after `request_timeout` is abandoned and
    /// answered with a 500 envelope.
    pub async fn handle(&self, raw: &str) -> Envelope {
        self.state.sessions.sweep_expired();

        let limit = self.state.config.request_timeout;
        let dispatch = self.dispatcher.dispatch_envelope(self.state.clone(), raw);
        match tokio::time::timeout(limit, dispatch).await {
            Ok(envelope) => envelope,
            Err(_) => AppError::Internal(format!("Request timed out after {:?}", limit))
                .into_envelope(),
        }
    }
}

/// Builds the HTTP router.
///
/// # Arguments
///
/// * `gateway` - The gateway requests are handed to.
///
/// # Returns
///
/// A `Router` serving `POST /api` and `GET /health`.
pub fn router<C: Connector>(gateway: Gateway<C>) -> Router {
    Router::new()
        .route("/api", post(api::<C>))
        .route("/health", get(health::<C>))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(gateway)
}

/// Renders an envelope with the HTTP status mirroring its code.
fn envelope_response(envelope: Envelope) -> Response {
    let status = StatusCode::from_u16(envelope.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        envelope.encode(),
    )
        .into_response()
}

async fn api<C: Connector>(State(gateway): State<Gateway<C>>, body: Bytes) -> Response {
    let envelope = match std::str::from_utf8(&body) {
        Ok(raw) => gateway.handle(raw).await,
        Err(_) => AppError::MalformedRequest("Request body is not valid UTF-8".to_string())
            .into_envelope(),
    };
    envelope_response(envelope)
}

async fn health<C: Connector>(State(gateway): State<Gateway<C>>) -> Response {
    let state = gateway.state();
    envelope_response(Envelope::success(
        200,
        "OK",
        json!({
            "activeSessions": state.sessions.active_count(),
            "idleConnections": state.pool.idle_count(),
            "maxConnections": state.pool.max_size()
        }),
    ))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("🛑 Shutdown signal received");
}

/// Serves HTTP until Ctrl+C, then closes idle connections and drops all
/// sessions.
pub async fn serve<C: Connector>(gateway: Gateway<C>, addr: SocketAddr) -> anyhow::Result<()> {
    let state = gateway.state().clone();
    let app = router(gateway);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let closed = state.pool.shutdown();
    let dropped = state.sessions.clear();
    tracing::info!(
        "✅ Shutdown complete: {} connections closed, {} sessions dropped",
        closed,
        dropped
    );
    Ok(())
}

/// Dispatches the request envelope in `input` and writes the response
/// envelope to `output`.
///
/// An unreadable input still produces a `500` envelope in `output`.
pub async fn process_file<C: Connector>(
    gateway: &Gateway<C>,
    input: &Path,
    output: &Path,
) -> Result<Envelope> {
    let envelope = match tokio::fs::read(input).await {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(raw) => gateway.handle(&raw).await,
            Err(_) => AppError::MalformedRequest("Request file is not valid UTF-8".to_string())
                .into_envelope(),
        },
        Err(e) => AppError::Internal(format!("Failed to read {}: {}", input.display(), e))
            .into_envelope(),
    };

    tokio::fs::write(output, envelope.encode()).await?;
    Ok(envelope)
}

/// Applies the bundled schema on one pooled connection.
pub async fn init_db<C: Connector>(pool: &ConnectionPool<C>) -> Result<()> {
    pool.batch(SCHEMA).await?;
    tracing::info!("✅ Database schema applied");
    Ok(())
}
