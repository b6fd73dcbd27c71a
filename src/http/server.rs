//! HTTP front end and forwarding.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware (trace, timeout,
//!   request id)
//! - Match requests to a backend via the routing table
//! - Run the dispatch pipeline and forward to the chosen destination
//! - Apply the pipeline's response mutations (affinity establishment)
//! - Surface decision failures distinctly from upstream errors

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::uri::{Authority, Scheme},
    http::{header, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::dispatch::{Director, Dispatch};
use crate::error::DispatchError;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::observability::metrics;
use crate::routing::Router as RouteTable;

/// Marker header distinguishing decision failures from upstream errors.
pub const X_DIRECTOR_ERROR: &str = "x-director-error";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub director: Arc<Director>,
    pub routes: Arc<RouteTable>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    director: Arc<Director>,
}

impl HttpServer {
    /// Create a new HTTP server over an already-configured director.
    pub fn new(config: &ProxyConfig, director: Arc<Director>) -> Self {
        let routes = Arc::new(RouteTable::from_config(config.routes.clone()));
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            director: director.clone(),
            routes,
            client,
        };

        let router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(TraceLayer::new_for_http());

        Self { router, director }
    }

    /// Run the server until shutdown, then stop background work.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.director.shutdown().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler: route, dispatch, forward.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let Some(route) = state.routes.match_request(&request) else {
        tracing::debug!(request_id = %request_id, path = %request.uri().path(), "No route matched");
        metrics::record_request(&method, 404, "none", start);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };
    let backend_id = route.backend.clone();

    let dispatch = match state.director.dispatch(&backend_id, request.headers()).await {
        Ok(dispatch) => dispatch,
        Err(e) => {
            let response = decision_error_response(&e);
            metrics::record_request(&method, response.status().as_u16(), &backend_id, start);
            return response;
        }
    };

    let upstream_request = match rewrite_for_upstream(request, &dispatch) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to rewrite request");
            metrics::record_request(&method, 502, &backend_id, start);
            return (StatusCode::BAD_GATEWAY, "Failed to rewrite request").into_response();
        }
    };

    match state.client.request(upstream_request).await {
        Ok(response) => {
            let status = response.status();
            let (mut parts, body) = response.into_parts();

            for (name, value) in &dispatch.mutations().headers {
                parts.headers.insert(name.clone(), value.clone());
            }
            for cookie in &dispatch.mutations().set_cookies {
                if let Ok(value) = header::HeaderValue::from_str(cookie) {
                    parts.headers.append(header::SET_COOKIE, value);
                }
            }

            metrics::record_request(&method, status.as_u16(), &backend_id, start);
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                backend = %backend_id,
                destination = %dispatch.destination().id,
                error = %e,
                "Upstream request failed"
            );
            metrics::record_request(&method, 502, &backend_id, start);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Map a decision failure onto a marked, operator-distinguishable response.
fn decision_error_response(error: &DispatchError) -> Response {
    match error {
        DispatchError::BackendNotFound(_) => (
            StatusCode::NOT_FOUND,
            [(X_DIRECTOR_ERROR, "backend-not-found")],
            "Backend not found",
        )
            .into_response(),
        DispatchError::NoAvailableDestination(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(X_DIRECTOR_ERROR, "no-available-destination")],
            "No available destination",
        )
            .into_response(),
        DispatchError::AffinityRejected(_) => (
            StatusCode::BAD_GATEWAY,
            [(X_DIRECTOR_ERROR, "affinity-rejected")],
            "Session affinity could not be honored",
        )
            .into_response(),
    }
}

/// Point the request at the chosen destination, keeping path and headers.
fn rewrite_for_upstream(
    request: Request<Body>,
    dispatch: &Dispatch,
) -> Result<Request<Body>, axum::http::Error> {
    let address = &dispatch.destination().address;
    // Validated addresses always carry a host; an empty one fails the
    // Authority parse below.
    let host = address.host_str().unwrap_or_default();
    let authority = match address.port_or_known_default() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let (mut parts, body) = request.into_parts();
    let mut uri_parts = parts.uri.into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(Authority::from_str(&authority)?);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some("/".parse()?);
    }
    parts.uri = Uri::from_parts(uri_parts)?;

    Ok(Request::from_parts(parts, body))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
