//! Raw hyper HTTP front edge. One listener serves `/mcp`, `/mcp/<method>`,
//! and the `/v1/admin/*` surface from spec.md §6; everything else is 404.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::admin::{self, ReloadRequest};
use crate::app::GatewayState;
use crate::headers;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind_address: SocketAddr,
    pub mcp_path: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().unwrap(),
            mcp_path: "/mcp".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct GatewayHttpServer {
    config: HttpConfig,
    state: GatewayState,
}

impl GatewayHttpServer {
    pub fn new(config: HttpConfig, state: GatewayState) -> Self {
        Self { config, state }
    }

    /// Runs until `shutdown` fires. Accepted connections in flight are given
    /// a chance to finish naturally (hyper stops accepting new connections
    /// as soon as the accept loop breaks).
    pub async fn run(&self, shutdown: CancellationToken) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        info!(addr = %self.config.bind_address, mcp_path = %self.config.mcp_path, "gateway HTTP server listening");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("HTTP accept loop stopping for shutdown");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            warn!(error = %err, "failed to accept connection");
                            continue;
                        }
                    };
                    debug!(%peer, "accepted connection");
                    let config = self.config.clone();
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| handle(req, config.clone(), state.clone()));
                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                            debug!(error = %err, "connection ended");
                        }
                    });
                }
            }
        }
    }
}

async fn handle(req: Request<hyper::body::Incoming>, config: HttpConfig, state: GatewayState) -> Result<Response<BoxBody>, hyper::Error> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let client_id = headers::client_id(req.headers());
    let request_headers = headers::request_headers(req.headers());

    debug!(%method, %path, client_id = client_id.as_deref().unwrap_or(""), "handling request");

    let mut response = if method == Method::POST && path == config.mcp_path {
        let body = read_body(req).await?;
        let message = state.router.handle(&body, request_headers).await;
        json_response(message)
    } else if method == Method::POST && path.starts_with(&format!("{}/", config.mcp_path)) {
        let synthesized_method = path[config.mcp_path.len() + 1..].to_string();
        let body = read_body(req).await?;
        let params: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        let envelope = json!({ "jsonrpc": "2.0", "id": synthesized_request_id(), "method": synthesized_method, "params": params });
        let envelope_bytes = serde_json::to_vec(&envelope).unwrap_or_default();
        let message = state.router.handle(&envelope_bytes, request_headers).await;
        json_response(message)
    } else if method == Method::POST && path == "/v1/admin/reload" {
        let body = read_body(req).await?;
        match serde_json::from_slice::<ReloadRequest>(&body) {
            Ok(request) => match admin::reload(&state, request).await {
                Ok(value) => respond(StatusCode::OK, value),
                Err(message) => respond(StatusCode::BAD_REQUEST, json!({ "error": message })),
            },
            Err(err) => respond(StatusCode::BAD_REQUEST, json!({ "error": format!("invalid reload request: {err}") })),
        }
    } else if method == Method::GET && path == "/v1/admin/health" {
        respond(StatusCode::OK, admin::health(&state))
    } else if method == Method::GET && path == "/v1/admin/metrics" {
        respond(StatusCode::OK, admin::metrics(&state))
    } else if method == Method::GET && path == "/v1/admin/reloads" {
        respond(StatusCode::OK, admin::reloads(&state))
    } else {
        not_found()
    };

    let elapsed_ms = started.elapsed().as_millis();
    response.headers_mut().insert("X-Response-Time", format!("{elapsed_ms}ms").parse().unwrap());
    if state.memory_monitor.over_threshold() {
        response
            .headers_mut()
            .insert("X-Rate-Limit-Remaining", state.pool.available_capacity().to_string().parse().unwrap());
    }
    Ok(response)
}

fn synthesized_request_id() -> serde_json::Value {
    json!(uuid::Uuid::new_v4().to_string())
}

async fn read_body(req: Request<hyper::body::Incoming>) -> Result<Bytes, hyper::Error> {
    Ok(req.into_body().collect().await?.to_bytes())
}

fn json_response(message: Option<gateway_jsonrpc::response::JsonRpcMessage>) -> Response<BoxBody> {
    match message {
        Some(message) => respond(StatusCode::OK, serde_json::to_value(&message).unwrap_or(serde_json::Value::Null)),
        // Notifications produce no response body per JSON-RPC 2.0.
        None => Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(full_body(Bytes::new()))
            .unwrap(),
    }
}

fn respond(status: StatusCode, body: serde_json::Value) -> Response<BoxBody> {
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(full_body(Bytes::from(bytes)))
        .unwrap_or_else(|err| {
            error!(error = %err, "failed to build response");
            Response::new(full_body(Bytes::new()))
        })
}

fn not_found() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(full_body(Bytes::from_static(b"not found")))
        .unwrap()
}

fn full_body(bytes: Bytes) -> BoxBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_loopback_8080() {
        let config = HttpConfig::default();
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.mcp_path, "/mcp");
    }
}
