//! Admin HTTP surface.
//!
//! Every handler turns the request into an admin command and waits for the
//! poll loop's answer; nothing here reads or writes the document directly.

use async_trait::async_trait;
use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{pages, qr};
use swarm_core::{Result, SwarmError};
use swarm_runtime::{AdminHandle, AdminSurface};

/// Build the admin router on top of `handle`.
pub fn build_router(handle: AdminHandle) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/scan", get(scan_handler))
        .route("/view", get(view_handler))
        .route("/add", axum::routing::post(add_handler))
        .route("/delete", get(delete_handler))
        .route("/blink", get(blink_handler))
        .route("/reboot", get(reboot_handler))
        .route("/api/v1/status", get(status_api_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(handle)
}

fn failure(err: SwarmError) -> Response {
    let status = match err {
        SwarmError::InvalidCredential(_) | SwarmError::IndexOutOfBounds { .. } => {
            StatusCode::BAD_REQUEST
        }
        SwarmError::Server(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(error = %err, status = status.as_u16(), "admin request failed");
    (status, Html(pages::error(&err.to_string()))).into_response()
}

async fn root_handler(State(handle): State<AdminHandle>) -> Response {
    match handle.status().await {
        Ok(report) => Html(pages::status(&report)).into_response(),
        Err(e) => failure(e),
    }
}

async fn scan_handler(State(handle): State<AdminHandle>) -> Response {
    match handle.scan().await {
        Ok(entries) => Html(pages::scan(&entries)).into_response(),
        Err(e) => failure(e),
    }
}

async fn view_handler(State(handle): State<AdminHandle>) -> Response {
    match handle.status().await {
        Ok(report) => Html(pages::networks(&report)).into_response(),
        Err(e) => failure(e),
    }
}

#[derive(Debug, Deserialize)]
struct AddForm {
    s: String,
    #[serde(default)]
    p: String,
}

async fn add_handler(State(handle): State<AdminHandle>, Form(form): Form<AddForm>) -> Response {
    match handle.add_network(&form.s, &form.p).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => failure(e),
    }
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    id: usize,
}

async fn delete_handler(
    State(handle): State<AdminHandle>,
    Query(query): Query<DeleteQuery>,
) -> Response {
    match handle.remove_network(query.id).await {
        Ok(_) => Redirect::to("/view").into_response(),
        // Out-of-range deletes are a no-op; land on the list again
        Err(SwarmError::IndexOutOfBounds { index, len }) => {
            info!(index, len, "ignoring delete of unknown network");
            Redirect::to("/view").into_response()
        }
        Err(e) => failure(e),
    }
}

async fn blink_handler(State(handle): State<AdminHandle>) -> Response {
    match handle.blink().await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => failure(e),
    }
}

async fn reboot_handler(State(handle): State<AdminHandle>) -> Response {
    match handle.reboot().await {
        Ok(()) => Html(pages::rebooting()).into_response(),
        Err(e) => failure(e),
    }
}

async fn status_api_handler(State(handle): State<AdminHandle>) -> Response {
    match handle.status().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => failure(e),
    }
}

// ─── Server lifecycle ───────────────────────────────────────────

struct Serving {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// The admin web server, opened and closed by the runtime.
pub struct AdminServer {
    listen: String,
    print_qr: bool,
    serving: Option<Serving>,
}

impl AdminServer {
    pub fn new(listen: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            print_qr: true,
            serving: None,
        }
    }

    pub fn with_qr(mut self, print_qr: bool) -> Self {
        self.print_qr = print_qr;
        self
    }
}

#[async_trait]
impl AdminSurface for AdminServer {
    async fn open(&mut self, handle: AdminHandle) -> Result<String> {
        if self.serving.is_some() {
            self.close().await;
        }
        let listener = tokio::net::TcpListener::bind(&self.listen)
            .await
            .map_err(|e| SwarmError::Server(format!("failed to bind {}: {e}", self.listen)))?;
        let addr = listener.local_addr()?;
        let url = advertised_url(addr);

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let router = build_router(handle);
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "admin server error");
            }
        });
        self.serving = Some(Serving { shutdown, task });

        info!(listen = %addr, %url, "admin server listening");
        if self.print_qr {
            qr::print("Swarm admin:", &url);
        }
        Ok(url)
    }

    async fn close(&mut self) {
        let Some(serving) = self.serving.take() else {
            return;
        };
        let _ = serving.shutdown.send(());
        if tokio::time::timeout(Duration::from_secs(5), serving.task)
            .await
            .is_err()
        {
            warn!("admin server did not stop in time");
        }
        info!("admin server closed");
    }
}

/// URL peers on the LAN can use to reach `addr`.
pub(crate) fn advertised_url(addr: SocketAddr) -> String {
    let ip = if addr.ip().is_unspecified() {
        outbound_ip().unwrap_or_else(|| std::net::Ipv4Addr::LOCALHOST.into())
    } else {
        addr.ip()
    };
    format!("http://{}/", SocketAddr::new(ip, addr.port()))
}

/// Address of the interface that routes outward. No packet is sent.
fn outbound_ip() -> Option<std::net::IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:80").ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertised_url_keeps_explicit_ip() {
        let addr: SocketAddr = "127.0.0.1:8000".parse().unwrap();
        assert_eq!(advertised_url(addr), "http://127.0.0.1:8000/");
    }

    #[test]
    fn test_advertised_url_resolves_unspecified() {
        let addr: SocketAddr = "0.0.0.0:8000".parse().unwrap();
        let url = advertised_url(addr);
        assert!(url.starts_with("http://"));
        assert!(!url.contains("0.0.0.0"));
        assert!(url.ends_with(":8000/"));
    }
}
