//! Captive provisioning portal.
//!
//! Serves a one-page form for the duration of a provisioning session. The
//! first valid submission ends the session; otherwise it closes at the
//! timeout.

use async_trait::async_trait;
use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::admin::advertised_url;
use crate::{pages, qr};
use swarm_core::{Result, SwarmError};
use swarm_runtime::{PortalOutcome, ProvisioningPortal};
use swarm_store::Credential;

#[derive(Clone)]
struct PortalState {
    ap_name: String,
    submitted: mpsc::Sender<Credential>,
}

#[derive(Debug, Deserialize)]
struct CredentialForm {
    s: String,
    #[serde(default)]
    p: String,
}

/// Router for one portal session. Valid submissions are sent on `submitted`.
pub fn portal_router(ap_name: impl Into<String>, submitted: mpsc::Sender<Credential>) -> Router {
    let state = PortalState {
        ap_name: ap_name.into(),
        submitted,
    };
    Router::new()
        .route("/", get(form_handler).post(submit_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn form_handler(State(state): State<PortalState>) -> Html<String> {
    Html(pages::portal_form(&state.ap_name))
}

async fn submit_handler(
    State(state): State<PortalState>,
    Form(form): Form<CredentialForm>,
) -> Response {
    let ssid = form.s.trim();
    if ssid.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Html(pages::error("SSID must not be empty")),
        )
            .into_response();
    }
    let credential = Credential::new(ssid, form.p);
    match state.submitted.try_send(credential) {
        Ok(()) => Html(pages::portal_saved(ssid)).into_response(),
        Err(_) => (
            StatusCode::CONFLICT,
            Html(pages::error("A network was already submitted")),
        )
            .into_response(),
    }
}

/// Provisioning portal served over HTTP on the local network.
pub struct CaptivePortal {
    listen: String,
    ap_name: String,
    print_qr: bool,
}

impl CaptivePortal {
    pub fn new(listen: impl Into<String>, ap_name: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            ap_name: ap_name.into(),
            print_qr: true,
        }
    }

    pub fn with_qr(mut self, print_qr: bool) -> Self {
        self.print_qr = print_qr;
        self
    }
}

#[async_trait]
impl ProvisioningPortal for CaptivePortal {
    async fn provision(&mut self, timeout: Duration) -> Result<PortalOutcome> {
        let listener = tokio::net::TcpListener::bind(&self.listen)
            .await
            .map_err(|e| SwarmError::Portal(format!("failed to bind {}: {e}", self.listen)))?;
        let addr = listener.local_addr()?;
        let url = advertised_url(addr);

        let (submitted_tx, mut submitted_rx) = mpsc::channel(1);
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let router = portal_router(self.ap_name.clone(), submitted_tx);
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "provisioning portal error");
            }
        });

        info!(
            ap = %self.ap_name,
            %url,
            timeout_secs = timeout.as_secs(),
            "provisioning portal open"
        );
        if self.print_qr {
            qr::print("Provision this node:", &url);
        }

        let outcome = match tokio::time::timeout(timeout, submitted_rx.recv()).await {
            Ok(Some(credential)) => {
                info!(ssid = %credential.ssid, "network submitted through portal");
                PortalOutcome::Provisioned(credential)
            }
            Ok(None) | Err(_) => PortalOutcome::TimedOut,
        };

        let _ = shutdown.send(());
        if tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .is_err()
        {
            warn!("provisioning portal did not stop in time");
        }
        info!("provisioning portal closed");
        Ok(outcome)
    }
}
