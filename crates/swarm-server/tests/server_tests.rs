//! HTTP-level tests for the admin surface and the provisioning portal.
//!
//! The admin router runs against a real `NodeRuntime` built from mocks, so
//! every request goes through the admin queue and the poll loop.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tower::ServiceExt;

use swarm_config::{BootstrapStage, SwarmConfig};
use swarm_core::NodeRole;
use swarm_mesh::memory::MemoryHub;
use swarm_mesh::{MeshTransport, Signal, SyncMessage};
use swarm_runtime::mock::{MockAdminSurface, MockDevice, MockPortal, MockStation};
use swarm_runtime::{
    AdminHandle, Collaborators, NodeRuntime, PortalOutcome, ProvisioningPortal, RunExit,
    StatusReport,
};
use swarm_server::{CaptivePortal, build_router, portal_router};
use swarm_store::{ConfigDocument, ConfigStore, Credential, MemoryFileStore};

const DOC_PATH: &str = "/data/networks.json";

struct Node {
    hub: MemoryHub,
    files: MemoryFileStore,
    device: MockDevice,
    handle: AdminHandle,
    stop: oneshot::Sender<()>,
    task: JoinHandle<swarm_core::Result<RunExit>>,
}

impl Node {
    fn start(networks: &[(&str, &str)]) -> Self {
        let hub = MemoryHub::new();
        let files = MemoryFileStore::new();
        if !networks.is_empty() {
            let doc = ConfigDocument {
                version: 1,
                networks: networks
                    .iter()
                    .map(|(s, p)| Credential::new(*s, *p))
                    .collect(),
            };
            files.put(DOC_PATH, serde_json::to_vec(&doc).unwrap());
        }
        let station = MockStation::new()
            .with_network("home", "pw", 70)
            .with_network("cafe", "latte", 40);
        let device = MockDevice::new();

        let mut config = SwarmConfig::default();
        config.node.role = NodeRole::AlwaysOn;
        config.runtime.tick_ms = 100;
        config.bootstrap.stages = vec![BootstrapStage::KnownNetworks];

        let store = ConfigStore::open(Arc::new(files.clone()), DOC_PATH);
        let runtime = NodeRuntime::from_config(
            &config,
            store,
            Collaborators {
                mesh: Box::new(hub.transport("node")),
                station: Box::new(station),
                portal: Box::new(MockPortal::timing_out()),
                device: Box::new(device.clone()),
                admin: Box::new(MockAdminSurface::new()),
            },
        );
        let handle = runtime.admin_handle();
        let (stop, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(runtime.run(async move {
            let _ = stop_rx.await;
        }));
        Self {
            hub,
            files,
            device,
            handle,
            stop,
            task,
        }
    }

    fn router(&self) -> axum::Router {
        build_router(self.handle.clone())
    }

    fn stored(&self) -> ConfigDocument {
        serde_json::from_slice(&self.files.get(Path::new(DOC_PATH)).unwrap()).unwrap()
    }

    async fn shutdown(self) -> RunExit {
        let _ = self.stop.send(());
        self.task.await.unwrap().unwrap()
    }
}

async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_form(app: axum::Router, uri: &str, form: &str) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

// ── Admin surface ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_root_renders_status_page() {
    let node = Node::start(&[("home", "pw")]);
    let response = get(node.router(), "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Swarm Admin"));
    assert!(html.contains("v1"));
    assert!(html.contains("online via <b>home</b>"));
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_api_returns_report() {
    let node = Node::start(&[("home", "pw"), ("cafe", "latte")]);
    let response = get(node.router(), "/api/v1/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: StatusReport = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(report.node_id, "node");
    assert_eq!(report.version, 1);
    assert_eq!(report.networks, vec!["home", "cafe"]);
    assert!(report.online);
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_status_api_never_exposes_passphrases() {
    let node = Node::start(&[("home", "secret-pass")]);
    let body = body_text(get(node.router(), "/api/v1/status").await).await;
    assert!(!body.contains("secret-pass"));
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_add_stores_pushes_and_redirects() {
    let node = Node::start(&[]);
    let mut peer = node.hub.transport("p1");
    peer.start().unwrap();

    let response = post_form(node.router(), "/add", "s=cafe&p=latte").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let stored = node.stored();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.networks, vec![Credential::new("cafe", "latte")]);

    let pushed: Vec<_> = peer
        .drain()
        .into_iter()
        .map(|m| SyncMessage::decode(&m.payload).unwrap())
        .collect();
    assert_eq!(pushed, vec![SyncMessage::SyncResponse(stored)]);
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_add_existing_ssid_overwrites_passphrase() {
    let node = Node::start(&[("home", "old")]);
    let response = post_form(node.router(), "/add", "s=home&p=new").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let stored = node.stored();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.networks, vec![Credential::new("home", "new")]);
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_add_with_empty_ssid_is_rejected() {
    let node = Node::start(&[("home", "pw")]);
    let response = post_form(node.router(), "/add", "s=&p=x").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(node.stored().version, 1);
    assert!(node.hub.sent_by("node").is_empty());
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_delete_removes_and_redirects_to_list() {
    let node = Node::start(&[("home", "pw"), ("cafe", "latte")]);
    let response = get(node.router(), "/delete?id=0").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/view");

    let stored = node.stored();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.networks, vec![Credential::new("cafe", "latte")]);
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_delete_out_of_range_changes_nothing() {
    let node = Node::start(&[("home", "pw")]);
    let response = get(node.router(), "/delete?id=7").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/view");
    assert_eq!(node.stored().version, 1);
    assert!(node.hub.sent_by("node").is_empty());
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_delete_with_malformed_id_is_bad_request() {
    let node = Node::start(&[("home", "pw")]);
    let response = get(node.router(), "/delete?id=abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_view_lists_networks_with_delete_links() {
    let node = Node::start(&[("home", "pw"), ("cafe", "latte")]);
    let html = body_text(get(node.router(), "/view").await).await;
    assert!(html.contains("home <a href='/delete?id=0'>"));
    assert!(html.contains("cafe <a href='/delete?id=1'>"));
    assert!(!html.contains("latte"));
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_scan_lists_visible_networks() {
    let node = Node::start(&[]);
    let response = get(node.router(), "/scan").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("home"));
    assert!(html.contains("cafe"));
    assert!(html.contains("action='/add'"));
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_blink_signals_swarm_and_blinks_locally() {
    let node = Node::start(&[]);
    let mut peer = node.hub.transport("p1");
    peer.start().unwrap();

    let response = get(node.router(), "/blink").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(node.device.blinks(), 1);

    let received: Vec<_> = peer
        .drain()
        .into_iter()
        .map(|m| SyncMessage::decode(&m.payload).unwrap())
        .collect();
    assert_eq!(received, vec![SyncMessage::Signal(Signal::FindMe)]);
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reboot_restarts_runtime() {
    let node = Node::start(&[]);
    let response = get(node.router(), "/reboot").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Rebooting"));
    assert_eq!(node.task.await.unwrap().unwrap(), RunExit::Restart);
}

#[tokio::test(start_paused = true)]
async fn test_requests_after_runtime_exit_are_unavailable() {
    let node = Node::start(&[]);
    let app = node.router();
    assert_eq!(node.shutdown().await, RunExit::Shutdown);

    let response = get(app, "/").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(start_paused = true)]
async fn test_stored_ssid_is_escaped_in_pages() {
    let node = Node::start(&[("<script>x</script>", "pw")]);
    let html = body_text(get(node.router(), "/view").await).await;
    assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
    assert!(!html.contains("<script>"));
    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_route_is_not_found() {
    let node = Node::start(&[]);
    let response = get(node.router(), "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    node.shutdown().await;
}

// ── Provisioning portal ────────────────────────────────────────

#[tokio::test]
async fn test_portal_serves_form() {
    let (tx, _rx) = mpsc::channel(1);
    let response = get(portal_router("ESP32_SWARM_AP", tx), "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("ESP32_SWARM_AP"));
    assert!(html.contains("name='s'"));
    assert!(html.contains("name='p'"));
}

#[tokio::test]
async fn test_portal_submission_is_forwarded() {
    let (tx, mut rx) = mpsc::channel(1);
    let response = post_form(portal_router("ap", tx), "/", "s=home&p=pw").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("home"));
    assert_eq!(rx.recv().await, Some(Credential::new("home", "pw")));
}

#[tokio::test]
async fn test_portal_rejects_empty_ssid() {
    let (tx, mut rx) = mpsc::channel(1);
    let response = post_form(portal_router("ap", tx), "/", "s=%20&p=pw").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_portal_keeps_first_submission() {
    let (tx, mut rx) = mpsc::channel(1);
    let app = portal_router("ap", tx);
    let first = post_form(app.clone(), "/", "s=home&p=pw").await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = post_form(app, "/", "s=other&p=x").await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(rx.recv().await, Some(Credential::new("home", "pw")));
}

#[tokio::test]
async fn test_portal_times_out_without_submission() {
    let mut portal = CaptivePortal::new("127.0.0.1:0", "ap").with_qr(false);
    let outcome = portal
        .provision(Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(outcome, PortalOutcome::TimedOut);
}

#[tokio::test]
async fn test_portal_bind_failure_is_reported() {
    let mut portal = CaptivePortal::new("not-an-address", "ap").with_qr(false);
    let result = portal.provision(Duration::from_millis(100)).await;
    assert!(matches!(result, Err(swarm_core::SwarmError::Portal(_))));
}
