//! End-to-end lifecycle against a real HTTP endpoint and an in-memory
//! state store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use warpgrid_health::HttpProbe;
use warpgrid_state::{StateStore, WebhookWorker};
use warpgrid_webhooks::{
    Controller, ControllerConfig, ControllerDeps, SigningKeyIssuer, StoreTransport,
};

/// Status and body the fake worker answers with.
type Reply = Arc<Mutex<(u16, String)>>;

async fn spawn_worker_endpoint(reply: Reply) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let reply = reply.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                }
                let (status, body) = reply.lock().unwrap().clone();
                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    format!("http://{addr}/webhook")
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition not met within 5s");
}

fn is_active(store: &StateStore) -> Option<bool> {
    store
        .get_worker_status("acme", "hook-1")
        .unwrap()
        .map(|s| s.is_active)
}

#[tokio::test]
async fn worker_lifecycle_follows_endpoint_health() {
    let reply: Reply = Arc::new(Mutex::new((
        200,
        r#"{"actions":["send-email"],"workflows":["onboarding"]}"#.to_string(),
    )));
    let url = spawn_worker_endpoint(reply.clone()).await;

    let store = StateStore::open_in_memory().unwrap();
    store.put_tenant("acme").unwrap();
    store
        .put_webhook_worker(&WebhookWorker {
            id: "hook-1".to_string(),
            tenant_id: "acme".to_string(),
            url,
            secret: "s3cret".to_string(),
            created_at: 0,
            updated_at: 0,
        })
        .unwrap();

    let config = ControllerConfig {
        scan_interval: Duration::from_millis(50),
        probe_interval: Duration::from_millis(50),
        probe_timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let deps = ControllerDeps {
        repository: Arc::new(store.clone()),
        issuer: Arc::new(SigningKeyIssuer::new("signing-key").unwrap()),
        transport: Arc::new(StoreTransport::new(store.clone())),
        probe: Arc::new(HttpProbe::new(config.probe_timeout).unwrap()),
    };
    let controller = Controller::new(deps, config);
    let shutdown = controller.start().unwrap();

    wait_for(|| store.get_registration("acme", "hook-1").unwrap().is_some()).await;
    assert_eq!(is_active(&store), Some(true));
    let registration = store.get_registration("acme", "hook-1").unwrap().unwrap();
    assert_eq!(registration.actions, vec!["send-email"]);

    // New capability: the registration is replaced.
    reply.lock().unwrap().1 =
        r#"{"actions":["send-email","send-sms"],"workflows":["onboarding"]}"#.to_string();
    wait_for(|| {
        store
            .get_registration("acme", "hook-1")
            .unwrap()
            .is_some_and(|r| r.actions.len() == 2)
    })
    .await;

    // Endpoint goes down long enough to cross the threshold.
    reply.lock().unwrap().0 = 500;
    wait_for(|| is_active(&store) == Some(false)).await;

    reply.lock().unwrap().0 = 200;
    wait_for(|| is_active(&store) == Some(true)).await;
    assert_eq!(controller.registered_workers(), vec!["hook-1"]);

    shutdown.shutdown().await.unwrap();
    assert!(store.list_registrations().unwrap().is_empty());
    assert!(controller.registered_workers().is_empty());
}
