//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use registry_proxy_sync::config::{ArtifactConfig, ReconcileConfig};
use registry_proxy_sync::proxy::{ProcessController, ProcessFailure};
use registry_proxy_sync::reconcile::{LabelPresent, Reconciler};
use registry_proxy_sync::registry::RawService;
use registry_proxy_sync::render::ArtifactRenderer;
use registry_proxy_sync::store::ArtifactStore;

/// One call into the fake proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyEvent {
    /// Validate ran; holds the artifact directory (file name → text) at that moment.
    Validate(BTreeMap<String, String>),
    Apply,
}

/// A proxy that records every call and can be told to reject configs.
pub struct FakeProxy {
    dir: PathBuf,
    reject: AtomicUsize,
    events: Mutex<Vec<ProxyEvent>>,
}

impl FakeProxy {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            reject: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `n` validations.
    pub fn reject_next(&self, n: usize) {
        self.reject.store(n, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ProxyEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Directory snapshots seen by each validate call.
    pub fn validated_views(&self) -> Vec<BTreeMap<String, String>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProxyEvent::Validate(view) => Some(view),
                ProxyEvent::Apply => None,
            })
            .collect()
    }

    pub fn applies(&self) -> usize {
        self.events().iter().filter(|e| **e == ProxyEvent::Apply).count()
    }
}

#[async_trait]
impl ProcessController for FakeProxy {
    async fn validate(&self) -> Result<(), ProcessFailure> {
        let mut view = BTreeMap::new();
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                view.insert(name, std::fs::read_to_string(entry.path()).unwrap_or_default());
            }
        }
        self.events.lock().unwrap().push(ProxyEvent::Validate(view));

        let rejected = self
            .reject
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(ProcessFailure::Spawn {
                program: "nginx".into(),
                source: std::io::Error::other("configuration rejected"),
            });
        }
        Ok(())
    }

    async fn apply(&self) -> Result<(), ProcessFailure> {
        self.events.lock().unwrap().push(ProxyEvent::Apply);
        Ok(())
    }
}

pub fn artifact_config(dir: &Path) -> ArtifactConfig {
    ArtifactConfig {
        dir: dir.to_path_buf(),
        ..ArtifactConfig::default()
    }
}

/// A reconciler over `dir` selecting on the `proxy` label, with a fake proxy.
pub fn reconciler(dir: &Path, options: ReconcileConfig) -> (Reconciler, Arc<FakeProxy>) {
    let config = artifact_config(dir);
    let proxy = Arc::new(FakeProxy::new(dir));
    let store = ArtifactStore::new(
        &config,
        ArtifactRenderer::from_config(&config).unwrap(),
        proxy.clone(),
    );
    (Reconciler::new(store, LabelPresent::new("proxy"), options), proxy)
}

/// A selected service.
pub fn proxied(name: &str, address: &str, port: u16) -> RawService {
    RawService::new(name, address, port).with_label("proxy", "1")
}

pub fn read_artifact(dir: &Path, name: &str) -> Option<String> {
    std::fs::read_to_string(dir.join(format!("{name}.conf"))).ok()
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// Each connection gets one response built by `f`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;

                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    401 => "401 Unauthorized",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// JSON body of a Kubernetes service list: (name, cluster IP, port, label).
pub fn service_list(services: &[(&str, &str, u16, Option<(&str, &str)>)]) -> String {
    let items: Vec<serde_json::Value> = services
        .iter()
        .map(|(name, ip, port, label)| {
            let mut labels = serde_json::Map::new();
            if let Some((k, v)) = label {
                labels.insert(k.to_string(), serde_json::Value::String(v.to_string()));
            }
            serde_json::json!({
                "metadata": { "name": name, "namespace": "default", "labels": labels },
                "spec": { "clusterIP": ip, "ports": [{ "port": port, "protocol": "TCP" }] }
            })
        })
        .collect();
    serde_json::json!({ "kind": "ServiceList", "items": items }).to_string()
}
