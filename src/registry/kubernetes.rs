//! Kubernetes-compatible service list client.
//!
//! # Responsibilities
//! - Connect to the API server (optional bearer token)
//! - List services across all namespaces or one namespace
//! - Convert each service into a `RawService`
//!
//! # Design Decisions
//! - Headless services and services without ports are skipped, not errors
//! - Only the first declared port is proxied
//! - Every request has a deadline (`registry.request_timeout_secs`)

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::config::RegistryConfig;
use crate::registry::source::RegistrySource;
use crate::registry::types::{Labels, Protocol, RawService, RegistryError, RegistryResult};

/// `GET /api/v1/services` response body (the fields we read).
#[derive(Debug, Deserialize)]
pub struct ServiceList {
    #[serde(default)]
    pub items: Vec<Service>,
}

#[derive(Debug, Deserialize)]
pub struct Service {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServiceSpec,
}

#[derive(Debug, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: Option<Labels>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(default, rename = "clusterIP")]
    pub cluster_ip: Option<String>,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Deserialize)]
pub struct ServicePort {
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

impl Service {
    /// Convert into a snapshot element; `None` when there is nothing to proxy to.
    pub fn into_raw(self) -> Option<RawService> {
        let address = match self.spec.cluster_ip {
            Some(ip) if !ip.is_empty() && ip != "None" => ip,
            _ => {
                tracing::debug!(service = %self.metadata.name, "Skipping headless service");
                return None;
            }
        };
        let Some(port) = self.spec.ports.into_iter().next() else {
            tracing::debug!(service = %self.metadata.name, "Skipping service without ports");
            return None;
        };

        Some(RawService {
            name: self.metadata.name,
            labels: self.metadata.labels.unwrap_or_default(),
            address,
            port: port.port,
            protocol: port.protocol,
        })
    }
}

/// Polls a Kubernetes-compatible API server for services.
pub struct KubernetesSource {
    client: reqwest::Client,
    endpoint: Url,
}

impl KubernetesSource {
    /// Build the client. Any failure here is a `ClientInit` error.
    pub fn new(config: &RegistryConfig) -> RegistryResult<Self> {
        let mut base: Url = config
            .url
            .parse()
            .map_err(|e| RegistryError::ClientInit(format!("invalid URL {:?}: {}", config.url, e)))?;

        // Relative joins replace the last segment unless the base ends in '/'.
        if !base.path().ends_with('/') {
            let prefixed = format!("{}/", base.path());
            base.set_path(&prefixed);
        }

        let path = match config.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            Some(ns) => format!("api/v1/namespaces/{ns}/services"),
            None => "api/v1/services".to_string(),
        };
        let endpoint = base
            .join(&path)
            .map_err(|e| RegistryError::ClientInit(format!("invalid endpoint: {e}")))?;

        let inline = config.token.as_deref().filter(|t| !t.is_empty());
        let token_file = config
            .token_file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty());
        let token = match (inline, token_file) {
            (Some(token), _) => Some(token.to_string()),
            (None, Some(path)) => Some(
                std::fs::read_to_string(path)
                    .map_err(|e| {
                        RegistryError::ClientInit(format!("cannot read token file {path:?}: {e}"))
                    })?
                    .trim()
                    .to_string(),
            ),
            (None, None) => None,
        };

        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RegistryError::ClientInit(format!("invalid token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RegistryError::ClientInit(e.to_string()))?;

        tracing::info!(endpoint = %endpoint, "Kubernetes registry client initialized");
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Decode a service list body into snapshot elements.
pub fn decode_service_list(body: &[u8]) -> RegistryResult<Vec<RawService>> {
    let list: ServiceList =
        serde_json::from_slice(body).map_err(|e| RegistryError::Decode(e.to_string()))?;
    Ok(list.items.into_iter().filter_map(Service::into_raw).collect())
}

#[async_trait]
impl RegistrySource for KubernetesSource {
    fn describe(&self) -> String {
        format!("kubernetes {}", self.endpoint)
    }

    async fn fetch(&self) -> RegistryResult<Vec<RawService>> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| RegistryError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Fetch(format!("API server returned {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RegistryError::Fetch(e.to_string()))?;
        decode_service_list(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE_LIST: &str = r#"{
        "kind": "ServiceList",
        "items": [
            {
                "metadata": {"name": "web", "namespace": "default", "labels": {"proxy": "1", "hostname": "www.example.com"}},
                "spec": {"clusterIP": "10.0.0.1", "ports": [{"port": 8080, "protocol": "TCP"}, {"port": 8443}]}
            },
            {
                "metadata": {"name": "db", "namespace": "default"},
                "spec": {"clusterIP": "None", "ports": [{"port": 5432}]}
            },
            {
                "metadata": {"name": "empty"},
                "spec": {"clusterIP": "10.0.0.9", "ports": []}
            },
            {
                "metadata": {"name": "dns", "labels": {}},
                "spec": {"clusterIP": "10.0.0.10", "ports": [{"port": 53, "protocol": "UDP"}]}
            }
        ]
    }"#;

    #[test]
    fn test_decode_service_list() {
        let services = decode_service_list(SERVICE_LIST.as_bytes()).unwrap();
        assert_eq!(services.len(), 2);

        let web = &services[0];
        assert_eq!(web.name, "web");
        assert_eq!(web.address, "10.0.0.1");
        assert_eq!(web.port, 8080);
        assert_eq!(web.labels.get("hostname").map(String::as_str), Some("www.example.com"));

        let dns = &services[1];
        assert_eq!(dns.protocol, Protocol::Udp);
        assert!(dns.labels.is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_service_list(b"<html>"),
            Err(RegistryError::Decode(_))
        ));
    }

    #[test]
    fn test_endpoint_per_namespace() {
        let mut config = RegistryConfig::default();
        let all = KubernetesSource::new(&config).unwrap();
        assert_eq!(all.endpoint().as_str(), "http://127.0.0.1:8080/api/v1/services");

        config.namespace = Some("apps".into());
        let scoped = KubernetesSource::new(&config).unwrap();
        assert_eq!(
            scoped.endpoint().as_str(),
            "http://127.0.0.1:8080/api/v1/namespaces/apps/services"
        );

        config.url = "https://rancher.example/k8s/clusters/c1".into();
        let prefixed = KubernetesSource::new(&config).unwrap();
        assert_eq!(
            prefixed.endpoint().as_str(),
            "https://rancher.example/k8s/clusters/c1/api/v1/namespaces/apps/services"
        );

        config.url = "https://rancher.example/k8s/clusters/c1/".into();
        config.namespace = None;
        let trailing = KubernetesSource::new(&config).unwrap();
        assert_eq!(
            trailing.endpoint().as_str(),
            "https://rancher.example/k8s/clusters/c1/api/v1/services"
        );
    }

    #[test]
    fn test_empty_token_settings_mean_no_token() {
        let config = RegistryConfig {
            namespace: Some(String::new()),
            token: Some(String::new()),
            token_file: Some(std::path::PathBuf::new()),
            ..RegistryConfig::default()
        };
        let source = KubernetesSource::new(&config).unwrap();
        assert_eq!(source.endpoint().as_str(), "http://127.0.0.1:8080/api/v1/services");
    }

    #[test]
    fn test_client_init_errors() {
        let mut config = RegistryConfig::default();
        config.url = "::not-a-url".into();
        assert!(matches!(
            KubernetesSource::new(&config),
            Err(RegistryError::ClientInit(_))
        ));

        let mut config = RegistryConfig::default();
        config.token_file = Some("/nonexistent/token".into());
        assert!(matches!(
            KubernetesSource::new(&config),
            Err(RegistryError::ClientInit(_))
        ));
    }
}
