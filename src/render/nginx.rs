//! Service record → nginx server block.
//!
//! # Responsibilities
//! - Derive the template context from a record and its labels
//! - Reject label values that would break out of the generated config
//! - Fill the compiled template
//!
//! # Design Decisions
//! - Host defaults to `<name>.<domain>` unless the host label overrides it
//! - TLS is enabled only when both certificate and key labels are present
//! - No I/O: the renderer is a pure function of the record

use std::path::PathBuf;
use thiserror::Error;

use crate::config::{ArtifactConfig, RenderLabels};
use crate::registry::ServiceRecord;
use crate::render::template::{ArtifactContext, Template, TemplateError};

/// Built-in template: one nginx `server` block per service.
pub const DEFAULT_TEMPLATE: &str = r#"# Managed by registry-proxy-sync. Service: {{ name }}
server {
    server_name {{ host }}{{#if has_alias}} {{ alias }}{{/if}};
{{#if tls_enabled}}
    listen 443 ssl;
    ssl_certificate           {{ cert_path }};
    ssl_certificate_key       {{ key_path }};
    ssl_session_cache         shared:SSL:10m;
    ssl_protocols             TLSv1.2 TLSv1.3;
    ssl_ciphers               HIGH:!aNULL:!eNULL:!EXPORT:!CAMELLIA:!DES:!MD5:!PSK:!RC4;
    ssl_prefer_server_ciphers on;
{{else}}
    listen 80;
{{/if}}
    location / {
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header Host $http_host;
        proxy_set_header X-NginX-Proxy true;
{{#if tls_enabled}}
        proxy_redirect http:// https://;
{{else}}
        proxy_redirect off;
{{/if}}{{#if websocket_enabled}}
        proxy_http_version 1.1;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
{{/if}}
        proxy_pass http://{{ target_address }}:{{ target_port }};
    }
}
"#;

/// Record data that cannot be turned into a safe artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("service {name} has no endpoint address")]
    EmptyAddress { name: String },

    #[error("service {name} has port 0")]
    ZeroPort { name: String },

    #[error("service {name}: {field} value {value:?} contains characters not allowed in proxy config")]
    UnsafeValue {
        name: String,
        field: &'static str,
        value: String,
    },
}

/// Renders routing artifacts from service records.
#[derive(Debug, Clone)]
pub struct ArtifactRenderer {
    template: Template,
    domain: String,
    tls_dir: PathBuf,
    labels: RenderLabels,
}

impl ArtifactRenderer {
    pub fn new(template: Template, config: &ArtifactConfig) -> Self {
        Self {
            template,
            domain: config.domain.clone(),
            tls_dir: config.tls_dir.clone(),
            labels: config.labels.clone(),
        }
    }

    /// Compile the configured template (or the built-in one).
    pub fn from_config(config: &ArtifactConfig) -> Result<Self, TemplateError> {
        let custom = config
            .template_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty());
        let template = match custom {
            Some(path) => {
                let source = std::fs::read_to_string(path)?;
                tracing::info!(path = ?path, "Using custom artifact template");
                Template::compile(&source)?
            }
            None => Template::compile(DEFAULT_TEMPLATE)?,
        };
        Ok(Self::new(template, config))
    }

    /// Build the template context for a record.
    pub fn context(&self, record: &ServiceRecord) -> Result<ArtifactContext, RenderError> {
        let name = &record.name;
        if record.endpoint_address.trim().is_empty() {
            return Err(RenderError::EmptyAddress { name: name.clone() });
        }
        if record.endpoint_port == 0 {
            return Err(RenderError::ZeroPort { name: name.clone() });
        }

        let label = |key: &str| {
            record
                .labels
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let host = match label(&self.labels.host) {
            Some(host) => host.to_string(),
            None => format!("{}.{}", name, self.domain),
        };
        let alias = label(&self.labels.alias).unwrap_or_default().to_string();
        let websocket_enabled = label(&self.labels.websocket) == Some("true");

        let (tls_enabled, cert_path, key_path) =
            match (label(&self.labels.tls_cert), label(&self.labels.tls_key)) {
                (Some(cert), Some(key)) => (
                    true,
                    self.tls_dir.join(cert).display().to_string(),
                    self.tls_dir.join(key).display().to_string(),
                ),
                _ => (false, String::new(), String::new()),
            };

        let ctx = ArtifactContext {
            name: name.clone(),
            host,
            alias,
            target_address: record.endpoint_address.clone(),
            target_port: record.endpoint_port,
            tls_enabled,
            cert_path,
            key_path,
            websocket_enabled,
        };

        for (field, value) in [
            ("name", &ctx.name),
            ("host", &ctx.host),
            ("alias", &ctx.alias),
            ("target_address", &ctx.target_address),
            ("cert_path", &ctx.cert_path),
            ("key_path", &ctx.key_path),
        ] {
            if !is_config_safe(value) {
                return Err(RenderError::UnsafeValue {
                    name: name.clone(),
                    field,
                    value: value.clone(),
                });
            }
        }

        Ok(ctx)
    }

    /// Render the artifact text for a record.
    pub fn render(&self, record: &ServiceRecord) -> Result<String, RenderError> {
        let ctx = self.context(record)?;
        Ok(self.template.render(&ctx))
    }
}

fn is_config_safe(value: &str) -> bool {
    !value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '"' | '\'' | '#' | '\\'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RawService;

    fn renderer() -> ArtifactRenderer {
        ArtifactRenderer::from_config(&ArtifactConfig::default()).unwrap()
    }

    fn record(raw: RawService) -> ServiceRecord {
        ServiceRecord::from_raw(&raw)
    }

    #[test]
    fn test_default_host_and_target() {
        let text = renderer()
            .render(&record(RawService::new("web", "10.0.0.1", 8080)))
            .unwrap();

        assert!(text.contains("server_name web.proxy.local;"));
        assert!(text.contains("listen 80;"));
        assert!(text.contains("proxy_redirect off;"));
        assert!(text.contains("proxy_pass http://10.0.0.1:8080;"));
        assert!(!text.contains("ssl_certificate"));
        assert!(!text.contains("Upgrade"));
    }

    #[test]
    fn test_labels_drive_rendering() {
        let raw = RawService::new("chat", "10.0.0.7", 3000)
            .with_label("host", "chat.example.com")
            .with_label("hostname", "talk.example.com")
            .with_label("websockets", "true")
            .with_label("tls-cert", "chat.crt")
            .with_label("tls-key", "chat.key");
        let text = renderer().render(&record(raw)).unwrap();

        assert!(text.contains("server_name chat.example.com talk.example.com;"));
        assert!(text.contains("listen 443 ssl;"));
        assert!(text.contains("ssl_certificate           /etc/nginx/ssl/chat.crt;"));
        assert!(text.contains("ssl_certificate_key       /etc/nginx/ssl/chat.key;"));
        assert!(text.contains("proxy_redirect http:// https://;"));
        assert!(text.contains("proxy_set_header Upgrade $http_upgrade;"));
    }

    #[test]
    fn test_tls_needs_both_labels() {
        let raw = RawService::new("web", "10.0.0.1", 80).with_label("tls-cert", "web.crt");
        let ctx = renderer().context(&record(raw)).unwrap();
        assert!(!ctx.tls_enabled);
        assert!(ctx.cert_path.is_empty());
    }

    #[test]
    fn test_websocket_requires_literal_true() {
        let raw = RawService::new("web", "10.0.0.1", 80).with_label("websockets", "yes");
        assert!(!renderer().context(&record(raw)).unwrap().websocket_enabled);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let r = renderer();
        let rec = record(RawService::new("web", "10.0.0.1", 8080).with_label("hostname", "www"));
        assert_eq!(r.render(&rec).unwrap(), r.render(&rec).unwrap());
    }

    #[test]
    fn test_render_errors() {
        let r = renderer();
        assert_eq!(
            r.render(&record(RawService::new("web", "", 80))),
            Err(RenderError::EmptyAddress { name: "web".into() })
        );
        assert_eq!(
            r.render(&record(RawService::new("web", "10.0.0.1", 0))),
            Err(RenderError::ZeroPort { name: "web".into() })
        );

        let hostile = RawService::new("web", "10.0.0.1", 80)
            .with_label("hostname", "evil; include /etc/passwd");
        assert!(matches!(
            r.render(&record(hostile)),
            Err(RenderError::UnsafeValue { field: "alias", .. })
        ));
    }

    #[test]
    fn test_custom_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haproxy.tmpl");
        std::fs::write(&path, "backend {{ name }}\n  server s1 {{ target_address }}:{{ target_port }}\n")
            .unwrap();

        let config = ArtifactConfig {
            template_path: Some(path),
            ..ArtifactConfig::default()
        };
        let text = ArtifactRenderer::from_config(&config)
            .unwrap()
            .render(&record(RawService::new("api", "10.1.0.3", 9000)))
            .unwrap();
        assert_eq!(text, "backend api\n  server s1 10.1.0.3:9000\n");
    }

    #[test]
    fn test_empty_template_path_uses_built_in() {
        let config = ArtifactConfig {
            template_path: Some(PathBuf::new()),
            ..ArtifactConfig::default()
        };
        let text = ArtifactRenderer::from_config(&config)
            .unwrap()
            .render(&record(RawService::new("web", "10.0.0.1", 8080)))
            .unwrap();
        assert!(text.contains("server_name web.proxy.local;"));
    }

    #[test]
    fn test_bad_custom_template_fails_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.tmpl");
        std::fs::write(&path, "{{#if tls_enabled}}never closed").unwrap();

        let config = ArtifactConfig {
            template_path: Some(path),
            ..ArtifactConfig::default()
        };
        assert!(matches!(
            ArtifactRenderer::from_config(&config),
            Err(TemplateError::Unclosed { .. })
        ));
    }
}
