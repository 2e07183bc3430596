//! Artifact template compilation and rendering.
//!
//! # Syntax
//! ```text
//! {{ field }}                         substitution
//! {{#if flag}} ... {{else}} ... {{/if}}  conditional section (nestable)
//! ```
//!
//! # Design Decisions
//! - Templates compile once at startup; every error is reported then
//! - Fields and flags are closed enums, so rendering cannot fail
//! - Single braces pass through untouched (nginx blocks use them)

use std::borrow::Cow;
use std::str::FromStr;
use std::sync::OnceLock;
use regex::Regex;
use thiserror::Error;

/// Substitutable values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Host,
    Alias,
    TargetAddress,
    TargetPort,
    CertPath,
    KeyPath,
}

impl FromStr for Field {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Field::Name),
            "host" => Ok(Field::Host),
            "alias" => Ok(Field::Alias),
            "target_address" => Ok(Field::TargetAddress),
            "target_port" => Ok(Field::TargetPort),
            "cert_path" => Ok(Field::CertPath),
            "key_path" => Ok(Field::KeyPath),
            _ => Err(()),
        }
    }
}

/// Section conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    TlsEnabled,
    WebsocketEnabled,
    HasAlias,
}

impl FromStr for Flag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tls_enabled" => Ok(Flag::TlsEnabled),
            "websocket_enabled" => Ok(Flag::WebsocketEnabled),
            "has_alias" => Ok(Flag::HasAlias),
            _ => Err(()),
        }
    }
}

/// Everything a template can reference for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactContext {
    pub name: String,
    pub host: String,
    pub alias: String,
    pub target_address: String,
    pub target_port: u16,
    pub tls_enabled: bool,
    pub cert_path: String,
    pub key_path: String,
    pub websocket_enabled: bool,
}

impl ArtifactContext {
    fn field(&self, field: Field) -> Cow<'_, str> {
        match field {
            Field::Name => Cow::Borrowed(&self.name),
            Field::Host => Cow::Borrowed(&self.host),
            Field::Alias => Cow::Borrowed(&self.alias),
            Field::TargetAddress => Cow::Borrowed(&self.target_address),
            Field::TargetPort => Cow::Owned(self.target_port.to_string()),
            Field::CertPath => Cow::Borrowed(&self.cert_path),
            Field::KeyPath => Cow::Borrowed(&self.key_path),
        }
    }

    fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::TlsEnabled => self.tls_enabled,
            Flag::WebsocketEnabled => self.websocket_enabled,
            Flag::HasAlias => !self.alias.is_empty(),
        }
    }
}

/// Template definition errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("line {line}: unknown field `{name}`")]
    UnknownField { name: String, line: usize },

    #[error("line {line}: unknown flag `{name}`")]
    UnknownFlag { name: String, line: usize },

    #[error("line {line}: `else` outside of an `if` section")]
    UnexpectedElse { line: usize },

    #[error("line {line}: `/if` without a matching `#if`")]
    UnexpectedEndIf { line: usize },

    #[error("line {line}: `#if` section is never closed")]
    Unclosed { line: usize },

    #[error("cannot read template: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Field(Field),
    If {
        flag: Flag,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

struct Frame {
    flag: Flag,
    line: usize,
    then: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl Frame {
    fn body(&mut self) -> &mut Vec<Node> {
        match &mut self.otherwise {
            Some(otherwise) => otherwise,
            None => &mut self.then,
        }
    }
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("tag pattern is valid"))
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

fn push(root: &mut Vec<Node>, stack: &mut [Frame], node: Node) {
    match stack.last_mut() {
        Some(frame) => frame.body().push(node),
        None => root.push(node),
    }
}

/// A compiled artifact template.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parse `source`, rejecting unknown names and unbalanced sections.
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut root = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut last = 0;

        for caps in tag_pattern().captures_iter(source) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                push(&mut root, &mut stack, Node::Text(source[last..whole.start()].to_string()));
            }
            last = whole.end();

            let tag = inner.as_str();
            let line = line_of(source, whole.start());

            if let Some(rest) = tag.strip_prefix("#if") {
                let name = rest.trim();
                let flag = name.parse::<Flag>().map_err(|_| TemplateError::UnknownFlag {
                    name: name.to_string(),
                    line,
                })?;
                stack.push(Frame {
                    flag,
                    line,
                    then: Vec::new(),
                    otherwise: None,
                });
            } else if tag == "else" {
                match stack.last_mut() {
                    Some(frame) if frame.otherwise.is_none() => frame.otherwise = Some(Vec::new()),
                    _ => return Err(TemplateError::UnexpectedElse { line }),
                }
            } else if tag == "/if" {
                let frame = stack.pop().ok_or(TemplateError::UnexpectedEndIf { line })?;
                let node = Node::If {
                    flag: frame.flag,
                    then: frame.then,
                    otherwise: frame.otherwise.unwrap_or_default(),
                };
                push(&mut root, &mut stack, node);
            } else {
                let field = tag.parse::<Field>().map_err(|_| TemplateError::UnknownField {
                    name: tag.to_string(),
                    line,
                })?;
                push(&mut root, &mut stack, Node::Field(field));
            }
        }

        if let Some(frame) = stack.pop() {
            return Err(TemplateError::Unclosed { line: frame.line });
        }
        if last < source.len() {
            root.push(Node::Text(source[last..].to_string()));
        }

        Ok(Self { nodes: root })
    }

    /// Fill the template for one service.
    pub fn render(&self, ctx: &ArtifactContext) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, ctx, &mut out);
        out
    }
}

fn render_nodes(nodes: &[Node], ctx: &ArtifactContext, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Field(field) => out.push_str(&ctx.field(*field)),
            Node::If {
                flag,
                then,
                otherwise,
            } => {
                let branch = if ctx.flag(*flag) { then } else { otherwise };
                render_nodes(branch, ctx, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ArtifactContext {
        ArtifactContext {
            name: "web".into(),
            host: "web.proxy.local".into(),
            alias: String::new(),
            target_address: "10.0.0.1".into(),
            target_port: 8080,
            tls_enabled: false,
            cert_path: String::new(),
            key_path: String::new(),
            websocket_enabled: false,
        }
    }

    #[test]
    fn test_substitution() {
        let t = Template::compile("upstream {{ name }} { server {{target_address}}:{{ target_port }}; }")
            .unwrap();
        assert_eq!(t.render(&ctx()), "upstream web { server 10.0.0.1:8080; }");
    }

    #[test]
    fn test_sections() {
        let t = Template::compile("{{#if tls_enabled}}443{{else}}80{{/if}}").unwrap();
        assert_eq!(t.render(&ctx()), "80");

        let mut tls = ctx();
        tls.tls_enabled = true;
        assert_eq!(t.render(&tls), "443");
    }

    #[test]
    fn test_nested_sections() {
        let t = Template::compile(
            "{{#if has_alias}}[{{alias}}{{#if websocket_enabled}} ws{{/if}}]{{/if}}",
        )
        .unwrap();
        assert_eq!(t.render(&ctx()), "");

        let mut c = ctx();
        c.alias = "www.example.com".into();
        c.websocket_enabled = true;
        assert_eq!(t.render(&c), "[www.example.com ws]");
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            Template::compile("a\n{{ hostname }}"),
            Err(TemplateError::UnknownField { line: 2, .. })
        ));
        assert!(matches!(
            Template::compile("{{#if ssl}}x{{/if}}"),
            Err(TemplateError::UnknownFlag { .. })
        ));
        assert!(matches!(
            Template::compile("{{else}}"),
            Err(TemplateError::UnexpectedElse { .. })
        ));
        assert!(matches!(
            Template::compile("{{#if tls_enabled}}a{{else}}b{{else}}c{{/if}}"),
            Err(TemplateError::UnexpectedElse { .. })
        ));
        assert!(matches!(
            Template::compile("{{/if}}"),
            Err(TemplateError::UnexpectedEndIf { .. })
        ));
        assert!(matches!(
            Template::compile("\n\n{{#if tls_enabled}}open"),
            Err(TemplateError::Unclosed { line: 3 })
        ));
    }

    #[test]
    fn test_single_braces_pass_through() {
        let t = Template::compile("server {\n  listen 80;\n}\n").unwrap();
        assert_eq!(t.render(&ctx()), "server {\n  listen 80;\n}\n");
    }
}
