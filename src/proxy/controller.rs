//! Proxy process control.
//!
//! # Responsibilities
//! - Run the proxy's configuration check (validate)
//! - Run the proxy's reload command (apply)
//! - Capture output for diagnostics
//!
//! # Design Decisions
//! - Validate always precedes apply; a failed validate never applies
//! - No retry here: the next reconciliation pass is the retry
//! - Every command has a deadline; timed-out children are killed
//! - Trait seam so tests substitute a fake proxy

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::ProxyCommandConfig;
use crate::observability::metrics;

/// Why one external command did not succeed.
#[derive(Debug, Error)]
pub enum ProcessFailure {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed ({status}): {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} timed out after {elapsed:?}")]
    Timeout { program: String, elapsed: Duration },
}

/// Errors of the validate-then-apply protocol.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The proxy rejected the configuration; the running config is unchanged.
    #[error("proxy config validation failed: {0}")]
    Validation(#[source] ProcessFailure),

    /// Validation passed but the reload command failed; live state unknown.
    #[error("proxy reload failed: {0}")]
    Apply(#[source] ProcessFailure),
}

/// Drives the proxy through validate then apply.
#[async_trait]
pub trait ProcessController: Send + Sync {
    /// Check the on-disk configuration.
    async fn validate(&self) -> Result<(), ProcessFailure>;

    /// Make the running proxy pick up the on-disk configuration.
    async fn apply(&self) -> Result<(), ProcessFailure>;

    /// Validate, then apply. Both commands run on every call.
    async fn reload(&self) -> Result<(), ReloadError> {
        let result = match self.validate().await {
            Ok(()) => self.apply().await.map_err(ReloadError::Apply),
            Err(e) => Err(ReloadError::Validation(e)),
        };
        metrics::record_reload(result.is_ok());
        result
    }
}

/// Runs configured commands as child processes.
#[derive(Debug, Clone)]
pub struct CommandController {
    validate: Vec<String>,
    reload: Vec<String>,
    timeout: Duration,
}

impl CommandController {
    pub fn new(validate: Vec<String>, reload: Vec<String>, timeout: Duration) -> Self {
        Self {
            validate,
            reload,
            timeout,
        }
    }

    pub fn from_config(config: &ProxyCommandConfig) -> Self {
        Self::new(
            config.validate_command.clone(),
            config.reload_command.clone(),
            Duration::from_secs(config.command_timeout_secs),
        )
    }

    async fn run(&self, argv: &[String]) -> Result<(), ProcessFailure> {
        let Some((program, args)) = argv.split_first() else {
            return Err(ProcessFailure::Spawn {
                program: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ProcessFailure::Spawn {
                    program: program.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ProcessFailure::Timeout {
                    program: program.clone(),
                    elapsed: self.timeout,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(
            program = %program,
            status = %output.status,
            stdout = %stdout.trim(),
            stderr = %stderr.trim(),
            "Command finished"
        );

        if output.status.success() {
            Ok(())
        } else {
            Err(ProcessFailure::Exit {
                program: program.clone(),
                status: output.status,
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl ProcessController for CommandController {
    async fn validate(&self) -> Result<(), ProcessFailure> {
        tracing::debug!("Checking proxy config");
        self.run(&self.validate).await
    }

    async fn apply(&self) -> Result<(), ProcessFailure> {
        tracing::debug!("Reloading proxy");
        self.run(&self.reload).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn controller(validate: &[&str], reload: &[&str]) -> CommandController {
        CommandController::new(argv(validate), argv(reload), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_reload_success() {
        assert!(controller(&["true"], &["true"]).reload().await.is_ok());
    }

    #[tokio::test]
    async fn test_validation_failure_skips_apply() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("applied");
        let apply = format!("touch {}", marker.display());

        let c = controller(&["sh", "-c", "echo 'bad directive' >&2; exit 1"], &["sh", "-c", apply.as_str()]);
        match c.reload().await {
            Err(ReloadError::Validation(ProcessFailure::Exit { stderr, .. })) => {
                assert_eq!(stderr, "bad directive");
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_apply_failure() {
        let c = controller(&["true"], &["false"]);
        assert!(matches!(
            c.reload().await,
            Err(ReloadError::Apply(ProcessFailure::Exit { .. }))
        ));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let c = controller(&["/nonexistent/nginx", "-t"], &["true"]);
        assert!(matches!(
            c.reload().await,
            Err(ReloadError::Validation(ProcessFailure::Spawn { .. }))
        ));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let c = CommandController::new(argv(&["true"]), argv(&["sleep", "5"]), Duration::from_millis(100));
        assert!(matches!(
            c.reload().await,
            Err(ReloadError::Apply(ProcessFailure::Timeout { .. }))
        ));
    }

    #[tokio::test]
    async fn test_every_call_runs_both_commands() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls");
        let validate = format!("echo validate >> {}", log.display());
        let apply = format!("echo apply >> {}", log.display());
        let c = controller(&["sh", "-c", validate.as_str()], &["sh", "-c", apply.as_str()]);

        c.reload().await.unwrap();
        c.reload().await.unwrap();

        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls, "validate\napply\nvalidate\napply\n");
    }
}
