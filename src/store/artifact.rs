//! On-disk routing artifacts.
//!
//! # Responsibilities
//! - Own the artifact directory: one file per service name
//! - Render and fully overwrite an artifact, or delete it
//! - Ask the proxy to reload after each mutation (`upsert` / `remove`)
//!
//! # Design Decisions
//! - Render before touching the file: a render error leaves the old artifact
//! - Write to `<file>.tmp` then rename, so the proxy never reads half a file
//! - No rollback: a failed reload leaves the new artifact on disk
//! - Deleting a missing artifact is an error, not a no-op

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::ArtifactConfig;
use crate::observability::metrics;
use crate::proxy::{ProcessController, ReloadError};
use crate::registry::ServiceRecord;
use crate::render::{ArtifactRenderer, RenderError};

/// Errors from artifact mutations.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("service name {0:?} cannot be used as an artifact file name")]
    InvalidName(String),

    #[error("cannot create artifact directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("cannot write artifact {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {path:?} does not exist")]
    RemoveNotFound { path: PathBuf },

    #[error("cannot remove artifact {path:?}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Reload(#[from] ReloadError),
}

/// The directory of routing artifacts and the proxy that reads it.
pub struct ArtifactStore {
    dir: PathBuf,
    extension: String,
    renderer: ArtifactRenderer,
    controller: Arc<dyn ProcessController>,
}

impl ArtifactStore {
    pub fn new(
        config: &ArtifactConfig,
        renderer: ArtifactRenderer,
        controller: Arc<dyn ProcessController>,
    ) -> Self {
        Self {
            dir: config.dir.clone(),
            extension: config.extension.clone(),
            renderer,
            controller,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact path for a service name.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, self.extension))
    }

    fn checked_path(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', '\0']);
        if valid {
            Ok(self.path_for(name))
        } else {
            Err(ArtifactError::InvalidName(name.to_string()))
        }
    }

    /// Render and write the artifact for `record` without reloading.
    pub async fn write(&self, record: &ServiceRecord) -> Result<PathBuf, ArtifactError> {
        let result = self.write_inner(record).await;
        metrics::record_artifact_op("write", result.is_ok());
        result
    }

    async fn write_inner(&self, record: &ServiceRecord) -> Result<PathBuf, ArtifactError> {
        let path = self.checked_path(&record.name)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ArtifactError::Directory {
                path: self.dir.clone(),
                source,
            })?;

        let text = self.renderer.render(record)?;

        let tmp = path.with_extension(format!("{}.tmp", self.extension));
        let written = async {
            tokio::fs::write(&tmp, text.as_bytes()).await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;
        if let Err(source) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ArtifactError::Write { path, source });
        }

        tracing::debug!(service = %record.name, path = ?path, "Artifact written");
        Ok(path)
    }

    /// Delete the artifact for `name` without reloading.
    pub async fn delete(&self, name: &str) -> Result<(), ArtifactError> {
        let result = self.delete_inner(name).await;
        metrics::record_artifact_op("delete", result.is_ok());
        result
    }

    async fn delete_inner(&self, name: &str) -> Result<(), ArtifactError> {
        let path = self.checked_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(service = %name, path = ?path, "Artifact removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ArtifactError::RemoveNotFound { path }),
            Err(source) => Err(ArtifactError::Remove { path, source }),
        }
    }

    /// Run the proxy's validate-then-apply protocol.
    pub async fn reload(&self) -> Result<(), ArtifactError> {
        self.controller.reload().await?;
        Ok(())
    }

    /// Write the artifact for `record`, then reload the proxy.
    pub async fn upsert(&self, record: &ServiceRecord) -> Result<(), ArtifactError> {
        self.write(record).await?;
        self.reload().await
    }

    /// Delete the artifact for `name`, then reload the proxy.
    pub async fn remove(&self, name: &str) -> Result<(), ArtifactError> {
        self.delete(name).await?;
        self.reload().await
    }

    /// Service names that currently have an artifact, sorted.
    pub async fn artifact_names(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e),
        };

        let suffix = format!(".{}", self.extension);
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_string_lossy().strip_suffix(&suffix) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
