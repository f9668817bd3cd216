//! Metric Sink : enregistrement durable des observations, un lot par cycle.
//!
//! Contrat : `append_batch` est tout-ou-rien. Une erreur signifie qu'aucune
//! observation du lot n'a été persistée.

use crate::models::MetricObservation;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn append_batch(&self, batch: &[MetricObservation]) -> Result<(), SinkError>;
}

/// Une ligne JSON par observation, le lot entier écrit en un seul appel
pub struct JsonlMetricSink {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonlMetricSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), lock: tokio::sync::Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Relit toutes les observations (tests, outils)
    pub async fn read_all(&self) -> Result<Vec<MetricObservation>, SinkError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(SinkError::from))
            .collect()
    }
}

#[async_trait]
impl MetricSink for JsonlMetricSink {
    async fn append_batch(&self, batch: &[MetricObservation]) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }

        // sérialisation complète avant d'ouvrir le fichier
        let mut buffer = Vec::with_capacity(batch.len() * 256);
        for observation in batch {
            serde_json::to_writer(&mut buffer, observation)?;
            buffer.push(b'\n');
        }

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buffer).await?;
        file.sync_data().await?;

        debug!(path = %self.path.display(), count = batch.len(), "metric batch committed");
        Ok(())
    }
}
