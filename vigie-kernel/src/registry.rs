/**
 * TARGET REGISTRY - Lecture du parc de serveurs à surveiller
 *
 * RÔLE : snapshot des serveurs + composants + identifiants SNMP, lu une fois
 * par cycle. Le CRUD est fait ailleurs (interface d'admin), le moteur ne fait
 * que lire.
 *
 * IMPLÉMENTATION FOURNIE : fichier JSON relu à chaque cycle, les ajouts de
 * l'admin sont donc visibles au cycle suivant sans redémarrage.
 */

use crate::models::Target;
use crate::validation::sanitize_targets;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid targets file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TargetRegistry: Send + Sync {
    async fn list_targets(&self) -> Result<Vec<Target>, RegistryError>;
}

pub struct FileTargetRegistry {
    data_file: PathBuf,
}

impl FileTargetRegistry {
    pub fn new<P: AsRef<Path>>(data_file: P) -> Self {
        Self { data_file: data_file.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.data_file
    }

    /// Remplace le contenu du fichier (écriture dans un fichier temporaire puis rename)
    pub async fn save_targets(&self, targets: &[Target]) -> Result<(), RegistryError> {
        if let Some(parent) = self.data_file.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(targets)?;
        let tmp = self.data_file.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.data_file).await?;
        Ok(())
    }
}

#[async_trait]
impl TargetRegistry for FileTargetRegistry {
    async fn list_targets(&self) -> Result<Vec<Target>, RegistryError> {
        if !tokio::fs::try_exists(&self.data_file).await? {
            debug!(path = %self.data_file.display(), "no targets file, nothing to monitor");
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.data_file).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let targets: Vec<Target> = serde_json::from_str(&content)?;
        let loaded = targets.len();
        let targets = sanitize_targets(targets);
        if targets.len() != loaded {
            info!(loaded, kept = targets.len(), "some targets were dropped by validation");
        }
        Ok(targets)
    }
}
