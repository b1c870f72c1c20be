use std::path::PathBuf;

use uuid::Uuid;

use crate::utils::error::{AppError, AppResult};

/// Filesystem-backed blob store for uploaded recordings. Files are keyed
/// by analysis id so a retried upload overwrites its own blob instead of
/// accumulating duplicates.
#[derive(Clone)]
pub struct AudioStore {
    root: PathBuf,
    public_base_url: String,
}

impl AudioStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub async fn save(&self, analysis_id: Uuid, audio: &[u8]) -> AppResult<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Internal(format!("audio store unavailable: {}", e)))?;

        let file_name = format!("{}.webm", analysis_id);
        let path = self.root.join(&file_name);
        tokio::fs::write(&path, audio)
            .await
            .map_err(|e| AppError::Internal(format!("failed to persist audio: {}", e)))?;

        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            file_name
        ))
    }

    /// Load a recording back by its public URL. Only URLs under this
    /// store's base are resolvable; anything else is fetched by the caller
    /// over HTTP.
    pub async fn load_by_url(&self, url: &str) -> AppResult<Option<Vec<u8>>> {
        let base = self.public_base_url.trim_end_matches('/');
        let Some(file_name) = url.strip_prefix(base).map(|rest| rest.trim_start_matches('/'))
        else {
            return Ok(None);
        };

        // Keys are flat; a path separator means the URL is not ours.
        if file_name.contains('/') || file_name.contains("..") {
            return Ok(None);
        }

        match tokio::fs::read(self.root.join(file_name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Internal(format!("failed to read audio: {}", e))),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}
