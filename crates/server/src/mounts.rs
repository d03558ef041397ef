//! Local model directories exposed over HTTP under `/model/<id>`.

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    sync::Mutex,
};

use shared::error::{ApiException, ErrorCode};
use uuid::Uuid;

pub const MOUNT_PREFIX: &str = "/model";

#[derive(Debug, Default)]
pub struct MountTable {
    by_id: Mutex<HashMap<String, PathBuf>>,
}

fn internal(message: impl Into<String>) -> ApiException {
    ApiException::new(ErrorCode::Internal, message)
}

impl MountTable {
    /// Mounts `dir` and returns its base path. A directory that is already mounted keeps its id.
    pub fn mount(&self, dir: &str) -> Result<String, ApiException> {
        let root = Path::new(dir)
            .canonicalize()
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| {
                ApiException::new(
                    ErrorCode::Validation,
                    format!("model directory does not exist: {dir}"),
                )
            })?;

        let mut by_id = self
            .by_id
            .lock()
            .map_err(|_| internal("mount table poisoned"))?;
        if let Some((id, _)) = by_id.iter().find(|(_, mounted)| **mounted == root) {
            return Ok(format!("{MOUNT_PREFIX}/{id}"));
        }

        let id = loop {
            let candidate = Uuid::new_v4().simple().to_string()[..8].to_string();
            if !by_id.contains_key(&candidate) {
                break candidate;
            }
        };
        by_id.insert(id.clone(), root);
        Ok(format!("{MOUNT_PREFIX}/{id}"))
    }

    /// Maps a request path inside a mount onto the filesystem. Returns `None` for unknown
    /// mounts and for any path that would leave the mounted directory.
    pub fn resolve(&self, mount_id: &str, rel_path: &str) -> Option<PathBuf> {
        let root = self.by_id.lock().ok()?.get(mount_id)?.clone();

        let rel = Path::new(rel_path.trim_start_matches('/'));
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }

        // Symlinks inside the mount may still point outside it.
        let full = root.join(rel).canonicalize().ok()?;
        full.starts_with(&root).then_some(full)
    }
}
