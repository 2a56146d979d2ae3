use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Layout of downloaded media on disk.
///
/// Files for a message live in `{downloads_dir}/{collection}-{message_id}/`
/// and are referenced from records relative to `storage_root`.
pub struct MediaStorage {
    downloads_dir: PathBuf,
    storage_root: PathBuf,
}

impl MediaStorage {
    /// Both directories are made absolute against the current directory.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        downloads_dir: P,
        storage_root: Q,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            downloads_dir: absolute(downloads_dir.as_ref())?,
            storage_root: absolute(storage_root.as_ref())?,
        })
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Directory reserved for one message's media.
    pub fn message_dir(&self, collection: &str, message_id: i64) -> PathBuf {
        self.downloads_dir
            .join(format!("{}-{}", collection, message_id))
    }

    /// Creates the message directory if needed and returns it.
    pub async fn prepare_message_dir(
        &self,
        collection: &str,
        message_id: i64,
    ) -> Result<PathBuf, StorageError> {
        let dir = self.message_dir(collection, message_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;
        Ok(dir)
    }

    /// Expresses a saved file relative to the storage root, walking up with
    /// `..` when the file is outside it. Falls back to the absolute path when
    /// the two share no common prefix (e.g. different drives).
    pub fn relative_path(&self, saved: &Path) -> Result<String, StorageError> {
        let saved = absolute(saved)?;
        let root = normalize(&self.storage_root);
        let target = normalize(&saved);

        let root_components: Vec<_> = root.components().collect();
        let target_components: Vec<_> = target.components().collect();

        let common_length = root_components
            .iter()
            .zip(target_components.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let has_shared_prefix = root_components
            .iter()
            .take(common_length)
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir));
        if !has_shared_prefix {
            return Ok(saved.to_string_lossy().into_owned());
        }

        let mut relative = PathBuf::new();
        for _ in common_length..root_components.len() {
            relative.push("..");
        }
        for component in &target_components[common_length..] {
            relative.push(component);
        }

        if relative.as_os_str().is_empty() {
            relative.push(".");
        }
        Ok(relative.to_string_lossy().into_owned())
    }
}

fn absolute(path: &Path) -> Result<PathBuf, StorageError> {
    std::path::absolute(path).map_err(|e| StorageError::ResolvePath {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Lexically resolves `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
