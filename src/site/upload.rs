//! Which generated files get uploaded, and where they land remotely.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::PublishError;

/// Subdirectory of the output root that is mirrored alongside it.
pub const PAGES_DIR: &str = "pages";

/// A local file and its destination on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEntry {
    pub local: PathBuf,
    pub remote: String,
}

/// Destination for a local file: its path below the output root.
///
/// With root `public_html`, `public_html/pages/post1.html` becomes
/// `pages/post1.html`. Components are joined with `/` whatever the local
/// separator. Returns `None` when `local` is not below `root`.
pub fn remote_path(root: &Path, local: &Path) -> Option<String> {
    let relative = local.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Non-directory entries directly under `output_root` and
/// `output_root/pages`, sorted by local path. Deeper directories are not
/// traversed.
pub async fn collect_upload_set(output_root: &Path) -> Result<Vec<UploadEntry>, PublishError> {
    if !exists(output_root).await? {
        return Err(PublishError::MissingDirectory(output_root.to_path_buf()));
    }

    let mut files = list_files(output_root).await?;

    let pages = output_root.join(PAGES_DIR);
    if exists(&pages).await? {
        files.extend(list_files(&pages).await?);
    } else {
        warn!(dir = %pages.display(), "Pages directory not found, skipping");
    }

    files.sort();
    files
        .into_iter()
        .map(|local| {
            let remote = remote_path(output_root, &local)
                .ok_or_else(|| PublishError::NoRemotePath(local.clone()))?;
            Ok(UploadEntry { local, remote })
        })
        .collect()
}

/// Whether `path` exists. Errors other than "not found" are reported.
async fn exists(path: &Path) -> Result<bool, PublishError> {
    fs::try_exists(path)
        .await
        .map_err(|source| PublishError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Files (and symlinks to files) directly inside `dir`.
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, PublishError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PublishError::Io { path, source }
    };

    let mut files = Vec::new();
    let mut read_dir = fs::read_dir(dir).await.map_err(io_err(dir))?;
    while let Some(entry) = read_dir.next_entry().await.map_err(io_err(dir))? {
        let path = entry.path();
        let metadata = fs::metadata(&path).await.map_err(io_err(&path))?;
        if metadata.is_dir() {
            debug!(dir = %path.display(), "Not descending into directory");
            continue;
        }
        files.push(path);
    }
    Ok(files)
}
