//! Filesystem discovery of model artifacts

use super::{DiscoveryError, ModelInfo, is_model_file};
use std::path::{Path, PathBuf};

/// Deepest directory level visited below a scan root
pub const MAX_SCAN_DEPTH: usize = 5;

/// OS-specific directories where model files commonly live
///
/// The list is fixed; callers filter it with [`discover_candidate_paths`].
pub fn platform_candidate_paths() -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let mut paths = Vec::new();

    if cfg!(windows) {
        paths.extend(
            [r"C:\AI-Models", r"D:\AI-Models", r"D:\models", r"E:\models"]
                .into_iter()
                .map(PathBuf::from),
        );
        // %APPDATA% and %LOCALAPPDATA%
        if let Some(roaming) = dirs::data_dir() {
            paths.push(roaming.join("BigDaddyG").join("models"));
        }
        if let Some(local) = dirs::data_local_dir() {
            paths.push(local.join("BigDaddyG").join("models"));
            paths.push(local.join("Ollama").join("models"));
        }
        if let Some(home) = &home {
            paths.push(home.join(".ollama").join("models"));
        }
    } else {
        if let Some(home) = &home {
            paths.push(home.join(".ollama").join("models"));
            paths.push(home.join("models"));
            paths.push(home.join(".bigdaddyg").join("models"));
            paths.push(home.join(".cache").join("huggingface").join("hub"));
            paths.push(home.join(".local").join("share").join("bigdaddyg").join("models"));
        }
        paths.extend(
            [
                "/usr/share/ollama/.ollama/models",
                "/usr/local/share/models",
                "/opt/models",
            ]
            .into_iter()
            .map(PathBuf::from),
        );
    }

    paths
}

/// Keep only the candidates that currently exist as directories
///
/// Errors during the existence check count as "does not exist".
pub fn discover_candidate_paths(candidates: &[PathBuf]) -> Vec<PathBuf> {
    candidates
        .iter()
        .filter(|path| match std::fs::metadata(path) {
            Ok(meta) => meta.is_dir(),
            Err(e) => {
                tracing::trace!(path = %path.display(), error = %e, "Candidate path skipped");
                false
            }
        })
        .cloned()
        .collect()
}

/// Recursively collect model files below `root`
///
/// `depth` is the level of `root` itself (0 for a scan root). Subtrees deeper
/// than [`MAX_SCAN_DEPTH`] are skipped; unreadable directories contribute no
/// entries. Symlinked directories are not followed.
pub async fn scan_directory(root: &Path, depth: usize) -> Vec<ModelInfo> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), depth)];

    while let Some((dir, level)) = pending.pop() {
        if level > MAX_SCAN_DEPTH {
            tracing::trace!(path = %dir.display(), "Maximum scan depth reached, skipping");
            continue;
        }

        let entries = match read_entries(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(error = %e, "Directory unreadable, treating as empty");
                continue;
            }
        };

        for entry in entries {
            match entry {
                Entry::Dir(path) => pending.push((path, level + 1)),
                Entry::File(path, size) => {
                    let is_model = path
                        .file_name()
                        .map(|name| is_model_file(&name.to_string_lossy()))
                        .unwrap_or(false);
                    if is_model {
                        found.push(ModelInfo::from_scanned_file(path, size));
                    }
                }
            }
        }
    }

    found
}

enum Entry {
    Dir(PathBuf),
    File(PathBuf, u64),
}

async fn read_entries(dir: &Path) -> Result<Vec<Entry>, DiscoveryError> {
    let io_err = |source| DiscoveryError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut reader = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut entries = Vec::new();

    while let Some(entry) = reader.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let file_type = match entry.file_type().await {
            Ok(ft) => ft,
            Err(e) => {
                tracing::trace!(path = %path.display(), error = %e, "Cannot stat entry");
                continue;
            }
        };

        if file_type.is_dir() {
            entries.push(Entry::Dir(path));
        } else if file_type.is_file() || file_type.is_symlink() {
            // Symlinks count only when they resolve to a regular file
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => entries.push(Entry::File(path, meta.len())),
                Ok(_) => {}
                Err(e) => {
                    tracing::trace!(path = %path.display(), error = %e, "Cannot read metadata");
                }
            }
        }
    }

    Ok(entries)
}
