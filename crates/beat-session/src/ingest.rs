//! Import of a local directory into a tree.

use std::path::{Path, PathBuf};

use beat_tree::{FileStat, VersionedTree};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::{SessionError, SessionResult};

/// Files written at the same time during one ingest. Each in-flight write
/// holds its source file and a block temp file open.
pub const MAX_CONCURRENT_WRITES: usize = 32;

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Files under `root` in walk order, paired with their tree paths.
///
/// Hidden entries (a leading `.`) are skipped along with everything below
/// them, and so is `exclude` when it lies inside `root`.
pub fn collect(root: &Path, exclude: Option<&Path>) -> SessionResult<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && exclude.map_or(true, |x| e.path() != x));
    for entry in walker {
        let entry = entry.map_err(|e| SessionError::WriteFailed {
            path: e.path().map_or_else(String::new, |p| p.display().to_string()),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let mut tree_path = String::new();
        for component in relative.components() {
            let name = component.as_os_str().to_str().ok_or_else(|| SessionError::WriteFailed {
                path: relative.display().to_string(),
                reason: "file name is not valid UTF-8".into(),
            })?;
            tree_path.push('/');
            tree_path.push_str(name);
        }
        files.push((entry.into_path(), tree_path));
    }
    Ok(files)
}

/// Write every file under `root` into `tree` at its relative path.
///
/// Up to [`MAX_CONCURRENT_WRITES`] writes run at once, finishing in any
/// order; the first failure aborts the batch and writes that already
/// published stay published.
pub async fn ingest(
    tree: &VersionedTree,
    root: &Path,
    exclude: Option<&Path>,
) -> SessionResult<Vec<FileStat>> {
    ingest_with_limit(tree, root, exclude, MAX_CONCURRENT_WRITES).await
}

pub async fn ingest_with_limit(
    tree: &VersionedTree,
    root: &Path,
    exclude: Option<&Path>,
    limit: usize,
) -> SessionResult<Vec<FileStat>> {
    let files = collect(root, exclude)?;
    info!(count = files.len(), limit, dir = ?root, "ingesting files");
    let writes = files.iter().map(|(local, tree_path)| async move {
        let file = tokio::fs::File::open(local)
            .await
            .map_err(|e| SessionError::WriteFailed {
                path: tree_path.clone(),
                reason: e.to_string(),
            })?;
        let stat = tree.write(tree_path, file).await?;
        debug!(path = %stat.path, size = stat.size, version = stat.version, "file ingested");
        Ok::<_, SessionError>(stat)
    });
    stream::iter(writes)
        .buffer_unordered(limit.max(1))
        .try_collect()
        .await
}
