//! Project file discovery for pushes.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Files above this size are left out of a push.
pub const MAX_PUSH_FILE_BYTES: u64 = 50 * 1024 * 1024;

const SKIP_DIRS: &[&str] = &["target", "node_modules", "__pycache__"];

/// A file to commit, addressed relative to the project root with `/`
/// separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ProjectFile {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let kind = Path::new(&path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("txt")
            .to_string();
        Self { path, kind }
    }
}

/// Walks `root` and returns every file worth pushing, sorted by path.
///
/// Hidden directories, build output and dependency caches are skipped, as
/// are files larger than `max_bytes`.
pub fn collect_project_files(root: &Path, max_bytes: u64) -> io::Result<Vec<ProjectFile>> {
    let mut out = Vec::new();
    walk(root, "", max_bytes, &mut out)?;
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

fn walk(dir: &Path, prefix: &str, max_bytes: u64, out: &mut Vec<ProjectFile>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if name.starts_with('.') || SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            walk(&entry.path(), &rel, max_bytes, out)?;
        } else if file_type.is_file() {
            let size = entry.metadata()?.len();
            if size > max_bytes {
                tracing::info!(path = %rel, size, "Skipping large file");
                continue;
            }
            out.push(ProjectFile::new(rel));
        }
    }
    Ok(())
}
