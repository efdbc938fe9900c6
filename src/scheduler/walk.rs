//! Depth-first directory iteration for manifest creation.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// One file found during a walk.
pub(crate) struct WalkedFile {
    pub absolute_path: PathBuf,
    /// Path relative to the walk root, with `/` separators. `None` when the
    /// name is not representable as UTF-8 (such a file cannot be recorded
    /// in a manifest and is reported as bad).
    pub relative_path: Option<String>,
    pub size: u64,
}

/// Depth-first iterator over all regular files below `base_path`.
///
/// Directory symlinks are not descended into; symlinked regular files are
/// yielded like any other file. The same policy applies on every platform.
pub(crate) struct FileWalk {
    base: PathBuf,
    directories: Vec<PathBuf>,
    current: VecDeque<fs::DirEntry>,
}

impl FileWalk {
    pub fn new(base_path: &Path) -> FileWalk {
        FileWalk {
            base: base_path.to_path_buf(),
            directories: vec![base_path.to_path_buf()],
            current: VecDeque::new(),
        }
    }

    fn relative_to_base(&self, p: &Path) -> Option<String> {
        let rel = p.strip_prefix(&self.base).ok()?;
        let mut out = String::new();
        for component in rel.components() {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(component.as_os_str().to_str()?);
        }
        Some(out)
    }

    fn next_file(&mut self) -> Result<Option<WalkedFile>> {
        loop {
            let Some(entry) = self.current.pop_front() else {
                let Some(dir) = self.directories.pop() else {
                    return Ok(None);
                };
                // read one directory at a time; entry order is whatever the
                // filesystem yields, sorted for deterministic manifests
                let mut entries: Vec<fs::DirEntry> =
                    fs::read_dir(&dir)?.collect::<std::io::Result<_>>()?;
                entries.sort_by_key(|e| e.file_name());
                self.current.extend(entries);
                continue;
            };
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                self.directories.push(path);
                continue;
            }
            // resolve symlinks; a symlinked directory is not descended into
            let metadata = if file_type.is_symlink() {
                match fs::metadata(&path) {
                    Ok(m) if m.is_file() => m,
                    _ => continue,
                }
            } else {
                entry.metadata()?
            };
            if !metadata.is_file() {
                continue;
            }
            let relative_path = self.relative_to_base(&path);
            return Ok(Some(WalkedFile {
                absolute_path: path,
                relative_path,
                size: metadata.len(),
            }));
        }
    }
}

impl Iterator for FileWalk {
    type Item = Result<WalkedFile>;

    fn next(&mut self) -> Option<Result<WalkedFile>> {
        self.next_file().transpose()
    }
}
