//! Recursive directory walk plus archive/zip member expansion, feeding a
//! lock-free MPMC work queue (`crossbeam_channel::unbounded`).
//!
//! Push operations share a single producer; consumer pops never block on the
//! producer side. The queue is therefore safe to drain concurrently with the
//! walk still in progress.

use std::fs;
use std::path::{Path, PathBuf};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::ScanError;
use crate::workitem::WorkItem;

/// The producer side of the work queue: a path walker that pushes one
/// [`WorkItem`] per discovered file or archive member.
pub struct Walker {
    sender: Sender<WorkItem>,
}

/// Creates a fresh queue and returns its producer and consumer halves.
pub fn queue() -> (Walker, Receiver<WorkItem>) {
    let (sender, receiver) = unbounded();
    (Walker { sender }, receiver)
}

impl Walker {
    /// Walks every input path, pushing one work item per file (or per zip
    /// member for zip inputs), and returns the number of items pushed.
    ///
    /// Symlinked directories are not traversed. Any path component beginning
    /// with `.` (other than `.`/`..`) hides the file or directory.
    pub fn queue_input(&self, paths: &[PathBuf]) -> Result<usize, ScanError> {
        let mut count = 0;
        for path in paths {
            count += self.queue_path(path)?;
        }
        Ok(count)
    }

    fn queue_path(&self, path: &Path) -> Result<usize, ScanError> {
        if is_hidden(path) {
            return Ok(0);
        }

        let metadata = fs::symlink_metadata(path).map_err(|e| ScanError::Skip {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if metadata.is_dir() {
            return self.queue_directory(path);
        }
        if metadata.file_type().is_symlink() {
            // A symlink to a file is still scanned; only symlinked
            // directories are excluded from traversal.
            let target = fs::metadata(path).map_err(|e| ScanError::Skip {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            if target.is_dir() {
                return Ok(0);
            }
        }

        self.queue_file(path)
    }

    fn queue_directory(&self, dir: &Path) -> Result<usize, ScanError> {
        let mut count = 0;
        let entries = fs::read_dir(dir).map_err(|e| ScanError::Skip {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| ScanError::Skip {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
            count += self.queue_path(&entry.path())?;
        }
        Ok(count)
    }

    fn queue_file(&self, path: &Path) -> Result<usize, ScanError> {
        match try_open_zip(path) {
            Ok(Some(members)) => {
                let count = members.len();
                for name in members {
                    self.sender
                        .send(WorkItem::zip_member(path.to_path_buf(), name))
                        .map_err(|_| ScanError::Internal("work queue closed".into()))?;
                }
                Ok(count)
            }
            Ok(None) => {
                self.sender
                    .send(WorkItem::plain(path.to_path_buf()))
                    .map_err(|_| ScanError::Internal("work queue closed".into()))?;
                Ok(1)
            }
            Err(e) => Err(e),
        }
    }
}

/// `true` if any path component (other than `.`/`..`) begins with `.`.
fn is_hidden(path: &Path) -> bool {
    path.components().any(|c| match c {
        std::path::Component::Normal(name) => name
            .to_str()
            .map(|s| s.starts_with('.') && s != "." && s != "..")
            .unwrap_or(false),
        _ => false,
    })
}

/// Attempts to open `path` as a zip archive. Returns `Ok(None)` if the file
/// is not a zip (so the caller should treat it as a plain file), `Ok(Some(..))`
/// with the list of member names on success, and `Err` only for a genuine
/// zip-format error other than "this isn't a zip".
fn try_open_zip(path: &Path) -> Result<Option<Vec<String>>, ScanError> {
    let file = fs::File::open(path).map_err(|e| ScanError::Skip {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    match zip::ZipArchive::new(file) {
        Ok(archive) => {
            let names = archive.file_names().map(|s| s.to_string()).collect();
            Ok(Some(names))
        }
        Err(zip::result::ZipError::InvalidArchive(_)) => Ok(None),
        Err(e) => Err(ScanError::FatalParse {
            path: path.to_path_buf(),
            reason: format!("zip enumeration failed: {e}"),
        }),
    }
}
