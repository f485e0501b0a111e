//! The unit of work handed from the walker to the worker pool.

use std::path::PathBuf;

/// Identifies either a plain file on disk, or one member of a zip archive.
///
/// Owned by the producer-side pool until the queue drains; referenced by
/// exactly one consumer. `real_path` is always a path that exists on disk;
/// `member_name` is empty for a plain file and the inner zip entry name
/// otherwise.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub real_path: PathBuf,
    pub member_name: String,
    pub display_path: String,
}

impl WorkItem {
    pub fn plain(path: PathBuf) -> Self {
        let display_path = path.display().to_string();
        WorkItem {
            real_path: path,
            member_name: String::new(),
            display_path,
        }
    }

    pub fn zip_member(zip_file: PathBuf, inner_name: String) -> Self {
        let display_path = format!("{}/{}", zip_file.display(), inner_name);
        WorkItem {
            real_path: zip_file,
            member_name: inner_name,
            display_path,
        }
    }

    pub fn is_zip_member(&self) -> bool {
        !self.member_name.is_empty()
    }
}
