//! Process-lifetime scratch directory for extracted archive/zip members.
//!
//! Lifecycle: `Unborn -> Live (first request) -> Removed (process exit)`. The
//! first request is serialised behind a `Mutex`; subsequent name generation
//! only needs a locked counter increment, since the directory path itself is
//! immutable once created.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use rand::Rng as _;
use tempfile::TempDir;

static SCRATCH: OnceLock<Mutex<Option<TempDir>>> = OnceLock::new();
static COUNTER: AtomicU64 = AtomicU64::new(0);

fn scratch_dir() -> std::io::Result<PathBuf> {
    let cell = SCRATCH.get_or_init(|| Mutex::new(None));
    let mut guard = cell.lock().unwrap();
    if guard.is_none() {
        let suffix = random_hex_segment();
        let dir = tempfile::Builder::new()
            .prefix(&format!("scan-{suffix}-"))
            .tempdir()?;
        *guard = Some(dir);
    }
    Ok(guard.as_ref().unwrap().path().to_path_buf())
}

fn random_hex_segment() -> String {
    let mut rng = rand::thread_rng();
    (0..4)
        .map(|_| format!("{:02x}", rng.gen::<u8>()))
        .collect()
}

/// A single scoped temporary file inside the process scratch directory.
/// Deleted on `Drop`, on both the success and error paths.
pub struct ScopedTempFile {
    path: PathBuf,
}

impl ScopedTempFile {
    /// Creates a new scratch file with a monotonically-numbered name and
    /// writes `contents` to it.
    pub fn create(contents: &[u8]) -> std::io::Result<Self> {
        let dir = scratch_dir()?;
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("member-{id:010}"));
        std::fs::write(&path, contents)?;
        Ok(ScopedTempFile { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedTempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Removes the process scratch directory (and anything still in it)
/// recursively, if one was ever created.
///
/// `SCRATCH` is a `static`, and Rust never runs a `static`'s `Drop` at normal
/// process exit, so the `TempDir` inside it would otherwise leak its
/// directory on every run. Call this once, late in `main`, after the worker
/// pool has finished using the scratch directory.
fn cleanup() {
    if let Some(cell) = SCRATCH.get() {
        if let Ok(mut guard) = cell.lock() {
            guard.take();
        }
    }
}

/// An RAII handle that removes the process scratch directory when dropped.
/// Hold one in `main`'s own scope so cleanup runs on every return path,
/// including early returns via `?`.
#[must_use]
pub struct ScratchGuard(());

impl ScratchGuard {
    pub fn new() -> Self {
        ScratchGuard(())
    }
}

impl Default for ScratchGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        cleanup();
    }
}
