//! A periodic, live-updated progress bar with a rolling-window ETA.
//!
//! This is deliberately hand-rolled rather than wrapping an existing
//! progress-bar crate: the rolling Welford statistics and the specific
//! rounding rules below are part of what this repository specifies, not
//! ambient scaffolding.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_secs(1);
const WINDOW: usize = 30;
const MIN_SAMPLES_FOR_ETA: usize = 11;

/// Incrementally-maintained mean/variance over the last `WINDOW` per-second
/// deltas (Welford's algorithm over a fixed-size ring buffer).
#[derive(Default)]
struct RollingStats {
    samples: Vec<f64>,
    cursor: usize,
    filled: usize,
    mean: f64,
    m2: f64,
}

impl RollingStats {
    fn new() -> Self {
        RollingStats {
            samples: vec![0.0; WINDOW],
            cursor: 0,
            filled: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Pushes a new delta, evicting the oldest sample once the window is full.
    fn push(&mut self, value: f64) {
        if self.filled < WINDOW {
            self.filled += 1;
            let n = self.filled as f64;
            let delta = value - self.mean;
            self.mean += delta / n;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        } else {
            // Window is full: recompute mean/variance from scratch after the
            // oldest sample is evicted. O(WINDOW), cheap since WINDOW is a
            // small constant.
            let n = WINDOW as f64;
            self.samples[self.cursor] = value;
            let mean: f64 = self.samples.iter().sum::<f64>() / n;
            let m2: f64 = self.samples.iter().map(|v| (v - mean).powi(2)).sum();
            self.mean = mean;
            self.m2 = m2;
            self.cursor = (self.cursor + 1) % WINDOW;
            return;
        }
        self.samples[self.cursor] = value;
        self.cursor = (self.cursor + 1) % WINDOW;
    }

    fn count(&self) -> usize {
        self.filled
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn stddev(&self) -> f64 {
        if self.filled < 2 {
            0.0
        } else {
            (self.m2 / (self.filled as f64 - 1.0)).sqrt()
        }
    }
}

/// Shared counters, polled by the ticking thread and mutated by producers.
struct Shared {
    total: AtomicU64,
    completed: AtomicU64,
}

/// Operations common to the live and silent progress reporters.
pub trait Progress: Send + Sync {
    fn total(&self, n: u64);
    fn total_incr(&self, by: u64);
    fn completed(&self, n: u64);
    fn completed_incr(&self, by: u64);
}

/// A scoped, ticking progress bar. Printing a banner on construction and a
/// trailing newline on `Drop`; `run()` spawns the ticking thread.
pub struct LiveProgress {
    shared: Arc<Shared>,
    stop: Arc<std::sync::atomic::AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    label: String,
}

impl LiveProgress {
    pub fn new(label: &str) -> Self {
        eprintln!("{label}...");
        LiveProgress {
            shared: Arc::new(Shared {
                total: AtomicU64::new(0),
                completed: AtomicU64::new(0),
            }),
            stop: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            handle: Mutex::new(None),
            label: label.to_string(),
        }
    }

    /// Arms the periodic redraw on a dedicated helper thread. The thread
    /// sleeps `TICK` between updates and only redraws if the completed count
    /// changed since the last tick.
    pub fn run(&self) {
        let shared = Arc::clone(&self.shared);
        let stop = Arc::clone(&self.stop);
        let label = self.label.clone();
        let handle = std::thread::spawn(move || {
            let mut stats = RollingStats::new();
            let mut last_completed = shared.completed.load(Ordering::Relaxed);
            let mut last_tick = Instant::now();
            while !stop.load(Ordering::Relaxed) {
                std::thread::sleep(TICK);
                let now = Instant::now();
                let elapsed = now.duration_since(last_tick).as_secs_f64().max(1e-9);
                last_tick = now;

                let completed = shared.completed.load(Ordering::Relaxed);
                let total = shared.total.load(Ordering::Relaxed);
                if completed == last_completed {
                    continue;
                }
                let delta = (completed - last_completed) as f64 / elapsed;
                stats.push(delta);
                last_completed = completed;

                let eta = eta_string(&stats, total, completed);
                eprint!(
                    "\r{label}: {completed}/{total}{eta}          ",
                    eta = eta.map(|e| format!(" ETA {e}")).unwrap_or_default()
                );
                let _ = std::io::stderr().flush();
            }
        });
        *self.handle.lock().unwrap() = Some(handle);
    }
}

impl Progress for LiveProgress {
    fn total(&self, n: u64) {
        self.shared.total.store(n, Ordering::Relaxed);
    }
    fn total_incr(&self, by: u64) {
        self.shared.total.fetch_add(by, Ordering::Relaxed);
    }
    fn completed(&self, n: u64) {
        self.shared.completed.store(n, Ordering::Relaxed);
    }
    fn completed_incr(&self, by: u64) {
        self.shared.completed.fetch_add(by, Ordering::Relaxed);
    }
}

impl Drop for LiveProgress {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        eprintln!();
    }
}

/// Computes the ETA string, if the rolling statistics are confident enough to
/// show one: at least 11 samples, mean >= 1/s, and stddev < mean.
fn eta_string(stats: &RollingStats, total: u64, completed: u64) -> Option<String> {
    if stats.count() <= MIN_SAMPLES_FOR_ETA - 1 {
        return None;
    }
    let mean = stats.mean();
    if mean < 1.0 {
        return None;
    }
    let stddev = stats.stddev();
    if !(stddev < mean) {
        return None;
    }
    if completed >= total {
        return Some("0s".to_string());
    }
    let remaining_items = (total - completed) as f64;
    let remaining_seconds = remaining_items / mean;
    Some(human_time(remaining_seconds))
}

/// Renders a duration in seconds with the rounding rule: whole seconds below
/// 2 minutes, whole minutes (half-up at the 30s boundary) above.
fn human_time(seconds: f64) -> String {
    if seconds < 120.0 {
        format!("{}s", seconds.round() as u64)
    } else {
        let minutes = (seconds / 60.0 + 0.5).floor() as u64;
        format!("{}m", minutes)
    }
}

/// A no-op progress reporter satisfying the same interface, used for
/// `--quiet` and non-TTY output sinks.
pub struct SilentProgress;

impl Progress for SilentProgress {
    fn total(&self, _n: u64) {}
    fn total_incr(&self, _by: u64) {}
    fn completed(&self, _n: u64) {}
    fn completed_incr(&self, _by: u64) {}
}
