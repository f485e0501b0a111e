//! The scanner driver (§4.5, §4.12): a bounded pool of OS threads draining a
//! work queue, escalating the first fatal error to every sibling worker.
//!
//! Modeled on the corpus's channel-fed `rayon::in_place_scope` worker pool
//! (a thread pool that consumes a channel rather than `rayon`'s own work
//! splitting, since items arrive from a producer that is still walking the
//! filesystem while consumers are already draining the queue).

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Receiver;

use crate::error::ScanError;
use crate::progress::Progress;

/// Runs `process` over every item received from `items`, using `num_threads`
/// worker threads. Returns `true` if every item was either processed or
/// locally skipped; `false` if some worker hit a fatal error (in which case
/// the shared flag has already stopped the remaining workers and the caller
/// must suppress any result output).
pub fn drive<T, F>(
    num_threads: usize,
    items: Receiver<T>,
    progress: &dyn Progress,
    process: F,
) -> bool
where
    T: Send,
    F: Fn(T) -> Result<(), ScanError> + Sync,
{
    let num_threads = num_threads.max(1);
    let error = AtomicBool::new(false);
    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("failed to build worker pool: {e}");
            return false;
        }
    };

    pool.in_place_scope(|scope| {
        for _ in 0..num_threads {
            let items = items.clone();
            let process = &process;
            let error = &error;
            scope.spawn(move |_| {
                loop {
                    if error.load(Ordering::Relaxed) {
                        return; // Faulted elsewhere: Popping -> (stop)
                    }
                    match items.recv() {
                        Ok(item) => match process(item) {
                            Ok(()) => progress.completed_incr(1),
                            Err(e) if e.is_skip() => {
                                log::warn!("{e}");
                                progress.completed_incr(1);
                            }
                            Err(e) => {
                                log::error!("{e}");
                                error.store(true, Ordering::Relaxed);
                                return; // Processing -> Faulted
                            }
                        },
                        Err(_) => return, // queue drained: Popping -> Drained
                    }
                }
            });
        }
    });

    !error.load(Ordering::Relaxed)
}
