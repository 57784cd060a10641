//! Bounded worker pool for parallel segment transfers.
//!
//! Workers pull items from a shared queue so at most `workers` connections
//! run at once. The first failure raises a shared stop flag so remaining
//! queued work is skipped (in-flight transfers finish or abort on their own);
//! cancellation stops the pool the same way.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use crate::control::CancelToken;
use crate::retry::SegmentError;

pub(crate) type SegmentResult = Result<(), SegmentError>;

/// Runs `f` over `items` on up to `workers` threads. Returns one result per
/// item that was actually attempted; items skipped due to an earlier failure
/// or cancellation are absent.
pub(crate) fn run_pool<T, F>(
    items: Vec<(usize, T)>,
    workers: usize,
    cancel: &CancelToken,
    f: F,
) -> Vec<(usize, SegmentResult)>
where
    T: Send + 'static,
    F: Fn(usize, &T) -> SegmentResult + Send + Sync + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let queue: Arc<Mutex<VecDeque<(usize, T)>>> = Arc::new(Mutex::new(items.into()));
    let f = Arc::new(f);
    let failed = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let worker_count = workers.min(total).max(1);
    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let queue = Arc::clone(&queue);
        let f = Arc::clone(&f);
        let failed = Arc::clone(&failed);
        let tx = tx.clone();
        let cancel = cancel.clone();
        handles.push(std::thread::spawn(move || loop {
            if cancel.is_cancelled() || failed.load(Ordering::Relaxed) {
                break;
            }
            let Some((index, item)) = queue.lock().unwrap().pop_front() else {
                break;
            };
            let res = f(index, &item);
            if res.is_err() {
                failed.store(true, Ordering::Relaxed);
            }
            if tx.send((index, res)).is_err() {
                break;
            }
        }));
    }
    drop(tx);

    let results: Vec<(usize, SegmentResult)> = rx.iter().collect();
    for h in handles {
        let _ = h.join();
    }
    results
}
