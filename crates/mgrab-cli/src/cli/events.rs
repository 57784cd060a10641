//! Console event sink: status lines per stage and coarse upload progress.

use std::sync::Mutex;

use mgrab_core::batch::{EventSink, ProgressEvent, Stage};

/// Prints one line per stage change and upload progress in ~10% steps.
pub struct ConsoleEvents {
    last_percent: Mutex<u64>,
}

impl ConsoleEvents {
    pub fn new() -> Self {
        Self {
            last_percent: Mutex::new(0),
        }
    }
}

impl EventSink for ConsoleEvents {
    fn status(&self, job_index: usize, total: usize, stage: Stage) {
        if stage == Stage::Resolving {
            *self.last_percent.lock().unwrap() = 0;
        }
        println!("[{}/{}] {}", job_index + 1, total, stage);
    }

    fn progress(&self, event: &ProgressEvent) {
        if event.total == 0 {
            return;
        }
        let percent = event.current * 100 / event.total;
        let mut last = self.last_percent.lock().unwrap();
        if percent >= *last + 10 || percent == 100 {
            *last = percent;
            println!(
                "[{}] {}: {}% ({}/{} bytes)",
                event.job_index + 1,
                event.stage,
                percent,
                event.current,
                event.total
            );
        }
    }

    fn job_done(&self, job_index: usize, total: usize) {
        println!("[{}/{}] done", job_index + 1, total);
    }

    fn job_failed(&self, job_index: usize, total: usize, reason: &str) {
        println!("[{}/{}] failed: {}", job_index + 1, total, reason);
    }
}
