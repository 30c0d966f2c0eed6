//! Run counters and progress reporting.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Success/failure counters, incremented atomically by workers. Values are
/// monotonically non-decreasing; reads only feed progress logging and the
/// final summary.
#[derive(Debug, Default)]
pub struct ScrapeStatus {
    articles_success: AtomicUsize,
    articles_fail: AtomicUsize,
    files_success: AtomicUsize,
    files_fail: AtomicUsize,
}

impl ScrapeStatus {
    pub fn article_success(&self) {
        self.articles_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn article_fail(&self) {
        self.articles_fail.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_success(&self) {
        self.files_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_fail(&self) {
        self.files_fail.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn articles(&self) -> (usize, usize) {
        (
            self.articles_success.load(Ordering::Relaxed),
            self.articles_fail.load(Ordering::Relaxed),
        )
    }

    #[must_use]
    pub fn files(&self) -> (usize, usize) {
        (
            self.files_success.load(Ordering::Relaxed),
            self.files_fail.load(Ordering::Relaxed),
        )
    }
}

/// Emit a `[k/N] [p%]` progress line every `step` completions.
pub fn report_progress(what: &str, done: usize, total: usize, step: usize) {
    if total == 0 || (done % step.max(1) != 0 && done != total) {
        return;
    }
    let percent = done * 100 / total;
    log::info!("{what}: [{done}/{total}] [{percent}%]");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let status = ScrapeStatus::default();
        status.article_success();
        status.article_success();
        status.article_fail();
        status.file_success();
        assert_eq!(status.articles(), (2, 1));
        assert_eq!(status.files(), (1, 0));
    }
}
