//! The two media download passes.
//!
//! Pass 1 drains `filesToDownload`; failures spill into `filesToRetry`.
//! Pass 2 drains the retry queue and is strictly sequenced after pass 1;
//! its failures are terminal for the file.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::archive::ArchiveEntry;
use crate::error::Result;
use crate::store::FileTask;

use super::{Scraper, status};

/// Worker multiplier for the file queue.
const FILE_POOL_FACTOR: usize = 5;

pub(super) async fn download_files(scraper: &Scraper) -> Result<()> {
    let workers = scraper.config().speed() * FILE_POOL_FACTOR;

    let total = scraper.stores().files_to_download.len();
    let done = AtomicUsize::new(0);
    log::info!("downloading {total} files with {workers} workers");
    scraper
        .stores()
        .files_to_download
        .iterate(workers, |path, task| {
            let done = &done;
            async move {
                match fetch_and_store(scraper, &task).await {
                    Ok(()) => scraper.status().file_success(),
                    Err(e) => {
                        log::warn!("file {path} failed, queuing for retry: {e}");
                        scraper.stores().files_to_retry.set(path, task);
                    }
                }
                let k = done.fetch_add(1, Ordering::Relaxed) + 1;
                status::report_progress("files", k, total, 50);
            }
        })
        .await;
    scraper.check_writer()?;

    let retries = scraper.stores().files_to_retry.len();
    if retries > 0 {
        log::info!("retrying {retries} failed files");
        scraper
            .stores()
            .files_to_retry
            .iterate(workers, |path, task| async move {
                match fetch_and_store(scraper, &task).await {
                    Ok(()) => {
                        scraper.status().file_success();
                        scraper.stores().files_to_retry.delete(&path);
                    }
                    Err(e) => {
                        scraper.status().file_fail();
                        log::error!("file {path} failed permanently: {e}");
                    }
                }
            })
            .await;
        scraper.check_writer()?;
    }
    Ok(())
}

async fn fetch_and_store(scraper: &Scraper, task: &FileTask) -> Result<()> {
    let (bytes, headers) = scraper.downloader().download_content(&task.url).await?;
    let mime = headers
        .get("content-type")
        .cloned()
        .unwrap_or_else(|| guess_mime(&task.path).to_string());
    let entry = ArchiveEntry::binary(task.namespace, task.path.clone(), mime, bytes);
    if let Err(e) = scraper.writer().add_entry(entry).await {
        scraper.record_writer_failure(&e);
        return Err(crate::error::ScrapeError::Fatal(format!(
            "archive write failed for {}",
            task.path
        )));
    }
    Ok(())
}

fn guess_mime(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    match lower.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("webm") => "video/webm",
        Some("ogg" | "ogv") => "video/ogg",
        Some("mp4") => "video/mp4",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}
