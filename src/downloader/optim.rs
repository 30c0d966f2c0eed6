//! Best-effort bitmap optimisation through external binaries.
//!
//! The fixed pipeline is: lossy PNG quantisation (`pngquant`) followed by
//! `advpng` re-compression, `jpegoptim` for JPEG, `gifsicle` for GIF. Each
//! binary is discovered once at startup; a missing binary downgrades its
//! stage to a pass-through.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::utils::constants::BITMAP_CONTENT_TYPE_RE;

pub struct ImageOptimizer {
    pngquant: Option<PathBuf>,
    advpng: Option<PathBuf>,
    jpegoptim: Option<PathBuf>,
    gifsicle: Option<PathBuf>,
}

impl ImageOptimizer {
    /// Locate the optimisation binaries on `PATH`.
    #[must_use]
    pub fn discover() -> Self {
        let find = |name: &str| match which::which(name) {
            Ok(path) => Some(path),
            Err(_) => {
                log::info!("{name} not found; {name} optimisation disabled");
                None
            }
        };
        Self {
            pngquant: find("pngquant"),
            advpng: find("advpng"),
            jpegoptim: find("jpegoptim"),
            gifsicle: find("gifsicle"),
        }
    }

    /// Optimiser with every stage disabled (tests, `nozim` dry runs).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            pngquant: None,
            advpng: None,
            jpegoptim: None,
            gifsicle: None,
        }
    }

    /// Whether this content type goes through the pipeline at all.
    #[must_use]
    pub fn handles(content_type: &str) -> bool {
        BITMAP_CONTENT_TYPE_RE.is_match(content_type)
    }

    /// Run `bytes` through the stages for its content type. Any stage
    /// failure falls back to the stage input.
    pub async fn optimise(&self, content_type: &str, bytes: Vec<u8>) -> Vec<u8> {
        let ct = content_type.to_ascii_lowercase();
        if ct.starts_with("image/png") {
            let quantised = self.run_pngquant(&bytes).await.unwrap_or(bytes);
            self.run_in_place(&self.advpng, &["-z", "-4"], &quantised)
                .await
                .unwrap_or(quantised)
        } else if ct.starts_with("image/jpeg") || ct.starts_with("image/jpg") {
            self.run_in_place(&self.jpegoptim, &["-m60", "--strip-all"], &bytes)
                .await
                .unwrap_or(bytes)
        } else if ct.starts_with("image/gif") {
            self.run_gifsicle(&bytes).await.unwrap_or(bytes)
        } else {
            bytes
        }
    }

    async fn run_pngquant(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        let binary = self.pngquant.as_ref()?;
        let scratch = write_scratch(bytes).await?;
        let output = scratch.path().with_extension("out.png");
        let ok = run_quiet(
            binary,
            &[
                "--speed",
                "3",
                "--strip",
                "--quality",
                "30-50",
                "--force",
                "--output",
                output.to_str()?,
                scratch.path().to_str()?,
            ],
        )
        .await;
        let result = if ok {
            tokio::fs::read(&output).await.ok()
        } else {
            None
        };
        let _ = tokio::fs::remove_file(&output).await;
        result
    }

    async fn run_gifsicle(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        let binary = self.gifsicle.as_ref()?;
        let scratch = write_scratch(bytes).await?;
        let output = scratch.path().with_extension("out.gif");
        let ok = run_quiet(
            binary,
            &[
                "-O3",
                scratch.path().to_str()?,
                "-o",
                output.to_str()?,
            ],
        )
        .await;
        let result = if ok {
            tokio::fs::read(&output).await.ok()
        } else {
            None
        };
        let _ = tokio::fs::remove_file(&output).await;
        result
    }

    /// Stages that rewrite their input file in place.
    async fn run_in_place(
        &self,
        binary: &Option<PathBuf>,
        args: &[&str],
        bytes: &[u8],
    ) -> Option<Vec<u8>> {
        let binary = binary.as_ref()?;
        let scratch = write_scratch(bytes).await?;
        let mut full_args: Vec<&str> = args.to_vec();
        let path_str = scratch.path().to_str()?;
        full_args.push(path_str);
        if run_quiet(binary, &full_args).await {
            tokio::fs::read(scratch.path()).await.ok()
        } else {
            None
        }
    }
}

async fn write_scratch(bytes: &[u8]) -> Option<tempfile::NamedTempFile> {
    let scratch = tempfile::NamedTempFile::new().ok()?;
    tokio::fs::write(scratch.path(), bytes).await.ok()?;
    Some(scratch)
}

async fn run_quiet(binary: &Path, args: &[&str]) -> bool {
    match Command::new(binary)
        .args(args)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(e) => {
            log::warn!("optimiser {} failed to spawn: {e}", binary.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_detection() {
        assert!(ImageOptimizer::handles("image/png"));
        assert!(ImageOptimizer::handles("image/JPEG"));
        assert!(ImageOptimizer::handles("image/gif"));
        assert!(!ImageOptimizer::handles("image/svg+xml"));
        assert!(!ImageOptimizer::handles("text/html"));
    }

    #[tokio::test]
    async fn disabled_optimiser_passes_through() {
        let optimizer = ImageOptimizer::disabled();
        let bytes = vec![1, 2, 3, 4];
        let out = optimizer.optimise("image/png", bytes.clone()).await;
        assert_eq!(out, bytes);
    }
}
