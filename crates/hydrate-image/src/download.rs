//! Concurrent layer downloading with bounded retry.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::digest::Digest;
use crate::error::{ImageError, Result};
use crate::manifest::{Descriptor, MEDIA_TYPE_LAYER_GZIP};
use crate::registry::Registry;

/// Maximum download attempts per layer.
const MAX_ATTEMPTS: u32 = 5;

/// First 8 hex characters, the form used in log lines.
fn short_hex(hex: &str) -> &str {
    &hex[..8.min(hex.len())]
}

/// Downloads all of an image's layers into a blob directory.
pub struct Downloader {
    /// Directory layer blobs are written into.
    blob_dir: PathBuf,
    /// Registry the manifest, config, and layers come from.
    registry: Arc<dyn Registry>,
}

impl Downloader {
    /// Creates a downloader writing into `blob_dir`.
    #[must_use]
    pub fn new(blob_dir: impl Into<PathBuf>, registry: Arc<dyn Registry>) -> Self {
        Self {
            blob_dir: blob_dir.into(),
            registry,
        }
    }

    /// Fetches the manifest and config, validates them, and downloads every
    /// layer concurrently.
    ///
    /// Returns the layer descriptors in manifest order, rewritten to the
    /// canonical gzip layer media type, and the config's diff IDs in their
    /// original order. Each layer is retried up to five times with a linear
    /// back-off; the first layer to exhaust its retries fails the whole run
    /// (in-flight downloads finish detached and their output is discarded
    /// with the surrounding directory).
    ///
    /// # Errors
    ///
    /// Propagates manifest and config failures; rejects non-windows/amd64
    /// configs and layer/diff-ID count mismatches; returns
    /// [`ImageError::MaxLayerDownloadRetries`] when a layer fails five
    /// consecutive attempts.
    pub async fn run(&self) -> Result<(Vec<Descriptor>, Vec<Digest>)> {
        let manifest = self.registry.manifest().await?;
        let config = self.registry.config(&manifest.config).await?;

        if config.os != "windows" {
            return Err(ImageError::InvalidOs { os: config.os });
        }
        if config.architecture != "amd64" {
            return Err(ImageError::InvalidArch {
                architecture: config.architecture,
            });
        }

        let diff_ids = config.rootfs.diff_ids;
        if manifest.layers.len() != diff_ids.len() {
            return Err(ImageError::LayerDiffIdMismatch {
                layers: manifest.layers.len(),
                diff_ids: diff_ids.len(),
            });
        }

        info!(layers = manifest.layers.len(), "downloading layers");

        // One-slot channel: only the first exhausted layer reports.
        let (err_tx, mut err_rx) = mpsc::channel::<ImageError>(1);
        let mut tasks = Vec::with_capacity(manifest.layers.len());
        let mut downloaded = Vec::with_capacity(manifest.layers.len());

        for (layer, diff_id) in manifest.layers.iter().zip(&diff_ids) {
            downloaded.push(Descriptor::new(
                MEDIA_TYPE_LAYER_GZIP,
                layer.digest.clone(),
                layer.size,
            ));

            let registry = Arc::clone(&self.registry);
            let blob_dir = self.blob_dir.clone();
            let err_tx = err_tx.clone();
            let layer = layer.clone();
            let diff_id = diff_id.clone();

            tasks.push(tokio::spawn(async move {
                debug!(
                    diff_id = short_hex(diff_id.encoded()),
                    sha256 = short_hex(layer.digest.encoded()),
                    "layer download begin"
                );

                let mut attempt: u32 = 0;
                loop {
                    attempt += 1;
                    match registry.download_layer(&layer, &blob_dir).await {
                        Ok(()) => {
                            debug!(
                                diff_id = short_hex(diff_id.encoded()),
                                sha256 = short_hex(layer.digest.encoded()),
                                "layer download end"
                            );
                            break;
                        }
                        Err(err) => {
                            warn!(
                                attempt,
                                diff_id = short_hex(diff_id.encoded()),
                                sha256 = short_hex(layer.digest.encoded()),
                                error = %err,
                                "failed downloading layer"
                            );
                            if attempt >= MAX_ATTEMPTS {
                                let _ = err_tx.try_send(ImageError::MaxLayerDownloadRetries {
                                    diff_id: diff_id.encoded().to_string(),
                                    sha256: layer.digest.encoded().to_string(),
                                });
                                break;
                            }
                            tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                        }
                    }
                }
            }));
        }
        drop(err_tx);

        let all_done = future::join_all(tasks);
        tokio::select! {
            _ = all_done => {
                // A task that exhausted its retries just before the last
                // task finished may have parked its error without winning
                // the select.
                if let Ok(err) = err_rx.try_recv() {
                    return Err(err);
                }
            }
            Some(err) = err_rx.recv() => return Err(err),
        }

        Ok((downloaded, diff_ids))
    }
}
