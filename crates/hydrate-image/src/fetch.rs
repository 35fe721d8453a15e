//! Image fetch orchestration.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::download::Downloader;
use crate::error::{ImageError, Result};
use crate::layout::{LayoutStore, OciDirectory as _};
use crate::package;
use crate::registry::{RegistryClient, RegistryParams};

/// Downloads an image from a registry into an OCI layout on disk,
/// optionally packaged as a tarball.
pub struct ImageFetcher {
    out_dir: PathBuf,
    image: String,
    tag: String,
    params: RegistryParams,
    no_tarball: bool,
}

impl ImageFetcher {
    /// Creates a fetcher for one image and tag.
    #[must_use]
    pub fn new(
        out_dir: impl Into<PathBuf>,
        image: impl Into<String>,
        tag: impl Into<String>,
        params: RegistryParams,
        no_tarball: bool,
    ) -> Self {
        Self {
            out_dir: out_dir.into(),
            image: image.into(),
            tag: tag.into(),
            params,
            no_tarball,
        }
    }

    /// Downloads the image and writes the layout.
    ///
    /// With tarball output enabled the layout is assembled in a scoped temp
    /// directory (removed on every exit path) and packaged to
    /// `{name}-{tag}.tgz` in the output directory; otherwise the layout is
    /// written directly into the output directory.
    ///
    /// # Errors
    ///
    /// Propagates download and layout failures; tarball packaging requires
    /// the image name to be of the form `namespace/name`
    /// ([`ImageError::InvalidImageName`]).
    pub async fn run(&self) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;

        // The guard keeps the temp dir alive until the tarball is written.
        let mut tmp_guard = None;
        let download_dir = if self.no_tarball {
            self.out_dir.clone()
        } else {
            let tmp = tempfile::Builder::new().prefix("hydrate").tempdir()?;
            let path = tmp.path().to_path_buf();
            tmp_guard = Some(tmp);
            path
        };

        let blob_dir = download_dir.join("blobs").join("sha256");
        fs::create_dir_all(&blob_dir)?;

        info!(
            image = %self.image,
            tag = %self.tag,
            registry = %self.params.registry_url,
            "downloading image"
        );

        let registry = RegistryClient::new(self.params.clone(), &self.image, &self.tag);
        let downloader = Downloader::new(&blob_dir, Arc::new(registry));
        let (layers, diff_ids) = downloader.run().await?;

        LayoutStore::new(&download_dir).write_metadata(&layers, &diff_ids, false)?;
        info!("all layers downloaded");

        if !self.no_tarball {
            let out_file = self
                .out_dir
                .join(format!("{}-{}.tgz", image_leaf(&self.image)?, self.tag));
            info!(archive = %out_file.display(), "writing tarball");
            package::write_tgz(&download_dir, &out_file)?;
            info!("done");
        }

        drop(tmp_guard);
        Ok(())
    }
}

/// The `name` part of a `namespace/name` image reference.
fn image_leaf(image: &str) -> Result<&str> {
    let mut parts = image.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(namespace), Some(name), None) if !namespace.is_empty() && !name.is_empty() => {
            Ok(name)
        }
        _ => Err(ImageError::InvalidImageName),
    }
}
