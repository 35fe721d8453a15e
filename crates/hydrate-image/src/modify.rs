//! In-place mutation of a layout's top layer.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::info;

use crate::digest::Digest;
use crate::error::{ImageError, Result};
use crate::layout::OciDirectory;
use crate::manifest::{Descriptor, ANNOTATION_LAYER_ADDED, MEDIA_TYPE_LAYER_GZIP};
use crate::verify;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Adds and removes the top layer of an existing image layout.
pub struct LayerModifier<D> {
    directory: D,
}

impl<D: OciDirectory> LayerModifier<D> {
    /// Creates a modifier over an OCI directory.
    #[must_use]
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    /// Appends a gzipped layer tarball to the layout and marks the manifest
    /// with the `hydrator.layerAdded` annotation.
    ///
    /// # Errors
    ///
    /// Rejects files without gzip framing; propagates layout failures.
    pub fn add_layer(&self, layer_tgz: &Path) -> Result<()> {
        let (descriptor, diff_id) = layer_descriptor(layer_tgz)?;
        info!(
            digest = %descriptor.digest,
            diff_id = %diff_id,
            size = descriptor.size,
            "adding layer"
        );

        self.directory.add_blob(layer_tgz, &descriptor)?;

        let (manifest, config) = self.directory.read_metadata()?;
        self.directory.clear_metadata()?;

        let mut layers = manifest.layers;
        layers.push(descriptor);
        let mut diff_ids = config.rootfs.diff_ids;
        diff_ids.push(diff_id);

        self.directory.write_metadata(&layers, &diff_ids, true)
    }

    /// Removes the top layer if one was added in place; a layout without
    /// the `hydrator.layerAdded` annotation is left untouched.
    ///
    /// The annotation is a single-bit marker, not a counter: after two
    /// added layers a single call removes only the topmost one and the
    /// marker stays set.
    ///
    /// # Errors
    ///
    /// Propagates layout failures.
    pub fn remove_top_layer(&self) -> Result<()> {
        let (manifest, config) = self.directory.read_metadata()?;
        if !manifest.annotations.contains_key(ANNOTATION_LAYER_ADDED) {
            return Ok(());
        }
        let Some(top) = manifest.layers.last() else {
            return Ok(());
        };
        info!(digest = %top.digest, "removing top layer");

        self.directory.clear_metadata()?;
        self.directory.remove_top_blob(top.digest.encoded())?;

        let layers = &manifest.layers[..manifest.layers.len() - 1];
        let diff_ids = &config.rootfs.diff_ids[..config.rootfs.diff_ids.len() - 1];
        self.directory.write_metadata(layers, diff_ids, false)
    }
}

/// Computes the descriptor (compressed digest and size) and diff ID
/// (uncompressed digest) of a gzipped layer tarball.
fn layer_descriptor(path: &Path) -> Result<(Descriptor, Digest)> {
    let mut file = File::open(path)?;

    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) if magic == GZIP_MAGIC => {}
        Ok(()) => {
            return Err(ImageError::NotGzipped {
                path: path.display().to_string(),
            })
        }
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
            return Err(ImageError::NotGzipped {
                path: path.display().to_string(),
            })
        }
        Err(err) => return Err(err.into()),
    }

    #[allow(clippy::cast_possible_wrap)]
    let size = file.metadata()?.len() as i64;

    file.seek(SeekFrom::Start(0))?;
    let compressed_sha = verify::sha256_reader(&mut file)?;

    file.seek(SeekFrom::Start(0))?;
    let diff_sha = verify::sha256_reader(GzDecoder::new(file))?;

    Ok((
        Descriptor::new(MEDIA_TYPE_LAYER_GZIP, Digest::sha256(&compressed_sha), size),
        Digest::sha256(&diff_sha),
    ))
}
