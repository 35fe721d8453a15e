//! On-disk OCI Image Layout storage.
//!
//! Layout owned by [`LayoutStore`]:
//!
//! ```text
//! <root>/
//! ├── oci-layout              {"imageLayoutVersion":"1.0.0"}
//! ├── index.json              single-entry image index
//! └── blobs/
//!     └── sha256/
//!         └── <hex>           manifest, config, and layer blobs
//! ```
//!
//! Metadata is serialized with a fixed field order and key-sorted maps, so
//! identical inputs always produce identical manifest and config digests.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::digest::Digest;
use crate::error::{ImageError, Result};
use crate::manifest::{
    self, Descriptor, ImageConfig, Index, Manifest, OciLayout, Platform,
};
use crate::verify;

/// Capability set the layout mutation flows depend on.
///
/// [`LayoutStore`] is the filesystem-backed implementation; tests drive the
/// flows with in-memory fakes.
pub trait OciDirectory {
    /// Copies a blob file into the layout under its digest.
    fn add_blob(&self, src: &Path, descriptor: &Descriptor) -> Result<()>;

    /// Unlinks the blob with the given hex digest.
    fn remove_top_blob(&self, sha256: &str) -> Result<()>;

    /// Loads and fully validates the layout's manifest and image config.
    fn read_metadata(&self) -> Result<(Manifest, ImageConfig)>;

    /// Deletes the metadata files, leaving layer blobs in place.
    fn clear_metadata(&self) -> Result<()>;

    /// Regenerates config, manifest, index, and layout marker.
    fn write_metadata(
        &self,
        layers: &[Descriptor],
        diff_ids: &[Digest],
        layer_added: bool,
    ) -> Result<()>;
}

/// Filesystem-backed OCI image layout.
///
/// Single-owner: callers must not operate on the same directory
/// concurrently.
pub struct LayoutStore {
    /// Layout root directory.
    root: PathBuf,
}

impl LayoutStore {
    /// Creates a store over `root`. Nothing is touched until an operation
    /// runs.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the layout root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_dir(&self) -> PathBuf {
        self.root.join("blobs").join("sha256")
    }

    fn blob_path(&self, hex: &str) -> PathBuf {
        self.blob_dir().join(hex)
    }

    fn require_blob_dir(&self) -> Result<()> {
        let dir = self.blob_dir();
        if !dir.is_dir() {
            return Err(ImageError::InvalidOciLayout {
                root: self.root.clone(),
                missing: dir,
            });
        }
        Ok(())
    }

    fn load_index(&self) -> Result<Index> {
        let data = fs::read(self.root.join("index.json"))?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Reads a blob and parses it as a manifest, without digest
    /// verification.
    fn load_manifest(&self, digest: &Digest) -> Result<Manifest> {
        let data = fs::read(self.blob_path(digest.encoded()))?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Reads a blob, verifying it hashes to its digest.
    fn read_blob(&self, digest: &Digest) -> Result<Vec<u8>> {
        let data = fs::read(self.blob_path(digest.encoded()))?;
        let found = verify::sha256_hex(&data);
        if found != digest.encoded() {
            return Err(ImageError::ShaMismatch {
                expected: digest.encoded().to_string(),
                found,
            });
        }
        Ok(data)
    }

    /// Serializes `data` as a blob and returns its descriptor.
    fn write_blob(&self, media_type: &str, data: &[u8]) -> Result<Descriptor> {
        let hex = verify::sha256_hex(data);
        fs::write(self.blob_path(&hex), data)?;
        #[allow(clippy::cast_possible_wrap)]
        Ok(Descriptor::new(
            media_type,
            Digest::sha256(&hex),
            data.len() as i64,
        ))
    }
}

impl OciDirectory for LayoutStore {
    fn add_blob(&self, src: &Path, descriptor: &Descriptor) -> Result<()> {
        self.require_blob_dir()?;
        descriptor.digest.validate()?;

        fs::copy(src, self.blob_path(descriptor.digest.encoded()))?;
        debug!(digest = %descriptor.digest, "added blob");
        Ok(())
    }

    fn remove_top_blob(&self, sha256: &str) -> Result<()> {
        self.require_blob_dir()?;

        let path = self.blob_path(sha256);
        if !path.is_file() {
            return Err(ImageError::MissingLayer {
                root: self.root.clone(),
                sha256: sha256.to_string(),
            });
        }
        fs::remove_file(path)?;
        debug!(sha256, "removed top blob");
        Ok(())
    }

    fn read_metadata(&self) -> Result<(Manifest, ImageConfig)> {
        let index = self.load_index()?;
        if index.manifests.len() != 1 {
            return Err(ImageError::InvalidManifestCount {
                found: index.manifests.len(),
            });
        }

        let manifest_descriptor = &index.manifests[0];
        if !manifest::is_manifest_media_type(&manifest_descriptor.media_type) {
            return Err(ImageError::WrongManifestMediaType {
                media_type: manifest_descriptor.media_type.clone(),
            });
        }
        if let Some(platform) = &manifest_descriptor.platform {
            if platform.os != "windows" || platform.architecture != "amd64" {
                return Err(ImageError::InvalidPlatform {
                    os: platform.os.clone(),
                    architecture: platform.architecture.clone(),
                });
            }
        }

        let manifest_data = self.read_blob(&manifest_descriptor.digest)?;
        let image_manifest: Manifest = serde_json::from_slice(&manifest_data)?;

        if !manifest::is_config_media_type(&image_manifest.config.media_type) {
            return Err(ImageError::WrongConfigMediaType {
                media_type: image_manifest.config.media_type.clone(),
            });
        }
        let config_data = self.read_blob(&image_manifest.config.digest)?;
        let config: ImageConfig = serde_json::from_slice(&config_data)?;

        if config.os != "windows" || config.architecture != "amd64" {
            return Err(ImageError::InvalidPlatform {
                os: config.os.clone(),
                architecture: config.architecture.clone(),
            });
        }
        if config.rootfs.fs_type != "layers" {
            return Err(ImageError::InvalidRootfsType {
                rootfs_type: config.rootfs.fs_type.clone(),
            });
        }

        for layer in &image_manifest.layers {
            if !manifest::is_layer_media_type(&layer.media_type) {
                return Err(ImageError::InvalidLayerMediaType {
                    media_type: layer.media_type.clone(),
                });
            }
        }
        for layer in &image_manifest.layers {
            verify::verify_file(&self.blob_path(layer.digest.encoded()), &layer.digest)
                .map_err(|err| ImageError::InvalidLayer {
                    source: Box::new(err),
                })?;
        }

        if image_manifest.layers.len() != config.rootfs.diff_ids.len() {
            return Err(ImageError::LayerDiffIdMismatch {
                layers: image_manifest.layers.len(),
                diff_ids: config.rootfs.diff_ids.len(),
            });
        }

        Ok((image_manifest, config))
    }

    fn clear_metadata(&self) -> Result<()> {
        let index = self.load_index().map_err(|err| ImageError::LoadIndex {
            source: Box::new(err),
        })?;
        let Some(manifest_descriptor) = index.manifests.first() else {
            return Err(ImageError::InvalidManifestCount { found: 0 });
        };
        let image_manifest = self
            .load_manifest(&manifest_descriptor.digest)
            .map_err(|err| ImageError::LoadManifest {
                source: Box::new(err),
            })?;

        fs::remove_file(self.root.join("oci-layout"))?;
        fs::remove_file(self.root.join("index.json"))?;
        fs::remove_file(self.blob_path(manifest_descriptor.digest.encoded()))?;
        fs::remove_file(self.blob_path(image_manifest.config.digest.encoded()))?;
        debug!(root = %self.root.display(), "cleared metadata");
        Ok(())
    }

    fn write_metadata(
        &self,
        layers: &[Descriptor],
        diff_ids: &[Digest],
        layer_added: bool,
    ) -> Result<()> {
        if layers.len() != diff_ids.len() {
            return Err(ImageError::LayerDiffIdMismatch {
                layers: layers.len(),
                diff_ids: diff_ids.len(),
            });
        }
        fs::create_dir_all(self.blob_dir())?;

        let config = ImageConfig::minimal(diff_ids.to_vec());
        let config_descriptor =
            self.write_blob(manifest::MEDIA_TYPE_OCI_CONFIG, &serde_json::to_vec(&config)?)?;

        let mut annotations = BTreeMap::new();
        if layer_added {
            annotations.insert(
                manifest::ANNOTATION_LAYER_ADDED.to_string(),
                "true".to_string(),
            );
        }
        let image_manifest = Manifest {
            schema_version: 2,
            config: config_descriptor,
            layers: layers.to_vec(),
            annotations,
        };
        let mut manifest_descriptor = self.write_blob(
            manifest::MEDIA_TYPE_OCI_MANIFEST,
            &serde_json::to_vec(&image_manifest)?,
        )?;
        manifest_descriptor.platform = Some(Platform::windows_amd64());

        let index = Index {
            schema_version: 2,
            manifests: vec![manifest_descriptor],
        };
        fs::write(self.root.join("index.json"), serde_json::to_vec(&index)?)?;

        let layout = OciLayout {
            image_layout_version: manifest::IMAGE_LAYOUT_VERSION.to_string(),
        };
        fs::write(self.root.join("oci-layout"), serde_json::to_vec(&layout)?)?;

        debug!(
            root = %self.root.display(),
            layers = layers.len(),
            layer_added,
            "wrote metadata"
        );
        Ok(())
    }
}
