//! Error types for image operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for image operations.
pub type Result<T> = std::result::Result<T, ImageError>;

/// Errors that can occur while downloading or mutating an image.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Remote returned a non-2xx status where 2xx was required.
    #[error("http request to {url} returned status {status}")]
    HttpNotOk {
        /// HTTP status code.
        status: u16,
        /// URL that was requested.
        url: String,
    },

    /// Content digest verification failed.
    #[error("sha256 mismatch: expected {expected}, found {found}")]
    ShaMismatch {
        /// Digest the content was expected to hash to.
        expected: String,
        /// Digest the content actually hashed to.
        found: String,
    },

    /// Digest uses an algorithm other than sha256.
    #[error("invalid digest algorithm: {algorithm}")]
    DigestAlgorithm {
        /// The unsupported algorithm.
        algorithm: String,
    },

    /// Digest string did not parse.
    #[error("invalid checksum digest format")]
    InvalidDigestFormat,

    /// Descriptor media type is unknown or wrong for its role.
    #[error("invalid media type: {media_type}")]
    InvalidMediaType {
        /// The rejected media type.
        media_type: String,
    },

    /// Index entry does not describe an image manifest.
    #[error("wrong media type for manifest: {media_type}")]
    WrongManifestMediaType {
        /// The rejected media type.
        media_type: String,
    },

    /// Manifest config descriptor does not describe an image config.
    #[error("wrong media type for image config: {media_type}")]
    WrongConfigMediaType {
        /// The rejected media type.
        media_type: String,
    },

    /// Manifest layer descriptor is not a recognized layer type.
    #[error("invalid layer media type: {media_type}")]
    InvalidLayerMediaType {
        /// The rejected media type.
        media_type: String,
    },

    /// Platform is not windows/amd64.
    #[error("invalid platform: expected windows/amd64, found {os}/{architecture}")]
    InvalidPlatform {
        /// Operating system that was found.
        os: String,
        /// Architecture that was found.
        architecture: String,
    },

    /// Image config OS is not windows.
    #[error("invalid container OS: {os}")]
    InvalidOs {
        /// Operating system that was found.
        os: String,
    },

    /// Image config architecture is not amd64.
    #[error("invalid container arch: {architecture}")]
    InvalidArch {
        /// Architecture that was found.
        architecture: String,
    },

    /// Image config rootfs type is not "layers".
    #[error("invalid rootfs type: {rootfs_type}")]
    InvalidRootfsType {
        /// Rootfs type that was found.
        rootfs_type: String,
    },

    /// Index does not contain exactly one manifest.
    #[error("invalid # of manifests: expected 1, found {found}")]
    InvalidManifestCount {
        /// Number of manifests in the index.
        found: usize,
    },

    /// Manifest layer count and config diff ID count differ.
    #[error("manifest + config mismatch: {layers} layers, {diff_ids} diffIDs")]
    LayerDiffIdMismatch {
        /// Number of layers in the manifest.
        layers: usize,
        /// Number of diff IDs in the config.
        diff_ids: usize,
    },

    /// The layout root is missing its blob directory.
    #[error("{} is not a valid OCI image: {} directory missing", root.display(), missing.display())]
    InvalidOciLayout {
        /// Layout root directory.
        root: PathBuf,
        /// Directory that was expected but absent.
        missing: PathBuf,
    },

    /// A layer blob named by the metadata is not on disk.
    #[error("{} does not contain layer: {}", root.display(), sha256)]
    MissingLayer {
        /// Layout root directory.
        root: PathBuf,
        /// Hex digest of the missing layer.
        sha256: String,
    },

    /// A layer download exhausted its retry budget.
    #[error("max retries exceeded downloading layer with diffID: {diff_id}, sha256: {sha256}")]
    MaxLayerDownloadRetries {
        /// Hex diff ID of the failing layer.
        diff_id: String,
        /// Hex digest of the failing layer.
        sha256: String,
    },

    /// A foreign layer descriptor carries no source URLs.
    #[error("foreign layer {sha256} has no urls")]
    MissingForeignUrls {
        /// Hex digest of the layer.
        sha256: String,
    },

    /// Image reference is not of the form namespace/name.
    #[error("invalid image name")]
    InvalidImageName,

    /// Layer file is not gzip framed.
    #[error("invalid layer {path}: not gzipped")]
    NotGzipped {
        /// Path of the rejected file.
        path: String,
    },

    /// index.json could not be read or parsed.
    #[error("couldn't load index.json: {source}")]
    LoadIndex {
        /// Underlying failure.
        source: Box<ImageError>,
    },

    /// The manifest blob could not be read or parsed.
    #[error("couldn't load manifest: {source}")]
    LoadManifest {
        /// Underlying failure.
        source: Box<ImageError>,
    },

    /// A layer blob failed validation on read.
    #[error("invalid layer: {source}")]
    InvalidLayer {
        /// Underlying failure.
        source: Box<ImageError>,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}
