//! # hydrate-image
//!
//! Windows container image hydration.
//!
//! This crate materializes a container image from a Docker Registry v2
//! compatible registry into an on-disk OCI Image Layout, and mutates such a
//! layout in place:
//!
//! - Image download with Bearer token authentication, concurrent layer
//!   fetching, and content digest verification
//! - OCI Image Layout reading, writing, and validation
//! - Appending a gzipped layer tarball as the new top layer
//! - Removing a previously added top layer
//! - Packaging a fetched layout as a `.tgz`
//!
//! The tool targets a single platform: windows/amd64.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod digest;
pub mod download;
pub mod error;
pub mod fetch;
pub mod layout;
pub mod manifest;
pub mod modify;
pub mod package;
pub mod registry;
pub mod verify;

pub use digest::Digest;
pub use download::Downloader;
pub use error::{ImageError, Result};
pub use fetch::ImageFetcher;
pub use layout::{LayoutStore, OciDirectory};
pub use manifest::{Descriptor, ImageConfig, Index, Manifest, Platform};
pub use modify::LayerModifier;
pub use registry::{Registry, RegistryClient, RegistryParams};
