//! CLI command implementations.
//!
//! Commands are organized into:
//!
//! - Image download into an OCI layout (optionally packaged as a tarball)
//! - In-place layer addition on an existing layout
//! - Removal of a previously added top layer

use clap::{Parser, Subcommand};

pub mod add_layer;
pub mod download;
pub mod remove_layer;

/// Hydrate - materialize and mutate Windows container images
#[derive(Parser)]
#[command(name = "hydrate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Download an image into an OCI layout
    Download(download::DownloadArgs),

    /// Add a layer to an existing image
    AddLayer(add_layer::AddLayerArgs),

    /// Remove the top layer from an existing image, if it was added in
    /// place
    RemoveLayer(remove_layer::RemoveLayerArgs),
}
