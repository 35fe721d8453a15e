//! Add-layer command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hydrate_image::{LayerModifier, LayoutStore};

/// Arguments for the add-layer command.
///
/// The image must exist on disk and is modified in place.
#[derive(Args)]
pub struct AddLayerArgs {
    /// Path to the image the layer will be added to
    #[arg(long = "ociImage")]
    pub oci_image: PathBuf,

    /// Path to the .tgz file containing the layer to add
    #[arg(long)]
    pub layer: PathBuf,
}

/// Executes the add-layer command.
pub fn execute(args: &AddLayerArgs) -> Result<()> {
    let modifier = LayerModifier::new(LayoutStore::new(&args.oci_image));
    modifier.add_layer(&args.layer)?;
    Ok(())
}
