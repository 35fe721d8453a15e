//! Remove-layer command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hydrate_image::{LayerModifier, LayoutStore};

/// Arguments for the remove-layer command.
///
/// The image must exist on disk and is modified in place. Only a layer
/// previously added in place is removed; other layouts are left untouched.
#[derive(Args)]
pub struct RemoveLayerArgs {
    /// Path to the image from which the layer will be removed
    #[arg(long = "ociImage")]
    pub oci_image: PathBuf,
}

/// Executes the remove-layer command.
pub fn execute(args: &RemoveLayerArgs) -> Result<()> {
    let modifier = LayerModifier::new(LayoutStore::new(&args.oci_image));
    modifier.remove_top_layer()?;
    Ok(())
}
