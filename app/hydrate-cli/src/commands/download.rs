//! Download command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use hydrate_image::registry::RegistryParams;
use hydrate_image::ImageFetcher;

/// Arguments for the download command.
///
/// The downloaded image is formatted according to the OCI Image Format
/// Specification.
#[derive(Args)]
pub struct DownloadArgs {
    /// Output directory for the downloaded image
    #[arg(long = "outputDir", default_value_os_t = std::env::temp_dir())]
    pub output_dir: PathBuf,

    /// Name of the image to download (e.g. namespace/name)
    #[arg(long)]
    pub image: String,

    /// Image tag to download
    #[arg(long, default_value = "latest")]
    pub tag: String,

    /// Registry server url that stores the images (defaults to Docker Hub)
    #[arg(long = "registryServer")]
    pub registry_server: Option<String>,

    /// Authorization server url (defaults to Docker Hub)
    #[arg(long = "authServer")]
    pub auth_server: Option<String>,

    /// Name of the authorization service (defaults to the Docker service)
    #[arg(long = "authServiceName")]
    pub auth_service_name: Option<String>,

    /// Do not output the image as a tarball
    #[arg(long = "noTarball")]
    pub no_tarball: bool,
}

/// Executes the download command.
pub async fn execute(args: DownloadArgs) -> Result<()> {
    let params = RegistryParams::new(args.registry_server, args.auth_server, args.auth_service_name);
    let fetcher = ImageFetcher::new(
        args.output_dir,
        &args.image,
        &args.tag,
        params,
        args.no_tarball,
    );
    fetcher.run().await.with_context(|| {
        format!(
            "failed downloading image: {} with tag: {}",
            args.image, args.tag
        )
    })
}
