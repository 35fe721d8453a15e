//! Tarball packaging of a layout directory.

use std::fs::File;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::error::Result;

/// Packages the contents of `src_dir` into a gzipped tarball at `out_file`.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or the archive cannot
/// be written.
pub fn write_tgz(src_dir: &Path, out_file: &Path) -> Result<()> {
    let file = File::create(out_file)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(".", src_dir)?;
    builder.into_inner()?.finish()?;

    debug!(archive = %out_file.display(), "wrote tarball");
    Ok(())
}
