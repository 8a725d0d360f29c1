use std::path::PathBuf;

use composer::logging::init_logging;
use composer::{BuildOptions, ComposerError};
use log::info;
use simple_site::{content_dir, site_index};

fn main() -> Result<(), ComposerError> {
    init_logging();

    let index = site_index(content_dir())?;

    let build_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("build"));

    let output = composer::build(
        &index,
        &BuildOptions {
            build_path,
            clean: true,
            ..Default::default()
        },
    )?;

    info!(target: "demo", "{} pages, {} static files", output.pages.len(), output.static_files.len());
    Ok(())
}
