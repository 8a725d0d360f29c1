use std::path::PathBuf;

use composer::{BuildOptions, ComposerError, FailurePolicy, IndexOptions};
use log::warn;

use crate::IndexArgs;

pub struct BuildArgs {
    pub build_path: PathBuf,
    pub clean: bool,
    pub keep_going: bool,
    pub sequential: bool,
}

pub fn build_site(index: &IndexArgs, args: BuildArgs) -> Result<(), ComposerError> {
    // Sources do not change during a build.
    let index = index.load(IndexOptions {
        cache_routes: true,
        ..Default::default()
    })?;

    let options = BuildOptions {
        build_path: args.build_path,
        clean: args.clean,
        on_error: if args.keep_going {
            FailurePolicy::Skip
        } else {
            FailurePolicy::Abort
        },
        parallel: !args.sequential,
        ..Default::default()
    };

    let output = composer::build(&index, &options)?;

    if !output.skipped.is_empty() {
        let urls: Vec<_> = output
            .skipped
            .iter()
            .map(|failure| failure.url.as_str())
            .collect();
        warn!(target: "build", "{} route(s) skipped: {}", urls.len(), urls.join(", "));
    }

    Ok(())
}
