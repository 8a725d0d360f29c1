//! Static export: every route rendered and written to disk, every static entry copied.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use colored::Colorize;
use log::{error, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::errors::{BuildError, IndexError, RouteFailure, error_chain};
use crate::index::Index;
use crate::logging::{FormatElapsedTimeOptions, format_elapsed_time, print_title};
use crate::materialize::Materializer;
use crate::route::{Route, Static};

pub mod options;
pub mod output;

pub use options::{BuildOptions, FailurePolicy};
pub use output::{BuildOutput, PageOutput, StaticFileOutput};

/// Builds the site described by `index` into `options.build_path`.
///
/// Routes and filters are checked before anything is rendered, so a configuration error never leaves
/// a half-written build behind.
pub fn build(index: &Index, options: &BuildOptions) -> Result<BuildOutput, BuildError> {
    let build_start = Instant::now();
    let mut build_output = BuildOutput::new(build_start);

    let mut materializer = index.materializer(&options.build_path);
    if let Some(index_file) = &options.index_file {
        materializer = materializer.with_index_file(index_file);
    }
    let section_format_options = FormatElapsedTimeOptions::section();
    let route_format_options = FormatElapsedTimeOptions::default();

    info!(target: "build", "Output directory: {}", options.build_path.display());

    let routes = index.routes()?;
    index.check_filters(&routes).map_err(IndexError::from)?;
    index
        .check_destinations(&routes, &materializer)
        .map_err(IndexError::from)?;
    let statics = index.statics()?;

    if options.clean {
        clean_build_path(&options.build_path)?;
    }

    print_title("generating pages");
    let pages_start = Instant::now();

    let written: Vec<WrittenRoute> = if options.parallel {
        routes
            .par_iter()
            .map(|route| write_route(index, &materializer, route))
            .collect()
    } else {
        routes
            .iter()
            .map(|route| write_route(index, &materializer, route))
            .collect()
    };

    let mut failures = Vec::new();
    for WrittenRoute { url, result, elapsed } in written {
        match result {
            Ok(file_path) => {
                info!(target: "pages", "{} -> {} {}", url, file_path.to_string_lossy().dimmed(), format_elapsed_time(elapsed, &route_format_options));
                build_output.add_page(url, file_path);
            }
            Err(err) => {
                match options.on_error {
                    FailurePolicy::Abort => {
                        error!(target: "pages", "{} {}", url, error_chain(&err));
                    }
                    FailurePolicy::Skip => {
                        warn!(target: "pages", "Skipping {}: {}", url, error_chain(&err));
                    }
                }
                failures.push(RouteFailure { url, error: err });
            }
        }
    }

    info!(target: "pages", "{}", format!("generated {} pages in {}", build_output.pages.len(), format_elapsed_time(pages_start.elapsed(), &section_format_options)).bold());

    if !failures.is_empty() {
        match options.on_error {
            FailurePolicy::Abort => return Err(BuildError::RoutesFailed(failures)),
            FailurePolicy::Skip => build_output.skipped = failures,
        }
    }

    if !statics.is_empty() {
        let statics_start = Instant::now();
        print_title("copying static files");

        // Routes take precedence over static files, like when serving.
        let page_paths: FxHashSet<PathBuf> = routes
            .iter()
            .map(|route| materializer.resolve(&route.url).path())
            .collect();

        let mut copier = StaticCopier {
            page_paths: &page_paths,
            output: &mut build_output,
        };
        for entry in &statics {
            copier.copy_static(index, &materializer, entry)?;
        }

        info!(target: "build", "{}", format!("Static files copied in {}", format_elapsed_time(statics_start.elapsed(), &FormatElapsedTimeOptions::default())).bold());
    }

    info!(target: "SKIP_FORMAT", "{}", "");
    info!(target: "build", "{}", format!("Build completed in {}", format_elapsed_time(build_start.elapsed(), &section_format_options)).bold());

    Ok(build_output)
}

struct WrittenRoute {
    url: String,
    result: Result<PathBuf, BuildError>,
    elapsed: Duration,
}

fn write_route(index: &Index, materializer: &Materializer, route: &Route) -> WrittenRoute {
    let route_start = Instant::now();

    let result = index
        .render(route)
        .map_err(BuildError::from)
        .and_then(|content| {
            let path = materializer.resolve(&route.url).path();
            materializer
                .write(&route.url, content)
                .map_err(|source| BuildError::WriteFailed { path, source })
        });

    WrittenRoute {
        url: route.url.clone(),
        result,
        elapsed: route_start.elapsed(),
    }
}

fn clean_build_path(build_path: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(build_path) {
        Ok(()) => {
            info!(target: "build", "Cleaned {}", build_path.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BuildError::CleanFailed {
            path: build_path.to_path_buf(),
            source,
        }),
    }
}

struct StaticCopier<'a> {
    page_paths: &'a FxHashSet<PathBuf>,
    output: &'a mut BuildOutput,
}

impl StaticCopier<'_> {
    fn copy_static(
        &mut self,
        index: &Index,
        materializer: &Materializer,
        entry: &Static,
    ) -> Result<(), BuildError> {
        let source = index.absolute_path(&entry.file);
        let copy_failed = |source_err: io::Error| BuildError::CopyFailed {
            url: entry.url.clone(),
            path: source.clone(),
            source: source_err,
        };

        let metadata = fs::metadata(&source).map_err(copy_failed)?;

        if metadata.is_dir() {
            let destination = materializer.path_for_key(&materializer.static_key(&entry.url, None));
            self.copy_recursively(&entry.url, &source, &destination)
                .map_err(copy_failed)?;
        } else {
            let file_name = source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let destination =
                materializer.path_for_key(&materializer.static_key(&entry.url, Some(&file_name)));
            self.copy_file(&entry.url, &source, destination)
                .map_err(copy_failed)?;
        }

        info!(target: "static", "{} -> {}", entry.url, index.relative_path(&source).to_string_lossy().dimmed());
        Ok(())
    }

    fn copy_recursively(&mut self, url: &str, source: &Path, destination: &Path) -> io::Result<()> {
        fs::create_dir_all(destination)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            let target = destination.join(entry.file_name());

            // Symbolic links are followed, like when walking sources.
            if fs::metadata(entry.path())?.is_dir() {
                self.copy_recursively(url, &entry.path(), &target)?;
            } else {
                self.copy_file(url, &entry.path(), target)?;
            }
        }
        Ok(())
    }

    fn copy_file(&mut self, url: &str, source: &Path, destination: PathBuf) -> io::Result<()> {
        if self.page_paths.contains(&destination) {
            warn!(target: "static", "{} is shadowed by a page, not copying {}", destination.display(), source.display());
            return Ok(());
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, &destination)?;
        self.output
            .add_static_file(url, destination, source.to_path_buf());
        Ok(())
    }
}
