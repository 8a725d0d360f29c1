use std::path::PathBuf;
use std::process::{ExitCode, Termination};
use std::time::Instant;

use crate::errors::RouteFailure;

/// A page written by a build.
#[derive(Debug)]
pub struct PageOutput {
    pub url: String,
    pub file_path: PathBuf,
}

/// A file copied verbatim from a static entry.
#[derive(Debug)]
pub struct StaticFileOutput {
    pub url: String,
    pub file_path: PathBuf,
    pub original_path: PathBuf,
}

/// Returned by [`build()`](super::build) once the build finished.
#[derive(Debug)]
pub struct BuildOutput {
    pub start_time: Instant,
    pub pages: Vec<PageOutput>,
    pub static_files: Vec<StaticFileOutput>,
    /// Routes left out under [`FailurePolicy::Skip`](super::FailurePolicy::Skip).
    pub skipped: Vec<RouteFailure>,
}

impl BuildOutput {
    pub fn new(start_time: Instant) -> Self {
        Self {
            start_time,
            pages: Vec::new(),
            static_files: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub(crate) fn add_page(&mut self, url: String, file_path: PathBuf) {
        self.pages.push(PageOutput { url, file_path });
    }

    pub(crate) fn add_static_file(&mut self, url: &str, file_path: PathBuf, original_path: PathBuf) {
        self.static_files.push(StaticFileOutput {
            url: url.to_string(),
            file_path,
            original_path,
        });
    }
}

impl Default for BuildOutput {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl Termination for BuildOutput {
    fn report(self) -> ExitCode {
        ExitCode::SUCCESS
    }
}
