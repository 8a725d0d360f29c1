use std::path::PathBuf;

/// What a build does when some routes fail to render or write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Render every route and write those that succeeded, then fail with every error instead of
    /// copying statics.
    #[default]
    Abort,
    /// Log a warning per failed route and finish the build. Failed routes are listed in
    /// [`BuildOutput::skipped`](super::BuildOutput::skipped).
    Skip,
}

/// Options for [`build()`](super::build).
///
/// ## Examples
/// ```rust
/// use composer::build::{BuildOptions, FailurePolicy};
///
/// let options = BuildOptions {
///     build_path: "public".into(),
///     clean: true,
///     on_error: FailurePolicy::Skip,
///     ..Default::default()
/// };
/// assert_eq!(options.index_file, None);
/// ```
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub build_path: PathBuf,

    /// Whether to remove the build directory before writing anything.
    pub clean: bool,

    /// File name written for URLs that resolve to a directory. Defaults to the index's own
    /// [`index_file`](crate::index::IndexOptions::index_file).
    pub index_file: Option<String>,

    pub on_error: FailurePolicy,

    /// Render routes on the rayon thread pool.
    pub parallel: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            build_path: PathBuf::from("build"),
            clean: false,
            index_file: None,
            on_error: FailurePolicy::Abort,
            parallel: true,
        }
    }
}
