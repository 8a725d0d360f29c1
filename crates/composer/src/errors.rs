//! Error types for Composer.
use std::fmt::{self, Debug, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

macro_rules! impl_debug_for_error {
    ($($t:ty),*) => {
        $(
            impl Debug for $t {
                fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                    // Errors returned from main are shown with Debug, thiserror only derives Display.
                    write!(f, "{}", self)
                }
            }
        )*
    };
}

/// Problems with how an index is put together. Always fatal.
#[derive(Error)]
pub enum ConfigError {
    #[error("route `{route}` uses filter `{filter}`, which is not registered")]
    UnknownFilter { route: String, filter: String },

    #[error("filter `{id}` refers to unknown filter class `{class}`")]
    UnknownFilterClass { id: String, class: String },

    #[error("filter `{id}` could not be registered")]
    FilterUnavailable {
        id: String,
        #[source]
        source: FilterInitError,
    },

    #[error("more than one route resolves to `/{url}`")]
    DuplicateRoute { url: String },

    #[error("routes `{first}` and `{second}` are both written to `{path}`")]
    ConflictingRoutes {
        first: String,
        second: String,
        path: String,
    },

    #[error("invalid glob pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Returned by a filter factory when the filter cannot be constructed.
#[derive(Error)]
pub enum FilterInitError {
    #[error(
        "filter `{filter}` requires the `{feature}` feature of composer, which was not enabled at compile time"
    )]
    MissingDependency {
        filter: &'static str,
        feature: &'static str,
    },

    #[error("invalid options for filter `{filter}`")]
    InvalidOptions {
        filter: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("filter `{filter}` failed to initialize: {message}")]
    Setup { filter: &'static str, message: String },
}

impl FilterInitError {
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, FilterInitError::MissingDependency { .. })
    }
}

/// Raised by [`Filter::apply`](crate::filters::Filter::apply) while transforming content.
#[derive(Error)]
pub enum FilterError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl FilterError {
    pub fn msg(message: impl Into<String>) -> Self {
        FilterError::Message(message.into())
    }
}

/// Errors produced while generating routes and statics.
#[derive(Error)]
pub enum IndexError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to walk source directory")]
    Walk(#[from] walkdir::Error),

    #[error("failed to read {path}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid front matter in {path}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors produced while rendering a single route.
#[derive(Error)]
pub enum RenderError {
    #[error("source file for `{url}` not found: {path}")]
    SourceNotFound { url: String, path: PathBuf },

    #[error("failed to read source file for `{url}`: {path}")]
    ReadFailed {
        url: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("route `{url}` could not be prepared")]
    Preparation {
        url: String,
        #[source]
        source: Arc<IndexError>,
    },

    #[error("filter `{filter}` failed while rendering `{url}`")]
    Filter {
        url: String,
        filter: String,
        #[source]
        source: FilterError,
    },
}

impl RenderError {
    /// Whether this failure means the requested content does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RenderError::SourceNotFound { .. })
    }
}

/// Errors produced while loading an index document.
#[derive(Error)]
pub enum DocumentError {
    #[error("failed to read index document {path}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index document {path} is not valid JSON")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("index document {path} is not valid YAML")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported index document format: {path} (expected .json, .yaml or .yml)")]
    UnsupportedFormat { path: PathBuf },
}

/// A route that could not be rendered or written during a build.
#[derive(Debug)]
pub struct RouteFailure {
    pub url: String,
    pub error: BuildError,
}

#[derive(Error)]
pub enum BuildError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to clean build directory {path}")]
    CleanFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy static entry `{url}` from {path}")]
    CopyFailed {
        url: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} route(s) failed to build: {}", .0.len(), failed_urls(.0))]
    RoutesFailed(Vec<RouteFailure>),
}

fn failed_urls(failures: &[RouteFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.url.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum ComposerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to serialize index document")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl_debug_for_error!(
    ConfigError,
    FilterInitError,
    FilterError,
    IndexError,
    RenderError,
    DocumentError,
    BuildError
);

/// Renders an error followed by its chain of causes, one per line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_includes_causes() {
        let error = RenderError::Filter {
            url: "/about".into(),
            filter: "markdown".into(),
            source: FilterError::msg("unexpected token"),
        };

        let chain = error_chain(&error);
        assert_eq!(
            chain,
            "filter `markdown` failed while rendering `/about`\n  caused by: unexpected token"
        );
    }

    #[test]
    fn test_routes_failed_lists_urls() {
        let error = BuildError::RoutesFailed(vec![
            RouteFailure {
                url: "/a".into(),
                error: BuildError::Render(RenderError::SourceNotFound {
                    url: "/a".into(),
                    path: "a.md".into(),
                }),
            },
            RouteFailure {
                url: "/b".into(),
                error: BuildError::Render(RenderError::SourceNotFound {
                    url: "/b".into(),
                    path: "b.md".into(),
                }),
            },
        ]);

        assert_eq!(error.to_string(), "2 route(s) failed to build: /a, /b");
    }
}
