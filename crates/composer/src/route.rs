//! Declarative records describing the pages and static assets of a site.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::IndexError;

/// Variables handed to filters. Values are arbitrary JSON-like data.
pub type Context = serde_json::Map<String, serde_json::Value>;

/// A logical URL, the source file it is rendered from and the filters the content flows through.
///
/// ## Example
/// ```rust
/// use composer::route::{FilterRef, Route};
///
/// let route = Route::new("/about", "pages/about.md")
///     .with_filters(["markdown", "template"])
///     .with_filter(FilterRef::wrap("template", "layouts/page.html"));
///
/// assert_eq!(route.filters.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub url: String,
    pub file: PathBuf,
    #[serde(default)]
    pub filters: Vec<FilterRef>,
    #[serde(default)]
    pub context: Context,
    /// Set by a transform that could not prepare this route. Rendering the route reports it.
    #[serde(skip)]
    pub error: Option<PreparationError>,
}

impl Route {
    pub fn new(url: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            file: file.into(),
            filters: Vec::new(),
            context: Context::new(),
            error: None,
        }
    }

    /// Keeps the route in the index but makes every render of it fail with `error`.
    pub fn with_error(mut self, error: IndexError) -> Self {
        self.error = Some(PreparationError(Arc::new(error)));
        self
    }

    pub fn with_filters<I, F>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FilterRef>,
    {
        self.filters.extend(filters.into_iter().map(Into::into));
        self
    }

    pub fn with_filter(mut self, filter: impl Into<FilterRef>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context.extend(context);
        self
    }

    /// The URL with leading and trailing slashes removed, used to compare routes.
    pub fn normalized_url(&self) -> &str {
        normalize_url(&self.url)
    }
}

pub fn normalize_url(url: &str) -> &str {
    url.trim_matches('/')
}

/// An [`IndexError`] attached to a single route. Clones share the same error.
#[derive(Clone)]
pub struct PreparationError(pub Arc<IndexError>);

impl PartialEq for PreparationError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PreparationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One step of a route's filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterRef {
    Id(String),
    Override(FilterOverride),
}

/// A filter step that replaces its input with another file and adds extra context.
///
/// When `file` is set, the step receives the contents of `file` and the content rendered so far
/// is available to it as `body`. This is how content gets wrapped in a container template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOverride {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: Context,
}

impl FilterRef {
    pub fn id(&self) -> &str {
        match self {
            FilterRef::Id(id) => id,
            FilterRef::Override(over) => &over.id,
        }
    }

    /// Pipes the content rendered so far into `file` through the filter `id`.
    pub fn wrap(id: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        FilterRef::Override(FilterOverride {
            id: id.into(),
            file: Some(file.into()),
            extra: Context::new(),
        })
    }

    /// Runs the filter `id` with additional context for this step only.
    pub fn with_extra(id: impl Into<String>, extra: Context) -> Self {
        FilterRef::Override(FilterOverride {
            id: id.into(),
            file: None,
            extra,
        })
    }

    pub(crate) fn override_file(&self) -> Option<&Path> {
        match self {
            FilterRef::Override(FilterOverride {
                file: Some(file), ..
            }) => Some(file),
            _ => None,
        }
    }

    pub(crate) fn extra(&self) -> Option<&Context> {
        match self {
            FilterRef::Override(over) => Some(&over.extra),
            FilterRef::Id(_) => None,
        }
    }
}

impl From<&str> for FilterRef {
    fn from(id: &str) -> Self {
        FilterRef::Id(id.to_string())
    }
}

impl From<String> for FilterRef {
    fn from(id: String) -> Self {
        FilterRef::Id(id)
    }
}

/// A file or directory copied verbatim to `url`. Statics never go through filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Static {
    pub url: String,
    pub file: PathBuf,
}

impl Static {
    pub fn new(url: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            file: file.into(),
        }
    }
}
