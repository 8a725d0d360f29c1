//! Content filters: the transformations a route's content flows through.
//!
//! A filter is constructed once per [`Index`] by a [`FilterFactory`], registered under an id, and then
//! applied to the content of every route that lists that id in its filter chain. Factories are looked up
//! by name in a [`FilterCatalog`], which is how index documents refer to filter implementations.
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;

use crate::errors::{FilterError, FilterInitError};
use crate::index::Index;
use crate::route::{Context, Route};

#[cfg(feature = "markdown")]
pub mod markdown;
#[cfg(feature = "templates")]
pub mod template;

/// Keyword arguments passed to a filter factory.
pub type Kwargs = serde_json::Map<String, serde_json::Value>;

/// Everything a filter can see while transforming one route's content.
///
/// The route is passed explicitly so that concurrent renders never share a "current route".
pub struct FilterContext<'a> {
    pub index: &'a Index,
    pub route: &'a Route,
    /// Default context, route context and per-step extras, merged in that order.
    pub vars: &'a Context,
}

pub trait Filter: Send + Sync {
    fn apply(&self, content: &str, ctx: &FilterContext<'_>) -> Result<String, FilterError>;
}

impl<F> Filter for F
where
    F: Fn(&str, &FilterContext<'_>) -> Result<String, FilterError> + Send + Sync,
{
    fn apply(&self, content: &str, ctx: &FilterContext<'_>) -> Result<String, FilterError> {
        self(content, ctx)
    }
}

/// Builds a filter instance for an index from keyword arguments.
pub trait FilterFactory: Send + Sync {
    fn create(&self, index: &Index, kwargs: &Kwargs) -> Result<Box<dyn Filter>, FilterInitError>;
}

impl<F> FilterFactory for F
where
    F: Fn(&Index, &Kwargs) -> Result<Box<dyn Filter>, FilterInitError> + Send + Sync,
{
    fn create(&self, index: &Index, kwargs: &Kwargs) -> Result<Box<dyn Filter>, FilterInitError> {
        self(index, kwargs)
    }
}

/// A filter made from a plain string function, ignoring its context. Also usable as its own factory.
///
/// ## Example
/// ```rust
/// use composer::filters::{Kwargs, MapFilter};
/// use composer::index::Index;
///
/// let mut index = Index::new(".");
/// index
///     .register_filter("shout", MapFilter(|s: &str| s.to_uppercase()), Kwargs::new())
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct MapFilter<F>(pub F);

impl<F> Filter for MapFilter<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn apply(&self, content: &str, _ctx: &FilterContext<'_>) -> Result<String, FilterError> {
        Ok((self.0)(content))
    }
}

impl<F> FilterFactory for MapFilter<F>
where
    F: Fn(&str) -> String + Clone + Send + Sync + 'static,
{
    fn create(&self, _index: &Index, _kwargs: &Kwargs) -> Result<Box<dyn Filter>, FilterInitError> {
        Ok(Box::new(self.clone()))
    }
}

/// Deserializes a filter's keyword arguments into its typed options.
pub fn parse_kwargs<T: DeserializeOwned>(
    filter: &'static str,
    kwargs: &Kwargs,
) -> Result<T, FilterInitError> {
    serde_json::from_value(serde_json::Value::Object(kwargs.clone()))
        .map_err(|source| FilterInitError::InvalidOptions { filter, source })
}

/// Filter ids every index tries to register on creation.
pub const DEFAULT_FILTERS: &[&str] = &["markdown", "template"];

/// Named filter factories. Index documents reference filters by these names (`filters.<id>.class`).
pub struct FilterCatalog {
    factories: FxHashMap<String, Arc<dyn FilterFactory>>,
}

impl FilterCatalog {
    pub fn empty() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// The catalog of filters shipped with composer: `markdown`, `template` and `template-container`.
    ///
    /// Entries are present even when their cargo feature is disabled; creating them then reports a
    /// missing dependency.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.insert("markdown", builtin_markdown);
        catalog.insert("template", builtin_template);
        catalog.insert("template-container", builtin_template_container);
        catalog
    }

    pub fn insert(&mut self, name: impl Into<String>, factory: impl FilterFactory + 'static) {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FilterFactory>> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for FilterCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_markdown(_index: &Index, kwargs: &Kwargs) -> Result<Box<dyn Filter>, FilterInitError> {
    #[cfg(feature = "markdown")]
    {
        Ok(Box::new(markdown::Markdown::from_kwargs(kwargs)?))
    }
    #[cfg(not(feature = "markdown"))]
    {
        let _ = kwargs;
        Err(FilterInitError::MissingDependency {
            filter: "markdown",
            feature: "markdown",
        })
    }
}

fn builtin_template(index: &Index, kwargs: &Kwargs) -> Result<Box<dyn Filter>, FilterInitError> {
    #[cfg(feature = "templates")]
    {
        Ok(Box::new(template::Template::from_kwargs(index, kwargs)?))
    }
    #[cfg(not(feature = "templates"))]
    {
        let _ = (index, kwargs);
        Err(FilterInitError::MissingDependency {
            filter: "template",
            feature: "templates",
        })
    }
}

fn builtin_template_container(
    index: &Index,
    kwargs: &Kwargs,
) -> Result<Box<dyn Filter>, FilterInitError> {
    #[cfg(feature = "templates")]
    {
        Ok(Box::new(template::TemplateContainer::from_kwargs(
            index, kwargs,
        )?))
    }
    #[cfg(not(feature = "templates"))]
    {
        let _ = (index, kwargs);
        Err(FilterInitError::MissingDependency {
            filter: "template-container",
            feature: "templates",
        })
    }
}

/// Whether a filter could be registered.
pub enum Availability {
    Available,
    Unavailable(FilterInitError),
}

/// Outcome of registering one of the default filters.
pub struct FilterStatus {
    pub id: String,
    pub availability: Availability,
}

impl FilterStatus {
    pub fn is_available(&self) -> bool {
        matches!(self.availability, Availability::Available)
    }
}

pub(crate) struct RegisteredFilter {
    pub(crate) id: String,
    pub(crate) filter: Box<dyn Filter>,
    /// Catalog name the filter was created from, when known. Used when exporting the index.
    pub(crate) class: Option<String>,
    pub(crate) kwargs: Kwargs,
}

/// Filters registered on an index, in registration order.
#[derive(Default)]
pub struct FilterRegistry {
    entries: Vec<RegisteredFilter>,
}

impl FilterRegistry {
    pub fn get(&self, id: &str) -> Option<&dyn Filter> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.filter.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores a filter, replacing any filter previously registered under the same id.
    pub(crate) fn insert(&mut self, entry: RegisteredFilter) -> &dyn Filter {
        let position = match self.entries.iter().position(|e| e.id == entry.id) {
            Some(position) => {
                self.entries[position] = entry;
                position
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };

        self.entries[position].filter.as_ref()
    }

    pub(crate) fn entries(&self) -> &[RegisteredFilter] {
        &self.entries
    }
}
