//! The index: the filters of a site plus everything that generates its routes and statics.
//!
//! An [`Index`] resolves every relative path against its base path, owns the [`FilterRegistry`], and
//! produces [`Route`]s and [`Static`]s from injected sources. Routes are generated again on every
//! access (unless [`IndexOptions::cache_routes`] is set), so a live server picks up new or removed
//! source files without restarting.
//!
//! ## Example
//! ```rust
//! use composer::index::{Index, IndexError};
//! use composer::route::Route;
//!
//! let mut index = Index::new("site");
//! index.add_route_source(|index: &Index| -> Result<Vec<Route>, IndexError> {
//!     let mut routes = Vec::new();
//!     for path in index.walk("pages", &[], &["*.md"])? {
//!         let path = path?;
//!         let url = path.with_extension("").to_string_lossy().replace("pages/", "");
//!         routes.push(Route::new(url, path).with_filters(["markdown"]));
//!     }
//!     Ok(routes)
//! });
//! ```
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use glob::Pattern;
use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use walkdir::{DirEntry, FilterEntry, WalkDir};

use crate::errors::{ConfigError, FilterInitError, RenderError};
pub use crate::errors::IndexError;
use crate::filters::{
    Availability, DEFAULT_FILTERS, Filter, FilterCatalog, FilterFactory, FilterRegistry,
    FilterStatus, Kwargs, RegisteredFilter,
};
use crate::materialize::{DEFAULT_INDEX_FILE, Materializer};
use crate::render::Renderer;
use crate::route::{Context, Route, Static, normalize_url};

/// Produces candidate routes for an index.
pub trait RouteSource: Send + Sync {
    fn generate_routes(&self, index: &Index) -> Result<Vec<Route>, IndexError>;
}

impl<F> RouteSource for F
where
    F: Fn(&Index) -> Result<Vec<Route>, IndexError> + Send + Sync,
{
    fn generate_routes(&self, index: &Index) -> Result<Vec<Route>, IndexError> {
        self(index)
    }
}

/// Produces the static entries of an index.
pub trait StaticSource: Send + Sync {
    fn generate_static(&self, index: &Index) -> Result<Vec<Static>, IndexError>;
}

impl<F> StaticSource for F
where
    F: Fn(&Index) -> Result<Vec<Static>, IndexError> + Send + Sync,
{
    fn generate_static(&self, index: &Index) -> Result<Vec<Static>, IndexError> {
        self(index)
    }
}

/// Post-processes each generated route. Returning `None` drops the route from the index.
pub trait RouteTransform: Send + Sync {
    fn process_route(&self, index: &Index, route: Route) -> Result<Option<Route>, IndexError>;
}

impl<F> RouteTransform for F
where
    F: Fn(&Index, Route) -> Result<Option<Route>, IndexError> + Send + Sync,
{
    fn process_route(&self, index: &Index, route: Route) -> Result<Option<Route>, IndexError> {
        self(index, route)
    }
}

/// A fixed list of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteList(pub Vec<Route>);

impl RouteSource for RouteList {
    fn generate_routes(&self, _index: &Index) -> Result<Vec<Route>, IndexError> {
        Ok(self.0.clone())
    }
}

/// A fixed list of static entries.
#[derive(Debug, Clone, Default)]
pub struct StaticList(pub Vec<Static>);

impl StaticSource for StaticList {
    fn generate_static(&self, _index: &Index) -> Result<Vec<Static>, IndexError> {
        Ok(self.0.clone())
    }
}

pub struct IndexOptions {
    /// URL prefix the site is served under. Defaults to `/`.
    pub base_url: String,

    /// Keep generated routes in memory after the first lookup.
    ///
    /// Useful for builds, where the source tree does not change. Leave it off when serving, or call
    /// [`Index::invalidate_routes`] whenever sources change.
    pub cache_routes: bool,

    /// File name URLs resolve to when they name a directory. Routes must not share a destination.
    pub index_file: String,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            base_url: "/".to_string(),
            cache_routes: false,
            index_file: DEFAULT_INDEX_FILE.to_string(),
        }
    }
}

/// Generated routes, indexed by normalized URL.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    by_url: FxHashMap<String, usize>,
}

impl RouteTable {
    fn new(routes: Vec<Route>) -> Self {
        let by_url = routes
            .iter()
            .enumerate()
            .map(|(position, route)| (route.normalized_url().to_string(), position))
            .collect();
        Self { routes, by_url }
    }

    /// The route for `url`, ignoring leading and trailing slashes.
    pub fn get(&self, url: &str) -> Option<&Route> {
        self.by_url
            .get(normalize_url(url))
            .map(|&position| &self.routes[position])
    }

    /// Routes in generation order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

pub struct Index {
    base_path: PathBuf,
    base_url: String,
    index_file: String,
    filters: FilterRegistry,
    default_context: Context,
    route_sources: Vec<Box<dyn RouteSource>>,
    static_sources: Vec<Box<dyn StaticSource>>,
    transforms: Vec<Box<dyn RouteTransform>>,
    cache_routes: bool,
    route_cache: RwLock<Option<Arc<RouteTable>>>,
}

impl Index {
    /// Creates an index rooted at `base_path` with the default filters registered.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self::with_options(base_path, IndexOptions::default())
    }

    pub fn with_options(base_path: impl AsRef<Path>, options: IndexOptions) -> Self {
        let mut index = Self::empty(base_path, options);
        index.register_default_filters(&FilterCatalog::builtin());
        index
    }

    /// Creates an index without any filters.
    pub fn empty(base_path: impl AsRef<Path>, options: IndexOptions) -> Self {
        let base_path = base_path.as_ref();
        let base_path = std::path::absolute(base_path).unwrap_or_else(|_| base_path.to_path_buf());

        Self {
            base_path,
            base_url: options.base_url,
            index_file: options.index_file,
            filters: FilterRegistry::default(),
            default_context: Context::new(),
            route_sources: Vec::new(),
            static_sources: Vec::new(),
            transforms: Vec::new(),
            cache_routes: options.cache_routes,
            route_cache: RwLock::new(None),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn index_file(&self) -> &str {
        &self.index_file
    }

    /// A materializer rooted at `root` that uses this index's index file.
    pub fn materializer(&self, root: impl Into<PathBuf>) -> Materializer {
        Materializer::new(root).with_index_file(&self.index_file)
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn filter(&self, id: &str) -> Option<&dyn Filter> {
        self.filters.get(id)
    }

    pub fn default_context(&self) -> &Context {
        &self.default_context
    }

    /// Context every route starts from. Keys set by a route take precedence.
    pub fn set_default_context(&mut self, context: Context) {
        self.default_context = context;
    }

    /// Resolves `path` against the base path. Absolute paths are returned unchanged.
    pub fn absolute_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.base_path.join(path)
    }

    /// Expresses `path` relative to the base path, if it lives under it.
    pub fn relative_path<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.base_path).unwrap_or(path)
    }

    /// Prefixes `url` with the base URL.
    pub fn absolute_url(&self, url: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    /// Creates a filter with `factory` and registers it under `id`, replacing any previous filter
    /// with that id.
    pub fn register_filter(
        &mut self,
        id: impl Into<String>,
        factory: impl FilterFactory,
        kwargs: Kwargs,
    ) -> Result<&dyn Filter, FilterInitError> {
        self.insert_filter(id.into(), None, &factory, kwargs)
    }

    /// Creates the filter named `class` in `catalog` and registers it under `id`.
    ///
    /// Used for filters explicitly requested by configuration, so every failure is a configuration
    /// error, including a missing optional dependency.
    pub fn register_from_catalog(
        &mut self,
        id: &str,
        class: &str,
        catalog: &FilterCatalog,
        kwargs: Kwargs,
    ) -> Result<&dyn Filter, ConfigError> {
        let factory = catalog
            .get(class)
            .ok_or_else(|| ConfigError::UnknownFilterClass {
                id: id.to_string(),
                class: class.to_string(),
            })?;

        self.insert_filter(id.to_string(), Some(class.to_string()), factory.as_ref(), kwargs)
            .map_err(|source| ConfigError::FilterUnavailable {
                id: id.to_string(),
                source,
            })
    }

    /// Registers the [`DEFAULT_FILTERS`] found in `catalog`.
    ///
    /// A default filter whose dependency is missing is skipped; the returned statuses say which
    /// filters are usable so callers can apply their own policy.
    pub fn register_default_filters(&mut self, catalog: &FilterCatalog) -> Vec<FilterStatus> {
        let mut statuses = Vec::new();

        for id in DEFAULT_FILTERS {
            let Some(factory) = catalog.get(id) else {
                continue;
            };

            let availability = match self.insert_filter(
                id.to_string(),
                Some(id.to_string()),
                factory.as_ref(),
                Kwargs::new(),
            ) {
                Ok(_) => {
                    debug!(target: "filters", "Registered default filter: {id}");
                    Availability::Available
                }
                Err(err) => {
                    if err.is_missing_dependency() {
                        debug!(target: "filters", "Skipping default filter due to missing dependency: {id}");
                    } else {
                        debug!(target: "filters", "Skipping default filter {id}: {err}");
                    }
                    Availability::Unavailable(err)
                }
            };

            statuses.push(FilterStatus {
                id: id.to_string(),
                availability,
            });
        }

        statuses
    }

    fn insert_filter(
        &mut self,
        id: String,
        class: Option<String>,
        factory: &dyn FilterFactory,
        kwargs: Kwargs,
    ) -> Result<&dyn Filter, FilterInitError> {
        let filter = factory.create(self, &kwargs)?;
        Ok(self.filters.insert(RegisteredFilter {
            id,
            filter,
            class,
            kwargs,
        }))
    }

    pub fn add_route_source(&mut self, source: impl RouteSource + 'static) -> &mut Self {
        self.route_sources.push(Box::new(source));
        self.invalidate_routes();
        self
    }

    pub fn add_static_source(&mut self, source: impl StaticSource + 'static) -> &mut Self {
        self.static_sources.push(Box::new(source));
        self
    }

    /// Adds a transform, run after the ones added before it.
    pub fn add_transform(&mut self, transform: impl RouteTransform + 'static) -> &mut Self {
        self.transforms.push(Box::new(transform));
        self.invalidate_routes();
        self
    }

    pub fn add_routes(&mut self, routes: Vec<Route>) -> &mut Self {
        self.add_route_source(RouteList(routes))
    }

    pub fn add_statics(&mut self, statics: Vec<Static>) -> &mut Self {
        self.add_static_source(StaticList(statics))
    }

    /// Walks the tree under `base_path/start`, following symbolic links, and yields the paths of regular
    /// files relative to the base path.
    ///
    /// Patterns are globs matched against those relative paths, where `*` also matches `/`. Directories
    /// matching an `exclude` pattern are never entered. A file is yielded when it matches no `exclude`
    /// pattern and, if `include_only` is not empty, at least one of its patterns.
    /// Order follows the filesystem and is not sorted.
    pub fn walk(
        &self,
        start: impl AsRef<Path>,
        exclude: &[&str],
        include_only: &[&str],
    ) -> Result<Walk, ConfigError> {
        let exclude = compile_globs(exclude)?;
        let include_only = compile_globs(include_only)?;

        let base_path = self.base_path.clone();
        let predicate: EntryPredicate = Box::new(move |entry: &DirEntry| {
            if entry.depth() == 0 {
                return true;
            }

            let relative = glob_path(&base_path, entry.path());
            if exclude.iter().any(|pattern| pattern.matches(&relative)) {
                return false;
            }

            entry.file_type().is_dir()
                || include_only.is_empty()
                || include_only.iter().any(|pattern| pattern.matches(&relative))
        });

        let entries = WalkDir::new(self.absolute_path(start))
            .follow_links(true)
            .into_iter()
            .filter_entry(predicate);

        Ok(Walk {
            entries,
            base_path: self.base_path.clone(),
        })
    }

    /// Generates every route: runs all route sources, then the transforms on each candidate.
    ///
    /// Fails if two routes share a URL once leading and trailing slashes are ignored, or if two routes
    /// would be written to the same file.
    pub fn routes(&self) -> Result<Vec<Route>, IndexError> {
        let mut routes = Vec::new();
        let mut seen = FxHashSet::default();

        for source in &self.route_sources {
            for route in source.generate_routes(self)? {
                let Some(route) = self.process_route(route)? else {
                    continue;
                };

                if !seen.insert(route.normalized_url().to_string()) {
                    return Err(ConfigError::DuplicateRoute {
                        url: route.normalized_url().to_string(),
                    }
                    .into());
                }

                routes.push(route);
            }
        }

        self.check_destinations(&routes, &self.materializer(""))?;
        Ok(routes)
    }

    /// Checks that no two `routes` materialize to the same file under `materializer`.
    pub fn check_destinations(
        &self,
        routes: &[Route],
        materializer: &Materializer,
    ) -> Result<(), ConfigError> {
        let mut destinations: FxHashMap<String, &str> = FxHashMap::default();

        for route in routes {
            let key = materializer.key(&route.url);
            if let Some(first) = destinations.get(key.as_str()) {
                return Err(ConfigError::ConflictingRoutes {
                    first: first.to_string(),
                    second: route.url.clone(),
                    path: key,
                });
            }
            destinations.insert(key, &route.url);
        }

        Ok(())
    }

    fn process_route(&self, route: Route) -> Result<Option<Route>, IndexError> {
        let mut route = route;
        for transform in &self.transforms {
            match transform.process_route(self, route)? {
                Some(processed) => route = processed,
                None => return Ok(None),
            }
        }
        Ok(Some(route))
    }

    pub fn statics(&self) -> Result<Vec<Static>, IndexError> {
        let mut statics = Vec::new();
        for source in &self.static_sources {
            statics.extend(source.generate_static(self)?);
        }
        Ok(statics)
    }

    /// Finds the route for `url`, ignoring leading and trailing slashes on both sides.
    pub fn get_route(&self, url: &str) -> Result<Option<Route>, IndexError> {
        Ok(self.route_table()?.get(url).cloned())
    }

    /// Every route, generated once. With [`IndexOptions::cache_routes`] the table is kept until
    /// [`Index::invalidate_routes`].
    pub fn route_table(&self) -> Result<Arc<RouteTable>, IndexError> {
        if !self.cache_routes {
            return Ok(Arc::new(RouteTable::new(self.routes()?)));
        }

        if let Some(table) = self
            .route_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(table.clone());
        }

        let table = Arc::new(RouteTable::new(self.routes()?));
        info!(target: "index", "Cached {} routes", table.len());

        *self
            .route_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(table.clone());
        Ok(table)
    }

    /// Drops cached routes so the next lookup generates them again.
    pub fn invalidate_routes(&self) {
        *self
            .route_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Checks that every filter referenced by `routes` is registered.
    pub fn check_filters(&self, routes: &[Route]) -> Result<(), ConfigError> {
        for route in routes {
            for filter in &route.filters {
                if !self.filters.contains(filter.id()) {
                    return Err(ConfigError::UnknownFilter {
                        route: route.url.clone(),
                        filter: filter.id().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Generates all routes and statics and checks them for configuration errors, without rendering.
    pub fn validate(&self) -> Result<(), IndexError> {
        let routes = self.routes()?;
        self.check_filters(&routes)?;
        self.statics()?;
        Ok(())
    }

    /// Renders `route` through its filter chain.
    pub fn render(&self, route: &Route) -> Result<String, RenderError> {
        Renderer::new(self).render(route)
    }
}

type EntryPredicate = Box<dyn FnMut(&DirEntry) -> bool + Send>;

/// Iterator returned by [`Index::walk`].
pub struct Walk {
    entries: FilterEntry<walkdir::IntoIter, EntryPredicate>,
    base_path: PathBuf,
}

impl Iterator for Walk {
    type Item = Result<PathBuf, IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.entries.next()? {
                Ok(entry) if entry.file_type().is_file() => {
                    let path = entry.path();
                    return Some(Ok(path
                        .strip_prefix(&self.base_path)
                        .unwrap_or(path)
                        .to_path_buf()));
                }
                Ok(_) => continue,
                Err(err) => return Some(Err(IndexError::Walk(err))),
            }
        }
    }
}

fn compile_globs(patterns: &[&str]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
        })
        .collect()
}

/// The path used for glob matching: relative to the base path, with `/` separators.
fn glob_path(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::MapFilter;
    use std::collections::BTreeSet;
    use std::fs;

    fn tree(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file).unwrap();
        }
        dir
    }

    fn walked(index: &Index, start: &str, exclude: &[&str], include_only: &[&str]) -> BTreeSet<String> {
        index
            .walk(start, exclude, include_only)
            .unwrap()
            .map(|path| path.unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_walk_include_only() {
        let dir = tree(&["a.md", "a.mako", "sub/b.md"]);
        let index = Index::empty(dir.path(), IndexOptions::default());

        assert_eq!(
            walked(&index, ".", &[], &["*.md"]),
            BTreeSet::from(["a.md".to_string(), "sub/b.md".to_string()])
        );
    }

    #[test]
    fn test_walk_exclude_prunes_directories() {
        let dir = tree(&["index.mako", "post.mako", "drafts/wip.mako", "posts/hello.md"]);
        let index = Index::empty(dir.path(), IndexOptions::default());

        assert_eq!(
            walked(&index, ".", &["post.mako", "drafts"], &["*.mako"]),
            BTreeSet::from(["index.mako".to_string()])
        );
    }

    #[test]
    fn test_walk_paths_are_relative_to_base_path() {
        let dir = tree(&["posts/one.md", "posts/2024/two.md", "about.md"]);
        let index = Index::empty(dir.path(), IndexOptions::default());

        assert_eq!(
            walked(&index, "posts", &[], &["*.md"]),
            BTreeSet::from(["posts/one.md".to_string(), "posts/2024/two.md".to_string()])
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_follows_symlinks() {
        let dir = tree(&["shared/note.md"]);
        std::os::unix::fs::symlink(dir.path().join("shared"), dir.path().join("linked")).unwrap();
        let index = Index::empty(dir.path(), IndexOptions::default());

        assert_eq!(
            walked(&index, ".", &[], &[]),
            BTreeSet::from(["shared/note.md".to_string(), "linked/note.md".to_string()])
        );
    }

    #[test]
    fn test_walk_invalid_pattern() {
        let index = Index::empty(".", IndexOptions::default());
        assert!(matches!(
            index.walk(".", &["[unclosed"], &[]).err(),
            Some(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_register_filter_twice_second_wins() {
        let mut index = Index::empty(".", IndexOptions::default());
        index
            .register_filter("f", MapFilter(|s: &str| format!("first:{s}")), Kwargs::new())
            .unwrap();
        index
            .register_filter("f", MapFilter(|s: &str| format!("second:{s}")), Kwargs::new())
            .unwrap();

        index.add_routes(vec![Route::new("/", "x").with_filters(["f"])]);
        let route = index.get_route("/").unwrap().unwrap();
        let filter = index.filter("f").unwrap();
        let vars = Context::new();
        let ctx = crate::filters::FilterContext {
            index: &index,
            route: &route,
            vars: &vars,
        };
        assert_eq!(filter.apply("x", &ctx).unwrap(), "second:x");
        assert_eq!(index.filters().len(), 1);
    }

    #[test]
    fn test_default_filters_statuses() {
        let mut index = Index::empty(".", IndexOptions::default());
        let statuses = index.register_default_filters(&FilterCatalog::builtin());

        let ids: Vec<_> = statuses.iter().map(|status| status.id.as_str()).collect();
        assert_eq!(ids, vec!["markdown", "template"]);
        assert_eq!(
            statuses.iter().all(FilterStatus::is_available),
            cfg!(all(feature = "markdown", feature = "templates"))
        );
    }

    #[test]
    fn test_default_filter_missing_dependency_is_skipped() {
        let mut catalog = FilterCatalog::empty();
        catalog.insert("markdown", |_: &Index, _: &Kwargs| -> Result<Box<dyn Filter>, FilterInitError> {
            Err(FilterInitError::MissingDependency {
                filter: "markdown",
                feature: "markdown",
            })
        });
        catalog.insert("template", MapFilter(|s: &str| s.to_string()));

        let mut index = Index::empty(".", IndexOptions::default());
        let statuses = index.register_default_filters(&catalog);

        assert!(!statuses[0].is_available());
        assert!(statuses[1].is_available());
        assert_eq!(index.filters().ids().collect::<Vec<_>>(), vec!["template"]);
    }

    #[test]
    fn test_explicit_filter_missing_dependency_is_fatal() {
        let mut catalog = FilterCatalog::empty();
        catalog.insert("markdown", |_: &Index, _: &Kwargs| -> Result<Box<dyn Filter>, FilterInitError> {
            Err(FilterInitError::MissingDependency {
                filter: "markdown",
                feature: "markdown",
            })
        });

        let mut index = Index::empty(".", IndexOptions::default());
        let err = index
            .register_from_catalog("md", "markdown", &catalog, Kwargs::new())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConfigError::FilterUnavailable {
                source: FilterInitError::MissingDependency { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_filter_class() {
        let mut index = Index::empty(".", IndexOptions::default());
        let err = index
            .register_from_catalog("x", "composer.filters:Mako", &FilterCatalog::builtin(), Kwargs::new())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::UnknownFilterClass { .. }));
    }

    #[test]
    fn test_get_route_normalizes_slashes() {
        let mut index = Index::empty(".", IndexOptions::default());
        index.add_routes(vec![Route::new("/foo", "bar"), Route::new("posts/hello/", "hello.md")]);

        assert_eq!(index.get_route("foo").unwrap().unwrap().file, PathBuf::from("bar"));
        assert_eq!(index.get_route("/foo/").unwrap().unwrap().file, PathBuf::from("bar"));
        assert!(index.get_route("/posts/hello").unwrap().is_some());
        assert!(index.get_route("/missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_routes_are_rejected() {
        let mut index = Index::empty(".", IndexOptions::default());
        index.add_routes(vec![Route::new("/foo", "a"), Route::new("foo/", "b")]);

        assert!(matches!(
            index.routes(),
            Err(IndexError::Config(ConfigError::DuplicateRoute { .. }))
        ));
    }

    #[test]
    fn test_routes_sharing_a_destination_are_rejected() {
        let mut index = Index::empty(".", IndexOptions::default());
        index.add_routes(vec![Route::new("/foo", "a.txt"), Route::new("/foo/index.html", "b.txt")]);

        match index.routes() {
            Err(IndexError::Config(ConfigError::ConflictingRoutes { first, second, path })) => {
                assert_eq!(first, "/foo");
                assert_eq!(second, "/foo/index.html");
                assert_eq!(path, "foo/index.html");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_destinations_follow_index_file() {
        let options = IndexOptions {
            index_file: "index.htm".into(),
            ..Default::default()
        };
        let mut index = Index::empty(".", options);
        index.add_routes(vec![Route::new("/foo", "a.txt"), Route::new("/foo/index.html", "b.txt")]);

        assert_eq!(index.routes().unwrap().len(), 2);
        assert!(matches!(
            index.check_destinations(&index.routes().unwrap(), &Materializer::new("build")),
            Err(ConfigError::ConflictingRoutes { .. })
        ));
    }

    #[test]
    fn test_transforms_mutate_and_skip() {
        let mut index = Index::empty(".", IndexOptions::default());
        index.add_routes(vec![
            Route::new("", "index.mako"),
            Route::new("", "_nav.mako"),
        ]);
        index.add_transform(|_: &Index, route: Route| -> Result<Option<Route>, IndexError> {
            if route.file.to_string_lossy().starts_with('_') {
                return Ok(None);
            }
            Ok(Some(route))
        });
        index.add_transform(|_: &Index, mut route: Route| -> Result<Option<Route>, IndexError> {
            route.url = format!("/{}", route.file.with_extension("").display());
            Ok(Some(route))
        });

        let urls: Vec<_> = index.routes().unwrap().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["/index"]);
    }

    #[test]
    fn test_routes_are_regenerated_on_access() {
        let dir = tree(&["a.md"]);
        let mut index = Index::empty(dir.path(), IndexOptions::default());
        index.add_route_source(|index: &Index| -> Result<Vec<Route>, IndexError> {
            index
                .walk(".", &[], &["*.md"])?
                .map(|path| {
                    let path = path?;
                    Ok(Route::new(path.with_extension("").to_string_lossy(), path))
                })
                .collect()
        });

        assert!(index.get_route("/b").unwrap().is_none());
        fs::write(dir.path().join("b.md"), "b").unwrap();
        assert!(index.get_route("/b").unwrap().is_some());
    }

    #[test]
    fn test_route_cache_requires_invalidation() {
        let dir = tree(&["a.md"]);
        let options = IndexOptions {
            cache_routes: true,
            ..Default::default()
        };
        let mut index = Index::empty(dir.path(), options);
        index.add_route_source(|index: &Index| -> Result<Vec<Route>, IndexError> {
            index
                .walk(".", &[], &["*.md"])?
                .map(|path| {
                    let path = path?;
                    Ok(Route::new(path.with_extension("").to_string_lossy(), path))
                })
                .collect()
        });

        assert!(index.get_route("/a").unwrap().is_some());
        fs::write(dir.path().join("b.md"), "b").unwrap();
        assert!(index.get_route("/b").unwrap().is_none());

        index.invalidate_routes();
        assert!(index.get_route("/b").unwrap().is_some());
    }

    #[test]
    fn test_check_filters_reports_unknown_id() {
        let mut index = Index::empty(".", IndexOptions::default());
        index.add_routes(vec![Route::new("/a", "a.md").with_filters(["nope"])]);

        assert!(matches!(
            index.validate(),
            Err(IndexError::Config(ConfigError::UnknownFilter { .. }))
        ));
    }

    #[test]
    fn test_path_helpers() {
        let dir = tree(&[]);
        let index = Index::empty(dir.path(), IndexOptions::default());

        let absolute = index.absolute_path("posts/a.md");
        assert_eq!(absolute, dir.path().join("posts/a.md"));
        assert_eq!(index.relative_path(&absolute), Path::new("posts/a.md"));
        assert_eq!(index.absolute_url("about"), "/about");
        assert_eq!(index.absolute_url("/"), "/");

        let prefixed = Index::empty(
            dir.path(),
            IndexOptions {
                base_url: "/blog/".into(),
                ..Default::default()
            },
        );
        assert_eq!(prefixed.absolute_url("/post/a"), "/blog/post/a");
    }
}
