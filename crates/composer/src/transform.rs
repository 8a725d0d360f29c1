//! Route transforms shipped with composer.
use std::fs;
use std::io;

use log::{trace, warn};

use crate::errors::IndexError;
use crate::index::{Index, RouteTransform};
use crate::route::{Context, Route};

/// Copies the YAML front matter of each route's source file into its context.
///
/// Keys already set on the route take precedence. Routes whose source file does not exist are left
/// untouched; rendering reports them. Unreadable files and invalid front matter are attached to the
/// route with [`Route::with_error`] and reported when that route is rendered.
pub fn front_matter() -> FrontMatter {
    FrontMatter
}

/// Drops routes whose source file name starts with `prefix`, such as `_` for template partials.
pub fn skip_partials(prefix: impl Into<String>) -> SkipPartials {
    SkipPartials {
        prefix: prefix.into(),
    }
}

pub struct FrontMatter;

impl RouteTransform for FrontMatter {
    fn process_route(&self, index: &Index, mut route: Route) -> Result<Option<Route>, IndexError> {
        let path = index.absolute_path(&route.file);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Some(route)),
            Err(source) => {
                return Ok(Some(route.with_error(IndexError::ReadFailed { path, source })));
            }
        };

        let Some((raw, _)) = split_front_matter(&content) else {
            return Ok(Some(route));
        };

        if raw.trim().is_empty() {
            return Ok(Some(route));
        }

        let mut context: Context = match serde_yaml::from_str(raw) {
            Ok(context) => context,
            Err(source) => {
                warn!(target: "index", "Invalid front matter in {}: {source}", path.display());
                return Ok(Some(route.with_error(IndexError::FrontMatter { path, source })));
            }
        };

        trace!(target: "index", "{}: {} front matter key(s)", route.file.display(), context.len());

        context.extend(std::mem::take(&mut route.context));
        route.context = context;
        Ok(Some(route))
    }
}

pub struct SkipPartials {
    prefix: String,
}

impl RouteTransform for SkipPartials {
    fn process_route(&self, _index: &Index, route: Route) -> Result<Option<Route>, IndexError> {
        let is_partial = route
            .file
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with(&self.prefix));

        if is_partial {
            trace!(target: "index", "Skipping partial: {}", route.file.display());
            return Ok(None);
        }

        Ok(Some(route))
    }
}

/// Splits a leading `---` delimited block from the rest of `content`.
///
/// The block ends at the next line consisting of `---` or `...`.
pub fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let delimiter = line.trim_end_matches(['\r', '\n']);
        if delimiter == "---" || delimiter == "..." {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }

    None
}
