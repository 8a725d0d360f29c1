use std::fs;
use std::io;
use std::path::Path;

use log::trace;

use crate::errors::{ConfigError, RenderError};
use crate::filters::FilterContext;
use crate::index::Index;
use crate::route::{Context, Route};

/// Folds a route's filter chain over its source content.
pub struct Renderer<'a> {
    index: &'a Index,
}

impl<'a> Renderer<'a> {
    pub fn new(index: &'a Index) -> Self {
        Self { index }
    }

    pub fn render(&self, route: &Route) -> Result<String, RenderError> {
        if let Some(error) = &route.error {
            return Err(RenderError::Preparation {
                url: route.url.clone(),
                source: error.0.clone(),
            });
        }

        let mut content = self.read_source(route, &route.file)?;

        let base = merge_context([self.index.default_context(), &route.context]);

        for step in &route.filters {
            let id = step.id();
            let filter = self
                .index
                .filter(id)
                .ok_or_else(|| ConfigError::UnknownFilter {
                    route: route.url.clone(),
                    filter: id.to_string(),
                })?;

            let mut vars = match step.extra() {
                Some(extra) => merge_context([&base, extra]),
                None => base.clone(),
            };

            let input = match step.override_file() {
                Some(file) => {
                    let wrapper = self.read_source(route, file)?;
                    vars.insert("body".to_string(), content.into());
                    wrapper
                }
                None => content,
            };

            trace!(target: "render", "/{}: applying {id}", route.normalized_url());

            let ctx = FilterContext {
                index: self.index,
                route,
                vars: &vars,
            };
            content = filter
                .apply(&input, &ctx)
                .map_err(|source| RenderError::Filter {
                    url: route.url.clone(),
                    filter: id.to_string(),
                    source,
                })?;
        }

        Ok(content)
    }

    fn read_source(&self, route: &Route, file: &Path) -> Result<String, RenderError> {
        let path = self.index.absolute_path(file);
        fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => RenderError::SourceNotFound {
                url: route.url.clone(),
                path,
            },
            _ => RenderError::ReadFailed {
                url: route.url.clone(),
                path,
                source,
            },
        })
    }
}

/// Merges `layers` left to right, later keys replacing earlier ones.
pub fn merge_context<'c>(layers: impl IntoIterator<Item = &'c Context>) -> Context {
    let mut merged = Context::new();
    for layer in layers {
        merged.extend(layer.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FilterError;
    use crate::filters::{FilterContext, Kwargs, MapFilter};
    use crate::index::IndexOptions;
    use crate::route::FilterRef;
    use serde_json::json;

    fn site(files: &[(&str, &str)]) -> (tempfile::TempDir, Index) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let mut index = Index::empty(dir.path(), IndexOptions::default());
        index
            .register_filter("upper", MapFilter(|s: &str| s.to_uppercase()), Kwargs::new())
            .unwrap();
        index
            .register_filter("bang", MapFilter(|s: &str| format!("{s}!")), Kwargs::new())
            .unwrap();
        (dir, index)
    }

    #[test]
    fn test_chain_order() {
        let (_dir, index) = site(&[("hi.txt", "hi")]);

        let route = Route::new("/", "hi.txt").with_filters(["upper", "bang"]);
        assert_eq!(index.render(&route).unwrap(), "HI!");

        let route = Route::new("/", "hi.txt").with_filters(["bang", "upper"]);
        assert_eq!(index.render(&route).unwrap(), "HI!");

        let route = Route::new("/", "hi.txt").with_filters(["bang", "bang", "upper"]);
        assert_eq!(index.render(&route).unwrap(), "HI!!");
    }

    #[test]
    fn test_no_filters_is_verbatim() {
        let (_dir, index) = site(&[("raw.html", "<b>raw</b>")]);
        assert_eq!(index.render(&Route::new("/raw", "raw.html")).unwrap(), "<b>raw</b>");
    }

    #[test]
    fn test_unknown_filter_is_config_error() {
        let (_dir, index) = site(&[("hi.txt", "hi")]);
        let route = Route::new("/", "hi.txt").with_filters(["upper", "missing"]);

        assert!(matches!(
            index.render(&route),
            Err(RenderError::Config(ConfigError::UnknownFilter { .. }))
        ));
    }

    #[test]
    fn test_missing_source() {
        let (_dir, index) = site(&[]);
        let err = index.render(&Route::new("/gone", "gone.md")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_filter_error_carries_route_and_filter() {
        let (_dir, mut index) = site(&[("hi.txt", "hi")]);
        index
            .register_filter(
                "fail",
                |_: &Index, _: &Kwargs| -> Result<Box<dyn crate::filters::Filter>, crate::errors::FilterInitError> {
                    Ok(Box::new(|_: &str, _: &FilterContext<'_>| -> Result<String, FilterError> {
                        Err(FilterError::msg("boom"))
                    }))
                },
                Kwargs::new(),
            )
            .unwrap();

        let route = Route::new("/broken", "hi.txt").with_filters(["upper", "fail"]);
        match index.render(&route) {
            Err(RenderError::Filter { url, filter, .. }) => {
                assert_eq!(url, "/broken");
                assert_eq!(filter, "fail");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    fn echo_context(index: &mut Index) {
        index
            .register_filter(
                "vars",
                |_: &Index, _: &Kwargs| -> Result<Box<dyn crate::filters::Filter>, crate::errors::FilterInitError> {
                    Ok(Box::new(|content: &str, ctx: &FilterContext<'_>| -> Result<String, FilterError> {
                        let mut keys: Vec<_> = ctx
                            .vars
                            .iter()
                            .map(|(key, value)| format!("{key}={}", value.as_str().unwrap_or("?")))
                            .collect();
                        keys.sort();
                        Ok(format!("{content}|{}|{}", keys.join(","), ctx.route.url))
                    }))
                },
                Kwargs::new(),
            )
            .unwrap();
    }

    #[test]
    fn test_context_layering() {
        let (_dir, mut index) = site(&[("page.txt", "page")]);
        echo_context(&mut index);
        index.set_default_context(
            json!({"site": "default", "title": "default"}).as_object().cloned().unwrap(),
        );

        let route = Route::new("/page", "page.txt")
            .with_context(json!({"title": "route"}).as_object().cloned().unwrap())
            .with_filter(FilterRef::with_extra(
                "vars",
                json!({"step": "extra"}).as_object().cloned().unwrap(),
            ));

        assert_eq!(
            index.render(&route).unwrap(),
            "page|site=default,step=extra,title=route|/page"
        );
    }

    #[test]
    fn test_file_override_pipes_body() {
        let (_dir, mut index) = site(&[("post.md", "hello"), ("layout.txt", "layout")]);
        echo_context(&mut index);

        let route = Route::new("/post", "post.md")
            .with_filters(["upper"])
            .with_filter(FilterRef::wrap("vars", "layout.txt"));

        assert_eq!(index.render(&route).unwrap(), "layout|body=HELLO|/post");
    }

    #[test]
    fn test_missing_override_file() {
        let (_dir, index) = site(&[("post.md", "hello")]);
        let route = Route::new("/post", "post.md").with_filter(FilterRef::wrap("upper", "nope.txt"));

        assert!(index.render(&route).unwrap_err().is_not_found());
    }

    #[test]
    fn test_merge_context() {
        let a = json!({"x": 1, "y": 1}).as_object().cloned().unwrap();
        let b = json!({"y": 2}).as_object().cloned().unwrap();
        let merged = merge_context([&a, &b]);
        assert_eq!(merged.get("x"), Some(&json!(1)));
        assert_eq!(merged.get("y"), Some(&json!(2)));
    }
}
