//! A small blog: pages rendered as templates, Markdown posts wrapped in a layout, and a static directory.
use std::path::{Path, PathBuf};

use composer::errors::{ConfigError, IndexError};
use composer::transform::{front_matter, skip_partials};
use composer::{FilterCatalog, Index, Route, Static};
use serde_json::json;

/// Where the demo's sources live.
pub fn content_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("content")
}

pub fn site_index(base_path: impl AsRef<Path>) -> Result<Index, ConfigError> {
    let catalog = FilterCatalog::builtin();
    let mut index = Index::new(base_path);

    let lookup = json!({"directories": ["templates", "pages"]});
    let lookup = lookup.as_object().cloned().unwrap_or_default();

    index.register_from_catalog("template", "template", &catalog, lookup.clone())?;

    let mut post = lookup;
    post.insert("template".into(), json!("post.html"));
    index.register_from_catalog("post", "template-container", &catalog, post)?;

    index.set_default_context(
        json!({"site_name": "Simple Site"})
            .as_object()
            .cloned()
            .unwrap_or_default(),
    );

    index.add_route_source(pages);
    index.add_route_source(posts);
    index.add_transform(skip_partials("_"));
    index.add_transform(front_matter());
    index.add_statics(vec![Static::new("/static", "static")]);

    Ok(index)
}

fn pages(index: &Index) -> Result<Vec<Route>, IndexError> {
    let mut routes = Vec::new();

    for path in index.walk("pages", &[], &["*.html"])? {
        let path = path?;
        let stem = page_stem(&path);
        let url = if stem == "index" {
            index.absolute_url("")
        } else {
            index.absolute_url(&stem)
        };

        let context = json!({"title": title_case(&stem)});
        routes.push(
            Route::new(url, path)
                .with_filters(["template"])
                .with_context(context.as_object().cloned().unwrap_or_default()),
        );
    }

    Ok(routes)
}

fn posts(index: &Index) -> Result<Vec<Route>, IndexError> {
    let mut routes = Vec::new();

    for path in index.walk("posts", &[], &["*.md"])? {
        let path = path?;
        let url = index.absolute_url(&format!("post/{}", page_stem(&path)));
        routes.push(Route::new(url, path).with_filters(["markdown", "post"]));
    }

    Ok(routes)
}

fn page_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn title_case(stem: &str) -> String {
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
