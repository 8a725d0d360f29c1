//! Tera-backed template filters.
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use log::debug;
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::Deserialize;
use tera::Tera;
use walkdir::WalkDir;

use super::{Filter, FilterContext, Kwargs, parse_kwargs};
use crate::errors::{FilterError, FilterInitError};
use crate::index::Index;

/// Where templates referenced by `{% include %}` and `{% extends %}` are looked up.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplateLookup {
    /// Directories, relative to the index base path. Templates are named by their path inside them.
    pub directories: Vec<PathBuf>,
    /// Escape HTML in `.html`, `.htm` and `.xml` templates. Off by default: site content is trusted.
    pub autoescape: bool,
}

impl TemplateLookup {
    fn load(&self, filter: &'static str, index: &Index) -> Result<Tera, FilterInitError> {
        let mut tera = Tera::default();
        if !self.autoescape {
            tera.autoescape_on(vec![]);
        }

        let mut files = Vec::new();
        for directory in &self.directories {
            let root = index.absolute_path(directory);
            for entry in WalkDir::new(&root).follow_links(true) {
                let entry = entry.map_err(|err| FilterInitError::Setup {
                    filter,
                    message: format!("failed to read template directory {}: {err}", root.display()),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = template_name(&root, entry.path());
                files.push((entry.path().to_path_buf(), Some(name)));
            }
        }

        debug!(target: "filters", "{filter}: loading {} template(s)", files.len());

        tera.add_template_files(files)
            .map_err(|err| setup_error(filter, err))?;
        Ok(tera)
    }
}

fn template_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn setup_error(filter: &'static str, err: tera::Error) -> FilterInitError {
    FilterInitError::Setup {
        filter,
        message: crate::errors::error_chain(&err),
    }
}

fn tera_context(ctx: &FilterContext<'_>) -> tera::Context {
    let mut context = tera::Context::new();
    for (key, value) in ctx.vars {
        context.insert(key, value);
    }
    context.insert("route", ctx.route);
    context.insert("base_url", ctx.index.base_url());
    context
}

fn render_error(err: tera::Error) -> FilterError {
    FilterError::Other(Box::new(err))
}

/// Renders the piped content itself as a Tera template.
///
/// Content is registered next to the lookup templates under a name derived from the route URL, and
/// registered again only when it changes.
pub struct Template {
    inline: RwLock<InlineTemplates>,
}

struct InlineTemplates {
    tera: Tera,
    /// Content hash of the inline template registered for each name.
    hashes: FxHashMap<String, u64>,
}

impl Template {
    pub fn new(index: &Index, lookup: &TemplateLookup) -> Result<Self, FilterInitError> {
        Ok(Self {
            inline: RwLock::new(InlineTemplates {
                tera: lookup.load("template", index)?,
                hashes: FxHashMap::default(),
            }),
        })
    }

    pub fn from_kwargs(index: &Index, kwargs: &Kwargs) -> Result<Self, FilterInitError> {
        let lookup: TemplateLookup = parse_kwargs("template", kwargs)?;
        Self::new(index, &lookup)
    }
}

impl Filter for Template {
    fn apply(&self, content: &str, ctx: &FilterContext<'_>) -> Result<String, FilterError> {
        let name = format!("{INLINE_PREFIX}{}", ctx.route.url);
        let hash = FxBuildHasher.hash_one(content);
        let context = tera_context(ctx);

        {
            let inline = self.inline.read().unwrap_or_else(PoisonError::into_inner);
            if inline.hashes.get(&name) == Some(&hash) {
                return inline.tera.render(&name, &context).map_err(render_error);
            }
        }

        let mut inline = self.inline.write().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = inline.tera.add_raw_template(&name, content) {
            // A template that fails to resolve stays registered and breaks every later registration.
            inline.hashes.remove(&name);
            let _ = inline.tera.add_raw_template(&name, "");
            return Err(render_error(err));
        }
        inline.hashes.insert(name.clone(), hash);
        inline.tera.render(&name, &context).map_err(render_error)
    }
}

const INLINE_PREFIX: &str = "__composer_inline__";

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerOptions {
    /// Template wrapping the content, by lookup name or by path relative to the base path.
    pub template: String,
    #[serde(flatten)]
    pub lookup: TemplateLookup,
}

/// Renders a fixed template with the piped content available as `body`.
pub struct TemplateContainer {
    tera: Tera,
    template: String,
}

impl TemplateContainer {
    pub fn new(index: &Index, options: &ContainerOptions) -> Result<Self, FilterInitError> {
        let filter = "template-container";
        let mut tera = options.lookup.load(filter, index)?;

        if !tera.get_template_names().any(|name| name == options.template) {
            let path = index.absolute_path(&options.template);
            tera.add_template_file(&path, Some(options.template.as_str()))
                .map_err(|err| setup_error(filter, err))?;
        }

        Ok(Self {
            tera,
            template: options.template.clone(),
        })
    }

    pub fn from_kwargs(index: &Index, kwargs: &Kwargs) -> Result<Self, FilterInitError> {
        let options: ContainerOptions = parse_kwargs("template-container", kwargs)?;
        Self::new(index, &options)
    }
}

impl Filter for TemplateContainer {
    fn apply(&self, content: &str, ctx: &FilterContext<'_>) -> Result<String, FilterError> {
        let mut context = tera_context(ctx);
        context.insert("body", content);
        self.tera
            .render(&self.template, &context)
            .map_err(render_error)
    }
}
