use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use serde::Deserialize;

use super::{Filter, FilterContext, Kwargs, parse_kwargs};
use crate::errors::{FilterError, FilterInitError};

/// Markdown extensions, all configurable through the filter's keyword arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownOptions {
    pub tables: bool,
    pub footnotes: bool,
    pub strikethrough: bool,
    pub tasklists: bool,
    pub smart_punctuation: bool,
    pub heading_attributes: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            tasklists: true,
            smart_punctuation: false,
            heading_attributes: false,
        }
    }
}

impl MarkdownOptions {
    fn parser_options(&self) -> Options {
        // Front matter is always recognized so it can be dropped from the output.
        let mut options = Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;
        options.set(Options::ENABLE_TABLES, self.tables);
        options.set(Options::ENABLE_FOOTNOTES, self.footnotes);
        options.set(Options::ENABLE_STRIKETHROUGH, self.strikethrough);
        options.set(Options::ENABLE_TASKLISTS, self.tasklists);
        options.set(Options::ENABLE_SMART_PUNCTUATION, self.smart_punctuation);
        options.set(Options::ENABLE_HEADING_ATTRIBUTES, self.heading_attributes);
        options
    }
}

/// Converts Markdown to HTML with pulldown-cmark.
pub struct Markdown {
    options: Options,
}

impl Markdown {
    pub fn new(options: &MarkdownOptions) -> Self {
        Self {
            options: options.parser_options(),
        }
    }

    pub fn from_kwargs(kwargs: &Kwargs) -> Result<Self, FilterInitError> {
        let options: MarkdownOptions = parse_kwargs("markdown", kwargs)?;
        Ok(Self::new(&options))
    }

    pub fn render(&self, content: &str) -> String {
        let mut in_frontmatter = false;
        let events = Parser::new_ext(content, self.options).filter(|event| match event {
            Event::Start(Tag::MetadataBlock(_)) => {
                in_frontmatter = true;
                false
            }
            Event::End(TagEnd::MetadataBlock(_)) => {
                in_frontmatter = false;
                false
            }
            _ => !in_frontmatter,
        });

        let mut html_output = String::with_capacity(content.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html_output, events);
        html_output
    }
}

impl Filter for Markdown {
    fn apply(&self, content: &str, _ctx: &FilterContext<'_>) -> Result<String, FilterError> {
        Ok(self.render(content))
    }
}
