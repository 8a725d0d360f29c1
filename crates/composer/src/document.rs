//! Declarative index documents, in JSON or YAML.
//!
//! ```yaml
//! filters:
//!   post:
//!     class: template-container
//!     kwargs:
//!       template: templates/post.html
//! default_context:
//!   site_name: Example
//! routes:
//!   - url: /
//!     file: index.html
//!     filters: [template]
//!   - url: /post/hello
//!     file: posts/hello.md
//!     filters: [markdown, post]
//! static:
//!   - url: /static
//!     file: static
//! ```
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{ConfigError, DocumentError, IndexError};
use crate::filters::{FilterCatalog, Kwargs};
use crate::index::{Index, IndexOptions};
use crate::route::{Context, Route, Static};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default, rename = "static")]
    pub statics: Vec<Static>,
    /// Filter definitions, kept in document order so registration follows it.
    #[serde(default, with = "ordered_filters")]
    pub filters: Vec<(String, FilterSpec)>,
    #[serde(default)]
    pub default_context: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Name of the factory in the [`FilterCatalog`].
    pub class: String,
    #[serde(default, skip_serializing_if = "Kwargs::is_empty")]
    pub kwargs: Kwargs,
}

impl IndexDocument {
    /// Reads a document, choosing the format from the file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let format = Format::from_path(path).ok_or_else(|| DocumentError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;

        let raw = fs::read_to_string(path).map_err(|source| DocumentError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        format.parse(path, &raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    fn parse(&self, path: &Path, raw: &str) -> Result<IndexDocument, DocumentError> {
        match self {
            Format::Json => IndexDocument::from_json(raw).map_err(|source| DocumentError::Json {
                path: path.to_path_buf(),
                source,
            }),
            Format::Yaml => IndexDocument::from_yaml(raw).map_err(|source| DocumentError::Yaml {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl Index {
    /// Builds an index from a document.
    ///
    /// The default filters found in `catalog` are registered first, then every filter of the document in
    /// order. A document filter may therefore replace a default one by reusing its id.
    pub fn from_document(
        document: IndexDocument,
        base_path: impl AsRef<Path>,
        catalog: &FilterCatalog,
        options: IndexOptions,
    ) -> Result<Self, ConfigError> {
        let mut index = Index::empty(base_path, options);
        index.register_default_filters(catalog);

        for (id, spec) in document.filters {
            index.register_from_catalog(&id, &spec.class, catalog, spec.kwargs)?;
        }

        index.set_default_context(document.default_context);
        index.add_routes(document.routes);
        index.add_statics(document.statics);

        Ok(index)
    }

    /// Exports the routes, statics, filters and default context as they currently resolve.
    ///
    /// Filters registered programmatically are exported with their id as class.
    pub fn to_document(&self) -> Result<IndexDocument, IndexError> {
        let filters = self
            .filters()
            .entries()
            .iter()
            .map(|entry| {
                let spec = FilterSpec {
                    class: entry.class.clone().unwrap_or_else(|| entry.id.clone()),
                    kwargs: entry.kwargs.clone(),
                };
                (entry.id.clone(), spec)
            })
            .collect();

        Ok(IndexDocument {
            routes: self.routes()?,
            statics: self.statics()?,
            filters,
            default_context: self.default_context().clone(),
        })
    }
}

mod ordered_filters {
    use super::*;

    pub fn serialize<S: Serializer>(
        filters: &[(String, FilterSpec)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(filters.iter().map(|(id, spec)| (id, spec)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, FilterSpec)>, D::Error> {
        deserializer.deserialize_map(FiltersVisitor)
    }

    struct FiltersVisitor;

    impl<'de> Visitor<'de> for FiltersVisitor {
        type Value = Vec<(String, FilterSpec)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of filter ids to filter definitions")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut filters = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((id, spec)) = map.next_entry::<String, FilterSpec>()? {
                filters.retain(|(existing, _): &(String, FilterSpec)| *existing != id);
                filters.push((id, spec));
            }
            Ok(filters)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::MapFilter;
    use serde_json::json;

    const YAML: &str = r#"
filters:
  zebra:
    class: shout
  alpha:
    class: shout
    kwargs:
      loud: true
default_context:
  site: Example
routes:
  - url: /
    file: index.txt
    filters: [zebra]
  - url: /post/hello
    file: posts/hello.txt
    filters:
      - alpha
      - id: zebra
        file: wrap.txt
        title: Hello
static:
  - url: /static
    file: static
"#;

    fn catalog() -> FilterCatalog {
        let mut catalog = FilterCatalog::empty();
        catalog.insert("shout", MapFilter(|s: &str| s.to_uppercase()));
        catalog
    }

    #[test]
    fn test_yaml_document_keeps_filter_order() {
        let document = IndexDocument::from_yaml(YAML).unwrap();

        let ids: Vec<_> = document.filters.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["zebra", "alpha"]);
        assert_eq!(document.filters[1].1.kwargs.get("loud"), Some(&json!(true)));
        assert_eq!(document.routes.len(), 2);
        assert_eq!(document.statics, vec![Static::new("/static", "static")]);
    }

    #[test]
    fn test_json_document() {
        let document = IndexDocument::from_json(
            r#"{"routes": [{"url": "/", "file": "index.html", "filters": ["markdown"]}]}"#,
        )
        .unwrap();

        assert_eq!(document.routes[0].filters[0].id(), "markdown");
        assert!(document.filters.is_empty());
        assert!(document.statics.is_empty());
    }

    #[test]
    fn test_from_document_registers_in_order() {
        let document = IndexDocument::from_yaml(YAML).unwrap();
        let index = Index::from_document(document, ".", &catalog(), IndexOptions::default()).unwrap();

        assert_eq!(index.filters().ids().collect::<Vec<_>>(), vec!["zebra", "alpha"]);
        assert_eq!(index.default_context().get("site"), Some(&json!("Example")));
        assert!(index.get_route("post/hello").unwrap().is_some());
        assert_eq!(index.statics().unwrap().len(), 1);
        index.validate().unwrap();
    }

    #[test]
    fn test_unknown_class_is_rejected() {
        let document = IndexDocument::from_json(r#"{"filters": {"x": {"class": "nope"}}}"#).unwrap();
        assert!(matches!(
            Index::from_document(document, ".", &catalog(), IndexOptions::default()),
            Err(ConfigError::UnknownFilterClass { .. })
        ));
    }

    #[test]
    fn test_export_matches_document() {
        let document = IndexDocument::from_yaml(YAML).unwrap();
        let index =
            Index::from_document(document.clone(), ".", &catalog(), IndexOptions::default()).unwrap();

        assert_eq!(index.to_document().unwrap(), document);
    }

    #[test]
    fn test_json_export_preserves_filter_order() {
        let document = IndexDocument::from_yaml(YAML).unwrap();
        let json = document.to_json_pretty().unwrap();

        assert!(json.find("\"zebra\"").unwrap() < json.find("\"alpha\"").unwrap());
        assert_eq!(IndexDocument::from_json(&json).unwrap(), document);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("index.yml");
        fs::write(&yaml, YAML).unwrap();
        assert_eq!(IndexDocument::load(&yaml).unwrap().routes.len(), 2);

        let toml = dir.path().join("index.toml");
        fs::write(&toml, "").unwrap();
        assert!(matches!(
            IndexDocument::load(&toml),
            Err(DocumentError::UnsupportedFormat { .. })
        ));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{").unwrap();
        assert!(matches!(
            IndexDocument::load(&broken),
            Err(DocumentError::Json { .. })
        ));
    }
}
