#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Modules the end-user will interact directly or indirectly with
pub mod build;
pub mod document;
pub mod errors;
pub mod filters;
pub mod index;
pub mod logging;
pub mod materialize;
pub mod render;
pub mod route;
pub mod serve;
pub mod transform;

// Exports for end-users
pub use build::{BuildOptions, BuildOutput, FailurePolicy, build};
pub use document::{FilterSpec, IndexDocument};
pub use errors::ComposerError;
pub use filters::{Filter, FilterCatalog, FilterContext, FilterFactory, Kwargs};
pub use index::{Index, IndexOptions};
pub use materialize::Materializer;
pub use route::{Context, FilterRef, Route, Static};
pub use serve::{Responder, Response};
