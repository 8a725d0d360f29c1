//! Answers requests for a live preview straight from an [`Index`].
//!
//! A path is looked up the same way a build lays files out, so whatever [`build()`](crate::build::build)
//! writes at a location is what the responder serves for the path of that location.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error};
use mime_guess::mime;
use percent_encoding::percent_decode_str;

use crate::errors::{IndexError, error_chain};
use crate::index::Index;
use crate::materialize::Materializer;
use crate::route::Route;

pub const STATUS_OK: u16 = 200;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Response {
    fn ok(content_type: String, body: Vec<u8>) -> Self {
        Self {
            status: STATUS_OK,
            content_type,
            body,
        }
    }

    fn not_found() -> Self {
        Self {
            status: STATUS_NOT_FOUND,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: b"Not Found".to_vec(),
        }
    }

    fn error_page(path: &str, err: &dyn std::error::Error) -> Self {
        let body = format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Error: {path}</title></head>\n<body>\n<h1>Failed to render {path}</h1>\n<pre>{chain}</pre>\n</body>\n</html>\n",
            path = html_escape::encode_text(path),
            chain = html_escape::encode_text(&error_chain(err)),
        );

        Self {
            status: STATUS_INTERNAL_ERROR,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into_bytes(),
        }
    }
}

pub struct Responder<'a> {
    index: &'a Index,
    materializer: Materializer,
}

impl<'a> Responder<'a> {
    pub fn new(index: &'a Index) -> Self {
        Self {
            index,
            materializer: index.materializer(""),
        }
    }

    /// Uses `index_file` for URLs that resolve to a directory instead of the index's own, matching
    /// [`BuildOptions::index_file`](crate::build::BuildOptions::index_file).
    pub fn with_index_file(mut self, index_file: impl Into<String>) -> Self {
        self.materializer = self.materializer.with_index_file(index_file);
        self
    }

    /// Renders the route or reads the static file served at `path`.
    ///
    /// `path` is the percent-encoded path of a request.
    pub fn respond(&self, path: &str) -> Response {
        let decoded = percent_decode_str(path).decode_utf8_lossy();
        let path: &str = &decoded;

        match self.lookup(path) {
            Ok(Some(Served::Route(route))) => {
                let content_type = content_type(&self.materializer.key(&route.url));
                match self.index.render(&route) {
                    Ok(content) => Response::ok(content_type, content.into_bytes()),
                    Err(err) if err.is_not_found() => {
                        debug!(target: "render", "{path}: {err}");
                        Response::not_found()
                    }
                    Err(err) => {
                        error!(target: "render", "{}", error_chain(&err));
                        Response::error_page(path, &err)
                    }
                }
            }
            Ok(Some(Served::File(file))) => match fs::read(&file) {
                Ok(body) => Response::ok(content_type(&file.to_string_lossy()), body),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Response::not_found(),
                Err(err) => {
                    error!(target: "static", "{}: {err}", file.display());
                    Response::error_page(path, &err)
                }
            },
            Ok(None) => Response::not_found(),
            Err(err) => {
                error!(target: "index", "{}", error_chain(&err));
                Response::error_page(path, &err)
            }
        }
    }

    fn lookup(&self, path: &str) -> Result<Option<Served>, IndexError> {
        let table = self.index.route_table()?;
        if let Some(route) = table.get(path) {
            return Ok(Some(Served::Route(route.clone())));
        }

        let key = self.materializer.key(path);
        if let Some(route) = table
            .routes()
            .iter()
            .find(|route| self.materializer.key(&route.url) == key)
        {
            return Ok(Some(Served::Route(route.clone())));
        }

        if key.split('/').any(|segment| segment == "..") {
            return Ok(None);
        }

        Ok(self.find_static(&key)?.map(Served::File))
    }

    fn find_static(&self, key: &str) -> Result<Option<PathBuf>, IndexError> {
        for entry in self.index.statics()? {
            let source = self.index.absolute_path(&entry.file);
            let Ok(metadata) = fs::metadata(&source) else {
                continue;
            };

            if metadata.is_dir() {
                let mount = self.materializer.static_key(&entry.url, None);
                let rest = if mount.is_empty() {
                    Some(key)
                } else {
                    key.strip_prefix(mount.as_str())
                        .and_then(|rest| rest.strip_prefix('/'))
                };

                if let Some(rest) = rest {
                    let candidate = join_key(&source, rest);
                    if candidate.is_file() {
                        return Ok(Some(candidate));
                    }
                }
            } else {
                let file_name = source
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if self.materializer.static_key(&entry.url, Some(&file_name)) == key {
                    return Ok(Some(source));
                }
            }
        }

        Ok(None)
    }
}

enum Served {
    Route(Route),
    File(PathBuf),
}

fn join_key(base: &Path, key: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    path.extend(key.split('/').filter(|segment| !segment.is_empty()));
    path
}

/// Guesses a content type from the extension of a materialized file name. Text types are UTF-8.
pub fn content_type(file_name: &str) -> String {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();

    if mime.type_() == mime::TEXT || mime.subtype() == mime::JAVASCRIPT {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}
