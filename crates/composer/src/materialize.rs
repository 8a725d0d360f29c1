//! Mapping of logical URLs to locations in an output tree.
//!
//! The last segment of a URL is a file name when it contains a `.` and the URL has no trailing slash.
//! Every other URL is a directory holding the index file:
//!
//! | URL | Directory | File |
//! |---|---|---|
//! | `/` | `root` | `index.html` |
//! | `/foo` | `root/foo` | `index.html` |
//! | `/bar.html` | `root` | `bar.html` |
//! | `/bar.html/` | `root/bar.html` | `index.html` |
//! | `/feed.xml` | `root` | `feed.xml` |
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_INDEX_FILE: &str = "index.html";

/// Where a URL lives once materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub dir: PathBuf,
    pub file_name: String,
}

impl Materialized {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

#[derive(Debug, Clone)]
pub struct Materializer {
    root: PathBuf,
    index_file: String,
}

impl Materializer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_file: DEFAULT_INDEX_FILE.to_string(),
        }
    }

    pub fn with_index_file(mut self, index_file: impl Into<String>) -> Self {
        self.index_file = index_file.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_file(&self) -> &str {
        &self.index_file
    }

    pub fn resolve(&self, url: &str) -> Materialized {
        let (dirs, file_name) = self.split(url);

        let mut dir = self.root.clone();
        dir.extend(dirs);

        Materialized { dir, file_name }
    }

    /// The materialized location of `url` relative to the root, with `/` separators.
    ///
    /// Two URLs are served by the same content exactly when their keys are equal.
    pub fn key(&self, url: &str) -> String {
        let (mut segments, file_name) = self.split(url);
        segments.push(file_name.as_str());
        segments.join("/")
    }

    /// Whether the last segment of `url` is a file name rather than a directory.
    pub fn is_file_url(url: &str) -> bool {
        !url.ends_with('/')
            && url
                .rsplit('/')
                .next()
                .is_some_and(|segment| segment.contains('.'))
    }

    /// Relative key under which a static entry is copied.
    ///
    /// A directory (`file_name` is `None`) is mounted at the URL taken as a directory. A file lands at
    /// the URL when it names a file, and inside the URL's directory under its own `file_name` otherwise.
    pub fn static_key(&self, url: &str, file_name: Option<&str>) -> String {
        let mut segments = url_segments(url);
        match file_name {
            Some(_) if Self::is_file_url(url) => {}
            Some(file_name) => segments.push(file_name),
            None => {}
        }
        segments.join("/")
    }

    /// Turns a relative key back into a path under the root.
    pub fn path_for_key(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(url_segments(key));
        path
    }

    /// Writes `content` at the materialized location of `url`, creating directories as needed.
    pub fn write(&self, url: &str, content: impl AsRef<[u8]>) -> io::Result<PathBuf> {
        let materialized = self.resolve(url);
        fs::create_dir_all(&materialized.dir)?;

        let path = materialized.path();
        fs::write(&path, content)?;
        Ok(path)
    }

    fn split<'a>(&self, url: &'a str) -> (Vec<&'a str>, String) {
        let mut segments = url_segments(url);

        if Self::is_file_url(url)
            && let Some(file_name) = segments.pop()
        {
            return (segments, file_name.to_string());
        }

        (segments, self.index_file.clone())
    }
}

fn url_segments(url: &str) -> Vec<&str> {
    url.split('/').filter(|segment| !segment.is_empty()).collect()
}
