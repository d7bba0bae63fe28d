//! Media-type driven file resolution.
//!
//! Every servable media type maps to one content root under the configured
//! base directory. A request path is joined onto that root after its leading
//! slash and query string are stripped. Paths that would climb out of the
//! root are refused before the filesystem is touched.

use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

/// The directories content is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRoot {
    /// `www/`: HTML documents
    Document,
    /// `static/`: plain text and stylesheets
    Static,
    /// `static/images/`
    Image,
    /// `cert/`
    Certificate,
    /// `static/js/`
    Script,
}

impl ContentRoot {
    pub fn dir(&self) -> &'static str {
        match self {
            ContentRoot::Document => "www",
            ContentRoot::Static => "static",
            ContentRoot::Image => "static/images",
            ContentRoot::Certificate => "cert",
            ContentRoot::Script => "static/js",
        }
    }

    /// Picks the root for a `main/sub` media type.
    pub fn for_mime(mime: &str) -> Result<Self, ContentError> {
        let unsupported = || ContentError::UnsupportedMediaType(mime.to_string());
        let (main, sub) = mime.split_once('/').ok_or_else(unsupported)?;

        match (main, sub) {
            ("text", "html") => Ok(ContentRoot::Document),
            ("text", "plain" | "css") => Ok(ContentRoot::Static),
            ("image", "png" | "jpeg" | "x-icon" | "vnd.microsoft.icon") => Ok(ContentRoot::Image),
            ("application", "x-x509-ca-cert") => Ok(ContentRoot::Certificate),
            ("application", "javascript") => Ok(ContentRoot::Script),
            _ => Err(unsupported()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("unsupported media type {0}")]
    UnsupportedMediaType(String),

    #[error("path escapes its content root: {0}")]
    OutsideRoot(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    ServerError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ContentError {
    /// Fixed body sent for load failures.
    pub fn canonical_body(&self) -> &'static [u8] {
        match self {
            ContentError::ServerError { .. } => b"500",
            _ => b"404",
        }
    }
}

/// Loads files from the content roots under one base directory.
#[derive(Debug, Clone)]
pub struct ContentResolver {
    base_dir: PathBuf,
}

impl ContentResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory that serves `mime`.
    pub fn root_dir(&self, mime: &str) -> Result<PathBuf, ContentError> {
        let root = ContentRoot::for_mime(mime)?;
        Ok(self.base_dir.join(root.dir()))
    }

    /// Reads the file for `path` out of the root that serves `mime`.
    pub fn load(&self, path: &str, mime: &str) -> Result<Vec<u8>, ContentError> {
        let root = self.root_dir(mime)?;
        let relative = confine(path)?;
        let file = root.join(relative);

        debug!(file = %file.display(), mime, "Serving content");

        std::fs::read(&file).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ContentError::NotFound(file)
            } else {
                warn!(file = %file.display(), error = %source, "Content read failed");
                ContentError::ServerError { path: file, source }
            }
        })
    }
}

/// Strips the query and one leading slash, then refuses anything that is not
/// a plain relative path.
fn confine(path: &str) -> Result<&Path, ContentError> {
    let path = path.split('?').next().unwrap_or(path);
    let relative = Path::new(path.strip_prefix('/').unwrap_or(path));

    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if escapes {
        warn!(path, "Refusing path outside content root");
        return Err(ContentError::OutsideRoot(path.to_string()));
    }

    Ok(relative)
}
