//! Conversion between OS paths and `file://` URIs.

use crate::lsp::error::{Error, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Convert an absolute path to a `file://` URI string.
pub fn path_to_uri(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(|url| url.to_string())
        .map_err(|_| Error::InvalidPath(path.to_path_buf()))
}

/// Convert a `file://` URI back to a path.
pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    let url = Url::parse(uri).map_err(|_| Error::InvalidPath(PathBuf::from(uri)))?;
    url.to_file_path()
        .map_err(|_| Error::InvalidPath(PathBuf::from(uri)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let path = Path::new("/tmp/project/src/main.rs");
        let uri = path_to_uri(path).unwrap();
        assert_eq!(uri, "file:///tmp/project/src/main.rs");
        assert_eq!(uri_to_path(&uri).unwrap(), path);
    }

    #[test]
    fn spaces_are_percent_encoded() {
        let path = Path::new("/tmp/my project/a.rs");
        let uri = path_to_uri(path).unwrap();
        assert_eq!(uri, "file:///tmp/my%20project/a.rs");
        assert_eq!(uri_to_path(&uri).unwrap(), path);
    }

    #[test]
    fn relative_path_is_rejected() {
        assert!(path_to_uri(Path::new("src/main.rs")).is_err());
    }

    #[test]
    fn non_file_uri_is_rejected() {
        assert!(uri_to_path("https://example.com/a.rs").is_err());
    }
}
