//! Resource location resolution
//!
//! `schemaLocation` hints of imports are resolved here, relative to the
//! directory of the importing document.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Resource location - can be a URL, file path, or string identifier
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// URL (http, https, file, ...)
    Url(Url),
    /// Relative reference, resolved against a base directory
    String(String),
}

impl Location {
    /// Create a location from a string (auto-detect type)
    pub fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::Resource("empty location".to_string()));
        }
        if let Ok(url) = Url::parse(s) {
            // Windows drive letters parse as one-letter schemes
            if url.scheme().len() > 1 {
                return Ok(Location::Url(url));
            }
        }
        let path = PathBuf::from(s);
        if path.is_absolute() || s.starts_with('.') {
            return Ok(Location::Path(path));
        }
        Ok(Location::String(s.to_string()))
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Url(u) => u.to_string(),
            Location::String(s) => s.clone(),
        }
    }

    /// Check if this is a remote location (URL other than `file:`)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(u) if u.scheme() != "file")
    }

    /// Check if this is a local file
    pub fn is_file(&self) -> bool {
        match self {
            Location::Path(_) | Location::String(_) => true,
            Location::Url(u) => u.scheme() == "file",
        }
    }

    /// Resolve to a local file path; relative locations are taken relative
    /// to `base_dir`
    pub fn resolve(&self, base_dir: &Path) -> Result<PathBuf> {
        match self {
            Location::Path(p) if p.is_absolute() => Ok(p.clone()),
            Location::Path(p) => Ok(base_dir.join(p)),
            Location::String(s) => Ok(base_dir.join(s)),
            Location::Url(u) if u.scheme() == "file" => u
                .to_file_path()
                .map_err(|_| Error::Resource(format!("not a local file URL: {}", u))),
            Location::Url(u) => Err(Error::Resource(format!("remote locations are not loaded: {}", u))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_url() {
        let loc = Location::from_str("http://example.com/schema.json").unwrap();
        assert!(matches!(loc, Location::Url(_)));
        assert!(loc.is_remote());
        assert!(loc.resolve(Path::new("/tmp")).is_err());
    }

    #[test]
    fn test_location_from_path() {
        let loc = Location::from_str("/tmp/schema.json").unwrap();
        assert!(matches!(loc, Location::Path(_)));
        assert!(loc.is_file());
        assert_eq!(loc.resolve(Path::new("/elsewhere")).unwrap(), PathBuf::from("/tmp/schema.json"));
    }

    #[test]
    fn test_relative_locations() {
        let base = Path::new("/schemas");
        let plain = Location::from_str("common.json").unwrap();
        assert_eq!(plain.as_str(), "common.json");
        assert_eq!(plain.resolve(base).unwrap(), PathBuf::from("/schemas/common.json"));
        let dotted = Location::from_str("./types/common.json").unwrap();
        assert_eq!(dotted.resolve(base).unwrap(), PathBuf::from("/schemas/./types/common.json"));
    }

    #[test]
    fn test_empty_location() {
        assert!(Location::from_str("  ").is_err());
    }
}
