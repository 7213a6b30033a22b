//! The precache manifest: the fixed set of same-origin paths installed
//! into the precache before the worker starts serving.

use url::Url;

use crate::error::Error;

/// One entry in the precache manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheEntry {
    /// Absolute URL the entry is fetched from and keyed under.
    pub url: Url,
    /// The origin-relative path the entry was declared with.
    pub path: String,
}

/// An ordered list of URLs to install into the precache.
#[derive(Debug, Clone, Default)]
pub struct PrecacheManifest {
    entries: Vec<PrecacheEntry>,
}

impl PrecacheManifest {
    /// Resolve origin-relative paths against the worker origin.
    ///
    /// Paths must start with `/`; duplicates collapse to the first
    /// occurrence so install never double-fetches an entry.
    pub fn from_paths<I, S>(origin: &Url, paths: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<PrecacheEntry> = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if !path.starts_with('/') {
                return Err(Error::InvalidUrl(format!("precache path must be origin-relative: {path}")));
            }
            let url = origin
                .join(path)
                .map_err(|e| Error::InvalidUrl(format!("precache path {path}: {e}")))?;
            if entries.iter().any(|entry| entry.url == url) {
                continue;
            }
            entries.push(PrecacheEntry { url, path: path.to_string() });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[PrecacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the manifest URL for an origin-relative path.
    pub fn url_for(&self, path: &str) -> Option<&Url> {
        self.entries.iter().find(|entry| entry.path == path).map(|entry| &entry.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:8080/").unwrap()
    }

    #[test]
    fn test_paths_resolve_against_origin() {
        let manifest = PrecacheManifest::from_paths(&origin(), ["/", "/index.html", "/offline.html"]).unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.entries()[0].url.as_str(), "http://localhost:8080/");
        assert_eq!(manifest.entries()[2].url.as_str(), "http://localhost:8080/offline.html");
        assert_eq!(manifest.url_for("/offline.html").unwrap().path(), "/offline.html");
    }

    #[test]
    fn test_duplicates_collapse() {
        let manifest = PrecacheManifest::from_paths(&origin(), ["/a.html", "/a.html", "/b.html"]).unwrap();
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn test_relative_path_rejected() {
        let err = PrecacheManifest::from_paths(&origin(), ["offline.html"]).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
