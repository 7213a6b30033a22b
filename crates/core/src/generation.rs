//! Cache generation tags and cache naming.
//!
//! Versioned caches are named `{purpose}-v{generation}`; bumping the
//! generation makes the old names stale so activation can delete them
//! wholesale. Shared caches (fonts, CDN assets) carry no generation suffix
//! and survive generation bumps.

use std::fmt;

/// The version tag burned into every versioned cache name.
///
/// Exactly one generation is current for a running worker. Tags are
/// restricted to `[A-Za-z0-9._]` so the `-v` marker in cache names stays
/// unambiguous; [`Generation::is_valid_tag`] is enforced at config load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation(String);

impl Generation {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a string is usable as a generation tag.
    pub fn is_valid_tag(tag: &str) -> bool {
        !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The name of one named cache in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheName(String);

impl CacheName {
    /// A generation-scoped cache: `{purpose}-v{generation}`.
    pub fn versioned(purpose: &str, generation: &Generation) -> Self {
        Self(format!("{purpose}-v{generation}"))
    }

    /// A generation-independent cache, left untouched by activation.
    pub fn shared(purpose: &str) -> Self {
        Self(purpose.to_string())
    }

    /// The precache for a generation, holding the install manifest.
    pub fn precache(generation: &Generation) -> Self {
        Self::versioned("precache", generation)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the generation tag from a versioned cache name, if the name
    /// follows the `{purpose}-v{tag}` scheme. Shared names return `None`,
    /// as does anything whose suffix is not a plausible tag (so a name like
    /// `foo-very-bar` is never mistaken for a versioned cache).
    pub fn generation_suffix(name: &str) -> Option<&str> {
        let (prefix, suffix) = name.rsplit_once("-v")?;
        if prefix.is_empty() || !Generation::is_valid_tag(suffix) {
            return None;
        }
        Some(suffix)
    }

    /// Whether a cache name belongs to a generation other than `current`.
    ///
    /// The suffix comparison is exact: `static-resources-v12` is stale when
    /// the current generation is `1`.
    pub fn is_stale(name: &str, current: &Generation) -> bool {
        Self::generation_suffix(name).is_some_and(|tag| tag != current.as_str())
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
