//! Per-platform source formats.
//!
//! Each supported export format contributes a fixed header list (the source
//! file's own header line is replaced by it) and a transform from canonical
//! rows into [`EventRecord`]s. Adding a platform is one registry entry.

pub mod umami;

use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::events::EventRecord;
use crate::tenant::SiteId;

/// One decoded source row: canonical column name to raw value.
pub type CanonicalRow = BTreeMap<String, String>;

/// Canonical column holding the event creation time.
pub const CREATED_AT: &str = "created_at";

/// Maps canonical rows of one platform into storage records.
pub type TransformFn = fn(&[CanonicalRow], SiteId, Uuid) -> Vec<EventRecord>;

/// Header schema and record transform for one platform.
#[derive(Debug, Clone, Copy)]
pub struct ImportPlatform {
    pub name: &'static str,
    pub headers: &'static [&'static str],
    pub transform: TransformFn,
}

impl ImportPlatform {
    pub fn transform(&self, rows: &[CanonicalRow], site: SiteId, import_id: Uuid) -> Vec<EventRecord> {
        (self.transform)(rows, site, import_id)
    }
}

/// Platform tag to format lookup.
#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    platforms: HashMap<&'static str, ImportPlatform>,
}

impl PlatformRegistry {
    /// A registry with no platforms.
    pub fn empty() -> Self {
        Self {
            platforms: HashMap::new(),
        }
    }

    pub fn register(&mut self, platform: ImportPlatform) -> &mut Self {
        self.platforms.insert(platform.name, platform);
        self
    }

    /// Resolves a platform tag. Unknown tags are a configuration error.
    pub fn get(&self, tag: &str) -> Result<&ImportPlatform> {
        self.platforms
            .get(tag)
            .ok_or_else(|| Error::UnsupportedPlatform(tag.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.platforms.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(umami::PLATFORM);
        registry
    }
}
