//! Storage key construction.
//!
//! Keys follow
//! `{category}/{entity_plural}/{parent_id}/{YYYY}/{MM}/{uuid}_{unix_millis}.{ext}`
//! and are the only reference to an object persisted in the database.

use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

use super::types::EntityType;

/// Builds collision-resistant storage keys under a fixed category root.
#[derive(Debug, Clone)]
pub struct StorageKeyBuilder {
    category_root: String,
}

impl StorageKeyBuilder {
    /// Create a builder for the given category root.
    #[must_use]
    pub fn new(category_root: impl Into<String>) -> Self {
        Self {
            category_root: category_root.into().trim_matches('/').to_string(),
        }
    }

    /// Build a fresh key for an upload.
    ///
    /// `extension` must already be validated.
    #[must_use]
    pub fn build(
        &self,
        entity_type: EntityType,
        parent_id: Uuid,
        extension: &str,
        now: DateTime<Utc>,
    ) -> String {
        format!(
            "{}/{}/{}/{:04}/{:02}/{}_{}.{}",
            self.category_root,
            entity_type.plural(),
            parent_id,
            now.year(),
            now.month(),
            Uuid::new_v4().simple(),
            now.timestamp_millis(),
            extension
        )
    }

    /// Prefix every key for `entity_type` starts with.
    #[must_use]
    pub fn entity_prefix(&self, entity_type: EntityType) -> String {
        format!("{}/{}/", self.category_root, entity_type.plural())
    }

    /// Check that `key` was issued for `entity_type` with `extension`.
    #[must_use]
    pub fn is_issued_for(&self, key: &str, entity_type: EntityType, extension: &str) -> bool {
        StorageKey::parse(key).is_some_and(|parsed| {
            parsed.category == self.category_root
                && parsed.entity_type == entity_type
                && parsed.extension == extension
        })
    }
}

/// Components of a well-formed storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    /// Category root.
    pub category: String,
    /// Entity type decoded from the plural segment.
    pub entity_type: EntityType,
    /// Parent scope.
    pub parent_id: Uuid,
    /// Four-digit year.
    pub year: i32,
    /// Month, 1 to 12.
    pub month: u32,
    /// Lower-case extension.
    pub extension: String,
}

impl StorageKey {
    /// Parse a key produced by [`StorageKeyBuilder::build`].
    ///
    /// Returns `None` for anything that does not match the grammar.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let segments: Vec<&str> = key.split('/').collect();
        let [category, plural, parent, year, month, file] = segments.as_slice() else {
            return None;
        };
        if category.is_empty() {
            return None;
        }

        let entity_type = EntityType::from_plural(plural)?;
        let parent_id = Uuid::parse_str(parent).ok()?;

        if year.len() != 4 || month.len() != 2 {
            return None;
        }
        let year: i32 = year.parse().ok()?;
        let month: u32 = month.parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }

        let (stem, extension) = file.rsplit_once('.')?;
        if extension.is_empty()
            || !extension
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return None;
        }
        let (id, millis) = stem.split_once('_')?;
        if id.len() != 32 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        millis.parse::<i64>().ok()?;

        Some(Self {
            category: (*category).to_string(),
            entity_type,
            parent_id,
            year,
            month,
            extension: extension.to_string(),
        })
    }
}
