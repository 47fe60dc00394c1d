//! Attachment types and data structures.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of entity an attachment can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// Board.
    Board,
    /// Comment on a board or project.
    Comment,
    /// Project.
    Project,
    /// User profile.
    Profile,
}

impl EntityType {
    /// Every supported entity type.
    pub const ALL: [Self; 4] = [Self::Board, Self::Comment, Self::Project, Self::Profile];

    /// Canonical upper-case token.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Board => "BOARD",
            Self::Comment => "COMMENT",
            Self::Project => "PROJECT",
            Self::Profile => "PROFILE",
        }
    }

    /// Plural path segment used in storage keys.
    #[must_use]
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Board => "boards",
            Self::Comment => "comments",
            Self::Project => "projects",
            Self::Profile => "profiles",
        }
    }

    /// Parses a token case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BOARD" => Some(Self::Board),
            "COMMENT" => Some(Self::Comment),
            "PROJECT" => Some(Self::Project),
            "PROFILE" => Some(Self::Profile),
            _ => None,
        }
    }

    /// Parses the plural storage key segment.
    #[must_use]
    pub fn from_plural(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.plural() == s)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attachment lifecycle status.
///
/// The only transition is `Temp -> Confirmed`. Deletion is tracked by
/// `deleted_at` and is reachable from either status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentStatus {
    /// Uploaded or pending upload, not yet bound to an entity.
    Temp,
    /// Bound to its owning entity.
    Confirmed,
}

impl AttachmentStatus {
    /// Convert to database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temp => "TEMP",
            Self::Confirmed => "CONFIRMED",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TEMP" => Some(Self::Temp),
            "CONFIRMED" => Some(Self::Confirmed),
            _ => None,
        }
    }
}

impl fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for issuing a signed upload URL.
#[derive(Debug, Clone)]
pub struct IssueUploadInput {
    /// Raw entity type token from the client.
    pub entity_type: String,
    /// Workspace or parent entity the upload is scoped to.
    pub parent_id: Uuid,
    /// Original filename.
    pub file_name: String,
    /// Declared file size in bytes.
    pub file_size: i64,
    /// Declared MIME type.
    pub content_type: String,
    /// Authenticated requester.
    pub requested_by: Uuid,
}

/// Result of issuing a signed upload URL.
#[derive(Debug, Clone)]
pub struct IssueUploadResult {
    /// Generated attachment ID.
    pub attachment_id: Uuid,
    /// Presigned upload URL.
    pub upload_url: String,
    /// HTTP method to use (PUT).
    pub upload_method: String,
    /// Required headers for the upload.
    pub upload_headers: HashMap<String, String>,
    /// Storage key the client uploads to.
    pub storage_key: String,
    /// Validity of the upload URL in seconds.
    pub expires_in_seconds: u64,
}

/// Input for registering metadata of an object the client already placed.
#[derive(Debug, Clone)]
pub struct RegisterMetadataInput {
    /// Raw entity type token from the client.
    pub entity_type: String,
    /// Storage key obtained from a prior authorization.
    pub storage_key: String,
    /// Original filename.
    pub file_name: String,
    /// Declared file size in bytes.
    pub file_size: i64,
    /// Declared MIME type.
    pub content_type: String,
    /// Authenticated requester.
    pub requested_by: Uuid,
}

/// Input for creating a TEMP attachment record.
#[derive(Debug, Clone)]
pub struct CreateAttachmentInput {
    /// Attachment ID, generated by the service.
    pub id: Uuid,
    /// Entity type.
    pub entity_type: EntityType,
    /// Original filename.
    pub file_name: String,
    /// Storage key.
    pub storage_key: String,
    /// File size in bytes.
    pub file_size: i64,
    /// MIME type.
    pub content_type: String,
    /// User who requested the upload.
    pub uploaded_by: Uuid,
    /// When the TEMP record becomes eligible for sweeping.
    pub expires_at: DateTime<Utc>,
}

/// Attachment domain model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Unique identifier.
    pub id: Uuid,
    /// Entity type.
    pub entity_type: EntityType,
    /// Owning entity, set once on confirmation.
    pub entity_id: Option<Uuid>,
    /// Lifecycle status.
    pub status: AttachmentStatus,
    /// Original filename.
    pub file_name: String,
    /// Storage key (never a full URL).
    pub storage_key: String,
    /// File size in bytes.
    pub file_size: i64,
    /// MIME type.
    pub content_type: String,
    /// User who requested the upload.
    pub uploaded_by: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Expiry of a TEMP record.
    pub expires_at: Option<DateTime<Utc>>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Attachment {
    /// Returns true while the attachment is not bound to an entity.
    #[must_use]
    pub fn is_temp(&self) -> bool {
        self.status == AttachmentStatus::Temp
    }

    /// Returns true once soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns true if this is a TEMP record past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_temp() && self.expires_at.is_some_and(|at| at < now)
    }

    /// Checks the status/entity invariants.
    ///
    /// TEMP rows have no entity and an expiry; CONFIRMED rows have an entity.
    #[must_use]
    pub fn holds_status_invariant(&self) -> bool {
        match self.status {
            AttachmentStatus::Temp => self.entity_id.is_none() && self.expires_at.is_some(),
            AttachmentStatus::Confirmed => self.entity_id.is_some(),
        }
    }
}

/// An attachment paired with a freshly derived readable URL.
#[derive(Debug, Clone)]
pub struct ResolvedAttachment {
    /// Stored metadata.
    pub attachment: Attachment,
    /// Readable URL derived from the storage key.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_parse_is_case_insensitive() {
        assert_eq!(EntityType::parse("board"), Some(EntityType::Board));
        assert_eq!(EntityType::parse("Comment"), Some(EntityType::Comment));
        assert_eq!(EntityType::parse(" PROJECT "), Some(EntityType::Project));
        assert_eq!(EntityType::parse("pRoFiLe"), Some(EntityType::Profile));
        assert_eq!(EntityType::parse("workspace"), None);
        assert_eq!(EntityType::parse(""), None);
    }

    #[test]
    fn test_entity_type_plural_roundtrip() {
        for t in EntityType::ALL {
            assert_eq!(EntityType::from_plural(t.plural()), Some(t));
            assert_eq!(EntityType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EntityType::from_plural("board"), None);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(AttachmentStatus::parse("TEMP"), Some(AttachmentStatus::Temp));
        assert_eq!(
            AttachmentStatus::parse("CONFIRMED"),
            Some(AttachmentStatus::Confirmed)
        );
        assert_eq!(AttachmentStatus::parse("DELETED"), None);
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&AttachmentStatus::Confirmed).unwrap();
        assert_eq!(json, "\"CONFIRMED\"");
        let json = serde_json::to_string(&EntityType::Board).unwrap();
        assert_eq!(json, "\"BOARD\"");
    }
}
