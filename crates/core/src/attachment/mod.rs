//! Direct-upload attachment lifecycle.
//!
//! Clients upload file bytes straight to object storage using a signed URL;
//! this module only ever handles metadata. An attachment starts as a TEMP
//! row with an expiry, is bound to its owning entity by [`AttachmentService::confirm`],
//! and is removed either by its uploader or, if never confirmed, by the
//! [`ExpirationSweeper`].
//!
//! - Upload request validation
//! - Storage key construction
//! - Signed upload URL issuance and metadata registration
//! - Confirmation, retrieval with derived URLs, and deletion
//! - Expired TEMP cleanup

mod error;
mod key;
mod policy;
mod service;
mod sweeper;
mod types;
mod validation;

#[cfg(test)]
mod mocks;
#[cfg(test)]
mod props;

pub use error::AttachmentError;
pub use key::{StorageKey, StorageKeyBuilder};
pub use policy::{AllowedFileType, UploadPolicy};
pub use service::{AttachmentRepository, AttachmentService};
pub use sweeper::{ExpirationSweeper, SweepReport, SweeperConfig};
pub use types::{
    Attachment, AttachmentStatus, CreateAttachmentInput, EntityType, IssueUploadInput,
    IssueUploadResult, RegisterMetadataInput, ResolvedAttachment,
};
pub use validation::{
    ValidatedUpload, file_extension, validate_entity_type, validate_file_size, validate_file_type,
    validate_upload,
};
