//! Upload request validation.
//!
//! All checks are pure and run in a fixed order (entity type, size, file
//! type, stored field lengths) so an invalid request never produces a
//! storage key, a signed URL, or a row.

use super::error::AttachmentError;
use super::policy::UploadPolicy;
use super::types::EntityType;

/// Longest accepted file name, in characters.
const MAX_FILE_NAME_LEN: usize = 255;

/// Longest accepted content type as sent, parameters included.
const MAX_CONTENT_TYPE_LEN: usize = 255;

/// Outcome of a successful validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    /// Parsed entity type.
    pub entity_type: EntityType,
    /// Lower-case file extension, guaranteed to be allow-listed.
    pub extension: String,
}

/// Parse an entity type token, case-insensitively.
pub fn validate_entity_type(token: &str) -> Result<EntityType, AttachmentError> {
    EntityType::parse(token).ok_or_else(|| {
        let allowed: Vec<&str> = EntityType::ALL.iter().map(EntityType::as_str).collect();
        AttachmentError::validation(format!(
            "unsupported entity type '{token}', expected one of: {}",
            allowed.join(", ")
        ))
    })
}

/// Check `0 < size <= max`.
pub fn validate_file_size(size: i64, max: u64) -> Result<(), AttachmentError> {
    if size <= 0 {
        return Err(AttachmentError::validation(format!(
            "file size must be positive, got {size}"
        )));
    }
    if size.unsigned_abs() > max {
        return Err(AttachmentError::FileTooLarge { size, max });
    }
    Ok(())
}

/// Extract the lower-cased extension after the last `.`.
///
/// Returns `None` when there is no dot, the extension is empty, or it
/// contains anything but ASCII alphanumerics.
#[must_use]
pub fn file_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.trim().rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Strip MIME parameters and lower-case.
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Check the content type and extension against the allow-lists.
///
/// The pair must appear jointly in the image list or jointly in the
/// document list. Returns the normalised extension.
pub fn validate_file_type(
    policy: &UploadPolicy,
    file_name: &str,
    content_type: &str,
) -> Result<String, AttachmentError> {
    let extension = file_extension(file_name).ok_or_else(|| {
        AttachmentError::invalid_file_type(format!("file name '{file_name}' has no extension"))
    })?;
    let content_type = normalize_content_type(content_type);

    if !policy.is_allowed_pair(&content_type, &extension) {
        return Err(AttachmentError::invalid_file_type(format!(
            "content type '{content_type}' with extension '.{extension}' is not allowed"
        )));
    }

    Ok(extension)
}

/// Check that the values persisted verbatim fit their columns.
fn validate_field_lengths(file_name: &str, content_type: &str) -> Result<(), AttachmentError> {
    let name_len = file_name.chars().count();
    if name_len > MAX_FILE_NAME_LEN {
        return Err(AttachmentError::validation(format!(
            "file name is {name_len} characters, maximum is {MAX_FILE_NAME_LEN}"
        )));
    }
    let type_len = content_type.chars().count();
    if type_len > MAX_CONTENT_TYPE_LEN {
        return Err(AttachmentError::validation(format!(
            "content type is {type_len} characters, maximum is {MAX_CONTENT_TYPE_LEN}"
        )));
    }
    Ok(())
}

/// Run every check in order, short-circuiting on the first failure.
pub fn validate_upload(
    policy: &UploadPolicy,
    entity_type: &str,
    file_size: i64,
    file_name: &str,
    content_type: &str,
) -> Result<ValidatedUpload, AttachmentError> {
    let entity_type = validate_entity_type(entity_type)?;
    validate_file_size(file_size, policy.max_file_size)?;
    let extension = validate_file_type(policy, file_name, content_type)?;
    validate_field_lengths(file_name, content_type)?;

    Ok(ValidatedUpload {
        entity_type,
        extension,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: i64 = 1024 * 1024;

    #[test]
    fn test_entity_type_error_names_allowed_set() {
        let err = validate_entity_type("workspace").unwrap_err();
        assert!(matches!(err, AttachmentError::Validation(_)));
        let msg = err.to_string();
        for t in EntityType::ALL {
            assert!(msg.contains(t.as_str()), "{msg} should list {t}");
        }
    }

    #[test]
    fn test_file_size_bounds() {
        let max = UploadPolicy::DEFAULT_MAX_FILE_SIZE;
        assert!(validate_file_size(1, max).is_ok());
        assert!(validate_file_size(20 * MB, max).is_ok());
        assert!(matches!(
            validate_file_size(0, max),
            Err(AttachmentError::Validation(_))
        ));
        assert!(matches!(
            validate_file_size(-5, max),
            Err(AttachmentError::Validation(_))
        ));
        assert!(matches!(
            validate_file_size(20 * MB + 1, max),
            Err(AttachmentError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("trailing."), None);
        assert_eq!(file_extension("weird.p/ng"), None);
    }

    #[test]
    fn test_file_type_pairs() {
        let policy = UploadPolicy::new();
        assert_eq!(
            validate_file_type(&policy, "photo.jpg", "image/jpeg").unwrap(),
            "jpg"
        );
        assert_eq!(
            validate_file_type(&policy, "Scan.PDF", "Application/PDF; charset=binary").unwrap(),
            "pdf"
        );
        assert!(matches!(
            validate_file_type(&policy, "video.mp4", "video/mp4"),
            Err(AttachmentError::InvalidFileType(_))
        ));
        assert!(matches!(
            validate_file_type(&policy, "noext", "image/png"),
            Err(AttachmentError::InvalidFileType(_))
        ));
    }

    #[test]
    fn test_spoofed_content_type_rejected() {
        let policy = UploadPolicy::new();
        // Image content type with a document extension and vice versa
        assert!(validate_file_type(&policy, "report.pdf", "image/png").is_err());
        assert!(validate_file_type(&policy, "photo.png", "application/pdf").is_err());
    }

    #[test]
    fn test_validation_order_entity_type_first() {
        let policy = UploadPolicy::new();
        let err = validate_upload(&policy, "nope", 100 * MB, "video.mp4", "video/mp4").unwrap_err();
        assert!(matches!(err, AttachmentError::Validation(_)));
        assert!(err.to_string().contains("entity type"));
    }

    #[test]
    fn test_validation_order_size_before_type() {
        let policy = UploadPolicy::new();
        let err = validate_upload(&policy, "BOARD", 100 * MB, "video.mp4", "video/mp4").unwrap_err();
        assert!(matches!(err, AttachmentError::FileTooLarge { .. }));
    }

    #[test]
    fn test_overlong_fields_rejected() {
        let policy = UploadPolicy::new();
        let long_name = format!("{}.png", "a".repeat(300));
        let err = validate_upload(&policy, "BOARD", MB, &long_name, "image/png").unwrap_err();
        assert!(matches!(err, AttachmentError::Validation(_)));
        assert!(err.to_string().contains("file name"));

        // Parameters pass the allow-list but still land in the column
        let long_type = format!("image/png; name={}", "x".repeat(300));
        let err = validate_upload(&policy, "BOARD", MB, "photo.png", &long_type).unwrap_err();
        assert!(matches!(err, AttachmentError::Validation(_)));
        assert!(err.to_string().contains("content type"));

        let at_limit = format!("{}.png", "a".repeat(MAX_FILE_NAME_LEN - 4));
        assert!(validate_upload(&policy, "BOARD", MB, &at_limit, "image/png").is_ok());
    }

    #[test]
    fn test_validate_upload_success() {
        let policy = UploadPolicy::new();
        let validated = validate_upload(&policy, "board", MB, "photo.jpg", "image/jpeg").unwrap();
        assert_eq!(validated.entity_type, EntityType::Board);
        assert_eq!(validated.extension, "jpg");
    }
}
