//! Upload policy: size limit, allow-lists, and TEMP lifetime.

/// A content type together with the extensions it may be paired with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedFileType {
    /// Lower-case MIME type without parameters.
    pub content_type: String,
    /// Lower-case extensions without the leading dot.
    pub extensions: Vec<String>,
}

impl AllowedFileType {
    /// Create an allow-list entry. Values are normalised to lower case.
    #[must_use]
    pub fn new(content_type: impl Into<String>, extensions: &[&str]) -> Self {
        Self {
            content_type: content_type.into().trim().to_ascii_lowercase(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn matches(&self, content_type: &str, extension: &str) -> bool {
        self.content_type == content_type && self.extensions.iter().any(|e| e == extension)
    }
}

/// Upload policy enforced before any storage or persistence call.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Maximum file size in bytes.
    pub max_file_size: u64,
    /// Image allow-list.
    pub image_types: Vec<AllowedFileType>,
    /// Document allow-list.
    pub document_types: Vec<AllowedFileType>,
    /// Lifetime of a TEMP record in seconds.
    pub temp_ttl_secs: u64,
    /// First path segment of every storage key.
    pub category_root: String,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadPolicy {
    /// Default max file size: 20MB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;
    /// Default TEMP lifetime: 1 hour.
    pub const DEFAULT_TEMP_TTL: u64 = 3600;
    /// Default key category.
    pub const DEFAULT_CATEGORY_ROOT: &'static str = "attachments";

    /// Create a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            image_types: Self::default_image_types(),
            document_types: Self::default_document_types(),
            temp_ttl_secs: Self::DEFAULT_TEMP_TTL,
            category_root: Self::DEFAULT_CATEGORY_ROOT.to_string(),
        }
    }

    /// Set maximum file size.
    #[must_use]
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Replace the image allow-list.
    #[must_use]
    pub fn with_image_types(mut self, types: Vec<AllowedFileType>) -> Self {
        self.image_types = types;
        self
    }

    /// Replace the document allow-list.
    #[must_use]
    pub fn with_document_types(mut self, types: Vec<AllowedFileType>) -> Self {
        self.document_types = types;
        self
    }

    /// Set TEMP lifetime.
    #[must_use]
    pub fn with_temp_ttl(mut self, secs: u64) -> Self {
        self.temp_ttl_secs = secs;
        self
    }

    /// Set the key category root.
    #[must_use]
    pub fn with_category_root(mut self, root: impl Into<String>) -> Self {
        self.category_root = root.into();
        self
    }

    /// TEMP lifetime as a chrono duration.
    #[must_use]
    pub fn temp_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.temp_ttl_secs).unwrap_or(i64::MAX))
    }

    /// Default image allow-list.
    #[must_use]
    pub fn default_image_types() -> Vec<AllowedFileType> {
        vec![
            AllowedFileType::new("image/jpeg", &["jpg", "jpeg"]),
            AllowedFileType::new("image/png", &["png"]),
            AllowedFileType::new("image/gif", &["gif"]),
            AllowedFileType::new("image/webp", &["webp"]),
        ]
    }

    /// Default document allow-list.
    #[must_use]
    pub fn default_document_types() -> Vec<AllowedFileType> {
        vec![
            AllowedFileType::new("application/pdf", &["pdf"]),
            AllowedFileType::new("application/msword", &["doc"]),
            AllowedFileType::new(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                &["docx"],
            ),
            AllowedFileType::new("application/vnd.ms-excel", &["xls"]),
            AllowedFileType::new(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                &["xlsx"],
            ),
            AllowedFileType::new("application/vnd.ms-powerpoint", &["ppt"]),
            AllowedFileType::new(
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                &["pptx"],
            ),
            AllowedFileType::new("text/plain", &["txt"]),
        ]
    }

    /// Check that a normalised `(content_type, extension)` pair appears
    /// jointly in one allow-list.
    #[must_use]
    pub fn is_allowed_pair(&self, content_type: &str, extension: &str) -> bool {
        self.image_types
            .iter()
            .chain(self.document_types.iter())
            .any(|t| t.matches(content_type, extension))
    }

    /// Every extension present in either allow-list.
    pub fn allowed_extensions(&self) -> impl Iterator<Item = &str> {
        self.image_types
            .iter()
            .chain(self.document_types.iter())
            .flat_map(|t| t.extensions.iter().map(String::as_str))
    }
}
