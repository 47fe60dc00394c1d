//! Object storage gateway using Apache OpenDAL.
//!
//! This module provides vendor-agnostic object storage with support for:
//! - S3-compatible: Cloudflare R2, Supabase Storage, AWS S3, DigitalOcean Spaces
//! - Azure Blob Storage
//! - Local filesystem (development only)
//!
//! File bytes never pass through the service. The gateway only signs upload
//! URLs, derives readable URLs for stored keys, and deletes objects.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ObjectStorage trait                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ presign_upload(key, ct)    │ op.presign_write("key", duration)  │
//! │ readable_url(key)          │ public base URL or presign_read    │
//! │ delete(key)                │ op.delete("key"), NotFound = Ok    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod service;

pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use service::{ObjectStorage, PresignedUrl, StorageService};
