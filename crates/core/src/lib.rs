//! Core business logic for Ferry.
//!
//! This crate contains the attachment lifecycle with ZERO web or database
//! dependencies. Persistence is reached through the
//! [`attachment::AttachmentRepository`] trait and object storage through
//! [`storage::ObjectStorage`].
//!
//! # Modules
//!
//! - `attachment` - Validation, key building, lifecycle service, and expiration sweeper
//! - `storage` - Object storage gateway backed by OpenDAL

pub mod attachment;
pub mod storage;
