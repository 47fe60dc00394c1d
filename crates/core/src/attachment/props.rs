//! Property-based tests for attachment validation and lifecycle.
//!
//! - Validation ordering: entity type, then size, then file type
//! - Status invariant: TEMP rows are unbound, CONFIRMED rows are bound
//! - Key grammar: every issued key parses and carries an allow-listed extension

use std::sync::Arc;

use chrono::Utc;
use proptest::prelude::*;
use uuid::Uuid;

use super::error::AttachmentError;
use super::key::{StorageKey, StorageKeyBuilder};
use super::mocks::{MockAttachmentRepository, MockStorage};
use super::policy::UploadPolicy;
use super::service::{AttachmentRepository, AttachmentService};
use super::types::{EntityType, IssueUploadInput};
use super::validation::validate_upload;

const MAX: i64 = 20 * 1024 * 1024;

fn entity_type() -> impl Strategy<Value = EntityType> {
    prop::sample::select(EntityType::ALL.to_vec())
}

/// Entity type tokens in random letter case.
fn valid_entity_token() -> impl Strategy<Value = String> {
    (entity_type(), prop::collection::vec(any::<bool>(), 8)).prop_map(|(t, upper)| {
        t.as_str()
            .chars()
            .zip(upper.into_iter().cycle())
            .map(|(c, u)| if u { c } else { c.to_ascii_lowercase() })
            .collect()
    })
}

fn invalid_entity_token() -> impl Strategy<Value = String> {
    "[a-z]{1,12}".prop_filter("must not be an entity type", |s| {
        EntityType::parse(s).is_none()
    })
}

fn valid_size() -> impl Strategy<Value = i64> {
    1i64..=MAX
}

fn invalid_size() -> impl Strategy<Value = i64> {
    prop_oneof![i64::MIN..=0, (MAX + 1)..i64::MAX]
}

/// An allow-listed `(file_name, content_type)` pair.
fn valid_file_type() -> impl Strategy<Value = (String, String)> {
    let policy = UploadPolicy::new();
    let pairs: Vec<(String, String)> = policy
        .image_types
        .iter()
        .chain(policy.document_types.iter())
        .flat_map(|t| {
            t.extensions
                .iter()
                .map(move |ext| (ext.clone(), t.content_type.clone()))
        })
        .collect();
    ("[a-zA-Z0-9_-]{1,20}", prop::sample::select(pairs))
        .prop_map(|(stem, (ext, ct))| (format!("{stem}.{ext}"), ct))
}

fn invalid_file_type() -> impl Strategy<Value = (String, String)> {
    prop_oneof![
        "[a-z]{1,10}".prop_map(|stem| (stem, "image/png".to_string())),
        "[a-z]{1,10}".prop_map(|stem| (format!("{stem}.exe"), "application/octet-stream".to_string())),
        "[a-z]{1,10}".prop_map(|stem| (format!("{stem}.pdf"), "image/jpeg".to_string())),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Issue(EntityType),
    Confirm(usize, usize),
    Expire(usize),
    Delete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        entity_type().prop_map(Op::Issue),
        (0usize..8, 0usize..3).prop_map(|(i, e)| Op::Confirm(i, e)),
        (0usize..8).prop_map(Op::Expire),
        (0usize..8).prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// An invalid entity type is reported regardless of the other fields.
    #[test]
    fn prop_entity_type_checked_first(
        token in invalid_entity_token(),
        size in any::<i64>(),
        (name, ct) in prop_oneof![valid_file_type(), invalid_file_type()],
    ) {
        let err = validate_upload(&UploadPolicy::new(), &token, size, &name, &ct).unwrap_err();
        prop_assert!(matches!(err, AttachmentError::Validation(_)));
        prop_assert!(err.to_string().contains("entity type"));
    }

    /// With a valid entity type, a bad size wins over a bad file type.
    #[test]
    fn prop_size_checked_before_file_type(
        token in valid_entity_token(),
        size in invalid_size(),
        (name, ct) in prop_oneof![valid_file_type(), invalid_file_type()],
    ) {
        let err = validate_upload(&UploadPolicy::new(), &token, size, &name, &ct).unwrap_err();
        if size <= 0 {
            prop_assert!(matches!(err, AttachmentError::Validation(_)));
        } else {
            prop_assert!(
                matches!(err, AttachmentError::FileTooLarge { .. }),
                "expected FileTooLarge, got {:?}",
                err
            );
        }
    }

    /// With valid entity type and size, only the file type decides.
    #[test]
    fn prop_file_type_checked_last(
        token in valid_entity_token(),
        size in valid_size(),
        (name, ct) in invalid_file_type(),
    ) {
        let err = validate_upload(&UploadPolicy::new(), &token, size, &name, &ct).unwrap_err();
        prop_assert!(matches!(err, AttachmentError::InvalidFileType(_)));
    }

    /// Valid input always passes.
    #[test]
    fn prop_valid_input_passes(
        token in valid_entity_token(),
        size in valid_size(),
        (name, ct) in valid_file_type(),
    ) {
        prop_assert!(validate_upload(&UploadPolicy::new(), &token, size, &name, &ct).is_ok());
    }

    /// Every built key parses back and carries an allow-listed extension.
    #[test]
    fn prop_key_grammar(
        t in entity_type(),
        parent in any::<u128>(),
        (name, ct) in valid_file_type(),
    ) {
        let policy = UploadPolicy::new();
        let ext = validate_upload(&policy, t.as_str(), 1, &name, &ct).unwrap().extension;
        let builder = StorageKeyBuilder::new(policy.category_root.clone());
        let parent = Uuid::from_u128(parent);
        let now = Utc::now();

        let key = builder.build(t, parent, &ext, now);
        let parsed = StorageKey::parse(&key);
        prop_assert!(parsed.is_some(), "unparseable key {}", key);
        let parsed = parsed.unwrap();

        prop_assert_eq!(parsed.category, "attachments");
        prop_assert_eq!(parsed.entity_type, t);
        prop_assert_eq!(parsed.parent_id, parent);
        prop_assert!(policy.allowed_extensions().any(|e| e == parsed.extension));
        prop_assert!(key.starts_with(&builder.entity_prefix(t)));
    }

    /// No sequence of issue, confirm, expire, and delete breaks the status
    /// invariant, and a confirmed row never changes owner.
    #[test]
    fn prop_status_invariant_holds(ops in prop::collection::vec(op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let storage = Arc::new(MockStorage::new());
            let repo = Arc::new(MockAttachmentRepository::new());
            let service = AttachmentService::new(storage, repo.clone(), UploadPolicy::new());
            let owner = Uuid::new_v4();
            let entities = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
            let mut issued: Vec<Uuid> = Vec::new();
            let mut owners: std::collections::HashMap<Uuid, Uuid> = std::collections::HashMap::new();

            for op in ops {
                match op {
                    Op::Issue(t) => {
                        let result = service
                            .issue_upload(IssueUploadInput {
                                entity_type: t.as_str().to_string(),
                                parent_id: Uuid::new_v4(),
                                file_name: "f.png".to_string(),
                                file_size: 10,
                                content_type: "image/png".to_string(),
                                requested_by: owner,
                            })
                            .await
                            .unwrap();
                        issued.push(result.attachment_id);
                    }
                    Op::Confirm(i, e) => {
                        if let Some(id) = issued.get(i) {
                            service.confirm(&[*id], entities[e]).await.unwrap();
                        }
                    }
                    Op::Expire(i) => {
                        if let Some(id) = issued.get(i) {
                            repo.expire(*id);
                        }
                    }
                    Op::Delete(i) => {
                        if let Some(id) = issued.get(i) {
                            service.delete(*id, owner).await.unwrap();
                        }
                    }
                }

                for id in &issued {
                    let row = repo.find_any_by_id(*id).await.unwrap().unwrap();
                    assert!(row.holds_status_invariant(), "invariant broken: {row:?}");
                    if let Some(entity) = row.entity_id {
                        let first = *owners.entry(*id).or_insert(entity);
                        assert_eq!(first, entity, "owner changed for {id}");
                    }
                }
            }
        });
    }
}
