//! Attachment repository for database operations.
//!
//! Implements attachment persistence using SeaORM. Status transitions are
//! conditional `UPDATE ... WHERE` statements so confirmation and the
//! expiration sweeper never overwrite each other.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{
    attachments,
    sea_orm_active_enums::{
        AttachmentEntityType as DbEntityType, AttachmentStatus as DbAttachmentStatus,
    },
};
use ferry_core::attachment::{
    Attachment, AttachmentError, AttachmentRepository as AttachmentRepoTrait, AttachmentStatus,
    CreateAttachmentInput, EntityType,
};

/// Attachment repository implementation.
#[derive(Debug, Clone)]
pub struct AttachmentRepository {
    db: DatabaseConnection,
}

impl AttachmentRepository {
    /// Create a new attachment repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl AttachmentRepoTrait for AttachmentRepository {
    async fn create(&self, input: CreateAttachmentInput) -> Result<Attachment, AttachmentError> {
        let now = Utc::now();
        let active_model = attachments::ActiveModel {
            id: Set(input.id),
            entity_type: Set(to_db_entity_type(input.entity_type)),
            entity_id: Set(None),
            status: Set(DbAttachmentStatus::Temp),
            file_name: Set(input.file_name),
            storage_key: Set(input.storage_key),
            file_size: Set(input.file_size),
            content_type: Set(input.content_type),
            uploaded_by: Set(input.uploaded_by),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            expires_at: Set(Some(input.expires_at.into())),
            deleted_at: Set(None),
        };

        let model = active_model.insert(&self.db).await.map_err(map_insert_err)?;

        Ok(to_domain(model))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Attachment>, AttachmentError> {
        let model = attachments::Entity::find_by_id(id)
            .filter(attachments::Column::DeletedAt.is_null())
            .one(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        Ok(model.map(to_domain))
    }

    async fn find_any_by_id(&self, id: Uuid) -> Result<Option<Attachment>, AttachmentError> {
        let model = attachments::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        Ok(model.map(to_domain))
    }

    async fn find_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<Attachment>, AttachmentError> {
        let models = attachments::Entity::find()
            .filter(attachments::Column::EntityType.eq(to_db_entity_type(entity_type)))
            .filter(attachments::Column::EntityId.eq(entity_id))
            .filter(attachments::Column::DeletedAt.is_null())
            .order_by_asc(attachments::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn find_by_storage_key(
        &self,
        storage_key: &str,
    ) -> Result<Vec<Attachment>, AttachmentError> {
        let models = attachments::Entity::find()
            .filter(attachments::Column::StorageKey.eq(storage_key))
            .filter(attachments::Column::DeletedAt.is_null())
            .all(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Attachment>, AttachmentError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = attachments::Entity::find()
            .filter(attachments::Column::Id.is_in(ids.iter().copied()))
            .filter(attachments::Column::DeletedAt.is_null())
            .order_by_asc(attachments::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn find_expired_temp(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Attachment>, AttachmentError> {
        let models = attachments::Entity::find()
            .filter(attachments::Column::Status.eq(DbAttachmentStatus::Temp))
            .filter(attachments::Column::DeletedAt.is_null())
            .filter(attachments::Column::ExpiresAt.lt(now))
            .order_by_asc(attachments::Column::ExpiresAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn confirm_batch(
        &self,
        ids: &[Uuid],
        entity_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, AttachmentError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = attachments::Entity::update_many()
            .col_expr(
                attachments::Column::Status,
                attachments::Column::Status.save_as(Expr::val(DbAttachmentStatus::Confirmed)),
            )
            .col_expr(attachments::Column::EntityId, Expr::value(entity_id))
            .col_expr(
                attachments::Column::ExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(attachments::Column::UpdatedAt, Expr::value(now))
            .filter(attachments::Column::Id.is_in(ids.iter().copied()))
            .filter(attachments::Column::Status.eq(DbAttachmentStatus::Temp))
            .filter(attachments::Column::DeletedAt.is_null())
            .filter(attachments::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        debug!(
            entity_id = %entity_id,
            rows = result.rows_affected,
            "confirm batch applied"
        );
        Ok(result.rows_affected)
    }

    async fn refresh_temp(
        &self,
        id: Uuid,
        input: CreateAttachmentInput,
        now: DateTime<Utc>,
    ) -> Result<Option<Attachment>, AttachmentError> {
        let result = attachments::Entity::update_many()
            .col_expr(attachments::Column::FileName, Expr::value(input.file_name))
            .col_expr(attachments::Column::FileSize, Expr::value(input.file_size))
            .col_expr(
                attachments::Column::ContentType,
                Expr::value(input.content_type),
            )
            .col_expr(attachments::Column::ExpiresAt, Expr::value(input.expires_at))
            .col_expr(attachments::Column::UpdatedAt, Expr::value(now))
            .filter(attachments::Column::Id.eq(id))
            .filter(attachments::Column::StorageKey.eq(input.storage_key))
            .filter(attachments::Column::UploadedBy.eq(input.uploaded_by))
            .filter(attachments::Column::Status.eq(DbAttachmentStatus::Temp))
            .filter(attachments::Column::DeletedAt.is_null())
            .filter(attachments::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    async fn soft_delete(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, AttachmentError> {
        let result = attachments::Entity::update_many()
            .col_expr(attachments::Column::DeletedAt, Expr::value(now))
            .col_expr(attachments::Column::UpdatedAt, Expr::value(now))
            .filter(attachments::Column::Id.eq(id))
            .filter(attachments::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn delete_expired_batch(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<u64, AttachmentError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = attachments::Entity::update_many()
            .col_expr(attachments::Column::DeletedAt, Expr::value(now))
            .col_expr(attachments::Column::UpdatedAt, Expr::value(now))
            .filter(attachments::Column::Id.is_in(ids.iter().copied()))
            .filter(attachments::Column::Status.eq(DbAttachmentStatus::Temp))
            .filter(attachments::Column::DeletedAt.is_null())
            .filter(attachments::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

/// Map a live storage key collision to a validation error.
fn map_insert_err(err: DbErr) -> AttachmentError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AttachmentError::validation("storage key is already registered")
        }
        _ => AttachmentError::repository(err.to_string()),
    }
}

/// Convert domain entity type to database enum.
fn to_db_entity_type(t: EntityType) -> DbEntityType {
    match t {
        EntityType::Board => DbEntityType::Board,
        EntityType::Comment => DbEntityType::Comment,
        EntityType::Project => DbEntityType::Project,
        EntityType::Profile => DbEntityType::Profile,
    }
}

/// Convert database entity type to domain enum.
fn from_db_entity_type(t: DbEntityType) -> EntityType {
    match t {
        DbEntityType::Board => EntityType::Board,
        DbEntityType::Comment => EntityType::Comment,
        DbEntityType::Project => EntityType::Project,
        DbEntityType::Profile => EntityType::Profile,
    }
}

/// Convert database status to domain enum.
fn from_db_status(s: DbAttachmentStatus) -> AttachmentStatus {
    match s {
        DbAttachmentStatus::Temp => AttachmentStatus::Temp,
        DbAttachmentStatus::Confirmed => AttachmentStatus::Confirmed,
    }
}

/// Convert database model to domain model.
fn to_domain(model: attachments::Model) -> Attachment {
    Attachment {
        id: model.id,
        entity_type: from_db_entity_type(model.entity_type),
        entity_id: model.entity_id,
        status: from_db_status(model.status),
        file_name: model.file_name,
        storage_key: model.storage_key,
        file_size: model.file_size,
        content_type: model.content_type,
        uploaded_by: model.uploaded_by,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        expires_at: model.expires_at.map(|t| t.with_timezone(&Utc)),
        deleted_at: model.deleted_at.map(|t| t.with_timezone(&Utc)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_conversion_roundtrip() {
        for t in EntityType::ALL {
            assert_eq!(from_db_entity_type(to_db_entity_type(t)), t);
        }
    }

    #[test]
    fn test_to_domain_keeps_status_fields() {
        let now = Utc::now();
        let model = attachments::Model {
            id: Uuid::new_v4(),
            entity_type: DbEntityType::Comment,
            entity_id: None,
            status: DbAttachmentStatus::Temp,
            file_name: "a.png".to_string(),
            storage_key: "attachments/comments/x.png".to_string(),
            file_size: 10,
            content_type: "image/png".to_string(),
            uploaded_by: Uuid::new_v4(),
            created_at: now.into(),
            updated_at: now.into(),
            expires_at: Some(now.into()),
            deleted_at: None,
        };

        let attachment = to_domain(model);
        assert_eq!(attachment.entity_type, EntityType::Comment);
        assert_eq!(attachment.status, AttachmentStatus::Temp);
        assert_eq!(attachment.expires_at, Some(now));
        assert!(attachment.holds_status_invariant());
    }
}
