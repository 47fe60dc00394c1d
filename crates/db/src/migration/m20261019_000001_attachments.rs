//! Attachments migration.
//!
//! Creates the enum types, the attachments table with its status
//! constraints, the live storage key uniqueness index, and the partial
//! indexes used by entity lookups and the expiration sweeper.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ATTACHMENTS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            r"
DROP TABLE IF EXISTS attachments CASCADE;
DROP TYPE IF EXISTS attachment_status;
DROP TYPE IF EXISTS attachment_entity_type;
",
        )
        .await?;
        Ok(())
    }
}

const ATTACHMENTS_SQL: &str = r"
CREATE TYPE attachment_entity_type AS ENUM ('BOARD', 'COMMENT', 'PROJECT', 'PROFILE');
CREATE TYPE attachment_status AS ENUM ('TEMP', 'CONFIRMED');

CREATE TABLE attachments (
    id UUID PRIMARY KEY,
    entity_type attachment_entity_type NOT NULL,
    entity_id UUID,
    status attachment_status NOT NULL DEFAULT 'TEMP',
    file_name VARCHAR(255) NOT NULL,
    storage_key VARCHAR(512) NOT NULL,
    file_size BIGINT NOT NULL,
    content_type VARCHAR(255) NOT NULL,
    uploaded_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    expires_at TIMESTAMPTZ,
    deleted_at TIMESTAMPTZ,
    CONSTRAINT chk_attachments_file_size CHECK (file_size > 0),
    CONSTRAINT chk_attachments_temp CHECK (
        status <> 'TEMP' OR (entity_id IS NULL AND expires_at IS NOT NULL)
    ),
    CONSTRAINT chk_attachments_confirmed CHECK (
        status <> 'CONFIRMED' OR entity_id IS NOT NULL
    )
);

-- One live row per stored object
CREATE UNIQUE INDEX idx_attachments_live_storage_key ON attachments(storage_key)
    WHERE deleted_at IS NULL;

-- Attachments of an owning entity (read path)
CREATE INDEX idx_attachments_entity ON attachments(entity_type, entity_id, created_at)
    WHERE deleted_at IS NULL;

-- Expired TEMP scan (sweeper)
CREATE INDEX idx_attachments_temp_expiry ON attachments(expires_at)
    WHERE status = 'TEMP' AND deleted_at IS NULL;

-- Delete ownership lookups
CREATE INDEX idx_attachments_uploaded_by ON attachments(uploaded_by);
";
