//! `SeaORM` active enums backed by Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `attachment_entity_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "attachment_entity_type"
)]
pub enum AttachmentEntityType {
    #[sea_orm(string_value = "BOARD")]
    Board,
    #[sea_orm(string_value = "COMMENT")]
    Comment,
    #[sea_orm(string_value = "PROJECT")]
    Project,
    #[sea_orm(string_value = "PROFILE")]
    Profile,
}

/// `attachment_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attachment_status")]
pub enum AttachmentStatus {
    #[sea_orm(string_value = "TEMP")]
    Temp,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
}
