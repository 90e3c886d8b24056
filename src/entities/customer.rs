use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Customer account. Rows are created lazily: an existing-customer checkout
/// already has one; a new-customer checkout only gets one when the
/// profile-completion form is submitted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub accepts_marketing: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_record::Entity")]
    PurchaseRecords,
}

impl Related<super::purchase_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
