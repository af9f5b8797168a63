//! Category taxonomy.
//!
//! Categories form a two-level hierarchy (root → subcategory), each fixed to
//! an expense/income kind. The taxonomy is seeded once at startup from a
//! static JSON definition and is read-only at runtime.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Deserialize;

use crate::{EngineError, TransactionKind};

/// A category as seen by the dialogue and the report builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub kind: TransactionKind,
    pub parent_id: Option<i64>,
    pub quick_pick: bool,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// One record of the static `categories.json` seed file.
#[derive(Debug, Deserialize)]
pub struct CategorySeed {
    pub id: i64,
    pub name: String,
    pub kind: TransactionKind,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub quick_pick: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub parent_id: Option<i64>,
    pub quick_pick: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CategorySeed> for ActiveModel {
    fn from(seed: &CategorySeed) -> Self {
        Self {
            id: ActiveValue::Set(seed.id),
            name: ActiveValue::Set(seed.name.clone()),
            kind: ActiveValue::Set(seed.kind.as_str().to_string()),
            parent_id: ActiveValue::Set(seed.parent_id),
            quick_pick: ActiveValue::Set(seed.quick_pick),
        }
    }
}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            name: model.name,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            parent_id: model.parent_id,
            quick_pick: model.quick_pick,
        })
    }
}
