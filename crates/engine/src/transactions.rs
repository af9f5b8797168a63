//! Transaction primitives.
//!
//! A `Transaction` is a single recorded expense or sale. Rows are immutable
//! once created; the only mutation is a full delete.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents};

pub const DEFAULT_CURRENCY: &str = "RUB";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Expense,
    Income,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            other => Err(EngineError::InvalidRequest(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub kind: TransactionKind,
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub amount: MoneyCents,
    pub currency: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub effective_at: DateTime<Utc>,
}

/// Fields required to persist a new transaction.
#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub user_id: i64,
    pub kind: TransactionKind,
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub amount: MoneyCents,
    pub comment: Option<String>,
    /// Date context of the transaction; defaults to the creation time.
    pub effective_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub amount_minor: i64,
    pub currency: String,
    pub comment: Option<String>,
    pub created_at: DateTimeUtc,
    pub effective_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id"
    )]
    Category,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Transaction {
    pub(crate) fn active_model(new: &NewTransaction, now: DateTime<Utc>) -> ActiveModel {
        ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(new.user_id),
            kind: ActiveValue::Set(new.kind.as_str().to_string()),
            category_id: ActiveValue::Set(new.category_id),
            subcategory_id: ActiveValue::Set(new.subcategory_id),
            amount_minor: ActiveValue::Set(new.amount.cents()),
            currency: ActiveValue::Set(DEFAULT_CURRENCY.to_string()),
            comment: ActiveValue::Set(new.comment.clone()),
            created_at: ActiveValue::Set(now),
            effective_at: ActiveValue::Set(new.effective_at.unwrap_or(now)),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            category_id: model.category_id,
            subcategory_id: model.subcategory_id,
            amount: MoneyCents::new(model.amount_minor),
            currency: model.currency,
            comment: model.comment,
            created_at: model.created_at,
            effective_at: model.effective_at,
        })
    }
}
