use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
    sea_query::{Expr, Func},
};

use crate::{
    EngineError, MoneyCents, NewTransaction, ResultEngine, Transaction, TransactionKind,
    transactions,
};

use super::{Engine, with_tx};

/// Fixed page size of the recent-transactions browser.
pub const RECENT_PAGE_SIZE: u64 = 10;

/// Trailing window within which the last transaction can be undone.
pub const UNDO_WINDOW_MINUTES: i64 = 5;

/// Filters for listing transactions.
///
/// `from` and `to` are both inclusive and apply to `effective_at`, in UTC.
#[derive(Clone, Debug, Default)]
pub struct TransactionQuery {
    pub user_id: i64,
    /// If present, restricts to one kind.
    pub kind: Option<TransactionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// If present, acts as an allow-list of root categories.
    pub category_ids: Option<Vec<i64>>,
    /// If present, acts as an allow-list of subcategories.
    pub subcategory_ids: Option<Vec<i64>>,
    pub amount_min: Option<MoneyCents>,
    pub amount_max: Option<MoneyCents>,
    /// Case-insensitive substring match on the comment.
    pub comment_query: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Chronological ascending when true; newest-first otherwise.
    pub ascending: bool,
}

/// One page of the recent-transactions browser.
#[derive(Clone, Debug)]
pub struct RecentPage {
    pub items: Vec<Transaction>,
    pub offset: u64,
    pub has_more: bool,
}

fn validate_query(query: &TransactionQuery) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (query.from, query.to)
        && from > to
    {
        return Err(EngineError::InvalidRequest(
            "invalid range: from must be <= to".to_string(),
        ));
    }
    Ok(())
}

trait ApplyTxFilters: QueryFilter + Sized {
    fn apply_tx_filters(self, query: &TransactionQuery) -> Self;
}

impl<T> ApplyTxFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_tx_filters(mut self, query: &TransactionQuery) -> Self {
        self = self.filter(transactions::Column::UserId.eq(query.user_id));

        if let Some(kind) = query.kind {
            self = self.filter(transactions::Column::Kind.eq(kind.as_str()));
        }
        if let Some(from) = query.from {
            self = self.filter(transactions::Column::EffectiveAt.gte(from));
        }
        if let Some(to) = query.to {
            self = self.filter(transactions::Column::EffectiveAt.lte(to));
        }
        if let Some(ids) = &query.category_ids {
            self = self.filter(transactions::Column::CategoryId.is_in(ids.iter().copied()));
        }
        if let Some(ids) = &query.subcategory_ids {
            self = self.filter(transactions::Column::SubcategoryId.is_in(ids.iter().copied()));
        }
        if let Some(min) = query.amount_min {
            self = self.filter(transactions::Column::AmountMinor.gte(min.cents()));
        }
        if let Some(max) = query.amount_max {
            self = self.filter(transactions::Column::AmountMinor.lte(max.cents()));
        }
        if let Some(needle) = &query.comment_query {
            let pattern = format!("%{}%", needle.to_lowercase());
            self = self.filter(
                Expr::expr(Func::lower(Expr::col(transactions::Column::Comment))).like(pattern),
            );
        }

        self
    }
}

impl Engine {
    /// Persists a new transaction after validating the category shape.
    ///
    /// The insert is atomic: a commit failure leaves no partial row.
    pub async fn create_transaction(&self, new: &NewTransaction) -> ResultEngine<Transaction> {
        let category = self
            .category_by_id(new.category_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("category".to_string()))?;
        if category.kind != new.kind {
            return Err(EngineError::InvalidRequest(
                "category kind does not match transaction kind".to_string(),
            ));
        }
        if let Some(subcategory_id) = new.subcategory_id {
            let subcategory = self
                .category_by_id(subcategory_id)
                .await?
                .ok_or_else(|| EngineError::NotFound("subcategory".to_string()))?;
            if subcategory.parent_id != Some(new.category_id) {
                return Err(EngineError::InvalidRequest(
                    "subcategory does not belong to category".to_string(),
                ));
            }
        }
        if !new.amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "amount must be > 0".to_string(),
            ));
        }

        let created: ResultEngine<transactions::Model> = with_tx!(self, |db_tx| {
            Transaction::active_model(new, Utc::now())
                .insert(&db_tx)
                .await
                .map_err(EngineError::from)
        });
        let model = created?;
        tracing::info!(user_id = new.user_id, tx_id = model.id, "created transaction");
        Transaction::try_from(model)
    }

    /// Lists transactions matching a filter.
    pub async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> ResultEngine<Vec<Transaction>> {
        validate_query(query)?;

        let mut select = transactions::Entity::find().apply_tx_filters(query);
        select = if query.ascending {
            select
                .order_by_asc(transactions::Column::EffectiveAt)
                .order_by_asc(transactions::Column::Id)
        } else {
            select
                .order_by_desc(transactions::Column::EffectiveAt)
                .order_by_desc(transactions::Column::Id)
        };
        if let Some(offset) = query.offset {
            select = select.offset(offset);
        }
        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }

        let models = select.all(self.database()).await?;
        models.into_iter().map(Transaction::try_from).collect()
    }

    /// One newest-first page for the recent browser.
    ///
    /// Fetches one row beyond the page to decide `has_more` without a second
    /// query.
    pub async fn recent_page(
        &self,
        user_id: i64,
        kind: Option<TransactionKind>,
        offset: u64,
    ) -> ResultEngine<RecentPage> {
        let query = TransactionQuery {
            user_id,
            kind,
            offset: Some(offset),
            limit: Some(RECENT_PAGE_SIZE + 1),
            ..Default::default()
        };
        let mut items = self.list_transactions(&query).await?;
        let has_more = items.len() as u64 > RECENT_PAGE_SIZE;
        items.truncate(RECENT_PAGE_SIZE as usize);
        Ok(RecentPage {
            items,
            offset,
            has_more,
        })
    }

    /// Deletes a transaction owned by `user_id`.
    ///
    /// Returns `false` when the id does not exist or belongs to another user;
    /// the two cases are indistinguishable to the caller.
    pub async fn delete_transaction_by_id(&self, user_id: i64, tx_id: i64) -> ResultEngine<bool> {
        let deleted: ResultEngine<bool> = with_tx!(self, |db_tx| {
            let Some(model) = transactions::Entity::find_by_id(tx_id).one(&db_tx).await? else {
                return Ok(false);
            };
            if model.user_id != user_id {
                return Ok(false);
            }
            model.delete(&db_tx).await?;
            Ok(true)
        });
        let deleted = deleted?;
        if deleted {
            tracing::info!(user_id, tx_id, "deleted transaction");
        }
        Ok(deleted)
    }

    /// Deletes the most recent transaction created within the undo window.
    ///
    /// Returns the deleted transaction, or `None` when nothing qualifies.
    pub async fn delete_last_transaction(
        &self,
        user_id: i64,
    ) -> ResultEngine<Option<Transaction>> {
        let cutoff = Utc::now() - Duration::minutes(UNDO_WINDOW_MINUTES);

        let deleted: ResultEngine<Option<transactions::Model>> = with_tx!(self, |db_tx| {
            let Some(model) = transactions::Entity::find()
                .filter(transactions::Column::UserId.eq(user_id))
                .filter(transactions::Column::CreatedAt.gte(cutoff))
                .order_by_desc(transactions::Column::CreatedAt)
                .order_by_desc(transactions::Column::Id)
                .one(&db_tx)
                .await?
            else {
                return Ok(None);
            };
            let snapshot = model.clone();
            model.delete(&db_tx).await?;
            Ok(Some(snapshot))
        });

        match deleted? {
            Some(model) => {
                tracing::info!(user_id, tx_id = model.id, "undid transaction");
                Ok(Some(Transaction::try_from(model)?))
            }
            None => Ok(None),
        }
    }
}
