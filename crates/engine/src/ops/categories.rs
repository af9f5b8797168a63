use sea_orm::{QueryFilter, QueryOrder, prelude::*};

use crate::{Category, EngineError, ResultEngine, TransactionKind, categories};

use super::Engine;

impl Engine {
    /// Root categories of a kind, in seed order.
    pub async fn roots_by_kind(&self, kind: TransactionKind) -> ResultEngine<Vec<Category>> {
        let models = categories::Entity::find()
            .filter(categories::Column::Kind.eq(kind.as_str()))
            .filter(categories::Column::ParentId.is_null())
            .order_by_asc(categories::Column::Id)
            .all(self.database())
            .await?;
        models.into_iter().map(Category::try_from).collect()
    }

    /// Direct children of a category (empty for leaves).
    pub async fn children_of(&self, category_id: i64) -> ResultEngine<Vec<Category>> {
        let models = categories::Entity::find()
            .filter(categories::Column::ParentId.eq(category_id))
            .order_by_asc(categories::Column::Id)
            .all(self.database())
            .await?;
        models.into_iter().map(Category::try_from).collect()
    }

    pub async fn category_by_id(&self, category_id: i64) -> ResultEngine<Option<Category>> {
        let model = categories::Entity::find_by_id(category_id)
            .one(self.database())
            .await?;
        model.map(Category::try_from).transpose()
    }

    /// Quick-pick shortcuts for a kind, in seed order.
    pub async fn quick_picks(&self, kind: TransactionKind) -> ResultEngine<Vec<Category>> {
        let models = categories::Entity::find()
            .filter(categories::Column::Kind.eq(kind.as_str()))
            .filter(categories::Column::QuickPick.eq(true))
            .order_by_asc(categories::Column::Id)
            .all(self.database())
            .await?;
        models.into_iter().map(Category::try_from).collect()
    }

    /// Resolves the display names of a set of category ids.
    pub async fn category_names(
        &self,
        ids: &[i64],
    ) -> ResultEngine<std::collections::HashMap<i64, String>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let models = categories::Entity::find()
            .filter(categories::Column::Id.is_in(ids.iter().copied()))
            .all(self.database())
            .await?;
        Ok(models.into_iter().map(|m| (m.id, m.name)).collect())
    }

    /// Seeds the taxonomy from a JSON definition.
    ///
    /// Idempotent: a non-empty categories table is left untouched.
    pub async fn seed_categories(&self, json: &str) -> ResultEngine<usize> {
        let seeds: Vec<crate::categories::CategorySeed> = serde_json::from_str(json)
            .map_err(|err| EngineError::InvalidRequest(format!("invalid category file: {err}")))?;

        if categories::Entity::find()
            .one(self.database())
            .await?
            .is_some()
        {
            tracing::info!("categories already seeded");
            return Ok(0);
        }

        for seed in &seeds {
            if let Some(parent_id) = seed.parent_id {
                let parent = seeds.iter().find(|s| s.id == parent_id).ok_or_else(|| {
                    EngineError::InvalidRequest(format!(
                        "category {} references missing parent {parent_id}",
                        seed.id
                    ))
                })?;
                if parent.kind != seed.kind {
                    return Err(EngineError::InvalidRequest(format!(
                        "category {} kind differs from its parent",
                        seed.id
                    )));
                }
                if parent.parent_id.is_some() {
                    return Err(EngineError::InvalidRequest(format!(
                        "category {} nests deeper than two levels",
                        seed.id
                    )));
                }
            }
        }

        for seed in &seeds {
            categories::ActiveModel::from(seed)
                .insert(self.database())
                .await?;
        }
        tracing::info!(count = seeds.len(), "seeded categories");
        Ok(seeds.len())
    }
}
