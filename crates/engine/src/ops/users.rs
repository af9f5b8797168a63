use chrono::Utc;
use sea_orm::{ActiveValue, prelude::*};

use crate::{ResultEngine, users};

use super::Engine;

impl Engine {
    /// Fetches the user row, creating it on first contact.
    pub async fn get_or_create_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> ResultEngine<users::Model> {
        if let Some(user) = users::Entity::find_by_id(user_id).one(self.database()).await? {
            return Ok(user);
        }

        let now = Utc::now();
        let model = users::ActiveModel {
            id: ActiveValue::Set(user_id),
            username: ActiveValue::Set(username.map(str::to_string)),
            first_name: ActiveValue::Set(first_name.map(str::to_string)),
            last_name: ActiveValue::Set(last_name.map(str::to_string)),
            timezone: ActiveValue::Set(users::DEFAULT_TIMEZONE.to_string()),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };
        let user = model.insert(self.database()).await?;
        tracing::info!(user_id, "created user");
        Ok(user)
    }
}
