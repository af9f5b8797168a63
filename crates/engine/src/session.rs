//! Per-user conversation state.
//!
//! Sessions are ephemeral and per-process: created lazily on first touch,
//! mutated at every step of the recording dialogue, cleared on cancel,
//! completion or return-to-menu. The store is injected into the state
//! machine, never reached as a global.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{MoneyCents, TransactionKind};

/// Which input the recording dialogue is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DraftStep {
    AwaitingCategory,
    AwaitingSubcategory,
    AwaitingComment,
    AwaitingAmount,
    AwaitingConfirmation,
}

/// The in-progress, not-yet-persisted transaction fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Draft {
    pub step: DraftStep,
    pub kind: TransactionKind,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub subcategory_id: Option<i64>,
    pub subcategory_name: Option<String>,
    pub comment: Option<String>,
    pub amount: Option<MoneyCents>,
}

impl Draft {
    pub fn start(kind: TransactionKind) -> Self {
        Self {
            step: DraftStep::AwaitingCategory,
            kind,
            category_id: None,
            category_name: None,
            subcategory_id: None,
            subcategory_name: None,
            comment: None,
            amount: None,
        }
    }

    /// The category path shown to the user, e.g. `"Пчеловодство → Сахар"`.
    pub fn category_path(&self) -> String {
        let category = self.category_name.as_deref().unwrap_or("?");
        match self.subcategory_name.as_deref() {
            Some(sub) => format!("{category} → {sub}"),
            None => category.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Session {
    /// Active draft, if the user is mid-dialogue.
    pub draft: Option<Draft>,
    /// Id of the single live prompt message, for edit-in-place and retiring.
    pub prompt_id: Option<i32>,
}

/// Per-user session map; at most one active draft per user.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<i64, Session>>>,
}

impl SessionStore {
    pub async fn get(&self, user_id: i64) -> Session {
        let guard = self.inner.lock().await;
        guard.get(&user_id).cloned().unwrap_or_default()
    }

    pub async fn update<F>(&self, user_id: i64, f: F) -> Session
    where
        F: FnOnce(&mut Session),
    {
        let mut guard = self.inner.lock().await;
        let session = guard.entry(user_id).or_default();
        f(session);
        session.clone()
    }

    /// Drops the draft, keeping the prompt pointer.
    pub async fn clear_draft(&self, user_id: i64) {
        self.update(user_id, |s| s.draft = None).await;
    }

    /// Records the live prompt message for a user.
    pub async fn set_prompt(&self, user_id: i64, message_id: i32) {
        self.update(user_id, |s| s.prompt_id = Some(message_id))
            .await;
    }

    /// Takes the live prompt message, leaving none; the caller is expected
    /// to retire it before sending a fresh one.
    pub async fn take_prompt(&self, user_id: i64) -> Option<i32> {
        let mut guard = self.inner.lock().await;
        guard.entry(user_id).or_default().prompt_id.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_isolated_per_user() {
        let store = SessionStore::default();
        store
            .update(1, |s| s.draft = Some(Draft::start(TransactionKind::Expense)))
            .await;

        assert!(store.get(1).await.draft.is_some());
        assert!(store.get(2).await.draft.is_none());
    }

    #[tokio::test]
    async fn take_prompt_leaves_none() {
        let store = SessionStore::default();
        store.set_prompt(1, 42).await;
        assert_eq!(store.take_prompt(1).await, Some(42));
        assert_eq!(store.take_prompt(1).await, None);
    }
}
