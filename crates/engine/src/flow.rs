//! The conversation: event dispatch and the recording state machine.
//!
//! `Idle → AwaitingCategory → AwaitingSubcategory (only when the picked
//! category has children) → AwaitingComment → AwaitingAmount →
//! AwaitingConfirmation → Idle`, cancellable from any step. Quick-pick
//! categories jump straight to the comment step. Step branching is decided by
//! [`next_step_after_category`] so every transition is enumerable in tests.

use std::sync::Arc;

use chrono_tz::Europe::Moscow;

use crate::{
    AmountError, Category, Engine, EngineError, Event, NewTransaction, Reply, ReplyMode,
    SessionStore, TransactionKind,
    events::{Choice, token},
    money::parse_amount,
    ops::{RECENT_PAGE_SIZE, ReportRequest, UNDO_WINDOW_MINUTES},
    report::Renderer,
    session::{Draft, DraftStep},
};

/// Text a user sends at the comment step to skip the comment.
pub const SKIP_COMMENT: &str = "-";

/// Drives one user's dialogue: consumes [`Event`]s, mutates the session
/// store, and calls the repository/renderer collaborators.
pub struct Conversation<R> {
    engine: Arc<Engine>,
    sessions: SessionStore,
    renderer: R,
}

/// Next dialogue step once a category is picked.
///
/// Quick-picks and childless categories jump straight to the comment step;
/// only a category with children detours through subcategory selection.
pub fn next_step_after_category(has_children: bool, quick_pick: bool) -> DraftStep {
    if !quick_pick && has_children {
        DraftStep::AwaitingSubcategory
    } else {
        DraftStep::AwaitingComment
    }
}

impl<R: Renderer> Conversation<R> {
    pub fn new(engine: Arc<Engine>, sessions: SessionStore, renderer: R) -> Self {
        Self {
            engine,
            sessions,
            renderer,
        }
    }

    /// The session store shared with the transport (prompt bookkeeping).
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Shared engine handle, for transport-side bootstrap (user creation).
    pub fn engine_handle(&self) -> Arc<Engine> {
        Arc::clone(&self.engine)
    }

    /// Handles one user intent and produces the reply to show.
    ///
    /// Never fails outward: collaborator errors are logged and mapped to
    /// user-facing failure text.
    pub async fn handle(&self, user_id: i64, event: Event) -> Reply {
        match event {
            Event::MainMenu => {
                self.sessions.clear_draft(user_id).await;
                main_menu_reply(ReplyMode::Edit)
            }
            Event::Cancel => {
                self.sessions.clear_draft(user_id).await;
                Reply::edit("❌ Операция отменена").with_keyboard(main_menu_keyboard())
            }
            Event::StartTransaction(kind) => self.start_transaction(user_id, kind).await,
            Event::SelectCategory(id) => self.select_category(user_id, id).await,
            Event::SelectSubcategory(id) => self.select_subcategory(user_id, id).await,
            Event::SubmitComment(text) => self.submit_comment(user_id, text).await,
            Event::SubmitAmount(text) => self.submit_amount(user_id, text).await,
            Event::Confirm => self.confirm(user_id).await,
            Event::ReportMenu => report_menu_reply(),
            Event::RequestReport { kind, days, mode } => {
                self.request_report(user_id, kind, days, mode).await
            }
            Event::RequestRecent { kind, offset } => {
                self.recent_reply(user_id, kind, offset, None, ReplyMode::Edit)
                    .await
            }
            Event::RequestDelete {
                tx_id,
                kind,
                offset,
            } => delete_prompt_reply(tx_id, kind, offset),
            Event::ConfirmDelete {
                tx_id,
                kind,
                offset,
            } => self.confirm_delete(user_id, tx_id, kind, offset).await,
            Event::RequestUndo => self.undo(user_id).await,
        }
    }

    async fn start_transaction(&self, user_id: i64, kind: TransactionKind) -> Reply {
        // A new intent mid-flow restarts the dialogue; never two drafts.
        self.sessions
            .update(user_id, |s| s.draft = Some(Draft::start(kind)))
            .await;
        self.category_prompt(user_id, kind).await
    }

    async fn category_prompt(&self, user_id: i64, kind: TransactionKind) -> Reply {
        let (roots, quick) = match (
            self.engine.roots_by_kind(kind).await,
            self.engine.quick_picks(kind).await,
        ) {
            (Ok(roots), Ok(quick)) => (roots, quick),
            (Err(err), _) | (_, Err(err)) => return self.internal_error(user_id, "categories", err),
        };

        let text = match kind {
            TransactionKind::Expense => "💰 Выберите категорию траты:",
            TransactionKind::Income => "💸 Выберите тип продажи:",
        };
        Reply::edit(text).with_keyboard(category_keyboard(&roots, &quick))
    }

    async fn select_category(&self, user_id: i64, category_id: i64) -> Reply {
        let Some(draft) = self.sessions.get(user_id).await.draft else {
            return main_menu_reply(ReplyMode::Edit);
        };
        if draft.step != DraftStep::AwaitingCategory {
            return self.render_step(user_id, &draft).await;
        }

        let category = match self.engine.category_by_id(category_id).await {
            Ok(Some(category)) if category.kind == draft.kind && category.is_root() => category,
            Ok(_) => {
                return Reply::edit("❌ Категория не найдена")
                    .with_keyboard(vec![cancel_row()]);
            }
            Err(err) => return self.internal_error(user_id, "category lookup", err),
        };
        let children = match self.engine.children_of(category_id).await {
            Ok(children) => children,
            Err(err) => return self.internal_error(user_id, "subcategories", err),
        };

        let next = next_step_after_category(!children.is_empty(), category.quick_pick);
        let draft = self
            .sessions
            .update(user_id, |s| {
                if let Some(d) = &mut s.draft {
                    d.category_id = Some(category.id);
                    d.category_name = Some(category.name.clone());
                    d.subcategory_id = None;
                    d.subcategory_name = None;
                    d.step = next;
                }
            })
            .await
            .draft;

        match next {
            DraftStep::AwaitingSubcategory => subcategory_prompt(&category.name, &children),
            _ => comment_prompt(
                &draft.map(|d| d.category_path()).unwrap_or_default(),
                ReplyMode::Edit,
            ),
        }
    }

    async fn select_subcategory(&self, user_id: i64, subcategory_id: i64) -> Reply {
        let Some(draft) = self.sessions.get(user_id).await.draft else {
            return main_menu_reply(ReplyMode::Edit);
        };
        if draft.step != DraftStep::AwaitingSubcategory {
            return self.render_step(user_id, &draft).await;
        }

        let subcategory = match self.engine.category_by_id(subcategory_id).await {
            Ok(Some(sub)) if sub.parent_id == draft.category_id => sub,
            Ok(_) => {
                return Reply::edit("❌ Подкатегория не найдена")
                    .with_keyboard(vec![cancel_row()]);
            }
            Err(err) => return self.internal_error(user_id, "subcategory lookup", err),
        };

        let draft = self
            .sessions
            .update(user_id, |s| {
                if let Some(d) = &mut s.draft {
                    d.subcategory_id = Some(subcategory.id);
                    d.subcategory_name = Some(subcategory.name.clone());
                    d.step = DraftStep::AwaitingComment;
                }
            })
            .await
            .draft;

        comment_prompt(
            &draft.map(|d| d.category_path()).unwrap_or_default(),
            ReplyMode::Edit,
        )
    }

    async fn submit_comment(&self, user_id: i64, text: String) -> Reply {
        let Some(draft) = self.sessions.get(user_id).await.draft else {
            return main_menu_reply(ReplyMode::Fresh);
        };
        if draft.step != DraftStep::AwaitingComment {
            return self.render_step(user_id, &draft).await;
        }

        let trimmed = text.trim();
        let comment = (trimmed != SKIP_COMMENT && !trimmed.is_empty())
            .then(|| trimmed.to_string());
        self.sessions
            .update(user_id, |s| {
                if let Some(d) = &mut s.draft {
                    d.comment = comment.clone();
                    d.step = DraftStep::AwaitingAmount;
                }
            })
            .await;

        amount_prompt(ReplyMode::Fresh)
    }

    async fn submit_amount(&self, user_id: i64, text: String) -> Reply {
        let Some(draft) = self.sessions.get(user_id).await.draft else {
            return main_menu_reply(ReplyMode::Fresh);
        };
        if draft.step != DraftStep::AwaitingAmount {
            return self.render_step(user_id, &draft).await;
        }

        let amount = match parse_amount(&text) {
            Ok(amount) => amount,
            // Both failures re-enter the amount step; wording differs.
            Err(AmountError::Malformed) => {
                return Reply::fresh(
                    "❌ Неверный формат суммы. Попробуйте снова (например: 1000, 1 500, 2.50):",
                )
                .with_keyboard(vec![cancel_row()]);
            }
            Err(AmountError::NotPositive) => {
                return Reply::fresh("❌ Сумма должна быть больше нуля. Попробуйте снова:")
                    .with_keyboard(vec![cancel_row()]);
            }
        };

        let draft = self
            .sessions
            .update(user_id, |s| {
                if let Some(d) = &mut s.draft {
                    d.amount = Some(amount);
                    d.step = DraftStep::AwaitingConfirmation;
                }
            })
            .await
            .draft;

        match draft {
            Some(draft) => confirmation_prompt(&draft, ReplyMode::Fresh),
            None => main_menu_reply(ReplyMode::Fresh),
        }
    }

    async fn confirm(&self, user_id: i64) -> Reply {
        let Some(draft) = self.sessions.get(user_id).await.draft else {
            return main_menu_reply(ReplyMode::Edit);
        };
        if draft.step != DraftStep::AwaitingConfirmation {
            return self.render_step(user_id, &draft).await;
        }
        let (Some(category_id), Some(amount)) = (draft.category_id, draft.amount) else {
            // Incomplete draft should be unreachable; restart cleanly.
            tracing::warn!(user_id, "confirmation with incomplete draft");
            self.sessions.clear_draft(user_id).await;
            return main_menu_reply(ReplyMode::Edit);
        };

        let new = NewTransaction {
            user_id,
            kind: draft.kind,
            category_id,
            subcategory_id: draft.subcategory_id,
            amount,
            comment: draft.comment.clone(),
            effective_at: None,
        };
        // Terminal transition either way: the draft never survives a commit
        // attempt.
        self.sessions.clear_draft(user_id).await;

        match self.engine.create_transaction(&new).await {
            Ok(tx) => Reply::edit(format!(
                "✅ {} успешно записана!\n💰 Сумма: {}\n🆔 ID: {}",
                kind_title(tx.kind),
                tx.amount.format(&tx.currency),
                tx.id
            ))
            .with_keyboard(quick_actions_keyboard()),
            Err(err) => {
                tracing::error!(user_id, error = %err, "failed to save transaction");
                Reply::edit("❌ Произошла ошибка при сохранении операции. Попробуйте снова.")
                    .with_keyboard(main_menu_keyboard())
            }
        }
    }

    async fn request_report(
        &self,
        user_id: i64,
        kind: TransactionKind,
        days: i64,
        mode: crate::report::Aggregation,
    ) -> Reply {
        let request = ReportRequest::last_days(user_id, kind, days, mode);
        let report = match self.engine.build_report(&request).await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(user_id, error = %err, "report build failed");
                return Reply::edit("❌ Не удалось сформировать отчёт.")
                    .with_keyboard(main_menu_keyboard());
            }
        };

        let artifacts = self
            .renderer
            .render_workbook(&report.sheets())
            .and_then(|workbook| {
                self.renderer
                    .render_chart(&report.chart, &report.summary)
                    .map(|chart| vec![workbook, chart])
            });
        let artifacts = match artifacts {
            Ok(artifacts) => artifacts,
            Err(err) => {
                tracing::error!(user_id, error = %err, "report render failed");
                return Reply::edit("❌ Не удалось сформировать отчёт.")
                    .with_keyboard(main_menu_keyboard());
            }
        };

        Reply::fresh(format!(
            "📋 Отчёт: {} — {}\nСумма: {}, операций: {}",
            report_title(kind),
            mode.title(),
            report.summary.total.format(crate::transactions::DEFAULT_CURRENCY),
            report.summary.count
        ))
        .with_keyboard(main_menu_keyboard())
        .with_artifacts(artifacts)
    }

    async fn recent_reply(
        &self,
        user_id: i64,
        kind: Option<TransactionKind>,
        offset: u64,
        prefix: Option<&str>,
        mode: ReplyMode,
    ) -> Reply {
        let page = match self.engine.recent_page(user_id, kind, offset).await {
            Ok(page) => page,
            Err(err) => return self.internal_error(user_id, "recent page", err),
        };

        let mut ids: Vec<i64> = Vec::new();
        for tx in &page.items {
            ids.push(tx.category_id);
            if let Some(sub) = tx.subcategory_id {
                ids.push(sub);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        let names = match self.engine.category_names(&ids).await {
            Ok(names) => names,
            Err(err) => return self.internal_error(user_id, "category names", err),
        };

        let title = match kind {
            None => "Все",
            Some(TransactionKind::Expense) => "Траты",
            Some(TransactionKind::Income) => "Продажи",
        };
        let mut text = String::new();
        if let Some(prefix) = prefix {
            text.push_str(prefix);
            text.push_str("\n\n");
        }
        text.push_str(&format!(
            "🕐 Последние операции — {title} (с {})\n\n",
            offset + 1
        ));
        if page.items.is_empty() {
            text.push_str("Пока нет операций.");
        } else {
            for tx in &page.items {
                let when = tx.effective_at.with_timezone(&Moscow).format("%d.%m %H:%M");
                let emoji = match tx.kind {
                    TransactionKind::Expense => "💰",
                    TransactionKind::Income => "💸",
                };
                let category = names
                    .get(&tx.category_id)
                    .cloned()
                    .unwrap_or_else(|| tx.category_id.to_string());
                let sub = tx
                    .subcategory_id
                    .and_then(|id| names.get(&id))
                    .map(|name| format!(" → {name}"))
                    .unwrap_or_default();
                let comment = tx
                    .comment
                    .as_deref()
                    .map(|c| format!("\n   💬 {c}"))
                    .unwrap_or_default();
                text.push_str(&format!(
                    "ID {} • {when} {emoji} {} — {category}{sub}{comment}\n",
                    tx.id,
                    tx.amount.format(&tx.currency),
                ));
            }
        }

        let mut keyboard = vec![vec![
            Choice::new("Траты", token::recent(Some(TransactionKind::Expense), 0)),
            Choice::new("Продажи", token::recent(Some(TransactionKind::Income), 0)),
            Choice::new("Все", token::recent(None, 0)),
        ]];
        for tx in &page.items {
            keyboard.push(vec![Choice::new(
                format!("🗑 Удалить {}", tx.id),
                token::delete(tx.id, kind, offset),
            )]);
        }
        let mut nav = Vec::new();
        if offset > 0 {
            let prev = offset.saturating_sub(RECENT_PAGE_SIZE);
            nav.push(Choice::new("← Назад", token::recent(kind, prev)));
        }
        if page.has_more {
            nav.push(Choice::new(
                "Вперёд →",
                token::recent(kind, offset + RECENT_PAGE_SIZE),
            ));
        }
        if !nav.is_empty() {
            keyboard.push(nav);
        }
        keyboard.push(vec![Choice::new("🏠 Меню", token::MENU)]);

        let mut reply = match mode {
            ReplyMode::Edit => Reply::edit(text),
            ReplyMode::Fresh => Reply::fresh(text),
        };
        reply = reply.with_keyboard(keyboard);
        reply
    }

    async fn confirm_delete(
        &self,
        user_id: i64,
        tx_id: i64,
        kind: Option<TransactionKind>,
        offset: u64,
    ) -> Reply {
        let prefix = match self.engine.delete_transaction_by_id(user_id, tx_id).await {
            Ok(true) => "✅ Операция удалена.",
            // Foreign ids get the same answer as missing ones.
            Ok(false) => "❌ Операция не найдена.",
            Err(err) => return self.internal_error(user_id, "delete", err),
        };
        self.recent_reply(user_id, kind, offset, Some(prefix), ReplyMode::Edit)
            .await
    }

    async fn undo(&self, user_id: i64) -> Reply {
        match self.engine.delete_last_transaction(user_id).await {
            Ok(Some(tx)) => {
                let category = match self.engine.category_by_id(tx.category_id).await {
                    Ok(Some(category)) => category.name,
                    _ => tx.category_id.to_string(),
                };
                Reply::fresh(format!(
                    "✅ Последняя операция отменена:\nСумма: {}\nКатегория: {category}",
                    tx.amount.format(&tx.currency)
                ))
                .with_keyboard(main_menu_keyboard())
            }
            Ok(None) => Reply::fresh(format!(
                "❌ Не найдено операций для отмены (или прошло больше {UNDO_WINDOW_MINUTES} минут)"
            ))
            .with_keyboard(main_menu_keyboard()),
            Err(err) => self.internal_error(user_id, "undo", err),
        }
    }

    /// Re-renders the prompt of the draft's current step (used when a stale
    /// or mismatched event arrives).
    async fn render_step(&self, user_id: i64, draft: &Draft) -> Reply {
        match draft.step {
            DraftStep::AwaitingCategory => self.category_prompt(user_id, draft.kind).await,
            DraftStep::AwaitingSubcategory => {
                let Some(category_id) = draft.category_id else {
                    return self.category_prompt(user_id, draft.kind).await;
                };
                match self.engine.children_of(category_id).await {
                    Ok(children) => subcategory_prompt(
                        draft.category_name.as_deref().unwrap_or("?"),
                        &children,
                    ),
                    Err(err) => self.internal_error(user_id, "subcategories", err),
                }
            }
            DraftStep::AwaitingComment => comment_prompt(&draft.category_path(), ReplyMode::Edit),
            DraftStep::AwaitingAmount => amount_prompt(ReplyMode::Edit),
            DraftStep::AwaitingConfirmation => confirmation_prompt(draft, ReplyMode::Edit),
        }
    }

    fn internal_error(&self, user_id: i64, operation: &str, err: EngineError) -> Reply {
        tracing::error!(user_id, operation, error = %err, "operation failed");
        Reply::edit("❌ Произошла ошибка. Попробуйте позже.").with_keyboard(main_menu_keyboard())
    }
}

fn kind_title(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Expense => "Трата",
        TransactionKind::Income => "Продажа",
    }
}

fn report_title(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Expense => "Траты",
        TransactionKind::Income => "Продажи",
    }
}

fn cancel_row() -> Vec<Choice> {
    vec![Choice::new("❌ Отмена", token::CANCEL)]
}

fn main_menu_keyboard() -> Vec<Vec<Choice>> {
    vec![
        vec![
            Choice::new("💰 Трата", token::start(TransactionKind::Expense)),
            Choice::new("💸 Продажа", token::start(TransactionKind::Income)),
        ],
        vec![
            Choice::new(
                "📊 Посмотреть траты",
                token::recent(Some(TransactionKind::Expense), 0),
            ),
            Choice::new(
                "📈 Посмотреть продажи",
                token::recent(Some(TransactionKind::Income), 0),
            ),
        ],
        vec![
            Choice::new("🕐 Последние операции", token::recent(None, 0)),
            Choice::new("📋 Экспорт отчёта", token::REPORTS),
        ],
    ]
}

fn quick_actions_keyboard() -> Vec<Vec<Choice>> {
    vec![
        vec![
            Choice::new("💰 Ещё трата", token::start(TransactionKind::Expense)),
            Choice::new("💸 Ещё продажа", token::start(TransactionKind::Income)),
        ],
        vec![Choice::new("🏠 Главное меню", token::MENU)],
    ]
}

fn main_menu_reply(mode: ReplyMode) -> Reply {
    let reply = match mode {
        ReplyMode::Edit => Reply::edit("🏠 Главное меню:"),
        ReplyMode::Fresh => Reply::fresh("🏠 Главное меню:"),
    };
    reply.with_keyboard(main_menu_keyboard())
}

/// Quick-picks first (two per row), then regular roots, then cancel.
fn category_keyboard(roots: &[Category], quick: &[Category]) -> Vec<Vec<Choice>> {
    let mut keyboard: Vec<Vec<Choice>> = Vec::new();
    for pair in quick.chunks(2) {
        keyboard.push(
            pair.iter()
                .map(|c| Choice::new(c.name.clone(), token::category(c.id)))
                .collect(),
        );
    }
    for category in roots.iter().filter(|c| !c.quick_pick) {
        keyboard.push(vec![Choice::new(
            category.name.clone(),
            token::category(category.id),
        )]);
    }
    keyboard.push(cancel_row());
    keyboard
}

fn subcategory_prompt(category_name: &str, children: &[Category]) -> Reply {
    let mut keyboard: Vec<Vec<Choice>> = children
        .iter()
        .map(|c| vec![Choice::new(c.name.clone(), token::subcategory(c.id))])
        .collect();
    keyboard.push(cancel_row());
    Reply::edit(format!("📂 Выберите подкатегорию для '{category_name}':"))
        .with_keyboard(keyboard)
}

fn comment_prompt(category_path: &str, mode: ReplyMode) -> Reply {
    let text = format!(
        "💬 Введите комментарий к операции '{category_path}' (или отправьте '{SKIP_COMMENT}' для пропуска):"
    );
    let reply = match mode {
        ReplyMode::Edit => Reply::edit(text),
        ReplyMode::Fresh => Reply::fresh(text),
    };
    reply.with_keyboard(vec![cancel_row()])
}

fn amount_prompt(mode: ReplyMode) -> Reply {
    let reply = match mode {
        ReplyMode::Edit => Reply::edit("💰 Введите сумму:"),
        ReplyMode::Fresh => Reply::fresh("💰 Введите сумму:"),
    };
    reply.with_keyboard(vec![cancel_row()])
}

fn confirmation_prompt(draft: &Draft, mode: ReplyMode) -> Reply {
    let amount = draft.amount.unwrap_or_default();
    let comment = draft.comment.as_deref().unwrap_or("не указан");
    let text = format!(
        "📋 Подтвердите операцию:\n\n💰 Тип: {}\n📂 Категория: {}\n💵 Сумма: {}\n💬 Комментарий: {comment}\n\nВсё верно?",
        kind_title(draft.kind).to_lowercase(),
        draft.category_path(),
        amount.format(crate::transactions::DEFAULT_CURRENCY),
    );
    let reply = match mode {
        ReplyMode::Edit => Reply::edit(text),
        ReplyMode::Fresh => Reply::fresh(text),
    };
    reply.with_keyboard(vec![vec![
        Choice::new("✅ Подтвердить", token::CONFIRM),
        Choice::new("❌ Отмена", token::CANCEL),
    ]])
}

fn delete_prompt_reply(tx_id: i64, kind: Option<TransactionKind>, offset: u64) -> Reply {
    Reply::edit(format!("Удалить операцию ID {tx_id}?")).with_keyboard(vec![vec![
        Choice::new("✅ Да, удалить", token::delete_confirm(tx_id, kind, offset)),
        Choice::new("❌ Отмена", token::recent(kind, offset)),
    ]])
}

fn report_menu_reply() -> Reply {
    use crate::report::Aggregation::*;
    let expense = TransactionKind::Expense;
    let income = TransactionKind::Income;
    Reply::edit("📋 Экспорт отчёта: выберите тип").with_keyboard(vec![
        vec![
            Choice::new("Траты 30д", token::report(expense, 30, Detail)),
            Choice::new("Продажи 30д", token::report(income, 30, Detail)),
        ],
        vec![
            Choice::new("Траты: кат.", token::report(expense, 30, ByCategory)),
            Choice::new("Продажи: кат.", token::report(income, 30, ByCategory)),
        ],
        vec![
            Choice::new("Траты: подкат.", token::report(expense, 30, BySubcategory)),
            Choice::new("Продажи: подкат.", token::report(income, 30, BySubcategory)),
        ],
        vec![
            Choice::new("Траты: секции", token::report(expense, 30, ByCategorySections)),
            Choice::new("Траты: итого", token::report(expense, 30, Overall)),
        ],
        vec![
            Choice::new("Продажи: итого", token::report(income, 30, Overall)),
            Choice::new("🏠 Меню", token::MENU),
        ],
    ])
}
