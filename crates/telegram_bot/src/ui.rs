use engine::Choice;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Maps the core's choice rows onto a Telegram inline keyboard.
pub(crate) fn keyboard(rows: &[Vec<Choice>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|choice| InlineKeyboardButton::callback(choice.label.clone(), choice.token.clone()))
            .collect::<Vec<_>>()
    }))
}

pub(crate) fn welcome_text(first_name: Option<&str>) -> String {
    let name = first_name.unwrap_or("пользователь");
    format!("👋 Привет, {name}!\n\nЯ бот для учёта расходов и продаж. Выберите действие:")
}

pub(crate) fn help_text() -> &'static str {
    "📖 Справка по командам:\n\n\
     /start - Главное меню\n\
     /help - Эта справка\n\
     /undo - Отменить последнюю операцию (в течение 5 минут)\n\n\
     💡 Быстрые команды:\n\
     • Нажмите \"💰 Трата\" для записи расходов\n\
     • Нажмите \"💸 Продажа\" для записи доходов\n\
     • Используйте \"🕐 Последние операции\" для просмотра и удаления\n\
     • Используйте \"📋 Экспорт отчёта\" для создания отчётов"
}
