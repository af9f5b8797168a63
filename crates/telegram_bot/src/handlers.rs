use engine::{DraftStep, Event, Reply, ReplyMode, token};
use teloxide::{
    prelude::*,
    types::{CallbackQuery, ChatId, InputFile, MessageId, User},
};

use crate::{ConfigParameters, ui};

pub(crate) async fn handle_message(
    bot: Bot,
    msg: Message,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    if !is_allowed(&cfg, msg.from.as_ref()) {
        return Ok(());
    }

    let Some(from) = msg.from.as_ref() else {
        bot.send_message(msg.chat.id, "Не удалось определить пользователя.")
            .await?;
        return Ok(());
    };
    let user_id = from.id.0 as i64;
    let chat_id = msg.chat.id;

    let Some(text) = msg.text() else {
        return Ok(());
    };

    if let Some(cmd) = parse_command(text) {
        match cmd {
            Command::Start => {
                if let Err(err) = cfg
                    .conversation
                    .engine_handle()
                    .get_or_create_user(
                        user_id,
                        from.username.as_deref(),
                        Some(from.first_name.as_str()),
                        from.last_name.as_deref(),
                    )
                    .await
                {
                    tracing::error!(user_id, error = %err, "failed to register user");
                }

                let menu = cfg.conversation.handle(user_id, Event::MainMenu).await;
                let welcome = Reply {
                    text: ui::welcome_text(Some(from.first_name.as_str())),
                    mode: ReplyMode::Fresh,
                    ..menu
                };
                deliver(&bot, chat_id, user_id, &cfg, welcome).await?;
            }
            Command::Help => {
                bot.send_message(chat_id, ui::help_text()).await?;
            }
            Command::Undo => {
                let reply = cfg.conversation.handle(user_id, Event::RequestUndo).await;
                deliver(&bot, chat_id, user_id, &cfg, reply).await?;
            }
        }
        return Ok(());
    }

    // Free text only means something while the dialogue is waiting for it.
    let step = cfg
        .conversation
        .sessions()
        .get(user_id)
        .await
        .draft
        .map(|d| d.step);
    let event = match step {
        Some(DraftStep::AwaitingComment) => Event::SubmitComment(text.to_string()),
        Some(DraftStep::AwaitingAmount) => Event::SubmitAmount(text.to_string()),
        _ => {
            tracing::debug!(user_id, "ignoring text outside the dialogue");
            return Ok(());
        }
    };

    let reply = cfg.conversation.handle(user_id, event).await;
    deliver(&bot, chat_id, user_id, &cfg, reply).await
}

pub(crate) async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    if !is_allowed(&cfg, Some(&q.from)) {
        return Ok(());
    }

    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let user_id = q.from.id.0 as i64;

    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(event) = token::parse(data) else {
        tracing::debug!(user_id, data, "ignoring unknown callback token");
        return Ok(());
    };

    let reply = cfg.conversation.handle(user_id, event).await;
    deliver(&bot, chat_id, user_id, &cfg, reply).await
}

/// Delivers one reply, keeping exactly one live prompt per chat: `Edit`
/// replaces the prompt in place, `Fresh` retires it before sending anew.
async fn deliver(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    cfg: &ConfigParameters,
    reply: Reply,
) -> ResponseResult<()> {
    let sessions = cfg.conversation.sessions();
    let markup = ui::keyboard(&reply.keyboard);

    if reply.mode == ReplyMode::Fresh
        && let Some(old) = sessions.take_prompt(user_id).await
    {
        let _ = bot.delete_message(chat_id, MessageId(old)).await;
    }

    for artifact in &reply.artifacts {
        bot.send_document(chat_id, InputFile::file(artifact.clone()))
            .await?;
    }

    if reply.mode == ReplyMode::Edit
        && let Some(prompt_id) = sessions.get(user_id).await.prompt_id
        && bot
            .edit_message_text(chat_id, MessageId(prompt_id), reply.text.clone())
            .reply_markup(markup.clone())
            .await
            .is_ok()
    {
        return Ok(());
    }

    let sent = bot
        .send_message(chat_id, reply.text)
        .reply_markup(markup)
        .await?;
    sessions.set_prompt(user_id, sent.id.0).await;
    Ok(())
}

fn is_allowed(cfg: &ConfigParameters, from: Option<&User>) -> bool {
    let Some(from) = from else {
        return false;
    };
    match &cfg.allowed_users {
        None => true,
        Some(ids) => ids.contains(&from.id),
    }
}

fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let cmd = trimmed.split_whitespace().next().unwrap_or("");

    match cmd {
        "/start" => Some(Command::Start),
        "/help" => Some(Command::Help),
        "/undo" => Some(Command::Undo),
        _ => None,
    }
}

#[derive(Debug, Clone)]
enum Command {
    Start,
    Help,
    Undo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_arguments_and_whitespace() {
        assert!(matches!(parse_command("/start"), Some(Command::Start)));
        assert!(matches!(parse_command(" /undo "), Some(Command::Undo)));
        assert!(matches!(parse_command("/help me"), Some(Command::Help)));
        assert!(parse_command("hello").is_none());
        assert!(parse_command("/unknown").is_none());
    }
}
