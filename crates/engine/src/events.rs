//! The event/reply contract between the core and the chat transport.
//!
//! The transport maps incoming updates to [`Event`]s and delivers [`Reply`]s;
//! it never interprets choice tokens beyond passing them back through
//! [`token::parse`].

use std::path::PathBuf;

use crate::{TransactionKind, report::Aggregation};

/// A user intent, decoded from a command, text message or button press.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    StartTransaction(TransactionKind),
    SelectCategory(i64),
    SelectSubcategory(i64),
    SubmitComment(String),
    SubmitAmount(String),
    Confirm,
    Cancel,
    MainMenu,
    ReportMenu,
    RequestReport {
        kind: TransactionKind,
        days: i64,
        mode: Aggregation,
    },
    RequestRecent {
        kind: Option<TransactionKind>,
        offset: u64,
    },
    RequestDelete {
        tx_id: i64,
        kind: Option<TransactionKind>,
        offset: u64,
    },
    ConfirmDelete {
        tx_id: i64,
        kind: Option<TransactionKind>,
        offset: u64,
    },
    RequestUndo,
}

/// One selectable button: a label plus the opaque token the transport sends
/// back when pressed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub token: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// How the transport should deliver a reply relative to the live prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyMode {
    /// Replace the previous prompt in place.
    Edit,
    /// Retire the previous prompt, then send a new message.
    Fresh,
}

/// What the core wants shown to the user after handling one event.
#[derive(Clone, Debug)]
pub struct Reply {
    pub text: String,
    pub keyboard: Vec<Vec<Choice>>,
    pub artifacts: Vec<PathBuf>,
    pub mode: ReplyMode,
}

impl Reply {
    pub fn edit(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
            artifacts: Vec::new(),
            mode: ReplyMode::Edit,
        }
    }

    pub fn fresh(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
            artifacts: Vec::new(),
            mode: ReplyMode::Fresh,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Vec<Vec<Choice>>) -> Self {
        self.keyboard = keyboard;
        self
    }

    pub fn with_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.artifacts = artifacts;
        self
    }
}

/// Choice-token grammar: short colon-separated fields, produced here and
/// parsed back by [`token::parse`].
pub mod token {
    use super::*;

    pub fn start(kind: TransactionKind) -> String {
        format!("start:{}", kind.as_str())
    }

    pub fn category(id: i64) -> String {
        format!("cat:{id}")
    }

    pub fn subcategory(id: i64) -> String {
        format!("sub:{id}")
    }

    pub const CONFIRM: &str = "confirm";
    pub const CANCEL: &str = "cancel";
    pub const MENU: &str = "menu";
    pub const REPORTS: &str = "reports";
    pub const UNDO: &str = "undo";

    pub fn report(kind: TransactionKind, days: i64, mode: Aggregation) -> String {
        format!("rep:{}:{days}:{}", kind.as_str(), mode.as_str())
    }

    pub fn recent(kind: Option<TransactionKind>, offset: u64) -> String {
        format!("recent:{}:{offset}", scope_str(kind))
    }

    pub fn delete(tx_id: i64, kind: Option<TransactionKind>, offset: u64) -> String {
        format!("del:{tx_id}:{}:{offset}", scope_str(kind))
    }

    pub fn delete_confirm(tx_id: i64, kind: Option<TransactionKind>, offset: u64) -> String {
        format!("delok:{tx_id}:{}:{offset}", scope_str(kind))
    }

    fn scope_str(kind: Option<TransactionKind>) -> &'static str {
        match kind {
            None => "all",
            Some(kind) => kind.as_str(),
        }
    }

    fn parse_scope(scope: &str) -> Option<Option<TransactionKind>> {
        match scope {
            "all" => Some(None),
            other => TransactionKind::try_from(other).ok().map(Some),
        }
    }

    /// Decodes a callback token back into an [`Event`].
    ///
    /// Unknown or malformed tokens yield `None` and are ignored upstream
    /// (stale keyboards from old prompts may legitimately produce them).
    pub fn parse(data: &str) -> Option<Event> {
        match data {
            CONFIRM => return Some(Event::Confirm),
            CANCEL => return Some(Event::Cancel),
            MENU => return Some(Event::MainMenu),
            REPORTS => return Some(Event::ReportMenu),
            UNDO => return Some(Event::RequestUndo),
            _ => {}
        }

        let mut parts = data.split(':');
        let head = parts.next()?;
        match head {
            "start" => {
                let kind = TransactionKind::try_from(parts.next()?).ok()?;
                Some(Event::StartTransaction(kind))
            }
            "cat" => Some(Event::SelectCategory(parts.next()?.parse().ok()?)),
            "sub" => Some(Event::SelectSubcategory(parts.next()?.parse().ok()?)),
            "rep" => {
                let kind = TransactionKind::try_from(parts.next()?).ok()?;
                let days = parts.next()?.parse().ok()?;
                let mode = Aggregation::try_from(parts.next()?).ok()?;
                Some(Event::RequestReport { kind, days, mode })
            }
            "recent" => {
                let kind = parse_scope(parts.next()?)?;
                let offset = parts.next()?.parse().ok()?;
                Some(Event::RequestRecent { kind, offset })
            }
            "del" => {
                let tx_id = parts.next()?.parse().ok()?;
                let kind = parse_scope(parts.next()?)?;
                let offset = parts.next()?.parse().ok()?;
                Some(Event::RequestDelete {
                    tx_id,
                    kind,
                    offset,
                })
            }
            "delok" => {
                let tx_id = parts.next()?.parse().ok()?;
                let kind = parse_scope(parts.next()?)?;
                let offset = parts.next()?.parse().ok()?;
                Some(Event::ConfirmDelete {
                    tx_id,
                    kind,
                    offset,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_roundtrip() {
        let cases = [
            (
                token::start(TransactionKind::Expense),
                Event::StartTransaction(TransactionKind::Expense),
            ),
            (token::category(5), Event::SelectCategory(5)),
            (token::subcategory(41), Event::SelectSubcategory(41)),
            (
                token::report(TransactionKind::Income, 30, Aggregation::ByCategory),
                Event::RequestReport {
                    kind: TransactionKind::Income,
                    days: 30,
                    mode: Aggregation::ByCategory,
                },
            ),
            (
                token::recent(None, 10),
                Event::RequestRecent {
                    kind: None,
                    offset: 10,
                },
            ),
            (
                token::delete(17, Some(TransactionKind::Expense), 0),
                Event::RequestDelete {
                    tx_id: 17,
                    kind: Some(TransactionKind::Expense),
                    offset: 0,
                },
            ),
            (
                token::delete_confirm(17, None, 20),
                Event::ConfirmDelete {
                    tx_id: 17,
                    kind: None,
                    offset: 20,
                },
            ),
            (token::CONFIRM.to_string(), Event::Confirm),
            (token::UNDO.to_string(), Event::RequestUndo),
        ];

        for (data, expected) in cases {
            assert_eq!(token::parse(&data), Some(expected), "token {data}");
        }
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        assert_eq!(token::parse(""), None);
        assert_eq!(token::parse("cat:abc"), None);
        assert_eq!(token::parse("rep:expense:30:nope"), None);
        assert_eq!(token::parse("something:else"), None);
    }
}
