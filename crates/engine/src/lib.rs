//! Kopilka core: the transaction repository, category directory,
//! conversation state machine and report aggregation engine.
//!
//! The chat transport and the artifact renderer are collaborators behind
//! contracts: the transport feeds [`Event`]s to a [`Conversation`] and
//! delivers its [`Reply`]s; artifact generation goes through
//! [`report::Renderer`].

pub use categories::{Category, CategorySeed};
pub use error::EngineError;
pub use events::{Choice, Event, Reply, ReplyMode, token};
pub use flow::{Conversation, SKIP_COMMENT, next_step_after_category};
pub use money::{AmountError, MoneyCents, parse_amount};
pub use ops::{
    Engine, EngineBuilder, RECENT_PAGE_SIZE, RecentPage, ReportRequest, TransactionQuery,
    UNDO_WINDOW_MINUTES,
};
pub use report::{Aggregation, RenderError, Renderer, Report, ReportRow, ReportSummary, Table};
pub use session::{Draft, DraftStep, Session, SessionStore};
pub use transactions::{DEFAULT_CURRENCY, NewTransaction, Transaction, TransactionKind};

mod categories;
mod error;
mod events;
mod flow;
mod money;
mod ops;
pub mod report;
mod session;
mod transactions;
mod users;

type ResultEngine<T> = Result<T, EngineError>;
