use sea_orm::DatabaseConnection;

mod categories;
mod reports;
mod transactions;
mod users;

pub use reports::ReportRequest;
pub use transactions::{RECENT_PAGE_SIZE, RecentPage, TransactionQuery, UNDO_WINDOW_MINUTES};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Storage-backed operations: transaction repository, category directory and
/// report building, all scoped by user id.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub(crate) fn database(&self) -> &DatabaseConnection {
        &self.database
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> Engine {
        Engine {
            database: self.database,
        }
    }
}
