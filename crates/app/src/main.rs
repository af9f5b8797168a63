use std::sync::Arc;

use migration::{Migrator, MigratorTrait};

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "kopilka={level},telegram_bot={level},engine={level},reports={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let engine = Arc::new(engine::Engine::builder().database(db).build());

    match std::fs::read_to_string(&settings.categories.file) {
        Ok(json) => {
            engine.seed_categories(&json).await?;
        }
        Err(err) => {
            tracing::warn!(
                file = %settings.categories.file,
                "category file not readable: {err}"
            );
        }
    }

    let bot = telegram_bot::Bot::builder()
        .token(&settings.telegram.token)
        .allowed_users(settings.telegram.allowed_users)
        .engine(engine)
        .export_dir(&settings.telegram.export_dir)
        .build()?;

    bot.run().await;
    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match &config.path {
        None => String::from("sqlite::memory:"),
        Some(path) => format!("sqlite:{path}?mode=rwc"),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
