use engine::Engine;
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

/// Taxonomy used across the integration tests: two expense roots with
/// subcategories, plain leaves, and quick-pick income categories.
pub const CATEGORIES: &str = r#"[
    {"id": 1, "name": "Продукты", "kind": "expense"},
    {"id": 2, "name": "Транспорт", "kind": "expense"},
    {"id": 3, "name": "Хозяйство", "kind": "expense"},
    {"id": 31, "name": "Ремонт", "kind": "expense", "parent_id": 3},
    {"id": 32, "name": "Корма", "kind": "expense", "parent_id": 3},
    {"id": 4, "name": "Пчеловодство", "kind": "expense"},
    {"id": 41, "name": "Инвентарь", "kind": "expense", "parent_id": 4},
    {"id": 42, "name": "Лекарства", "kind": "expense", "parent_id": 4},
    {"id": 43, "name": "Сахар", "kind": "expense", "parent_id": 4},
    {"id": 101, "name": "Другое доход", "kind": "income"},
    {"id": 102, "name": "Мёд 3 л", "kind": "income", "quick_pick": true},
    {"id": 103, "name": "Мёд 1 л", "kind": "income", "quick_pick": true},
    {"id": 104, "name": "Мёд 0.5 л", "kind": "income", "quick_pick": true},
    {"id": 105, "name": "Соты", "kind": "income", "quick_pick": true}
]"#;

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    let engine = Engine::builder().database(db.clone()).build();
    engine.seed_categories(CATEGORIES).await.unwrap();
    engine
        .get_or_create_user(ALICE, Some("alice"), None, None)
        .await
        .unwrap();
    engine
        .get_or_create_user(BOB, Some("bob"), None, None)
        .await
        .unwrap();
    (engine, db)
}
