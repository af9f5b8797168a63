use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Statement};

use engine::{
    Aggregation, EngineError, MoneyCents, NewTransaction, ReportRequest, TransactionKind,
    TransactionQuery,
};

mod common;

use common::{ALICE, BOB, engine_with_db};

fn expense(amount_cents: i64, category_id: i64) -> NewTransaction {
    NewTransaction {
        user_id: ALICE,
        kind: TransactionKind::Expense,
        category_id,
        subcategory_id: None,
        amount: MoneyCents::new(amount_cents),
        comment: None,
        effective_at: None,
    }
}

#[tokio::test]
async fn create_then_list_includes_the_transaction() {
    let (engine, _db) = engine_with_db().await;

    let created = engine
        .create_transaction(&NewTransaction {
            comment: Some("мёд на рынке".to_string()),
            ..expense(150_000, 1)
        })
        .await
        .unwrap();
    assert_eq!(created.kind, TransactionKind::Expense);
    assert_eq!(created.amount, MoneyCents::new(150_000));
    assert_eq!(created.currency, "RUB");

    let listed = engine
        .list_transactions(&TransactionQuery {
            user_id: ALICE,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);
    assert_eq!(listed[0].comment.as_deref(), Some("мёд на рынке"));
}

#[tokio::test]
async fn create_validates_category_shape() {
    let (engine, _db) = engine_with_db().await;

    // Income category on an expense draft.
    let err = engine
        .create_transaction(&expense(100, 101))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));

    // Unknown category.
    let err = engine
        .create_transaction(&expense(100, 999))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // Subcategory of a different root.
    let err = engine
        .create_transaction(&NewTransaction {
            subcategory_id: Some(31),
            ..expense(100, 4)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));

    // Proper child is accepted.
    engine
        .create_transaction(&NewTransaction {
            subcategory_id: Some(43),
            ..expense(100, 4)
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_by_id_is_scoped_to_the_owner() {
    let (engine, _db) = engine_with_db().await;
    let created = engine.create_transaction(&expense(5_000, 1)).await.unwrap();

    // Another user cannot see or delete it, and cannot tell it exists.
    assert!(!engine
        .delete_transaction_by_id(BOB, created.id)
        .await
        .unwrap());
    let still_there = engine
        .list_transactions(&TransactionQuery {
            user_id: ALICE,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(still_there.len(), 1);

    assert!(engine
        .delete_transaction_by_id(ALICE, created.id)
        .await
        .unwrap());
    let gone = engine
        .list_transactions(&TransactionQuery {
            user_id: ALICE,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(gone.is_empty());

    // Second delete reports not found.
    assert!(!engine
        .delete_transaction_by_id(ALICE, created.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn recent_pages_are_newest_first_with_has_more() {
    let (engine, _db) = engine_with_db().await;
    let base = Utc::now() - Duration::hours(1);
    for i in 0..15 {
        engine
            .create_transaction(&NewTransaction {
                effective_at: Some(base + Duration::minutes(i)),
                ..expense(100 * (i + 1), 1)
            })
            .await
            .unwrap();
    }

    let first = engine.recent_page(ALICE, None, 0).await.unwrap();
    assert_eq!(first.items.len(), 10);
    assert!(first.has_more);
    // Newest first.
    assert_eq!(first.items[0].amount, MoneyCents::new(1_500));

    let second = engine.recent_page(ALICE, None, 10).await.unwrap();
    assert_eq!(second.items.len(), 5);
    assert!(!second.has_more);
    assert_eq!(second.items[4].amount, MoneyCents::new(100));

    // A page ending exactly on the last row does not advertise more.
    let exact = engine.recent_page(ALICE, None, 5).await.unwrap();
    assert_eq!(exact.items.len(), 10);
    assert!(!exact.has_more);
}

#[tokio::test]
async fn recent_page_filters_by_kind() {
    let (engine, _db) = engine_with_db().await;
    engine.create_transaction(&expense(100, 1)).await.unwrap();
    engine
        .create_transaction(&NewTransaction {
            kind: TransactionKind::Income,
            category_id: 102,
            ..expense(900, 1)
        })
        .await
        .unwrap();

    let incomes = engine
        .recent_page(ALICE, Some(TransactionKind::Income), 0)
        .await
        .unwrap();
    assert_eq!(incomes.items.len(), 1);
    assert_eq!(incomes.items[0].kind, TransactionKind::Income);
}

#[tokio::test]
async fn undo_deletes_only_within_the_window() {
    let (engine, db) = engine_with_db().await;
    let created = engine.create_transaction(&expense(7_700, 2)).await.unwrap();

    let undone = engine.delete_last_transaction(ALICE).await.unwrap();
    assert_eq!(undone.map(|tx| tx.id), Some(created.id));

    // Nothing left to undo.
    assert!(engine.delete_last_transaction(ALICE).await.unwrap().is_none());

    // An old transaction is out of reach of undo.
    let old = engine.create_transaction(&expense(5_000, 2)).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE transactions SET created_at = ? WHERE id = ?",
        vec![(Utc::now() - Duration::minutes(10)).into(), old.id.into()],
    ))
    .await
    .unwrap();

    assert!(engine.delete_last_transaction(ALICE).await.unwrap().is_none());
    let listed = engine
        .list_transactions(&TransactionQuery {
            user_id: ALICE,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn list_filters_amount_range_and_comment() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_transaction(&NewTransaction {
            comment: Some("Корм для пчёл".to_string()),
            ..expense(10_000, 3)
        })
        .await
        .unwrap();
    engine
        .create_transaction(&NewTransaction {
            comment: Some("бензин".to_string()),
            ..expense(50_000, 2)
        })
        .await
        .unwrap();

    let by_comment = engine
        .list_transactions(&TransactionQuery {
            user_id: ALICE,
            comment_query: Some("КОРМ".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_comment.len(), 1);
    assert_eq!(by_comment[0].category_id, 3);

    let by_amount = engine
        .list_transactions(&TransactionQuery {
            user_id: ALICE,
            amount_min: Some(MoneyCents::new(20_000)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_amount.len(), 1);
    assert_eq!(by_amount[0].category_id, 2);
}

#[tokio::test]
async fn report_summary_reflects_the_unaggregated_set() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_transaction(&NewTransaction {
            subcategory_id: Some(43),
            ..expense(30_000, 4)
        })
        .await
        .unwrap();
    engine
        .create_transaction(&NewTransaction {
            subcategory_id: Some(41),
            ..expense(20_000, 4)
        })
        .await
        .unwrap();
    engine.create_transaction(&expense(10_000, 1)).await.unwrap();

    let report = engine
        .build_report(&ReportRequest::last_days(
            ALICE,
            TransactionKind::Expense,
            30,
            Aggregation::ByCategory,
        ))
        .await
        .unwrap();

    assert_eq!(report.summary.total, MoneyCents::new(60_000));
    assert_eq!(report.summary.count, 3);
    assert_eq!(report.data.rows.len(), 3);

    let (_, table) = &report.aggregates[0];
    // Categories resolved to names and sorted by sum descending.
    assert_eq!(table.rows[0][0], "Пчеловодство");
    assert_eq!(table.rows[0][1], "2");
    assert_eq!(table.rows[0][2], "500.00");
    assert_eq!(table.rows[1][0], "Продукты");
}

#[tokio::test]
async fn report_sections_split_per_category() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_transaction(&NewTransaction {
            subcategory_id: Some(43),
            ..expense(30_000, 4)
        })
        .await
        .unwrap();
    engine.create_transaction(&expense(10_000, 1)).await.unwrap();

    let report = engine
        .build_report(&ReportRequest::last_days(
            ALICE,
            TransactionKind::Expense,
            30,
            Aggregation::ByCategorySections,
        ))
        .await
        .unwrap();

    assert_eq!(report.chart.len(), 2);
    assert_eq!(report.chart[0].0, "Пчеловодство");
    assert_eq!(report.chart[0].1.rows[0][0], "Сахар");
}

#[tokio::test]
async fn report_request_validation() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .build_report(&ReportRequest::last_days(
            ALICE,
            TransactionKind::Income,
            30,
            Aggregation::ByCategorySections,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));

    let err = engine
        .build_report(&ReportRequest::last_days(
            ALICE,
            TransactionKind::Expense,
            400,
            Aggregation::Detail,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));
}

#[tokio::test]
async fn empty_report_is_well_formed() {
    let (engine, _db) = engine_with_db().await;

    let report = engine
        .build_report(&ReportRequest::last_days(
            ALICE,
            TransactionKind::Expense,
            30,
            Aggregation::Overall,
        ))
        .await
        .unwrap();
    assert_eq!(report.summary.count, 0);
    assert_eq!(report.summary.total, MoneyCents::ZERO);
    let (_, overall) = &report.aggregates[0];
    assert_eq!(overall.rows.len(), 2);
    assert_eq!(overall.rows[0][1], "0.00");
}
