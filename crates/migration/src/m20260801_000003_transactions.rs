use sea_orm_migration::prelude::*;

use crate::m20260801_000001_users::Users;
use crate::m20260801_000002_categories::Categories;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    Kind,
    CategoryId,
    SubcategoryId,
    AmountMinor,
    Currency,
    Comment,
    CreatedAt,
    EffectiveAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::CategoryId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::SubcategoryId).big_integer())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Currency)
                            .string()
                            .not_null()
                            .default("RUB"),
                    )
                    .col(ColumnDef::new(Transactions::Comment).text())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::EffectiveAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-user_id")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-category_id")
                            .from(Transactions::Table, Transactions::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-subcategory_id")
                            .from(Transactions::Table, Transactions::SubcategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user-created")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-user-effective")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::EffectiveAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-kind-category")
                    .table(Transactions::Table)
                    .col(Transactions::Kind)
                    .col(Transactions::CategoryId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}
