use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncProgress::Table)
                    .if_not_exists()
                    .col(integer(SyncProgress::Id).primary_key())
                    .col(big_integer(SyncProgress::CursorIndex))
                    .col(big_integer_null(SyncProgress::CursorId))
                    .col(big_integer_null(SyncProgress::CeilingId))
                    .col(big_integer_null(SyncProgress::HeadCursorId))
                    .col(big_integer_null(SyncProgress::HeadTopId))
                    .col(big_integer(SyncProgress::TotalCount))
                    .col(big_integer(SyncProgress::LastRunAt))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncProgress::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum SyncProgress {
    Table,
    Id,
    CursorIndex,
    CursorId,
    CeilingId,
    HeadCursorId,
    HeadTopId,
    TotalCount,
    LastRunAt,
}
