use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Games::Table)
                    .if_not_exists()
                    .col(big_integer(Games::Id).primary_key())
                    .col(text(Games::Title))
                    .col(text(Games::Platforms))
                    .col(double_null(Games::BasePrice))
                    .col(double(Games::Discount))
                    .col(double(Games::Rating))
                    .col(big_integer(Games::Dau))
                    .col(text(Games::Tags))
                    .col(text(Games::Cover))
                    .col(text(Games::ReleaseDate))
                    .col(text(Games::Description))
                    .col(big_integer(Games::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_games_rating")
                    .table(Games::Table)
                    .col(Games::Rating)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Games::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Games {
    Table,
    Id,
    Title,
    Platforms,
    BasePrice,
    Discount,
    Rating,
    Dau,
    Tags,
    Cover,
    ReleaseDate,
    Description,
    UpdatedAt,
}
