use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite 每次 ALTER 只能加一列
        manager
            .alter_table(
                Table::alter()
                    .table(Inbounds::Table)
                    .add_column(
                        ColumnDef::new(Inbounds::AllTime)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Inbounds::Table)
                    .add_column(
                        ColumnDef::new(Inbounds::TrafficReset)
                            .string()
                            .not_null()
                            .default("never"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Inbounds::Table)
                    .add_column(
                        ColumnDef::new(Inbounds::LastTrafficResetTime)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(ClientTraffics::Table)
                    .add_column(
                        ColumnDef::new(ClientTraffics::AllTime)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for column in [Inbounds::AllTime, Inbounds::TrafficReset, Inbounds::LastTrafficResetTime] {
            manager
                .alter_table(
                    Table::alter()
                        .table(Inbounds::Table)
                        .drop_column(column)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .alter_table(
                Table::alter()
                    .table(ClientTraffics::Table)
                    .drop_column(ClientTraffics::AllTime)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Inbounds {
    Table,
    AllTime,
    TrafficReset,
    LastTrafficResetTime,
}

#[derive(DeriveIden)]
enum ClientTraffics {
    Table,
    AllTime,
}
