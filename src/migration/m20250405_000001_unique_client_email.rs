use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 引擎只按 email 上报流量，email 必须全局唯一
        manager
            .drop_index(
                Index::drop()
                    .name("idx_client_traffics_inbound_email")
                    .table(ClientTraffics::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_client_traffics_email")
                    .table(ClientTraffics::Table)
                    .col(ClientTraffics::Email)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_client_traffics_email")
                    .table(ClientTraffics::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_client_traffics_inbound_email")
                    .table(ClientTraffics::Table)
                    .col(ClientTraffics::InboundId)
                    .col(ClientTraffics::Email)
                    .unique()
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum ClientTraffics {
    Table,
    InboundId,
    Email,
}
