use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Inbounds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Inbounds::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Inbounds::UserId).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Inbounds::Up).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Inbounds::Down).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Inbounds::Total).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Inbounds::Remark).string().not_null().default(""))
                    .col(ColumnDef::new(Inbounds::Enable).boolean().not_null().default(true))
                    .col(ColumnDef::new(Inbounds::ExpiryTime).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Inbounds::Listen).string().not_null().default(""))
                    .col(ColumnDef::new(Inbounds::Port).integer().not_null())
                    .col(ColumnDef::new(Inbounds::Protocol).string().not_null())
                    .col(ColumnDef::new(Inbounds::Settings).text().not_null().default(""))
                    .col(ColumnDef::new(Inbounds::StreamSettings).text().not_null().default(""))
                    .col(ColumnDef::new(Inbounds::Tag).string().not_null().unique_key())
                    .col(ColumnDef::new(Inbounds::Sniffing).text().not_null().default(""))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ClientTraffics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClientTraffics::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ClientTraffics::InboundId).big_integer().not_null())
                    .col(ColumnDef::new(ClientTraffics::Enable).boolean().not_null().default(true))
                    .col(ColumnDef::new(ClientTraffics::Email).string().not_null())
                    .col(ColumnDef::new(ClientTraffics::Up).big_integer().not_null().default(0))
                    .col(ColumnDef::new(ClientTraffics::Down).big_integer().not_null().default(0))
                    .col(ColumnDef::new(ClientTraffics::Total).big_integer().not_null().default(0))
                    .col(ColumnDef::new(ClientTraffics::ExpiryTime).big_integer().not_null().default(0))
                    .col(ColumnDef::new(ClientTraffics::Reset).integer().not_null().default(0))
                    .col(ColumnDef::new(ClientTraffics::SubId).string().not_null().default(""))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_client_traffics_inbound")
                            .from(ClientTraffics::Table, ClientTraffics::InboundId)
                            .to(Inbounds::Table, Inbounds::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // email 在同一入站内唯一
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
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SystemConfig::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SystemConfig::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SystemConfig::Key)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SystemConfig::Value).text().not_null())
                    .col(ColumnDef::new(SystemConfig::Description).string().not_null())
                    .col(ColumnDef::new(SystemConfig::ValueType).string().not_null())
                    .col(
                        ColumnDef::new(SystemConfig::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SystemConfig::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 插入默认配置
        let insert = Query::insert()
            .into_table(SystemConfig::Table)
            .columns([
                SystemConfig::Key,
                SystemConfig::Value,
                SystemConfig::Description,
                SystemConfig::ValueType,
            ])
            .values_panic([
                "external_traffic_inform_enable".into(),
                "false".into(),
                "是否把每周期流量推送到外部接口".into(),
                "boolean".into(),
            ])
            .values_panic([
                "external_traffic_inform_uri".into(),
                "\"\"".into(),
                "外部流量推送地址".into(),
                "string".into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SystemConfig::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ClientTraffics::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Inbounds::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Inbounds {
    Table,
    Id,
    UserId,
    Up,
    Down,
    Total,
    Remark,
    Enable,
    ExpiryTime,
    Listen,
    Port,
    Protocol,
    Settings,
    StreamSettings,
    Tag,
    Sniffing,
}

#[derive(DeriveIden)]
enum ClientTraffics {
    Table,
    Id,
    InboundId,
    Enable,
    Email,
    Up,
    Down,
    Total,
    ExpiryTime,
    Reset,
    SubId,
}

#[derive(DeriveIden)]
enum SystemConfig {
    Table,
    Id,
    Key,
    Value,
    Description,
    ValueType,
    CreatedAt,
    UpdatedAt,
}
