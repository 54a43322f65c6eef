use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_master_data_tables::Migration),
            Box::new(m20240101_000002_create_production_orders_table::Migration),
            Box::new(m20240101_000003_create_production_steps_table::Migration),
            Box::new(m20240101_000004_create_bom_lines_table::Migration),
            Box::new(m20240101_000005_create_inventory_balances_table::Migration),
            Box::new(m20240101_000006_create_serialized_units_table::Migration),
            Box::new(m20240101_000007_create_ledger_entries_table::Migration),
            Box::new(m20240101_000008_create_work_center_allocations_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_master_data_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_master_data_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Parts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Parts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Parts::PartNumber).string().not_null())
                        .col(ColumnDef::new(Parts::Description).string().null())
                        .col(ColumnDef::new(Parts::UnitOfMeasure).string().not_null())
                        .col(ColumnDef::new(Parts::StandardCost).decimal().null())
                        .col(
                            ColumnDef::new(Parts::IsSerialized)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Parts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Parts::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Parts::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-parts-part-number")
                        .table(Parts::Table)
                        .col(Parts::PartNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Locations::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Locations::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Locations::Code).string().not_null())
                        .col(ColumnDef::new(Locations::Name).string().not_null())
                        .col(
                            ColumnDef::new(Locations::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Locations::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-locations-code")
                        .table(Locations::Table)
                        .col(Locations::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WorkCenters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkCenters::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WorkCenters::Code).string().not_null())
                        .col(ColumnDef::new(WorkCenters::Name).string().not_null())
                        .col(
                            ColumnDef::new(WorkCenters::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(WorkCenters::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(WorkCenters::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-work-centers-code")
                        .table(WorkCenters::Table)
                        .col(WorkCenters::Code)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WorkCenters::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Locations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Parts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Parts {
        Table,
        Id,
        PartNumber,
        Description,
        UnitOfMeasure,
        StandardCost,
        IsSerialized,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Locations {
        Table,
        Id,
        Code,
        Name,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum WorkCenters {
        Table,
        Id,
        Code,
        Name,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_production_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_production_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductionOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::OrderNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionOrders::PartId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductionOrders::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::QuantityOrdered)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::QuantityCompleted)
                                .decimal()
                                .null(),
                        )
                        .col(ColumnDef::new(ProductionOrders::HoldReason).string().null())
                        .col(
                            ColumnDef::new(ProductionOrders::ActualStart)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::ActualEnd)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-production-orders-order-number")
                        .table(ProductionOrders::Table)
                        .col(ProductionOrders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-production-orders-status")
                        .table(ProductionOrders::Table)
                        .col(ProductionOrders::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductionOrders {
        Table,
        Id,
        OrderNumber,
        PartId,
        Status,
        QuantityOrdered,
        QuantityCompleted,
        HoldReason,
        ActualStart,
        ActualEnd,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_production_steps_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_production_steps_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductionSteps::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionSteps::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionSteps::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductionSteps::SequenceNumber)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionSteps::Name).string().not_null())
                        .col(
                            ColumnDef::new(ProductionSteps::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionSteps::StartedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionSteps::CompletedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionSteps::ActualMinutes)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionSteps::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionSteps::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-production-steps-order-seq")
                        .table(ProductionSteps::Table)
                        .col(ProductionSteps::OrderId)
                        .col(ProductionSteps::SequenceNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionSteps::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductionSteps {
        Table,
        Id,
        OrderId,
        SequenceNumber,
        Name,
        Status,
        StartedAt,
        CompletedAt,
        ActualMinutes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_bom_lines_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_bom_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BomLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BomLines::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(BomLines::OrderId).uuid().not_null())
                        .col(ColumnDef::new(BomLines::PartId).uuid().not_null())
                        .col(
                            ColumnDef::new(BomLines::QuantityRequired)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BomLines::QuantityConsumed)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(BomLines::IsConsumed)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(BomLines::SourceLocationId).uuid().null())
                        .col(ColumnDef::new(BomLines::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(BomLines::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-bom-lines-order")
                        .table(BomLines::Table)
                        .col(BomLines::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BomLines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BomLines {
        Table,
        Id,
        OrderId,
        PartId,
        QuantityRequired,
        QuantityConsumed,
        IsConsumed,
        SourceLocationId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_inventory_balances_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_inventory_balances_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryBalances::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryBalances::PartId).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryBalances::LocationId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBalances::QuantityOnHand)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(InventoryBalances::UnitCost).decimal().null())
                        .col(
                            ColumnDef::new(InventoryBalances::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBalances::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One canonical row per (part, location)
            manager
                .create_index(
                    Index::create()
                        .name("idx-inventory-balances-part-location")
                        .table(InventoryBalances::Table)
                        .col(InventoryBalances::PartId)
                        .col(InventoryBalances::LocationId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryBalances::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryBalances {
        Table,
        Id,
        PartId,
        LocationId,
        QuantityOnHand,
        UnitCost,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000006_create_serialized_units_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_serialized_units_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SerializedUnits::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SerializedUnits::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SerializedUnits::PartId).uuid().not_null())
                        .col(
                            ColumnDef::new(SerializedUnits::SerialNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SerializedUnits::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SerializedUnits::CurrentLocationId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(SerializedUnits::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SerializedUnits::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-serialized-units-part-serial")
                        .table(SerializedUnits::Table)
                        .col(SerializedUnits::PartId)
                        .col(SerializedUnits::SerialNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SerializedUnits::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SerializedUnits {
        Table,
        Id,
        PartId,
        SerialNumber,
        Status,
        CurrentLocationId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000007_create_ledger_entries_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_ledger_entries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LedgerEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LedgerEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::OrderId).uuid().not_null())
                        .col(ColumnDef::new(LedgerEntries::PartId).uuid().not_null())
                        .col(ColumnDef::new(LedgerEntries::Qty).decimal().not_null())
                        .col(
                            ColumnDef::new(LedgerEntries::IsReversal)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(LedgerEntries::ReversalOfId).uuid().null())
                        .col(
                            ColumnDef::new(LedgerEntries::IdempotencyKey)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::StepId).uuid().null())
                        .col(ColumnDef::new(LedgerEntries::BomLineId).uuid().null())
                        .col(
                            ColumnDef::new(LedgerEntries::SerializedUnitId)
                                .uuid()
                                .null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::LocationId).uuid().not_null())
                        .col(ColumnDef::new(LedgerEntries::UnitCost).decimal().null())
                        .col(ColumnDef::new(LedgerEntries::Reason).string().null())
                        .col(
                            ColumnDef::new(LedgerEntries::ConsumedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LedgerEntries::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // At-most-once per caller-supplied or derived key. NULLs (reversal
            // entries) are exempt from the uniqueness check on both backends.
            manager
                .create_index(
                    Index::create()
                        .name("idx-ledger-entries-idempotency-key")
                        .table(LedgerEntries::Table)
                        .col(LedgerEntries::IdempotencyKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // At most one reversal per original entry.
            manager
                .create_index(
                    Index::create()
                        .name("idx-ledger-entries-reversal-of")
                        .table(LedgerEntries::Table)
                        .col(LedgerEntries::ReversalOfId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-ledger-entries-order")
                        .table(LedgerEntries::Table)
                        .col(LedgerEntries::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum LedgerEntries {
        Table,
        Id,
        OrderId,
        PartId,
        Qty,
        IsReversal,
        ReversalOfId,
        IdempotencyKey,
        StepId,
        BomLineId,
        SerializedUnitId,
        LocationId,
        UnitCost,
        Reason,
        ConsumedAt,
        CreatedAt,
    }
}

mod m20240101_000008_create_work_center_allocations_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000008_create_work_center_allocations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WorkCenterAllocations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WorkCenterAllocations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenterAllocations::WorkCenterId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenterAllocations::OrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WorkCenterAllocations::StepId).uuid().null())
                        .col(
                            ColumnDef::new(WorkCenterAllocations::ScheduledStart)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenterAllocations::ScheduledEnd)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenterAllocations::SequenceNumber)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenterAllocations::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenterAllocations::StartedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenterAllocations::CompletedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenterAllocations::StatusChangedBy)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenterAllocations::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WorkCenterAllocations::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Sequence numbers are display ordering; deliberately not unique so
            // reorder can renumber freely.
            manager
                .create_index(
                    Index::create()
                        .name("idx-allocations-work-center")
                        .table(WorkCenterAllocations::Table)
                        .col(WorkCenterAllocations::WorkCenterId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WorkCenterAllocations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WorkCenterAllocations {
        Table,
        Id,
        WorkCenterId,
        OrderId,
        StepId,
        ScheduledStart,
        ScheduledEnd,
        SequenceNumber,
        Status,
        StartedAt,
        CompletedAt,
        StatusChangedBy,
        CreatedAt,
        UpdatedAt,
    }
}
