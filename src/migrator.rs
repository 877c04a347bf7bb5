use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_directory_tables::Migration),
            Box::new(m20240101_000002_create_expense_tables::Migration),
            Box::new(m20240101_000003_create_approval_tables::Migration),
            Box::new(m20240101_000004_create_finance_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_directory_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_directory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Employees::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Employees::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Employees::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Employees::EmployeeId).string().null())
                        .col(ColumnDef::new(Employees::Name).string().not_null())
                        .col(ColumnDef::new(Employees::ManagerEmail).string().null())
                        .col(
                            ColumnDef::new(Employees::Role)
                                .string_len(32)
                                .not_null()
                                .default("Employee"),
                        )
                        .col(
                            ColumnDef::new(Employees::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Employees::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CostCenters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CostCenters::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CostCenters::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(CostCenters::ApproverEmail).string().null())
                        .col(ColumnDef::new(CostCenters::City).string().null())
                        .col(ColumnDef::new(CostCenters::DriveFolderId).string().null())
                        .col(
                            ColumnDef::new(CostCenters::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CityAssignments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CityAssignments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CityAssignments::EmployeeId).uuid().not_null())
                        .col(ColumnDef::new(CityAssignments::City).string().not_null())
                        .col(ColumnDef::new(CityAssignments::AssignedBy).string().not_null())
                        .col(
                            ColumnDef::new(CityAssignments::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(CityAssignments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_city_assignments_employee_id")
                                .from(CityAssignments::Table, CityAssignments::EmployeeId)
                                .to(Employees::Table, Employees::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_city_assignments_employee_city")
                        .table(CityAssignments::Table)
                        .col(CityAssignments::EmployeeId)
                        .col(CityAssignments::City)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(FinanceSettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FinanceSettings::SettingName)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FinanceSettings::SettingValue)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(FinanceSettings::Description).string().null())
                        .col(ColumnDef::new(FinanceSettings::PreviousValue).string().null())
                        .col(ColumnDef::new(FinanceSettings::UpdatedBy).string().null())
                        .col(
                            ColumnDef::new(FinanceSettings::UpdatedOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ExpenseHeads::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ExpenseHeads::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ExpenseHeads::HeadName)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ExpenseHeads::HeadCode).string().null())
                        .col(ColumnDef::new(ExpenseHeads::Description).string().null())
                        .col(
                            ColumnDef::new(ExpenseHeads::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ExpenseHeads::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(FinanceSettings::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CityAssignments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CostCenters::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Employees::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Employees {
        Table,
        Id,
        Email,
        EmployeeId,
        Name,
        ManagerEmail,
        Role,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum CostCenters {
        Table,
        Id,
        Name,
        ApproverEmail,
        City,
        DriveFolderId,
        IsActive,
    }

    #[derive(DeriveIden)]
    enum CityAssignments {
        Table,
        Id,
        EmployeeId,
        City,
        AssignedBy,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum FinanceSettings {
        Table,
        SettingName,
        SettingValue,
        Description,
        PreviousValue,
        UpdatedBy,
        UpdatedOn,
    }

    #[derive(DeriveIden)]
    enum ExpenseHeads {
        Table,
        Id,
        HeadName,
        HeadCode,
        Description,
        IsActive,
    }
}

mod m20240101_000002_create_expense_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_expense_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ExpenseRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ExpenseRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ExpenseRecords::EpvId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(ExpenseRecords::EmailId).string().not_null())
                        .col(ColumnDef::new(ExpenseRecords::EmployeeName).string().not_null())
                        .col(ColumnDef::new(ExpenseRecords::EmployeeId).string().null())
                        .col(ColumnDef::new(ExpenseRecords::FromDate).date().not_null())
                        .col(ColumnDef::new(ExpenseRecords::ToDate).date().not_null())
                        .col(ColumnDef::new(ExpenseRecords::PaymentTo).string().null())
                        .col(
                            ColumnDef::new(ExpenseRecords::SubmissionDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ExpenseRecords::AcademicYear).string().not_null())
                        .col(ColumnDef::new(ExpenseRecords::CostCenterId).uuid().null())
                        .col(ColumnDef::new(ExpenseRecords::CostCenterName).string().null())
                        .col(ColumnDef::new(ExpenseRecords::City).string().null())
                        .col(ColumnDef::new(ExpenseRecords::FileUrl).string().null())
                        .col(ColumnDef::new(ExpenseRecords::DriveFileId).string().null())
                        .col(ColumnDef::new(ExpenseRecords::DocumentPath).string().null())
                        .col(
                            ColumnDef::new(ExpenseRecords::TotalAmount)
                                .decimal_len(14, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ExpenseRecords::AmountInWords).text().not_null())
                        .col(
                            ColumnDef::new(ExpenseRecords::InvoiceType)
                                .string_len(16)
                                .not_null()
                                .default("standard"),
                        )
                        .col(ColumnDef::new(ExpenseRecords::MasterInvoiceId).uuid().null())
                        .col(ColumnDef::new(ExpenseRecords::SplitStatus).string_len(32).null())
                        .col(
                            ColumnDef::new(ExpenseRecords::ApprovedAmount)
                                .decimal_len(14, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ExpenseRecords::RejectedAmount)
                                .decimal_len(14, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ExpenseRecords::PendingAmount)
                                .decimal_len(14, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ExpenseRecords::Status).string_len(32).not_null())
                        .col(ColumnDef::new(ExpenseRecords::FinanceStatus).string_len(32).null())
                        .col(
                            ColumnDef::new(ExpenseRecords::DocumentStatus)
                                .string_len(40)
                                .not_null()
                                .default("complete"),
                        )
                        .col(ColumnDef::new(ExpenseRecords::RequestedDocuments).text().null())
                        .col(ColumnDef::new(ExpenseRecords::RejectionReason).text().null())
                        .col(ColumnDef::new(ExpenseRecords::BeingProcessedBy).string().null())
                        .col(
                            ColumnDef::new(ExpenseRecords::ProcessingStartedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ExpenseRecords::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ExpenseRecords::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_expense_records_cost_center_id")
                                .from(ExpenseRecords::Table, ExpenseRecords::CostCenterId)
                                .to(CostCenters::Table, CostCenters::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_expense_records_email_id", ExpenseRecords::EmailId),
                ("idx_expense_records_status", ExpenseRecords::Status),
                ("idx_expense_records_finance_status", ExpenseRecords::FinanceStatus),
                ("idx_expense_records_master_invoice_id", ExpenseRecords::MasterInvoiceId),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(ExpenseRecords::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(ExpenseItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ExpenseItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ExpenseItems::ExpenseRecordId).uuid().not_null())
                        .col(ColumnDef::new(ExpenseItems::InvoiceDate).date().not_null())
                        .col(ColumnDef::new(ExpenseItems::ExpenseHead).string().not_null())
                        .col(ColumnDef::new(ExpenseItems::Description).text().null())
                        .col(
                            ColumnDef::new(ExpenseItems::Gst)
                                .decimal_len(14, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ExpenseItems::Amount)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ExpenseItems::ReceiptFilename).string().null())
                        .col(ColumnDef::new(ExpenseItems::ReceiptPath).string().null())
                        .col(
                            ColumnDef::new(ExpenseItems::SplitInvoice)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_expense_items_expense_record_id")
                                .from(ExpenseItems::Table, ExpenseItems::ExpenseRecordId)
                                .to(ExpenseRecords::Table, ExpenseRecords::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_expense_items_expense_record_id")
                        .table(ExpenseItems::Table)
                        .col(ExpenseItems::ExpenseRecordId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ExpenseItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ExpenseRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum CostCenters {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum ExpenseRecords {
        Table,
        Id,
        EpvId,
        EmailId,
        EmployeeName,
        EmployeeId,
        FromDate,
        ToDate,
        PaymentTo,
        SubmissionDate,
        AcademicYear,
        CostCenterId,
        CostCenterName,
        City,
        FileUrl,
        DriveFileId,
        DocumentPath,
        TotalAmount,
        AmountInWords,
        InvoiceType,
        MasterInvoiceId,
        SplitStatus,
        ApprovedAmount,
        RejectedAmount,
        PendingAmount,
        Status,
        FinanceStatus,
        DocumentStatus,
        RequestedDocuments,
        RejectionReason,
        BeingProcessedBy,
        ProcessingStartedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ExpenseItems {
        Table,
        Id,
        ExpenseRecordId,
        InvoiceDate,
        ExpenseHead,
        Description,
        Gst,
        Amount,
        ReceiptFilename,
        ReceiptPath,
        SplitInvoice,
    }
}

mod m20240101_000003_create_approval_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_approval_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Allocations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Allocations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Allocations::ExpenseRecordId).uuid().not_null())
                        .col(ColumnDef::new(Allocations::SubInvoiceId).uuid().null())
                        .col(ColumnDef::new(Allocations::CostCenterId).uuid().not_null())
                        .col(ColumnDef::new(Allocations::CostCenterName).string().not_null())
                        .col(
                            ColumnDef::new(Allocations::AllocatedAmount)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Allocations::Description).text().null())
                        .col(ColumnDef::new(Allocations::ExpenseHead).string().null())
                        .col(ColumnDef::new(Allocations::ApproverEmail).string().not_null())
                        .col(ColumnDef::new(Allocations::ApproverName).string().null())
                        .col(
                            ColumnDef::new(Allocations::Status)
                                .string_len(16)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(Allocations::ActionDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Allocations::RejectionReason).text().null())
                        .col(
                            ColumnDef::new(Allocations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Allocations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_allocations_expense_record_id")
                                .from(Allocations::Table, Allocations::ExpenseRecordId)
                                .to(ExpenseRecords::Table, ExpenseRecords::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_allocations_expense_record_id")
                        .table(Allocations::Table)
                        .col(Allocations::ExpenseRecordId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Approvals::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Approvals::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Approvals::ExpenseRecordId).uuid().not_null())
                        .col(ColumnDef::new(Approvals::AllocationId).uuid().null())
                        .col(ColumnDef::new(Approvals::ApproverEmail).string().not_null())
                        .col(ColumnDef::new(Approvals::ApproverName).string().null())
                        .col(ColumnDef::new(Approvals::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Approvals::ActionDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Approvals::Comments).text().null())
                        .col(ColumnDef::new(Approvals::Token).string().null().unique_key())
                        .col(
                            ColumnDef::new(Approvals::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_approvals_expense_record_id")
                                .from(Approvals::Table, Approvals::ExpenseRecordId)
                                .to(ExpenseRecords::Table, ExpenseRecords::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_approvals_allocation_id")
                                .from(Approvals::Table, Approvals::AllocationId)
                                .to(Allocations::Table, Allocations::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_approvals_expense_record_id")
                        .table(Approvals::Table)
                        .col(Approvals::ExpenseRecordId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Approvals::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Allocations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ExpenseRecords {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Allocations {
        Table,
        Id,
        ExpenseRecordId,
        SubInvoiceId,
        CostCenterId,
        CostCenterName,
        AllocatedAmount,
        Description,
        ExpenseHead,
        ApproverEmail,
        ApproverName,
        Status,
        ActionDate,
        RejectionReason,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Approvals {
        Table,
        Id,
        ExpenseRecordId,
        AllocationId,
        ApproverEmail,
        ApproverName,
        Status,
        ActionDate,
        Comments,
        Token,
        CreatedAt,
    }
}

mod m20240101_000004_create_finance_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_finance_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let mut finance_entries = Table::create();
            finance_entries
                .table(FinanceEntries::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(FinanceEntries::Id)
                        .uuid()
                        .primary_key()
                        .not_null(),
                )
                .col(ColumnDef::new(FinanceEntries::ExpenseRecordId).uuid().not_null())
                .col(ColumnDef::new(FinanceEntries::FinanceUserEmail).string().not_null())
                .col(
                    ColumnDef::new(FinanceEntries::EntryDate)
                        .timestamp_with_time_zone()
                        .not_null(),
                )
                .col(ColumnDef::new(FinanceEntries::VendorName).string().not_null())
                .col(ColumnDef::new(FinanceEntries::JournalEntry).string().null())
                .col(ColumnDef::new(FinanceEntries::PaymentVoucher).string().null())
                .col(
                    ColumnDef::new(FinanceEntries::Amount)
                        .decimal_len(14, 2)
                        .not_null(),
                )
                .col(ColumnDef::new(FinanceEntries::Reason).text().null())
                .col(ColumnDef::new(FinanceEntries::FcraStatus).string_len(16).not_null())
                .col(ColumnDef::new(FinanceEntries::Comments).text().null())
                .col(
                    ColumnDef::new(FinanceEntries::IsPartialPayment)
                        .boolean()
                        .not_null()
                        .default(false),
                );

            // Two optional partial-payment slots.
            for (amount, journal, voucher, fcra, txn, date) in [
                (
                    FinanceEntries::Amount1,
                    FinanceEntries::JournalEntry1,
                    FinanceEntries::PaymentVoucher1,
                    FinanceEntries::FcraStatus1,
                    FinanceEntries::TransactionId1,
                    FinanceEntries::PaymentDate1,
                ),
                (
                    FinanceEntries::Amount2,
                    FinanceEntries::JournalEntry2,
                    FinanceEntries::PaymentVoucher2,
                    FinanceEntries::FcraStatus2,
                    FinanceEntries::TransactionId2,
                    FinanceEntries::PaymentDate2,
                ),
            ] {
                finance_entries
                    .col(ColumnDef::new(amount).decimal_len(14, 2).null())
                    .col(ColumnDef::new(journal).string().null())
                    .col(ColumnDef::new(voucher).string().null())
                    .col(ColumnDef::new(fcra).string_len(16).null())
                    .col(ColumnDef::new(txn).string().null())
                    .col(ColumnDef::new(date).date().null());
            }

            finance_entries
                .col(ColumnDef::new(FinanceEntries::TransactionId).string().null())
                .col(ColumnDef::new(FinanceEntries::PaymentDate).date().null())
                .col(
                    ColumnDef::new(FinanceEntries::Status)
                        .string_len(16)
                        .not_null()
                        .default("pending"),
                )
                .col(ColumnDef::new(FinanceEntries::ApproverEmail).string().null())
                .col(
                    ColumnDef::new(FinanceEntries::ApprovedOn)
                        .timestamp_with_time_zone()
                        .null(),
                )
                .col(ColumnDef::new(FinanceEntries::RejectionReason).text().null())
                .col(
                    ColumnDef::new(FinanceEntries::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null(),
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_finance_entries_expense_record_id")
                        .from(FinanceEntries::Table, FinanceEntries::ExpenseRecordId)
                        .to(ExpenseRecords::Table, ExpenseRecords::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                );

            manager.create_table(finance_entries.to_owned()).await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_finance_entries_expense_record_id")
                        .table(FinanceEntries::Table)
                        .col(FinanceEntries::ExpenseRecordId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SupplementaryDocuments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplementaryDocuments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplementaryDocuments::ExpenseRecordId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplementaryDocuments::Filename).string().not_null())
                        .col(ColumnDef::new(SupplementaryDocuments::FilePath).string().not_null())
                        .col(ColumnDef::new(SupplementaryDocuments::DriveFileId).string().null())
                        .col(
                            ColumnDef::new(SupplementaryDocuments::UploadedBy)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplementaryDocuments::UploadedOn)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplementaryDocuments::Description).text().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_supplementary_documents_expense_record_id")
                                .from(
                                    SupplementaryDocuments::Table,
                                    SupplementaryDocuments::ExpenseRecordId,
                                )
                                .to(ExpenseRecords::Table, ExpenseRecords::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SupplementaryDocuments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(FinanceEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ExpenseRecords {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum FinanceEntries {
        Table,
        Id,
        ExpenseRecordId,
        FinanceUserEmail,
        EntryDate,
        VendorName,
        JournalEntry,
        PaymentVoucher,
        Amount,
        Reason,
        FcraStatus,
        Comments,
        IsPartialPayment,
        #[sea_orm(iden = "amount_1")]
        Amount1,
        #[sea_orm(iden = "journal_entry_1")]
        JournalEntry1,
        #[sea_orm(iden = "payment_voucher_1")]
        PaymentVoucher1,
        #[sea_orm(iden = "fcra_status_1")]
        FcraStatus1,
        #[sea_orm(iden = "transaction_id_1")]
        TransactionId1,
        #[sea_orm(iden = "payment_date_1")]
        PaymentDate1,
        #[sea_orm(iden = "amount_2")]
        Amount2,
        #[sea_orm(iden = "journal_entry_2")]
        JournalEntry2,
        #[sea_orm(iden = "payment_voucher_2")]
        PaymentVoucher2,
        #[sea_orm(iden = "fcra_status_2")]
        FcraStatus2,
        #[sea_orm(iden = "transaction_id_2")]
        TransactionId2,
        #[sea_orm(iden = "payment_date_2")]
        PaymentDate2,
        TransactionId,
        PaymentDate,
        Status,
        ApproverEmail,
        ApprovedOn,
        RejectionReason,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum SupplementaryDocuments {
        Table,
        Id,
        ExpenseRecordId,
        Filename,
        FilePath,
        DriveFileId,
        UploadedBy,
        UploadedOn,
        Description,
    }
}

/// Connects to `db_url` and applies every pending migration.
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(4)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
