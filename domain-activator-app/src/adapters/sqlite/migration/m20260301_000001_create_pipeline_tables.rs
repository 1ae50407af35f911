use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // domains
        manager
            .create_table(
                Table::create()
                    .table(Domains::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Domains::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Domains::TenantId).string().not_null())
                    .col(ColumnDef::new(Domains::Name).string().not_null())
                    .col(ColumnDef::new(Domains::Status).string().not_null())
                    .col(ColumnDef::new(Domains::ZoneId).string().null())
                    .col(
                        ColumnDef::new(Domains::NameServers)
                            .string()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Domains::DnsRecords)
                            .string()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Domains::DmarcPolicy)
                            .string()
                            .not_null()
                            .default("none"),
                    )
                    .col(ColumnDef::new(Domains::DkimSelector).string().not_null())
                    .col(ColumnDef::new(Domains::DkimKeyId).string().null())
                    .col(ColumnDef::new(Domains::DnsVerifiedAt).string().null())
                    .col(
                        ColumnDef::new(Domains::RelayAuthorized)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Domains::RelayAuthorizedAt).string().null())
                    .col(ColumnDef::new(Domains::Registrar).string().null())
                    .col(ColumnDef::new(Domains::RegistrationId).string().null())
                    .col(ColumnDef::new(Domains::PurchasePriceCents).big_integer().null())
                    .col(ColumnDef::new(Domains::PurchasedAt).string().null())
                    .col(ColumnDef::new(Domains::RenewedAt).string().null())
                    .col(ColumnDef::new(Domains::ExpiresAt).string().null())
                    .col(
                        ColumnDef::new(Domains::AutoRenew)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Domains::FailureReason).string().null())
                    .col(ColumnDef::new(Domains::SuspensionReason).string().null())
                    .col(ColumnDef::new(Domains::SuspendedAt).string().null())
                    .col(
                        ColumnDef::new(Domains::PublishAttempts)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Domains::CreatedAt).string().not_null())
                    .col(ColumnDef::new(Domains::UpdatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_domains_tenant_name")
                    .table(Domains::Table)
                    .col(Domains::TenantId)
                    .col(Domains::Name)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // dkim_keys
        manager
            .create_table(
                Table::create()
                    .table(DkimKeys::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DkimKeys::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(DkimKeys::DomainId).string().not_null())
                    .col(ColumnDef::new(DkimKeys::Selector).string().not_null())
                    .col(ColumnDef::new(DkimKeys::Algorithm).string().not_null())
                    .col(ColumnDef::new(DkimKeys::KeySize).big_integer().not_null())
                    .col(ColumnDef::new(DkimKeys::PublicRecordValue).string().not_null())
                    .col(ColumnDef::new(DkimKeys::Fingerprint).string().not_null())
                    .col(ColumnDef::new(DkimKeys::KdfIterations).big_integer().not_null())
                    .col(ColumnDef::new(DkimKeys::Salt).string().not_null())
                    .col(ColumnDef::new(DkimKeys::Nonce).string().not_null())
                    .col(ColumnDef::new(DkimKeys::Ciphertext).string().not_null())
                    .col(
                        ColumnDef::new(DkimKeys::Active)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(DkimKeys::CreatedAt).string().not_null())
                    .col(ColumnDef::new(DkimKeys::RotatedAt).string().null())
                    .col(ColumnDef::new(DkimKeys::ExpiresAt).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dkim_keys_domain_selector")
                    .table(DkimKeys::Table)
                    .col(DkimKeys::DomainId)
                    .col(DkimKeys::Selector)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // inbox_credentials
        manager
            .create_table(
                Table::create()
                    .table(InboxCredentials::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(InboxCredentials::DomainId).string().not_null())
                    .col(ColumnDef::new(InboxCredentials::Username).string().not_null())
                    .col(
                        ColumnDef::new(InboxCredentials::CredentialHash)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InboxCredentials::Authorized)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(InboxCredentials::CreatedAt).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(InboxCredentials::DomainId)
                            .col(InboxCredentials::Username),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InboxCredentials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DkimKeys::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Domains::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Domains {
    Table,
    Id,
    TenantId,
    Name,
    Status,
    ZoneId,
    NameServers,
    DnsRecords,
    DmarcPolicy,
    DkimSelector,
    DkimKeyId,
    DnsVerifiedAt,
    RelayAuthorized,
    RelayAuthorizedAt,
    Registrar,
    RegistrationId,
    PurchasePriceCents,
    PurchasedAt,
    RenewedAt,
    ExpiresAt,
    AutoRenew,
    FailureReason,
    SuspensionReason,
    SuspendedAt,
    PublishAttempts,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DkimKeys {
    Table,
    Id,
    DomainId,
    Selector,
    Algorithm,
    KeySize,
    PublicRecordValue,
    Fingerprint,
    KdfIterations,
    Salt,
    Nonce,
    Ciphertext,
    Active,
    CreatedAt,
    RotatedAt,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum InboxCredentials {
    Table,
    DomainId,
    Username,
    CredentialHash,
    Authorized,
    CreatedAt,
}
