//! Initial migration to create the followgraph database schema.

use sea_orm_migration::prelude::*;

/// Partial unique index backing the "at most one open edge per pair" rule.
///
/// Neither sea-query's index builder nor every backend's `ALTER TABLE` can
/// express a `WHERE` predicate on an index, so it is issued as raw SQL. The
/// statement is valid for both SQLite and PostgreSQL.
const CREATE_OPEN_EDGE_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_follow_open_edge \
     ON follow (source_user_id, target_user_id) WHERE valid_end IS NULL";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_user(manager).await?;
        self.create_follow(manager).await?;
        self.create_stg_follow(manager).await?;
        self.create_tags(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserTag::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tag::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StgFollow::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Follow::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(User::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_user(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(User::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(User::ScreenName).string().null())
                    .col(ColumnDef::new(User::DisplayName).string().null())
                    .col(ColumnDef::new(User::Protected).boolean().null())
                    .col(ColumnDef::new(User::FollowersCount).big_integer().null())
                    .col(ColumnDef::new(User::FriendsCount).big_integer().null())
                    .col(ColumnDef::new(User::ApiResponse).json().null())
                    .col(
                        ColumnDef::new(User::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(User::ModifiedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_screen_name")
                    .table(User::Table)
                    .col(User::ScreenName)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn create_follow(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Follow::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Follow::FollowId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Follow::SourceUserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Follow::TargetUserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Follow::ValidStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Follow::ValidEnd)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_source_user")
                            .from(Follow::Table, Follow::SourceUserId)
                            .to(User::Table, User::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_follow_target_user")
                            .from(Follow::Table, Follow::TargetUserId)
                            .to(User::Table, User::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        // Followers-direction lookups filter on the target side.
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_target_source")
                    .table(Follow::Table)
                    .col(Follow::TargetUserId)
                    .col(Follow::SourceUserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_follow_source_target")
                    .table(Follow::Table)
                    .col(Follow::SourceUserId)
                    .col(Follow::TargetUserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(CREATE_OPEN_EDGE_INDEX)
            .await?;

        Ok(())
    }

    async fn create_stg_follow(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StgFollow::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StgFollow::SourceUserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StgFollow::TargetUserId)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(StgFollow::SourceUserId)
                            .col(StgFollow::TargetUserId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_tags(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tag::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tag::TagId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tag::Name).string().not_null().unique_key())
                    .col(
                        ColumnDef::new(Tag::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserTag::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserTag::TagId).uuid().not_null())
                    .col(ColumnDef::new(UserTag::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(UserTag::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(Index::create().col(UserTag::TagId).col(UserTag::UserId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_tag_tag")
                            .from(UserTag::Table, UserTag::TagId)
                            .to(Tag::Table, Tag::TagId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_tag_user")
                            .from(UserTag::Table, UserTag::UserId)
                            .to(User::Table, User::UserId),
                    )
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum User {
    Table,
    UserId,
    ScreenName,
    DisplayName,
    Protected,
    FollowersCount,
    FriendsCount,
    ApiResponse,
    CreatedAt,
    ModifiedAt,
}

#[derive(DeriveIden)]
enum Follow {
    Table,
    FollowId,
    SourceUserId,
    TargetUserId,
    ValidStart,
    ValidEnd,
}

#[derive(DeriveIden)]
enum StgFollow {
    Table,
    SourceUserId,
    TargetUserId,
}

#[derive(DeriveIden)]
enum Tag {
    Table,
    TagId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserTag {
    Table,
    TagId,
    UserId,
    CreatedAt,
}
