use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::tag::{self, Entity as Tag, Model};
use crate::entity::{user, user_tag};

use super::errors::{RepositoryError, Result};

/// Create a tag. Fails with `Duplicate` if the name is taken.
pub async fn create_tag<C: ConnectionTrait>(db: &C, name: &str) -> Result<Model> {
    let model = tag::ActiveModel {
        tag_id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().fixed_offset()),
    };

    model.insert(db).await.map_err(|e| {
        let err = RepositoryError::from(e);
        if err.is_unique_violation() {
            RepositoryError::Duplicate {
                context: format!("tag={name}"),
            }
        } else {
            err
        }
    })
}

pub async fn find_by_name<C: ConnectionTrait>(db: &C, name: &str) -> Result<Option<Model>> {
    Ok(Tag::find()
        .filter(tag::Column::Name.eq(name))
        .one(db)
        .await?)
}

pub async fn find_by_names<C: ConnectionTrait>(db: &C, names: &[String]) -> Result<Vec<Model>> {
    Ok(Tag::find()
        .filter(tag::Column::Name.is_in(names.iter().cloned()))
        .all(db)
        .await?)
}

/// Delete a tag and its memberships.
///
/// Returns the number of memberships removed alongside the tag.
pub async fn delete_tag<C: ConnectionTrait>(db: &C, name: &str) -> Result<u64> {
    let tag = find_by_name(db, name)
        .await?
        .ok_or_else(|| RepositoryError::tag_not_found(name))?;

    let memberships = user_tag::Entity::delete_many()
        .filter(user_tag::Column::TagId.eq(tag.tag_id))
        .exec(db)
        .await?
        .rows_affected;
    Tag::delete_by_id(tag.tag_id).exec(db).await?;

    Ok(memberships)
}

/// Add `user_ids` to a tag. Existing memberships are left as they are.
///
/// Returns the number of new memberships.
pub async fn apply_tag<C: ConnectionTrait>(db: &C, tag_id: Uuid, user_ids: &[i64]) -> Result<u64> {
    if user_ids.is_empty() {
        return Ok(0);
    }

    let now = Utc::now().fixed_offset();
    let rows = user_ids.iter().map(|&user_id| user_tag::ActiveModel {
        tag_id: Set(tag_id),
        user_id: Set(user_id),
        created_at: Set(now),
    });

    let written = user_tag::Entity::insert_many(rows)
        .on_conflict(
            OnConflict::columns([user_tag::Column::TagId, user_tag::Column::UserId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(written)
}

/// Every user carrying at least one of `tag_ids`.
pub async fn users_with_tags<C: ConnectionTrait>(
    db: &C,
    tag_ids: &[Uuid],
) -> Result<Vec<user::Model>> {
    if tag_ids.is_empty() {
        return Ok(Vec::new());
    }

    Ok(user::Entity::find()
        .inner_join(user_tag::Entity)
        .filter(user_tag::Column::TagId.is_in(tag_ids.iter().copied()))
        .distinct()
        .all(db)
        .await?)
}
