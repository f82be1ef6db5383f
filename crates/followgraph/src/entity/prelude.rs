//! Common re-exports for convenient entity usage.

pub use super::follow::{
    ActiveModel as FollowActiveModel, Column as FollowColumn, Entity as Follow,
    Model as FollowModel,
};
pub use super::stg_follow::{
    ActiveModel as StgFollowActiveModel, Column as StgFollowColumn, Entity as StgFollow,
    Model as StgFollowModel,
};
pub use super::tag::{
    ActiveModel as TagActiveModel, Column as TagColumn, Entity as Tag, Model as TagModel,
};
pub use super::user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as User, Model as UserModel,
};
pub use super::user_tag::{
    ActiveModel as UserTagActiveModel, Column as UserTagColumn, Entity as UserTag,
    Model as UserTagModel,
};
pub use super::direction::Direction;
