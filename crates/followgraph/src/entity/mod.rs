//! SeaORM entity definitions for the followgraph database schema.

pub mod direction;
pub mod follow;
pub mod prelude;
pub mod stg_follow;
pub mod tag;
pub mod user;
pub mod user_tag;

pub use direction::Direction;
