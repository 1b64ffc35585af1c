//! Host-forum data model for the Waymark platform.
//!
//! Implements groups (with their tracking attributes), users, topics and
//! posts, plus the mutations the HTTP surface exposes: post creation with
//! monotonic numbering, ownership changes, moves between topics, and soft
//! deletion. Tracked-post annotations themselves live in `waymark-tracker`;
//! this crate only maintains the state those annotations are derived from.

pub mod error;
pub mod group;
pub mod post;
pub mod topic;
pub mod user;

pub use error::ForumError;
pub use group::{
    create_group, delete_group, get_group, list_tracked_groups, set_group_attribute, Group,
    TrackedGroup,
};
pub use post::{
    create_post, get_post, move_post, set_post_owner, soft_delete_post, CreatePostParams,
    OwnerChange, Post, PostMove,
};
pub use topic::{create_topic, get_topic, soft_delete_topic, Topic};
pub use user::{create_user, delete_user, get_user, set_primary_group, PrimaryGroupChange, User};
