//! Data layer module
//!
//! Handles all persistence:
//! - SQLite connection pool and migrations
//! - One repository per entity family (users, posts, comments, followers)
//! - The feed query

mod comments;
mod database;
mod feed;
mod followers;
pub mod invitations;
mod models;
mod posts;
mod users;

pub use comments::{CommentRepository, CommentStore};
pub use database::Database;
pub use feed::{FeedQuery, FeedRepository, FeedStore, SortDirection};
pub use followers::{FollowerRepository, FollowerStore};
pub use models::*;
pub use posts::{PostRepository, PostStore};
pub use users::{UserRepository, UserStore};
