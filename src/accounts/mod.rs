pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{
    AccountError, AccountStatusUpdate, Badge, Collection, FollowEdge, NewAccount, NewCollection,
    ProfileUpdate, PublicUser, Role, SavedKind, SavedStyle, User,
};
pub use repository::{AccountRepository, ActivityCounts, SqliteAccountRepository};
pub use service::{AccountManager, AccountSettings};
