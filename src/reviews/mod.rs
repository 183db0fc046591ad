pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{
    FlagReason, ReviewDraft, ReviewEligibility, ReviewError, ReviewPatch, ReviewSearch,
    ReviewSort, ReviewStats, ReviewStatus, ReviewView, Review, VoteKind,
};
pub use repository::{ReviewRepository, SqliteReviewRepository};
pub use service::ReviewAggregator;
