use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

use crate::accounts::{AccountManager, Badge, User};
use crate::catalog::repository::DynStyleRepository;
use crate::catalog::Style;
use crate::config::ReviewConfig;
use crate::db::RepositoryError;
use crate::pagination::{Page, PageRequest};
use crate::reviews::domain::*;
use crate::reviews::repository::DynReviewRepository;
use crate::taxonomy::StyleStatus;

/// Review lifecycle, voting, moderation and per-style aggregates.
#[derive(Clone)]
pub struct ReviewAggregator {
    repo: DynReviewRepository,
    styles: DynStyleRepository,
    accounts: AccountManager,
    config: ReviewConfig,
}

impl ReviewAggregator {
    pub fn new(
        repo: DynReviewRepository,
        styles: DynStyleRepository,
        accounts: AccountManager,
        config: ReviewConfig,
    ) -> Self {
        Self {
            repo,
            styles,
            accounts,
            config,
        }
    }

    async fn reviewable_style(&self, style_id: &str) -> Result<Style, ReviewError> {
        self.styles
            .find_by_id(style_id)
            .await?
            .filter(|s| s.status != StyleStatus::Archived)
            .ok_or_else(|| ReviewError::NotFound("Hijab style".to_string()))
    }

    async fn live(&self, id: &str) -> Result<Review, ReviewError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ReviewError::NotFound("Review".to_string()))?
            .live()
    }

    /// Only the author and moderators see a review outside Published.
    pub async fn get(&self, id: &str, viewer: Option<&User>) -> Result<Review, ReviewError> {
        let review = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ReviewError::NotFound("Review".to_string()))?;
        review.visible_to(
            viewer.map(|u| u.id.as_str()),
            viewer.is_some_and(|u| u.role.can_moderate()),
        )
    }

    pub async fn submit(
        &self,
        style_id: &str,
        author: &User,
        draft: ReviewDraft,
    ) -> Result<Review, ReviewError> {
        draft.clone().normalized().validate()?;
        self.reviewable_style(style_id).await?;

        let now = Utc::now();
        match self.repo.find_for_pair(style_id, &author.id).await? {
            Some(existing) if !existing.is_deleted() => Err(ReviewError::Conflict(
                "You have already reviewed this style".to_string(),
            )),
            Some(deleted) => {
                let limit = self.config.edit_history_limit;
                let review = self
                    .repo
                    .modify(
                        &deleted.id,
                        Box::new(move |r| r.revive(draft, limit, now)),
                    )
                    .await?;
                tracing::info!(review_id = %review.id, style_id, "Review resubmitted");
                Ok(review)
            }
            None => {
                let review = Review::new(
                    uuid::Uuid::now_v7().to_string(),
                    style_id,
                    &author.id,
                    draft,
                    now,
                )?;
                self.repo.insert(&review).await.map_err(|e| match e {
                    RepositoryError::Conflict(msg) => ReviewError::Conflict(msg),
                    RepositoryError::NotFound(what) => ReviewError::NotFound(what),
                    other => other.into(),
                })?;
                tracing::info!(review_id = %review.id, style_id, "Review submitted");

                self.reward(&author.id).await;
                Ok(review)
            }
        }
    }

    /// Points for every new review, plus a badge for the first one.
    /// The review stands even if this fails.
    async fn reward(&self, user_id: &str) {
        if let Err(e) = self
            .accounts
            .award_points(user_id, self.config.review_points)
            .await
        {
            tracing::warn!(user_id, error = %e, "Failed to award review points");
        }

        match self.repo.count_for_user(user_id).await {
            Ok(1) => {
                let badge = Badge {
                    name: FIRST_REVIEW_BADGE.to_string(),
                    icon: None,
                    description: Some("Wrote a first review".to_string()),
                    earned_at: Utc::now(),
                };
                if let Err(e) = self.accounts.add_badge(user_id, badge).await {
                    tracing::warn!(user_id, error = %e, "Failed to award badge");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(user_id, error = %e, "Failed to count reviews"),
        }
    }

    pub async fn update(
        &self,
        id: &str,
        actor: &User,
        patch: ReviewPatch,
    ) -> Result<Review, ReviewError> {
        let actor_id = actor.id.clone();
        let limit = self.config.edit_history_limit;
        let now = Utc::now();
        self.repo
            .modify(
                id,
                Box::new(move |r| {
                    let r = r.live()?;
                    if !r.is_author(&actor_id) {
                        return Err(ReviewError::Forbidden(
                            "Only the author can edit this review".to_string(),
                        ));
                    }
                    r.apply_edit(patch, limit, now)
                }),
            )
            .await
    }

    pub async fn delete(&self, id: &str, actor: &User) -> Result<(), ReviewError> {
        let actor_id = actor.id.clone();
        let moderator = actor.role.can_moderate();
        let now = Utc::now();
        let review = self
            .repo
            .modify(
                id,
                Box::new(move |r| {
                    let r = r.live()?;
                    if !r.is_author(&actor_id) && !moderator {
                        return Err(ReviewError::Forbidden(
                            "Only the author or a moderator can delete this review".to_string(),
                        ));
                    }
                    Ok(r.soft_delete(now))
                }),
            )
            .await?;

        tracing::info!(review_id = %review.id, by = %actor.id, "Review deleted");
        Ok(())
    }

    /// An unrecognised vote type leaves the review untouched.
    pub async fn vote(&self, id: &str, voter: &User, vote: &str) -> Result<Review, ReviewError> {
        let Some(kind) = VoteKind::parse(vote) else {
            return self.get(id, Some(voter)).await;
        };
        let voter_id = voter.id.clone();
        let moderator = voter.role.can_moderate();
        let now = Utc::now();
        self.repo
            .modify(
                id,
                Box::new(move |r| {
                    Ok(r.visible_to(Some(voter_id.as_str()), moderator)?
                        .vote(&voter_id, kind, now))
                }),
            )
            .await
    }

    pub async fn remove_vote(&self, id: &str, voter: &User) -> Result<Review, ReviewError> {
        let voter_id = voter.id.clone();
        let moderator = voter.role.can_moderate();
        let now = Utc::now();
        self.repo
            .modify(
                id,
                Box::new(move |r| {
                    Ok(r.visible_to(Some(voter_id.as_str()), moderator)?
                        .remove_vote(&voter_id, now))
                }),
            )
            .await
    }

    pub async fn flag(
        &self,
        id: &str,
        reporter: &User,
        reason: FlagReason,
        description: Option<String>,
    ) -> Result<Review, ReviewError> {
        let reporter_id = reporter.id.clone();
        let moderator = reporter.role.can_moderate();
        let threshold = self.config.flag_threshold;
        let now = Utc::now();

        let review = self
            .repo
            .modify(
                id,
                Box::new(move |r| {
                    r.visible_to(Some(reporter_id.as_str()), moderator)?
                        .flag(&reporter_id, reason, description, threshold, now)
                }),
            )
            .await?;

        if review.status == ReviewStatus::Flagged && review.flag_reports.len() == threshold {
            tracing::warn!(
                review_id = %review.id,
                reports = review.flag_reports.len(),
                "Review flagged for moderation"
            );
        }
        Ok(review)
    }

    pub async fn respond(
        &self,
        id: &str,
        responder: &User,
        text: &str,
    ) -> Result<Review, ReviewError> {
        let review = self.live(id).await?;
        let style = self
            .styles
            .find_by_id(&review.style_id)
            .await?
            .ok_or_else(|| ReviewError::NotFound("Hijab style".to_string()))?;

        let is_creator = style.created_by.as_deref() == Some(responder.id.as_str());
        if !is_creator && !responder.role.can_moderate() {
            return Err(ReviewError::Forbidden(
                "Only the style creator or a moderator can respond".to_string(),
            ));
        }

        let responder_id = responder.id.clone();
        let text = text.to_string();
        let now = Utc::now();
        self.repo
            .modify(
                id,
                Box::new(move |r| r.live()?.respond(&responder_id, &text, now)),
            )
            .await
    }

    pub async fn stats(&self, style_id: &str) -> Result<ReviewStats, ReviewError> {
        let samples = self.repo.rating_samples(style_id).await?;
        Ok(ReviewStats::compute(&samples))
    }

    pub async fn for_style(
        &self,
        style_id: &str,
        sort: ReviewSort,
        status: ReviewStatus,
        page: &PageRequest,
    ) -> Result<Page<Review>, ReviewError> {
        let (reviews, total) = self
            .repo
            .list_for_style(style_id, status, sort, page)
            .await?;
        Ok(Page::new(reviews, page, total))
    }

    pub async fn for_user(
        &self,
        user_id: &str,
        viewer: Option<&User>,
        page: &PageRequest,
    ) -> Result<Page<Review>, ReviewError> {
        let everything = viewer.is_some_and(|u| u.id == user_id || u.role.can_moderate());
        let (reviews, total) = self
            .repo
            .list_for_user(user_id, !everything, page)
            .await?;
        Ok(Page::new(reviews, page, total))
    }

    pub async fn most_helpful(&self, limit: Option<u32>) -> Result<Vec<Review>, ReviewError> {
        let limit = limit.unwrap_or(DEFAULT_HELPFUL_LIMIT).clamp(1, 100);
        Ok(self.repo.most_helpful(limit).await?)
    }

    /// Top reviews shown alongside a style.
    pub async fn highlights(&self, style_id: &str) -> Result<Vec<Review>, ReviewError> {
        let page = PageRequest::new(1, TOP_REVIEWS_ON_STYLE);
        let (reviews, _) = self
            .repo
            .list_for_style(style_id, ReviewStatus::Published, ReviewSort::Helpful, &page)
            .await?;
        Ok(reviews)
    }

    pub async fn search(
        &self,
        criteria: &ReviewSearch,
        page: &PageRequest,
    ) -> Result<Page<Review>, ReviewError> {
        let (reviews, total) = self.repo.search(criteria, page).await?;
        Ok(Page::new(reviews, page, total))
    }

    pub async fn can_review(
        &self,
        style_id: &str,
        user_id: &str,
    ) -> Result<ReviewEligibility, ReviewError> {
        self.reviewable_style(style_id).await?;

        let eligibility = match self.repo.find_for_pair(style_id, user_id).await? {
            Some(existing) if !existing.is_deleted() => ReviewEligibility {
                can_review: false,
                reason: Some("You have already reviewed this style".to_string()),
                existing_review_id: Some(existing.id),
            },
            _ => ReviewEligibility {
                can_review: true,
                reason: None,
                existing_review_id: None,
            },
        };
        Ok(eligibility)
    }

    fn ensure_moderator(actor: &User) -> Result<(), ReviewError> {
        if actor.role.can_moderate() {
            Ok(())
        } else {
            Err(ReviewError::Forbidden(
                "Moderator access required".to_string(),
            ))
        }
    }

    fn dedup(ids: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    /// Returns how many reviews changed; disallowed transitions are skipped.
    pub async fn bulk_update_status(
        &self,
        actor: &User,
        ids: &[String],
        status: ReviewStatus,
    ) -> Result<usize, ReviewError> {
        Self::ensure_moderator(actor)?;
        if ids.is_empty() {
            return Err(ReviewError::Validation(vec![
                "At least one review id is required".to_string(),
            ]));
        }

        let now = Utc::now();
        let changed = self
            .repo
            .modify_many(
                &Self::dedup(ids),
                Arc::new(move |r| {
                    if r.is_deleted() || r.status == status {
                        return None;
                    }
                    r.moderate(status, now)
                }),
            )
            .await?;

        tracing::info!(by = %actor.id, %status, changed, "Bulk review status update");
        Ok(changed)
    }

    pub async fn bulk_delete(&self, actor: &User, ids: &[String]) -> Result<usize, ReviewError> {
        Self::ensure_moderator(actor)?;
        if ids.is_empty() {
            return Err(ReviewError::Validation(vec![
                "At least one review id is required".to_string(),
            ]));
        }

        let now = Utc::now();
        let changed = self
            .repo
            .modify_many(
                &Self::dedup(ids),
                Arc::new(move |r| (!r.is_deleted()).then(|| r.soft_delete(now))),
            )
            .await?;

        tracing::info!(by = %actor.id, changed, "Bulk review delete");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{
        AccountSettings, NewAccount, Role, SqliteAccountRepository,
    };
    use crate::catalog::{SqliteStyleRepository, StyleDraft};
    use crate::db;
    use crate::reviews::repository::SqliteReviewRepository;

    struct Fixture {
        reviews: ReviewAggregator,
        accounts: AccountManager,
        creator: User,
        users: Vec<User>,
        style_id: String,
        _tmp: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let (pool, tmp) = db::test_pool();
        let accounts = AccountManager::new(
            Arc::new(SqliteAccountRepository::new(pool.clone())),
            AccountSettings {
                bcrypt_cost: 4,
                ..AccountSettings::default()
            },
        );

        let mut users = Vec::new();
        for i in 0..5 {
            let user = accounts
                .signup(NewAccount {
                    name: format!("User {i}"),
                    email: format!("user{i}@example.com"),
                    password: "Secret123".into(),
                })
                .await
                .unwrap();
            users.push(user);
        }
        let creator = users.remove(0);

        let styles: DynStyleRepository = Arc::new(SqliteStyleRepository::new(pool.clone()));
        let style = Style::create(
            "style-1".into(),
            StyleDraft {
                name: "Classic Wrap".into(),
                image: "https://cdn.example.com/wrap.jpg".into(),
                ..StyleDraft::default()
            },
            Some(creator.id.clone()),
            Utc::now(),
        )
        .unwrap();
        styles.insert(&style).await.unwrap();

        Fixture {
            reviews: ReviewAggregator::new(
                Arc::new(SqliteReviewRepository::new(pool)),
                styles,
                accounts.clone(),
                ReviewConfig::default(),
            ),
            accounts,
            creator,
            users,
            style_id: style.id,
            _tmp: tmp,
        }
    }

    fn draft(rating: f64) -> ReviewDraft {
        ReviewDraft {
            text: "Easy to follow and looks great".into(),
            rating,
            ..ReviewDraft::default()
        }
    }

    fn moderator(user: &User) -> User {
        User {
            role: Role::Moderator,
            ..user.clone()
        }
    }

    #[tokio::test]
    async fn submit_awards_points_and_rejects_duplicates() {
        let f = fixture().await;
        let author = &f.users[0];

        let review = f.reviews.submit(&f.style_id, author, draft(4.0)).await.unwrap();
        assert_eq!(review.status, ReviewStatus::Published);
        let achievements = f.accounts.get(&author.id).await.unwrap().achievements;
        assert_eq!(achievements.points, ReviewConfig::default().review_points);
        assert_eq!(achievements.badges.len(), 1);
        assert_eq!(achievements.badges[0].name, FIRST_REVIEW_BADGE);

        let again = f.reviews.submit(&f.style_id, author, draft(3.0)).await;
        assert!(matches!(again, Err(ReviewError::Conflict(_))));
    }

    #[tokio::test]
    async fn submit_for_unknown_style_is_not_found() {
        let f = fixture().await;
        let result = f.reviews.submit("ghost", &f.users[0], draft(4.0)).await;
        assert!(matches!(result, Err(ReviewError::NotFound(_))));
    }

    #[tokio::test]
    async fn invalid_review_is_rejected_before_lookup() {
        let f = fixture().await;
        let result = f
            .reviews
            .submit("ghost", &f.users[0], ReviewDraft { rating: 4.2, ..draft(4.0) })
            .await;
        assert!(matches!(result, Err(ReviewError::Validation(_))));
    }

    #[tokio::test]
    async fn only_author_edits_and_history_grows_per_change() {
        let f = fixture().await;
        let author = &f.users[0];
        let review = f.reviews.submit(&f.style_id, author, draft(4.0)).await.unwrap();

        let patch = ReviewPatch {
            rating: Some(5.0),
            ..ReviewPatch::default()
        };
        let stranger = f.reviews.update(&review.id, &f.users[1], patch.clone()).await;
        assert!(matches!(stranger, Err(ReviewError::Forbidden(_))));

        let edited = f.reviews.update(&review.id, author, patch).await.unwrap();
        assert_eq!(edited.edit_history.len(), 1);
        let edited = f
            .reviews
            .update(
                &review.id,
                author,
                ReviewPatch {
                    text: Some("Changed my mind after a week".into()),
                    ..ReviewPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.edit_history.len(), 2);
        assert_eq!(edited.edit_history[1].previous_rating, 5.0);
    }

    #[tokio::test]
    async fn votes_replace_and_invalid_type_is_ignored() {
        let f = fixture().await;
        let review = f.reviews.submit(&f.style_id, &f.users[0], draft(4.0)).await.unwrap();
        let voter = &f.users[1];

        f.reviews.vote(&review.id, voter, "helpful").await.unwrap();
        let r = f.reviews.vote(&review.id, voter, "unhelpful").await.unwrap();
        assert_eq!((r.helpful_votes, r.unhelpful_votes, r.voters.len()), (0, 1, 1));

        let unchanged = f.reviews.vote(&review.id, voter, "meh").await.unwrap();
        assert_eq!(unchanged.voters, r.voters);
        assert_eq!(unchanged.unhelpful_votes, 1);

        let cleared = f.reviews.remove_vote(&review.id, voter).await.unwrap();
        assert_eq!(cleared.unhelpful_votes, 0);
        assert!(cleared.voters.is_empty());
    }

    #[tokio::test]
    async fn three_reports_flag_and_hide_from_listing() {
        let f = fixture().await;
        let review = f.reviews.submit(&f.style_id, &f.users[0], draft(4.0)).await.unwrap();

        for reporter in &f.users[1..3] {
            f.reviews
                .flag(&review.id, reporter, FlagReason::Spam, None)
                .await
                .unwrap();
        }
        let repeat = f
            .reviews
            .flag(&review.id, &f.users[1], FlagReason::Spam, None)
            .await;
        assert!(matches!(repeat, Err(ReviewError::Conflict(_))));
        f.reviews
            .flag(&review.id, &f.users[3], FlagReason::Fake, None)
            .await
            .unwrap();

        let flagged = f
            .reviews
            .get(&review.id, Some(&f.users[0]))
            .await
            .unwrap();
        assert_eq!(flagged.status, ReviewStatus::Flagged);
        assert!(matches!(
            f.reviews.get(&review.id, None).await,
            Err(ReviewError::NotFound(_))
        ));

        let page = f
            .reviews
            .for_style(&f.style_id, ReviewSort::Newest, ReviewStatus::Published, &PageRequest::default())
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn hidden_review_rejects_stranger_feedback() {
        let f = fixture().await;
        let author = &f.users[0];
        let stranger = &f.users[1];
        let review = f.reviews.submit(&f.style_id, author, draft(4.0)).await.unwrap();
        f.reviews.vote(&review.id, stranger, "helpful").await.unwrap();

        let admin = moderator(&f.users[2]);
        f.reviews
            .bulk_update_status(&admin, &[review.id.clone()], ReviewStatus::Hidden)
            .await
            .unwrap();

        for vote in ["meh", "helpful"] {
            assert!(matches!(
                f.reviews.vote(&review.id, stranger, vote).await,
                Err(ReviewError::NotFound(_))
            ));
        }
        assert!(matches!(
            f.reviews.remove_vote(&review.id, stranger).await,
            Err(ReviewError::NotFound(_))
        ));
        assert!(matches!(
            f.reviews.flag(&review.id, stranger, FlagReason::Spam, None).await,
            Err(ReviewError::NotFound(_))
        ));

        let stored = f.reviews.get(&review.id, Some(author)).await.unwrap();
        assert_eq!(stored.helpful_votes, 1);
        assert!(stored.flag_reports.is_empty());

        let seen = f.reviews.vote(&review.id, &admin, "meh").await.unwrap();
        assert_eq!(seen.status, ReviewStatus::Hidden);
    }

    #[tokio::test]
    async fn creator_or_moderator_responds() {
        let f = fixture().await;
        let review = f.reviews.submit(&f.style_id, &f.users[0], draft(4.0)).await.unwrap();

        let denied = f.reviews.respond(&review.id, &f.users[1], "Thanks!").await;
        assert!(matches!(denied, Err(ReviewError::Forbidden(_))));

        let r = f.reviews.respond(&review.id, &f.creator, "Thanks!").await.unwrap();
        assert_eq!(r.creator_response.unwrap().responded_by, f.creator.id);

        let r = f
            .reviews
            .respond(&review.id, &moderator(&f.users[1]), "Noted")
            .await
            .unwrap();
        assert_eq!(r.creator_response.unwrap().text, "Noted");
    }

    #[tokio::test]
    async fn stats_cover_published_reviews() {
        let f = fixture().await;
        for (user, rating) in f.users.iter().zip([5.0, 5.0, 4.0, 3.0]) {
            f.reviews.submit(&f.style_id, user, draft(rating)).await.unwrap();
        }
        let stats = f.reviews.stats(&f.style_id).await.unwrap();
        assert_eq!(stats.average_rating, 4.3);
        assert_eq!(stats.total_reviews, 4);
        assert_eq!(stats.recommendation_rate, 100.0);
        assert_eq!(stats.rating_breakdown[&5], 2);
        assert_eq!(stats.rating_breakdown[&2], 0);
    }

    #[tokio::test]
    async fn delete_then_resubmit_revives() {
        let f = fixture().await;
        let author = &f.users[0];
        let review = f.reviews.submit(&f.style_id, author, draft(4.0)).await.unwrap();

        let denied = f.reviews.delete(&review.id, &f.users[1]).await;
        assert!(matches!(denied, Err(ReviewError::Forbidden(_))));
        f.reviews.delete(&review.id, author).await.unwrap();

        assert!(f.reviews.get(&review.id, Some(author)).await.is_err());
        let eligibility = f.reviews.can_review(&f.style_id, &author.id).await.unwrap();
        assert!(eligibility.can_review);

        let revived = f.reviews.submit(&f.style_id, author, draft(2.0)).await.unwrap();
        assert_eq!(revived.id, review.id);
        assert_eq!(revived.edit_history.len(), 1);
        assert_eq!(revived.rating, 2.0);

        let eligibility = f.reviews.can_review(&f.style_id, &author.id).await.unwrap();
        assert!(!eligibility.can_review);
        assert_eq!(eligibility.existing_review_id, Some(review.id));
    }

    #[tokio::test]
    async fn bulk_moderation_requires_moderator() {
        let f = fixture().await;
        let mut ids = Vec::new();
        for user in &f.users[..2] {
            ids.push(f.reviews.submit(&f.style_id, user, draft(4.0)).await.unwrap().id);
        }

        let denied = f
            .reviews
            .bulk_update_status(&f.users[2], &ids, ReviewStatus::Hidden)
            .await;
        assert!(matches!(denied, Err(ReviewError::Forbidden(_))));

        let admin = moderator(&f.users[2]);
        let hidden = f
            .reviews
            .bulk_update_status(&admin, &ids, ReviewStatus::Hidden)
            .await
            .unwrap();
        assert_eq!(hidden, 2);
        // Hidden -> Flagged is not a moderator move
        let flagged = f
            .reviews
            .bulk_update_status(&admin, &ids, ReviewStatus::Flagged)
            .await
            .unwrap();
        assert_eq!(flagged, 0);

        let mine = f
            .reviews
            .for_user(&f.users[0].id, Some(&f.users[0]), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(mine.items.len(), 1);
        let public = f
            .reviews
            .for_user(&f.users[0].id, None, &PageRequest::default())
            .await
            .unwrap();
        assert!(public.items.is_empty());

        assert_eq!(f.reviews.bulk_delete(&admin, &ids).await.unwrap(), 2);
        assert_eq!(f.reviews.bulk_delete(&admin, &ids).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn helpful_leaderboard_orders_by_votes() {
        let f = fixture().await;
        let first = f.reviews.submit(&f.style_id, &f.users[0], draft(3.0)).await.unwrap();
        let second = f.reviews.submit(&f.style_id, &f.users[1], draft(5.0)).await.unwrap();
        f.reviews.vote(&first.id, &f.users[2], "helpful").await.unwrap();

        let top = f.reviews.most_helpful(None).await.unwrap();
        let ids: Vec<_> = top.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }
}
