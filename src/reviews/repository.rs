// Repository pattern - review persistence
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, OptionalExtension, Row, TransactionBehavior};
use std::sync::Arc;

use crate::db::{self, RepositoryError};
use crate::pagination::PageRequest;
use crate::reviews::domain::*;
use crate::state::DbPool;

pub type ReviewMutation = Box<dyn FnOnce(Review) -> Result<Review, ReviewError> + Send>;

/// Applied to each review of a bulk operation; `None` skips the record.
pub type BulkMutation = Arc<dyn Fn(Review) -> Option<Review> + Send + Sync>;

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// `Conflict` for a second review of the pair, `NotFound` for an unknown style
    async fn insert(&self, review: &Review) -> Result<(), RepositoryError>;

    /// Includes soft-deleted records
    async fn find_by_id(&self, id: &str) -> Result<Option<Review>, RepositoryError>;

    /// Includes soft-deleted records
    async fn find_for_pair(
        &self,
        style_id: &str,
        user_id: &str,
    ) -> Result<Option<Review>, RepositoryError>;

    async fn modify(&self, id: &str, mutation: ReviewMutation) -> Result<Review, ReviewError>;

    /// Returns how many of `ids` were changed; all or nothing
    async fn modify_many(
        &self,
        ids: &[String],
        mutation: BulkMutation,
    ) -> Result<usize, RepositoryError>;

    async fn list_for_style(
        &self,
        style_id: &str,
        status: ReviewStatus,
        sort: ReviewSort,
        page: &PageRequest,
    ) -> Result<(Vec<Review>, u64), RepositoryError>;

    /// `published_only` hides moderated reviews from other viewers
    async fn list_for_user(
        &self,
        user_id: &str,
        published_only: bool,
        page: &PageRequest,
    ) -> Result<(Vec<Review>, u64), RepositoryError>;

    async fn most_helpful(&self, limit: u32) -> Result<Vec<Review>, RepositoryError>;

    async fn search(
        &self,
        criteria: &ReviewSearch,
        page: &PageRequest,
    ) -> Result<(Vec<Review>, u64), RepositoryError>;

    async fn rating_samples(&self, style_id: &str) -> Result<Vec<RatingSample>, RepositoryError>;

    async fn count_for_user(&self, user_id: &str) -> Result<u64, RepositoryError>;
}

const REVIEW_COLUMNS: &str = "id, style_id, user_id, text, rating, detailed_rating_json, title, \
     user_experience_json, images_json, helpful_votes, unhelpful_votes, voters_json, status, \
     flag_reports_json, creator_response_json, is_verified, edit_history_json, deleted_at, \
     created_at, updated_at";

const LIVE: &str = "deleted_at IS NULL";

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    let status: String = row.get(12)?;
    Ok(Review {
        id: row.get(0)?,
        style_id: row.get(1)?,
        user_id: row.get(2)?,
        text: row.get(3)?,
        rating: row.get(4)?,
        detailed_rating: db::optional_json_column(row.get(5)?)?,
        title: row.get(6)?,
        user_experience: db::optional_json_column(row.get(7)?)?,
        images: db::json_column(&row.get::<_, String>(8)?)?,
        helpful_votes: row.get(9)?,
        unhelpful_votes: row.get(10)?,
        voters: db::json_column(&row.get::<_, String>(11)?)?,
        status: status.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, e.into())
        })?,
        flag_reports: db::json_column(&row.get::<_, String>(13)?)?,
        creator_response: db::optional_json_column(row.get(14)?)?,
        is_verified: row.get(15)?,
        edit_history: db::json_column(&row.get::<_, String>(16)?)?,
        deleted_at: db::parse_optional_timestamp(row.get(17)?)?,
        created_at: db::parse_timestamp(&row.get::<_, String>(18)?)?,
        updated_at: db::parse_timestamp(&row.get::<_, String>(19)?)?,
    })
}

fn optional_json<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>, RepositoryError> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(RepositoryError::from)
}

fn write_review(conn: &rusqlite::Connection, review: &Review) -> Result<(), RepositoryError> {
    conn.execute(
        "UPDATE reviews SET
            text = ?2, rating = ?3, detailed_rating_json = ?4, title = ?5,
            user_experience_json = ?6, images_json = ?7, helpful_votes = ?8,
            unhelpful_votes = ?9, voters_json = ?10, status = ?11, flag_reports_json = ?12,
            creator_response_json = ?13, is_verified = ?14, edit_history_json = ?15,
            deleted_at = ?16, updated_at = ?17
         WHERE id = ?1",
        params![
            review.id,
            review.text,
            review.rating,
            optional_json(&review.detailed_rating)?,
            review.title,
            optional_json(&review.user_experience)?,
            serde_json::to_string(&review.images)?,
            review.helpful_votes,
            review.unhelpful_votes,
            serde_json::to_string(&review.voters)?,
            review.status.as_str(),
            serde_json::to_string(&review.flag_reports)?,
            optional_json(&review.creator_response)?,
            review.is_verified,
            serde_json::to_string(&review.edit_history)?,
            review.deleted_at.map(db::timestamp),
            db::timestamp(review.updated_at),
        ],
    )?;
    Ok(())
}

fn load_review(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<Review>, RepositoryError> {
    let sql = format!("SELECT {} FROM reviews WHERE id = ?1", REVIEW_COLUMNS);
    Ok(conn.query_row(&sql, params![id], review_from_row).optional()?)
}

fn order_clause(sort: ReviewSort) -> &'static str {
    match sort {
        ReviewSort::Newest => "ORDER BY created_at DESC, id DESC",
        ReviewSort::Oldest => "ORDER BY created_at ASC, id ASC",
        ReviewSort::Highest => "ORDER BY rating DESC, created_at DESC",
        ReviewSort::Lowest => "ORDER BY rating ASC, created_at DESC",
        ReviewSort::Helpful => "ORDER BY helpful_votes DESC, created_at DESC",
    }
}

/// Runs a counted, paginated SELECT over `reviews` with the given WHERE clause.
fn paged(
    conn: &rusqlite::Connection,
    clause: &str,
    values: &[rusqlite::types::Value],
    order: &str,
    page: &PageRequest,
) -> Result<(Vec<Review>, u64), RepositoryError> {
    let total: u64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM reviews WHERE {}", clause),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM reviews WHERE {} {} LIMIT {} OFFSET {}",
        REVIEW_COLUMNS,
        clause,
        order,
        page.limit(),
        page.offset()
    );
    let mut stmt = conn.prepare(&sql)?;
    let reviews = stmt
        .query_map(params_from_iter(values.iter()), review_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((reviews, total))
}

/// Case-insensitive over text and title. Matched in Rust because SQLite's
/// `lower()` only folds ASCII.
fn mentions(review: &Review, needle: &str) -> bool {
    review.text.to_lowercase().contains(needle)
        || review
            .title
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains(needle))
}

/// Structured criteria only; the free-text term is applied by [`mentions`].
fn search_clause(criteria: &ReviewSearch) -> (String, Vec<rusqlite::types::Value>) {
    use rusqlite::types::Value;

    let mut clauses = vec![LIVE.to_string(), "status = 'Published'".to_string()];
    let mut values: Vec<Value> = Vec::new();

    if let Some(style_id) = &criteria.style_id {
        values.push(Value::Text(style_id.clone()));
        clauses.push(format!("style_id = ?{}", values.len()));
    }
    if let Some(user_id) = &criteria.user_id {
        values.push(Value::Text(user_id.clone()));
        clauses.push(format!("user_id = ?{}", values.len()));
    }
    if let Some(min) = criteria.min_rating {
        values.push(Value::Real(min));
        clauses.push(format!("rating >= ?{}", values.len()));
    }
    if let Some(max) = criteria.max_rating {
        values.push(Value::Real(max));
        clauses.push(format!("rating <= ?{}", values.len()));
    }

    (clauses.join(" AND "), values)
}

pub struct SqliteReviewRepository {
    pool: DbPool,
}

impl SqliteReviewRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for SqliteReviewRepository {
    async fn insert(&self, review: &Review) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO reviews (id, style_id, user_id, text, rating, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                review.id,
                review.style_id,
                review.user_id,
                review.text,
                review.rating,
                db::timestamp(review.created_at),
                db::timestamp(review.updated_at),
            ],
        )
        .map_err(|e| match RepositoryError::from_constraint(e, "Hijab style or user") {
            RepositoryError::Conflict(_) => {
                RepositoryError::Conflict("You have already reviewed this style".to_string())
            }
            other => other,
        })?;

        write_review(&tx, review)?;
        tx.commit()?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Review>, RepositoryError> {
        let conn = self.pool.get()?;
        load_review(&conn, id)
    }

    async fn find_for_pair(
        &self,
        style_id: &str,
        user_id: &str,
    ) -> Result<Option<Review>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM reviews WHERE style_id = ?1 AND user_id = ?2",
            REVIEW_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![style_id, user_id], review_from_row)
            .optional()?)
    }

    async fn modify(&self, id: &str, mutation: ReviewMutation) -> Result<Review, ReviewError> {
        let mut conn = self.pool.get().map_err(RepositoryError::from)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        let current = load_review(&tx, id)?
            .ok_or_else(|| ReviewError::NotFound("Review".to_string()))?;

        let updated = mutation(current)?;
        write_review(&tx, &updated)?;

        tx.commit().map_err(RepositoryError::from)?;
        Ok(updated)
    }

    async fn modify_many(
        &self,
        ids: &[String],
        mutation: BulkMutation,
    ) -> Result<usize, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut changed = 0;
        for id in ids {
            let Some(current) = load_review(&tx, id)? else {
                continue;
            };
            if let Some(updated) = mutation(current) {
                write_review(&tx, &updated)?;
                changed += 1;
            }
        }

        tx.commit()?;
        Ok(changed)
    }

    async fn list_for_style(
        &self,
        style_id: &str,
        status: ReviewStatus,
        sort: ReviewSort,
        page: &PageRequest,
    ) -> Result<(Vec<Review>, u64), RepositoryError> {
        use rusqlite::types::Value;

        let conn = self.pool.get()?;
        paged(
            &conn,
            &format!("{} AND style_id = ?1 AND status = ?2", LIVE),
            &[
                Value::Text(style_id.to_string()),
                Value::Text(status.as_str().to_string()),
            ],
            order_clause(sort),
            page,
        )
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        published_only: bool,
        page: &PageRequest,
    ) -> Result<(Vec<Review>, u64), RepositoryError> {
        let conn = self.pool.get()?;
        let clause = if published_only {
            format!("{} AND user_id = ?1 AND status = 'Published'", LIVE)
        } else {
            format!("{} AND user_id = ?1", LIVE)
        };
        paged(
            &conn,
            &clause,
            &[rusqlite::types::Value::Text(user_id.to_string())],
            order_clause(ReviewSort::Newest),
            page,
        )
    }

    async fn most_helpful(&self, limit: u32) -> Result<Vec<Review>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM reviews
             WHERE {} AND status = 'Published'
             ORDER BY helpful_votes DESC, rating DESC, created_at DESC
             LIMIT ?1",
            REVIEW_COLUMNS, LIVE
        );
        let mut stmt = conn.prepare(&sql)?;
        let reviews = stmt
            .query_map(params![limit], review_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    async fn search(
        &self,
        criteria: &ReviewSearch,
        page: &PageRequest,
    ) -> Result<(Vec<Review>, u64), RepositoryError> {
        let conn = self.pool.get()?;
        let (clause, values) = search_clause(criteria);
        let order = order_clause(ReviewSort::Newest);

        let Some(needle) = criteria
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
        else {
            return paged(&conn, &clause, &values, order, page);
        };

        let sql = format!("SELECT {} FROM reviews WHERE {} {}", REVIEW_COLUMNS, clause, order);
        let mut stmt = conn.prepare(&sql)?;
        let matches = stmt
            .query_map(params_from_iter(values.iter()), review_from_row)?
            .filter(|r| r.as_ref().map_or(true, |r| mentions(r, &needle)))
            .collect::<Result<Vec<_>, _>>()?;

        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.limit() as usize)
            .collect();
        Ok((items, total))
    }

    async fn rating_samples(&self, style_id: &str) -> Result<Vec<RatingSample>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT rating, coalesce(json_extract(user_experience_json, '$.wouldRecommend'), 1)
             FROM reviews
             WHERE {} AND style_id = ?1 AND status = 'Published'",
            LIVE
        ))?;
        let samples = stmt
            .query_map(params![style_id], |row| {
                Ok(RatingSample {
                    rating: row.get(0)?,
                    would_recommend: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(samples)
    }

    async fn count_for_user(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM reviews WHERE {} AND user_id = ?1", LIVE),
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub type DynReviewRepository = Arc<dyn ReviewRepository>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    const STYLE: &str = "style-1";

    fn create_test_repo() -> (SqliteReviewRepository, tempfile::TempDir) {
        let (pool, tmp) = db::test_pool();
        {
            let conn = pool.get().unwrap();
            let now = db::timestamp(Utc::now());
            conn.execute(
                "INSERT INTO styles (id, name, slug, image, created_at, updated_at)
                 VALUES (?1, 'Classic Wrap', 'classic-wrap', 'https://x.example.com/a.jpg', ?2, ?2)",
                params![STYLE, now],
            )
            .unwrap();
            for user in ["u1", "u2", "u3"] {
                conn.execute(
                    "INSERT INTO users (id, name, email, password_hash, last_active, created_at, updated_at)
                     VALUES (?1, 'Tester', ?1 || '@example.com', 'x', ?2, ?2, ?2)",
                    params![user, now],
                )
                .unwrap();
            }
        }
        (SqliteReviewRepository::new(pool), tmp)
    }

    fn review(id: &str, user: &str, rating: f64, minutes_ago: i64) -> Review {
        let draft = ReviewDraft {
            text: format!("Review {id} with enough text"),
            rating,
            ..ReviewDraft::default()
        };
        Review::new(
            id.to_string(),
            STYLE,
            user,
            draft,
            Utc::now() - Duration::minutes(minutes_ago),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let (repo, _tmp) = create_test_repo();
        let r = Review {
            user_experience: Some(UserExperience {
                difficulty_level: Some(ExperienceLevel::AsExpected),
                time_spent: Some(15),
                would_recommend: false,
            }),
            ..review("r1", "u1", 4.5, 0)
        };
        repo.insert(&r).await.unwrap();

        let loaded = repo.find_by_id("r1").await.unwrap().unwrap();
        assert_eq!(loaded.rating, 4.5);
        assert_eq!(loaded.user_experience, r.user_experience);
        assert_eq!(loaded.status, ReviewStatus::Published);
        assert!(repo.find_for_pair(STYLE, "u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_review_for_pair_is_conflict() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&review("r1", "u1", 4.0, 0)).await.unwrap();

        let result = repo.insert(&review("r2", "u1", 3.0, 0)).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn dangling_reference_is_not_found() {
        let (repo, _tmp) = create_test_repo();
        let orphans = [
            Review {
                style_id: "ghost".into(),
                ..review("r1", "u1", 4.0, 0)
            },
            review("r2", "nobody", 4.0, 0),
        ];
        for orphan in orphans {
            match repo.insert(&orphan).await {
                Err(RepositoryError::NotFound(what)) => assert_eq!(what, "Hijab style or user"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn failed_insert_leaves_no_partial_row() {
        let (repo, _tmp) = create_test_repo();
        repo.pool
            .get()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER block_review_update BEFORE UPDATE ON reviews
                 BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
            )
            .unwrap();

        assert!(repo.insert(&review("r1", "u1", 4.0, 0)).await.is_err());
        assert!(repo.find_by_id("r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_mutation_writes_nothing() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&review("r1", "u1", 4.0, 0)).await.unwrap();

        let result = repo
            .modify(
                "r1",
                Box::new(|r| {
                    let _ = r.vote("u2", VoteKind::Helpful, Utc::now());
                    Err(ReviewError::Forbidden("no".into()))
                }),
            )
            .await;
        assert!(matches!(result, Err(ReviewError::Forbidden(_))));
        assert_eq!(repo.find_by_id("r1").await.unwrap().unwrap().helpful_votes, 0);
    }

    #[tokio::test]
    async fn listing_sorts_and_hides_deleted() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&review("old", "u1", 5.0, 30)).await.unwrap();
        repo.insert(&review("mid", "u2", 3.0, 20)).await.unwrap();
        repo.insert(&review("new", "u3", 4.0, 10)).await.unwrap();

        let (page, total) = repo
            .list_for_style(STYLE, ReviewStatus::Published, ReviewSort::Highest, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 3);
        let ids: Vec<_> = page.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["old", "new", "mid"]);

        repo.modify("old", Box::new(|r| Ok(r.soft_delete(Utc::now()))))
            .await
            .unwrap();
        let (page, total) = repo
            .list_for_style(STYLE, ReviewStatus::Published, ReviewSort::Newest, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].id, "new");
    }

    #[tokio::test]
    async fn stats_samples_default_to_recommending() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&review("r1", "u1", 5.0, 0)).await.unwrap();
        let skeptic = Review {
            user_experience: Some(UserExperience {
                would_recommend: false,
                ..UserExperience::default()
            }),
            ..review("r2", "u2", 2.0, 0)
        };
        repo.insert(&skeptic).await.unwrap();
        let hidden = Review {
            status: ReviewStatus::Hidden,
            ..review("r3", "u3", 1.0, 0)
        };
        repo.insert(&hidden).await.unwrap();

        let mut samples = repo.rating_samples(STYLE).await.unwrap();
        samples.sort_by(|a, b| a.rating.total_cmp(&b.rating));
        assert_eq!(
            samples,
            vec![
                RatingSample { rating: 2.0, would_recommend: false },
                RatingSample { rating: 5.0, would_recommend: true },
            ]
        );
    }

    #[tokio::test]
    async fn search_filters_text_and_rating() {
        let (repo, _tmp) = create_test_repo();
        let wrap = Review {
            text: "The wrap stayed put all day".into(),
            ..review("r1", "u1", 5.0, 0)
        };
        repo.insert(&wrap).await.unwrap();
        repo.insert(&review("r2", "u2", 2.0, 0)).await.unwrap();

        let criteria = ReviewSearch {
            q: Some("WRAP".into()),
            min_rating: Some(4.0),
            ..ReviewSearch::default()
        };
        let (found, total) = repo.search(&criteria, &PageRequest::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].id, "r1");

        let low = ReviewSearch {
            max_rating: Some(3.0),
            ..ReviewSearch::default()
        };
        let (found, _) = repo.search(&low, &PageRequest::default()).await.unwrap();
        assert_eq!(found[0].id, "r2");
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let (repo, _tmp) = create_test_repo();
        let titled = Review {
            title: Some("ÖZEL gün için".into()),
            ..review("r1", "u1", 5.0, 1)
        };
        let texted = Review {
            text: "Şal kaymadı, ÖZEL bir stil".into(),
            ..review("r2", "u2", 4.0, 0)
        };
        repo.insert(&titled).await.unwrap();
        repo.insert(&texted).await.unwrap();
        repo.insert(&review("r3", "u3", 4.0, 2)).await.unwrap();

        let criteria = ReviewSearch {
            q: Some("özel".into()),
            ..ReviewSearch::default()
        };
        let (found, total) = repo.search(&criteria, &PageRequest::default()).await.unwrap();
        assert_eq!(total, 2);
        let ids: Vec<_> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1"]);

        let (second, total) = repo.search(&criteria, &PageRequest::new(2, 1)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(second[0].id, "r1");
    }

    #[tokio::test]
    async fn bulk_mutation_counts_changed_records() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&review("r1", "u1", 4.0, 0)).await.unwrap();
        repo.insert(&review("r2", "u2", 4.0, 0)).await.unwrap();

        let ids = vec!["r1".to_string(), "r2".to_string(), "ghost".to_string()];
        let changed = repo
            .modify_many(
                &ids,
                Arc::new(|r| r.moderate(ReviewStatus::Hidden, Utc::now())),
            )
            .await
            .unwrap();
        assert_eq!(changed, 2);
        assert!(repo.most_helpful(10).await.unwrap().is_empty());
    }
}
