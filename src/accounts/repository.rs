// Repository pattern - isolates all account side effects
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use std::sync::Arc;

use crate::accounts::domain::*;
use crate::db::{self, RepositoryError};
use crate::state::DbPool;

/// Read-modify-write step applied to a freshly loaded snapshot.
pub type UserMutation = Box<dyn FnOnce(User) -> Result<User, AccountError> + Send>;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account; `Conflict` when the email is taken
    async fn insert(&self, user: &User) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_verification_hash(&self, hash: &str)
        -> Result<Option<User>, RepositoryError>;

    async fn find_by_reset_hash(&self, hash: &str) -> Result<Option<User>, RepositoryError>;

    /// Serialized read-modify-write of one account
    async fn modify(&self, id: &str, mutation: UserMutation) -> Result<User, AccountError>;

    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError>;

    /// Owner of a live session; bumps `last_used`
    async fn find_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError>;

    async fn delete_session(&self, token_hash: &str) -> Result<bool, RepositoryError>;

    async fn delete_sessions_for(&self, user_id: &str) -> Result<u64, RepositoryError>;

    /// Returns false when the edge already existed
    async fn follow(
        &self,
        follower_id: &str,
        followee_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn unfollow(&self, follower_id: &str, followee_id: &str)
        -> Result<bool, RepositoryError>;

    async fn followers(&self, user_id: &str) -> Result<Vec<FollowEdge>, RepositoryError>;

    async fn following(&self, user_id: &str) -> Result<Vec<FollowEdge>, RepositoryError>;

    async fn save_style(
        &self,
        user_id: &str,
        style_id: &str,
        kind: SavedKind,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn unsave_style(
        &self,
        user_id: &str,
        style_id: &str,
        kind: SavedKind,
    ) -> Result<bool, RepositoryError>;

    async fn saved_styles(
        &self,
        user_id: &str,
        kind: SavedKind,
    ) -> Result<Vec<SavedStyle>, RepositoryError>;

    async fn create_collection(&self, collection: &Collection) -> Result<(), RepositoryError>;

    async fn find_collection(&self, id: &str) -> Result<Option<Collection>, RepositoryError>;

    async fn add_to_collection(
        &self,
        collection_id: &str,
        style_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn remove_from_collection(
        &self,
        collection_id: &str,
        style_id: &str,
    ) -> Result<bool, RepositoryError>;

    async fn collections_for(&self, user_id: &str) -> Result<Vec<Collection>, RepositoryError>;

    /// (followers, following, styles created, live reviews written)
    async fn activity_counts(&self, user_id: &str) -> Result<ActivityCounts, RepositoryError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCounts {
    pub followers: u64,
    pub following: u64,
    pub total_styles: u64,
    pub total_reviews: u64,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, profile_json, preferences_json, \
     settings_json, role, is_active, is_verified, suspended_until, suspension_reason, points, \
     level, streak_days, streak_last_active, badges_json, last_active, login_count, \
     failed_login_count, locked_until, email_verification_hash, email_verification_expires, \
     password_reset_hash, password_reset_expires, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(7)?;
    let token = |hash: Option<String>, expires: Option<String>| -> rusqlite::Result<_> {
        Ok(match (hash, db::parse_optional_timestamp(expires)?) {
            (Some(hash), Some(expires_at)) => Some(TokenDigest { hash, expires_at }),
            _ => None,
        })
    };

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: PasswordHash::from_stored(row.get::<_, String>(3)?),
        profile: db::json_column(&row.get::<_, String>(4)?)?,
        preferences: db::json_column(&row.get::<_, String>(5)?)?,
        settings: db::json_column(&row.get::<_, String>(6)?)?,
        role: role.parse().unwrap_or_default(),
        is_active: row.get(8)?,
        is_verified: row.get(9)?,
        suspended_until: db::parse_optional_timestamp(row.get(10)?)?,
        suspension_reason: row.get(11)?,
        achievements: Achievements {
            points: row.get(12)?,
            level: row.get(13)?,
            streak: Streak {
                days: row.get(14)?,
                last_active_date: db::parse_optional_timestamp(row.get(15)?)?,
            },
            badges: db::json_column(&row.get::<_, String>(16)?)?,
        },
        last_active: db::parse_timestamp(&row.get::<_, String>(17)?)?,
        login_count: row.get(18)?,
        login_attempts: LoginAttempts {
            count: row.get(19)?,
            locked_until: db::parse_optional_timestamp(row.get(20)?)?,
        },
        email_verification: token(row.get(21)?, row.get(22)?)?,
        password_reset: token(row.get(23)?, row.get(24)?)?,
        created_at: db::parse_timestamp(&row.get::<_, String>(25)?)?,
        updated_at: db::parse_timestamp(&row.get::<_, String>(26)?)?,
    })
}

fn load_user(
    conn: &rusqlite::Connection,
    column: &str,
    value: &str,
) -> Result<Option<User>, RepositoryError> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    Ok(conn
        .query_row(&sql, params![value], user_from_row)
        .optional()?)
}

fn write_user(conn: &rusqlite::Connection, user: &User) -> Result<(), RepositoryError> {
    let opt_ts = |t: Option<DateTime<Utc>>| t.map(db::timestamp);
    conn.execute(
        "UPDATE users SET
            name = ?2, password_hash = ?3, profile_json = ?4, preferences_json = ?5,
            settings_json = ?6, role = ?7, is_active = ?8, is_verified = ?9,
            suspended_until = ?10, suspension_reason = ?11, points = ?12, level = ?13,
            streak_days = ?14, streak_last_active = ?15, badges_json = ?16, last_active = ?17,
            login_count = ?18, failed_login_count = ?19, locked_until = ?20,
            email_verification_hash = ?21, email_verification_expires = ?22,
            password_reset_hash = ?23, password_reset_expires = ?24, updated_at = ?25
         WHERE id = ?1",
        params![
            user.id,
            user.name,
            user.password.as_str(),
            serde_json::to_string(&user.profile)?,
            serde_json::to_string(&user.preferences)?,
            serde_json::to_string(&user.settings)?,
            user.role.as_str(),
            user.is_active,
            user.is_verified,
            opt_ts(user.suspended_until),
            user.suspension_reason,
            user.achievements.points,
            user.achievements.level,
            user.achievements.streak.days,
            opt_ts(user.achievements.streak.last_active_date),
            serde_json::to_string(&user.achievements.badges)?,
            db::timestamp(user.last_active),
            user.login_count,
            user.login_attempts.count,
            opt_ts(user.login_attempts.locked_until),
            user.email_verification.as_ref().map(|t| t.hash.clone()),
            user.email_verification.as_ref().map(|t| db::timestamp(t.expires_at)),
            user.password_reset.as_ref().map(|t| t.hash.clone()),
            user.password_reset.as_ref().map(|t| db::timestamp(t.expires_at)),
            db::timestamp(user.updated_at),
        ],
    )?;
    Ok(())
}

fn follow_edge_from_row(row: &Row<'_>) -> rusqlite::Result<FollowEdge> {
    Ok(FollowEdge {
        user_id: row.get(0)?,
        name: row.get(1)?,
        avatar: row.get(2)?,
        followed_at: db::parse_timestamp(&row.get::<_, String>(3)?)?,
    })
}

/// SQLite implementation
pub struct SqliteAccountRepository {
    pool: DbPool,
}

impl SqliteAccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn collection_styles(
        conn: &rusqlite::Connection,
        collection_id: &str,
    ) -> Result<Vec<String>, RepositoryError> {
        let mut stmt = conn.prepare(
            "SELECT style_id FROM collection_styles WHERE collection_id = ?1 ORDER BY added_at",
        )?;
        let ids = stmt
            .query_map(params![collection_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
        Ok(Collection {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            is_public: row.get(4)?,
            styles: Vec::new(),
            created_at: db::parse_timestamp(&row.get::<_, String>(5)?)?,
        })
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO users (id, name, email, password_hash, last_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                user.id,
                user.name,
                user.email,
                user.password.as_str(),
                db::timestamp(user.last_active),
                db::timestamp(user.created_at),
            ],
        )
        .map_err(|e| RepositoryError::from_constraint(e, "An account with this email already exists"))?;

        // Remaining columns share the update path, in the same transaction
        write_user(&tx, user)?;
        tx.commit()?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        load_user(&conn, "id", id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        load_user(&conn, "email", &normalize_email(email))
    }

    async fn find_by_verification_hash(
        &self,
        hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        load_user(&conn, "email_verification_hash", hash)
    }

    async fn find_by_reset_hash(&self, hash: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        load_user(&conn, "password_reset_hash", hash)
    }

    async fn modify(&self, id: &str, mutation: UserMutation) -> Result<User, AccountError> {
        let mut conn = self.pool.get().map_err(RepositoryError::from)?;

        // IMMEDIATE takes the write lock up front so concurrent mutations of
        // the same account queue instead of interleaving.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        let current = load_user(&tx, "id", id)?
            .ok_or_else(|| AccountError::NotFound("User".to_string()))?;
        let updated = mutation(current)?;
        write_user(&tx, &updated)?;

        tx.commit().map_err(RepositoryError::from)?;
        Ok(updated)
    }

    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO sessions (id, user_id, token_hash, user_agent, created_at, last_used, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.id,
                session.user_id,
                session.token_hash,
                session.user_agent,
                db::timestamp(session.created_at),
                db::timestamp(session.last_used),
                db::timestamp(session.expires_at),
            ],
        )?;

        Ok(())
    }

    async fn find_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let now = db::timestamp(now);

        let touched = conn.execute(
            "UPDATE sessions SET last_used = ?2 WHERE token_hash = ?1 AND expires_at > ?2",
            params![token_hash, now],
        )?;
        if touched == 0 {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {} FROM users WHERE id = (SELECT user_id FROM sessions WHERE token_hash = ?1)",
            USER_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![token_hash], user_from_row)
            .optional()?)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;

        Ok(rows > 0)
    }

    async fn delete_sessions_for(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;

        Ok(rows as u64)
    }

    async fn follow(
        &self,
        follower_id: &str,
        followee_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO follows (follower_id, followee_id, followed_at)
                 VALUES (?1, ?2, ?3)",
                params![follower_id, followee_id, db::timestamp(now)],
            )
            .map_err(|e| RepositoryError::from_constraint(e, "User"))?;

        Ok(rows > 0)
    }

    async fn unfollow(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower_id, followee_id],
        )?;

        Ok(rows > 0)
    }

    async fn followers(&self, user_id: &str) -> Result<Vec<FollowEdge>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT u.id, u.name, json_extract(u.profile_json, '$.avatar'), f.followed_at
             FROM follows f JOIN users u ON u.id = f.follower_id
             WHERE f.followee_id = ?1
             ORDER BY f.followed_at DESC",
        )?;
        let edges = stmt
            .query_map(params![user_id], follow_edge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(edges)
    }

    async fn following(&self, user_id: &str) -> Result<Vec<FollowEdge>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT u.id, u.name, json_extract(u.profile_json, '$.avatar'), f.followed_at
             FROM follows f JOIN users u ON u.id = f.followee_id
             WHERE f.follower_id = ?1
             ORDER BY f.followed_at DESC",
        )?;
        let edges = stmt
            .query_map(params![user_id], follow_edge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(edges)
    }

    async fn save_style(
        &self,
        user_id: &str,
        style_id: &str,
        kind: SavedKind,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO saved_styles (user_id, style_id, kind, saved_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, style_id, kind.as_str(), db::timestamp(now)],
            )
            .map_err(|e| RepositoryError::from_constraint(e, "Style"))?;

        Ok(rows > 0)
    }

    async fn unsave_style(
        &self,
        user_id: &str,
        style_id: &str,
        kind: SavedKind,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "DELETE FROM saved_styles WHERE user_id = ?1 AND style_id = ?2 AND kind = ?3",
            params![user_id, style_id, kind.as_str()],
        )?;

        Ok(rows > 0)
    }

    async fn saved_styles(
        &self,
        user_id: &str,
        kind: SavedKind,
    ) -> Result<Vec<SavedStyle>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT style_id, saved_at FROM saved_styles
             WHERE user_id = ?1 AND kind = ?2
             ORDER BY saved_at DESC",
        )?;
        let saved = stmt
            .query_map(params![user_id, kind.as_str()], |row| {
                Ok(SavedStyle {
                    style_id: row.get(0)?,
                    saved_at: db::parse_timestamp(&row.get::<_, String>(1)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(saved)
    }

    async fn create_collection(&self, collection: &Collection) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO collections (id, user_id, name, description, is_public, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                collection.id,
                collection.user_id,
                collection.name,
                collection.description,
                collection.is_public,
                db::timestamp(collection.created_at),
            ],
        )?;

        Ok(())
    }

    async fn find_collection(&self, id: &str) -> Result<Option<Collection>, RepositoryError> {
        let conn = self.pool.get()?;

        let collection = conn
            .query_row(
                "SELECT id, user_id, name, description, is_public, created_at
                 FROM collections WHERE id = ?1",
                params![id],
                Self::collection_from_row,
            )
            .optional()?;

        match collection {
            Some(mut c) => {
                c.styles = Self::collection_styles(&conn, &c.id)?;
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    async fn add_to_collection(
        &self,
        collection_id: &str,
        style_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO collection_styles (collection_id, style_id, added_at)
                 VALUES (?1, ?2, ?3)",
                params![collection_id, style_id, db::timestamp(now)],
            )
            .map_err(|e| RepositoryError::from_constraint(e, "Style"))?;

        Ok(rows > 0)
    }

    async fn remove_from_collection(
        &self,
        collection_id: &str,
        style_id: &str,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "DELETE FROM collection_styles WHERE collection_id = ?1 AND style_id = ?2",
            params![collection_id, style_id],
        )?;

        Ok(rows > 0)
    }

    async fn collections_for(&self, user_id: &str) -> Result<Vec<Collection>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, description, is_public, created_at
             FROM collections WHERE user_id = ?1 ORDER BY created_at",
        )?;
        let mut collections = stmt
            .query_map(params![user_id], Self::collection_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for c in &mut collections {
            c.styles = Self::collection_styles(&conn, &c.id)?;
        }

        Ok(collections)
    }

    async fn activity_counts(&self, user_id: &str) -> Result<ActivityCounts, RepositoryError> {
        let conn = self.pool.get()?;

        let counts = conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM follows WHERE followee_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
                (SELECT COUNT(*) FROM styles WHERE created_by = ?1 AND status != 'Archived'),
                (SELECT COUNT(*) FROM reviews WHERE user_id = ?1 AND deleted_at IS NULL)",
            params![user_id],
            |row| {
                Ok(ActivityCounts {
                    followers: row.get(0)?,
                    following: row.get(1)?,
                    total_styles: row.get(2)?,
                    total_reviews: row.get(3)?,
                })
            },
        )?;

        Ok(counts)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynAccountRepository = Arc<dyn AccountRepository>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_repo() -> (SqliteAccountRepository, tempfile::TempDir) {
        let (pool, tmp) = db::test_pool();
        (SqliteAccountRepository::new(pool), tmp)
    }

    fn new_user(id: &str, email: &str) -> User {
        let account = NewAccount {
            name: format!("User {}", id),
            email: email.to_string(),
            password: "Secret123".to_string(),
        };
        let hash = PasswordHash::from_plaintext(&account.password, 4).unwrap();
        User::new(id.to_string(), &account, hash, Utc::now())
    }

    #[tokio::test]
    async fn failed_insert_leaves_no_partial_row() {
        let (repo, _tmp) = create_test_repo();
        repo.pool
            .get()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER block_user_update BEFORE UPDATE ON users
                 BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
            )
            .unwrap();

        assert!(repo.insert(&new_user("u1", "amina@example.com")).await.is_err());
        assert!(repo.find_by_id("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_and_load_round_trip() {
        let (repo, _tmp) = create_test_repo();
        let user = new_user("u1", "Amina@Example.com");
        repo.insert(&user).await.unwrap();

        let loaded = repo.find_by_email("AMINA@example.com").await.unwrap().unwrap();
        assert_eq!(loaded.id, "u1");
        assert_eq!(loaded.email, "amina@example.com");
        assert!(loaded.password.verify("Secret123"));
        assert_eq!(loaded.achievements, user.achievements);
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_user("u1", "a@example.com")).await.unwrap();

        let result = repo.insert(&new_user("u2", "A@example.com")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn modify_persists_mutation() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_user("u1", "a@example.com")).await.unwrap();

        let now = Utc::now();
        let updated = repo
            .modify("u1", Box::new(move |u| Ok(u.award_points(150, now))))
            .await
            .unwrap();
        assert_eq!(updated.achievements.level, 2);

        let loaded = repo.find_by_id("u1").await.unwrap().unwrap();
        assert_eq!(loaded.achievements.points, 150);
    }

    #[tokio::test]
    async fn failed_mutation_writes_nothing() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_user("u1", "a@example.com")).await.unwrap();

        let result = repo
            .modify(
                "u1",
                Box::new(|_| Err(AccountError::Validation(vec!["nope".into()]))),
            )
            .await;
        assert!(matches!(result, Err(AccountError::Validation(_))));

        let missing = repo.modify("ghost", Box::new(Ok)).await;
        assert!(matches!(missing, Err(AccountError::NotFound(_))));
    }

    #[tokio::test]
    async fn sessions_expire_and_revoke() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_user("u1", "a@example.com")).await.unwrap();

        let now = Utc::now();
        let (raw, session) = Session::issue("u1", None, Duration::hours(1), now);
        repo.create_session(&session).await.unwrap();

        let owner = repo.find_session_user(&digest(&raw), now).await.unwrap();
        assert_eq!(owner.map(|u| u.id), Some("u1".to_string()));

        let later = now + Duration::hours(2);
        assert!(repo
            .find_session_user(&digest(&raw), later)
            .await
            .unwrap()
            .is_none());

        assert!(repo.delete_session(&digest(&raw)).await.unwrap());
        assert!(!repo.delete_session(&digest(&raw)).await.unwrap());
    }

    #[tokio::test]
    async fn follow_is_idempotent() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_user("u1", "a@example.com")).await.unwrap();
        repo.insert(&new_user("u2", "b@example.com")).await.unwrap();

        let now = Utc::now();
        assert!(repo.follow("u1", "u2", now).await.unwrap());
        assert!(!repo.follow("u1", "u2", now).await.unwrap());

        let following = repo.following("u1").await.unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].user_id, "u2");
        assert_eq!(repo.followers("u2").await.unwrap().len(), 1);

        let counts = repo.activity_counts("u2").await.unwrap();
        assert_eq!(counts.followers, 1);
        assert_eq!(counts.following, 0);

        assert!(repo.unfollow("u1", "u2").await.unwrap());
        assert!(!repo.unfollow("u1", "u2").await.unwrap());
    }

    #[tokio::test]
    async fn follow_unknown_user_is_not_found() {
        let (repo, _tmp) = create_test_repo();
        repo.insert(&new_user("u1", "a@example.com")).await.unwrap();

        let result = repo.follow("u1", "ghost", Utc::now()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }
}
