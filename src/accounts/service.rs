// Account manager - orchestrates domain transitions and repository commits
use chrono::{DateTime, Duration, Utc};

use crate::accounts::domain::*;
use crate::accounts::repository::{ActivityCounts, DynAccountRepository};
use crate::config::AuthConfig;

#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub bcrypt_cost: u32,
    pub lockout: LockoutPolicy,
    pub session_ttl: Duration,
    pub verification_ttl: Duration,
    pub reset_ttl: Duration,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

impl AccountSettings {
    pub fn from_config(auth: &AuthConfig) -> Self {
        Self {
            bcrypt_cost: auth.bcrypt_cost,
            lockout: LockoutPolicy {
                max_attempts: auth.max_login_attempts,
                lock_duration: Duration::minutes(auth.lockout_minutes as i64),
            },
            session_ttl: Duration::hours(auth.session_hours as i64),
            verification_ttl: Duration::hours(auth.verification_token_hours as i64),
            reset_ttl: Duration::minutes(auth.reset_token_minutes as i64),
        }
    }
}

/// Entry point for everything that touches a user record.
#[derive(Clone)]
pub struct AccountManager {
    repo: DynAccountRepository,
    settings: AccountSettings,
}

impl AccountManager {
    pub fn new(repo: DynAccountRepository, settings: AccountSettings) -> Self {
        Self { repo, settings }
    }

    // bcrypt is deliberately slow; keep it off the async workers.
    async fn hash_password(&self, plaintext: &str) -> Result<PasswordHash, AccountError> {
        let cost = self.settings.bcrypt_cost;
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || PasswordHash::from_plaintext(&plaintext, cost))
            .await
            .map_err(|e| AccountError::Hashing(e.to_string()))?
    }

    async fn verify_password(hash: &PasswordHash, plaintext: &str) -> bool {
        let hash = hash.clone();
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || hash.verify(&plaintext))
            .await
            .unwrap_or(false)
    }

    pub async fn get(&self, id: &str) -> Result<User, AccountError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AccountError::NotFound("User".to_string()))
    }

    pub async fn signup(&self, account: NewAccount) -> Result<User, AccountError> {
        account.validate()?;

        if self.repo.find_by_email(&account.email).await?.is_some() {
            return Err(AccountError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let hash = self.hash_password(&account.password).await?;
        let user = User::new(uuid::Uuid::now_v7().to_string(), &account, hash, Utc::now());
        self.repo.insert(&user).await?;

        tracing::info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AccountError> {
        self.authenticate_at(email, password, Utc::now()).await
    }

    /// Every refusal surfaces as `InvalidCredentials`; the cause is only logged.
    pub async fn authenticate_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AccountError> {
        let Some(user) = self.repo.find_by_email(email).await? else {
            tracing::info!("Login failed: unknown email");
            return Err(AccountError::InvalidCredentials);
        };

        if let Some(block) = user.sign_in_block(now) {
            tracing::warn!(user_id = %user.id, ?block, "Login refused");
            if block == SignInBlock::Locked {
                self.record_failed_login(&user.id, now).await?;
            }
            return Err(AccountError::InvalidCredentials);
        }

        if !Self::verify_password(&user.password, password).await {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            self.record_failed_login(&user.id, now).await?;
            return Err(AccountError::InvalidCredentials);
        }

        self.record_successful_login(&user.id, now).await
    }

    pub async fn record_failed_login(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AccountError> {
        let policy = self.settings.lockout;
        let user = self
            .repo
            .modify(
                user_id,
                Box::new(move |u| Ok(u.record_failed_login(&policy, now))),
            )
            .await?;

        if user.login_attempts.locked_until.is_some_and(|until| until > now)
            && user.login_attempts.count == policy.max_attempts
        {
            tracing::warn!(user_id = %user.id, "Account locked after repeated failures");
        }
        Ok(user)
    }

    pub async fn record_successful_login(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AccountError> {
        self.repo
            .modify(user_id, Box::new(move |u| Ok(u.record_successful_login(now))))
            .await
    }

    pub async fn touch_activity(&self, user_id: &str) -> Result<User, AccountError> {
        let now = Utc::now();
        self.repo
            .modify(user_id, Box::new(move |u| Ok(u.touch_activity(now))))
            .await
    }

    // --- Sessions ---

    /// Returns the raw bearer token; only its digest is stored.
    pub async fn issue_session(
        &self,
        user_id: &str,
        user_agent: Option<String>,
    ) -> Result<String, AccountError> {
        let (raw, session) =
            Session::issue(user_id, user_agent, self.settings.session_ttl, Utc::now());
        self.repo.create_session(&session).await?;
        Ok(raw)
    }

    /// Owner of a live session, provided the account may still sign in.
    pub async fn resolve_session(&self, raw: &str) -> Result<Option<User>, AccountError> {
        let now = Utc::now();
        let user = self.repo.find_session_user(&digest(raw), now).await?;
        Ok(user.filter(|u| {
            !matches!(
                u.sign_in_block(now),
                Some(SignInBlock::Inactive | SignInBlock::Suspended)
            )
        }))
    }

    pub async fn revoke_session(&self, raw: &str) -> Result<bool, AccountError> {
        Ok(self.repo.delete_session(&digest(raw)).await?)
    }

    // --- Tokens ---

    /// Returns the account and the raw token for out-of-band delivery.
    pub async fn issue_email_verification_token(
        &self,
        user_id: &str,
    ) -> Result<(User, String), AccountError> {
        let now = Utc::now();
        let (raw, token) = TokenDigest::issue(self.settings.verification_ttl, now);
        let user = self
            .repo
            .modify(
                user_id,
                Box::new(move |u| {
                    if u.is_verified {
                        return Err(AccountError::Conflict(
                            "Email is already verified".to_string(),
                        ));
                    }
                    Ok(u.with_email_verification(token, now))
                }),
            )
            .await?;
        Ok((user, raw))
    }

    pub async fn verify_email(&self, raw: &str) -> Result<User, AccountError> {
        let user = self
            .repo
            .find_by_verification_hash(&digest(raw))
            .await?
            .ok_or(AccountError::InvalidToken)?;

        let now = Utc::now();
        let raw = raw.to_string();
        let user = self
            .repo
            .modify(&user.id, Box::new(move |u| u.verify_email(&raw, now)))
            .await?;

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    /// `None` for an unknown email, so callers can answer identically either way.
    pub async fn issue_password_reset_token(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, AccountError> {
        let Some(user) = self.repo.find_by_email(email).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        let (raw, token) = TokenDigest::issue(self.settings.reset_ttl, now);
        let user = self
            .repo
            .modify(&user.id, Box::new(move |u| Ok(u.with_password_reset(token, now))))
            .await?;
        Ok(Some((user, raw)))
    }

    /// Consumes the reset token, clears lockout and signs out every session.
    pub async fn reset_password(&self, raw: &str, new_password: &str) -> Result<User, AccountError> {
        validate_password(new_password)?;

        let user = self
            .repo
            .find_by_reset_hash(&digest(raw))
            .await?
            .ok_or(AccountError::InvalidToken)?;

        let now = Utc::now();
        if !user.password_reset_matches(raw, now) {
            return Err(AccountError::InvalidToken);
        }

        let hash = self.hash_password(new_password).await?;
        let raw = raw.to_string();
        let user = self
            .repo
            .modify(
                &user.id,
                Box::new(move |u| {
                    if !u.password_reset_matches(&raw, now) {
                        return Err(AccountError::InvalidToken);
                    }
                    Ok(u.with_password(hash, now))
                }),
            )
            .await?;

        let revoked = self.repo.delete_sessions_for(&user.id).await?;
        tracing::info!(user_id = %user.id, revoked, "Password reset");
        Ok(user)
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current: &str,
        new_password: &str,
    ) -> Result<User, AccountError> {
        validate_password(new_password)?;

        let user = self.get(user_id).await?;
        if !Self::verify_password(&user.password, current).await {
            return Err(AccountError::Validation(vec![
                "Current password is incorrect".to_string(),
            ]));
        }

        let hash = self.hash_password(new_password).await?;
        let now = Utc::now();
        self.repo
            .modify(user_id, Box::new(move |u| Ok(u.with_password(hash, now))))
            .await
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<User, AccountError> {
        let now = Utc::now();
        self.repo
            .modify(user_id, Box::new(move |u| u.apply_profile(update, now)))
            .await
    }

    /// Administrator-only status and role changes.
    pub async fn set_account_status(
        &self,
        actor: &User,
        user_id: &str,
        update: AccountStatusUpdate,
    ) -> Result<User, AccountError> {
        if !actor.role.is_admin() {
            return Err(AccountError::Forbidden(
                "Only administrators can change account status".to_string(),
            ));
        }

        let now = Utc::now();
        let user = self
            .repo
            .modify(user_id, Box::new(move |u| Ok(u.apply_status(update, now))))
            .await?;

        tracing::info!(
            user_id = %user.id,
            actor = %actor.id,
            role = %user.role,
            is_active = user.is_active,
            "Account status changed"
        );
        Ok(user)
    }

    // --- Gamification ---

    pub async fn award_points(&self, user_id: &str, amount: u32) -> Result<User, AccountError> {
        let now = Utc::now();
        self.repo
            .modify(user_id, Box::new(move |u| Ok(u.award_points(amount, now))))
            .await
    }

    pub async fn add_badge(&self, user_id: &str, badge: Badge) -> Result<User, AccountError> {
        let now = Utc::now();
        self.repo
            .modify(user_id, Box::new(move |u| Ok(u.add_badge(badge, now))))
            .await
    }

    // --- Social graph ---

    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> Result<bool, AccountError> {
        if follower_id == followee_id {
            return Err(AccountError::Validation(vec![
                "You cannot follow yourself".to_string(),
            ]));
        }
        self.get(followee_id).await?;
        Ok(self.repo.follow(follower_id, followee_id, Utc::now()).await?)
    }

    pub async fn unfollow(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> Result<bool, AccountError> {
        Ok(self.repo.unfollow(follower_id, followee_id).await?)
    }

    pub async fn followers(&self, user_id: &str) -> Result<Vec<FollowEdge>, AccountError> {
        self.get(user_id).await?;
        Ok(self.repo.followers(user_id).await?)
    }

    pub async fn following(&self, user_id: &str) -> Result<Vec<FollowEdge>, AccountError> {
        self.get(user_id).await?;
        Ok(self.repo.following(user_id).await?)
    }

    pub async fn counts(&self, user_id: &str) -> Result<ActivityCounts, AccountError> {
        Ok(self.repo.activity_counts(user_id).await?)
    }

    // --- Favorites, bookmarks and collections ---

    pub async fn save_style(
        &self,
        user_id: &str,
        style_id: &str,
        kind: SavedKind,
    ) -> Result<bool, AccountError> {
        Ok(self
            .repo
            .save_style(user_id, style_id, kind, Utc::now())
            .await?)
    }

    pub async fn unsave_style(
        &self,
        user_id: &str,
        style_id: &str,
        kind: SavedKind,
    ) -> Result<bool, AccountError> {
        Ok(self.repo.unsave_style(user_id, style_id, kind).await?)
    }

    pub async fn saved_styles(
        &self,
        user_id: &str,
        kind: SavedKind,
    ) -> Result<Vec<SavedStyle>, AccountError> {
        Ok(self.repo.saved_styles(user_id, kind).await?)
    }

    pub async fn create_collection(
        &self,
        user_id: &str,
        input: NewCollection,
    ) -> Result<Collection, AccountError> {
        input.validate()?;

        let collection = Collection {
            id: uuid::Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            is_public: input.is_public,
            styles: Vec::new(),
            created_at: Utc::now(),
        };
        self.repo.create_collection(&collection).await?;
        Ok(collection)
    }

    async fn owned_collection(
        &self,
        user_id: &str,
        collection_id: &str,
    ) -> Result<Collection, AccountError> {
        let collection = self
            .repo
            .find_collection(collection_id)
            .await?
            .ok_or_else(|| AccountError::NotFound("Collection".to_string()))?;
        if collection.user_id != user_id {
            return Err(AccountError::Forbidden(
                "You can only modify your own collections".to_string(),
            ));
        }
        Ok(collection)
    }

    pub async fn add_to_collection(
        &self,
        user_id: &str,
        collection_id: &str,
        style_id: &str,
    ) -> Result<Collection, AccountError> {
        self.owned_collection(user_id, collection_id).await?;
        self.repo
            .add_to_collection(collection_id, style_id, Utc::now())
            .await?;
        self.owned_collection(user_id, collection_id).await
    }

    pub async fn remove_from_collection(
        &self,
        user_id: &str,
        collection_id: &str,
        style_id: &str,
    ) -> Result<Collection, AccountError> {
        self.owned_collection(user_id, collection_id).await?;
        self.repo
            .remove_from_collection(collection_id, style_id)
            .await?;
        self.owned_collection(user_id, collection_id).await
    }

    /// A user's own collections, or only the public ones for anyone else.
    pub async fn collections(
        &self,
        owner_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Vec<Collection>, AccountError> {
        let all = self.repo.collections_for(owner_id).await?;
        if viewer_id == Some(owner_id) {
            return Ok(all);
        }
        Ok(all.into_iter().filter(|c| c.is_public).collect())
    }
}
