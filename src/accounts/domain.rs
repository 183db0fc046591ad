// Account domain - pure data and state transitions, no I/O
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::taxonomy::{Difficulty, FaceShape, Occasion};
use crate::validation::{is_email, Validator};

pub const POINTS_PER_LEVEL: u32 = 100;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed")]
    Validation(Vec<String>),

    /// Deliberately vague: unknown email, wrong password, lockout and
    /// disabled accounts all look the same from outside.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<Vec<String>> for AccountError {
    fn from(errors: Vec<String>) -> Self {
        AccountError::Validation(errors)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    User,
    Creator,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Creator => "Creator",
            Role::Moderator => "Moderator",
            Role::Admin => "Admin",
        }
    }

    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(Role::User),
            "Creator" => Ok(Role::Creator),
            "Moderator" => Ok(Role::Moderator),
            "Admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// bcrypt hash of a password. The plaintext never outlives construction.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn from_plaintext(plaintext: &str, cost: u32) -> Result<Self, AccountError> {
        bcrypt::hash(plaintext, cost)
            .map(Self)
            .map_err(|e| AccountError::Hashing(e.to_string()))
    }

    pub fn from_stored(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time via bcrypt
    pub fn verify(&self, plaintext: &str) -> bool {
        bcrypt::verify(plaintext, &self.0).unwrap_or(false)
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

pub fn validate_password(plaintext: &str) -> Result<(), Vec<String>> {
    Validator::new()
        .check(
            plaintext.chars().count() >= 8,
            "Password must be at least 8 characters",
        )
        .check(
            plaintext.chars().any(|c| c.is_ascii_lowercase())
                && plaintext.chars().any(|c| c.is_ascii_uppercase())
                && plaintext.chars().any(|c| c.is_ascii_digit()),
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        )
        .finish()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Generate a cryptographically random 32-byte hex secret.
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// One-way digest stored in place of a raw secret.
pub fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// A hashed single-use token with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDigest {
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenDigest {
    /// Returns (raw_secret_for_delivery, digest_to_store)
    pub fn issue(ttl: Duration, now: DateTime<Utc>) -> (String, Self) {
        let raw = generate_secret();
        let token = Self {
            hash: digest(&raw),
            expires_at: now + ttl,
        };
        (raw, token)
    }

    pub fn matches(&self, raw: &str, now: DateTime<Utc>) -> bool {
        now < self.expires_at && self.hash == digest(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_duration: Duration::hours(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoginAttempts {
    pub count: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LoginAttempts {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// An expired lock restarts the count at 1 instead of stacking on top of
    /// the attempts that caused it.
    pub fn register_failure(self, policy: &LockoutPolicy, now: DateTime<Utc>) -> Self {
        if let Some(until) = self.locked_until {
            if until <= now {
                return Self {
                    count: 1,
                    locked_until: None,
                };
            }
        }

        let count = self.count.saturating_add(1);
        let locked_until = if count >= policy.max_attempts && !self.is_locked(now) {
            Some(now + policy.lock_duration)
        } else {
            self.locked_until
        };

        Self {
            count,
            locked_until,
        }
    }

    pub fn cleared() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    pub days: u32,
    pub last_active_date: Option<DateTime<Utc>>,
}

impl Streak {
    pub fn touch(self, now: DateTime<Utc>) -> Self {
        let days = match self.last_active_date {
            Some(last) if last.date_naive() == now.date_naive() => self.days,
            Some(last) if now - last <= Duration::hours(24) => self.days + 1,
            _ => 1,
        };
        Self {
            days,
            last_active_date: Some(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievements {
    pub points: u32,
    pub level: u32,
    pub streak: Streak,
    pub badges: Vec<Badge>,
}

impl Default for Achievements {
    fn default() -> Self {
        Self {
            points: 0,
            level: 1,
            streak: Streak::default(),
            badges: Vec::new(),
        }
    }
}

pub fn level_for(points: u32) -> u32 {
    points / POINTS_PER_LEVEL + 1
}

impl Achievements {
    pub fn award_points(self, amount: u32) -> Self {
        let points = self.points.saturating_add(amount);
        Self {
            points,
            level: self.level.max(level_for(points)),
            ..self
        }
    }

    pub fn add_badge(mut self, badge: Badge) -> Self {
        if !self.badges.iter().any(|b| b.name == badge.name) {
            self.badges.push(badge);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    Other,
    #[serde(rename = "Prefer not to say")]
    PreferNotToSay,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    pub country: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub location: Location,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

impl Profile {
    pub fn validate(&self, today: NaiveDate) -> Result<(), Vec<String>> {
        let mut v = Validator::new();
        if let Some(avatar) = &self.avatar {
            v.image_url(avatar, "Avatar");
        }
        if let Some(bio) = &self.bio {
            v.max_length(bio, 500, "Bio");
        }
        if let Some(dob) = self.date_of_birth {
            let age = age_on(dob, today);
            v.check((13..=120).contains(&age), "Invalid date of birth");
        }
        v.finish()
    }

    pub fn age(&self, today: NaiveDate) -> Option<i32> {
        self.date_of_birth.map(|dob| age_on(dob, today))
    }
}

fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub experience_level: Difficulty,
    pub favorite_styles: Vec<String>,
    pub face_shape: Option<FaceShape>,
    pub preferred_occasions: Vec<Occasion>,
    pub skin_tone: Option<SkinTone>,
    pub preferred_colors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkinTone {
    Fair,
    Medium,
    Olive,
    Dark,
    Deep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailNotifications {
    pub new_styles: bool,
    pub reviews: bool,
    pub followers: bool,
    pub newsletter: bool,
}

impl Default for EmailNotifications {
    fn default() -> Self {
        Self {
            new_styles: true,
            reviews: true,
            followers: true,
            newsletter: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfileVisibility {
    #[default]
    Public,
    Friends,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Privacy {
    pub profile_visibility: ProfileVisibility,
    pub show_email: bool,
    pub show_location: bool,
}

impl Default for Privacy {
    fn default() -> Self {
        Self {
            profile_visibility: ProfileVisibility::Public,
            show_email: false,
            show_location: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
    Ur,
    Tr,
    Fr,
    Es,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub email_notifications: EmailNotifications,
    pub privacy: Privacy,
    pub language: Language,
    pub theme: Theme,
}

/// Full account record. Holds secrets, so it is never serialized directly;
/// see [`PublicUser`].
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: PasswordHash,
    pub profile: Profile,
    pub preferences: Preferences,
    pub settings: Settings,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub suspended_until: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    pub achievements: Achievements,
    pub last_active: DateTime<Utc>,
    pub login_count: u32,
    pub login_attempts: LoginAttempts,
    pub email_verification: Option<TokenDigest>,
    pub password_reset: Option<TokenDigest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Signup input, validated before anything is hashed or stored.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl NewAccount {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Validator::new();
        v.length(self.name.trim(), 2, 50, "Name")
            .check(
                is_email(&normalize_email(&self.email)),
                "Please provide a valid email address",
            );
        let password = validate_password(&self.password);
        match (v.finish(), password) {
            (Ok(()), Ok(())) => Ok(()),
            (a, b) => Err(a
                .err()
                .unwrap_or_default()
                .into_iter()
                .chain(b.err().unwrap_or_default())
                .collect()),
        }
    }
}

/// Why a sign-in was refused. Only used for logging and lockout bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInBlock {
    Locked,
    Inactive,
    Suspended,
}

impl User {
    pub fn new(
        id: String,
        account: &NewAccount,
        password: PasswordHash,
        now: DateTime<Utc>,
    ) -> Self {
        let achievements = Achievements {
            streak: Streak::default().touch(now),
            ..Achievements::default()
        };
        Self {
            id,
            name: account.name.trim().to_string(),
            email: normalize_email(&account.email),
            password,
            profile: Profile::default(),
            preferences: Preferences::default(),
            settings: Settings::default(),
            role: Role::User,
            is_active: true,
            is_verified: false,
            suspended_until: None,
            suspension_reason: None,
            achievements,
            last_active: now,
            login_count: 0,
            login_attempts: LoginAttempts::default(),
            email_verification: None,
            password_reset: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.login_attempts.is_locked(now)
    }

    pub fn sign_in_block(&self, now: DateTime<Utc>) -> Option<SignInBlock> {
        if !self.is_active {
            Some(SignInBlock::Inactive)
        } else if self.suspended_until.is_some_and(|until| until > now) {
            Some(SignInBlock::Suspended)
        } else if self.is_locked(now) {
            Some(SignInBlock::Locked)
        } else {
            None
        }
    }

    pub fn record_failed_login(self, policy: &LockoutPolicy, now: DateTime<Utc>) -> Self {
        Self {
            login_attempts: self.login_attempts.register_failure(policy, now),
            updated_at: now,
            ..self
        }
    }

    pub fn record_successful_login(self, now: DateTime<Utc>) -> Self {
        Self {
            login_attempts: LoginAttempts::cleared(),
            login_count: self.login_count.saturating_add(1),
            ..self
        }
        .touch_activity(now)
    }

    pub fn touch_activity(self, now: DateTime<Utc>) -> Self {
        let achievements = Achievements {
            streak: self.achievements.streak.clone().touch(now),
            ..self.achievements
        };
        Self {
            achievements,
            last_active: now,
            updated_at: now,
            ..self
        }
    }

    /// The only way the stored hash changes.
    pub fn with_password(self, password: PasswordHash, now: DateTime<Utc>) -> Self {
        Self {
            password,
            password_reset: None,
            login_attempts: LoginAttempts::cleared(),
            updated_at: now,
            ..self
        }
    }

    pub fn with_email_verification(self, token: TokenDigest, now: DateTime<Utc>) -> Self {
        Self {
            email_verification: Some(token),
            updated_at: now,
            ..self
        }
    }

    pub fn with_password_reset(self, token: TokenDigest, now: DateTime<Utc>) -> Self {
        Self {
            password_reset: Some(token),
            updated_at: now,
            ..self
        }
    }

    pub fn verify_email(self, raw: &str, now: DateTime<Utc>) -> Result<Self, AccountError> {
        match &self.email_verification {
            Some(token) if token.matches(raw, now) => Ok(Self {
                is_verified: true,
                email_verification: None,
                updated_at: now,
                ..self
            }),
            _ => Err(AccountError::InvalidToken),
        }
    }

    pub fn password_reset_matches(&self, raw: &str, now: DateTime<Utc>) -> bool {
        self.password_reset
            .as_ref()
            .is_some_and(|token| token.matches(raw, now))
    }

    pub fn award_points(self, amount: u32, now: DateTime<Utc>) -> Self {
        Self {
            achievements: self.achievements.award_points(amount),
            updated_at: now,
            ..self
        }
    }

    pub fn add_badge(self, badge: Badge, now: DateTime<Utc>) -> Self {
        Self {
            achievements: self.achievements.add_badge(badge),
            updated_at: now,
            ..self
        }
    }

    pub fn apply_profile(self, update: ProfileUpdate, now: DateTime<Utc>) -> Result<Self, AccountError> {
        let mut v = Validator::new();
        if let Some(name) = &update.name {
            v.length(name.trim(), 2, 50, "Name");
        }
        v.finish()?;
        if let Some(profile) = &update.profile {
            profile.validate(now.date_naive())?;
        }

        Ok(Self {
            name: update.name.map(|n| n.trim().to_string()).unwrap_or(self.name),
            profile: update.profile.unwrap_or(self.profile),
            preferences: update.preferences.unwrap_or(self.preferences),
            settings: update.settings.unwrap_or(self.settings),
            updated_at: now,
            ..self
        })
    }

    /// `isActive: true` reactivates and lifts any earlier suspension unless
    /// the same update imposes a new one.
    pub fn apply_status(self, update: AccountStatusUpdate, now: DateTime<Utc>) -> Self {
        let (suspended_until, suspension_reason) = if update.is_active == Some(true) {
            (update.suspended_until, update.suspension_reason)
        } else {
            (
                update.suspended_until.or(self.suspended_until),
                update.suspension_reason.or(self.suspension_reason),
            )
        };
        Self {
            is_active: update.is_active.unwrap_or(self.is_active),
            role: update.role.unwrap_or(self.role),
            suspended_until,
            suspension_reason,
            updated_at: now,
            ..self
        }
    }
}

/// Partial profile patch; `None` leaves a section unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub profile: Option<Profile>,
    pub preferences: Option<Preferences>,
    pub settings: Option<Settings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatusUpdate {
    pub is_active: Option<bool>,
    pub role: Option<Role>,
    pub suspended_until: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
}

/// Serializable view of a [`User`]: no password, tokens or security state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub profile: Profile,
    pub preferences: Preferences,
    pub role: Role,
    pub is_verified: bool,
    pub achievements: Achievements,
    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PublicUser {
    /// `include_email` is for the account owner, or when the owner opted in.
    pub fn from_user(user: &User, include_email: bool) -> Self {
        let show_email = include_email || user.settings.privacy.show_email;
        let mut profile = user.profile.clone();
        if !include_email && !user.settings.privacy.show_location {
            profile.location = Location::default();
        }
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: show_email.then(|| user.email.clone()),
            profile,
            preferences: user.preferences.clone(),
            role: user.role,
            is_verified: user.is_verified,
            achievements: user.achievements.clone(),
            last_active: user.last_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavedKind {
    Favorite,
    Bookmark,
}

impl SavedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SavedKind::Favorite => "favorite",
            SavedKind::Bookmark => "bookmark",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedStyle {
    pub style_id: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub user_id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub followed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub styles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCollection {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl NewCollection {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Validator::new();
        v.length(self.name.trim(), 1, 100, "Collection name");
        if let Some(description) = &self.description {
            v.max_length(description, 500, "Collection description");
        }
        v.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Returns (raw_bearer_token, session_to_store)
    pub fn issue(
        user_id: &str,
        user_agent: Option<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> (String, Self) {
        let raw = generate_secret();
        let session = Self {
            id: uuid::Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            token_hash: digest(&raw),
            user_agent,
            created_at: now,
            last_used: now,
            expires_at: now + ttl,
        };
        (raw, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TEST_COST: u32 = 4;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, 0).unwrap()
    }

    fn account() -> NewAccount {
        NewAccount {
            name: "Amina".into(),
            email: "  Amina@Example.COM ".into(),
            password: "Secret123".into(),
        }
    }

    fn user(now: DateTime<Utc>) -> User {
        let hash = PasswordHash::from_plaintext("Secret123", TEST_COST).unwrap();
        User::new("u1".into(), &account(), hash, now)
    }

    #[test]
    fn password_is_hashed_and_verifiable() {
        let hash = PasswordHash::from_plaintext("Secret123", TEST_COST).unwrap();
        assert_ne!(hash.as_str(), "Secret123");
        assert!(hash.verify("Secret123"));
        assert!(!hash.verify("secret123"));
    }

    #[test]
    fn password_policy() {
        assert!(validate_password("Secret123").is_ok());
        assert!(validate_password("short1A").is_err());
        assert!(validate_password("alllowercase1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
    }

    #[test]
    fn new_account_normalizes_email() {
        let u = user(at(9, 0));
        assert_eq!(u.email, "amina@example.com");
        assert_eq!(u.achievements.level, 1);
        assert_eq!(u.achievements.streak.days, 1);
    }

    #[test]
    fn new_account_reports_every_problem() {
        let bad = NewAccount {
            name: "A".into(),
            email: "nope".into(),
            password: "weak".into(),
        };
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn fifth_failure_locks_for_policy_duration() {
        let policy = LockoutPolicy::default();
        let now = at(9, 0);
        let mut attempts = LoginAttempts::default();
        for _ in 0..4 {
            attempts = attempts.register_failure(&policy, now);
            assert!(!attempts.is_locked(now));
        }
        attempts = attempts.register_failure(&policy, now);
        assert_eq!(attempts.count, 5);
        assert_eq!(attempts.locked_until, Some(now + Duration::hours(2)));
        assert!(attempts.is_locked(now + Duration::minutes(119)));
        assert!(!attempts.is_locked(now + Duration::hours(2)));
    }

    #[test]
    fn failure_while_locked_does_not_extend_lock() {
        let policy = LockoutPolicy::default();
        let now = at(9, 0);
        let locked = LoginAttempts {
            count: 5,
            locked_until: Some(now + Duration::hours(1)),
        };
        let next = locked.register_failure(&policy, now);
        assert_eq!(next.count, 6);
        assert_eq!(next.locked_until, locked.locked_until);
    }

    #[test]
    fn failure_after_expired_lock_restarts_count() {
        let policy = LockoutPolicy::default();
        let now = at(12, 0);
        let expired = LoginAttempts {
            count: 5,
            locked_until: Some(now - Duration::minutes(1)),
        };
        let next = expired.register_failure(&policy, now);
        assert_eq!(next, LoginAttempts { count: 1, locked_until: None });
    }

    #[test]
    fn successful_login_clears_attempts() {
        let policy = LockoutPolicy::default();
        let now = at(9, 0);
        let u = user(now)
            .record_failed_login(&policy, now)
            .record_failed_login(&policy, now);
        assert_eq!(u.login_attempts.count, 2);
        let u = u.record_successful_login(now);
        assert_eq!(u.login_attempts, LoginAttempts::cleared());
        assert_eq!(u.login_count, 1);
    }

    #[test]
    fn sign_in_blocks() {
        let now = at(9, 0);
        let u = user(now);
        assert_eq!(u.sign_in_block(now), None);

        let suspended = User {
            suspended_until: Some(now + Duration::days(1)),
            ..u.clone()
        };
        assert_eq!(suspended.sign_in_block(now), Some(SignInBlock::Suspended));

        let inactive = User {
            is_active: false,
            ..u
        };
        assert_eq!(inactive.sign_in_block(now), Some(SignInBlock::Inactive));
    }

    #[test]
    fn reactivation_lifts_suspension() {
        let now = at(9, 0);
        let suspended = user(now).apply_status(
            AccountStatusUpdate {
                is_active: Some(false),
                suspended_until: Some(now + Duration::days(7)),
                suspension_reason: Some("Spam".into()),
                ..AccountStatusUpdate::default()
            },
            now,
        );
        assert_eq!(suspended.suspension_reason.as_deref(), Some("Spam"));

        // unrelated changes keep the suspension
        let promoted = suspended.apply_status(
            AccountStatusUpdate {
                role: Some(Role::Creator),
                ..AccountStatusUpdate::default()
            },
            now,
        );
        assert!(promoted.suspended_until.is_some());

        let restored = promoted.apply_status(
            AccountStatusUpdate {
                is_active: Some(true),
                ..AccountStatusUpdate::default()
            },
            now,
        );
        assert!(restored.is_active);
        assert_eq!(restored.suspended_until, None);
        assert_eq!(restored.suspension_reason, None);
        assert_eq!(restored.sign_in_block(now), None);
    }

    #[test]
    fn streak_same_day_unchanged() {
        let s = Streak {
            days: 3,
            last_active_date: Some(at(8, 0)),
        };
        assert_eq!(s.touch(at(20, 0)).days, 3);
    }

    #[test]
    fn streak_within_a_day_increments() {
        // previous evening, 12h earlier
        let s = Streak {
            days: 3,
            last_active_date: Some(at(0, 0) - Duration::hours(2)),
        };
        assert_eq!(s.touch(at(10, 0)).days, 4);
    }

    #[test]
    fn streak_gap_resets() {
        let s = Streak {
            days: 7,
            last_active_date: Some(at(9, 0) - Duration::hours(30)),
        };
        assert_eq!(s.touch(at(9, 0)).days, 1);
    }

    #[test]
    fn points_drive_level_which_never_drops() {
        let a = Achievements::default().award_points(250);
        assert_eq!(a.points, 250);
        assert_eq!(a.level, 3);

        let high = Achievements {
            points: 10,
            level: 9,
            ..Achievements::default()
        }
        .award_points(5);
        assert_eq!(high.level, 9);
        assert_eq!(level_for(99), 1);
        assert_eq!(level_for(100), 2);
    }

    #[test]
    fn badges_are_unique_by_name() {
        let badge = Badge {
            name: "First Review".into(),
            icon: None,
            description: None,
            earned_at: at(9, 0),
        };
        let a = Achievements::default()
            .add_badge(badge.clone())
            .add_badge(badge);
        assert_eq!(a.badges.len(), 1);
    }

    #[test]
    fn token_digest_round_trip_and_expiry() {
        let now = at(9, 0);
        let (raw, token) = TokenDigest::issue(Duration::minutes(10), now);
        assert_eq!(raw.len(), 64);
        assert_ne!(token.hash, raw);
        assert!(token.matches(&raw, now + Duration::minutes(9)));
        assert!(!token.matches(&raw, now + Duration::minutes(10)));
        assert!(!token.matches("forged", now));
    }

    #[test]
    fn verify_email_consumes_token() {
        let now = at(9, 0);
        let (raw, token) = TokenDigest::issue(Duration::hours(24), now);
        let u = user(now).with_email_verification(token, now);
        let verified = u.clone().verify_email(&raw, now).unwrap();
        assert!(verified.is_verified);
        assert!(verified.email_verification.is_none());
        assert!(matches!(
            u.verify_email("wrong", now),
            Err(AccountError::InvalidToken)
        ));
    }

    #[test]
    fn profile_validation() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let too_young = Profile {
            date_of_birth: NaiveDate::from_ymd_opt(2015, 1, 1),
            ..Profile::default()
        };
        assert!(too_young.validate(today).is_err());

        let ok = Profile {
            avatar: Some("https://cdn.example.com/me.png".into()),
            bio: Some("Hello".into()),
            date_of_birth: NaiveDate::from_ymd_opt(1995, 6, 1),
            ..Profile::default()
        };
        assert!(ok.validate(today).is_ok());
        assert_eq!(ok.age(today), Some(28));
    }

    #[test]
    fn public_user_hides_email_unless_allowed() {
        let u = user(at(9, 0));
        assert!(PublicUser::from_user(&u, false).email.is_none());
        assert_eq!(
            PublicUser::from_user(&u, true).email.as_deref(),
            Some("amina@example.com")
        );
        let json = serde_json::to_value(PublicUser::from_user(&u, true)).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("loginAttempts").is_none());
    }
}
