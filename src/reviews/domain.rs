// Review domain - content rules, voting, flagging and moderation transitions
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::validation::{is_half_step_rating, Validator};

pub const DEFAULT_HELPFUL_LIMIT: u32 = 10;
pub const TOP_REVIEWS_ON_STYLE: u32 = 5;
pub const FIRST_REVIEW_BADGE: &str = "First Review";

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<Vec<String>> for ReviewError {
    fn from(errors: Vec<String>) -> Self {
        ReviewError::Validation(errors)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReviewStatus {
    #[default]
    Published,
    Pending,
    Flagged,
    Hidden,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Published => "Published",
            ReviewStatus::Pending => "Pending",
            ReviewStatus::Flagged => "Flagged",
            ReviewStatus::Hidden => "Hidden",
        }
    }

    /// Moderator-driven moves. Flagging itself goes through [`Review::flag`].
    pub fn can_moderate_to(&self, target: ReviewStatus) -> bool {
        use ReviewStatus::*;
        match (self, target) {
            (from, to) if *from == to => true,
            (_, Published) => true,
            (Published | Pending | Flagged, Hidden) => true,
            (Published | Pending, Flagged) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Published" => Ok(ReviewStatus::Published),
            "Pending" => Ok(ReviewStatus::Pending),
            "Flagged" => Ok(ReviewStatus::Flagged),
            "Hidden" => Ok(ReviewStatus::Hidden),
            other => Err(format!("Unknown review status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetailedRating {
    pub ease_of_following: Option<f64>,
    pub style_appearance: Option<f64>,
    pub instruction_clarity: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    #[serde(rename = "Much Easier")]
    MuchEasier,
    Easier,
    #[serde(rename = "As Expected")]
    AsExpected,
    Harder,
    #[serde(rename = "Much Harder")]
    MuchHarder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserExperience {
    pub difficulty_level: Option<ExperienceLevel>,
    /// Minutes
    pub time_spent: Option<u32>,
    pub would_recommend: bool,
}

impl Default for UserExperience {
    fn default() -> Self {
        Self {
            difficulty_level: None,
            time_spent: None,
            would_recommend: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Helpful,
    Unhelpful,
}

impl VoteKind {
    /// Anything but "helpful"/"unhelpful" yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "helpful" => Some(VoteKind::Helpful),
            "unhelpful" => Some(VoteKind::Unhelpful),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    pub user_id: String,
    pub vote: VoteKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagReason {
    Spam,
    Inappropriate,
    Fake,
    Offensive,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagReport {
    pub reported_by: String,
    pub reason: FlagReason,
    pub description: Option<String>,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorResponse {
    pub text: String,
    pub responded_by: String,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRecord {
    pub edited_at: DateTime<Utc>,
    pub previous_text: String,
    pub previous_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub style_id: String,
    pub user_id: String,
    pub text: String,
    pub rating: f64,
    pub detailed_rating: Option<DetailedRating>,
    pub title: Option<String>,
    pub user_experience: Option<UserExperience>,
    pub images: Vec<ReviewImage>,
    pub helpful_votes: u32,
    pub unhelpful_votes: u32,
    pub voters: Vec<Voter>,
    pub status: ReviewStatus,
    #[serde(skip_serializing)]
    pub flag_reports: Vec<FlagReport>,
    pub creator_response: Option<CreatorResponse>,
    pub is_verified: bool,
    pub edit_history: Vec<EditRecord>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submission payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDraft {
    pub text: String,
    pub rating: f64,
    #[serde(default)]
    pub detailed_rating: Option<DetailedRating>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub user_experience: Option<UserExperience>,
    #[serde(default)]
    pub images: Vec<ReviewImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReviewPatch {
    pub text: Option<String>,
    pub rating: Option<f64>,
    pub detailed_rating: Option<DetailedRating>,
    pub title: Option<String>,
    pub user_experience: Option<UserExperience>,
    pub images: Option<Vec<ReviewImage>>,
}

fn validate_content(
    text: &str,
    rating: f64,
    detailed: Option<&DetailedRating>,
    title: Option<&str>,
    experience: Option<&UserExperience>,
    images: &[ReviewImage],
) -> Result<(), Vec<String>> {
    let mut v = Validator::new();
    v.length(text, 10, 1000, "Review text").check(
        is_half_step_rating(rating),
        "Rating must be between 1 and 5 in increments of 0.5",
    );

    if let Some(d) = detailed {
        for (value, field) in [
            (d.ease_of_following, "Ease of following"),
            (d.style_appearance, "Style appearance"),
            (d.instruction_clarity, "Instruction clarity"),
        ] {
            if let Some(value) = value {
                v.check(
                    is_half_step_rating(value),
                    format!("{} rating must be between 1 and 5 in increments of 0.5", field),
                );
            }
        }
    }
    if let Some(title) = title {
        v.max_length(title, 100, "Review title");
    }
    if let Some(minutes) = experience.and_then(|e| e.time_spent) {
        v.check(
            (1..=240).contains(&minutes),
            "Time spent must be between 1 and 240 minutes",
        );
    }
    for image in images {
        v.image_url(&image.url, "Review image");
        if let Some(caption) = &image.caption {
            v.max_length(caption, 200, "Image caption");
        }
    }
    v.finish()
}

impl ReviewDraft {
    pub fn normalized(self) -> Self {
        Self {
            text: self.text.trim().to_string(),
            title: self.title.map(|t| t.trim().to_string()),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        validate_content(
            &self.text,
            self.rating,
            self.detailed_rating.as_ref(),
            self.title.as_deref(),
            self.user_experience.as_ref(),
            &self.images,
        )
    }
}

fn push_history(history: &mut Vec<EditRecord>, record: EditRecord, limit: usize) {
    history.push(record);
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}

impl Review {
    pub fn new(
        id: String,
        style_id: &str,
        user_id: &str,
        draft: ReviewDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        let draft = draft.normalized();
        draft.validate()?;

        Ok(Self {
            id,
            style_id: style_id.to_string(),
            user_id: user_id.to_string(),
            text: draft.text,
            rating: draft.rating,
            detailed_rating: draft.detailed_rating,
            title: draft.title,
            user_experience: draft.user_experience,
            images: draft.images,
            helpful_votes: 0,
            unhelpful_votes: 0,
            voters: Vec::new(),
            status: ReviewStatus::Published,
            flag_reports: Vec::new(),
            creator_response: None,
            is_verified: false,
            edit_history: Vec::new(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Deleted reviews behave as if they did not exist.
    pub fn live(self) -> Result<Self, ReviewError> {
        if self.is_deleted() {
            Err(ReviewError::NotFound("Review".to_string()))
        } else {
            Ok(self)
        }
    }

    pub fn is_author(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Live and, outside Published, limited to the author and moderators.
    pub fn visible_to(self, viewer_id: Option<&str>, moderator: bool) -> Result<Self, ReviewError> {
        let review = self.live()?;
        let privileged = moderator || viewer_id.is_some_and(|id| review.is_author(id));
        if review.status != ReviewStatus::Published && !privileged {
            return Err(ReviewError::NotFound("Review".to_string()));
        }
        Ok(review)
    }

    fn record_edit(&mut self, limit: usize, now: DateTime<Utc>) {
        let record = EditRecord {
            edited_at: now,
            previous_text: self.text.clone(),
            previous_rating: self.rating,
        };
        push_history(&mut self.edit_history, record, limit);
    }

    /// Content edit; a text or rating change snapshots the prior values first.
    pub fn apply_edit(
        mut self,
        patch: ReviewPatch,
        history_limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        let text = patch
            .text
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| self.text.clone());
        let rating = patch.rating.unwrap_or(self.rating);
        let detailed_rating = patch.detailed_rating.or(self.detailed_rating);
        let title = patch.title.map(|t| t.trim().to_string()).or(self.title.take());
        let user_experience = patch.user_experience.or(self.user_experience.take());
        let images = patch.images.unwrap_or_else(|| std::mem::take(&mut self.images));

        validate_content(
            &text,
            rating,
            detailed_rating.as_ref(),
            title.as_deref(),
            user_experience.as_ref(),
            &images,
        )?;

        if text != self.text || rating != self.rating {
            self.record_edit(history_limit, now);
        }

        Ok(Self {
            text,
            rating,
            detailed_rating,
            title,
            user_experience,
            images,
            updated_at: now,
            ..self
        })
    }

    /// Resubmission over a soft-deleted record: new content, prior content in
    /// history, votes and reports kept.
    pub fn revive(
        mut self,
        draft: ReviewDraft,
        history_limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        let draft = draft.normalized();
        draft.validate()?;
        self.record_edit(history_limit, now);

        Ok(Self {
            text: draft.text,
            rating: draft.rating,
            detailed_rating: draft.detailed_rating,
            title: draft.title,
            user_experience: draft.user_experience,
            images: draft.images,
            status: ReviewStatus::Published,
            deleted_at: None,
            updated_at: now,
            ..self
        })
    }

    pub fn soft_delete(self, now: DateTime<Utc>) -> Self {
        Self {
            deleted_at: Some(now),
            updated_at: now,
            ..self
        }
    }

    pub fn vote_of(&self, user_id: &str) -> Option<VoteKind> {
        self.voters
            .iter()
            .find(|v| v.user_id == user_id)
            .map(|v| v.vote)
    }

    /// Replaces the voter's previous vote, if any.
    pub fn vote(self, user_id: &str, kind: VoteKind, now: DateTime<Utc>) -> Self {
        let mut review = self.remove_vote(user_id, now);
        match kind {
            VoteKind::Helpful => review.helpful_votes = review.helpful_votes.saturating_add(1),
            VoteKind::Unhelpful => {
                review.unhelpful_votes = review.unhelpful_votes.saturating_add(1)
            }
        }
        review.voters.push(Voter {
            user_id: user_id.to_string(),
            vote: kind,
        });
        review
    }

    pub fn remove_vote(mut self, user_id: &str, now: DateTime<Utc>) -> Self {
        let Some(previous) = self.vote_of(user_id) else {
            return self;
        };
        match previous {
            VoteKind::Helpful => self.helpful_votes = self.helpful_votes.saturating_sub(1),
            VoteKind::Unhelpful => self.unhelpful_votes = self.unhelpful_votes.saturating_sub(1),
        }
        self.voters.retain(|v| v.user_id != user_id);
        self.updated_at = now;
        self
    }

    /// Adds a report; reaching `threshold` moves a Published or Pending review
    /// to Flagged. Moderated states are left alone.
    pub fn flag(
        mut self,
        reporter_id: &str,
        reason: FlagReason,
        description: Option<String>,
        threshold: usize,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        if self.flag_reports.iter().any(|r| r.reported_by == reporter_id) {
            return Err(ReviewError::Conflict(
                "You have already reported this review".to_string(),
            ));
        }
        if let Some(d) = &description {
            let mut v = Validator::new();
            v.max_length(d, 500, "Report description").finish()?;
        }

        self.flag_reports.push(FlagReport {
            reported_by: reporter_id.to_string(),
            reason,
            description,
            reported_at: now,
        });

        if self.flag_reports.len() >= threshold
            && matches!(self.status, ReviewStatus::Published | ReviewStatus::Pending)
        {
            self.status = ReviewStatus::Flagged;
        }
        self.updated_at = now;
        Ok(self)
    }

    pub fn respond(
        self,
        responder_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        let text = text.trim();
        let mut v = Validator::new();
        v.length(text, 1, 500, "Response").finish()?;

        Ok(Self {
            creator_response: Some(CreatorResponse {
                text: text.to_string(),
                responded_by: responder_id.to_string(),
                responded_at: now,
            }),
            updated_at: now,
            ..self
        })
    }

    /// `None` when the move is not allowed from the current status.
    pub fn moderate(self, target: ReviewStatus, now: DateTime<Utc>) -> Option<Self> {
        if !self.status.can_moderate_to(target) {
            return None;
        }
        Some(Self {
            status: target,
            updated_at: now,
            ..self
        })
    }

    pub fn helpfulness_score(&self) -> i64 {
        i64::from(self.helpful_votes) - i64::from(self.unhelpful_votes)
    }

    /// Percentage of helpful votes, one decimal; 0 without votes.
    pub fn helpfulness_ratio(&self) -> f64 {
        let total = self.helpful_votes + self.unhelpful_votes;
        if total == 0 {
            return 0.0;
        }
        round1(f64::from(self.helpful_votes) / f64::from(total) * 100.0)
    }

    pub fn would_recommend(&self) -> bool {
        self.user_experience
            .as_ref()
            .map_or(true, |e| e.would_recommend)
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Serialized form of a review with its derived helpfulness figures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub helpfulness_score: i64,
    pub helpfulness_ratio: f64,
    pub flag_count: usize,
}

impl From<Review> for ReviewView {
    fn from(review: Review) -> Self {
        Self {
            helpfulness_score: review.helpfulness_score(),
            helpfulness_ratio: review.helpfulness_ratio(),
            flag_count: review.flag_reports.len(),
            review,
        }
    }
}

/// The two facts stats need from each published review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSample {
    pub rating: f64,
    pub would_recommend: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub average_rating: f64,
    pub total_reviews: u64,
    pub recommendation_rate: f64,
    /// Integer bucket 1..=5; half ratings count toward the lower bucket
    pub rating_breakdown: BTreeMap<u8, u64>,
}

impl ReviewStats {
    pub fn compute(samples: &[RatingSample]) -> Self {
        let mut breakdown: BTreeMap<u8, u64> = (1..=5).map(|b| (b, 0)).collect();
        if samples.is_empty() {
            return Self {
                average_rating: 0.0,
                total_reviews: 0,
                recommendation_rate: 0.0,
                rating_breakdown: breakdown,
            };
        }

        let count = samples.len() as f64;
        let sum: f64 = samples.iter().map(|s| s.rating).sum();
        let recommending = samples.iter().filter(|s| s.would_recommend).count() as f64;

        for sample in samples {
            let bucket = sample.rating.floor().clamp(1.0, 5.0) as u8;
            *breakdown.entry(bucket).or_default() += 1;
        }

        Self {
            average_rating: round1(sum / count),
            total_reviews: samples.len() as u64,
            recommendation_rate: round1(recommending / count * 100.0),
            rating_breakdown: breakdown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewSort {
    #[default]
    Newest,
    Oldest,
    Highest,
    Lowest,
    Helpful,
}

impl FromStr for ReviewSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(ReviewSort::Newest),
            "oldest" => Ok(ReviewSort::Oldest),
            "highest" => Ok(ReviewSort::Highest),
            "lowest" => Ok(ReviewSort::Lowest),
            "helpful" => Ok(ReviewSort::Helpful),
            other => Err(format!("Unknown sort: {}", other)),
        }
    }
}

/// Published-review search; every present criterion must hold.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSearch {
    pub q: Option<String>,
    pub style_id: Option<String>,
    pub user_id: Option<String>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEligibility {
    pub can_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_review_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    fn draft(text: &str, rating: f64) -> ReviewDraft {
        ReviewDraft {
            text: text.to_string(),
            rating,
            ..ReviewDraft::default()
        }
    }

    fn review() -> Review {
        Review::new(
            "r1".into(),
            "s1",
            "author",
            draft("Lovely and easy to follow", 4.0),
            at(0),
        )
        .unwrap()
    }

    #[test]
    fn content_validation() {
        let short = Review::new("r".into(), "s", "u", draft("too short", 4.0), at(0));
        assert!(matches!(short, Err(ReviewError::Validation(_))));

        for rating in [0.5, 5.5, 3.3] {
            let bad = Review::new("r".into(), "s", "u", draft("long enough text", rating), at(0));
            assert!(bad.is_err(), "rating {rating} accepted");
        }

        let with_extras = ReviewDraft {
            title: Some("t".repeat(101)),
            user_experience: Some(UserExperience {
                time_spent: Some(300),
                ..UserExperience::default()
            }),
            images: vec![ReviewImage {
                url: "https://x.example.com/a.png".into(),
                caption: Some("c".repeat(201)),
            }],
            detailed_rating: Some(DetailedRating {
                ease_of_following: Some(4.5),
                style_appearance: Some(6.0),
                instruction_clarity: None,
            }),
            ..draft("long enough text", 4.5)
        };
        match with_extras.validate() {
            Err(errors) => assert_eq!(errors.len(), 4),
            Ok(()) => panic!("expected validation errors"),
        }
    }

    #[test]
    fn edit_appends_one_history_entry_per_content_change() {
        let r = review();
        let edited = r
            .apply_edit(
                ReviewPatch {
                    rating: Some(3.5),
                    ..ReviewPatch::default()
                },
                50,
                at(1),
            )
            .unwrap();
        assert_eq!(edited.edit_history.len(), 1);
        assert_eq!(edited.edit_history[0].previous_rating, 4.0);
        assert_eq!(edited.edit_history[0].previous_text, "Lovely and easy to follow");

        // title-only edit leaves history alone
        let titled = edited
            .apply_edit(
                ReviewPatch {
                    title: Some("Great".into()),
                    ..ReviewPatch::default()
                },
                50,
                at(2),
            )
            .unwrap();
        assert_eq!(titled.edit_history.len(), 1);
        assert_eq!(titled.title.as_deref(), Some("Great"));
    }

    #[test]
    fn history_is_bounded_oldest_first_out() {
        let mut r = review();
        for i in 0..5 {
            r = r
                .apply_edit(
                    ReviewPatch {
                        text: Some(format!("Revision number {i} of the text")),
                        ..ReviewPatch::default()
                    },
                    3,
                    at(i + 1),
                )
                .unwrap();
        }
        assert_eq!(r.edit_history.len(), 3);
        assert_eq!(r.edit_history[0].previous_text, "Revision number 1 of the text");
    }

    #[test]
    fn helpful_then_unhelpful_leaves_one_vote() {
        let r = review()
            .vote("voter", VoteKind::Helpful, at(1))
            .vote("voter", VoteKind::Unhelpful, at(2));
        assert_eq!(r.helpful_votes, 0);
        assert_eq!(r.unhelpful_votes, 1);
        assert_eq!(r.voters.len(), 1);
        assert_eq!(r.vote_of("voter"), Some(VoteKind::Unhelpful));
    }

    #[test]
    fn remove_vote_without_vote_is_noop() {
        let r = review();
        let same = r.clone().remove_vote("stranger", at(1));
        assert_eq!(same, r);

        let voted = r.vote("voter", VoteKind::Helpful, at(1));
        let cleared = voted.remove_vote("voter", at(2));
        assert_eq!(cleared.helpful_votes, 0);
        assert!(cleared.voters.is_empty());
    }

    #[test]
    fn vote_kind_parsing() {
        assert_eq!(VoteKind::parse("helpful"), Some(VoteKind::Helpful));
        assert_eq!(VoteKind::parse("unhelpful"), Some(VoteKind::Unhelpful));
        assert_eq!(VoteKind::parse("love"), None);
    }

    #[test]
    fn third_report_flags_and_fourth_keeps_it() {
        let mut r = review();
        for (i, reporter) in ["a", "b"].iter().enumerate() {
            r = r.flag(reporter, FlagReason::Spam, None, 3, at(i as u32)).unwrap();
            assert_eq!(r.status, ReviewStatus::Published);
        }
        r = r.flag("c", FlagReason::Fake, None, 3, at(3)).unwrap();
        assert_eq!(r.status, ReviewStatus::Flagged);

        r = r.flag("d", FlagReason::Other, None, 3, at(4)).unwrap();
        assert_eq!(r.status, ReviewStatus::Flagged);
        assert_eq!(r.flag_reports.len(), 4);
    }

    #[test]
    fn reports_do_not_override_moderation() {
        let hidden = Review {
            status: ReviewStatus::Hidden,
            ..review()
        };
        let mut r = hidden;
        for reporter in ["a", "b", "c"] {
            r = r.flag(reporter, FlagReason::Spam, None, 3, at(1)).unwrap();
        }
        assert_eq!(r.status, ReviewStatus::Hidden);
    }

    #[test]
    fn same_reporter_twice_is_conflict() {
        let r = review().flag("a", FlagReason::Spam, None, 3, at(1)).unwrap();
        assert!(matches!(
            r.flag("a", FlagReason::Spam, None, 3, at(2)),
            Err(ReviewError::Conflict(_))
        ));
    }

    #[test]
    fn moderation_transitions() {
        use ReviewStatus::*;
        assert!(Published.can_moderate_to(Hidden));
        assert!(Flagged.can_moderate_to(Hidden));
        assert!(Hidden.can_moderate_to(Published));
        assert!(Flagged.can_moderate_to(Published));
        assert!(Pending.can_moderate_to(Published));
        assert!(!Hidden.can_moderate_to(Flagged));
        assert!(!Flagged.can_moderate_to(Pending));
        assert!(review().moderate(Pending, at(1)).is_none());
    }

    #[test]
    fn revive_restores_and_records_history() {
        let r = review()
            .vote("v", VoteKind::Helpful, at(1))
            .soft_delete(at(2));
        assert!(r.clone().live().is_err());

        let revived = r
            .revive(draft("Trying it again, still great", 5.0), 50, at(3))
            .unwrap();
        assert!(!revived.is_deleted());
        assert_eq!(revived.status, ReviewStatus::Published);
        assert_eq!(revived.helpful_votes, 1);
        assert_eq!(revived.edit_history.len(), 1);
        assert_eq!(revived.rating, 5.0);
    }

    #[test]
    fn creator_response_length() {
        assert!(review().respond("creator", "", at(1)).is_err());
        assert!(review().respond("creator", &"x".repeat(501), at(1)).is_err());
        let r = review().respond("creator", " Thank you! ", at(1)).unwrap();
        assert_eq!(r.creator_response.unwrap().text, "Thank you!");
    }

    #[test]
    fn helpfulness_figures() {
        let mut r = review();
        assert_eq!(r.helpfulness_ratio(), 0.0);
        r.helpful_votes = 2;
        r.unhelpful_votes = 1;
        assert_eq!(r.helpfulness_score(), 1);
        assert_eq!(r.helpfulness_ratio(), 66.7);

        let view = serde_json::to_value(ReviewView::from(r)).unwrap();
        assert_eq!(view["helpfulnessScore"], 1);
        assert!(view.get("flagReports").is_none());
        assert!(view.get("deletedAt").is_none());
    }

    #[test]
    fn stats_example() {
        let samples: Vec<RatingSample> = [5.0, 5.0, 4.0, 3.0]
            .into_iter()
            .map(|rating| RatingSample {
                rating,
                would_recommend: rating >= 4.0,
            })
            .collect();
        let stats = ReviewStats::compute(&samples);
        assert_eq!(stats.average_rating, 4.3);
        assert_eq!(stats.total_reviews, 4);
        assert_eq!(stats.recommendation_rate, 75.0);
        assert_eq!(
            stats.rating_breakdown,
            BTreeMap::from([(1, 0), (2, 0), (3, 1), (4, 1), (5, 2)])
        );
    }

    #[test]
    fn half_ratings_fall_into_lower_bucket() {
        let stats = ReviewStats::compute(&[RatingSample {
            rating: 3.5,
            would_recommend: true,
        }]);
        assert_eq!(stats.rating_breakdown[&3], 1);
        assert_eq!(stats.average_rating, 3.5);
    }

    #[test]
    fn empty_stats_are_zeroed() {
        let stats = ReviewStats::compute(&[]);
        assert_eq!(stats.total_reviews, 0);
        assert_eq!(stats.average_rating, 0.0);
        assert_eq!(stats.rating_breakdown.len(), 5);
    }
}
