// Catalog domain - style records and the pure rules around them
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::taxonomy::{Difficulty, FaceShape, Occasion, StyleStatus};
use crate::validation::Validator;

pub const DEFAULT_SIMILAR_LIMIT: usize = 6;
pub const DEFAULT_POPULAR_LIMIT: u32 = 10;
pub const SUGGESTION_LIMIT: u32 = 10;
pub const SUGGESTION_MIN_CHARS: usize = 2;
pub const FILTER_TAG_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum CatalogError {
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

impl From<Vec<String>> for CatalogError {
    fn from(errors: Vec<String>) -> Self {
        CatalogError::Validation(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredItem {
    pub item: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub step: u32,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub image: String,
    pub additional_images: Vec<String>,
    pub description: Option<String>,
    pub difficulty: Difficulty,
    pub occasions: Vec<Occasion>,
    #[serde(rename = "suitableFaceShapes")]
    pub face_shapes: Vec<FaceShape>,
    pub required_items: Vec<RequiredItem>,
    pub instructions: Vec<Instruction>,
    pub tags: Vec<String>,
    pub likes: u32,
    pub views: u64,
    pub created_by: Option<String>,
    pub status: StyleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleDraft {
    pub name: String,
    pub image: String,
    pub additional_images: Vec<String>,
    pub description: Option<String>,
    pub difficulty: Difficulty,
    pub occasions: Vec<Occasion>,
    #[serde(alias = "suitableFaceShapes")]
    pub face_shapes: Vec<FaceShape>,
    pub required_items: Vec<RequiredItem>,
    pub instructions: Vec<Instruction>,
    pub tags: Vec<String>,
    pub status: Option<StyleStatus>,
}

/// Partial update; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StylePatch {
    pub name: Option<String>,
    pub image: Option<String>,
    pub additional_images: Option<Vec<String>>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub occasions: Option<Vec<Occasion>>,
    #[serde(alias = "suitableFaceShapes")]
    pub face_shapes: Option<Vec<FaceShape>>,
    pub required_items: Option<Vec<RequiredItem>>,
    pub instructions: Option<Vec<Instruction>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<StyleStatus>,
}

/// Lowercase, collapse every run of non-alphanumerics into one hyphen, trim
/// hyphens at both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Trimmed, lowercased, first occurrence wins.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

pub fn toggle_like(likes: u32, increment: bool) -> u32 {
    if increment {
        likes.saturating_add(1)
    } else {
        likes.saturating_sub(1)
    }
}

fn overlaps<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.iter().any(|x| b.contains(x))
}

impl Style {
    pub fn create(
        id: String,
        draft: StyleDraft,
        created_by: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        let mut instructions = draft.instructions;
        instructions.sort_by_key(|i| i.step);

        let style = Self {
            id,
            slug: slugify(&draft.name),
            name: draft.name.trim().to_string(),
            image: draft.image.trim().to_string(),
            additional_images: draft.additional_images,
            description: draft.description.map(|d| d.trim().to_string()),
            difficulty: draft.difficulty,
            occasions: draft.occasions,
            face_shapes: draft.face_shapes,
            required_items: draft.required_items,
            instructions,
            tags: normalize_tags(draft.tags),
            likes: 0,
            views: 0,
            created_by,
            status: draft.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        style.validate()?;
        Ok(style)
    }

    /// Applies a patch; the slug follows the name only when the name changed.
    pub fn apply(self, patch: StylePatch, now: DateTime<Utc>) -> Result<Self, CatalogError> {
        let (name, slug) = match patch.name {
            Some(name) if name.trim() != self.name => {
                let slug = slugify(&name);
                (name.trim().to_string(), slug)
            }
            _ => (self.name, self.slug),
        };
        let mut instructions = patch.instructions.unwrap_or(self.instructions);
        instructions.sort_by_key(|i| i.step);

        let style = Self {
            name,
            slug,
            image: patch.image.map(|i| i.trim().to_string()).unwrap_or(self.image),
            additional_images: patch.additional_images.unwrap_or(self.additional_images),
            description: patch
                .description
                .map(|d| d.trim().to_string())
                .or(self.description),
            difficulty: patch.difficulty.unwrap_or(self.difficulty),
            occasions: patch.occasions.unwrap_or(self.occasions),
            face_shapes: patch.face_shapes.unwrap_or(self.face_shapes),
            required_items: patch.required_items.unwrap_or(self.required_items),
            instructions,
            tags: patch.tags.map(normalize_tags).unwrap_or(self.tags),
            status: patch.status.unwrap_or(self.status),
            updated_at: now,
            ..self
        };
        style.validate()?;
        Ok(style)
    }

    pub fn archive(self, now: DateTime<Utc>) -> Self {
        Self {
            status: StyleStatus::Archived,
            updated_at: now,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut v = Validator::new();
        v.check(!self.name.is_empty(), "Style name is required")
            .max_length(&self.name, 100, "Name")
            .check(
                self.name.is_empty() || !self.slug.is_empty(),
                "Name must contain at least one letter or digit",
            )
            .image_url(&self.image, "Image");

        for image in &self.additional_images {
            v.image_url(image, "Additional image");
        }
        if let Some(description) = &self.description {
            v.max_length(description, 500, "Description");
        }
        for item in &self.required_items {
            v.check(!item.item.trim().is_empty(), "Required item name is required")
                .check(item.quantity >= 1, "Required item quantity must be at least 1");
        }
        for step in &self.instructions {
            v.check(
                !step.description.trim().is_empty(),
                format!("Instruction step {} needs a description", step.step),
            );
            if let Some(image) = &step.image {
                v.image_url(image, "Instruction image");
            }
        }
        v.finish()
    }

    pub fn is_published(&self) -> bool {
        self.status == StyleStatus::Published
    }

    /// Shares a difficulty, occasion, tag or face shape with `other`.
    pub fn is_similar(&self, other: &Style) -> bool {
        self.id != other.id
            && (self.difficulty == other.difficulty
                || overlaps(&self.occasions, &other.occasions)
                || overlaps(&self.tags, &other.tags)
                || overlaps(&self.face_shapes, &other.face_shapes))
    }

    /// Weighted term hits: name 3, tag 2, description 1. Zero means no match.
    pub fn relevance(&self, terms: &[String]) -> u32 {
        let name = self.name.to_lowercase();
        let description = self
            .description
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();

        terms
            .iter()
            .map(|term| {
                let mut score = 0;
                if name.contains(term.as_str()) {
                    score += 3;
                }
                if self.tags.iter().any(|t| t.contains(term.as_str())) {
                    score += 2;
                }
                if description.contains(term.as_str()) {
                    score += 1;
                }
                score
            })
            .sum()
    }
}

/// Popularity order shared by popular, featured and similar listings.
pub fn by_popularity(a: &Style, b: &Style) -> std::cmp::Ordering {
    b.likes.cmp(&a.likes).then(b.views.cmp(&a.views))
}

pub fn search_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// ANDed list filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleFilter {
    pub search: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// Matches when any listed occasion is present
    pub occasions: Vec<Occasion>,
    pub face_shape: Option<FaceShape>,
    pub created_by: Option<String>,
    pub status: Option<StyleStatus>,
}

impl StyleFilter {
    pub fn published() -> Self {
        Self {
            status: Some(StyleStatus::Published),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StyleSort {
    #[default]
    Newest,
    Oldest,
    Popular,
    Name,
    Difficulty,
}

impl FromStr for StyleSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(StyleSort::Newest),
            "oldest" => Ok(StyleSort::Oldest),
            "popular" => Ok(StyleSort::Popular),
            "name" => Ok(StyleSort::Name),
            "difficulty" => Ok(StyleSort::Difficulty),
            other => Err(format!("Unknown sort: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleSuggestion {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub difficulties: Vec<Difficulty>,
    pub occasions: Vec<Occasion>,
    pub face_shapes: Vec<FaceShape>,
    pub tags: Vec<String>,
}
