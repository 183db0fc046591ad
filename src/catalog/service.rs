use chrono::Utc;

use crate::accounts::User;
use crate::catalog::domain::*;
use crate::catalog::repository::DynStyleRepository;
use crate::config::CatalogConfig;
use crate::db::RepositoryError;
use crate::pagination::{Page, PageRequest};

#[derive(Clone)]
pub struct CatalogManager {
    repo: DynStyleRepository,
    config: CatalogConfig,
}

impl CatalogManager {
    pub fn new(repo: DynStyleRepository, config: CatalogConfig) -> Self {
        Self { repo, config }
    }

    pub async fn get(&self, id: &str) -> Result<Style, CatalogError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Hijab style".to_string()))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Style, CatalogError> {
        self.repo
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Hijab style".to_string()))
    }

    /// Counts a view in the background.
    pub fn increment_views(&self, id: &str) {
        let repo = self.repo.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = repo.increment_views(&id).await {
                tracing::warn!(style_id = %id, error = %e, "Failed to record style view");
            }
        });
    }

    pub async fn create(&self, creator: &User, draft: StyleDraft) -> Result<Style, CatalogError> {
        let style = Style::create(
            uuid::Uuid::now_v7().to_string(),
            draft,
            Some(creator.id.clone()),
            Utc::now(),
        )?;

        self.repo.insert(&style).await.map_err(|e| match e {
            RepositoryError::Conflict(msg) => CatalogError::Conflict(msg),
            other => other.into(),
        })?;

        tracing::info!(style_id = %style.id, slug = %style.slug, "Style created");
        Ok(style)
    }

    fn ensure_can_edit(actor: &User, style: &Style) -> Result<(), CatalogError> {
        let owns = style.created_by.as_deref() == Some(actor.id.as_str());
        if owns || actor.role.can_moderate() {
            Ok(())
        } else {
            Err(CatalogError::Forbidden(
                "Only the creator or a moderator can change this style".to_string(),
            ))
        }
    }

    pub async fn update(
        &self,
        id: &str,
        actor: &User,
        patch: StylePatch,
    ) -> Result<Style, CatalogError> {
        let actor = actor.clone();
        let now = Utc::now();
        self.repo
            .modify(
                id,
                Box::new(move |style| {
                    Self::ensure_can_edit(&actor, &style)?;
                    style.apply(patch, now)
                }),
            )
            .await
    }

    /// Soft delete.
    pub async fn archive(&self, id: &str, actor: &User) -> Result<Style, CatalogError> {
        let actor = actor.clone();
        let now = Utc::now();
        let style = self
            .repo
            .modify(
                id,
                Box::new(move |style| {
                    Self::ensure_can_edit(&actor, &style)?;
                    Ok(style.archive(now))
                }),
            )
            .await?;

        tracing::info!(style_id = %style.id, "Style archived");
        Ok(style)
    }

    pub async fn toggle_like(&self, id: &str, increment: bool) -> Result<u32, CatalogError> {
        self.repo
            .adjust_likes(id, increment)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Hijab style".to_string()))
    }

    /// Callers resolve and authorize `current` first.
    pub async fn similar(
        &self,
        current: &Style,
        limit: Option<usize>,
    ) -> Result<Vec<Style>, CatalogError> {
        let mut candidates: Vec<Style> = self
            .repo
            .find_matching(&StyleFilter::published())
            .await?
            .into_iter()
            .filter(|s| current.is_similar(s))
            .collect();

        candidates.sort_by(by_popularity);
        candidates.truncate(limit.unwrap_or(DEFAULT_SIMILAR_LIMIT));
        Ok(candidates)
    }

    /// Free-text queries rank by relevance; everything else goes through the
    /// sorted listing.
    pub async fn list(
        &self,
        filter: &StyleFilter,
        sort: StyleSort,
        page: &PageRequest,
    ) -> Result<Page<Style>, CatalogError> {
        let page = page.with_default_limit(self.config.page_size);

        match filter.search.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => self.search(query, filter, &page).await,
            _ => {
                let (styles, total) = self.repo.list(filter, sort, &page).await?;
                Ok(Page::new(styles, &page, total))
            }
        }
    }

    pub async fn search(
        &self,
        query: &str,
        filter: &StyleFilter,
        page: &PageRequest,
    ) -> Result<Page<Style>, CatalogError> {
        let terms = search_terms(query);
        let mut scored: Vec<(u32, Style)> = self
            .repo
            .find_matching(filter)
            .await?
            .into_iter()
            .map(|s| (s.relevance(&terms), s))
            .filter(|(score, _)| *score > 0)
            .collect();

        // stable sort keeps the newest-first order among equal scores
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let total = scored.len() as u64;
        let items = scored
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.limit() as usize)
            .map(|(_, s)| s)
            .collect();
        Ok(Page::new(items, page, total))
    }

    pub async fn popular(&self, limit: Option<u32>) -> Result<Vec<Style>, CatalogError> {
        Ok(self
            .repo
            .top_published(0, limit.unwrap_or(DEFAULT_POPULAR_LIMIT))
            .await?)
    }

    pub async fn featured(&self) -> Result<Vec<Style>, CatalogError> {
        Ok(self
            .repo
            .top_published(self.config.featured_min_likes, self.config.featured_limit)
            .await?)
    }

    pub async fn suggestions(&self, query: &str) -> Result<Vec<StyleSuggestion>, CatalogError> {
        let query = query.trim();
        if query.chars().count() < SUGGESTION_MIN_CHARS {
            return Ok(Vec::new());
        }
        Ok(self.repo.suggestions(query, SUGGESTION_LIMIT).await?)
    }

    pub async fn filter_options(&self) -> Result<FilterOptions, CatalogError> {
        Ok(self.repo.filter_options(FILTER_TAG_LIMIT).await?)
    }
}
