// Style Handlers - catalog browsing, authoring and likes

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::accounts::User;
use crate::catalog::{
    FilterOptions, Style, StyleDraft, StyleFilter, StylePatch, StyleSort, StyleSuggestion,
};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser, Params, Payload};
use crate::pagination::PageRequest;
use crate::reviews::{ReviewStats, ReviewView};
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::taxonomy::{Occasion, StyleStatus};

// -- Request/Response types --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub difficulty: Option<String>,
    /// Comma separated
    pub occasions: Option<String>,
    pub face_shape: Option<String>,
    pub created_by: Option<String>,
    pub sort: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct SuggestionQuery {
    pub q: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailQuery {
    pub include_reviews: Option<bool>,
}

#[derive(Deserialize, Default)]
pub struct LikeRequest {
    pub action: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDetail {
    pub hijab: Style,
    pub reviews: Vec<ReviewView>,
    pub review_stats: Option<ReviewStats>,
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub likes: u32,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hijab-styles", get(list).post(create))
        .route("/hijab-styles/popular", get(popular))
        .route("/hijab-styles/featured", get(featured))
        .route("/hijab-styles/search/suggestions", get(suggestions))
        .route("/hijab-styles/filters/options", get(filter_options))
        .route("/hijab-styles/slug/{slug}", get(detail_by_slug))
        .route(
            "/hijab-styles/{id}",
            get(detail).put(update).delete(archive),
        )
        .route("/hijab-styles/{id}/like", post(like))
        .route("/hijab-styles/{id}/similar", get(similar))
}

fn parse_param<T: FromStr<Err = String>>(raw: Option<&str>) -> AppResult<Option<T>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(AppError::BadRequest))
        .transpose()
}

fn can_see(style: &Style, viewer: Option<&User>) -> bool {
    style.is_published()
        || viewer.is_some_and(|u| {
            u.role.can_moderate() || style.created_by.as_deref() == Some(u.id.as_str())
        })
}

impl StyleQuery {
    /// Non-published listings are limited to moderators and to creators
    /// browsing their own styles.
    fn filter(&self, viewer: Option<&User>) -> AppResult<StyleFilter> {
        let requested: Option<StyleStatus> = parse_param(self.status.as_deref())?;
        let own = viewer
            .zip(self.created_by.as_deref())
            .is_some_and(|(u, creator)| u.id == creator);
        let privileged = own || viewer.is_some_and(|u| u.role.can_moderate());
        let status = match requested {
            Some(status) if privileged => status,
            Some(StyleStatus::Published) | None => StyleStatus::Published,
            Some(_) => {
                return Err(AppError::Forbidden(
                    "Only published styles are listed".to_string(),
                ))
            }
        };

        let occasions = self
            .occasions
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| s.parse().map_err(AppError::BadRequest))
                    .collect::<AppResult<Vec<Occasion>>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(StyleFilter {
            search: self.search.clone(),
            difficulty: parse_param(self.difficulty.as_deref())?,
            occasions,
            face_shape: parse_param(self.face_shape.as_deref())?,
            created_by: self.created_by.clone(),
            status: Some(status),
        })
    }
}

// -- Handlers --

/// GET /api/hijab-styles
async fn list(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Params(query): Params<StyleQuery>,
) -> AppResult<ApiResponse<Vec<Style>>> {
    let filter = query.filter(viewer.as_ref())?;
    let sort: StyleSort = parse_param(query.sort.as_deref())?.unwrap_or_default();
    let page = PageRequest {
        page: query.page,
        limit: query.limit,
    };

    let styles = state.catalog.list(&filter, sort, &page).await?;
    Ok(ApiResponse::page(styles))
}

/// GET /api/hijab-styles/{id}
/// Style with its most helpful reviews and rating stats; counts a view.
async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    viewer: MaybeUser,
    Params(query): Params<DetailQuery>,
) -> AppResult<ApiResponse<StyleDetail>> {
    let style = state.catalog.get(&id).await?;
    render_detail(state, style, viewer, query).await
}

/// GET /api/hijab-styles/slug/{slug}
async fn detail_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    viewer: MaybeUser,
    Params(query): Params<DetailQuery>,
) -> AppResult<ApiResponse<StyleDetail>> {
    let style = state.catalog.get_by_slug(&slug).await?;
    render_detail(state, style, viewer, query).await
}

async fn render_detail(
    state: AppState,
    style: Style,
    viewer: MaybeUser,
    query: DetailQuery,
) -> AppResult<ApiResponse<StyleDetail>> {
    if !can_see(&style, viewer.as_ref()) {
        return Err(AppError::NotFound("Hijab style not found".to_string()));
    }
    state.catalog.increment_views(&style.id);

    let (reviews, review_stats) = if query.include_reviews.unwrap_or(true) {
        let (reviews, stats) = tokio::try_join!(
            state.reviews.highlights(&style.id),
            state.reviews.stats(&style.id)
        )?;
        (reviews.into_iter().map(ReviewView::from).collect(), Some(stats))
    } else {
        (Vec::new(), None)
    };

    Ok(ApiResponse::ok(StyleDetail {
        hijab: style,
        reviews,
        review_stats,
    }))
}

/// POST /api/hijab-styles
async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Payload(draft): Payload<StyleDraft>,
) -> AppResult<impl IntoResponse> {
    let style = state.catalog.create(&current.user, draft).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(style, "Hijab style created successfully"),
    ))
}

/// PUT /api/hijab-styles/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
    Payload(patch): Payload<StylePatch>,
) -> AppResult<ApiResponse<Style>> {
    let style = state.catalog.update(&id, &current.user, patch).await?;
    Ok(ApiResponse::with_message(
        style,
        "Hijab style updated successfully",
    ))
}

/// DELETE /api/hijab-styles/{id}
async fn archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    state.catalog.archive(&id, &current.user).await?;
    Ok(ApiResponse::message("Hijab style deleted successfully"))
}

/// POST /api/hijab-styles/{id}/like
/// `{"action": "unlike"}` decrements; anything else likes.
async fn like(
    State(state): State<AppState>,
    Path(id): Path<String>,
    _current: CurrentUser,
    body: Bytes,
) -> AppResult<ApiResponse<LikeResponse>> {
    let req: LikeRequest = if body.is_empty() {
        LikeRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };
    let increment = req.action.as_deref() != Some("unlike");
    let likes = state.catalog.toggle_like(&id, increment).await?;
    let message = if increment { "Style liked" } else { "Style unliked" };
    Ok(ApiResponse::with_message(LikeResponse { likes }, message))
}

/// GET /api/hijab-styles/{id}/similar
async fn similar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    viewer: MaybeUser,
    Params(query): Params<LimitQuery>,
) -> AppResult<ApiResponse<Vec<Style>>> {
    let style = state.catalog.get(&id).await?;
    if !can_see(&style, viewer.as_ref()) {
        return Err(AppError::NotFound("Hijab style not found".to_string()));
    }
    let limit = query.limit.map(|l| l.clamp(1, 50) as usize);
    Ok(ApiResponse::ok(state.catalog.similar(&style, limit).await?))
}

async fn popular(
    State(state): State<AppState>,
    Params(query): Params<LimitQuery>,
) -> AppResult<ApiResponse<Vec<Style>>> {
    let limit = query.limit.map(|l| l.clamp(1, 100));
    Ok(ApiResponse::ok(state.catalog.popular(limit).await?))
}

async fn featured(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<Style>>> {
    Ok(ApiResponse::ok(state.catalog.featured().await?))
}

async fn suggestions(
    State(state): State<AppState>,
    Params(query): Params<SuggestionQuery>,
) -> AppResult<ApiResponse<Vec<StyleSuggestion>>> {
    let q = query.q.unwrap_or_default();
    Ok(ApiResponse::ok(state.catalog.suggestions(&q).await?))
}

async fn filter_options(State(state): State<AppState>) -> AppResult<ApiResponse<FilterOptions>> {
    Ok(ApiResponse::ok(state.catalog.filter_options().await?))
}
