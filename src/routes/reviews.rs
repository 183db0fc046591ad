// Review Handlers - submission, voting, reporting and moderation

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser, Params, Payload};
use crate::pagination::PageRequest;
use crate::reviews::{
    FlagReason, ReviewDraft, ReviewEligibility, ReviewPatch, ReviewSearch, ReviewSort,
    ReviewStats, ReviewStatus, ReviewView,
};
use crate::routes::ApiResponse;
use crate::state::AppState;

// -- Request/Response types --

#[derive(Deserialize)]
pub struct StyleReviewsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: Option<String>,
    pub style_id: Option<String>,
    pub user_id: Option<String>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub vote: String,
}

#[derive(Deserialize)]
pub struct FlagRequest {
    pub reason: FlagReason,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct ResponseRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct StatusChange {
    pub status: ReviewStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    pub review_ids: Vec<String>,
    pub update_data: StatusChange,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    pub review_ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResponse {
    pub modified_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResponse {
    pub deleted_count: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reviews/helpful", get(helpful))
        .route("/reviews/search", get(search))
        .route("/reviews/bulk-update", put(bulk_update))
        .route("/reviews/bulk-delete", delete(bulk_delete))
        .route("/reviews/user/{user_id}", get(for_user))
        .route("/reviews/single/{id}", get(single))
        .route("/reviews/can-review/{style_id}", get(can_review))
        .route("/reviews/stats/{style_id}", get(stats))
        // `{id}` is the style for GET/POST and the review for PUT/DELETE
        .route(
            "/reviews/{id}",
            get(for_style).post(submit).put(update).delete(remove),
        )
        .route("/reviews/{id}/vote", post(vote).delete(remove_vote))
        .route("/reviews/{id}/flag", post(flag))
        .route("/reviews/{id}/response", post(respond))
}

fn parse<T: std::str::FromStr<Err = String>>(raw: Option<&str>) -> AppResult<Option<T>> {
    raw.map(|s| s.parse().map_err(AppError::BadRequest)).transpose()
}

// -- Listings --

/// GET /api/reviews/{style_id}
async fn for_style(
    State(state): State<AppState>,
    Path(style_id): Path<String>,
    viewer: MaybeUser,
    Params(query): Params<StyleReviewsQuery>,
) -> AppResult<ApiResponse<Vec<ReviewView>>> {
    let sort: ReviewSort = parse(query.sort.as_deref())?.unwrap_or_default();
    let status: ReviewStatus = parse(query.status.as_deref())?.unwrap_or_default();
    let moderator = viewer.as_ref().is_some_and(|u| u.role.can_moderate());
    if status != ReviewStatus::Published && !moderator {
        return Err(AppError::Forbidden(
            "Moderator access required".to_string(),
        ));
    }

    let page = PageRequest {
        page: query.page,
        limit: query.limit,
    };
    let reviews = state
        .reviews
        .for_style(&style_id, sort, status, &page)
        .await?;
    Ok(ApiResponse::page(reviews.map(ReviewView::from)))
}

/// GET /api/reviews/user/{user_id}
async fn for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    viewer: MaybeUser,
    Params(page): Params<PageRequest>,
) -> AppResult<ApiResponse<Vec<ReviewView>>> {
    let reviews = state
        .reviews
        .for_user(&user_id, viewer.as_ref(), &page)
        .await?;
    Ok(ApiResponse::page(reviews.map(ReviewView::from)))
}

/// GET /api/reviews/helpful
async fn helpful(
    State(state): State<AppState>,
    Params(query): Params<LimitQuery>,
) -> AppResult<ApiResponse<Vec<ReviewView>>> {
    let reviews = state.reviews.most_helpful(query.limit).await?;
    Ok(ApiResponse::ok(
        reviews.into_iter().map(ReviewView::from).collect(),
    ))
}

/// GET /api/reviews/search
async fn search(
    State(state): State<AppState>,
    Params(query): Params<SearchQuery>,
) -> AppResult<ApiResponse<Vec<ReviewView>>> {
    let criteria = ReviewSearch {
        q: query.q,
        style_id: query.style_id,
        user_id: query.user_id,
        min_rating: query.min_rating,
        max_rating: query.max_rating,
    };
    let page = PageRequest {
        page: query.page,
        limit: query.limit,
    };
    let reviews = state.reviews.search(&criteria, &page).await?;
    Ok(ApiResponse::page(reviews.map(ReviewView::from)))
}

/// GET /api/reviews/single/{id}
async fn single(
    State(state): State<AppState>,
    Path(id): Path<String>,
    viewer: MaybeUser,
) -> AppResult<ApiResponse<ReviewView>> {
    let review = state.reviews.get(&id, viewer.as_ref()).await?;
    Ok(ApiResponse::ok(review.into()))
}

/// GET /api/reviews/stats/{style_id}
async fn stats(
    State(state): State<AppState>,
    Path(style_id): Path<String>,
) -> AppResult<ApiResponse<ReviewStats>> {
    Ok(ApiResponse::ok(state.reviews.stats(&style_id).await?))
}

/// GET /api/reviews/can-review/{style_id}
async fn can_review(
    State(state): State<AppState>,
    Path(style_id): Path<String>,
    current: CurrentUser,
) -> AppResult<ApiResponse<ReviewEligibility>> {
    let eligibility = state
        .reviews
        .can_review(&style_id, &current.user.id)
        .await?;
    Ok(ApiResponse::ok(eligibility))
}

// -- Authoring --

/// POST /api/reviews/{style_id}
async fn submit(
    State(state): State<AppState>,
    Path(style_id): Path<String>,
    current: CurrentUser,
    Payload(draft): Payload<ReviewDraft>,
) -> AppResult<impl IntoResponse> {
    let review = state
        .reviews
        .submit(&style_id, &current.user, draft)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(ReviewView::from(review), "Review submitted successfully"),
    ))
}

/// PUT /api/reviews/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
    Payload(patch): Payload<ReviewPatch>,
) -> AppResult<ApiResponse<ReviewView>> {
    let review = state.reviews.update(&id, &current.user, patch).await?;
    Ok(ApiResponse::with_message(
        review.into(),
        "Review updated successfully",
    ))
}

/// DELETE /api/reviews/{id}
async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    state.reviews.delete(&id, &current.user).await?;
    Ok(ApiResponse::message("Review deleted successfully"))
}

// -- Feedback --

/// POST /api/reviews/{id}/vote
async fn vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
    Payload(req): Payload<VoteRequest>,
) -> AppResult<ApiResponse<ReviewView>> {
    let review = state.reviews.vote(&id, &current.user, &req.vote).await?;
    Ok(ApiResponse::ok(review.into()))
}

/// DELETE /api/reviews/{id}/vote
async fn remove_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
) -> AppResult<ApiResponse<ReviewView>> {
    let review = state.reviews.remove_vote(&id, &current.user).await?;
    Ok(ApiResponse::ok(review.into()))
}

/// POST /api/reviews/{id}/flag
async fn flag(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
    Payload(req): Payload<FlagRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .reviews
        .flag(&id, &current.user, req.reason, req.description)
        .await?;
    Ok(ApiResponse::message("Review reported"))
}

/// POST /api/reviews/{id}/response
async fn respond(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
    Payload(req): Payload<ResponseRequest>,
) -> AppResult<ApiResponse<ReviewView>> {
    let review = state.reviews.respond(&id, &current.user, &req.text).await?;
    Ok(ApiResponse::with_message(review.into(), "Response added"))
}

// -- Moderation --

/// PUT /api/reviews/bulk-update
async fn bulk_update(
    State(state): State<AppState>,
    current: CurrentUser,
    Payload(req): Payload<BulkUpdateRequest>,
) -> AppResult<ApiResponse<BulkUpdateResponse>> {
    let modified_count = state
        .reviews
        .bulk_update_status(&current.user, &req.review_ids, req.update_data.status)
        .await?;
    Ok(ApiResponse::ok(BulkUpdateResponse { modified_count }))
}

/// DELETE /api/reviews/bulk-delete
async fn bulk_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Payload(req): Payload<BulkDeleteRequest>,
) -> AppResult<ApiResponse<BulkDeleteResponse>> {
    let deleted_count = state
        .reviews
        .bulk_delete(&current.user, &req.review_ids)
        .await?;
    Ok(ApiResponse::ok(BulkDeleteResponse { deleted_count }))
}
