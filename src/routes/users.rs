// User Handlers - profiles, social graph, saved styles and collections

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::accounts::{
    AccountStatusUpdate, ActivityCounts, Collection, FollowEdge, NewCollection, ProfileUpdate,
    PublicUser, SavedKind, SavedStyle,
};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser, Payload};
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user: PublicUser,
    pub stats: ActivityCounts,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me/profile", put(update_profile))
        .route("/users/me/password", put(change_password))
        .route("/users/me/favorites", get(favorites))
        .route(
            "/users/me/favorites/{style_id}",
            post(add_favorite).delete(remove_favorite),
        )
        .route("/users/me/bookmarks", get(bookmarks))
        .route(
            "/users/me/bookmarks/{style_id}",
            post(add_bookmark).delete(remove_bookmark),
        )
        .route("/users/me/collections", get(my_collections).post(create_collection))
        .route(
            "/users/me/collections/{id}/styles/{style_id}",
            post(add_to_collection).delete(remove_from_collection),
        )
        .route("/users/{id}", get(profile))
        .route("/users/{id}/follow", post(follow).delete(unfollow))
        .route("/users/{id}/followers", get(followers))
        .route("/users/{id}/following", get(following))
        .route("/users/{id}/collections", get(collections))
        .route("/users/{id}/status", put(set_status))
}

// -- Profile --

/// GET /api/users/{id}
async fn profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    viewer: MaybeUser,
) -> AppResult<ApiResponse<ProfileResponse>> {
    let user = state.accounts.get(&id).await?;
    let own = viewer.as_ref().is_some_and(|v| v.id == user.id);
    let stats = state.accounts.counts(&user.id).await?;
    Ok(ApiResponse::ok(ProfileResponse {
        user: PublicUser::from_user(&user, own),
        stats,
    }))
}

/// PUT /api/users/me/profile
async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Payload(update): Payload<ProfileUpdate>,
) -> AppResult<ApiResponse<PublicUser>> {
    let user = state.accounts.update_profile(&current.user.id, update).await?;
    Ok(ApiResponse::with_message(
        PublicUser::from_user(&user, true),
        "Profile updated",
    ))
}

/// PUT /api/users/me/password
async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Payload(req): Payload<ChangePasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .accounts
        .change_password(&current.user.id, &req.current_password, &req.new_password)
        .await?;
    Ok(ApiResponse::message("Password changed"))
}

/// PUT /api/users/{id}/status
async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
    Payload(update): Payload<AccountStatusUpdate>,
) -> AppResult<ApiResponse<PublicUser>> {
    let user = state
        .accounts
        .set_account_status(&current.user, &id, update)
        .await?;
    Ok(ApiResponse::with_message(
        PublicUser::from_user(&user, true),
        "Account status updated",
    ))
}

// -- Social graph --

/// POST /api/users/{id}/follow
async fn follow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    let created = state.accounts.follow(&current.user.id, &id).await?;
    Ok(ApiResponse::message(if created {
        "Now following"
    } else {
        "Already following"
    }))
}

/// DELETE /api/users/{id}/follow
async fn unfollow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    current: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    state.accounts.unfollow(&current.user.id, &id).await?;
    Ok(ApiResponse::message("Unfollowed"))
}

async fn followers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<FollowEdge>>> {
    Ok(ApiResponse::ok(state.accounts.followers(&id).await?))
}

async fn following(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<FollowEdge>>> {
    Ok(ApiResponse::ok(state.accounts.following(&id).await?))
}

// -- Favorites and bookmarks --

async fn list_saved(
    state: &AppState,
    user_id: &str,
    kind: SavedKind,
) -> AppResult<ApiResponse<Vec<SavedStyle>>> {
    Ok(ApiResponse::ok(state.accounts.saved_styles(user_id, kind).await?))
}

async fn save(
    state: &AppState,
    user_id: &str,
    style_id: &str,
    kind: SavedKind,
) -> AppResult<ApiResponse<()>> {
    state.accounts.save_style(user_id, style_id, kind).await?;
    Ok(ApiResponse::message(format!("Added to {}s", kind.as_str())))
}

async fn unsave(
    state: &AppState,
    user_id: &str,
    style_id: &str,
    kind: SavedKind,
) -> AppResult<ApiResponse<()>> {
    state.accounts.unsave_style(user_id, style_id, kind).await?;
    Ok(ApiResponse::message(format!("Removed from {}s", kind.as_str())))
}

async fn favorites(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<ApiResponse<Vec<SavedStyle>>> {
    list_saved(&state, &current.user.id, SavedKind::Favorite).await
}

async fn add_favorite(
    State(state): State<AppState>,
    Path(style_id): Path<String>,
    current: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    save(&state, &current.user.id, &style_id, SavedKind::Favorite).await
}

async fn remove_favorite(
    State(state): State<AppState>,
    Path(style_id): Path<String>,
    current: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    unsave(&state, &current.user.id, &style_id, SavedKind::Favorite).await
}

async fn bookmarks(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<ApiResponse<Vec<SavedStyle>>> {
    list_saved(&state, &current.user.id, SavedKind::Bookmark).await
}

async fn add_bookmark(
    State(state): State<AppState>,
    Path(style_id): Path<String>,
    current: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    save(&state, &current.user.id, &style_id, SavedKind::Bookmark).await
}

async fn remove_bookmark(
    State(state): State<AppState>,
    Path(style_id): Path<String>,
    current: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    unsave(&state, &current.user.id, &style_id, SavedKind::Bookmark).await
}

// -- Collections --

async fn my_collections(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<ApiResponse<Vec<Collection>>> {
    let id = current.user.id.as_str();
    Ok(ApiResponse::ok(state.accounts.collections(id, Some(id)).await?))
}

/// GET /api/users/{id}/collections
/// Public collections only, unless the viewer owns them.
async fn collections(
    State(state): State<AppState>,
    Path(id): Path<String>,
    viewer: MaybeUser,
) -> AppResult<ApiResponse<Vec<Collection>>> {
    let viewer_id = viewer.as_ref().map(|u| u.id.as_str());
    Ok(ApiResponse::ok(state.accounts.collections(&id, viewer_id).await?))
}

async fn create_collection(
    State(state): State<AppState>,
    current: CurrentUser,
    Payload(input): Payload<NewCollection>,
) -> AppResult<impl IntoResponse> {
    let collection = state
        .accounts
        .create_collection(&current.user.id, input)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(collection, "Collection created"),
    ))
}

async fn add_to_collection(
    State(state): State<AppState>,
    Path((id, style_id)): Path<(String, String)>,
    current: CurrentUser,
) -> AppResult<ApiResponse<Collection>> {
    let collection = state
        .accounts
        .add_to_collection(&current.user.id, &id, &style_id)
        .await?;
    Ok(ApiResponse::ok(collection))
}

async fn remove_from_collection(
    State(state): State<AppState>,
    Path((id, style_id)): Path<(String, String)>,
    current: CurrentUser,
) -> AppResult<ApiResponse<Collection>> {
    let collection = state
        .accounts
        .remove_from_collection(&current.user.id, &id, &style_id)
        .await?;
    Ok(ApiResponse::ok(collection))
}
