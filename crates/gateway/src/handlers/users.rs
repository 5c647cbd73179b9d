//! Account handlers: registration, login, profile, favorites

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use tankobon_common::{
    auth::{self, AuthContext},
    db::models::{User, UserRole},
    db::{PageMeta, PageQuery, Repository},
    errors::{AppError, Result},
};

use super::manga::MangaResponse;

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Public view of an account
#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub preferences: serde_json::Value,
    pub manga_count: i32,
    pub comments_count: i32,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            avatar_url: user.avatar_url,
            preferences: user.preferences,
            manga_count: user.manga_count,
            comments_count: user.comments_count,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    request.validate()?;

    if !auth::valid_username(&request.username) {
        return Err(AppError::Validation {
            message: "username may contain letters, digits and underscores only".to_string(),
            field: Some("username".to_string()),
        });
    }

    let password_hash = auth::hash_password(&request.password)?;

    let repo = Repository::new(state.db.clone());
    let user = repo
        .create_user(
            request.username,
            request.email.to_lowercase(),
            password_hash,
            UserRole::User,
        )
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "Account created");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Exchange credentials for a token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let repo = Repository::new(state.db.clone());

    let user = repo
        .find_user_by_username(&request.username)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !auth::verify_password(&request.password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    let token = state.jwt.generate_token(user.id, user.role_enum())?;

    tracing::info!(user_id = %user.id, "Login");

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

/// Profile of the authenticated user
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> Result<Json<UserResponse>> {
    let repo = Repository::new(state.db.clone());

    let user = repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::UserNotFound {
            id: auth.user_id.to_string(),
        })?;

    Ok(Json(user.into()))
}

/// Pagination parameters for the favorites listing
#[derive(Debug, Deserialize)]
pub struct FavoritesParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Favorites listing response
#[derive(Serialize)]
pub struct FavoritesResponse {
    pub data: Vec<MangaResponse>,
    pub pagination: PageMeta,
}

/// List the user's favorited manga
pub async fn list_favorites(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(params): Query<FavoritesParams>,
) -> Result<Json<FavoritesResponse>> {
    let repo = Repository::new(state.db.clone());
    let page = PageQuery::new(params.page, params.limit);

    let (mangas, pagination) = repo.list_favorites(auth.user_id, page).await?;

    Ok(Json(FavoritesResponse {
        data: mangas.into_iter().map(MangaResponse::from).collect(),
        pagination,
    }))
}

#[derive(Serialize)]
pub struct FavoriteChanged {
    pub favorited: bool,
}

/// Add a manga to favorites
pub async fn add_favorite(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(manga_id): Path<Uuid>,
) -> Result<Json<FavoriteChanged>> {
    let repo = Repository::new(state.db.clone());

    repo.find_manga_by_id(manga_id)
        .await?
        .ok_or_else(|| AppError::MangaNotFound {
            id: manga_id.to_string(),
        })?;

    let favorited = repo.add_favorite(auth.user_id, manga_id).await?;

    Ok(Json(FavoriteChanged { favorited }))
}

/// Remove a manga from favorites
pub async fn remove_favorite(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(manga_id): Path<Uuid>,
) -> Result<Json<FavoriteChanged>> {
    let repo = Repository::new(state.db.clone());

    repo.remove_favorite(auth.user_id, manga_id).await?;

    Ok(Json(FavoriteChanged { favorited: false }))
}
