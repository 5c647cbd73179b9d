//! Notification handlers
//!
//! Read side of the fan-out: listing, read flags, unread badge count.
//! All queries are scoped to the authenticated user.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use tankobon_common::{
    auth::AuthContext,
    db::models::{Notification, NotificationData},
    db::{PageMeta, PageQuery, Repository},
    errors::{AppError, Result},
};

/// Public view of a notification
#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub kind: String,
    pub data: NotificationData,
    pub is_read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            data: n.payload(),
            kind: n.kind,
            is_read: n.is_read,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

/// Pagination parameters
#[derive(Debug, Deserialize)]
pub struct ListNotificationsParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Listing response
#[derive(Serialize)]
pub struct ListNotificationsResponse {
    pub data: Vec<NotificationResponse>,
    pub pagination: PageMeta,
}

/// List the user's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(params): Query<ListNotificationsParams>,
) -> Result<Json<ListNotificationsResponse>> {
    let repo = Repository::new(state.db.clone());
    let page = PageQuery::new(params.page, params.limit);

    let (notifications, pagination) = repo.list_notifications(auth.user_id, page).await?;

    Ok(Json(ListNotificationsResponse {
        data: notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
        pagination,
    }))
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

/// Mark one notification read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>> {
    let repo = Repository::new(state.db.clone());

    let flipped = repo
        .mark_notification_read(auth.user_id, notification_id)
        .await?;

    if !flipped {
        return Err(AppError::NotificationNotFound {
            id: notification_id.to_string(),
        });
    }

    Ok(Json(MarkReadResponse { updated: 1 }))
}

/// Mark everything read
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<MarkReadResponse>> {
    let repo = Repository::new(state.db.clone());

    let updated = repo.mark_all_notifications_read(auth.user_id).await?;

    Ok(Json(MarkReadResponse { updated }))
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread: u64,
}

/// Unread badge count
pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<UnreadCountResponse>> {
    let repo = Repository::new(state.db.clone());

    let unread = repo.unread_notification_count(auth.user_id).await?;

    Ok(Json(UnreadCountResponse { unread }))
}
