use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Sse,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::{stream, Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::db::admin::Notification;
use crate::db::plan::PlanId;
use crate::db::user::{NewUser, UpdateProfile, UserId};

use super::{utils::require_user, ApiResult, AppState};

async fn register_user(
    State(state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    let user = state.ledger.register_user(new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    let user = state.ledger.user(user_id).await?;
    tracing::info!("User found: {}", user_id);
    Ok(Json(user))
}

async fn update_profile(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(patch): Json<UpdateProfile>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    Ok(Json(state.ledger.update_profile(user_id, patch).await?))
}

async fn dashboard(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    Ok(Json(state.ledger.user_dashboard(user_id).await?))
}

async fn genealogy(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    Ok(Json(state.ledger.genealogy(user_id).await?))
}

async fn purchase_plan(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path((user_id, plan_id)): Path<(UserId, PlanId)>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    Ok(Json(state.ledger.purchase_plan(user_id, plan_id).await?))
}

async fn list_notifications(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    Ok(Json(state.ledger.notifications(user_id).await))
}

async fn mark_notifications_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    let marked = state.ledger.mark_notifications_read(user_id).await?;
    Ok(Json(serde_json::json!({ "marked": marked })))
}

fn committed_notifications(
    receiver: broadcast::Receiver<Notification>,
) -> impl Stream<Item = Notification> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(notification) => return Some((notification, receiver)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Notification stream lagged, skipped {skipped}");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

// live feed of the user's notifications as they are committed
async fn stream_notifications(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    require_user(&headers, &state.auth, user_id)?;

    let stream = committed_notifications(state.events.subscribe())
        .filter(move |notification| futures::future::ready(notification.user_id == user_id))
        .map(|notification| Event::default().json_data(notification));

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive-text"),
    );
    Ok(sse)
}

async fn list_plans(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.plans().await)
}

async fn list_payment_methods(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.payment_methods().await)
}

async fn list_rules(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.rules().await)
}

async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.settings().await)
}

pub fn user_routes(state: AppState) -> Router {
    Router::new()
        .route("/users", post(register_user))
        .route("/users/:id", get(get_user))
        .route("/users/:id/profile", put(update_profile))
        .route("/users/:id/dashboard", get(dashboard))
        .route("/users/:id/genealogy", get(genealogy))
        .route("/users/:id/plans/:plan_id", post(purchase_plan))
        .route("/users/:id/notifications", get(list_notifications))
        .route("/users/:id/notifications/read", post(mark_notifications_read))
        .route("/users/:id/notifications/stream", get(stream_notifications))
        .route("/plans", get(list_plans))
        .route("/payment-methods", get(list_payment_methods))
        .route("/rules", get(list_rules))
        .route("/settings", get(get_settings))
        .with_state(state)
}
