use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::db::request::{NewDeposit, NewTransfer, NewWithdrawal};
use crate::db::user::UserId;

use super::{utils::require_user, ApiResult, AppState};

async fn create_deposit(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(deposit): Json<NewDeposit>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!("Starting deposit request for user: {}", deposit.user_id);
    require_user(&headers, &state.auth, deposit.user_id)?;
    let deposit = state.ledger.create_deposit(deposit).await?;
    Ok((StatusCode::CREATED, Json(deposit)))
}

async fn create_withdrawal(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(withdrawal): Json<NewWithdrawal>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!("Starting withdrawal request for user: {}", withdrawal.user_id);
    require_user(&headers, &state.auth, withdrawal.user_id)?;
    let withdrawal = state.ledger.create_withdrawal(withdrawal).await?;
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

async fn create_transfer(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(transfer): Json<NewTransfer>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!("Starting transfer request from user: {}", transfer.sender_id);
    // transfer sender must be the token's user
    require_user(&headers, &state.auth, transfer.sender_id)?;
    let transfer = state.ledger.create_transfer(transfer).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

async fn list_deposits(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    Ok(Json(state.ledger.deposits(Some(user_id)).await))
}

async fn list_withdrawals(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    Ok(Json(state.ledger.withdrawals(Some(user_id)).await))
}

// open withdrawals this user could pay with a matched deposit
async fn list_matching_withdrawals(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    Ok(Json(state.ledger.matching_withdrawals(Some(user_id)).await))
}

async fn list_transfers(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    Ok(Json(state.ledger.transfers(Some(user_id)).await))
}

async fn list_transactions(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_user(&headers, &state.auth, user_id)?;
    Ok(Json(state.ledger.transactions(Some(user_id)).await))
}

pub fn tx_routes(state: AppState) -> Router {
    Router::new()
        .route("/deposits", post(create_deposit))
        .route("/withdrawals", post(create_withdrawal))
        .route("/transfers", post(create_transfer))
        .route("/users/:id/deposits", get(list_deposits))
        .route("/users/:id/withdrawals", get(list_withdrawals))
        .route("/users/:id/matching-withdrawals", get(list_matching_withdrawals))
        .route("/users/:id/transfers", get(list_transfers))
        .route("/users/:id/transactions", get(list_transactions))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;

    use super::*;
    use crate::ledger::testing::Fixture;
    use crate::routes::testing::*;

    #[tokio::test]
    async fn deposit_then_approval_through_the_api() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        let (app, state) = app_with(fx.state);
        let token = member_token(&state, alice);

        let (status, deposit) = call(
            &app,
            Method::POST,
            "/v1/deposits",
            Some(&token),
            Some(json!({ "userId": alice, "amount": "100", "method": "USDT", "transactionId": "0xabc" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(deposit["status"], "Pending");

        let uri = format!("/v1/admin/deposits/{}", deposit["id"].as_str().unwrap());
        let update = json!({ "status": "Approved" });
        let (status, _) = call(&app, Method::PUT, &uri, Some(&token), Some(update.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, approved) = call(&app, Method::PUT, &uri, Some(&admin_token(&state)), Some(update)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["status"], "Approved");

        let (_, txs) = call(&app, Method::GET, &format!("/v1/users/{alice}/transactions"), Some(&token), None).await;
        assert_eq!(txs[0]["type"], "Deposit");
        assert_eq!(txs[0]["amount"], "100");
    }

    #[tokio::test]
    async fn members_cannot_spend_for_others() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        let bob = fx.user("bob", None);
        fx.fund(alice, 100);
        let (app, state) = app_with(fx.state);

        let body = json!({ "senderId": alice, "recipientId": bob, "amount": "10" });
        let (status, _) = call(&app, Method::POST, "/v1/transfers", Some(&member_token(&state, bob)), Some(body.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, transfer) = call(&app, Method::POST, "/v1/transfers", Some(&member_token(&state, alice)), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(transfer["status"], "Pending");
    }

    #[tokio::test]
    async fn overdrawn_withdrawal_is_unprocessable() {
        let mut fx = Fixture::new();
        let alice = fx.user("alice", None);
        fx.fund(alice, 20);
        let (app, state) = app_with(fx.state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/withdrawals",
            Some(&member_token(&state, alice)),
            Some(json!({ "userId": alice, "amount": "50" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().starts_with("Insufficient funds"));
        assert!(state.ledger.withdrawals(Some(alice)).await.is_empty());
    }
}
