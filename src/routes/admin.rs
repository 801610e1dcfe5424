use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::admin::{PaymentMethodInput, RuleInput, SettingsPatch};
use crate::db::plan::{PlanId, PlanInput};
use crate::db::request::{DepositStatus, StatusUpdate, TransferStatus, WithdrawalStatus};
use crate::db::user::UserId;
use crate::ledger::reports::ReportQuery;

use super::{utils::require_admin, ApiResult, AppState};

async fn list_users(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.users().await))
}

async fn toggle_status(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.toggle_status(user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct WalletAdjustment {
    pub amount: Decimal,
    pub reason: Option<String>,
}

async fn adjust_wallet(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(adjustment): Json<WalletAdjustment>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    let user = state
        .ledger
        .adjust_wallet(user_id, adjustment.amount, adjustment.reason)
        .await?;
    Ok(Json(user))
}

async fn list_deposits(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.deposits(None).await))
}

async fn update_deposit(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate<DepositStatus>>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.update_deposit(&id, update).await?))
}

async fn list_withdrawals(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.withdrawals(None).await))
}

async fn update_withdrawal(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate<WithdrawalStatus>>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.update_withdrawal(&id, update).await?))
}

async fn list_transfers(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.transfers(None).await))
}

async fn update_transfer(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate<TransferStatus>>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.update_transfer(&id, update).await?))
}

async fn list_transactions(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.transactions(None).await))
}

async fn create_plan(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(input): Json<PlanInput>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    let plan = state.ledger.create_plan(input).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn update_plan(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<PlanId>,
    Json(input): Json<PlanInput>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.update_plan(id, input).await?))
}

async fn delete_plan(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<PlanId>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.delete_plan(id).await?))
}

async fn create_payment_method(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(input): Json<PaymentMethodInput>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    let method = state.ledger.create_payment_method(input).await?;
    Ok((StatusCode::CREATED, Json(method)))
}

async fn update_payment_method(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<PaymentMethodInput>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.update_payment_method(id, input).await?))
}

async fn delete_payment_method(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.delete_payment_method(id).await?))
}

async fn create_rule(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(input): Json<RuleInput>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    let rule = state.ledger.create_rule(input).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn delete_rule(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.delete_rule(id).await?))
}

async fn update_settings(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.update_settings(patch).await?))
}

async fn dashboard(headers: HeaderMap, State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    Ok(Json(state.ledger.admin_dashboard().await))
}

async fn report(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&headers, &state.auth)?;
    let report = state.ledger.report(&query).await;
    if report.is_empty() {
        tracing::debug!("Report {:?} matched nothing", query.kind);
    } else {
        tracing::info!("Report generated: {:?} with {} rows", query.kind, report.len());
    }
    Ok(Json(report))
}

pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/toggle-status", post(toggle_status))
        .route("/admin/users/:id/wallet", post(adjust_wallet))
        .route("/admin/deposits", get(list_deposits))
        .route("/admin/deposits/:id", put(update_deposit))
        .route("/admin/withdrawals", get(list_withdrawals))
        .route("/admin/withdrawals/:id", put(update_withdrawal))
        .route("/admin/transfers", get(list_transfers))
        .route("/admin/transfers/:id", put(update_transfer))
        .route("/admin/transactions", get(list_transactions))
        .route("/admin/plans", post(create_plan))
        .route("/admin/plans/:id", put(update_plan).delete(delete_plan))
        .route("/admin/payment-methods", post(create_payment_method))
        .route(
            "/admin/payment-methods/:id",
            put(update_payment_method).delete(delete_payment_method),
        )
        .route("/admin/rules", post(create_rule))
        .route("/admin/rules/:id", axum::routing::delete(delete_rule))
        .route("/admin/settings", put(update_settings))
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/reports", get(report))
        .with_state(state)
}
