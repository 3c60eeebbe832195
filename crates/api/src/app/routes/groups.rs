use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::json;

use splitledger_core::{GroupId, MemberId, SettlementId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_group))
        .route("/:id", get(get_group))
        .route("/:id/expenses", post(add_expense))
        .route("/:id/balances", get(get_balances))
        .route("/:id/settle", post(settle_up))
        .route("/:id/settlements", post(propose_settlement))
        .route("/:id/settlements/:sid/confirm", post(confirm_settlement))
}

pub async fn create_group(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateGroupRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let founder_id: MemberId = match errors::parse_id(&body.founder_id, "founder") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let founder = match services.ledger.find_member(founder_id) {
        Ok(identity) => identity,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    match services
        .ledger
        .create_group(&body.name, &body.description, founder, body.invited_emails)
    {
        Ok(group) => errors::json_ok(StatusCode::CREATED, dto::group_to_json(&group), "group created"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let group_id: GroupId = match errors::parse_id(&id, "group") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.get_group(group_id) {
        Ok(group) => errors::json_ok(StatusCode::OK, dto::group_to_json(&group), "group found"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn add_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::AddExpenseRequest>, JsonRejection>,
) -> axum::response::Response {
    let group_id: GroupId = match errors::parse_id(&id, "group") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let expense = match errors::json_body(body).and_then(dto::AddExpenseRequest::into_new_expense) {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    match services.ledger.add_expense(group_id, expense) {
        Ok(expense) => errors::json_ok(StatusCode::CREATED, dto::expense_to_json(&expense), "expense added"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_balances(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let group_id: GroupId = match errors::parse_id(&id, "group") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.get_balances(group_id) {
        Ok(balances) => errors::json_ok(
            StatusCode::OK,
            json!({ "balances": dto::balances_to_json(&balances) }),
            "balances",
        ),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn settle_up(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::SettleRequest>, JsonRejection>,
) -> axum::response::Response {
    let group_id: GroupId = match errors::parse_id(&id, "group") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.ledger.settle_up(group_id, body.policy) {
        Ok(result) => errors::json_ok(
            StatusCode::OK,
            dto::settlement_result_to_json(&result),
            "settle-up processed",
        ),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn propose_settlement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let group_id: GroupId = match errors::parse_id(&id, "group") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.propose_settlement(group_id) {
        Ok(Some(proposal)) => errors::json_ok(
            StatusCode::CREATED,
            dto::proposal_to_json(&proposal),
            "settlement proposed",
        ),
        Ok(None) => errors::json_ok(StatusCode::OK, serde_json::Value::Null, "already settled"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn confirm_settlement(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, sid)): Path<(String, String)>,
) -> axum::response::Response {
    let group_id: GroupId = match errors::parse_id(&id, "group") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let settlement_id: SettlementId = match errors::parse_id(&sid, "settlement") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.confirm_settlement(group_id, settlement_id) {
        Ok(settlement) => errors::json_ok(
            StatusCode::OK,
            dto::settlement_to_json(&settlement),
            "settlement confirmed",
        ),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
