use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::json;

use splitledger_core::MemberId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_member))
        .route("/:id", get(get_member))
        .route("/:id/groups", get(list_groups))
        .route("/:id/summary", get(member_summary))
}

pub async fn register_member(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::RegisterMemberRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.ledger.register_member(&body.name, &body.email) {
        Ok(identity) => errors::json_ok(
            StatusCode::CREATED,
            dto::identity_to_json(&identity),
            "member registered",
        ),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_member(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let member_id: MemberId = match errors::parse_id(&id, "member") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.find_member(member_id) {
        Ok(identity) => errors::json_ok(StatusCode::OK, dto::identity_to_json(&identity), "member found"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_groups(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let member_id: MemberId = match errors::parse_id(&id, "member") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.list_groups_for_member(member_id) {
        Ok(groups) => {
            let items = groups.iter().map(dto::group_summary_to_json).collect::<Vec<_>>();
            let message = format!("{} group(s)", items.len());
            errors::json_ok(StatusCode::OK, json!({ "items": items }), message)
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn member_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let member_id: MemberId = match errors::parse_id(&id, "member") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.member_summary(member_id) {
        Ok(summary) => errors::json_ok(
            StatusCode::OK,
            dto::member_summary_to_json(&summary),
            "member summary",
        ),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
