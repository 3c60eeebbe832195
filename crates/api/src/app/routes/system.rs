use axum::http::StatusCode;
use serde_json::json;

use crate::app::errors;

pub async fn health() -> axum::response::Response {
    errors::json_ok(StatusCode::OK, json!({ "status": "ok" }), "ok")
}
