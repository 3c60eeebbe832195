use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use splitledger_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let status = match &err {
        LedgerError::Validation(_)
        | LedgerError::InvalidPayer(_)
        | LedgerError::InvalidSplit(_)
        | LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        LedgerError::GroupNotFound(_)
        | LedgerError::MemberNotFound(_)
        | LedgerError::SettlementNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Conflict(_) => StatusCode::CONFLICT,
        LedgerError::InvariantViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn json_ok(
    status: StatusCode,
    data: serde_json::Value,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": true,
            "data": data,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path/body identifier, answering 400 on failure.
pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.trim().parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("invalid {what} id '{raw}'"),
        )
    })
}

/// Unwrap a JSON body, answering malformed input in the standard envelope.
pub fn json_body<T>(
    body: Result<axum::Json<T>, axum::extract::rejection::JsonRejection>,
) -> Result<T, axum::response::Response> {
    body.map(|axum::Json(value)| value)
        .map_err(|rejection| json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text()))
}
