//! REST API for previewing how typed text will be read.
//!
//! Both endpoints are pure: they run the text field parser and return the
//! decoded `{charge, withdraw}` pair in minor units.

use axum::{response::Json, routing::post, Router};
use shared::{ChargeWithdraw, ParseTextRequest};
use tracing::debug;

use crate::domain::text_field_parser::{parse_notes_adjustments, parse_slot};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/slot", post(parse_slot_text))
        .route("/notes", post(parse_notes_text))
}

pub async fn parse_slot_text(Json(request): Json<ParseTextRequest>) -> Json<ChargeWithdraw> {
    debug!("POST /api/parse/slot - {:?}", request.input);
    Json(parse_slot(request.input.as_deref()))
}

pub async fn parse_notes_text(Json(request): Json<ParseTextRequest>) -> Json<ChargeWithdraw> {
    debug!("POST /api/parse/notes - {:?}", request.input);
    Json(parse_notes_adjustments(request.input.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_notes_text() {
        let Json(parsed) = parse_notes_text(Json(ParseTextRequest {
            input: Some("10충/5환".to_string()),
        }))
        .await;

        assert_eq!(parsed, ChargeWithdraw { charge: 100_000, withdraw: 50_000 });
    }

    #[tokio::test]
    async fn test_parse_slot_text_without_input() {
        let Json(parsed) = parse_slot_text(Json(ParseTextRequest::default())).await;
        assert_eq!(parsed, ChargeWithdraw::default());
    }
}
