//! # REST API for Settlement Views and Summaries
//!
//! Endpoints for loading a date's derived settlement view, editing summary
//! fields, and sending a summary to the notification sink.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use shared::{SettlementMode, UpdateSummaryRequest};
use tracing::{error, info, warn};

use crate::io::rest::mappers::record_mapper::RecordMapper;
use crate::io::rest::mappers::summary_mapper::SummaryMapper;
use crate::io::rest::{error_response, summary_key};
use crate::AppState;

/// Create a router for settlement related APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:date", get(get_settlement_view))
        .route("/:date/:mode", put(update_summary))
        .route("/:date/:mode/notify", post(notify_settlement))
}

/// Derived records, margins and both summaries for one date
pub async fn get_settlement_view(State(state): State<AppState>, Path(date): Path<String>) -> impl IntoResponse {
    info!("GET /api/settlement/{}", date);

    match state.ledger_service.load_day(&date).await {
        Ok(view) => (StatusCode::OK, Json(RecordMapper::to_view_response(view))).into_response(),
        Err(e) => {
            error!("Failed to load settlement view for {}: {}", date, e);
            error_response(e)
        }
    }
}

/// Partial summary update. Responds with the optimistic summary; the write
/// itself is queued. A request that sets no field is rejected.
pub async fn update_summary(
    State(state): State<AppState>,
    Path((date, mode)): Path<(String, SettlementMode)>,
    Json(request): Json<UpdateSummaryRequest>,
) -> impl IntoResponse {
    info!("PUT /api/settlement/{}/{} - request: {:?}", date, mode, request);

    let key = match summary_key(&date, mode) {
        Ok(key) => key,
        Err(e) => return error_response(e),
    };

    let command = SummaryMapper::to_update_command(request);
    if command.is_empty() {
        warn!("Rejecting summary update for {} with no fields", key);
        return (StatusCode::BAD_REQUEST, "summary update must set at least one field".to_string()).into_response();
    }

    let edit = state.settlement_service.update_fields(&key, command).await;
    (StatusCode::ACCEPTED, Json(SummaryMapper::to_dto(&edit.summary))).into_response()
}

/// Send the summary to the notification sink and report how it went
pub async fn notify_settlement(
    State(state): State<AppState>,
    Path((date, mode)): Path<(String, SettlementMode)>,
) -> impl IntoResponse {
    info!("POST /api/settlement/{}/{}/notify", date, mode);

    let key = match summary_key(&date, mode) {
        Ok(key) => key,
        Err(e) => return error_response(e),
    };

    let result = state.settlement_service.notify(&key).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(SummaryMapper::to_notify_response(result))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SummaryKey;
    use crate::domain::{SystemClock, DEFAULT_REFERENCE_TTL};
    use crate::storage::MemoryStore;
    use axum::response::Response;
    use serde::de::DeserializeOwned;
    use shared::{DailyRecord, NotifyResponse, SettlementSummaryView, SettlementViewResponse};
    use std::sync::Arc;

    fn setup_test_app_state() -> (Arc<MemoryStore>, AppState) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::from_store(store.clone(), Arc::new(SystemClock), DEFAULT_REFERENCE_TTL);
        (store, state)
    }

    async fn body_json<T: DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_get_settlement_view_api() {
        let (store, state) = setup_test_app_state();
        store.insert_records(
            "2024-05-01",
            vec![DailyRecord {
                id: "r1".to_string(),
                record_date: "2024-05-01".to_string(),
                drbet_amount: Some(100_000),
                total_amount: Some(130_000),
                ..DailyRecord::default()
            }],
        );

        let response = get_settlement_view(State(state), Path("2024-05-01".to_string()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let view: SettlementViewResponse = body_json(response).await;
        assert_eq!(view.records[0].margin, 30_000);
        assert_eq!(view.margin_total, 30_000);
        assert_eq!(view.day_chain_margin_total, 30_000);
    }

    #[tokio::test]
    async fn test_get_settlement_view_rejects_bad_date() {
        let (_store, state) = setup_test_app_state();

        let response = get_settlement_view(State(state), Path("not-a-date".to_string()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_settlement_view_reports_store_failure() {
        let (store, state) = setup_test_app_state();
        store.fail_record_fetches(true);

        let response = get_settlement_view(State(state), Path("2024-05-01".to_string()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_update_summary_api() {
        let (store, state) = setup_test_app_state();
        let request = UpdateSummaryRequest {
            cash_on_hand: Some(70_000),
            ..UpdateSummaryRequest::default()
        };

        let response = update_summary(
            State(state.clone()),
            Path(("2024-05-01".to_string(), SettlementMode::Start)),
            Json(request),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let summary: SettlementSummaryView = body_json(response).await;
        assert_eq!(summary.cash_on_hand, 70_000);

        state
            .settlement_service
            .wait_idle(&SummaryKey::new("2024-05-01", SettlementMode::Start))
            .await;
        assert_eq!(store.summary("2024-05-01", SettlementMode::Start).unwrap().cash_on_hand, 70_000);
    }

    #[tokio::test]
    async fn test_update_summary_without_fields_is_rejected() {
        let (store, state) = setup_test_app_state();

        let response = update_summary(
            State(state),
            Path(("2024-05-01".to_string(), SettlementMode::Start)),
            Json(UpdateSummaryRequest::default()),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.write_log().is_empty());
        assert_eq!(store.summary_read_count(), 0);
    }

    #[tokio::test]
    async fn test_notify_settlement_api() {
        let (store, state) = setup_test_app_state();

        let response = notify_settlement(
            State(state.clone()),
            Path(("2024-05-01".to_string(), SettlementMode::Finish)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let sent: NotifyResponse = body_json(response).await;
        assert!(sent.success);

        store.fail_notifications(true);
        let response = notify_settlement(State(state), Path(("2024-05-01".to_string(), SettlementMode::Finish)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(store.notifications().len(), 1);
    }
}
