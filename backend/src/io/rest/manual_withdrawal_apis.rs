//! # REST API for Manual Withdrawals
//!
//! Add, edit and remove the manual withdrawal rows of a settlement summary.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{patch, post},
    Router,
};
use shared::{AddManualWithdrawalRequest, SettlementMode, UpdateManualWithdrawalRequest};
use tracing::{error, info};

use crate::io::rest::mappers::summary_mapper::SummaryMapper;
use crate::io::rest::{error_response, summary_key};
use crate::AppState;

/// Create a router for manual withdrawal APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:date/:mode/withdrawals", post(add_manual_withdrawal))
        .route(
            "/:date/:mode/withdrawals/:id",
            patch(update_manual_withdrawal).delete(remove_manual_withdrawal),
        )
}

pub async fn add_manual_withdrawal(
    State(state): State<AppState>,
    Path((date, mode)): Path<(String, SettlementMode)>,
    Json(request): Json<AddManualWithdrawalRequest>,
) -> impl IntoResponse {
    info!("POST /api/settlement/{}/{}/withdrawals - request: {:?}", date, mode, request);

    let key = match summary_key(&date, mode) {
        Ok(key) => key,
        Err(e) => return error_response(e),
    };

    let command = SummaryMapper::to_add_withdrawal_command(request);
    match state.settlement_service.add_manual_withdrawal(&key, command).await {
        Ok(edit) => (StatusCode::CREATED, Json(edit.withdrawal)).into_response(),
        Err(e) => {
            error!("Failed to add manual withdrawal to {}: {}", key, e);
            error_response(e)
        }
    }
}

pub async fn update_manual_withdrawal(
    State(state): State<AppState>,
    Path((date, mode, id)): Path<(String, SettlementMode, String)>,
    Json(request): Json<UpdateManualWithdrawalRequest>,
) -> impl IntoResponse {
    info!("PATCH /api/settlement/{}/{}/withdrawals/{} - request: {:?}", date, mode, id, request);

    let key = match summary_key(&date, mode) {
        Ok(key) => key,
        Err(e) => return error_response(e),
    };

    let command = SummaryMapper::to_update_withdrawal_command(id, request);
    match state.settlement_service.update_manual_withdrawal(&key, command).await {
        Ok(edit) => (StatusCode::OK, Json(edit.withdrawal)).into_response(),
        Err(e) => {
            error!("Failed to update manual withdrawal in {}: {}", key, e);
            error_response(e)
        }
    }
}

/// Responds with the summary as it looks after the removal
pub async fn remove_manual_withdrawal(
    State(state): State<AppState>,
    Path((date, mode, id)): Path<(String, SettlementMode, String)>,
) -> impl IntoResponse {
    info!("DELETE /api/settlement/{}/{}/withdrawals/{}", date, mode, id);

    let key = match summary_key(&date, mode) {
        Ok(key) => key,
        Err(e) => return error_response(e),
    };

    match state.settlement_service.remove_manual_withdrawal(&key, &id).await {
        Ok(edit) => (StatusCode::OK, Json(SummaryMapper::to_dto(&edit.summary))).into_response(),
        Err(e) => {
            error!("Failed to remove manual withdrawal {} from {}: {}", id, key, e);
            error_response(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SummaryKey;
    use crate::domain::{SystemClock, DEFAULT_REFERENCE_TTL};
    use crate::storage::MemoryStore;
    use shared::{ManualWithdrawal, SettlementSummaryView};
    use std::sync::Arc;

    fn setup_test_app_state() -> AppState {
        AppState::from_store(Arc::new(MemoryStore::new()), Arc::new(SystemClock), DEFAULT_REFERENCE_TTL)
    }

    fn path(id: &str) -> Path<(String, SettlementMode, String)> {
        Path(("2024-05-01".to_string(), SettlementMode::Finish, id.to_string()))
    }

    async fn add(state: &AppState, amount: i64) -> axum::response::Response {
        let request = AddManualWithdrawalRequest {
            identity: "alpha".to_string(),
            site: "site-1".to_string(),
            amount,
            record_date: Some("2024-05-01T18:00:00".to_string()),
        };
        add_manual_withdrawal(
            State(state.clone()),
            Path(("2024-05-01".to_string(), SettlementMode::Finish)),
            Json(request),
        )
        .await
        .into_response()
    }

    async fn body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_add_manual_withdrawal_api() {
        let state = setup_test_app_state();

        let response = add(&state, 30_000).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let withdrawal: ManualWithdrawal = body(response).await;
        assert_eq!(withdrawal.record_date, "2024-05-01");
        assert_eq!(withdrawal.amount, 30_000);
    }

    #[tokio::test]
    async fn test_add_negative_withdrawal_is_bad_request() {
        let state = setup_test_app_state();
        let response = add(&state, -5).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_and_remove_manual_withdrawal_api() {
        let state = setup_test_app_state();
        let created: ManualWithdrawal = body(add(&state, 30_000).await).await;

        let response = update_manual_withdrawal(
            State(state.clone()),
            path(&created.id),
            Json(UpdateManualWithdrawalRequest {
                amount: Some(45_000),
                ..UpdateManualWithdrawalRequest::default()
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: ManualWithdrawal = body(response).await;
        assert_eq!(updated.amount, 45_000);

        let response = remove_manual_withdrawal(State(state.clone()), path(&created.id))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let summary: SettlementSummaryView = body(response).await;
        assert!(summary.manual_withdrawals.is_empty());
        assert_eq!(summary.manual_withdrawal_total, 0);

        state
            .settlement_service
            .wait_idle(&SummaryKey::new("2024-05-01", SettlementMode::Finish))
            .await;
    }

    #[tokio::test]
    async fn test_unknown_withdrawal_is_not_found() {
        let state = setup_test_app_state();

        let response = remove_manual_withdrawal(State(state), path("missing")).await.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
