use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::controllers::BaseResponse;
use crate::models::SystemControl;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/system-control", get(get_status))
        .route("/system-control/toggle", put(toggle_system))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleSystemRequest {
    is_enabled: bool,
    message: Option<String>,
}

// GET /api/system-control
async fn get_status(State(state): State<Arc<AppState>>) -> Response {
    match SystemControl::get(&state.db.pool).await {
        Ok(control) => (StatusCode::OK, Json(BaseResponse::success(control))).into_response(),
        Err(e) => {
            tracing::error!("get_status sql error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BaseResponse::<SystemControl>::failure(
                    "Erro ao consultar status do sistema",
                )),
            )
                .into_response()
        }
    }
}

// PUT /api/system-control/toggle
async fn toggle_system(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ToggleSystemRequest>,
) -> Response {
    match SystemControl::set(&state.db.pool, req.is_enabled, req.message.as_deref()).await {
        Ok(control) => {
            let message = if control.is_enabled {
                "Sistema ativado"
            } else {
                "Sistema desativado"
            };
            tracing::warn!("{} (kill-switch)", message);
            (
                StatusCode::OK,
                Json(BaseResponse::success_with_message(control, message)),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("toggle_system sql error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BaseResponse::<SystemControl>::failure(
                    "Erro ao alterar status do sistema",
                )),
            )
                .into_response()
        }
    }
}
