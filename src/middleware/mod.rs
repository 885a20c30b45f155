use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::models::SystemControl;
use crate::AppState;

// Global kill-switch: while the system_control row is disabled, every API
// request is refused with 503. Health probes and the system-control
// endpoints stay reachable so an administrator can turn the system back on.
pub async fn require_system_enabled(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_lowercase();
    if path == "/" || path.contains("/health") || path.contains("/system-control") {
        return next.run(req).await;
    }

    match SystemControl::get(&state.db.pool).await {
        Ok(Some(control)) if !control.is_enabled => {
            warn!("Sistema desativado. Acesso negado.");
            let body = json!({
                "success": false,
                "message": "Sistema temporariamente desativado",
                "info": control
                    .message
                    .unwrap_or_else(|| "Entre em contato com o suporte".to_string()),
                "timestamp": chrono::Utc::now(),
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
        Ok(_) => next.run(req).await,
        Err(e) => {
            // Fail-open: a broken status check must not take the API down
            error!("Erro ao verificar status do sistema: {:?}", e);
            next.run(req).await
        }
    }
}
