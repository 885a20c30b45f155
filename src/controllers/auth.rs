use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::controllers::BaseResponse;
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/validate", post(validate_token))
}

// Placeholder session token inherited from the legacy system: an opaque
// base64 of "user_id:timestamp". Not a real credential.
fn generate_token(user_id: Uuid) -> String {
    general_purpose::STANDARD.encode(format!("{}:{}", user_id, chrono::Utc::now()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user_id: Uuid,
    full_name: String,
    username: String,
    token: String,
}

// POST /api/auth/login
async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> Response {
    let user = match User::find_by_username(&state.db.pool, &req.username).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("login sql error: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BaseResponse::<LoginResponse>::failure(
                    "Erro ao realizar login",
                )),
            )
                .into_response();
        }
    };

    let Some(user) = user else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(BaseResponse::<LoginResponse>::failure(
                "Usuário ou senha incorretos",
            )),
        )
            .into_response();
    };

    if !user.verify_password(&req.password) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(BaseResponse::<LoginResponse>::failure(
                "Usuário ou senha incorretos",
            )),
        )
            .into_response();
    }

    let response = LoginResponse {
        user_id: user.id,
        full_name: user.full_name,
        username: user.username,
        token: generate_token(user.id),
    };

    (
        StatusCode::OK,
        Json(BaseResponse::success_with_message(
            response,
            "Login realizado com sucesso",
        )),
    )
        .into_response()
}

// POST /api/auth/validate
async fn validate_token(Json(token): Json<String>) -> Response {
    if token.trim().is_empty() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(BaseResponse::<bool>::failure("Token inválido")),
        )
            .into_response();
    }

    (StatusCode::OK, Json(BaseResponse::success(true))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_decodes_to_user_id_prefix() {
        let id = Uuid::new_v4();
        let token = generate_token(id);
        let decoded = general_purpose::STANDARD.decode(token).unwrap();
        let decoded = String::from_utf8(decoded).unwrap();
        assert!(decoded.starts_with(&format!("{}:", id)));
    }
}
