use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::controllers::{validation_messages, BaseResponse};
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users", get(get_all_users))
        .route("/users/change-password", post(change_password))
        .route("/users/{id}", get(get_user_by_id))
        .route("/users/{id}", put(update_user))
        .route("/users/{id}", delete(delete_user))
}

/* ---------- DTOs ---------- */

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    #[validate(length(min = 1, max = 200, message = "Nome completo é obrigatório"))]
    full_name: String,
    #[validate(
        length(
            min = 3,
            max = 100,
            message = "Nome de usuário deve ter entre 3 e 100 caracteres"
        ),
        custom(function = validate_username)
    )]
    username: String,
    #[validate(length(min = 6, max = 100, message = "Senha deve ter no mínimo 6 caracteres"))]
    password: String,
    #[validate(custom(function = validate_role))]
    role: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Nome completo é obrigatório"))]
    full_name: String,
    #[validate(
        length(
            min = 3,
            max = 100,
            message = "Nome de usuário deve ter entre 3 e 100 caracteres"
        ),
        custom(function = validate_username)
    )]
    username: String,
    // Password only changes when one is supplied
    #[validate(length(min = 6, max = 100, message = "Senha deve ter no mínimo 6 caracteres"))]
    password: Option<String>,
    #[validate(custom(function = validate_role))]
    role: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_password_change))]
struct ChangePasswordRequest {
    user_id: Uuid,
    #[validate(length(min = 1, message = "Senha atual é obrigatória"))]
    current_password: String,
    #[validate(length(min = 6, message = "Nova senha deve ter no mínimo 6 caracteres"))]
    new_password: String,
    #[validate(length(min = 1, message = "Confirmação de senha é obrigatória"))]
    confirm_new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    id: Uuid,
    full_name: String,
    username: String,
    role: String,
    created_at: NaiveDateTime,
    is_active: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            username: user.username.clone(),
            role: user.role.clone(),
            created_at: user.created_at,
            is_active: user.is_active,
        }
    }
}

/* ---------- validation rules ---------- */

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(rule_error(
            "username",
            "Nome de usuário deve conter apenas letras, números, ponto, hífen ou underscore",
        ))
    }
}

fn validate_role(role: &str) -> Result<(), ValidationError> {
    if role == "Admin" || role == "Employee" {
        Ok(())
    } else {
        Err(rule_error("role", "Função deve ser 'Admin' ou 'Employee'"))
    }
}

fn validate_password_change(req: &ChangePasswordRequest) -> Result<(), ValidationError> {
    if req.new_password == req.current_password {
        return Err(rule_error(
            "password_change",
            "Nova senha deve ser diferente da senha atual",
        ));
    }
    if req.confirm_new_password != req.new_password {
        return Err(rule_error(
            "password_change",
            "Confirmação de senha não confere",
        ));
    }
    Ok(())
}

/* ---------- handlers ---------- */

// POST /api/users
async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Response {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<UserResponse>::failure_with_errors(
                "Dados inválidos",
                validation_messages(&errors),
            )),
        )
            .into_response();
    }

    let pool = &state.db.pool;
    let username = req.username.to_lowercase();

    match User::find_by_username(pool, &username).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<UserResponse>::failure(
                    "Nome de usuário já está em uso",
                )),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => return sql_failure("create_user", e),
    }

    let password_hash = User::hash_password(&req.password);
    match User::insert(pool, &req.full_name, &username, &password_hash, &req.role).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(BaseResponse::success_with_message(
                UserResponse::from(&user),
                "Usuário cadastrado com sucesso",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("create_user insert error: {:?}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<UserResponse>::failure(
                    "Erro ao cadastrar usuário",
                )),
            )
                .into_response()
        }
    }
}

// PUT /api/users/{id}
async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Response {
    if id != req.id {
        return (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<UserResponse>::failure(
                "ID do usuário não corresponde",
            )),
        )
            .into_response();
    }

    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<UserResponse>::failure_with_errors(
                "Dados inválidos",
                validation_messages(&errors),
            )),
        )
            .into_response();
    }

    let pool = &state.db.pool;
    let username = req.username.to_lowercase();

    match User::find_by_username(pool, &username).await {
        Ok(Some(existing)) if existing.id != id => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<UserResponse>::failure(
                    "Nome de usuário já está em uso",
                )),
            )
                .into_response();
        }
        Ok(_) => {}
        Err(e) => return sql_failure("update_user", e),
    }

    let password_hash = req.password.as_deref().map(User::hash_password);
    match User::update(
        pool,
        id,
        &req.full_name,
        &username,
        password_hash.as_deref(),
        &req.role,
    )
    .await
    {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(BaseResponse::success_with_message(
                UserResponse::from(&user),
                "Usuário atualizado com sucesso",
            )),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<UserResponse>::failure(
                "Usuário não encontrado",
            )),
        )
            .into_response(),
        Err(e) => sql_failure("update_user", e),
    }
}

// GET /api/users/{id}
async fn get_user_by_id(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match User::find_by_id(&state.db.pool, id).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(BaseResponse::success(UserResponse::from(&user))),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(BaseResponse::<UserResponse>::failure(
                "Usuário não encontrado",
            )),
        )
            .into_response(),
        Err(e) => sql_failure("get_user_by_id", e),
    }
}

// GET /api/users
async fn get_all_users(State(state): State<Arc<AppState>>) -> Response {
    match User::list_active(&state.db.pool).await {
        Ok(users) => {
            let responses: Vec<UserResponse> = users.iter().map(UserResponse::from).collect();
            (StatusCode::OK, Json(BaseResponse::success(responses))).into_response()
        }
        Err(e) => sql_failure("get_all_users", e),
    }
}

// DELETE /api/users/{id} (deactivation; refused while the user owns bookings)
async fn delete_user(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let pool = &state.db.pool;

    match User::find_by_id(pool, id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<bool>::failure("Usuário não encontrado")),
            )
                .into_response();
        }
        Err(e) => return sql_failure("delete_user", e),
    }

    match User::has_appointments(pool, id).await {
        Ok(true) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<bool>::failure(
                    "Não é possível excluir usuário que possui agendamentos cadastrados. \
                     Desative o usuário ao invés de excluí-lo.",
                )),
            )
                .into_response();
        }
        Ok(false) => {}
        Err(e) => return sql_failure("delete_user", e),
    }

    match User::deactivate(pool, id).await {
        Ok(_) => (
            StatusCode::OK,
            Json(BaseResponse::success_with_message(
                true,
                "Usuário desativado com sucesso",
            )),
        )
            .into_response(),
        Err(e) => sql_failure("delete_user", e),
    }
}

// POST /api/users/change-password
async fn change_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangePasswordRequest>,
) -> Response {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<bool>::failure_with_errors(
                "Dados inválidos",
                validation_messages(&errors),
            )),
        )
            .into_response();
    }

    let pool = &state.db.pool;

    let user = match User::find_by_id(pool, req.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<bool>::failure("Usuário não encontrado")),
            )
                .into_response();
        }
        Err(e) => return sql_failure("change_password", e),
    };

    if !user.verify_password(&req.current_password) {
        return (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<bool>::failure("Senha atual incorreta")),
        )
            .into_response();
    }

    let new_hash = User::hash_password(&req.new_password);
    match User::update_password(pool, req.user_id, &new_hash).await {
        Ok(_) => (
            StatusCode::OK,
            Json(BaseResponse::success_with_message(
                true,
                "Senha alterada com sucesso",
            )),
        )
            .into_response(),
        Err(e) => sql_failure("change_password", e),
    }
}

fn sql_failure(context: &str, e: sqlx::Error) -> Response {
    tracing::error!("{} sql error: {:?}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(BaseResponse::<()>::failure("Erro interno do servidor")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_charset() {
        assert!(validate_username("ana.souza_2").is_ok());
        assert!(validate_username("ana souza").is_err());
        assert!(validate_username("ana@souza").is_err());
    }

    #[test]
    fn role_must_be_admin_or_employee() {
        assert!(validate_role("Admin").is_ok());
        assert!(validate_role("Employee").is_ok());
        assert!(validate_role("Gerente").is_err());
    }

    #[test]
    fn password_change_cross_field_rules() {
        let mut req = ChangePasswordRequest {
            user_id: Uuid::new_v4(),
            current_password: "old-secret".to_string(),
            new_password: "new-secret".to_string(),
            confirm_new_password: "new-secret".to_string(),
        };
        assert!(req.validate().is_ok());

        req.confirm_new_password = "other".to_string();
        assert!(req.validate().is_err());

        req.confirm_new_password = req.current_password.clone();
        req.new_password = req.current_password.clone();
        assert!(req.validate().is_err());
    }
}
