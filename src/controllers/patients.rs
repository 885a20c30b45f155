use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::controllers::{validation_messages, BaseResponse};
use crate::models::patient::NewPatient;
use crate::models::Patient;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/patients", post(create_patient))
        .route("/patients/search", get(search_patients))
        .route("/patients/{id}", get(get_patient_by_id))
        .route("/patients/{id}", put(update_patient))
        .route("/patients/{id}", delete(delete_patient))
}

/* ---------- DTOs ---------- */

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    #[validate(length(min = 1, max = 200, message = "Nome completo é obrigatório"))]
    pub full_name: String,
    #[validate(length(min = 1, max = 20, message = "RG é obrigatório"))]
    pub rg: String,
    #[validate(custom(function = validate_cpf))]
    pub cpf: String,
    #[validate(range(min = 1, max = 149, message = "Idade inválida"))]
    pub age: i32,
    #[validate(custom(function = validate_birth_date))]
    pub birth_date: NaiveDate,
    #[validate(custom(function = validate_sus_card))]
    pub sus_card_number: String,
    #[validate(length(min = 1, message = "Telefone é obrigatório"))]
    pub phone_number: String,
    #[validate(length(min = 1, max = 200, message = "Nome da mãe é obrigatório"))]
    pub mother_name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatientRequest {
    pub id: Uuid,
    #[serde(flatten)]
    #[validate(nested)]
    pub patient: CreatePatientRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientResponse {
    pub id: Uuid,
    pub full_name: String,
    pub rg: String,
    pub cpf: String,
    pub age: i32,
    pub birth_date: NaiveDate,
    pub sus_card_number: String,
    pub phone_number: String,
    pub mother_name: String,
    pub created_at: NaiveDateTime,
}

impl From<&Patient> for PatientResponse {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            full_name: patient.full_name.clone(),
            rg: patient.rg.clone(),
            cpf: patient.cpf.clone(),
            age: patient.age,
            birth_date: patient.birth_date,
            sus_card_number: patient.sus_card_number.clone(),
            phone_number: patient.phone_number.clone(),
            mother_name: patient.mother_name.clone(),
            created_at: patient.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PatientSearchResult {
    id: Uuid,
    full_name: String,
    sus_card_number: String,
    cpf: String,
    display_text: String,
}

impl From<&Patient> for PatientSearchResult {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            full_name: patient.full_name.clone(),
            sus_card_number: patient.sus_card_number.clone(),
            cpf: patient.cpf.clone(),
            display_text: format!("{} - CPF: {}", patient.full_name, patient.cpf),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(rename = "searchTerm", default)]
    search_term: String,
}

/* ---------- validation rules ---------- */

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

// 11 digits, not all equal (simplified check, matching the legacy rule)
pub fn validate_cpf(cpf: &str) -> Result<(), ValidationError> {
    let digits: String = cpf
        .chars()
        .filter(|c| *c != '.' && *c != '-' && !c.is_whitespace())
        .collect();

    if digits.len() != 11 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(rule_error("cpf", "CPF inválido"));
    }

    let first = digits.chars().next();
    if digits.chars().all(|c| Some(c) == first) {
        return Err(rule_error("cpf", "CPF inválido"));
    }

    Ok(())
}

// 15 digits (old card number) or 11 (new, CPF-based)
pub fn validate_sus_card(number: &str) -> Result<(), ValidationError> {
    if number.len() == 15 || number.len() == 11 {
        Ok(())
    } else {
        Err(rule_error(
            "sus_card",
            "Cartão SUS deve ter 15 dígitos (antigo) ou 11 dígitos (novo CPF)",
        ))
    }
}

pub fn validate_birth_date(birth_date: &NaiveDate) -> Result<(), ValidationError> {
    if *birth_date >= chrono::Local::now().date_naive() {
        return Err(rule_error(
            "birth_date",
            "Data de nascimento não pode ser futura",
        ));
    }
    Ok(())
}

/* ---------- handlers ---------- */

// POST /api/patients
async fn create_patient(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePatientRequest>,
) -> Response {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<PatientResponse>::failure_with_errors(
                "Dados inválidos",
                validation_messages(&errors),
            )),
        )
            .into_response();
    }

    let pool = &state.db.pool;

    match Patient::find_by_cpf(pool, &req.cpf).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<PatientResponse>::failure(
                    "CPF já cadastrado no sistema",
                )),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => return sql_failure("create_patient", e),
    }

    match Patient::find_by_sus_card(pool, &req.sus_card_number).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<PatientResponse>::failure(
                    "Cartão SUS já cadastrado no sistema",
                )),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => return sql_failure("create_patient", e),
    }

    let new = NewPatient {
        full_name: &req.full_name,
        rg: &req.rg,
        cpf: &req.cpf,
        age: req.age,
        birth_date: req.birth_date,
        sus_card_number: &req.sus_card_number,
        phone_number: &req.phone_number,
        mother_name: &req.mother_name,
    };

    match Patient::insert(pool, new).await {
        Ok(patient) => (
            StatusCode::CREATED,
            Json(BaseResponse::success_with_message(
                PatientResponse::from(&patient),
                "Paciente cadastrado com sucesso",
            )),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("create_patient insert error: {:?}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<PatientResponse>::failure(
                    "Erro ao cadastrar paciente",
                )),
            )
                .into_response()
        }
    }
}

// PUT /api/patients/{id}
async fn update_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> Response {
    if id != req.id {
        return (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<PatientResponse>::failure(
                "ID do paciente não corresponde",
            )),
        )
            .into_response();
    }

    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<PatientResponse>::failure_with_errors(
                "Dados inválidos",
                validation_messages(&errors),
            )),
        )
            .into_response();
    }

    let pool = &state.db.pool;
    let data = &req.patient;

    match Patient::find_by_cpf(pool, &data.cpf).await {
        Ok(Some(existing)) if existing.id != id => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<PatientResponse>::failure(
                    "CPF já cadastrado para outro paciente",
                )),
            )
                .into_response();
        }
        Ok(_) => {}
        Err(e) => return sql_failure("update_patient", e),
    }

    match Patient::find_by_sus_card(pool, &data.sus_card_number).await {
        Ok(Some(existing)) if existing.id != id => {
            return (
                StatusCode::BAD_REQUEST,
                Json(BaseResponse::<PatientResponse>::failure(
                    "Cartão SUS já cadastrado para outro paciente",
                )),
            )
                .into_response();
        }
        Ok(_) => {}
        Err(e) => return sql_failure("update_patient", e),
    }

    let new = NewPatient {
        full_name: &data.full_name,
        rg: &data.rg,
        cpf: &data.cpf,
        age: data.age,
        birth_date: data.birth_date,
        sus_card_number: &data.sus_card_number,
        phone_number: &data.phone_number,
        mother_name: &data.mother_name,
    };

    match Patient::update(pool, id, new).await {
        Ok(Some(patient)) => (
            StatusCode::OK,
            Json(BaseResponse::success_with_message(
                PatientResponse::from(&patient),
                "Paciente atualizado com sucesso",
            )),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<PatientResponse>::failure(
                "Paciente não encontrado",
            )),
        )
            .into_response(),
        Err(e) => sql_failure("update_patient", e),
    }
}

// GET /api/patients/{id}
async fn get_patient_by_id(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match Patient::find_by_id(&state.db.pool, id).await {
        Ok(Some(patient)) => (
            StatusCode::OK,
            Json(BaseResponse::success(PatientResponse::from(&patient))),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(BaseResponse::<PatientResponse>::failure(
                "Paciente não encontrado",
            )),
        )
            .into_response(),
        Err(e) => sql_failure("get_patient_by_id", e),
    }
}

// GET /api/patients/search?searchTerm=
async fn search_patients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Response {
    let term = params.search_term.trim();
    if term.is_empty() {
        return (
            StatusCode::OK,
            Json(BaseResponse::success(Vec::<PatientSearchResult>::new())),
        )
            .into_response();
    }

    match Patient::search(&state.db.pool, term).await {
        Ok(patients) => {
            let results: Vec<PatientSearchResult> =
                patients.iter().map(PatientSearchResult::from).collect();
            (StatusCode::OK, Json(BaseResponse::success(results))).into_response()
        }
        Err(e) => sql_failure("search_patients", e),
    }
}

// DELETE /api/patients/{id} (soft delete)
async fn delete_patient(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match Patient::deactivate(&state.db.pool, id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(BaseResponse::success_with_message(
                true,
                "Paciente removido com sucesso",
            )),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<bool>::failure("Paciente não encontrado")),
        )
            .into_response(),
        Err(e) => sql_failure("delete_patient", e),
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
    fn cpf_accepts_masked_and_plain_forms() {
        assert!(validate_cpf("529.982.247-25").is_ok());
        assert!(validate_cpf("52998224725").is_ok());
    }

    #[test]
    fn cpf_rejects_wrong_length_and_repeated_digits() {
        assert!(validate_cpf("1234567890").is_err());
        assert!(validate_cpf("111.111.111-11").is_err());
        assert!(validate_cpf("abc.def.ghi-jk").is_err());
    }

    #[test]
    fn sus_card_accepts_old_and_new_lengths() {
        assert!(validate_sus_card("123456789012345").is_ok());
        assert!(validate_sus_card("12345678901").is_ok());
        assert!(validate_sus_card("1234").is_err());
    }

    #[test]
    fn birth_date_must_be_in_the_past() {
        let yesterday = chrono::Local::now().date_naive() - chrono::Duration::days(1);
        let tomorrow = chrono::Local::now().date_naive() + chrono::Duration::days(1);
        assert!(validate_birth_date(&yesterday).is_ok());
        assert!(validate_birth_date(&tomorrow).is_err());
    }
}
