use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::borrow::Cow;
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::controllers::patients::PatientResponse;
use crate::controllers::{pdf_response, validation_messages, BaseResponse};
use crate::models::appointment::{treatment_description, NewAppointment};
use crate::models::{Appointment, Patient, User};
use crate::services::pdf::{self, ManifestEntry, PassengerKind, TicketData};
use crate::services::reports;
use crate::services::seats::{self, PRIORITY_SEAT_LIMIT};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/appointments", post(create_appointment))
        .route("/appointments", get(get_all_appointments))
        .route("/appointments/recent", get(get_recent_appointments))
        .route("/appointments/seat-availability", get(get_seat_availability))
        .route("/appointments/search", get(search_appointments))
        .route("/appointments/passenger-list-pdf", get(passenger_list_pdf))
        .route("/appointments/annual-report-pdf", get(annual_report_pdf))
        .route("/appointments/{id}", get(get_appointment_by_id))
        .route("/appointments/{id}", delete(delete_appointment))
        .route("/appointments/{id}/ticket", get(generate_ticket))
}

/* ---------- DTOs ---------- */

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_appointment_rules))]
struct CreateAppointmentRequest {
    patient_id: Uuid,
    #[validate(length(min = 1, max = 50, message = "Número do prontuário é obrigatório"))]
    medical_record_number: String,
    #[validate(length(min = 1, max = 200, message = "Hospital de destino é obrigatório"))]
    destination_hospital: String,
    #[validate(range(min = 1, max = 4, message = "Tipo de tratamento inválido"))]
    treatment_type: i32,
    treatment_type_other: Option<String>,
    #[serde(default)]
    is_priority: bool,
    #[validate(range(min = 1, max = 46, message = "Número da poltrona inválido"))]
    seat_number: i32,
    #[validate(custom(function = validate_appointment_date))]
    appointment_date: NaiveDateTime,
    companion_id: Option<Uuid>,
    #[validate(range(
        min = 1,
        max = 46,
        message = "Número da poltrona do acompanhante não existe"
    ))]
    companion_seat_number: Option<i32>,
    created_by_user_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentResponse {
    id: Uuid,
    patient: PatientResponse,
    medical_record_number: String,
    destination_hospital: String,
    treatment_type: String,
    treatment_type_other: Option<String>,
    is_priority: bool,
    seat_number: i32,
    appointment_date: NaiveDateTime,
    companion: Option<PatientResponse>,
    companion_seat_number: Option<i32>,
    created_by_user_name: String,
    created_at: NaiveDateTime,
    is_ticket_printed: bool,
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    date: NaiveDate,
    #[serde(rename = "isPriority", default)]
    is_priority: bool,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(rename = "searchTerm", default)]
    search_term: String,
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct YearQuery {
    year: i32,
}

/* ---------- validation rules ---------- */

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn validate_appointment_date(date: &NaiveDateTime) -> Result<(), ValidationError> {
    if date.date() < chrono::Local::now().date_naive() {
        return Err(rule_error("date", "Data não pode ser no passado"));
    }
    Ok(())
}

// Cross-field rules the seat checker deliberately leaves to this layer:
// companion seat presence, companion seat != patient seat, and companions
// never taking the priority seats.
fn validate_appointment_rules(req: &CreateAppointmentRequest) -> Result<(), ValidationError> {
    if req.treatment_type == 4 {
        let other = req.treatment_type_other.as_deref().unwrap_or("").trim();
        if other.is_empty() {
            return Err(rule_error("treatment", "Especifique o tipo de tratamento"));
        }
    }

    if req.companion_id.is_some() && req.companion_seat_number.is_none() {
        return Err(rule_error(
            "companion",
            "Poltrona do acompanhante é obrigatória",
        ));
    }

    if let Some(companion_seat) = req.companion_seat_number {
        if companion_seat == req.seat_number {
            return Err(rule_error(
                "companion",
                "Poltrona do acompanhante deve ser diferente da poltrona do paciente",
            ));
        }
        if companion_seat <= PRIORITY_SEAT_LIMIT {
            return Err(rule_error(
                "companion",
                "Poltronas 1, 2 e 3 não podem ser usadas por acompanhantes",
            ));
        }
    }

    Ok(())
}

/* ---------- response assembly ---------- */

async fn to_response(
    pool: &PgPool,
    appointment: &Appointment,
) -> Result<AppointmentResponse, sqlx::Error> {
    let patient = Patient::find_by_id(pool, appointment.patient_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    let user = User::find_by_id(pool, appointment.created_by_user_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

    let companion = match appointment.companion_id {
        Some(companion_id) => Patient::find_by_id(pool, companion_id).await?,
        None => None,
    };

    Ok(AppointmentResponse {
        id: appointment.id,
        patient: PatientResponse::from(&patient),
        medical_record_number: appointment.medical_record_number.clone(),
        destination_hospital: appointment.destination_hospital.clone(),
        treatment_type: treatment_description(appointment.treatment_type, None),
        treatment_type_other: appointment.treatment_type_other.clone(),
        is_priority: appointment.is_priority,
        seat_number: appointment.seat_number,
        appointment_date: appointment.appointment_date,
        companion: companion.as_ref().map(PatientResponse::from),
        companion_seat_number: appointment.companion_seat_number,
        created_by_user_name: user.full_name,
        created_at: appointment.created_at,
        is_ticket_printed: appointment.is_ticket_printed,
    })
}

async fn to_responses(
    pool: &PgPool,
    appointments: &[Appointment],
) -> Result<Vec<AppointmentResponse>, sqlx::Error> {
    let mut responses = Vec::with_capacity(appointments.len());
    for appointment in appointments {
        responses.push(to_response(pool, appointment).await?);
    }
    Ok(responses)
}

/* ---------- handlers ---------- */

// POST /api/appointments
async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAppointmentRequest>,
) -> Response {
    if let Err(errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BaseResponse::<AppointmentResponse>::failure_with_errors(
                "Dados inválidos",
                validation_messages(&errors),
            )),
        )
            .into_response();
    }

    let pool = &state.db.pool;

    match Patient::find_by_id(pool, req.patient_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request("Paciente não encontrado"),
        Err(e) => return sql_failure("create_appointment", e),
    }

    if let Some(companion_id) = req.companion_id {
        match Patient::find_by_id(pool, companion_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return bad_request("Acompanhante não encontrado"),
            Err(e) => return sql_failure("create_appointment", e),
        }
    }

    match User::find_by_id(pool, req.created_by_user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request("Usuário não encontrado"),
        Err(e) => return sql_failure("create_appointment", e),
    }

    // Seat check against the current occupancy of the travel day. There is
    // no lock between this check and the insert below; the unique index on
    // (day, seat) settles concurrent winners.
    let occupied = match seats::occupied_seats(pool, req.appointment_date.date()).await {
        Ok(occupied) => occupied,
        Err(e) => return sql_failure("create_appointment", e),
    };

    if let Err(rejection) = seats::validate_seat_request(
        &occupied,
        req.seat_number,
        req.is_priority,
        req.companion_seat_number,
    ) {
        return bad_request(&rejection.to_string());
    }

    let new = NewAppointment {
        patient_id: req.patient_id,
        medical_record_number: &req.medical_record_number,
        destination_hospital: &req.destination_hospital,
        treatment_type: req.treatment_type,
        treatment_type_other: req.treatment_type_other.as_deref(),
        is_priority: req.is_priority,
        seat_number: req.seat_number,
        appointment_date: req.appointment_date,
        companion_id: req.companion_id,
        companion_seat_number: req.companion_seat_number,
        created_by_user_id: req.created_by_user_id,
    };

    let appointment = match Appointment::insert(pool, new).await {
        Ok(appointment) => appointment,
        Err(e) => {
            // A unique violation here is a race lost between the check
            // above and this insert; surfaced as a generic failure.
            let unique_violation = e
                .as_database_error()
                .and_then(|db| db.code())
                .map(|code| code == "23505")
                .unwrap_or(false);
            if unique_violation {
                tracing::warn!(
                    "create_appointment lost seat race for {} seat {}",
                    req.appointment_date.date(),
                    req.seat_number
                );
            } else {
                tracing::error!("create_appointment insert error: {:?}", e);
            }
            return bad_request("Erro ao criar agendamento");
        }
    };

    match to_response(pool, &appointment).await {
        Ok(response) => (
            StatusCode::CREATED,
            Json(BaseResponse::success_with_message(
                response,
                "Agendamento criado com sucesso",
            )),
        )
            .into_response(),
        Err(e) => sql_failure("create_appointment", e),
    }
}

// GET /api/appointments
async fn get_all_appointments(State(state): State<Arc<AppState>>) -> Response {
    let pool = &state.db.pool;
    match Appointment::list_active(pool).await {
        Ok(appointments) => match to_responses(pool, &appointments).await {
            Ok(responses) => (StatusCode::OK, Json(BaseResponse::success(responses))).into_response(),
            Err(e) => sql_failure("get_all_appointments", e),
        },
        Err(e) => sql_failure("get_all_appointments", e),
    }
}

// GET /api/appointments/{id}
async fn get_appointment_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    let pool = &state.db.pool;
    match Appointment::find_by_id(pool, id).await {
        Ok(Some(appointment)) => match to_response(pool, &appointment).await {
            Ok(response) => (StatusCode::OK, Json(BaseResponse::success(response))).into_response(),
            Err(e) => sql_failure("get_appointment_by_id", e),
        },
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(BaseResponse::<AppointmentResponse>::failure(
                "Agendamento não encontrado",
            )),
        )
            .into_response(),
        Err(e) => sql_failure("get_appointment_by_id", e),
    }
}

// GET /api/appointments/recent?count=10
async fn get_recent_appointments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentQuery>,
) -> Response {
    let pool = &state.db.pool;
    let count = params.count.unwrap_or(10).clamp(1, 100);

    match Appointment::recent(pool, count).await {
        Ok(appointments) => match to_responses(pool, &appointments).await {
            Ok(responses) => (StatusCode::OK, Json(BaseResponse::success(responses))).into_response(),
            Err(e) => sql_failure("get_recent_appointments", e),
        },
        Err(e) => sql_failure("get_recent_appointments", e),
    }
}

// GET /api/appointments/seat-availability?date=&isPriority=
async fn get_seat_availability(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AvailabilityQuery>,
) -> Response {
    match seats::occupied_seats(&state.db.pool, params.date).await {
        Ok(occupied) => {
            let availability = seats::compute_availability(&occupied, params.is_priority);
            (StatusCode::OK, Json(BaseResponse::success(availability))).into_response()
        }
        Err(e) => sql_failure("get_seat_availability", e),
    }
}

// GET /api/appointments/search?searchTerm=
async fn search_appointments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Response {
    let pool = &state.db.pool;
    let term = params.search_term.trim();
    if term.is_empty() {
        return (
            StatusCode::OK,
            Json(BaseResponse::success(Vec::<AppointmentResponse>::new())),
        )
            .into_response();
    }

    match Appointment::search(pool, term).await {
        Ok(appointments) => match to_responses(pool, &appointments).await {
            Ok(responses) => (StatusCode::OK, Json(BaseResponse::success(responses))).into_response(),
            Err(e) => sql_failure("search_appointments", e),
        },
        Err(e) => sql_failure("search_appointments", e),
    }
}

// GET /api/appointments/{id}/ticket
async fn generate_ticket(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let pool = &state.db.pool;

    let appointment = match Appointment::find_by_id(pool, id).await {
        Ok(Some(appointment)) => appointment,
        Ok(None) => return bad_request("Agendamento não encontrado"),
        Err(e) => return sql_failure("generate_ticket", e),
    };

    let patient = match Patient::find_by_id(pool, appointment.patient_id).await {
        Ok(Some(patient)) => patient,
        Ok(None) => return bad_request("Paciente não encontrado"),
        Err(e) => return sql_failure("generate_ticket", e),
    };

    let companion = match appointment.companion_id {
        Some(companion_id) => match Patient::find_by_id(pool, companion_id).await {
            Ok(companion) => companion,
            Err(e) => return sql_failure("generate_ticket", e),
        },
        None => None,
    };

    let user = match User::find_by_id(pool, appointment.created_by_user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return bad_request("Usuário não encontrado"),
        Err(e) => return sql_failure("generate_ticket", e),
    };

    let bytes = match pdf::appointment_ticket(&TicketData {
        appointment: &appointment,
        patient: &patient,
        companion: companion.as_ref(),
        issued_by: &user,
    }) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("generate_ticket pdf error: {:?}", e);
            return bad_request("Erro ao gerar PDF");
        }
    };

    if let Err(e) = Appointment::mark_ticket_printed(pool, id).await {
        return sql_failure("generate_ticket", e);
    }

    pdf_response(bytes, &format!("passagem_{}.pdf", id))
}

// GET /api/appointments/passenger-list-pdf?date=
async fn passenger_list_pdf(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DateQuery>,
) -> Response {
    let pool = &state.db.pool;

    let appointments = match Appointment::by_date(pool, params.date).await {
        Ok(appointments) => appointments,
        Err(e) => return sql_failure("passenger_list_pdf", e),
    };

    if appointments.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(BaseResponse::<()>::failure(
                "Nenhum agendamento encontrado para esta data",
            )),
        )
            .into_response();
    }

    let mut entries = Vec::new();
    for appointment in &appointments {
        let patient = match Patient::find_by_id(pool, appointment.patient_id).await {
            Ok(Some(patient)) => patient,
            Ok(None) => continue,
            Err(e) => return sql_failure("passenger_list_pdf", e),
        };

        entries.push(ManifestEntry {
            seat_number: appointment.seat_number,
            full_name: patient.full_name,
            cpf: patient.cpf,
            kind: if appointment.is_priority {
                PassengerKind::PriorityPatient
            } else {
                PassengerKind::Patient
            },
        });

        if let (Some(companion_id), Some(companion_seat)) =
            (appointment.companion_id, appointment.companion_seat_number)
        {
            match Patient::find_by_id(pool, companion_id).await {
                Ok(Some(companion)) => entries.push(ManifestEntry {
                    seat_number: companion_seat,
                    full_name: companion.full_name,
                    cpf: companion.cpf,
                    kind: PassengerKind::Companion,
                }),
                Ok(None) => {}
                Err(e) => return sql_failure("passenger_list_pdf", e),
            }
        }
    }

    match pdf::passenger_list(&entries, params.date) {
        Ok(bytes) => pdf_response(
            bytes,
            &format!("lista_passageiros_{}.pdf", params.date.format("%Y-%m-%d")),
        ),
        Err(e) => {
            tracing::error!("passenger_list_pdf error: {:?}", e);
            bad_request("Erro ao gerar PDF")
        }
    }
}

// GET /api/appointments/annual-report-pdf?year=
async fn annual_report_pdf(
    State(state): State<Arc<AppState>>,
    Query(params): Query<YearQuery>,
) -> Response {
    let pool = &state.db.pool;

    let appointments = match Appointment::by_year(pool, params.year).await {
        Ok(appointments) => appointments,
        Err(e) => return sql_failure("annual_report_pdf", e),
    };

    let report = reports::build_annual_report(params.year, &appointments);

    match pdf::annual_report(&report) {
        Ok(bytes) => pdf_response(bytes, &format!("relatorio_anual_{}.pdf", params.year)),
        Err(e) => {
            tracing::error!("annual_report_pdf error: {:?}", e);
            bad_request("Erro ao gerar PDF")
        }
    }
}

// DELETE /api/appointments/{id} (soft delete; frees the seat for the day)
async fn delete_appointment(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match Appointment::deactivate(&state.db.pool, id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(BaseResponse::success_with_message(
                true,
                "Agendamento cancelado com sucesso",
            )),
        )
            .into_response(),
        Ok(false) => bad_request("Agendamento não encontrado"),
        Err(e) => sql_failure("delete_appointment", e),
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(BaseResponse::<()>::failure(message)),
    )
        .into_response()
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
    use chrono::Duration;

    fn valid_request() -> CreateAppointmentRequest {
        let date = (chrono::Local::now() + Duration::days(7))
            .naive_local()
            .date()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        CreateAppointmentRequest {
            patient_id: Uuid::new_v4(),
            medical_record_number: "55821".to_string(),
            destination_hospital: "Hospital Regional".to_string(),
            treatment_type: 1,
            treatment_type_other: None,
            is_priority: false,
            seat_number: 10,
            appointment_date: date,
            companion_id: None,
            companion_seat_number: None,
            created_by_user_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn seat_must_be_within_the_bus() {
        let mut req = valid_request();
        req.seat_number = 0;
        assert!(req.validate().is_err());
        req.seat_number = 47;
        assert!(req.validate().is_err());
    }

    #[test]
    fn date_in_the_past_is_rejected() {
        let mut req = valid_request();
        req.appointment_date = (chrono::Local::now() - Duration::days(1))
            .naive_local()
            .date()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn other_treatment_requires_description() {
        let mut req = valid_request();
        req.treatment_type = 4;
        assert!(req.validate().is_err());

        req.treatment_type_other = Some("Fisioterapia".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn companion_requires_a_seat() {
        let mut req = valid_request();
        req.companion_id = Some(Uuid::new_v4());
        assert!(req.validate().is_err());

        req.companion_seat_number = Some(11);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn companion_seat_must_differ_from_patient_seat() {
        let mut req = valid_request();
        req.companion_id = Some(Uuid::new_v4());
        req.companion_seat_number = Some(req.seat_number);
        assert!(req.validate().is_err());
    }

    #[test]
    fn companion_never_gets_a_priority_seat() {
        let mut req = valid_request();
        req.is_priority = true;
        req.seat_number = 1;
        req.companion_id = Some(Uuid::new_v4());
        req.companion_seat_number = Some(2);
        assert!(req.validate().is_err());

        req.companion_seat_number = Some(4);
        assert!(req.validate().is_ok());
    }
}
