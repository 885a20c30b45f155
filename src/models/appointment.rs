use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub medical_record_number: String,
    pub destination_hospital: String,
    pub treatment_type: i32,
    pub treatment_type_other: Option<String>,
    pub is_priority: bool,
    pub seat_number: i32,
    pub appointment_date: NaiveDateTime,
    pub companion_id: Option<Uuid>,
    pub companion_seat_number: Option<i32>,
    pub created_by_user_id: Uuid,
    pub is_ticket_printed: bool,
    pub printed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    pub is_active: bool,
}

// Treatment frequency codes used by the booking form (1..=4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreatmentType {
    Semanal,
    Mensal,
    Trimestral,
    Outro,
}

impl TreatmentType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Semanal),
            2 => Some(Self::Mensal),
            3 => Some(Self::Trimestral),
            4 => Some(Self::Outro),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Semanal => "Semanal",
            Self::Mensal => "Mensal",
            Self::Trimestral => "Trimestral",
            Self::Outro => "Outro",
        }
    }
}

// "Outro - <detail>" when the free-text field was filled in
pub fn treatment_description(code: i32, other: Option<&str>) -> String {
    let label = TreatmentType::from_code(code)
        .map(|t| t.label().to_string())
        .unwrap_or_else(|| code.to_string());

    match (TreatmentType::from_code(code), other) {
        (Some(TreatmentType::Outro), Some(detail)) if !detail.is_empty() => {
            format!("{} - {}", label, detail)
        }
        _ => label,
    }
}

pub struct NewAppointment<'a> {
    pub patient_id: Uuid,
    pub medical_record_number: &'a str,
    pub destination_hospital: &'a str,
    pub treatment_type: i32,
    pub treatment_type_other: Option<&'a str>,
    pub is_priority: bool,
    pub seat_number: i32,
    pub appointment_date: NaiveDateTime,
    pub companion_id: Option<Uuid>,
    pub companion_seat_number: Option<i32>,
    pub created_by_user_id: Uuid,
}

impl Appointment {
    pub async fn insert(pool: &PgPool, new: NewAppointment<'_>) -> Result<Appointment, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments
                (id, patient_id, medical_record_number, destination_hospital,
                 treatment_type, treatment_type_other, is_priority, seat_number,
                 appointment_date, companion_id, companion_seat_number, created_by_user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.patient_id)
        .bind(new.medical_record_number)
        .bind(new.destination_hospital)
        .bind(new.treatment_type)
        .bind(new.treatment_type_other)
        .bind(new.is_priority)
        .bind(new.seat_number)
        .bind(new.appointment_date)
        .bind(new.companion_id)
        .bind(new.companion_seat_number)
        .bind(new.created_by_user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Appointment>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_active(pool: &PgPool) -> Result<Vec<Appointment>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE is_active = TRUE ORDER BY created_at DESC",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn recent(pool: &PgPool, count: i64) -> Result<Vec<Appointment>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE is_active = TRUE ORDER BY created_at DESC LIMIT $1",
        )
        .bind(count)
        .fetch_all(pool)
        .await
    }

    // All active bookings whose timestamp falls on the given calendar day,
    // seat-ascending (the passenger list order)
    pub async fn by_date(pool: &PgPool, date: NaiveDate) -> Result<Vec<Appointment>, sqlx::Error> {
        let start = date.and_time(chrono::NaiveTime::MIN);
        let end = start + chrono::Duration::days(1);

        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE is_active = TRUE
              AND appointment_date >= $1
              AND appointment_date < $2
            ORDER BY seat_number
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
    }

    pub async fn by_year(pool: &PgPool, year: i32) -> Result<Vec<Appointment>, sqlx::Error> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| sqlx::Error::Protocol(format!("invalid year {}", year)))?
            .and_time(chrono::NaiveTime::MIN);
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)
            .ok_or_else(|| sqlx::Error::Protocol(format!("invalid year {}", year)))?
            .and_time(chrono::NaiveTime::MIN);

        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE is_active = TRUE
              AND appointment_date >= $1
              AND appointment_date < $2
            ORDER BY appointment_date
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
    }

    pub async fn search(pool: &PgPool, term: &str) -> Result<Vec<Appointment>, sqlx::Error> {
        let name_pattern = format!("%{}%", term.to_lowercase().trim());
        let doc_pattern = format!("%{}%", term.trim());

        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT a.* FROM appointments a
            JOIN patients p ON p.id = a.patient_id
            WHERE a.is_active = TRUE
              AND (LOWER(p.full_name) LIKE $1
                   OR p.cpf LIKE $2
                   OR p.sus_card_number LIKE $2
                   OR a.medical_record_number LIKE $2
                   OR LOWER(a.destination_hospital) LIKE $1)
            ORDER BY a.created_at DESC
            LIMIT 50
            "#,
        )
        .bind(name_pattern)
        .bind(doc_pattern)
        .fetch_all(pool)
        .await
    }

    pub async fn mark_ticket_printed(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE appointments
            SET is_ticket_printed = TRUE, printed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await
        .map(|r| r.rows_affected() > 0)
    }

    // Soft delete; the partial unique index releases the seat for that day
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query("UPDATE appointments SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn treatment_codes_map_to_labels() {
        assert_eq!(TreatmentType::from_code(1), Some(TreatmentType::Semanal));
        assert_eq!(TreatmentType::from_code(4), Some(TreatmentType::Outro));
        assert_eq!(TreatmentType::from_code(0), None);
        assert_eq!(TreatmentType::from_code(5), None);
        assert_eq!(TreatmentType::Trimestral.label(), "Trimestral");
    }

    #[test]
    fn other_treatment_appends_detail() {
        assert_eq!(treatment_description(2, None), "Mensal");
        assert_eq!(treatment_description(4, None), "Outro");
        assert_eq!(
            treatment_description(4, Some("Fisioterapia")),
            "Outro - Fisioterapia"
        );
        // Detail on a non-Outro type is ignored
        assert_eq!(treatment_description(1, Some("x")), "Semanal");
    }
}
