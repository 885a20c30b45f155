use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Patient {
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
    pub updated_at: Option<NaiveDateTime>,
    pub is_active: bool,
}

pub struct NewPatient<'a> {
    pub full_name: &'a str,
    pub rg: &'a str,
    pub cpf: &'a str,
    pub age: i32,
    pub birth_date: NaiveDate,
    pub sus_card_number: &'a str,
    pub phone_number: &'a str,
    pub mother_name: &'a str,
}

impl Patient {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Patient>, sqlx::Error> {
        sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_cpf(pool: &PgPool, cpf: &str) -> Result<Option<Patient>, sqlx::Error> {
        sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE cpf = $1 AND is_active = TRUE")
            .bind(cpf)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_sus_card(
        pool: &PgPool,
        sus_card_number: &str,
    ) -> Result<Option<Patient>, sqlx::Error> {
        sqlx::query_as::<_, Patient>(
            "SELECT * FROM patients WHERE sus_card_number = $1 AND is_active = TRUE",
        )
        .bind(sus_card_number)
        .fetch_optional(pool)
        .await
    }

    // Name/document search for the booking screen autocomplete
    pub async fn search(pool: &PgPool, term: &str) -> Result<Vec<Patient>, sqlx::Error> {
        let name_pattern = format!("%{}%", term.to_lowercase());
        let doc_pattern = format!("%{}%", term.trim());

        sqlx::query_as::<_, Patient>(
            r#"
            SELECT * FROM patients
            WHERE is_active = TRUE
              AND (LOWER(full_name) LIKE $1
                   OR cpf LIKE $2
                   OR sus_card_number LIKE $2)
            ORDER BY full_name
            LIMIT 20
            "#,
        )
        .bind(name_pattern)
        .bind(doc_pattern)
        .fetch_all(pool)
        .await
    }

    pub async fn insert(pool: &PgPool, new: NewPatient<'_>) -> Result<Patient, sqlx::Error> {
        sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patients
                (id, full_name, rg, cpf, age, birth_date, sus_card_number, phone_number, mother_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.full_name)
        .bind(new.rg)
        .bind(new.cpf)
        .bind(new.age)
        .bind(new.birth_date)
        .bind(new.sus_card_number)
        .bind(new.phone_number)
        .bind(new.mother_name)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        new: NewPatient<'_>,
    ) -> Result<Option<Patient>, sqlx::Error> {
        sqlx::query_as::<_, Patient>(
            r#"
            UPDATE patients
            SET full_name = $2,
                rg = $3,
                cpf = $4,
                age = $5,
                birth_date = $6,
                sus_card_number = $7,
                phone_number = $8,
                mother_name = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new.full_name)
        .bind(new.rg)
        .bind(new.cpf)
        .bind(new.age)
        .bind(new.birth_date)
        .bind(new.sus_card_number)
        .bind(new.phone_number)
        .bind(new.mother_name)
        .fetch_optional(pool)
        .await
    }

    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query("UPDATE patients SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}
