use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

// Single-row table (id = 1) backing the global kill-switch
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemControl {
    pub id: i32,
    pub is_enabled: bool,
    pub message: Option<String>,
    pub last_changed: NaiveDateTime,
}

impl SystemControl {
    pub async fn get(pool: &PgPool) -> Result<Option<SystemControl>, sqlx::Error> {
        sqlx::query_as::<_, SystemControl>("SELECT * FROM system_control WHERE id = 1")
            .fetch_optional(pool)
            .await
    }

    pub async fn set(
        pool: &PgPool,
        is_enabled: bool,
        message: Option<&str>,
    ) -> Result<SystemControl, sqlx::Error> {
        sqlx::query_as::<_, SystemControl>(
            r#"
            INSERT INTO system_control (id, is_enabled, message, last_changed)
            VALUES (1, $1, $2, NOW())
            ON CONFLICT (id) DO UPDATE
            SET is_enabled = EXCLUDED.is_enabled,
                message = EXCLUDED.message,
                last_changed = NOW()
            RETURNING *
            "#,
        )
        .bind(is_enabled)
        .bind(message)
        .fetch_one(pool)
        .await
    }
}
