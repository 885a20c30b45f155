pub mod auth;
pub mod patients;
pub mod appointments;
pub mod users;
pub mod system;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use validator::{ValidationErrors, ValidationErrorsKind};

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(patients::routes())
        .merge(appointments::routes())
        .merge(users::routes())
        .merge(system::routes())
}

// Response envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct BaseResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl<T> BaseResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            errors: None,
        }
    }

    pub fn success_with_message(data: T, message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            data: Some(data),
            errors: None,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            data: None,
            errors: None,
        }
    }

    pub fn failure_with_errors(message: &str, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            data: None,
            errors: Some(errors),
        }
    }
}

// Flattens validator output into the plain list of messages the front end
// shows under "Dados inválidos"
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages = Vec::new();
    collect_messages(errors, &mut messages);
    messages
}

fn collect_messages(errors: &ValidationErrors, out: &mut Vec<String>) {
    for kind in errors.errors().values() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    out.push(message);
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(nested, out),
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    collect_messages(nested, out);
                }
            }
        }
    }
}

// Binary download response used by the PDF endpoints
pub fn pdf_response(bytes: Vec<u8>, filename: &str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(bytes))
        .unwrap()
}
