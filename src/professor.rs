use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::Error;
use crate::models::Professor;
use crate::routes::{body, present, query};
use crate::service::AttendanceService;
use crate::{breaks, created, proceeds, Payload};

pub async fn create_professor(
    Extension(service): Extension<AttendanceService>,
    payload: Result<Json<CreateProfessor>, JsonRejection>,
) -> Payload<ProfessorRef> {
    let professor = body(payload)?;
    let fields = (
        present(&professor.first_name),
        present(&professor.last_name),
        present(&professor.email),
    );
    let (first_name, last_name, email) = match fields {
        (Some(f), Some(l), Some(e)) => (f, l, e),
        _ => {
            return breaks(Error::validation(
                "firstName, lastName, and email are required",
            ))
        }
    };

    let professor_id = service.create_professor(first_name, last_name, email).await?;
    created(ProfessorRef { professor_id })
}

/// With `email`, the id of that professor; without, the ids of all of them.
pub async fn get_professor(
    params: Result<Query<EmailQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Result<Response, Error> {
    let query = query(params)?;
    match present(&query.email) {
        Some(email) => {
            let professor_id = service.professor_id(email).await?;
            Ok(proceeds(ProfessorRef { professor_id }).into_response())
        }
        None => Ok(proceeds(service.professor_ids().await?).into_response()),
    }
}

pub async fn delete_professor(
    params: Result<Query<EmailQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<ProfessorDeleted> {
    let query = query(params)?;
    let email = match present(&query.email) {
        Some(email) => email,
        None => return breaks(Error::validation("email query parameter is required")),
    };

    let deleted_professor = service.delete_professor(email).await?;
    proceeds(ProfessorDeleted {
        message: "Professor deleted successfully".to_string(),
        deleted_professor,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfessor {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorRef {
    pub professor_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorDeleted {
    pub message: String,
    pub deleted_professor: Professor,
}
