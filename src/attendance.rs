use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::Error;
use crate::routes::{body, object_id, present, query};
use crate::service::AttendanceService;
use crate::{breaks, created, proceeds, Payload};

pub async fn create_attendance_record(
    Extension(service): Extension<AttendanceService>,
    payload: Result<Json<CreateAttendance>, JsonRejection>,
) -> Payload<CreatedAttendance> {
    let req = body(payload)?;
    let course_code = match present(&req.course_code) {
        Some(code) => code,
        None => return breaks(Error::validation("courseCode is required")),
    };

    let record = service.create_attendance_record(course_code).await?;
    created(CreatedAttendance {
        attendance_id: record.id,
        course_code: record.course_code,
        timestamp: record.timestamp,
    })
}

pub async fn get_attendance_timestamp(
    params: Result<Query<AttendanceQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<AttendanceTimestamp> {
    let query = query(params)?;
    let attendance = match present(&query.attendance_id) {
        Some(raw) => object_id(raw, "attendanceId")?,
        None => {
            return breaks(Error::validation(
                "attendanceId query parameter is required",
            ))
        }
    };

    let timestamp = service.attendance_timestamp(attendance).await?;
    proceeds(AttendanceTimestamp { timestamp })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttendance {
    pub course_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub attendance_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAttendance {
    pub attendance_id: Uuid,
    pub course_code: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceTimestamp {
    pub timestamp: DateTime<Utc>,
}
