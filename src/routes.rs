use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::handler::Handler;
use axum::routing::{delete, get, post, put};
use axum::{middleware, Extension, Json, Router};
use uuid::Uuid;

use crate::auth::require_authorization;
use crate::config::Config;
use crate::err::{handler404, Error};
use crate::service::AttendanceService;
use crate::{attendance, course, professor, student};

/// Per-request cap on uploaded face images.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

pub fn router(service: AttendanceService, config: &Config) -> Router {
    let api = Router::new()
        .route("/api/student/getStudent", get(student::get_student))
        .route(
            "/api/student/getStudentInformation",
            get(student::get_student_information),
        )
        .route("/api/student/createStudent", post(student::create_student))
        .route(
            "/api/student/enrollStudentToCourse",
            put(student::enroll_student_to_course),
        )
        .route(
            "/api/student/isStudentEnrolledInCourse",
            get(student::is_student_enrolled_in_course),
        )
        .route(
            "/api/student/unenrollStudentFromCourse",
            put(student::unenroll_student_from_course),
        )
        .route("/api/student/deleteStudent", delete(student::delete_student))
        .route(
            "/api/student/getStudentsEnrolledInCourse",
            get(student::get_students_enrolled_in_course),
        )
        .route(
            "/api/student/getStudentFaceImages",
            get(student::get_student_face_images),
        )
        .route(
            "/api/student/attachAttendanceToStudent",
            put(student::attach_attendance_to_student),
        )
        .route(
            "/api/student/uploadStudentFaceImages",
            put(student::upload_student_face_images),
        )
        .route("/api/student/getStudentImages", get(student::get_student_images))
        .route(
            "/api/student/deleteStudentImage",
            delete(student::delete_student_image),
        )
        .route(
            "/api/course/getCourseFromCourseCode",
            get(course::get_course_from_course_code),
        )
        .route(
            "/api/course/getCoursesFromProfEmail",
            get(course::get_courses_from_prof_email),
        )
        .route("/api/course/createCourse", post(course::create_course))
        .route("/api/course/deleteCourse", delete(course::delete_course))
        .route(
            "/api/attendance/createAttendanceRecord",
            post(attendance::create_attendance_record),
        )
        .route(
            "/api/attendance/getAttendanceTimestamp",
            get(attendance::get_attendance_timestamp),
        )
        .route(
            "/api/professor/createProfessor",
            post(professor::create_professor),
        )
        .route("/api/professor/getProfessor", get(professor::get_professor))
        .route(
            "/api/professor/deleteProfessor",
            delete(professor::delete_professor),
        )
        .route_layer(middleware::from_fn(require_authorization));

    Router::new()
        .route("/", get(banner))
        .merge(api)
        .fallback(handler404.into_service())
        .layer(Extension(service))
        .layer(Extension(UploadLimit(config.max_upload_images)))
}

async fn banner() -> &'static str {
    "Attendance API is running"
}

/// Unwraps a JSON body, turning extractor rejections into a 400.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| Error::validation(format!("Malformed request body: {}", rejection)))
}

/// Unwraps query parameters, turning extractor rejections into a 400.
pub fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, Error> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| Error::validation(format!("Malformed query string: {}", rejection)))
}

/// A field counts as missing when absent or blank.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

pub fn object_id(raw: &str, field: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| Error::validation(format!("`{}` is not a valid id", field)))
}
