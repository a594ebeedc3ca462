use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::Error;
use crate::models::Course;
use crate::routes::{body, present, query};
use crate::service::AttendanceService;
use crate::{breaks, created, proceeds, Payload};

pub async fn get_course_from_course_code(
    params: Result<Query<CourseCodeQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<CourseRef> {
    let query = query(params)?;
    let code = match present(&query.course_code) {
        Some(code) => code,
        None => return breaks(Error::validation("courseCode query parameter is required")),
    };

    let course_id = service.course_id_by_code(code).await?;
    proceeds(CourseRef { course_id })
}

pub async fn get_courses_from_prof_email(
    params: Result<Query<ProfessorEmailQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<Vec<Uuid>> {
    let query = query(params)?;
    let email = match present(&query.professor_email) {
        Some(email) => email,
        None => {
            return breaks(Error::validation(
                "professorEmail query parameter is required",
            ))
        }
    };

    proceeds(service.course_ids_by_professor(email).await?)
}

pub async fn create_course(
    Extension(service): Extension<AttendanceService>,
    payload: Result<Json<CreateCourse>, JsonRejection>,
) -> Payload<CreatedCourse> {
    let course = body(payload)?;
    let (code, email) = match (present(&course.course_code), present(&course.professor_email)) {
        (Some(code), Some(email)) => (code, email),
        _ => {
            return breaks(Error::validation(
                "courseCode and professorEmail are required",
            ))
        }
    };

    let course_id = service.create_course(code, email).await?;
    created(CreatedCourse { course_id })
}

pub async fn delete_course(
    params: Result<Query<CourseCodeQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<CourseDeleted> {
    let query = query(params)?;
    let code = match present(&query.course_code) {
        Some(code) => code,
        None => return breaks(Error::validation("courseCode query parameter is required")),
    };

    let deleted_course = service.delete_course(code).await?;
    proceeds(CourseDeleted {
        message: "Course deleted successfully".to_string(),
        deleted_course,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseCodeQuery {
    pub course_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorEmailQuery {
    pub professor_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourse {
    pub course_code: Option<String>,
    pub professor_email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRef {
    pub course_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCourse {
    pub course_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDeleted {
    pub message: String,
    pub deleted_course: Course,
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::testing::{app, request, send};

    #[tokio::test]
    async fn course_crud() {
        let app = app();
        let create = |code: &str, email: &str| {
            request(
                Method::POST,
                "/api/course/createCourse",
                Some(json!({ "courseCode": code, "professorEmail": email })),
            )
        };

        let (status, body) = send(&app, create("CPS209", "p1@torontomu.ca")).await;
        assert_eq!(status, StatusCode::CREATED);
        let cps209 = body["courseId"].clone();
        send(&app, create("ELE888", "p2@torontomu.ca")).await;

        let (status, body) = send(&app, create("CPS209", "p2@torontomu.ca")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Course with this code already exists");

        let (_, body) = send(
            &app,
            request(
                Method::GET,
                "/api/course/getCourseFromCourseCode?courseCode=CPS209",
                None,
            ),
        )
        .await;
        assert_eq!(body["courseId"], cps209);

        let (_, body) = send(
            &app,
            request(
                Method::GET,
                "/api/course/getCoursesFromProfEmail?professorEmail=p1@torontomu.ca",
                None,
            ),
        )
        .await;
        assert_eq!(body, json!([cps209]));

        let (status, body) = send(
            &app,
            request(Method::DELETE, "/api/course/deleteCourse?courseCode=CPS209", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deletedCourse"]["courseCode"], "CPS209");

        let (status, _) = send(
            &app,
            request(Method::DELETE, "/api/course/deleteCourse?courseCode=CPS209", None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(
            &app,
            request(
                Method::GET,
                "/api/course/getCourseFromCourseCode?courseCode=CPS209",
                None,
            ),
        )
        .await;
        assert_eq!(body, json!({ "courseId": null }));
    }

    #[tokio::test]
    async fn course_fields_are_required() {
        let app = app();
        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/course/createCourse",
                Some(json!({ "courseCode": "CPS209" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "courseCode and professorEmail are required");

        let (status, _) = send(&app, request(Method::DELETE, "/api/course/deleteCourse", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
