use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Query};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::Error;
use crate::models::{EncodedImage, StudentProfile};
use crate::routes::{body, object_id, present, query, UploadLimit};
use crate::service::{AttendanceService, ImageUpload, NewStudent};
use crate::{breaks, created, proceeds, Payload};

const DEFAULT_IMAGE_TYPE: &str = "application/octet-stream";

pub async fn get_student(
    params: Result<Query<StudentKeyQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<StudentRef> {
    let query = query(params)?;
    let student_id = match present(&query.student_id) {
        Some(id) => id,
        None => return breaks(Error::validation("studentID query parameter is required")),
    };

    let student_id = service.lookup_by_student_id(student_id).await?;
    proceeds(StudentRef { student_id })
}

pub async fn get_student_information(
    params: Result<Query<StudentInformationQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<StudentProfile> {
    let query = query(params)?;
    let raw = match present(&query.student_object_id) {
        Some(raw) => raw,
        None => {
            return breaks(Error::validation(
                "studentObjectID query parameter is required",
            ))
        }
    };

    let student = object_id(raw, "studentObjectID")?;
    proceeds(service.profile(student).await?)
}

pub async fn create_student(
    Extension(service): Extension<AttendanceService>,
    payload: Result<Json<CreateStudent>, JsonRejection>,
) -> Payload<CreatedStudent> {
    let student = body(payload)?;
    let fields = (
        present(&student.first_name),
        present(&student.last_name),
        present(&student.email),
        present(&student.student_id),
        present(&student.course_object_id),
    );
    let (first_name, last_name, email, student_id, course) = match fields {
        (Some(f), Some(l), Some(e), Some(s), Some(c)) => (f, l, e, s, c),
        _ => {
            return breaks(Error::validation(
                "firstName, lastName, email, studentID, and courseObjectId are required",
            ))
        }
    };
    let course = object_id(course, "courseObjectId")?;

    let new = NewStudent {
        student_id: student_id.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
    };
    let student_id = service.register(new, course).await?;
    created(CreatedStudent { student_id })
}

fn membership(
    student: &Option<String>,
    course: &Option<String>,
    missing: &str,
) -> Result<(Uuid, Uuid), Error> {
    match (present(student), present(course)) {
        (Some(student), Some(course)) => Ok((
            object_id(student, "studentObjectId")?,
            object_id(course, "courseObjectId")?,
        )),
        _ => Err(Error::validation(missing)),
    }
}

pub async fn enroll_student_to_course(
    Extension(service): Extension<AttendanceService>,
    payload: Result<Json<Membership>, JsonRejection>,
) -> Payload<Message> {
    let req = body(payload)?;
    let (student, course) = membership(
        &req.student_object_id,
        &req.course_object_id,
        "studentObjectId and courseObjectId are required",
    )?;

    service.enroll(student, course).await?;
    proceeds(Message::new("Course successfully added to student"))
}

pub async fn is_student_enrolled_in_course(
    params: Result<Query<Membership>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<Enrollment> {
    let query = query(params)?;
    let (student, course) = membership(
        &query.student_object_id,
        &query.course_object_id,
        "studentObjectId and courseObjectId query parameters are required",
    )?;

    let student_has_course = service.is_enrolled(student, course).await?;
    proceeds(Enrollment { student_has_course })
}

pub async fn unenroll_student_from_course(
    Extension(service): Extension<AttendanceService>,
    payload: Result<Json<Membership>, JsonRejection>,
) -> Payload<Message> {
    let req = body(payload)?;
    let (student, course) = membership(
        &req.student_object_id,
        &req.course_object_id,
        "studentObjectId and courseObjectId are required",
    )?;

    service.unenroll(student, course).await?;
    proceeds(Message::new("Course successfully removed from student"))
}

pub async fn delete_student(
    params: Result<Query<StudentKeyQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<Message> {
    let query = query(params)?;
    let student_id = match present(&query.student_id) {
        Some(id) => id,
        None => return breaks(Error::validation("studentID query parameter is required")),
    };

    service.delete_student(student_id).await?;
    proceeds(Message::new("Student deleted successfully"))
}

pub async fn get_students_enrolled_in_course(
    params: Result<Query<CourseRefQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<Vec<Uuid>> {
    let query = query(params)?;
    let course = match present(&query.course_object_id) {
        Some(raw) => object_id(raw, "courseObjectId")?,
        None => {
            return breaks(Error::validation(
                "courseObjectId query parameter is required",
            ))
        }
    };

    proceeds(service.enrolled_student_ids(course).await?)
}

pub async fn get_student_face_images(
    params: Result<Query<StudentRefQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<Vec<EncodedImage>> {
    let query = query(params)?;
    let student = match present(&query.student_object_id) {
        Some(raw) => object_id(raw, "studentObjectId")?,
        None => {
            return breaks(Error::validation(
                "studentObjectId query parameter is required",
            ))
        }
    };

    proceeds(service.face_images_by_ref(student).await?)
}

pub async fn attach_attendance_to_student(
    Extension(service): Extension<AttendanceService>,
    payload: Result<Json<AttachAttendance>, JsonRejection>,
) -> Payload<AttendanceAttached> {
    let req = body(payload)?;
    let (student, attendance) = match (present(&req.student_id), present(&req.attendance_id)) {
        (Some(s), Some(a)) => (object_id(s, "studentId")?, object_id(a, "attendanceId")?),
        _ => return breaks(Error::validation("Both studentId and attendanceId are required")),
    };

    let newly_attached = service.attach_attendance(student, attendance).await?;
    proceeds(AttendanceAttached {
        message: "Attendance record successfully attached to student".to_string(),
        newly_attached,
    })
}

pub async fn upload_student_face_images(
    Extension(service): Extension<AttendanceService>,
    Extension(UploadLimit(limit)): Extension<UploadLimit>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Payload<UploadedImages> {
    let mut multipart = multipart
        .map_err(|e| Error::validation(format!("Expected a multipart form: {}", e)))?;
    let malformed = |e: axum::extract::multipart::MultipartError| {
        Error::validation(format!("Malformed multipart form: {}", e))
    };

    let mut student_id = None;
    let mut images = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("studentID") => student_id = Some(field.text().await.map_err(malformed)?),
            Some("images") => {
                if images.len() >= limit {
                    return breaks(Error::validation(format!(
                        "At most {} images can be uploaded at once",
                        limit
                    )));
                }
                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .unwrap_or_else(|| DEFAULT_IMAGE_TYPE.to_string());
                let data = field.bytes().await.map_err(malformed)?.to_vec();
                images.push(ImageUpload { data, content_type });
            }
            other => log::debug!("ignoring multipart field {:?}", other),
        }
    }

    let student_id = match present(&student_id) {
        Some(id) if !images.is_empty() => id.to_string(),
        _ => return breaks(Error::validation("studentID and images are required")),
    };

    let added = service.upload_face_images(&student_id, images).await?;
    proceeds(UploadedImages {
        message: format!("{} images uploaded successfully", added.len()),
        count: added.len(),
        student_id,
        added_images: added
            .iter()
            .map(|image| AddedImage {
                id: image.id,
                content_type: image.content_type.clone(),
                size: image.data.len(),
            })
            .collect(),
    })
}

pub async fn get_student_images(
    params: Result<Query<StudentKeyQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<StudentImages> {
    let query = query(params)?;
    let student_id = match present(&query.student_id) {
        Some(id) => id.trim(),
        None => return breaks(Error::validation("studentID is required")),
    };

    let images = service.face_images(student_id).await?;
    proceeds(StudentImages {
        message: format!("{} images retrieved successfully", images.len()),
        images,
    })
}

pub async fn delete_student_image(
    params: Result<Query<ImageQuery>, QueryRejection>,
    Extension(service): Extension<AttendanceService>,
) -> Payload<ImageDeleted> {
    let query = query(params)?;
    let (student_id, image) = match (present(&query.student_id), present(&query.image_id)) {
        (Some(s), Some(i)) => (s, i),
        _ => return breaks(Error::validation("studentID and imageID are required")),
    };

    service.delete_face_image(student_id, image).await?;
    proceeds(ImageDeleted {
        message: format!("Image with ID {} deleted successfully", image.trim()),
        student_id: student_id.to_string(),
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentKeyQuery {
    #[serde(rename = "studentID")]
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentInformationQuery {
    #[serde(rename = "studentObjectID")]
    pub student_object_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRefQuery {
    pub student_object_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRefQuery {
    pub course_object_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageQuery {
    #[serde(rename = "studentID")]
    pub student_id: Option<String>,
    #[serde(rename = "imageID")]
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudent {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "studentID")]
    pub student_id: Option<String>,
    pub course_object_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub student_object_id: Option<String>,
    pub course_object_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachAttendance {
    pub student_id: Option<String>,
    pub attendance_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedStudent {
    pub student_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub student_has_course: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceAttached {
    pub message: String,
    pub newly_attached: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedImage {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImages {
    pub message: String,
    pub count: usize,
    pub student_id: String,
    pub added_images: Vec<AddedImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentImages {
    pub message: String,
    pub images: Vec<EncodedImage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDeleted {
    pub message: String,
    pub student_id: String,
}
