//! Student aggregate service.
//!
//! Owns the rules for linking students to courses and attendance records and
//! for the face images embedded in a student document. Each operation touches
//! a single document: reads load it, mutations load it, change it and write it
//! back whole. Nothing cascades across collections.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::err::Error;
use crate::models::{
    Attendance, Course, EncodedImage, FaceImage, Professor, RefSet, Student, StudentProfile,
};
use crate::store::{DocumentStore, Repository};

pub type ServiceResult<T> = Result<T, Error>;

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone)]
pub struct AttendanceService {
    students: Repository<Student>,
    courses: Repository<Course>,
    professors: Repository<Professor>,
    attendances: Repository<Attendance>,
}

fn student_not_found() -> Error {
    Error::not_found("Student not found")
}

impl AttendanceService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            students: Repository::new(store.clone()),
            courses: Repository::new(store.clone()),
            professors: Repository::new(store.clone()),
            attendances: Repository::new(store),
        }
    }

    async fn student(&self, id: Uuid) -> ServiceResult<Student> {
        self.students.find(id).await?.ok_or_else(student_not_found)
    }

    async fn student_by_key(&self, student_id: &str) -> ServiceResult<Student> {
        self.students
            .find_by_key(student_id)
            .await?
            .ok_or_else(student_not_found)
    }

    async fn persist(&self, student: &Student) -> ServiceResult<()> {
        if self.students.save(student).await? {
            Ok(())
        } else {
            // deleted between our read and write
            Err(student_not_found())
        }
    }

    /// Empties every collection.
    pub async fn reset(&self) -> ServiceResult<()> {
        let removed = self.students.clear().await?
            + self.courses.clear().await?
            + self.professors.clear().await?
            + self.attendances.clear().await?;

        log::warn!("cleared {} document(s) from every collection", removed);
        Ok(())
    }

    pub async fn register(&self, new: NewStudent, initial_course: Uuid) -> ServiceResult<Uuid> {
        if self.students.find_by_key(&new.student_id).await?.is_some() {
            return Err(Error::Conflict(
                "Student with this studentID already exists".to_string(),
            ));
        }

        let student = Student {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            student_id: new.student_id,
            email: new.email,
            courses: RefSet::from_iter([initial_course]),
            face_images: Vec::new(),
            attendance: RefSet::new(),
        };
        self.students.insert(&student).await?;

        log::info!("registered student {} as {}", student.student_id, student.id);
        Ok(student.id)
    }

    pub async fn lookup_by_student_id(&self, student_id: &str) -> ServiceResult<Option<Uuid>> {
        log::debug!("looking up student {}", student_id);
        Ok(self
            .students
            .find_by_key(student_id)
            .await?
            .map(|student| student.id))
    }

    pub async fn profile(&self, student: Uuid) -> ServiceResult<StudentProfile> {
        Ok(self.student(student).await?.into())
    }

    pub async fn enroll(&self, student: Uuid, course: Uuid) -> ServiceResult<()> {
        let mut student = self.student(student).await?;
        if !student.courses.insert(course) {
            return Err(Error::Conflict(
                "Student is already enrolled in this course".to_string(),
            ));
        }
        self.persist(&student).await?;

        log::info!("enrolled student {} in course {}", student.student_id, course);
        Ok(())
    }

    pub async fn unenroll(&self, student: Uuid, course: Uuid) -> ServiceResult<()> {
        let mut student = self.student(student).await?;
        if !student.courses.remove(&course) {
            return Err(Error::InvalidState(
                "Course is not enrolled by the student".to_string(),
            ));
        }
        self.persist(&student).await?;

        log::info!("unenrolled student {} from course {}", student.student_id, course);
        Ok(())
    }

    pub async fn is_enrolled(&self, student: Uuid, course: Uuid) -> ServiceResult<bool> {
        Ok(self.student(student).await?.courses.contains(&course))
    }

    pub async fn enrolled_student_ids(&self, course: Uuid) -> ServiceResult<Vec<Uuid>> {
        Ok(self.students.ids_where("courses", course).await?)
    }

    /// Links an attendance record to a student. Returns `false` when it was
    /// already linked, in which case nothing is written.
    pub async fn attach_attendance(&self, student: Uuid, attendance: Uuid) -> ServiceResult<bool> {
        let mut student = self.student(student).await?;
        if !student.attendance.insert(attendance) {
            return Ok(false);
        }
        self.persist(&student).await?;

        log::info!(
            "attached attendance {} to student {}",
            attendance,
            student.student_id
        );
        Ok(true)
    }

    /// Appends every image to the student and returns the new entries.
    pub async fn upload_face_images(
        &self,
        student_id: &str,
        images: Vec<ImageUpload>,
    ) -> ServiceResult<Vec<FaceImage>> {
        if images.is_empty() {
            return Err(Error::validation("studentID and images are required"));
        }
        let mut student = self.student_by_key(student_id).await?;

        let added: Vec<FaceImage> = images
            .into_iter()
            .map(|image| FaceImage::new(image.data, image.content_type))
            .collect();
        student.face_images.extend(added.iter().cloned());
        self.persist(&student).await?;

        log::info!(
            "stored {} face image(s) for student {}",
            added.len(),
            student.student_id
        );
        Ok(added)
    }

    /// Images as `data:` URIs, looked up by `studentID`.
    pub async fn face_images(&self, student_id: &str) -> ServiceResult<Vec<EncodedImage>> {
        let student = self.student_by_key(student_id).await?;
        Ok(student
            .face_images
            .iter()
            .map(|image| image.encoded(true))
            .collect())
    }

    /// Images as bare base64, looked up by document id.
    pub async fn face_images_by_ref(&self, student: Uuid) -> ServiceResult<Vec<EncodedImage>> {
        let student = self.student(student).await?;
        Ok(student
            .face_images
            .iter()
            .map(|image| image.encoded(false))
            .collect())
    }

    /// The student is resolved first; an `image` id that does not parse
    /// matches nothing.
    pub async fn delete_face_image(&self, student_id: &str, image: &str) -> ServiceResult<()> {
        let mut student = self.student_by_key(student_id).await?;
        let image = image.trim();
        let target = Uuid::parse_str(image).ok();
        let before = student.face_images.len();
        student
            .face_images
            .retain(|existing| Some(existing.id) != target);
        if student.face_images.len() == before {
            return Err(Error::not_found("Image not found"));
        }
        self.persist(&student).await?;

        log::info!("deleted image {} of student {}", image, student.student_id);
        Ok(())
    }

    pub async fn delete_student(&self, student_id: &str) -> ServiceResult<Student> {
        let student = self
            .students
            .delete_by_key(student_id)
            .await?
            .ok_or_else(student_not_found)?;

        log::info!("deleted student {}", student.student_id);
        Ok(student)
    }

    pub async fn create_course(&self, course_code: &str, professor_email: &str) -> ServiceResult<Uuid> {
        if self.courses.find_by_key(course_code).await?.is_some() {
            return Err(Error::Conflict(
                "Course with this code already exists".to_string(),
            ));
        }

        let course = Course {
            id: Uuid::new_v4(),
            course_code: course_code.to_string(),
            professor_email: professor_email.to_string(),
        };
        self.courses.insert(&course).await?;

        log::info!("created course {} as {}", course.course_code, course.id);
        Ok(course.id)
    }

    pub async fn course_id_by_code(&self, course_code: &str) -> ServiceResult<Option<Uuid>> {
        Ok(self
            .courses
            .find_by_key(course_code)
            .await?
            .map(|course| course.id))
    }

    pub async fn course_ids_by_professor(&self, professor_email: &str) -> ServiceResult<Vec<Uuid>> {
        Ok(self
            .courses
            .ids_where("professorEmail", professor_email)
            .await?)
    }

    /// Students keep any reference to the deleted course.
    pub async fn delete_course(&self, course_code: &str) -> ServiceResult<Course> {
        let course = self
            .courses
            .delete_by_key(course_code)
            .await?
            .ok_or_else(|| Error::not_found("Course not found"))?;

        log::info!("deleted course {}", course.course_code);
        Ok(course)
    }

    pub async fn create_attendance_record(&self, course_code: &str) -> ServiceResult<Attendance> {
        let record = Attendance {
            id: Uuid::new_v4(),
            course_code: course_code.to_string(),
            timestamp: Utc::now(),
        };
        self.attendances.insert(&record).await?;

        log::info!("recorded attendance {} for {}", record.id, record.course_code);
        Ok(record)
    }

    pub async fn attendance_timestamp(&self, attendance: Uuid) -> ServiceResult<DateTime<Utc>> {
        self.attendances
            .find(attendance)
            .await?
            .map(|record| record.timestamp)
            .ok_or_else(|| Error::not_found("Attendance record not found"))
    }

    pub async fn create_professor(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> ServiceResult<Uuid> {
        if self.professors.find_by_key(email).await?.is_some() {
            return Err(Error::Conflict(
                "Professor with this email already exists".to_string(),
            ));
        }

        let professor = Professor {
            id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
        };
        self.professors.insert(&professor).await?;

        log::info!("created professor {} as {}", professor.email, professor.id);
        Ok(professor.id)
    }

    pub async fn professor_id(&self, email: &str) -> ServiceResult<Uuid> {
        self.professors
            .find_by_key(email)
            .await?
            .map(|professor| professor.id)
            .ok_or_else(|| Error::not_found("Professor not found"))
    }

    pub async fn professor_ids(&self) -> ServiceResult<Vec<Uuid>> {
        Ok(self.professors.ids().await?)
    }

    /// Courses naming this professor are left untouched.
    pub async fn delete_professor(&self, email: &str) -> ServiceResult<Professor> {
        let professor = self
            .professors
            .delete_by_key(email)
            .await?
            .ok_or_else(|| Error::not_found("Professor not found"))?;

        log::info!("deleted professor {}", professor.email);
        Ok(professor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> AttendanceService {
        AttendanceService::new(Arc::new(MemoryStore::new()))
    }

    fn new_student(student_id: &str) -> NewStudent {
        NewStudent {
            student_id: student_id.to_string(),
            first_name: "Gaurav".to_string(),
            last_name: "Divecha".to_string(),
            email: "gdivecha@torontomu.ca".to_string(),
        }
    }

    fn png(bytes: &[u8]) -> ImageUpload {
        ImageUpload {
            data: bytes.to_vec(),
            content_type: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts_and_keeps_first_record() {
        let svc = service();
        let course = Uuid::new_v4();
        let id = svc.register(new_student("S1"), course).await.unwrap();

        let mut again = new_student("S1");
        again.first_name = "Someone".to_string();
        let err = svc.register(again, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let profile = svc.profile(id).await.unwrap();
        assert_eq!(profile.first_name, "Gaurav");
        assert_eq!(profile.courses.to_vec(), vec![course]);
    }

    #[tokio::test]
    async fn lookup_misses_are_not_errors() {
        let svc = service();
        assert_eq!(svc.lookup_by_student_id("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn enroll_and_unenroll_keep_course_order() {
        let svc = service();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());
        let s1 = svc.register(new_student("S1"), c1).await.unwrap();

        svc.enroll(s1, c2).await.unwrap();
        assert_eq!(svc.profile(s1).await.unwrap().courses.to_vec(), vec![c1, c2]);
        assert!(svc.is_enrolled(s1, c2).await.unwrap());

        svc.unenroll(s1, c1).await.unwrap();
        assert_eq!(svc.profile(s1).await.unwrap().courses.to_vec(), vec![c2]);
        assert!(!svc.is_enrolled(s1, c1).await.unwrap());
    }

    #[tokio::test]
    async fn enrolling_twice_conflicts() {
        let svc = service();
        let s1 = svc.register(new_student("S1"), Uuid::new_v4()).await.unwrap();
        let course = Uuid::new_v4();

        svc.enroll(s1, course).await.unwrap();
        let err = svc.enroll(s1, course).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn unenroll_requires_existing_enrollment() {
        let svc = service();
        let s1 = svc.register(new_student("S1"), Uuid::new_v4()).await.unwrap();

        let err = svc.unenroll(s1, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn membership_ops_on_missing_student_are_not_found() {
        let svc = service();
        let ghost = Uuid::new_v4();
        let course = Uuid::new_v4();

        assert!(matches!(svc.profile(ghost).await, Err(Error::NotFound(_))));
        assert!(matches!(svc.enroll(ghost, course).await, Err(Error::NotFound(_))));
        assert!(matches!(svc.unenroll(ghost, course).await, Err(Error::NotFound(_))));
        assert!(matches!(svc.is_enrolled(ghost, course).await, Err(Error::NotFound(_))));
        assert!(matches!(
            svc.attach_attendance(ghost, Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn enrolled_students_are_listed_per_course() {
        let svc = service();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());
        let s1 = svc.register(new_student("S1"), c1).await.unwrap();
        let s2 = svc.register(new_student("S2"), c2).await.unwrap();
        svc.enroll(s2, c1).await.unwrap();

        assert_eq!(svc.enrolled_student_ids(c1).await.unwrap(), vec![s1, s2]);
        assert_eq!(svc.enrolled_student_ids(c2).await.unwrap(), vec![s2]);
        assert!(svc
            .enrolled_student_ids(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn attaching_attendance_twice_is_a_no_op() {
        let svc = service();
        let s1 = svc.register(new_student("S1"), Uuid::new_v4()).await.unwrap();
        let record = svc.create_attendance_record("CPS721").await.unwrap();

        assert!(svc.attach_attendance(s1, record.id).await.unwrap());
        assert!(!svc.attach_attendance(s1, record.id).await.unwrap());

        let student = svc.student(s1).await.unwrap();
        assert_eq!(student.attendance.to_vec(), vec![record.id]);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected_without_changes() {
        let svc = service();
        svc.register(new_student("S1"), Uuid::new_v4()).await.unwrap();

        let err = svc.upload_face_images("S1", Vec::new()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(svc.face_images("S1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_to_unknown_student_is_not_found() {
        let svc = service();
        let err = svc
            .upload_face_images("nobody", vec![png(b"x")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn uploads_append_with_distinct_ids() {
        let svc = service();
        svc.register(new_student("S1"), Uuid::new_v4()).await.unwrap();
        svc.upload_face_images("S1", vec![png(b"a")]).await.unwrap();

        let added = svc
            .upload_face_images("S1", vec![png(b"b"), png(b"c"), png(b"d")])
            .await
            .unwrap();
        assert_eq!(added.len(), 3);

        let images = svc.face_images("S1").await.unwrap();
        assert_eq!(images.len(), 4);
        let mut ids: Vec<Uuid> = images.iter().map(|image| image.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert_eq!(images[1].id, added[0].id);
        assert_eq!(images[1].data, "data:image/png;base64,Yg==");
    }

    #[tokio::test]
    async fn deleting_an_image_leaves_the_rest_intact() {
        let svc = service();
        let s1 = svc.register(new_student("S1"), Uuid::new_v4()).await.unwrap();
        let added = svc
            .upload_face_images("S1", vec![png(b"a"), png(b"b"), png(b"c")])
            .await
            .unwrap();

        svc.delete_face_image("S1", &added[1].id.to_string()).await.unwrap();

        let remaining: Vec<Uuid> = svc
            .face_images_by_ref(s1)
            .await
            .unwrap()
            .iter()
            .map(|image| image.id)
            .collect();
        assert_eq!(remaining, vec![added[0].id, added[2].id]);

        let err = svc.delete_face_image("S1", &added[1].id.to_string()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_student_leaves_courses_and_professors() {
        let svc = service();
        svc.create_professor("Sample", "Professor 1", "p1@torontomu.ca")
            .await
            .unwrap();
        let course = svc.create_course("CPS209", "p1@torontomu.ca").await.unwrap();
        svc.register(new_student("S1"), course).await.unwrap();

        svc.delete_student("S1").await.unwrap();

        assert_eq!(svc.lookup_by_student_id("S1").await.unwrap(), None);
        assert_eq!(svc.course_id_by_code("CPS209").await.unwrap(), Some(course));
        assert!(svc.professor_id("p1@torontomu.ca").await.is_ok());
        assert!(matches!(
            svc.delete_student("S1").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_a_course_keeps_stale_references() {
        let svc = service();
        let course = svc.create_course("CPS511", "p1@torontomu.ca").await.unwrap();
        let s1 = svc.register(new_student("S1"), course).await.unwrap();

        let deleted = svc.delete_course("CPS511").await.unwrap();
        assert_eq!(deleted.id, course);
        assert!(svc.is_enrolled(s1, course).await.unwrap());
        assert!(matches!(
            svc.delete_course("CPS511").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn course_codes_are_unique_and_indexed_by_professor() {
        let svc = service();
        let a = svc.create_course("CPS209", "p1@torontomu.ca").await.unwrap();
        svc.create_course("ELE888", "p2@torontomu.ca").await.unwrap();
        let b = svc.create_course("CPS511", "p1@torontomu.ca").await.unwrap();

        assert!(matches!(
            svc.create_course("CPS209", "p2@torontomu.ca").await,
            Err(Error::Conflict(_))
        ));
        assert_eq!(
            svc.course_ids_by_professor("p1@torontomu.ca").await.unwrap(),
            vec![a, b]
        );
        assert_eq!(svc.course_id_by_code("NOPE").await.unwrap(), None);
    }

    #[tokio::test]
    async fn attendance_timestamps_are_set_at_creation() {
        let svc = service();
        let before = Utc::now();
        let record = svc.create_attendance_record("CPS721").await.unwrap();

        let stamp = svc.attendance_timestamp(record.id).await.unwrap();
        assert_eq!(stamp, record.timestamp);
        assert!(stamp >= before);
        assert!(matches!(
            svc.attendance_timestamp(Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn professors_are_keyed_on_email() {
        let svc = service();
        let p1 = svc.create_professor("A", "B", "p1@x.ca").await.unwrap();
        let p2 = svc.create_professor("C", "D", "p2@x.ca").await.unwrap();

        assert!(matches!(
            svc.create_professor("E", "F", "p1@x.ca").await,
            Err(Error::Conflict(_))
        ));
        assert_eq!(svc.professor_id("p2@x.ca").await.unwrap(), p2);
        assert_eq!(svc.professor_ids().await.unwrap(), vec![p1, p2]);

        let deleted = svc.delete_professor("p1@x.ca").await.unwrap();
        assert_eq!(deleted.id, p1);
        assert!(matches!(
            svc.professor_id("p1@x.ca").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            svc.delete_professor("p1@x.ca").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_writers_last_save_wins() {
        let svc = service();
        let c1 = Uuid::new_v4();
        let s1 = svc.register(new_student("S1"), c1).await.unwrap();

        // two stale copies, as two interleaved requests would hold
        let mut first = svc.student(s1).await.unwrap();
        let mut second = svc.student(s1).await.unwrap();
        let (c2, c3) = (Uuid::new_v4(), Uuid::new_v4());
        first.courses.insert(c2);
        second.courses.insert(c3);
        svc.persist(&first).await.unwrap();
        svc.persist(&second).await.unwrap();

        let courses = svc.profile(s1).await.unwrap().courses.to_vec();
        assert_eq!(courses, vec![c1, c3]);
    }
}
