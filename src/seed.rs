//! Sample data for a fresh deployment.
//!
//! Wipes every collection, then builds two professors, their seven courses
//! and five students through [`AttendanceService`]. Each student gets one
//! attendance record per enrolled course and up to five face images read from
//! `<image_dir>/<studentID>_image<n>.jpeg`.

use std::collections::HashMap;
use std::path::Path;

use uuid::Uuid;

use crate::err::Error;
use crate::service::{AttendanceService, ImageUpload, NewStudent, ServiceResult};

const IMAGES_PER_STUDENT: usize = 5;
const IMAGE_TYPE: &str = "image/jpeg";

const PROFESSORS: [(&str, &str, &str); 2] = [
    ("Sample", "Professor 1", "sample.professor1@torontomu.ca"),
    ("Sample", "Professor 2", "sample.professor2@torontomu.ca"),
];

const COURSES: [(&str, &str); 7] = [
    ("CPS209", "sample.professor1@torontomu.ca"),
    ("CPS511", "sample.professor1@torontomu.ca"),
    ("CPS706", "sample.professor1@torontomu.ca"),
    ("CPS813", "sample.professor1@torontomu.ca"),
    ("CPS721", "sample.professor1@torontomu.ca"),
    ("CPS899", "sample.professor2@torontomu.ca"),
    ("ELE888", "sample.professor2@torontomu.ca"),
];

struct SampleStudent {
    first_name: &'static str,
    last_name: &'static str,
    student_id: &'static str,
    email: &'static str,
    courses: &'static [&'static str],
}

const STUDENTS: [SampleStudent; 5] = [
    SampleStudent {
        first_name: "Gaurav",
        last_name: "Divecha",
        student_id: "501034331",
        email: "gdivecha@torontomu.ca",
        courses: &["CPS721"],
    },
    SampleStudent {
        first_name: "Mohammad",
        last_name: "Al-Shalabi",
        student_id: "501034332",
        email: "malshalabi@torontomu.ca",
        courses: &["CPS209"],
    },
    SampleStudent {
        first_name: "Jessica",
        last_name: "Singh",
        student_id: "500967855",
        email: "j16singh@torontomu.ca",
        courses: &["CPS511"],
    },
    SampleStudent {
        first_name: "Wasay",
        last_name: "Adil",
        student_id: "501112339",
        email: "wasay.adil@torontomu.ca",
        courses: &["CPS706"],
    },
    SampleStudent {
        first_name: "Feroz",
        last_name: "Naeem",
        student_id: "501037700",
        email: "f1naeem@torontomu.ca",
        courses: &["CPS813", "ELE888", "CPS706"],
    },
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub professors: usize,
    pub courses: usize,
    pub students: usize,
    pub attendance_records: usize,
    pub face_images: usize,
}

pub async fn load_sample_data(
    service: &AttendanceService,
    image_dir: &Path,
) -> ServiceResult<SeedSummary> {
    service.reset().await?;
    let mut summary = SeedSummary::default();

    for (first_name, last_name, email) in PROFESSORS {
        service.create_professor(first_name, last_name, email).await?;
        summary.professors += 1;
    }

    let mut course_ids = HashMap::new();
    for (code, professor_email) in COURSES {
        let id = service.create_course(code, professor_email).await?;
        course_ids.insert(code, id);
        summary.courses += 1;
    }

    for sample in STUDENTS.iter() {
        let courses = sample
            .courses
            .iter()
            .map(|code| {
                course_ids
                    .get(code)
                    .copied()
                    .map(|id| (*code, id))
                    .ok_or_else(|| Error::InvalidState(format!("Unknown sample course {}", code)))
            })
            .collect::<ServiceResult<Vec<(&str, Uuid)>>>()?;
        let (_, first_course) = match courses.first() {
            Some(first) => *first,
            None => continue,
        };

        let new = NewStudent {
            student_id: sample.student_id.to_string(),
            first_name: sample.first_name.to_string(),
            last_name: sample.last_name.to_string(),
            email: sample.email.to_string(),
        };
        let student = service.register(new, first_course).await?;
        for (_, course) in courses.iter().skip(1) {
            service.enroll(student, *course).await?;
        }
        summary.students += 1;

        for (code, _) in &courses {
            let record = service.create_attendance_record(code).await?;
            service.attach_attendance(student, record.id).await?;
            summary.attendance_records += 1;
        }

        let images = read_face_images(image_dir, sample.student_id).await;
        if !images.is_empty() {
            summary.face_images += service
                .upload_face_images(sample.student_id, images)
                .await?
                .len();
        }
    }

    log::info!("sample data loaded: {:?}", summary);
    Ok(summary)
}

async fn read_face_images(image_dir: &Path, student_id: &str) -> Vec<ImageUpload> {
    let mut images = Vec::new();
    for n in 1..=IMAGES_PER_STUDENT {
        let path = image_dir.join(format!("{}_image{}.jpeg", student_id, n));
        match tokio::fs::read(&path).await {
            Ok(data) => images.push(ImageUpload {
                data,
                content_type: IMAGE_TYPE.to_string(),
            }),
            Err(e) => log::warn!("Image file not found at {}: {}", path.display(), e),
        }
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::models::Student;
    use crate::store::{DocumentStore, MemoryStore, Repository};

    async fn image_dir(files: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("attendance-seed-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        for name in files {
            tokio::fs::write(dir.join(name), b"jpeg").await.unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn seeded_students_are_linked_to_courses_and_attendance() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let service = AttendanceService::new(store.clone());
        let dir = image_dir(&["501037700_image1.jpeg", "501037700_image2.jpeg"]).await;

        let summary = load_sample_data(&service, &dir).await.unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                professors: 2,
                courses: 7,
                students: 5,
                attendance_records: 7,
                face_images: 2,
            }
        );

        let feroz = service.lookup_by_student_id("501037700").await.unwrap().unwrap();
        let mut expected = Vec::new();
        for code in ["CPS813", "ELE888", "CPS706"] {
            expected.push(service.course_id_by_code(code).await.unwrap().unwrap());
        }
        assert_eq!(service.profile(feroz).await.unwrap().courses.to_vec(), expected);

        let students: Repository<Student> = Repository::new(store);
        let attendance = students.find(feroz).await.unwrap().unwrap().attendance.to_vec();
        assert_eq!(attendance.len(), 3);
        for record in attendance {
            service.attendance_timestamp(record).await.unwrap();
        }

        let images = service.face_images("501037700").await.unwrap();
        assert_eq!(images.len(), 2);
        assert!(images[0].data.starts_with("data:image/jpeg;base64,"));
        assert!(service.face_images("501034331").await.unwrap().is_empty());

        let cps706 = service.course_id_by_code("CPS706").await.unwrap().unwrap();
        assert_eq!(service.enrolled_student_ids(cps706).await.unwrap().len(), 2);
        let prof2 = service
            .course_ids_by_professor("sample.professor2@torontomu.ca")
            .await
            .unwrap();
        assert_eq!(prof2.len(), 2);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn reseeding_replaces_existing_documents() {
        let service = AttendanceService::new(Arc::new(MemoryStore::new()));
        service
            .create_professor("Extra", "Professor", "extra@torontomu.ca")
            .await
            .unwrap();
        let dir = image_dir(&[]).await;

        load_sample_data(&service, &dir).await.unwrap();
        let summary = load_sample_data(&service, &dir).await.unwrap();

        assert_eq!(summary.face_images, 0);
        assert_eq!(service.professor_ids().await.unwrap().len(), 2);
        assert!(service.professor_id("extra@torontomu.ca").await.is_err());
        assert!(service.lookup_by_student_id("500967855").await.unwrap().is_some());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
