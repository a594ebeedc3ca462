use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use hashlink::LinkedHashSet;
use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{Collection, Document};

/// References to other documents, kept unique and in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct RefSet(LinkedHashSet<Uuid>);

impl RefSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.0.contains(id)
    }

    /// Appends `id` unless already present. Returns whether it was added.
    pub fn insert(&mut self, id: Uuid) -> bool {
        if self.0.contains(&id) {
            return false;
        }
        self.0.insert(id)
    }

    pub fn remove(&mut self, id: &Uuid) -> bool {
        self.0.remove(id)
    }

    pub fn to_vec(&self) -> Vec<Uuid> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<Uuid> for RefSet {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        let mut set = RefSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl Serialize for RefSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for id in self.0.iter() {
            seq.serialize_element(id)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for RefSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RefSetVisitor;

        impl<'de> Visitor<'de> for RefSetVisitor {
            type Value = RefSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array of ids")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<RefSet, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut set = RefSet::new();
                while let Some(id) = seq.next_element::<Uuid>()? {
                    set.insert(id);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(RefSetVisitor)
    }
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BASE64.decode(raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceImage {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub content_type: String,
}

impl FaceImage {
    pub fn new(data: Vec<u8>, content_type: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            data,
            content_type,
        }
    }

    pub fn encoded(&self, as_data_uri: bool) -> EncodedImage {
        let payload = BASE64.encode(&self.data);
        EncodedImage {
            id: self.id,
            data: if as_data_uri {
                format!("data:{};base64,{}", self.content_type, payload)
            } else {
                payload
            },
            content_type: self.content_type.clone(),
        }
    }
}

/// A face image ready for a JSON response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub data: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "studentID")]
    pub student_id: String,
    pub email: String,
    #[serde(default)]
    pub courses: RefSet,
    #[serde(default)]
    pub face_images: Vec<FaceImage>,
    #[serde(default)]
    pub attendance: RefSet,
}

impl Document for Student {
    const COLLECTION: Collection = Collection::Students;

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.student_id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(rename = "studentID")]
    pub student_id: String,
    pub courses: RefSet,
}

impl From<Student> for StudentProfile {
    fn from(student: Student) -> Self {
        Self {
            first_name: student.first_name,
            last_name: student.last_name,
            email: student.email,
            student_id: student.student_id,
            courses: student.courses,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub course_code: String,
    pub professor_email: String,
}

impl Document for Course {
    const COLLECTION: Collection = Collection::Courses;

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.course_code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Professor {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Document for Professor {
    const COLLECTION: Collection = Collection::Professors;

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_key(&self) -> Option<&str> {
        Some(&self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub course_code: String,
    pub timestamp: DateTime<Utc>,
}

impl Document for Attendance {
    const COLLECTION: Collection = Collection::Attendances;

    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_key(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ref_set_keeps_first_insertion_order() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut set = RefSet::new();
        assert!(set.insert(a));
        assert!(set.insert(b));
        assert!(!set.insert(a));
        assert!(set.insert(c));
        assert!(set.remove(&b));
        assert_eq!(set.to_vec(), vec![a, c]);
    }

    #[test]
    fn ref_set_collapses_duplicates_on_decode() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let set: RefSet = serde_json::from_value(json!([a, b, a])).unwrap();
        assert_eq!(set.to_vec(), vec![a, b]);
        assert_eq!(serde_json::to_value(&set).unwrap(), json!([a, b]));
    }

    #[test]
    fn student_documents_use_wire_field_names() {
        let student = Student {
            id: Uuid::new_v4(),
            first_name: "Jessica".to_string(),
            last_name: "Singh".to_string(),
            student_id: "500967855".to_string(),
            email: "j16singh@torontomu.ca".to_string(),
            courses: RefSet::new(),
            face_images: vec![FaceImage::new(vec![1, 2, 3], "image/png".to_string())],
            attendance: RefSet::new(),
        };
        let body = serde_json::to_value(&student).unwrap();

        assert_eq!(body["studentID"], "500967855");
        assert_eq!(body["firstName"], "Jessica");
        assert_eq!(body["faceImages"][0]["data"], "AQID");
        assert_eq!(body["faceImages"][0]["contentType"], "image/png");
        assert!(body.get("_id").is_some());
    }

    #[test]
    fn images_encode_as_plain_base64_or_data_uri() {
        let image = FaceImage::new(b"face".to_vec(), "image/jpeg".to_string());
        assert_eq!(image.encoded(false).data, "ZmFjZQ==");
        assert_eq!(
            image.encoded(true).data,
            "data:image/jpeg;base64,ZmFjZQ=="
        );
    }
}
