use bson::oid::ObjectId;

use crate::mongo::models::Model;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub country: String,
}

/// A student as posted by clients and persisted without its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    pub age: i64,
    pub address: Address,
}

/// A student read back from the store together with the `_id` it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(flatten)]
    pub student: Student,
}

impl StudentRecord {
    pub fn new(id: ObjectId, student: Student) -> Self {
        Self { id, student }
    }
}

impl Model for Student {
    fn name() -> &'static str {
        "students"
    }
}

impl Model for StudentRecord {
    fn name() -> &'static str {
        Student::name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student {
            name: "Ada".into(),
            age: 21,
            address: Address {
                city: "London".into(),
                country: "UK".into(),
            },
        }
    }

    #[test]
    fn student_document_has_no_identifier() {
        let document = student().to_document().expect("serializable student");

        assert!(!document.contains_key("_id"));
        assert_eq!(document.get_str("name").expect("name"), "Ada");
        assert_eq!(
            document
                .get_document("address")
                .and_then(|address| address.get_str("country"))
                .expect("address.country"),
            "UK"
        );
    }

    #[test]
    fn record_reads_identifier_and_fields() {
        let id = ObjectId::new();
        let mut document = student().to_document().expect("serializable student");
        document.insert("_id", id);

        let record = StudentRecord::from_document(document).expect("valid record");

        assert_eq!(record, StudentRecord::new(id, student()));
    }

    #[test]
    fn record_accepts_32_bit_ages() {
        let document = bson::doc! {
            "_id": ObjectId::new(),
            "name": "Grace",
            "age": 30_i32,
            "address": { "city": "Arlington", "country": "US" },
        };

        let record = StudentRecord::from_document(document).expect("valid record");

        assert_eq!(record.student.age, 30);
    }
}
