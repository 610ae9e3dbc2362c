use actix_web::{delete, get, patch, post, web, HttpResponse};
use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;

use crate::data::patch::UpdateStudent;
use crate::data::{Data, DataError};
use crate::mongo::models::student::{Address, Student, StudentRecord};
use crate::store::StudentFilter;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(create_student);
    cfg.service(list_students);
    cfg.service(fetch_student);
    cfg.service(update_student);
    cfg.service(delete_student);
}

#[derive(Serialize, Deserialize)]
struct CreatedStudent {
    id: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct StudentSummary {
    name: String,
    age: i64,
}

#[derive(Serialize, Deserialize)]
struct StudentCollection {
    data: Vec<StudentSummary>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct StudentResponse {
    id: String,
    name: String,
    age: i64,
    address: Address,
}

impl From<StudentRecord> for StudentResponse {
    fn from(record: StudentRecord) -> Self {
        Self {
            id: record.id.to_hex(),
            name: record.student.name,
            age: record.student.age,
            address: record.student.address,
        }
    }
}

#[derive(Deserialize)]
struct ListQuery {
    country: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    age: Option<i64>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(age) => age.parse().map(Some).map_err(D::Error::custom),
    }
}

#[derive(Serialize)]
struct Empty {}

#[post("/students")]
async fn create_student(
    data: web::Data<Data>,
    student: web::Json<Student>,
) -> Result<HttpResponse, DataError> {
    let id = data.create_student(student.into_inner()).await?;

    Ok(HttpResponse::Created().json(CreatedStudent { id: id.to_hex() }))
}

#[get("/students")]
async fn list_students(
    data: web::Data<Data>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, DataError> {
    let query = query.into_inner();
    let students = data
        .list_students(StudentFilter::new(query.country, query.age))
        .await?;

    Ok(HttpResponse::Ok().json(StudentCollection {
        data: students
            .into_iter()
            .map(|student| StudentSummary {
                name: student.name,
                age: student.age,
            })
            .collect(),
    }))
}

#[get("/students/{id}")]
async fn fetch_student(
    data: web::Data<Data>,
    id: web::Path<String>,
) -> Result<HttpResponse, DataError> {
    let record = data.get_student(id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(StudentResponse::from(record)))
}

#[patch("/students/{id}")]
async fn update_student(
    data: web::Data<Data>,
    id: web::Path<String>,
    bytes: web::Bytes,
) -> Result<HttpResponse, DataError> {
    let patch = if bytes.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<Option<UpdateStudent>>(&bytes)
            .map_err(|e| DataError::Invalid(e.to_string()))?
    };

    data.update_student(id.into_inner(), patch).await?;

    Ok(HttpResponse::NoContent().finish())
}

#[delete("/students/{id}")]
async fn delete_student(
    data: web::Data<Data>,
    id: web::Path<String>,
) -> Result<HttpResponse, DataError> {
    data.delete_student(id.into_inner()).await?;

    Ok(HttpResponse::Ok().json(Empty {}))
}
