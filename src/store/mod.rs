pub mod memory;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Document as MongoDocument};
use thiserror::Error;

use crate::mongo::models::student::{Student, StudentRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed stored document: {0}")]
    Corrupted(String),
}

/// Filters accepted by the student listing.
///
/// An empty `country` is treated as absent. `min_age` is inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentFilter {
    pub country: Option<String>,
    pub min_age: Option<i64>,
}

impl StudentFilter {
    pub fn new(country: Option<String>, min_age: Option<i64>) -> Self {
        Self {
            country: country.filter(|country| !country.is_empty()),
            min_age,
        }
    }

    pub fn to_document(&self) -> MongoDocument {
        let mut filter = MongoDocument::new();

        if let Some(ref country) = self.country {
            filter.insert("address.country", country.as_str());
        }

        if let Some(min_age) = self.min_age {
            filter.insert("age", doc! { "$gte": min_age });
        }

        filter
    }

    pub fn matches(&self, student: &Student) -> bool {
        self.country
            .as_ref()
            .map_or(true, |country| &student.address.country == country)
            && self.min_age.map_or(true, |min_age| student.age >= min_age)
    }
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn insert(&self, student: &Student) -> Result<ObjectId, StoreError>;

    async fn find(&self, filter: &StudentFilter) -> Result<Vec<StudentRecord>, StoreError>;

    async fn find_one(&self, id: &ObjectId) -> Result<Option<StudentRecord>, StoreError>;

    /// Replaces the stored student wholesale, returning how many documents matched.
    async fn replace_one(&self, id: &ObjectId, student: &Student) -> Result<u64, StoreError>;

    async fn delete_one(&self, id: &ObjectId) -> Result<u64, StoreError>;
}
