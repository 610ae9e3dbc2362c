use async_trait::async_trait;
use bson::oid::ObjectId;

use crate::mongo::models::student::{Student, StudentRecord};
use crate::mongo::models::Model;
use crate::mongo::MongoDB;
use crate::store::{StoreError, StudentFilter, StudentStore};

impl From<mongodb::error::Error> for StoreError {
    fn from(error: mongodb::error::Error) -> Self {
        StoreError::Unavailable(error.to_string())
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(error: bson::ser::Error) -> Self {
        StoreError::Corrupted(error.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(error: bson::de::Error) -> Self {
        StoreError::Corrupted(error.to_string())
    }
}

#[derive(Clone)]
pub struct MongoWrapper {
    mongo: MongoDB,
}

impl MongoWrapper {
    pub fn new(mongo: MongoDB) -> Self {
        Self { mongo }
    }
}

#[async_trait]
impl StudentStore for MongoWrapper {
    async fn insert(&self, student: &Student) -> Result<ObjectId, StoreError> {
        self.mongo
            .insert::<Student>(student.to_document()?)
            .await?
            .ok_or_else(|| StoreError::Corrupted("inserted id is not an ObjectId".into()))
    }

    async fn find(&self, filter: &StudentFilter) -> Result<Vec<StudentRecord>, StoreError> {
        self.mongo
            .find::<StudentRecord>(filter.to_document())
            .await?
            .into_iter()
            .map(|document| StudentRecord::from_document(document).map_err(StoreError::from))
            .collect()
    }

    async fn find_one(&self, id: &ObjectId) -> Result<Option<StudentRecord>, StoreError> {
        match self.mongo.find_one::<StudentRecord>(*id).await? {
            Some(document) => Ok(Some(StudentRecord::from_document(document)?)),
            None => Ok(None),
        }
    }

    async fn replace_one(&self, id: &ObjectId, student: &Student) -> Result<u64, StoreError> {
        Ok(self
            .mongo
            .replace_one::<Student>(*id, student.to_document()?)
            .await?)
    }

    async fn delete_one(&self, id: &ObjectId) -> Result<u64, StoreError> {
        Ok(self.mongo.delete_one::<Student>(*id).await?)
    }
}
