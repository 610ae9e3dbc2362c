pub mod patch;

use std::sync::Arc;

use bson::oid::ObjectId;
use log::info;
use thiserror::Error;

use crate::data::patch::{Merge, UpdateStudent};
use crate::mongo::models::student::{Student, StudentRecord};
use crate::store::{StoreError, StudentFilter, StudentStore};

pub type StoreType = Arc<Box<dyn StudentStore>>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("\"{0}\" is not a valid student id")]
    MalformedId(String),
    #[error("student {0} not found")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct Data {
    store: StoreType,
}

impl Data {
    pub fn new(store: Box<dyn StudentStore>) -> Self {
        Data {
            store: Arc::new(store),
        }
    }

    pub fn parse_id<S: AsRef<str>>(id: S) -> Result<ObjectId, DataError> {
        ObjectId::parse_str(id.as_ref()).map_err(|_| DataError::MalformedId(id.as_ref().into()))
    }

    pub async fn create_student(&self, student: Student) -> Result<ObjectId, DataError> {
        let id = self.store.insert(&student).await?;

        info!("Created student {}", id);

        Ok(id)
    }

    pub async fn list_students(&self, filter: StudentFilter) -> Result<Vec<Student>, DataError> {
        Ok(self
            .store
            .find(&filter)
            .await?
            .into_iter()
            .map(|record| record.student)
            .collect())
    }

    pub async fn get_student<S: AsRef<str>>(&self, id: S) -> Result<StudentRecord, DataError> {
        let object_id = Self::parse_id(id.as_ref())?;

        self.store
            .find_one(&object_id)
            .await?
            .ok_or_else(|| DataError::NotFound(id.as_ref().into()))
    }

    /// Merges `patch` into the stored student and writes the result back.
    ///
    /// Missing students are skipped silently. The read and the write are
    /// separate store calls, so concurrent patches of one student race and
    /// the last write wins.
    pub async fn update_student<S: AsRef<str>>(
        &self,
        id: S,
        patch: Option<UpdateStudent>,
    ) -> Result<(), DataError> {
        let object_id = Self::parse_id(id)?;

        let patch = match patch {
            Some(patch) => patch,
            None => return Ok(()),
        };

        match self.store.find_one(&object_id).await? {
            Some(record) => {
                let mut student = record.student;
                student.merge(patch);

                self.store.replace_one(&object_id, &student).await?;

                info!("Updated student {}", object_id);
            }
            None => info!("Skipping update of missing student {}", object_id),
        }

        Ok(())
    }

    pub async fn delete_student<S: AsRef<str>>(&self, id: S) -> Result<(), DataError> {
        let object_id = Self::parse_id(id)?;

        if self.store.delete_one(&object_id).await? == 1 {
            info!("Deleted student {}", object_id);
        }

        Ok(())
    }
}
