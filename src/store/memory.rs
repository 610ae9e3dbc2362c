use std::collections::BTreeMap;
use std::sync::Arc;

use async_std::sync::RwLock;
use async_trait::async_trait;
use bson::oid::ObjectId;

use crate::mongo::models::student::{Student, StudentRecord};
use crate::store::{StoreError, StudentFilter, StudentStore};

type StudentMap = BTreeMap<ObjectId, Student>;

/// Process-local student store, ordered by identifier like a fresh collection.
#[derive(Clone, Default)]
pub struct Memory {
    students: Arc<RwLock<StudentMap>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StudentStore for Memory {
    async fn insert(&self, student: &Student) -> Result<ObjectId, StoreError> {
        let id = ObjectId::new();
        self.students.write().await.insert(id, student.clone());

        Ok(id)
    }

    async fn find(&self, filter: &StudentFilter) -> Result<Vec<StudentRecord>, StoreError> {
        Ok(self
            .students
            .read()
            .await
            .iter()
            .filter(|(_, student)| filter.matches(student))
            .map(|(id, student)| StudentRecord::new(*id, student.clone()))
            .collect())
    }

    async fn find_one(&self, id: &ObjectId) -> Result<Option<StudentRecord>, StoreError> {
        Ok(self
            .students
            .read()
            .await
            .get(id)
            .map(|student| StudentRecord::new(*id, student.clone())))
    }

    async fn replace_one(&self, id: &ObjectId, student: &Student) -> Result<u64, StoreError> {
        match self.students.write().await.get_mut(id) {
            Some(existing) => {
                *existing = student.clone();

                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, id: &ObjectId) -> Result<u64, StoreError> {
        match self.students.write().await.remove(id) {
            Some(_) => Ok(1),
            None => Ok(0),
        }
    }
}
