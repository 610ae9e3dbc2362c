use serde::de::DeserializeOwned;
use serde::Serialize;

use bson::Document as MongoDocument;

pub mod student;

pub trait Model: Send + Sync + Unpin + Serialize + DeserializeOwned {
    fn name() -> &'static str;

    fn to_document(&self) -> Result<MongoDocument, bson::ser::Error> {
        bson::to_document(self)
    }

    fn from_document(document: MongoDocument) -> Result<Self, bson::de::Error> {
        bson::from_document(document)
    }
}
