use bson::oid::ObjectId;
use bson::{doc, Document as MongoDocument};
use futures_lite::StreamExt;
use log::{error, info};
use mongodb::error::Error;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};

use crate::config::MongoConfig;
use crate::mongo::models::Model;

pub mod models;
pub mod wrapper;

#[derive(Clone)]
pub struct MongoDB {
    database: Database,
}

impl MongoDB {
    const MONGODB_STR: &'static str = "mongodb";
    const DEFAULT_PORT: u16 = 27017;

    pub async fn new(config: &MongoConfig) -> Result<Self, Error> {
        let connection_str = Self::connection_string(config);

        let options = ClientOptions::parse(connection_str.as_str()).await?;
        let client = Client::with_options(options)?;

        info!("Using MongoDB database \"{}\"", config.db_name);

        Ok(MongoDB {
            database: client.database(config.db_name.as_str()),
        })
    }

    fn connection_string(config: &MongoConfig) -> String {
        if let Some(ref connection_str) = config.string {
            return connection_str.clone();
        }

        let connection_str = format!(
            "{}:{}",
            config.host.as_deref().unwrap_or("localhost"),
            config.port.unwrap_or(Self::DEFAULT_PORT)
        );

        if let Some(ref user) = config.user {
            format!(
                "{}://{}:{}@{}",
                Self::MONGODB_STR,
                user,
                config.password.as_deref().unwrap_or(""),
                connection_str
            )
        } else {
            format!("{}://{}", Self::MONGODB_STR, connection_str)
        }
    }

    fn get_collection<T: Model>(&self) -> Collection<MongoDocument> {
        self.database.collection(T::name())
    }

    fn report(error: &Error, context: String) {
        error!("{}: {:#?}", context, error);

        sentry::capture_error(error);
    }

    pub async fn insert<T: Model>(&self, document: MongoDocument) -> Result<Option<ObjectId>, Error> {
        let result = self
            .get_collection::<T>()
            .insert_one(document, None)
            .await
            .map_err(|e| {
                Self::report(&e, format!("Error inserting into {}", T::name()));

                e
            })?;

        Ok(result.inserted_id.as_object_id())
    }

    pub async fn find<T: Model>(&self, filter: MongoDocument) -> Result<Vec<MongoDocument>, Error> {
        let mut cursor = self
            .get_collection::<T>()
            .find(filter.clone(), None)
            .await
            .map_err(|e| {
                Self::report(
                    &e,
                    format!("Error finding {} with filter {}", T::name(), filter),
                );

                e
            })?;

        let mut results = Vec::new();
        while let Some(document) = cursor.next().await {
            results.push(document.map_err(|e| {
                Self::report(&e, format!("Error reading {} cursor", T::name()));

                e
            })?);
        }

        Ok(results)
    }

    pub async fn find_one<T: Model>(&self, id: ObjectId) -> Result<Option<MongoDocument>, Error> {
        self.get_collection::<T>()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| {
                Self::report(&e, format!("Error getting {} with key {}", T::name(), id));

                e
            })
    }

    pub async fn replace_one<T: Model>(
        &self,
        id: ObjectId,
        document: MongoDocument,
    ) -> Result<u64, Error> {
        let result = self
            .get_collection::<T>()
            .replace_one(doc! { "_id": id }, document, None)
            .await
            .map_err(|e| {
                Self::report(&e, format!("Error replacing {} with key {}", T::name(), id));

                e
            })?;

        Ok(result.matched_count)
    }

    pub async fn delete_one<T: Model>(&self, id: ObjectId) -> Result<u64, Error> {
        let result = self
            .get_collection::<T>()
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| {
                Self::report(&e, format!("Error deleting {} with key {}", T::name(), id));

                e
            })?;

        Ok(result.deleted_count)
    }
}
