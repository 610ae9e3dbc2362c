#[macro_use]
extern crate serde_derive;

mod config;
mod data;
mod limiter;
mod mongo;
mod redis;
mod services;
mod store;

use std::io;

use actix_web::{
    middleware::{Logger, NormalizePath, TrailingSlash},
    web, App, HttpServer,
};
use clap::Parser;
use log::info;

use crate::config::{CacheBackend, Config, StoreBackend};
use crate::data::Data;
use crate::limiter::{CounterStore, RateLimiter};
use crate::mongo::wrapper::MongoWrapper;
use crate::mongo::MongoDB;
use crate::redis::Redis;
use crate::store::StudentStore;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path of the TOML configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    config: String,
}

fn startup_error<E: std::fmt::Display>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

async fn student_store(config: &Config) -> io::Result<Box<dyn StudentStore>> {
    let store: Box<dyn StudentStore> = match (config.service.store, config.mongo.as_ref()) {
        (StoreBackend::Mongo, Some(mongo)) => Box::new(MongoWrapper::new(
            MongoDB::new(mongo).await.map_err(startup_error)?,
        )),
        (StoreBackend::Mongo, None) => return Err(startup_error("missing [mongo] section")),
        (StoreBackend::Memory, _) => Box::new(store::memory::Memory::new()),
    };

    Ok(store)
}

async fn counter_store(config: &Config) -> io::Result<Box<dyn CounterStore>> {
    let counter: Box<dyn CounterStore> = match (config.service.cache, config.redis.as_ref()) {
        (CacheBackend::Redis, Some(redis)) => {
            Box::new(Redis::new(redis).await.map_err(startup_error)?)
        }
        (CacheBackend::Redis, None) => return Err(startup_error("missing [redis] section")),
        (CacheBackend::Memory, _) => Box::new(limiter::memory::Memory::new()),
    };

    Ok(counter)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::new(&args.config).map_err(startup_error)?;

    let _sentry = match config.sentry.as_ref() {
        Some(sentry) => Some(sentry::init(sentry::ClientOptions {
            dsn: Some(sentry.dsn.parse().map_err(startup_error)?),
            ..Default::default()
        })),
        None => None,
    };

    let data = Data::new(student_store(&config).await?);
    let limiter = RateLimiter::new(counter_store(&config).await?, config.rate_limit.clone());

    info!(
        "Listening on {}:{}",
        config.server.bind_address, config.server.bind_port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(data.clone()))
            .app_data(services::json_config())
            .app_data(services::query_config())
            .wrap(limiter.clone())
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .wrap(Logger::default())
            .configure(services::config)
    })
    .bind((config.server.bind_address.as_str(), config.server.bind_port))?
    .run()
    .await
}
