mod student;

use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use log::error;

use crate::data::DataError;
use crate::store::StoreError;

const STORE_FAILURE: &str = "internal storage error";

#[derive(Serialize)]
struct WsError {
    error: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    student::config(cfg);
}

fn validation_error(message: String) -> HttpResponse {
    HttpResponse::UnprocessableEntity().json(WsError { error: message })
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|e, _| {
        let response = validation_error(e.to_string());

        InternalError::from_response(e, response).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|e, _| {
        let response = validation_error(e.to_string());

        InternalError::from_response(e, response).into()
    })
}

impl ResponseError for DataError {
    fn status_code(&self) -> StatusCode {
        match self {
            DataError::MalformedId(_) => StatusCode::BAD_REQUEST,
            DataError::NotFound(_) => StatusCode::NOT_FOUND,
            DataError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DataError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            DataError::Store(e) => {
                error!("Store failure: {:#?}", e);

                if let StoreError::Corrupted(_) = e {
                    sentry::capture_error(e);
                }

                STORE_FAILURE.into()
            }
            _ => self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(WsError { error: message })
    }
}
