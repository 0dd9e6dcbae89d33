use actix_web::{http::header::ContentType, http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::persons::StoreError;

const ERROR_PAGE: &str = include_str!("../templates/error.html");

#[derive(Error, Debug)]
pub enum WebError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Unable to render page: {0}")]
    Render(#[from] tera::Error),
}

impl ResponseError for WebError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Details stay in the server log, the client only sees a generic page
    fn error_response(&self) -> HttpResponse {
        log::error!("Request failed: {}", self);

        HttpResponse::build(self.status_code())
            .content_type(ContentType::html())
            .body(ERROR_PAGE)
    }
}
