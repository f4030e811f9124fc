mod problems;
mod submissions;
mod testcases;
mod users;

pub use problems::*;
pub use submissions::*;
pub use testcases::*;
pub use users::*;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub reason: &'static str,
    pub code: u32,
}

#[derive(Serialize)]
pub struct ErrorResponseWithMessage {
    pub reason: &'static str,
    pub code: u32,
    pub message: String,
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(ErrorResponse {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
    });
    InternalError::from_response(err, response).into()
}

pub(crate) fn external_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        reason: "ERR_EXTERNAL",
        code: 5,
    })
}

pub(crate) fn not_found(message: String) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponseWithMessage {
        reason: "ERR_NOT_FOUND",
        code: 3,
        message,
    })
}
