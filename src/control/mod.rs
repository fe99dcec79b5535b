use actix_web::{
    web::{Form, Json},
    Either, HttpResponse,
};
use derive_more::{Display, Error};

pub mod catalog;
pub mod reseller_api;

pub type Response = Result<HttpResponse, ControllerError>;
pub type InputData<T> = Either<Form<T>, Json<T>>;

#[derive(Debug, Display, Error)]
pub enum ControllerError {
    NotFound,
    #[error(ignore)]
    InternalServerError(anyhow::Error),
    #[error(ignore)]
    #[display("Invalid field {field}")]
    InvalidInput {
        field: String,
        msg: String,
    },
}

impl From<anyhow::Error> for ControllerError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalServerError(err)
    }
}

impl From<actix::MailboxError> for ControllerError {
    fn from(err: actix::MailboxError) -> Self {
        Self::InternalServerError(err.into())
    }
}

impl From<vt_types::catalog::NotFound> for ControllerError {
    fn from(_: vt_types::catalog::NotFound) -> Self {
        Self::NotFound
    }
}

impl actix_web::error::ResponseError for ControllerError {
    fn error_response(&self) -> HttpResponse {
        log::warn!("{self:?}\n");
        use ControllerError::*;
        match self {
            NotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": "Not found"
            })),
            InternalServerError(err) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Internal server error",
                    "message": err.to_string()
                }))
            }
            InvalidInput { field, msg } => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid input",
                "field": field,
                "message": msg
            })),
        }
    }
}

pub async fn not_found() -> Response {
    Err(ControllerError::NotFound)
}
