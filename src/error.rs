use std::collections::BTreeMap;
use std::io::Cursor;

use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder, Response};
use rocket::Request;
use thiserror::Error;

/// Failures from the persistence and throttle backends. Never shown to users.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database pool: {0}")]
    Pool(String),

    #[error("database query: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("redis: {0}")]
    Redis(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<rocket_db_pools::deadpool_redis::redis::RedisError> for StoreError {
    fn from(e: rocket_db_pools::deadpool_redis::redis::RedisError) -> Self {
        StoreError::Redis(e.to_string())
    }
}

impl From<rocket_db_pools::deadpool_redis::PoolError> for StoreError {
    fn from(e: rocket_db_pools::deadpool_redis::PoolError) -> Self {
        StoreError::Redis(e.to_string())
    }
}

/// Generic notice for a request the backend could not serve.
pub const TRY_AGAIN: &str = "Something went wrong. Please try again.";

/// Invite lookup outcome. `NotFound` and `Unavailable` read the same to the
/// guest; only a genuine miss counts against the client's lookup allowance.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    #[error("We couldn't find your invitation. Please check your code.")]
    NotFound,

    #[error("We couldn't find your invitation. Please check your code.")]
    Unavailable,

    #[error("Too many attempts. Please try again later.")]
    Throttled,
}

/// Field name to message, rendered next to the offending input.
pub type FieldErrors = BTreeMap<&'static str, String>;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Please complete the highlighted fields.")]
    Validation(FieldErrors),

    #[error("Your response is already being sent.")]
    InProgress,

    #[error("Something went wrong. Please try again.")]
    Store(#[source] StoreError),
}

impl SubmitError {
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            SubmitError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Malformed request")]
    BadRequest,

    #[error("Internal error")]
    Internal(#[from] StoreError),
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = match self {
            AppError::NotFound => Status::NotFound,
            AppError::BadRequest => Status::BadRequest,
            AppError::Internal(ref e) => {
                tracing::error!(error = %e, "request failed");
                Status::InternalServerError
            }
        };

        let body = self.to_string();
        Response::build()
            .status(status)
            .header(ContentType::Plain)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
