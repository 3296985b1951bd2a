use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, status::Custom, Responder},
    Request,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while serving a request.
///
/// `Status` carries the expected, user-facing outcomes (validation failures,
/// unknown elections, duplicate votes, ...) verbatim; the transparent
/// variants are infrastructure failures and never leak their details.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::Status(Status::NotFound, format!("{} not found", what))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, message.into())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let (status, message) = match self {
            Self::Db(err) => {
                error!("Database error: {err}");
                (
                    Status::InternalServerError,
                    "Internal server error".to_string(),
                )
            }
            Self::Jwt(err) => {
                warn!("Rejected authentication token: {err}");
                (
                    Status::Unauthorized,
                    "Invalid authentication token".to_string(),
                )
            }
            Self::Status(status, message) => {
                warn!("{} {}: {message}", status.code, req.uri());
                (status, message)
            }
        };
        Custom(status, message).respond_to(req)
    }
}
