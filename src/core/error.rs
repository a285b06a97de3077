/// Error Module
///
/// Every failure that leaves the data layer is a classified [`Error`]: one of
/// four [`ErrorKind`]s plus a free-text detail. Driver failures are wrapped
/// into [`ErrorKind::Other`], except "no rows" which becomes
/// [`ErrorKind::NotFound`]. `BadRequest` and `Forbidden` are never produced
/// here; they exist so business logic can report validation and
/// authorization failures through the same downstream mapping.
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::core::db::ScanError;

/// The closed set of error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// The requested row does not exist
    NotFound,
    /// Caller input is invalid
    BadRequest,
    /// The operation is not allowed
    Forbidden,
    /// Anything else, including every unrecognized driver failure
    Other,
}

impl ErrorKind {
    /// Stable name of the kind, suitable for logs and wire formats.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::Other => "Other",
        }
    }

    /// HTTP status class a transport layer should report for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::BadRequest => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::Other => 500,
        }
    }

    /// Human readable reason phrase matching [`ErrorKind::status_code`].
    pub fn reason(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "Not Found",
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::Other => "Internal Server Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified data-layer error.
///
/// `Display` renders only the detail; the kind is exposed through
/// [`Error::kind`] so it never leaks into message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{detail}")]
pub struct Error {
    kind: ErrorKind,
    detail: String,
}

impl Error {
    /// Builds an error of the given kind.
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Error {
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, detail)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Error::new(ErrorKind::BadRequest, detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Error::new(ErrorKind::Forbidden, detail)
    }

    pub fn generic(detail: impl Into<String>) -> Self {
        Error::new(ErrorKind::Other, detail)
    }

    /// Wraps an optional raw failure. `None` stays `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rowtrip::core::Error;
    ///
    /// assert!(Error::wrap(None::<rusqlite::Error>).is_none());
    /// ```
    pub fn wrap<E: Into<Error>>(raw: Option<E>) -> Option<Error> {
        raw.map(Into::into)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Error::not_found(""),
            other => Error::generic(other.to_string()),
        }
    }
}

impl From<ScanError> for Error {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::NoRows => Error::not_found(""),
            other => Error::generic(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for Error {
    fn from(err: r2d2::Error) -> Self {
        Error::generic(err.to_string())
    }
}

/// Serializable error body for transport layers.
///
/// Field names follow the wire format consumers already expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorMessage {
    pub status_code: u16,
    pub message: String,
    pub detail: String,
}

impl From<&Error> for ErrorMessage {
    fn from(err: &Error) -> Self {
        ErrorMessage {
            status_code: err.kind.status_code(),
            message: err.kind.reason().to_string(),
            detail: err.detail.clone(),
        }
    }
}

/// Type alias for Result with the classified [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
