use core::fmt::{self, Display};
use tokio_postgres::error::SqlState;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// No row matched the given key, or a referenced parent row is missing.
    NotFound,
    /// The row was rejected by a table constraint.
    BadInput,
    /// Unrecoverable error.
    Fatal,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "Row not found.",
            Self::BadInput => "Row violates a table constraint.",
            Self::Fatal => "Unexpected database error.",
        })
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db) = err.as_db_error() {
            let code = db.code();
            if *code == SqlState::CHECK_VIOLATION || *code == SqlState::NOT_NULL_VIOLATION {
                return Self::BadInput;
            }
            if *code == SqlState::FOREIGN_KEY_VIOLATION {
                return Self::NotFound;
            }
        }
        log::error!("unexpected database error: {err}");
        Self::Fatal
    }
}

pub type Result<T> = core::result::Result<T, Error>;
