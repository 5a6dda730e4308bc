// Copyright 2023 Remi Bernotavicius

use derive_more::Display;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Deserialize;

pub type Result<T> = std::result::Result<T, Error>;

/// Stable codes for the errors callers are expected to branch on.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    #[display("P2002")]
    UniqueConstraintFailed,
    #[display("P2003")]
    ForeignKeyConstraintFailed,
    #[display("P2011")]
    NullConstraintViolation,
    #[display("P2015")]
    RelatedRecordNotFound,
    #[display("P2024")]
    PoolTimeout,
    #[display("P2025")]
    RecordNotFound,
    #[display("P2028")]
    TransactionExpired,
}

impl ErrorCode {
    pub fn description(self) -> &'static str {
        match self {
            Self::UniqueConstraintFailed => "Unique constraint failed",
            Self::ForeignKeyConstraintFailed => "Foreign key constraint failed",
            Self::NullConstraintViolation => "Null constraint violation",
            Self::RelatedRecordNotFound => "A related record could not be found",
            Self::PoolTimeout => "Timed out fetching a connection from the pool",
            Self::RecordNotFound => "Record not found",
            Self::TransactionExpired => "Transaction expired",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{code}: {message}")]
    KnownRequest {
        code: ErrorCode,
        message: String,
        target: Option<String>,
    },
    #[error("UnknownRequest: `{0}`")]
    UnknownRequest(String),
    #[error("Initialization: `{0}`")]
    Initialization(String),
    #[error("Validation: `{0}`")]
    Validation(String),
}

macro_rules! validation {
    ($($arg:tt)*) => { $crate::error::Error::Validation(format!($($arg)*)) };
}

macro_rules! unknown {
    ($($arg:tt)*) => { $crate::error::Error::UnknownRequest(format!($($arg)*)) };
}

macro_rules! initialization {
    ($($arg:tt)*) => { $crate::error::Error::Initialization(format!($($arg)*)) };
}

pub(crate) use initialization;
pub(crate) use unknown;
pub(crate) use validation;

impl Error {
    pub fn known(code: ErrorCode, message: impl Into<String>, target: Option<String>) -> Self {
        Self::KnownRequest {
            code,
            message: message.into(),
            target,
        }
    }

    pub(crate) fn not_found(model: &str) -> Self {
        Self::known(
            ErrorCode::RecordNotFound,
            format!("No {model} record was found for the given key"),
            Some(model.to_owned()),
        )
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::KnownRequest { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(ErrorCode::RecordNotFound)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::KnownRequest { .. } => "known request error",
            Self::UnknownRequest(_) => "unknown request error",
            Self::Initialization(_) => "initialization error",
            Self::Validation(_) => "validation error",
        }
    }

    fn detail(&self) -> &str {
        match self {
            Self::KnownRequest { message, .. } => message,
            Self::UnknownRequest(m) | Self::Initialization(m) | Self::Validation(m) => m,
        }
    }

    /// Formats the error for people, in the given style.
    pub fn render(&self, format: ErrorFormat) -> String {
        let header = match self {
            Self::KnownRequest { code, .. } => format!("{}[{code}]", self.kind()),
            _ => self.kind().to_owned(),
        };
        let summary = match self {
            Self::KnownRequest { code, .. } => code.description(),
            _ => self.detail(),
        };
        let target = match self {
            Self::KnownRequest {
                target: Some(target),
                ..
            } => Some(target.as_str()),
            _ => None,
        };

        match format {
            ErrorFormat::Minimal => match target {
                Some(target) => format!("{header}: {} (target: {target})", self.detail()),
                None => format!("{header}: {}", self.detail()),
            },
            ErrorFormat::Colorless | ErrorFormat::Pretty => {
                let paint = |code: &str, s: &str| {
                    if format == ErrorFormat::Pretty {
                        format!("\x1b[{code}m{s}\x1b[0m")
                    } else {
                        s.to_owned()
                    }
                };
                let mut out = format!("{}: {}", paint("1;31", &header), paint("1", summary));
                if let Some(target) = target {
                    out += &format!("\n  {} {target}", paint("2", "-->"));
                }
                if summary != self.detail() {
                    out += &format!("\n  {}", self.detail());
                }
                out
            }
        }
    }
}

impl From<DieselError> for Error {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => Self::known(ErrorCode::RecordNotFound, "Record not found", None),
            DieselError::DatabaseError(kind, info) => {
                let message = info.message().to_owned();
                let code = match kind {
                    DatabaseErrorKind::UniqueViolation => Some(ErrorCode::UniqueConstraintFailed),
                    DatabaseErrorKind::ForeignKeyViolation => {
                        Some(ErrorCode::ForeignKeyConstraintFailed)
                    }
                    DatabaseErrorKind::NotNullViolation => Some(ErrorCode::NullConstraintViolation),
                    _ if message.starts_with("UNIQUE constraint failed") => {
                        Some(ErrorCode::UniqueConstraintFailed)
                    }
                    _ if message.starts_with("FOREIGN KEY constraint failed") => {
                        Some(ErrorCode::ForeignKeyConstraintFailed)
                    }
                    _ if message.starts_with("NOT NULL constraint failed") => {
                        Some(ErrorCode::NullConstraintViolation)
                    }
                    _ => None,
                };
                match code {
                    Some(code) => {
                        // SQLite names the offending `table.column` after the colon.
                        let target = message
                            .split_once(": ")
                            .map(|(_, target)| target.to_owned());
                        Self::known(code, message, target)
                    }
                    None => unknown!("{message}"),
                }
            }
            other => unknown!("{other}"),
        }
    }
}

impl From<diesel::r2d2::PoolError> for Error {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        Self::known(ErrorCode::PoolTimeout, e.to_string(), None)
    }
}

impl From<diesel::ConnectionError> for Error {
    fn from(e: diesel::ConnectionError) -> Self {
        initialization!("{e}")
    }
}

/// How [`Error::render`] lays out errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    #[default]
    Pretty,
    Colorless,
    Minimal,
}

#[cfg(test)]
struct SqliteInfo(&'static str);

#[cfg(test)]
impl diesel::result::DatabaseErrorInformation for SqliteInfo {
    fn message(&self) -> &str {
        self.0
    }

    fn details(&self) -> Option<&str> {
        None
    }

    fn hint(&self) -> Option<&str> {
        None
    }

    fn table_name(&self) -> Option<&str> {
        None
    }

    fn column_name(&self) -> Option<&str> {
        None
    }

    fn constraint_name(&self) -> Option<&str> {
        None
    }

    fn statement_position(&self) -> Option<i32> {
        None
    }
}

#[test]
fn maps_database_errors() {
    let unique: Error = DieselError::DatabaseError(
        DatabaseErrorKind::UniqueViolation,
        Box::new(SqliteInfo("UNIQUE constraint failed: categories.name")),
    )
    .into();
    assert_eq!(unique.code(), Some(ErrorCode::UniqueConstraintFailed));
    match &unique {
        Error::KnownRequest { target, .. } => {
            assert_eq!(target.as_deref(), Some("categories.name"))
        }
        other => panic!("unexpected error {other:?}"),
    }

    let foreign: Error = DieselError::DatabaseError(
        DatabaseErrorKind::Unknown,
        Box::new(SqliteInfo("FOREIGN KEY constraint failed")),
    )
    .into();
    assert_eq!(foreign.code(), Some(ErrorCode::ForeignKeyConstraintFailed));

    let other: Error = DieselError::DatabaseError(
        DatabaseErrorKind::Unknown,
        Box::new(SqliteInfo("no such table: nope")),
    )
    .into();
    assert!(matches!(other, Error::UnknownRequest(_)));

    let missing: Error = DieselError::NotFound.into();
    assert!(missing.is_not_found());
}

#[test]
fn render_formats() {
    let error = Error::known(
        ErrorCode::UniqueConstraintFailed,
        "UNIQUE constraint failed: users.email",
        Some("users.email".into()),
    );
    assert_eq!(
        error.render(ErrorFormat::Minimal),
        "known request error[P2002]: UNIQUE constraint failed: users.email (target: users.email)"
    );
    assert_eq!(
        error.render(ErrorFormat::Colorless),
        "known request error[P2002]: Unique constraint failed\n  \
         --> users.email\n  \
         UNIQUE constraint failed: users.email"
    );
    let pretty = error.render(ErrorFormat::Pretty);
    assert!(pretty.contains("\x1b[1;31m"));
    assert!(pretty.contains("users.email"));

    assert_eq!(
        validation!("field `{}` is not nullable", "name").render(ErrorFormat::Minimal),
        "validation error: field `name` is not nullable"
    );
}
