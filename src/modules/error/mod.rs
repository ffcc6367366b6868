// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::raise_error;
use bb8::RunError;
use code::ErrorCode;
use snafu::{Location, Snafu};

pub mod code;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RustMailerError {
    #[snafu(display("{message}"))]
    Generic {
        message: String,
        #[snafu(implicit)]
        location: Location,
        code: ErrorCode,
    },
}

pub type RustMailerResult<T, E = RustMailerError> = std::result::Result<T, E>;

impl From<RunError<RustMailerError>> for RustMailerError {
    fn from(e: RunError<RustMailerError>) -> Self {
        match e {
            RunError::User(e) => e,
            RunError::TimedOut => raise_error!(
                "Timed out while attempting to acquire a connection from the pool".into(),
                ErrorCode::ConnectionPoolTimeout
            ),
        }
    }
}

impl From<sqlx::Error> for RustMailerError {
    fn from(e: sqlx::Error) -> Self {
        raise_error!(format!("store error: {e:#?}"), ErrorCode::StoreError)
    }
}

impl RustMailerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RustMailerError::Generic { code, .. } => *code,
        }
    }

    pub fn log(&self) {
        match self {
            RustMailerError::Generic {
                message,
                location,
                code,
            } => {
                tracing::error!(
                    error_code = *code as u32,
                    error_message = %message,
                    error_location = ?location,
                    "operation failed"
                );
            }
        }
    }
}
