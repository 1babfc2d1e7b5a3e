// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use std::fmt;

pub mod apps {
    #[cfg(feature = "cie10-intake")]
    #[path = "cie10-intake/mod.rs"]
    pub mod cie10_intake;
}

pub mod app {
    #[cfg(feature = "cie10-intake")]
    pub use crate::apps::cie10_intake::*;
}

pub mod common;

/// Message returned to callers for every failure that is not their fault.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to process request";

/// Message returned for requests that match no route.
pub const ROUTE_NOT_FOUND_MESSAGE: &str = "Endpoint not found";

/// Implement IntoResponse for IntakeError.
impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        common::GatewayResponse::from(self).into_response()
    }
}

/// Intake errors enum.
#[derive(Debug)]
pub enum IntakeError {
    /// A required field is missing or empty. Surfaced as 400.
    ValidationError(String),
    /// The body could not be parsed as a JSON object.
    MalformedRequest(String),
    /// No handler for the method/path pair.
    RouteNotFound { method: String, path: String },
    /// The session store could not be reached or rejected a write. Never surfaced.
    PersistenceError(String),
    /// The external candidate service failed.
    CandidateServiceError(String),
    InternalError(String),
}

impl IntakeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IntakeError::ValidationError(_) => StatusCode::BAD_REQUEST,
            IntakeError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            IntakeError::MalformedRequest(_)
            | IntakeError::PersistenceError(_)
            | IntakeError::CandidateServiceError(_)
            | IntakeError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message safe to return to the caller. Internal detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            IntakeError::ValidationError(e) => e.clone(),
            IntakeError::RouteNotFound { .. } => ROUTE_NOT_FOUND_MESSAGE.to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl fmt::Display for IntakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntakeError::ValidationError(e) => write!(f, "{e}"),
            IntakeError::MalformedRequest(e) => write!(f, "Malformed request: {e}"),
            IntakeError::RouteNotFound { method, path } => {
                write!(f, "No route for {method} {path}")
            }
            IntakeError::PersistenceError(e) => write!(f, "Persistence error: {e}"),
            IntakeError::CandidateServiceError(e) => write!(f, "Candidate service error: {e}"),
            IntakeError::InternalError(e) => write!(f, "Internal error: {e}"),
        }
    }
}

impl std::error::Error for IntakeError {}
