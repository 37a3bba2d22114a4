//! Mapping of errors to plain-text HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use snafu::Snafu;

use crate::{credentials, registrar};

/// Errors raised while extracting a request, before any handler logic runs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum RequestError {
    #[snafu(display("failed to parse the request body"))]
    InvalidBody {
        source: axum::extract::rejection::JsonRejection,
    },

    #[snafu(display("query parameter {name:?} has the invalid value {value:?}"))]
    InvalidQueryParameter {
        source: std::str::ParseBoolError,
        name: &'static str,
        value: String,
    },
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody { .. } | Self::InvalidQueryParameter { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl registrar::Error {
    pub fn status_code(&self) -> StatusCode {
        use registrar::Error;

        match self {
            Error::InvalidWebhook { .. }
            | Error::MissingRepository
            | Error::InvalidRepository { .. }
            | Error::MissingPipelineResource { .. }
            | Error::DuplicateName { .. }
            | Error::DuplicateRepositoryPipeline { .. } => StatusCode::BAD_REQUEST,

            Error::ReadCredential { source } => match source {
                credentials::Error::CredentialNotFound { .. }
                | credentials::Error::MissingKey { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },

            Error::NoWebhooks | Error::WebhookNotFound { .. } => StatusCode::NOT_FOUND,

            Error::LookupPipelineResource { .. }
            | Error::GetEventListener { .. }
            | Error::Subscribe { .. }
            | Error::Unsubscribe { .. }
            | Error::CreateEventListener { .. }
            | Error::UpdateEventListener { .. }
            | Error::DeleteEventListener { .. }
            | Error::WaitForEventListener { .. }
            | Error::EventListenerDisappeared
            | Error::CreateNetworkResource { .. }
            | Error::CreateNetworkResourceAndCleanup { .. }
            | Error::DeleteNetworkResource { .. }
            | Error::ListPipelineRuns { .. }
            | Error::DeletePipelineRun { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Which credential operation failed decides the status code, so the error is tagged with it.
#[derive(Debug)]
pub enum CredentialError {
    Create(credentials::Error),
    Delete(credentials::Error),
    List(credentials::Error),
}

impl CredentialError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Create(_) => StatusCode::BAD_REQUEST,
            Self::Delete(credentials::Error::CredentialNotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Delete(_) | Self::List(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn inner(&self) -> &credentials::Error {
        match self {
            Self::Create(source) | Self::Delete(source) | Self::List(source) => source,
        }
    }
}

fn plain_text_response(status: StatusCode, error: &(dyn std::error::Error + 'static)) -> Response {
    if status.is_server_error() {
        tracing::error!(%status, error, "request failed");
    } else {
        tracing::debug!(%status, error, "request rejected");
    }

    (status, snafu::Report::from_error(error).to_string()).into_response()
}

/// Any error a handler returns.
#[derive(Debug)]
pub enum ApiError {
    Request(RequestError),
    Registrar(registrar::Error),
    Credential(CredentialError),
}

impl From<RequestError> for ApiError {
    fn from(error: RequestError) -> Self {
        Self::Request(error)
    }
}

impl From<registrar::Error> for ApiError {
    fn from(error: registrar::Error) -> Self {
        Self::Registrar(error)
    }
}

impl From<CredentialError> for ApiError {
    fn from(error: CredentialError) -> Self {
        Self::Credential(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Request(error) => plain_text_response(error.status_code(), error),
            Self::Registrar(error) => plain_text_response(error.status_code(), error),
            Self::Credential(error) => plain_text_response(error.status_code(), error.inner()),
        }
    }
}
