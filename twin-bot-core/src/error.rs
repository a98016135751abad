//! Error types shared by the transport contract and the submission pipeline.
//!
//! Two layers:
//! - [`ApiError`] is what a [`crate::contract::GithubApi`] implementation returns for a single call.
//!   It distinguishes a transport failure (network, HTTP status, undecodable body) from a
//!   well-formed rejection by the API (GraphQL `errors`, missing mutation payload).
//! - [`SubmitError`] is what the pipeline returns to its caller. API failures are wrapped with the
//!   stage and remote entity they happened at, so the caller can decide whether to re-run.

use std::fmt;
use thiserror::Error;

/// Failure of a single call against the remote API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Network or HTTP-level failure, including timeouts and undecodable responses.
    #[error("transport failure during {operation}: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// The API answered, but refused the operation.
    #[error("{operation} rejected by the API: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        ApiError::Transport {
            operation,
            message: message.into(),
        }
    }

    pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
        ApiError::Rejected {
            operation,
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }
}

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Reconcile,
    CreateBranch,
    Commit,
    OpenPullRequest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discovery => "discovery",
            Stage::Reconcile => "reconcile",
            Stage::CreateBranch => "create-branch",
            Stage::Commit => "commit",
            Stage::OpenPullRequest => "open-pull-request",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the submission pipeline.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Observed remote layout does not match the structure the pipeline relies on.
    #[error("shape mismatch: {detail}")]
    ShapeMismatch { detail: String },

    /// The API could not be reached. Re-running the whole pipeline is safe.
    #[error("transport failure at {stage} ({entity})")]
    TransportFailure {
        stage: Stage,
        entity: String,
        #[source]
        source: ApiError,
    },

    /// The API refused a specific operation, e.g. an expected-head mismatch on commit.
    #[error("API rejected {stage} ({entity})")]
    ApiRejection {
        stage: Stage,
        entity: String,
        #[source]
        source: ApiError,
    },

    /// The caller asked for something unsupported. No remote call was made.
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },
}

impl SubmitError {
    pub fn shape(detail: impl Into<String>) -> Self {
        SubmitError::ShapeMismatch {
            detail: detail.into(),
        }
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        SubmitError::InvalidArgument {
            detail: detail.into(),
        }
    }

    /// Wrap an [`ApiError`] with the stage and entity it was raised for.
    pub fn api(stage: Stage, entity: impl Into<String>, source: ApiError) -> Self {
        let entity = entity.into();
        if source.is_transport() {
            SubmitError::TransportFailure {
                stage,
                entity,
                source,
            }
        } else {
            SubmitError::ApiRejection {
                stage,
                entity,
                source,
            }
        }
    }

    /// Whether a whole-pipeline retry can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubmitError::TransportFailure { .. } | SubmitError::ApiRejection { .. }
        )
    }
}
