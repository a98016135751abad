//! # contract: interface to the GitHub GraphQL API
//!
//! This module defines the single trait ([`GithubApi`]) the pipeline talks to, and the plain data
//! types that cross it. The pipeline never sees GraphQL documents or HTTP: it only calls the
//! operations below and receives already-decoded values.
//!
//! ## Interface & Extensibility
//! - Implement [`GithubApi`] for a real transport (see the `twin-bot` binary crate) or a test fake.
//! - All methods are async and return [`ApiError`] on failure, keeping transport failures and API
//!   rejections apart.
//! - Owner and repository names are part of the implementor's configuration; only the owner varies
//!   per call, because the same repository name exists upstream and in the fork.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so consumers get a `MockGithubApi` in tests (and with the
//!   `test-export-mocks` feature, in dependent crates' tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mockall::automock;

use crate::error::ApiError;

/// A named pointer to a commit, as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    /// Short branch name, without the `refs/heads/` prefix.
    pub name: String,
    pub target_commit_id: String,
    /// Opaque node id, used to target ref mutations.
    pub node_id: String,
}

/// Repository id plus the most recent branch refs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRefs {
    pub repository_id: String,
    pub refs: Vec<Ref>,
}

/// The oldest open pull request of the upstream repository: the parent PR of the current week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstOpenPullRequest {
    pub cursor: String,
    pub id: String,
    pub title: String,
    pub head_ref_name: String,
}

/// One pull request as seen while scanning the weekly siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSummary {
    pub cursor: String,
    pub title: String,
    pub head_ref_name: String,
    /// At most the first five changed files. Exactly one is expected.
    pub changed_file_paths: Vec<String>,
}

/// A page of pull requests following some cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PullRequestPage {
    pub pull_requests: Vec<PullRequestSummary>,
    pub has_next_page: bool,
}

/// Input for a single-file commit onto an existing branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    /// `owner/name` of the repository holding the branch.
    pub repository_name_with_owner: String,
    pub branch_name: String,
    /// The commit must be rejected if the branch head is not this commit.
    pub expected_head: String,
    pub message: String,
    pub file_path: String,
    pub base64_contents: String,
}

/// The commit created by [`GithubApi::create_commit_on_branch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub oid: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    /// Repository the pull request is opened on.
    pub repository_id: String,
    /// Head branch, `owner:branch` when opened across forks.
    pub head_ref: String,
    pub base_ref: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPullRequest {
    pub id: String,
    pub url: String,
}

/// Operations the pipeline consumes from the GitHub GraphQL API.
///
/// Implementations must not retry: every failure is reported to the pipeline as-is.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Repository id and the last three `refs/heads/` refs of `owner`'s copy of the repository.
    async fn get_refs(&self, owner: &str) -> Result<RepositoryRefs, ApiError>;

    /// Branch `name` of `owner`'s copy of the repository, looked up directly, or `None` when it
    /// does not exist.
    async fn get_branch(&self, owner: &str, name: &str) -> Result<Option<Ref>, ApiError>;

    /// The first open pull request of the upstream repository, if any.
    async fn get_first_open_pull_request(
        &self,
    ) -> Result<Option<FirstOpenPullRequest>, ApiError>;

    /// Up to 40 upstream pull requests (open or closed) following `after_cursor`.
    async fn get_pull_requests(&self, after_cursor: &str) -> Result<PullRequestPage, ApiError>;

    /// Create branch `name` at `base_commit_id` in the given repository.
    async fn create_branch(
        &self,
        name: &str,
        base_commit_id: &str,
        repository_id: &str,
    ) -> Result<Ref, ApiError>;

    /// Point the ref `ref_id` at `target_commit_id`, overwriting its current target.
    async fn update_ref(&self, ref_id: &str, target_commit_id: &str) -> Result<(), ApiError>;

    /// Commit a single file addition onto an existing branch.
    async fn create_commit_on_branch(&self, commit: NewCommit) -> Result<CommitInfo, ApiError>;

    async fn create_pull_request(
        &self,
        pull_request: NewPullRequest,
    ) -> Result<CreatedPullRequest, ApiError>;
}
