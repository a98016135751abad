//! Change submission: one branch, one commit adding one file, one pull request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::contract::{GithubApi, NewCommit, NewPullRequest};
use crate::error::{ApiError, Stage, SubmitError};

/// Body of every pull request opened by the bot.
pub const PULL_REQUEST_BODY: &str = "This pull request was opened automatically by twin-bot.\n\n\
    The entry was generated from the section template; please review the wording before merging.";

/// Branch name for a submission made at `now`: `<prefix>-<day><hour><minute><second>`.
///
/// Two submissions within the same second collide; branch creation then fails with an API error.
pub fn branch_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}-{}", now.format("%d%H%M%S"))
}

/// Where the new file goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTarget<'a> {
    pub repository_id: &'a str,
    /// `owner/name` of the same repository.
    pub repository_name_with_owner: &'a str,
    /// Commit the new branch starts at; also the expected head when committing.
    pub base_commit_id: &'a str,
}

/// Create a fresh branch at the base commit and commit `contents` as a new file at `path`.
///
/// Returns the name of the new branch.
pub async fn submit_commit<A>(
    api: &A,
    target: &CommitTarget<'_>,
    message: &str,
    path: &str,
    contents: &str,
    branch_prefix: &str,
    now: DateTime<Utc>,
) -> Result<String, SubmitError>
where
    A: GithubApi + ?Sized,
{
    let branch = branch_name(branch_prefix, now);

    info!(
        branch = %branch,
        base = %target.base_commit_id,
        repository = %target.repository_name_with_owner,
        "[SUBMIT] Creating submission branch"
    );
    let created = api
        .create_branch(&branch, target.base_commit_id, target.repository_id)
        .await
        .map_err(|e| SubmitError::api(Stage::CreateBranch, &branch, e))?;
    if created.name != branch {
        error!(
            requested = %branch,
            returned = %created.name,
            "[SUBMIT][ERROR] Branch creation returned a different ref"
        );
        return Err(SubmitError::api(
            Stage::CreateBranch,
            &branch,
            ApiError::rejected(
                "CreateBranch",
                format!("requested '{branch}', got '{}'", created.name),
            ),
        ));
    }

    let commit = NewCommit {
        repository_name_with_owner: target.repository_name_with_owner.to_string(),
        branch_name: branch.clone(),
        expected_head: target.base_commit_id.to_string(),
        message: message.to_string(),
        file_path: path.to_string(),
        base64_contents: STANDARD.encode(contents.as_bytes()),
    };

    info!(branch = %branch, path, "[SUBMIT] Committing entry");
    let committed = api
        .create_commit_on_branch(commit)
        .await
        .map_err(|e| SubmitError::api(Stage::Commit, path, e))?;
    info!(branch = %branch, oid = %committed.oid, "[SUBMIT] Commit created");

    Ok(branch)
}

/// Open a pull request from `head_ref` into `base_ref` and return its URL.
pub async fn open_pr<A>(
    api: &A,
    title: &str,
    repository_id: &str,
    head_ref: &str,
    base_ref: &str,
) -> Result<String, SubmitError>
where
    A: GithubApi + ?Sized,
{
    info!(head = %head_ref, base = %base_ref, "[SUBMIT] Opening pull request");
    let created = api
        .create_pull_request(NewPullRequest {
            title: title.to_string(),
            repository_id: repository_id.to_string(),
            head_ref: head_ref.to_string(),
            base_ref: base_ref.to_string(),
            body: PULL_REQUEST_BODY.to_string(),
        })
        .await
        .map_err(|e| SubmitError::api(Stage::OpenPullRequest, head_ref, e))?;
    info!(url = %created.url, "[SUBMIT] Pull request opened");
    Ok(created.url)
}
