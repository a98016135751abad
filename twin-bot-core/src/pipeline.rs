//! High-level pipeline: submit one new entry to this week's digest.
//!
//! Orchestrates the read-only discovery of this week's pull requests, the ref reconciliation of
//! the fork, and the branch/commit/pull request that carries the new entry.
//!
//! # Stages
//! 1. Validate the request. Nothing remote happens for an unsupported section or plugin name.
//! 2. Discovery (read-only): the first open upstream pull request is the week's parent; every
//!    pull request after it is a sibling entry. Siblings give the section counters and the base
//!    path of this week's files.
//! 3. Reconciliation (mutating): the fork's branches are synced to upstream.
//! 4. Submission (mutating): new branch at the working branch tip, one commit, one pull request.
//!
//! # Error Handling
//! Every stage fails fast with a [`SubmitError`]. There is no rollback: a failure after stage 3
//! leaves the fork in sync with upstream, which is also where a re-run would put it, and a re-run
//! picks a new branch name.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{PrBase, PrTarget, SubmitConfig};
use crate::contract::{GithubApi, PullRequestSummary};
use crate::error::{Stage, SubmitError};
use crate::reconcile::reconcile;
use crate::sequence::{base_path, compute_counters};
use crate::submit::{open_pr, submit_commit, CommitTarget};

/// Content sections the bot can submit to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Section {
    NewPlugin,
    PluginUpdate,
}

impl Section {
    pub fn index(self) -> usize {
        match self {
            Section::NewPlugin => 3,
            Section::PluginUpdate => 4,
        }
    }

    /// Directory of the section below the week's base path.
    pub fn subdirectory(self) -> &'static str {
        match self {
            Section::NewPlugin => "3-new-plugins",
            Section::PluginUpdate => "4-updates",
        }
    }

    pub fn commit_message(self, plugin_name: &str) -> String {
        match self {
            Section::NewPlugin => format!("Add new plugin: {plugin_name}"),
            Section::PluginUpdate => format!("Add plugin update: {plugin_name}"),
        }
    }
}

impl TryFrom<u32> for Section {
    type Error = SubmitError;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        match index {
            3 => Ok(Section::NewPlugin),
            4 => Ok(Section::PluginUpdate),
            other => Err(SubmitError::invalid(format!(
                "section {other} is not supported, expected 3 (new plugin) or 4 (plugin update)"
            ))),
        }
    }
}

/// File-name form of a plugin name: `.nvim` suffix dropped, spaces and dots turned into hyphens.
pub fn canonical_plugin_name(plugin_name: &str) -> String {
    let trimmed = plugin_name.trim();
    let stem = trimmed.strip_suffix(".nvim").unwrap_or(trimmed);
    stem.replace([' ', '.'], "-")
}

/// What the caller wants submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub section_index: u32,
    pub plugin_name: String,
    pub file_contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    pub pull_request_url: String,
    pub branch: String,
    pub file_path: String,
}

/// Submit `request` now.
pub async fn submit<A>(
    api: &A,
    config: &SubmitConfig,
    request: &SubmissionRequest,
) -> Result<SubmissionResult, SubmitError>
where
    A: GithubApi + ?Sized,
{
    submit_at(api, config, request, Utc::now()).await
}

/// Submit `request` as if it were `now`; `now` only feeds the branch name.
pub async fn submit_at<A>(
    api: &A,
    config: &SubmitConfig,
    request: &SubmissionRequest,
    now: DateTime<Utc>,
) -> Result<SubmissionResult, SubmitError>
where
    A: GithubApi + ?Sized,
{
    // --- Stage 1: validate ---
    let section = Section::try_from(request.section_index)?;
    let file_stem = canonical_plugin_name(&request.plugin_name);
    if file_stem.is_empty() || file_stem.contains('/') {
        return Err(SubmitError::invalid(format!(
            "plugin name '{}' cannot be used as a file name",
            request.plugin_name
        )));
    }

    info!(
        section = section.index(),
        plugin = %request.plugin_name,
        "[SUBMIT] Starting submission pipeline"
    );

    // --- Stage 2: discovery ---
    let pull_requests = weekly_pull_requests(api).await?;
    let counters = compute_counters(&pull_requests, &config.contents_root)?;
    let base = base_path(&pull_requests, &config.contents_root)?;
    let sequence = counters.next(section.index())?;
    info!(
        base = %base,
        sequence,
        counters = ?counters.as_slice(),
        siblings = pull_requests.len(),
        "[SUBMIT] Discovery complete"
    );

    // --- Stage 3: reconcile ---
    let reconciled = reconcile(api, config).await?;

    // --- Stage 4: branch, commit, pull request ---
    let file_path = format!("{base}/{}/{sequence}-{file_stem}.md", section.subdirectory());
    let message = section.commit_message(&request.plugin_name);
    let fork_name_with_owner = config.fork_name_with_owner();

    let target = CommitTarget {
        repository_id: &reconciled.fork.id,
        repository_name_with_owner: &fork_name_with_owner,
        base_commit_id: &reconciled.working_branch.target_commit_id,
    };
    let branch = submit_commit(
        api,
        &target,
        &message,
        &file_path,
        &request.file_contents,
        &config.branch_prefix,
        now,
    )
    .await
    .map_err(|e| {
        error!(error = ?e, path = %file_path, "[SUBMIT][ERROR] Commit stage failed");
        e
    })?;

    let base_ref = match config.pr_base {
        PrBase::Working => reconciled.working_branch.name.as_str(),
        PrBase::Primary => config.primary_branch.as_str(),
    };
    let (repository_id, head_ref) = match config.pr_target {
        PrTarget::Upstream => (
            reconciled.upstream.id.as_str(),
            format!("{}:{branch}", reconciled.fork.owner),
        ),
        PrTarget::Fork => (reconciled.fork.id.as_str(), branch.clone()),
    };

    let pull_request_url = open_pr(api, &message, repository_id, &head_ref, base_ref).await?;

    let result = SubmissionResult {
        pull_request_url,
        branch,
        file_path,
    };
    match serde_json::to_string_pretty(&result) {
        Ok(json) => debug!(json = %json, "[SUBMIT][DEBUG] Submission result as JSON"),
        Err(e) => error!(error = ?e, "[SUBMIT][DEBUG] Failed to serialize submission result"),
    }
    Ok(result)
}

/// Every pull request after this week's parent, following pagination to the end.
pub async fn weekly_pull_requests<A>(api: &A) -> Result<Vec<PullRequestSummary>, SubmitError>
where
    A: GithubApi + ?Sized,
{
    let parent = api
        .get_first_open_pull_request()
        .await
        .map_err(|e| SubmitError::api(Stage::Discovery, "first open pull request", e))?
        .ok_or_else(|| SubmitError::shape("upstream has no open pull request"))?;
    info!(
        title = %parent.title,
        head = %parent.head_ref_name,
        "[SUBMIT] Found this week's parent pull request"
    );

    let mut cursor = parent.cursor;
    let mut pull_requests = Vec::new();
    loop {
        let page = api
            .get_pull_requests(&cursor)
            .await
            .map_err(|e| SubmitError::api(Stage::Discovery, format!("pull requests after {cursor}"), e))?;
        debug!(count = page.pull_requests.len(), "[SUBMIT] Fetched pull request page");

        let next_cursor = page.pull_requests.last().map(|pr| pr.cursor.clone());
        pull_requests.extend(page.pull_requests);
        match next_cursor {
            Some(next) if page.has_next_page => cursor = next,
            _ => break,
        }
    }
    Ok(pull_requests)
}
