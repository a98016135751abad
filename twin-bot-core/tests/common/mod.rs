//! In-memory GitHub used by the pipeline tests.
//!
//! Keeps real ref state per repository so reconciliation can be run repeatedly and the resulting
//! fork state compared, and records every call in order.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use twin_bot_core::contract::{
    CommitInfo, CreatedPullRequest, FirstOpenPullRequest, GithubApi, NewCommit, NewPullRequest,
    PullRequestPage, PullRequestSummary, Ref, RepositoryRefs,
};
use twin_bot_core::error::ApiError;

pub const UPSTREAM: &str = "phaazon";
pub const FORK: &str = "amar1729";
pub const REPOSITORY: &str = "this-week-in-neovim-contents";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetRefs(String),
    GetBranch {
        owner: String,
        name: String,
    },
    FirstOpenPullRequest,
    PullRequests(String),
    CreateBranch {
        name: String,
        base: String,
        repository_id: String,
    },
    UpdateRef {
        ref_id: String,
        target: String,
    },
    Commit(NewCommit),
    PullRequest(NewPullRequest),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateBranch { .. } | Call::UpdateRef { .. } | Call::Commit(_) | Call::PullRequest(_)
        )
    }
}

#[derive(Debug, Clone)]
struct FakeRepo {
    id: String,
    refs: Vec<Ref>,
}

#[derive(Debug, Default)]
struct FakeState {
    repos: HashMap<String, FakeRepo>,
    parent: Option<FirstOpenPullRequest>,
    pages: HashMap<String, PullRequestPage>,
    calls: Vec<Call>,
    commits: u32,
    pull_requests: u32,
    reject_commits: bool,
}

#[derive(Debug, Default)]
pub struct FakeGithub {
    state: Mutex<FakeState>,
}

pub fn git_ref(owner: &str, name: &str, target: &str) -> Ref {
    Ref {
        name: name.to_string(),
        target_commit_id: target.to_string(),
        node_id: format!("{owner}/{name}"),
    }
}

pub fn pull_request(cursor: &str, paths: &[&str]) -> PullRequestSummary {
    PullRequestSummary {
        cursor: cursor.to_string(),
        title: format!("entry {cursor}"),
        head_ref_name: format!("branch-{cursor}"),
        changed_file_paths: paths.iter().map(|p| p.to_string()).collect(),
    }
}

impl FakeGithub {
    /// Upstream with `upstream_refs`, a fork with `fork_refs`, and this week's parent pull request
    /// at cursor `parent`.
    pub fn new(upstream_refs: &[(&str, &str)], fork_refs: &[(&str, &str)]) -> Self {
        let mut state = FakeState::default();
        state.repos.insert(
            UPSTREAM.to_string(),
            FakeRepo {
                id: "R_upstream".to_string(),
                refs: upstream_refs
                    .iter()
                    .map(|(name, target)| git_ref(UPSTREAM, name, target))
                    .collect(),
            },
        );
        state.repos.insert(
            FORK.to_string(),
            FakeRepo {
                id: "R_fork".to_string(),
                refs: fork_refs
                    .iter()
                    .map(|(name, target)| git_ref(FORK, name, target))
                    .collect(),
            },
        );
        state.parent = Some(FirstOpenPullRequest {
            cursor: "parent".to_string(),
            id: "PR_parent".to_string(),
            title: "TWiN 2024-05-01".to_string(),
            head_ref_name: "twin-2024-05-01".to_string(),
        });
        FakeGithub {
            state: Mutex::new(state),
        }
    }

    /// Serve `pull_requests` as the page following `after`.
    pub fn with_page(
        self,
        after: &str,
        pull_requests: Vec<PullRequestSummary>,
        has_next_page: bool,
    ) -> Self {
        self.state.lock().unwrap().pages.insert(
            after.to_string(),
            PullRequestPage {
                pull_requests,
                has_next_page,
            },
        );
        self
    }

    pub fn without_open_pull_request(self) -> Self {
        self.state.lock().unwrap().parent = None;
        self
    }

    pub fn rejecting_commits(self) -> Self {
        self.state.lock().unwrap().reject_commits = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// `(name, target)` of every branch of `owner`, sorted by name.
    pub fn branches(&self, owner: &str) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap();
        let mut branches: Vec<(String, String)> = state.repos[owner]
            .refs
            .iter()
            .map(|r| (r.name.clone(), r.target_commit_id.clone()))
            .collect();
        branches.sort();
        branches
    }
}

#[async_trait]
impl GithubApi for FakeGithub {
    async fn get_refs(&self, owner: &str) -> Result<RepositoryRefs, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::GetRefs(owner.to_string()));
        let repo = state
            .repos
            .get(owner)
            .ok_or_else(|| ApiError::rejected("GetRefs", format!("no repository for {owner}")))?;
        let skip = repo.refs.len().saturating_sub(3);
        Ok(RepositoryRefs {
            repository_id: repo.id.clone(),
            refs: repo.refs[skip..].to_vec(),
        })
    }

    async fn get_branch(&self, owner: &str, name: &str) -> Result<Option<Ref>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::GetBranch {
            owner: owner.to_string(),
            name: name.to_string(),
        });
        let repo = state
            .repos
            .get(owner)
            .ok_or_else(|| ApiError::rejected("GetRef", format!("no repository for {owner}")))?;
        Ok(repo.refs.iter().find(|r| r.name == name).cloned())
    }

    async fn get_first_open_pull_request(&self) -> Result<Option<FirstOpenPullRequest>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::FirstOpenPullRequest);
        Ok(state.parent.clone())
    }

    async fn get_pull_requests(&self, after_cursor: &str) -> Result<PullRequestPage, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::PullRequests(after_cursor.to_string()));
        Ok(state.pages.get(after_cursor).cloned().unwrap_or_default())
    }

    async fn create_branch(
        &self,
        name: &str,
        base_commit_id: &str,
        repository_id: &str,
    ) -> Result<Ref, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateBranch {
            name: name.to_string(),
            base: base_commit_id.to_string(),
            repository_id: repository_id.to_string(),
        });
        let (owner, repo) = state
            .repos
            .iter_mut()
            .find(|(_, repo)| repo.id == repository_id)
            .ok_or_else(|| ApiError::rejected("CreateBranch", "unknown repository"))?;
        if repo.refs.iter().any(|r| r.name == name) {
            return Err(ApiError::rejected(
                "CreateBranch",
                format!("A ref named \"refs/heads/{name}\" already exists"),
            ));
        }
        let created = git_ref(owner, name, base_commit_id);
        repo.refs.push(created.clone());
        Ok(created)
    }

    async fn update_ref(&self, ref_id: &str, target_commit_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::UpdateRef {
            ref_id: ref_id.to_string(),
            target: target_commit_id.to_string(),
        });
        let target = state
            .repos
            .values_mut()
            .flat_map(|repo| repo.refs.iter_mut())
            .find(|r| r.node_id == ref_id)
            .ok_or_else(|| ApiError::rejected("SyncUpstream", format!("no ref {ref_id}")))?;
        target.target_commit_id = target_commit_id.to_string();
        Ok(())
    }

    async fn create_commit_on_branch(&self, commit: NewCommit) -> Result<CommitInfo, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Commit(commit.clone()));
        if state.reject_commits {
            return Err(ApiError::rejected(
                "CreateCommit",
                "Expected branch to point to the expected head",
            ));
        }
        state.commits += 1;
        let oid = format!("commit-{}", state.commits);

        let owner = commit
            .repository_name_with_owner
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let branch = state
            .repos
            .get_mut(&owner)
            .and_then(|repo| repo.refs.iter_mut().find(|r| r.name == commit.branch_name))
            .ok_or_else(|| ApiError::rejected("CreateCommit", "branch not found"))?;
        if branch.target_commit_id != commit.expected_head {
            return Err(ApiError::rejected("CreateCommit", "expected head mismatch"));
        }
        branch.target_commit_id = oid.clone();
        Ok(CommitInfo {
            url: format!("https://github.com/{}/commit/{oid}", commit.repository_name_with_owner),
            oid,
        })
    }

    async fn create_pull_request(
        &self,
        pull_request: NewPullRequest,
    ) -> Result<CreatedPullRequest, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::PullRequest(pull_request));
        state.pull_requests += 1;
        let number = 100 + state.pull_requests;
        Ok(CreatedPullRequest {
            id: format!("PR_{number}"),
            url: format!("https://github.com/{UPSTREAM}/{REPOSITORY}/pull/{number}"),
        })
    }
}
