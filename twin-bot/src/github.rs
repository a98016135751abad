#![doc = "GraphQL transport for the core GithubApi contract: sends named operations to the GitHub GraphQL endpoint with bearer-token auth."]
//
//! # GitHub GraphQL client
//!
//! [`GraphqlClient`] is the networked implementation of [`GithubApi`]. It owns one `reqwest`
//! client, the endpoint and token, and the owner/repository names from configuration.
//!
//! - Every operation is a fixed GraphQL document posted as `{query, operationName, variables}`.
//! - HTTP errors, timeouts and bodies that do not decode are reported as
//!   [`ApiError::Transport`]; a GraphQL `errors` array or a missing payload as
//!   [`ApiError::Rejected`].
//! - Nothing is retried here. The pipeline decides what a failure means.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use twin_bot_core::contract::{
    CommitInfo, CreatedPullRequest, FirstOpenPullRequest, GithubApi, NewCommit, NewPullRequest,
    PullRequestPage, PullRequestSummary, Ref, RepositoryRefs,
};
use twin_bot_core::error::ApiError;

use crate::load_config::GithubConfig;

const GET_REFS: &str = r#"
query GetRefs($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    id
    refs(refPrefix: "refs/heads/", last: 3) {
      edges { node { id name target { oid } } }
    }
  }
}"#;

const GET_REF: &str = r#"
query GetRef($owner: String!, $name: String!, $qualifiedName: String!) {
  repository(owner: $owner, name: $name) {
    ref(qualifiedName: $qualifiedName) { id name target { oid } }
  }
}"#;

const GET_FIRST_PR: &str = r#"
query GetFirstPR($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    pullRequests(first: 1, states: [OPEN]) {
      edges { cursor node { id title headRefName } }
    }
  }
}"#;

const GET_ALL_PRS: &str = r#"
query GetAllPRs($owner: String!, $name: String!, $cursor: String!) {
  repository(owner: $owner, name: $name) {
    pullRequests(after: $cursor, first: 40) {
      pageInfo { hasNextPage }
      edges {
        cursor
        node {
          title
          headRefName
          files(first: 5) { edges { node { path } } }
        }
      }
    }
  }
}"#;

const CREATE_BRANCH: &str = r#"
mutation CreateBranch($name: String!, $baseRef: GitObjectID!, $repoId: ID!) {
  createRef(input: {name: $name, oid: $baseRef, repositoryId: $repoId}) {
    ref { id name target { oid } }
  }
}"#;

const SYNC_UPSTREAM: &str = r#"
mutation SyncUpstream($refId: ID!, $oid: GitObjectID!) {
  updateRef(input: {refId: $refId, oid: $oid, force: true}) {
    ref { id }
  }
}"#;

const CREATE_COMMIT: &str = r#"
mutation CreateCommit($repoName: String!, $branchName: String!, $head: GitObjectID!, $commitMsg: String!, $filePath: String!, $contents: Base64String!) {
  createCommitOnBranch(input: {
    branch: {repositoryNameWithOwner: $repoName, branchName: $branchName},
    expectedHeadOid: $head,
    message: {headline: $commitMsg},
    fileChanges: {additions: [{path: $filePath, contents: $contents}]}
  }) {
    commit { oid url }
  }
}"#;

const CREATE_PR: &str = r#"
mutation CreatePR($title: String!, $repoId: ID!, $headRef: String!, $baseRef: String!, $body: String!) {
  createPullRequest(input: {title: $title, repositoryId: $repoId, headRefName: $headRef, baseRefName: $baseRef, body: $body}) {
    pullRequest { id url }
  }
}"#;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlRequest<'a> {
    query: &'a str,
    operation_name: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphqlResponse<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
struct Edges<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Deserialize)]
struct Edge<T> {
    #[serde(default)]
    cursor: Option<String>,
    node: T,
}

#[derive(Deserialize)]
struct Target {
    oid: String,
}

#[derive(Deserialize)]
struct RefNode {
    id: String,
    name: String,
    target: Target,
}

impl From<RefNode> for Ref {
    fn from(node: RefNode) -> Self {
        Ref {
            name: node.name,
            target_commit_id: node.target.oid,
            node_id: node.id,
        }
    }
}

#[derive(Deserialize)]
struct RefsData {
    repository: Option<RefsRepository>,
}

#[derive(Deserialize)]
struct RefsRepository {
    id: String,
    refs: Edges<RefNode>,
}

#[derive(Deserialize)]
struct RefData {
    repository: Option<RefRepository>,
}

#[derive(Deserialize)]
struct RefRepository {
    #[serde(rename = "ref")]
    git_ref: Option<RefNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirstPrData {
    repository: Option<FirstPrRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirstPrRepository {
    pull_requests: Edges<FirstPrNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirstPrNode {
    id: String,
    title: String,
    head_ref_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllPrsData {
    repository: Option<AllPrsRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllPrsRepository {
    pull_requests: PullRequestConnection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestConnection {
    page_info: PageInfo,
    edges: Vec<Edge<PrNode>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrNode {
    title: String,
    // null when the head branch was deleted
    head_ref_name: Option<String>,
    files: Option<Edges<FileNode>>,
}

#[derive(Deserialize)]
struct FileNode {
    path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRefData {
    create_ref: Option<CreateRefPayload>,
}

#[derive(Deserialize)]
struct CreateRefPayload {
    #[serde(rename = "ref")]
    created: Option<RefNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRefData {
    update_ref: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommitData {
    create_commit_on_branch: Option<CreateCommitPayload>,
}

#[derive(Deserialize)]
struct CreateCommitPayload {
    commit: Option<CommitNode>,
}

#[derive(Deserialize)]
struct CommitNode {
    oid: String,
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePrData {
    create_pull_request: Option<CreatePrPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePrPayload {
    pull_request: Option<PrCreatedNode>,
}

#[derive(Deserialize)]
struct PrCreatedNode {
    id: String,
    url: String,
}

/// Decode a GraphQL response body for `operation`.
///
/// Undecodable bodies are transport failures; a non-empty `errors` array or a missing `data`
/// object is a rejection.
pub fn decode_response<D: DeserializeOwned>(
    operation: &'static str,
    body: &str,
) -> Result<D, ApiError> {
    let response: GraphqlResponse<D> = serde_json::from_str(body).map_err(|e| {
        tracing::error!(error = ?e, operation, "[GRAPHQL] Undecodable response body");
        ApiError::transport(operation, format!("undecodable response: {e}"))
    })?;

    if !response.errors.is_empty() {
        let message = response
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        tracing::error!(operation, errors = %message, "[GRAPHQL] Operation rejected");
        return Err(ApiError::rejected(operation, message));
    }

    response
        .data
        .ok_or_else(|| ApiError::rejected(operation, "response carries no data"))
}

fn missing(operation: &'static str, what: &str) -> ApiError {
    ApiError::rejected(operation, format!("response has no {what}"))
}

pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    upstream_owner: String,
    repository: String,
}

impl GraphqlClient {
    pub fn new(
        config: &GithubConfig,
        upstream_owner: &str,
        repository: &str,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        tracing::info!(
            endpoint = %config.endpoint,
            timeout_secs = config.timeout_secs,
            token_set = !config.token.is_empty(),
            "Initialized GraphqlClient"
        );
        Ok(GraphqlClient {
            http,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
            upstream_owner: upstream_owner.to_string(),
            repository: repository.to_string(),
        })
    }

    async fn execute<D: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<D, ApiError> {
        tracing::debug!(operation, "[GRAPHQL] Sending operation");
        let request = GraphqlRequest {
            query,
            operation_name: operation,
            variables,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, operation, "[GRAPHQL] Request failed");
                ApiError::transport(operation, e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!(error = ?e, operation, "[GRAPHQL] Failed to read response body");
            ApiError::transport(operation, e.to_string())
        })?;
        if !status.is_success() {
            tracing::error!(operation, %status, "[GRAPHQL] HTTP error");
            return Err(ApiError::transport(
                operation,
                format!("HTTP {status}: {body}"),
            ));
        }

        decode_response(operation, &body)
    }
}

#[async_trait]
impl GithubApi for GraphqlClient {
    async fn get_refs(&self, owner: &str) -> Result<RepositoryRefs, ApiError> {
        const OP: &str = "GetRefs";
        let data: RefsData = self
            .execute(OP, GET_REFS, json!({ "owner": owner, "name": self.repository }))
            .await?;
        let repository = data.repository.ok_or_else(|| missing(OP, "repository"))?;
        let refs: Vec<Ref> = repository
            .refs
            .edges
            .into_iter()
            .map(|edge| edge.node.into())
            .collect();
        tracing::info!(owner, count = refs.len(), "Fetched refs");
        Ok(RepositoryRefs {
            repository_id: repository.id,
            refs,
        })
    }

    async fn get_branch(&self, owner: &str, name: &str) -> Result<Option<Ref>, ApiError> {
        const OP: &str = "GetRef";
        let data: RefData = self
            .execute(
                OP,
                GET_REF,
                json!({
                    "owner": owner,
                    "name": self.repository,
                    "qualifiedName": format!("refs/heads/{name}"),
                }),
            )
            .await?;
        let repository = data.repository.ok_or_else(|| missing(OP, "repository"))?;
        let found = repository.git_ref.map(Ref::from);
        tracing::debug!(owner, branch = name, found = found.is_some(), "Looked up branch");
        Ok(found)
    }

    async fn get_first_open_pull_request(
        &self,
    ) -> Result<Option<FirstOpenPullRequest>, ApiError> {
        const OP: &str = "GetFirstPR";
        let data: FirstPrData = self
            .execute(
                OP,
                GET_FIRST_PR,
                json!({ "owner": self.upstream_owner, "name": self.repository }),
            )
            .await?;
        let repository = data.repository.ok_or_else(|| missing(OP, "repository"))?;
        let first = repository.pull_requests.edges.into_iter().next();
        match first {
            Some(edge) => {
                let cursor = edge.cursor.ok_or_else(|| missing(OP, "cursor"))?;
                Ok(Some(FirstOpenPullRequest {
                    cursor,
                    id: edge.node.id,
                    title: edge.node.title,
                    head_ref_name: edge.node.head_ref_name,
                }))
            }
            None => Ok(None),
        }
    }

    async fn get_pull_requests(&self, after_cursor: &str) -> Result<PullRequestPage, ApiError> {
        const OP: &str = "GetAllPRs";
        let data: AllPrsData = self
            .execute(
                OP,
                GET_ALL_PRS,
                json!({
                    "owner": self.upstream_owner,
                    "name": self.repository,
                    "cursor": after_cursor,
                }),
            )
            .await?;
        let connection = data
            .repository
            .ok_or_else(|| missing(OP, "repository"))?
            .pull_requests;

        let pull_requests = connection
            .edges
            .into_iter()
            .map(|edge| -> Result<PullRequestSummary, ApiError> {
                let cursor = edge.cursor.ok_or_else(|| missing(OP, "cursor"))?;
                let node = edge.node;
                Ok(PullRequestSummary {
                    cursor,
                    title: node.title,
                    head_ref_name: node.head_ref_name.unwrap_or_default(),
                    changed_file_paths: node
                        .files
                        .map(|files| files.edges.into_iter().map(|e| e.node.path).collect())
                        .unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PullRequestPage {
            pull_requests,
            has_next_page: connection.page_info.has_next_page,
        })
    }

    async fn create_branch(
        &self,
        name: &str,
        base_commit_id: &str,
        repository_id: &str,
    ) -> Result<Ref, ApiError> {
        const OP: &str = "CreateBranch";
        tracing::info!(name, base = base_commit_id, "Creating branch");
        let data: CreateRefData = self
            .execute(
                OP,
                CREATE_BRANCH,
                json!({
                    "name": format!("refs/heads/{name}"),
                    "baseRef": base_commit_id,
                    "repoId": repository_id,
                }),
            )
            .await?;
        let created = data
            .create_ref
            .and_then(|payload| payload.created)
            .ok_or_else(|| missing(OP, "created ref"))?;
        Ok(created.into())
    }

    async fn update_ref(&self, ref_id: &str, target_commit_id: &str) -> Result<(), ApiError> {
        const OP: &str = "SyncUpstream";
        let data: UpdateRefData = self
            .execute(
                OP,
                SYNC_UPSTREAM,
                json!({ "refId": ref_id, "oid": target_commit_id }),
            )
            .await?;
        data.update_ref.ok_or_else(|| missing(OP, "updated ref"))?;
        Ok(())
    }

    async fn create_commit_on_branch(&self, commit: NewCommit) -> Result<CommitInfo, ApiError> {
        const OP: &str = "CreateCommit";
        tracing::info!(
            repository = %commit.repository_name_with_owner,
            branch = %commit.branch_name,
            path = %commit.file_path,
            "Creating commit"
        );
        let data: CreateCommitData = self
            .execute(
                OP,
                CREATE_COMMIT,
                json!({
                    "repoName": commit.repository_name_with_owner,
                    "branchName": commit.branch_name,
                    "head": commit.expected_head,
                    "commitMsg": commit.message,
                    "filePath": commit.file_path,
                    "contents": commit.base64_contents,
                }),
            )
            .await?;
        let created = data
            .create_commit_on_branch
            .and_then(|payload| payload.commit)
            .ok_or_else(|| missing(OP, "commit"))?;
        Ok(CommitInfo {
            oid: created.oid,
            url: created.url,
        })
    }

    async fn create_pull_request(
        &self,
        pull_request: NewPullRequest,
    ) -> Result<CreatedPullRequest, ApiError> {
        const OP: &str = "CreatePR";
        tracing::info!(
            head = %pull_request.head_ref,
            base = %pull_request.base_ref,
            "Creating pull request"
        );
        let data: CreatePrData = self
            .execute(
                OP,
                CREATE_PR,
                json!({
                    "title": pull_request.title,
                    "repoId": pull_request.repository_id,
                    "headRef": pull_request.head_ref,
                    "baseRef": pull_request.base_ref,
                    "body": pull_request.body,
                }),
            )
            .await?;
        let created = data
            .create_pull_request
            .and_then(|payload| payload.pull_request)
            .ok_or_else(|| missing(OP, "pull request"))?;
        Ok(CreatedPullRequest {
            id: created.id,
            url: created.url,
        })
    }
}
