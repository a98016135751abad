use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Where the submission pull request is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrTarget {
    /// On the upstream repository, from `<fork_owner>:<branch>`.
    #[default]
    Upstream,
    /// On the fork itself. Used to dry-run the bot without bothering upstream.
    Fork,
}

/// Which branch the submission pull request merges into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrBase {
    /// This week's working branch.
    #[default]
    Working,
    /// The primary branch.
    Primary,
}

/// Settings of the submission pipeline. Passed explicitly; there is no global configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitConfig {
    #[serde(default = "default_upstream_owner")]
    pub upstream_owner: String,
    pub fork_owner: String,
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default = "default_primary_branch")]
    pub primary_branch: String,
    /// First component of every content path.
    #[serde(default = "default_contents_root")]
    pub contents_root: String,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    #[serde(default)]
    pub pr_target: PrTarget,
    #[serde(default)]
    pub pr_base: PrBase,
}

fn default_upstream_owner() -> String {
    "phaazon".to_string()
}

fn default_repository() -> String {
    "this-week-in-neovim-contents".to_string()
}

fn default_primary_branch() -> String {
    "master".to_string()
}

fn default_contents_root() -> String {
    "contents".to_string()
}

fn default_branch_prefix() -> String {
    "twin-bot".to_string()
}

impl SubmitConfig {
    /// Defaults for everything but the fork owner.
    pub fn for_fork(fork_owner: impl Into<String>) -> Self {
        SubmitConfig {
            upstream_owner: default_upstream_owner(),
            fork_owner: fork_owner.into(),
            repository: default_repository(),
            primary_branch: default_primary_branch(),
            contents_root: default_contents_root(),
            branch_prefix: default_branch_prefix(),
            pr_target: PrTarget::default(),
            pr_base: PrBase::default(),
        }
    }

    /// `owner/name` of the fork, as expected by commit mutations.
    pub fn fork_name_with_owner(&self) -> String {
        format!("{}/{}", self.fork_owner, self.repository)
    }

    pub fn trace_loaded(&self) {
        info!(
            upstream_owner = %self.upstream_owner,
            fork_owner = %self.fork_owner,
            repository = %self.repository,
            pr_target = ?self.pr_target,
            pr_base = ?self.pr_base,
            "Loaded SubmitConfig"
        );
        debug!(?self, "SubmitConfig loaded (full debug)");
    }
}
