//! Ref reconciliation: bring the fork's branches in line with upstream.
//!
//! The upstream repository carries its primary branch plus this week's working branch. The fork
//! gets the same branches, pointing at the same commits. The primary branch is always synced
//! first: a branch missing from the fork is created at the *current* upstream primary tip, so the
//! primary branch must already be right by the time any other branch is touched.
//!
//! Re-running is safe: existing branches are not recreated and updates are plain overwrites.
//! Only the fork's latest refs come back from the listing, so a branch absent there is looked up
//! by name before it is created.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::SubmitConfig;
use crate::contract::{GithubApi, Ref, RepositoryRefs};
use crate::error::{Stage, SubmitError};

/// Repository id and owner, fixed once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    pub id: String,
    pub owner: String,
}

/// Upstream refs with the primary branch first. The order is established by [`OrderedRefs::new`]
/// and cannot be changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedRefs {
    refs: Vec<Ref>,
}

impl OrderedRefs {
    /// Order `refs` primary-first, keeping fetch order for the rest.
    pub fn new(refs: Vec<Ref>, primary_branch: &str) -> Result<Self, SubmitError> {
        let (primary, rest): (Vec<Ref>, Vec<Ref>) =
            refs.into_iter().partition(|r| r.name == primary_branch);

        let mut primary = primary.into_iter();
        let head = primary.next().ok_or_else(|| {
            SubmitError::shape(format!(
                "upstream has no '{primary_branch}' branch among its latest refs"
            ))
        })?;
        if primary.next().is_some() {
            return Err(SubmitError::shape(format!(
                "upstream reported '{primary_branch}' more than once"
            )));
        }

        let mut ordered = Vec::with_capacity(rest.len() + 1);
        ordered.push(head);
        ordered.extend(rest);
        Ok(OrderedRefs { refs: ordered })
    }

    pub fn primary(&self) -> &Ref {
        &self.refs[0]
    }

    /// Refs other than the primary branch, in fetch order.
    pub fn others(&self) -> &[Ref] {
        &self.refs[1..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ref> {
        self.refs.iter()
    }
}

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub upstream: RepositoryHandle,
    pub fork: RepositoryHandle,
    /// This week's branch as it now exists in the fork: fork node id, upstream target.
    pub working_branch: Ref,
}

/// Sync every upstream branch into the fork and return the fork's working branch.
pub async fn reconcile<A>(api: &A, config: &SubmitConfig) -> Result<Reconciled, SubmitError>
where
    A: GithubApi + ?Sized,
{
    info!(
        upstream = %config.upstream_owner,
        fork = %config.fork_owner,
        "[RECONCILE] Fetching refs"
    );

    let (upstream_refs, fork_refs) = futures::try_join!(
        fetch_refs(api, &config.upstream_owner),
        fetch_refs(api, &config.fork_owner),
    )?;

    let upstream = RepositoryHandle {
        id: upstream_refs.repository_id,
        owner: config.upstream_owner.clone(),
    };
    let fork = RepositoryHandle {
        id: fork_refs.repository_id,
        owner: config.fork_owner.clone(),
    };

    let ordered = OrderedRefs::new(upstream_refs.refs, &config.primary_branch)?;
    let mut fork_by_name: HashMap<String, Ref> = fork_refs
        .refs
        .into_iter()
        .map(|r| (r.name.clone(), r))
        .collect();

    let primary_target = ordered.primary().target_commit_id.clone();

    for upstream_ref in ordered.iter() {
        if !fork_by_name.contains_key(&upstream_ref.name) {
            let existing = api
                .get_branch(&fork.owner, &upstream_ref.name)
                .await
                .map_err(|e| SubmitError::api(Stage::Reconcile, &upstream_ref.name, e))?;
            let fork_ref = match existing {
                Some(found) => {
                    debug!(
                        branch = %upstream_ref.name,
                        "[RECONCILE] Branch outside the fork's latest refs, found by name"
                    );
                    found
                }
                None => {
                    info!(
                        branch = %upstream_ref.name,
                        base = %primary_target,
                        "[RECONCILE] Branch missing in fork, creating it"
                    );
                    api.create_branch(&upstream_ref.name, &primary_target, &fork.id)
                        .await
                        .map_err(|e| SubmitError::api(Stage::Reconcile, &upstream_ref.name, e))?
                }
            };
            fork_by_name.insert(upstream_ref.name.clone(), fork_ref);
        }

        let fork_ref = fork_by_name
            .get_mut(&upstream_ref.name)
            .ok_or_else(|| SubmitError::shape(format!("fork lost ref '{}'", upstream_ref.name)))?;

        debug!(
            branch = %upstream_ref.name,
            from = %fork_ref.target_commit_id,
            to = %upstream_ref.target_commit_id,
            "[RECONCILE] Updating fork ref"
        );
        api.update_ref(&fork_ref.node_id, &upstream_ref.target_commit_id)
            .await
            .map_err(|e| SubmitError::api(Stage::Reconcile, &upstream_ref.name, e))?;
        fork_ref.target_commit_id = upstream_ref.target_commit_id.clone();
    }

    let working_name = match ordered.others() {
        [] => {
            return Err(SubmitError::shape(format!(
                "upstream has no branch besides '{}'",
                config.primary_branch
            )))
        }
        [only] => &only.name,
        [first, ..] => {
            warn!(
                count = ordered.others().len(),
                chosen = %first.name,
                "[RECONCILE] Upstream has several working branches, using the first"
            );
            &first.name
        }
    };

    let working_branch = fork_by_name
        .remove(working_name)
        .ok_or_else(|| SubmitError::shape(format!("fork lost ref '{working_name}'")))?;

    info!(
        working_branch = %working_branch.name,
        target = %working_branch.target_commit_id,
        "[RECONCILE] Fork in sync with upstream"
    );

    Ok(Reconciled {
        upstream,
        fork,
        working_branch,
    })
}

async fn fetch_refs<A>(api: &A, owner: &str) -> Result<RepositoryRefs, SubmitError>
where
    A: GithubApi + ?Sized,
{
    api.get_refs(owner)
        .await
        .map_err(|e| SubmitError::api(Stage::Reconcile, owner, e))
}
