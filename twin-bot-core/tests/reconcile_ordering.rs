use mockall::Sequence;
use twin_bot_core::config::SubmitConfig;
use twin_bot_core::contract::{MockGithubApi, Ref, RepositoryRefs};
use twin_bot_core::error::{ApiError, Stage, SubmitError};
use twin_bot_core::pipeline::{submit, SubmissionRequest};
use twin_bot_core::reconcile::reconcile;

fn git_ref(name: &str, target: &str, node_id: &str) -> Ref {
    Ref {
        name: name.to_string(),
        target_commit_id: target.to_string(),
        node_id: node_id.to_string(),
    }
}

fn upstream_refs() -> RepositoryRefs {
    // Primary branch deliberately not first.
    RepositoryRefs {
        repository_id: "R_upstream".to_string(),
        refs: vec![
            git_ref("twin-2024-04-24", "U1", "up-1"),
            git_ref("master", "U0", "up-0"),
            git_ref("twin-2024-05-01", "U2", "up-2"),
        ],
    }
}

#[tokio::test]
async fn primary_branch_is_synced_before_any_other_branch() {
    let mut api = MockGithubApi::new();
    api.expect_get_refs()
        .withf(|owner| owner == "phaazon")
        .returning(|_| Ok(upstream_refs()));
    api.expect_get_refs()
        .withf(|owner| owner == "amar1729")
        .returning(|_| {
            Ok(RepositoryRefs {
                repository_id: "R_fork".to_string(),
                refs: vec![
                    git_ref("twin-2024-04-24", "F1", "fork-1"),
                    git_ref("twin-2024-05-01", "F2", "fork-2"),
                    git_ref("master", "F0", "fork-0"),
                ],
            })
        });

    let mut seq = Sequence::new();
    for (node, target) in [("fork-0", "U0"), ("fork-1", "U1"), ("fork-2", "U2")] {
        api.expect_update_ref()
            .withf(move |ref_id, oid| ref_id == node && oid == target)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
    }
    api.expect_get_branch().never();
    api.expect_create_branch().never();

    let reconciled = reconcile(&api, &SubmitConfig::for_fork("amar1729"))
        .await
        .expect("reconcile should succeed");

    assert_eq!(reconciled.upstream.id, "R_upstream");
    assert_eq!(reconciled.fork.id, "R_fork");
    assert_eq!(reconciled.working_branch.name, "twin-2024-04-24");
    assert_eq!(reconciled.working_branch.node_id, "fork-1");
    assert_eq!(reconciled.working_branch.target_commit_id, "U1");
}

#[tokio::test]
async fn missing_fork_branch_is_created_at_upstream_primary_then_updated() {
    let mut api = MockGithubApi::new();
    api.expect_get_refs()
        .withf(|owner| owner == "phaazon")
        .returning(|_| {
            Ok(RepositoryRefs {
                repository_id: "R_upstream".to_string(),
                refs: vec![
                    git_ref("twin-2024-05-01", "U2", "up-2"),
                    git_ref("master", "U0", "up-0"),
                ],
            })
        });
    api.expect_get_refs()
        .withf(|owner| owner == "amar1729")
        .returning(|_| {
            Ok(RepositoryRefs {
                repository_id: "R_fork".to_string(),
                refs: vec![git_ref("master", "F0", "fork-0")],
            })
        });

    let mut seq = Sequence::new();
    api.expect_update_ref()
        .withf(|ref_id, oid| ref_id == "fork-0" && oid == "U0")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    api.expect_get_branch()
        .withf(|owner, name| owner == "amar1729" && name == "twin-2024-05-01")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(None));
    api.expect_create_branch()
        .withf(|name, base, repo| name == "twin-2024-05-01" && base == "U0" && repo == "R_fork")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|name, base, _| Ok(git_ref(name, base, "fork-new")));
    api.expect_update_ref()
        .withf(|ref_id, oid| ref_id == "fork-new" && oid == "U2")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let reconciled = reconcile(&api, &SubmitConfig::for_fork("amar1729"))
        .await
        .expect("reconcile should succeed");

    assert_eq!(reconciled.working_branch.node_id, "fork-new");
    assert_eq!(reconciled.working_branch.target_commit_id, "U2");
}

#[tokio::test]
async fn fork_branch_outside_latest_refs_is_found_by_name_not_recreated() {
    let mut api = MockGithubApi::new();
    api.expect_get_refs()
        .withf(|owner| owner == "phaazon")
        .returning(|_| {
            Ok(RepositoryRefs {
                repository_id: "R_upstream".to_string(),
                refs: vec![
                    git_ref("master", "U0", "up-0"),
                    git_ref("twin-2024-05-01", "U2", "up-2"),
                ],
            })
        });
    api.expect_get_refs()
        .withf(|owner| owner == "amar1729")
        .returning(|_| {
            Ok(RepositoryRefs {
                repository_id: "R_fork".to_string(),
                refs: vec![
                    git_ref("twin-2024-05-01", "F2", "fork-2"),
                    git_ref("twin-bot-01090100", "X1", "fork-x1"),
                    git_ref("twin-bot-01090200", "X2", "fork-x2"),
                ],
            })
        });

    let mut seq = Sequence::new();
    api.expect_get_branch()
        .withf(|owner, name| owner == "amar1729" && name == "master")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(Some(git_ref("master", "F0", "fork-0"))));
    api.expect_update_ref()
        .withf(|ref_id, oid| ref_id == "fork-0" && oid == "U0")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    api.expect_update_ref()
        .withf(|ref_id, oid| ref_id == "fork-2" && oid == "U2")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    api.expect_create_branch().never();

    let reconciled = reconcile(&api, &SubmitConfig::for_fork("amar1729"))
        .await
        .expect("reconcile should succeed");

    assert_eq!(reconciled.working_branch.node_id, "fork-2");
    assert_eq!(reconciled.working_branch.target_commit_id, "U2");
}

#[tokio::test]
async fn transport_failure_while_fetching_refs_names_the_owner() {
    let mut api = MockGithubApi::new();
    api.expect_get_refs()
        .withf(|owner| owner == "phaazon")
        .returning(|_| Ok(upstream_refs()));
    api.expect_get_refs()
        .withf(|owner| owner == "amar1729")
        .returning(|_| Err(ApiError::transport("GetRefs", "connection reset by peer")));
    api.expect_update_ref().never();

    let err = reconcile(&api, &SubmitConfig::for_fork("amar1729"))
        .await
        .unwrap_err();

    match err {
        SubmitError::TransportFailure { stage, entity, .. } => {
            assert_eq!(stage, Stage::Reconcile);
            assert_eq!(entity, "amar1729");
        }
        other => panic!("expected a transport failure, got {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_section_makes_no_remote_calls() {
    // No expectations: any call on the mock panics.
    let api = MockGithubApi::new();
    let config = SubmitConfig::for_fork("amar1729");

    for section_index in [0, 1, 2, 5, 6, 42] {
        let request = SubmissionRequest {
            section_index,
            plugin_name: "cool.nvim".to_string(),
            file_contents: String::new(),
        };
        let err = submit(&api, &config, &request).await.unwrap_err();
        assert!(
            matches!(err, SubmitError::InvalidArgument { .. }),
            "section {section_index}: {err:?}"
        );
    }
}

#[tokio::test]
async fn unusable_plugin_name_makes_no_remote_calls() {
    let api = MockGithubApi::new();
    let config = SubmitConfig::for_fork("amar1729");

    for plugin_name in ["", "   ", ".nvim", "owner/plugin"] {
        let request = SubmissionRequest {
            section_index: 3,
            plugin_name: plugin_name.to_string(),
            file_contents: String::new(),
        };
        let err = submit(&api, &config, &request).await.unwrap_err();
        assert!(
            matches!(err, SubmitError::InvalidArgument { .. }),
            "plugin name {plugin_name:?}: {err:?}"
        );
    }
}
