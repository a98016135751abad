use serde_json::Value;
use twin_bot::github::decode_response;
use twin_bot_core::error::ApiError;

#[test]
fn data_body_decodes() {
    let body = r#"{"data":{"repository":{"id":"R_upstream"}}}"#;
    let data: Value = decode_response("GetRefs", body).expect("data should decode");
    assert_eq!(data["repository"]["id"], "R_upstream");
}

#[test]
fn errors_array_is_a_rejection() {
    let body = r#"{"data":null,"errors":[{"message":"A ref named \"refs/heads/x\" already exists"},{"message":"second"}]}"#;
    let err = decode_response::<Value>("CreateBranch", body).unwrap_err();
    match err {
        ApiError::Rejected { operation, message } => {
            assert_eq!(operation, "CreateBranch");
            assert!(message.contains("already exists"), "got: {message}");
            assert!(message.contains("second"), "got: {message}");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[test]
fn errors_win_over_partial_data() {
    let body = r#"{"data":{"createCommitOnBranch":null},"errors":[{"message":"expectedHeadOid mismatch"}]}"#;
    let err = decode_response::<Value>("CreateCommit", body).unwrap_err();
    assert!(!err.is_transport());
}

#[test]
fn non_json_is_a_transport_failure() {
    let err = decode_response::<Value>("GetAllPRs", "<html>502 Bad Gateway</html>").unwrap_err();
    assert!(err.is_transport(), "got: {err}");
    assert!(err.to_string().contains("GetAllPRs"));
}

#[test]
fn null_data_without_errors_is_a_rejection() {
    let err = decode_response::<Value>("GetFirstPR", r#"{"data":null}"#).unwrap_err();
    assert!(matches!(err, ApiError::Rejected { .. }), "got: {err}");
}
