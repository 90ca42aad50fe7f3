// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ax_core::JobRequest;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    ping = { Request::Ping, "Ping" },
    methods = { Request::Methods, "Methods" },
    shutdown = { Request::Shutdown, "Shutdown" },
    job = { Request::Job { id: JobId::new("main", 1) }, "Job" },
    repair = { Request::Repair { workdir: "main".into() }, "Repair" },
)]
fn request_type_tag(request: Request, tag: &str) {
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["type"], tag);
    let back: Request = serde_json::from_value(json).unwrap();
    assert_eq!(back, request);
}

#[test]
fn submit_request_from_plain_json() {
    let request: Request = serde_json::from_value(json!({
        "type": "Submit",
        "submission": {
            "root": {
                "method": "concat",
                "bindings": [{"slot": "inputs", "kind": "job", "input": {"named": "left"}}]
            },
            "named": {"left": {"method": "echo", "options": {"text": "a"}}}
        }
    }))
    .unwrap();

    let Request::Submit { submission } = request else { panic!("expected Submit") };
    assert_eq!(submission.root.method, "concat");
    assert_eq!(submission.named["left"], JobRequest::new("echo").option("text", "a"));
    assert!(!submission.force_build);
}

#[test]
fn latest_options_are_optional() {
    let request: Request =
        serde_json::from_value(json!({"type": "Latest", "method": "echo"})).unwrap();
    assert_eq!(
        request,
        Request::Latest { workdir: None, method: "echo".into(), options: Options::new() }
    );
}

#[test]
fn submit_failed_names_kind_in_snake_case() {
    let response = Response::SubmitFailed {
        kind: ErrorKind::CyclicDependency,
        node: None,
        message: "a -> b -> a".into(),
    };
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["kind"], "cyclic_dependency");
    assert!(json.get("node").is_none());
}

#[test]
fn explanation_flattens_the_verdict() {
    let node = NodeExplanation {
        node: "root".into(),
        method: "echo".into(),
        fingerprint: Fingerprint::from_hex("ab"),
        verdict: Verdict::Build {
            candidates: vec![Candidate {
                job: JobId::new("main", 2),
                source_hash: "h1".into(),
                differing: vec!["text".into()],
            }],
        },
    };
    let json = serde_json::to_value(&node).unwrap();
    assert_eq!(json["verdict"], "build");
    assert_eq!(json["candidates"][0]["differing"], json!(["text"]));
    let back: NodeExplanation = serde_json::from_value(json).unwrap();
    assert_eq!(back, node);
}

#[test]
fn protocol_version_is_the_package_version() {
    assert_eq!(PROTOCOL_VERSION, env!("CARGO_PKG_VERSION"));
}
