// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ax_core::test_support::leaf_method;
use ax_core::{ErrorKind, FailureCause, JobId, JobRequest, JobStatus, MethodCatalog, Submission};
use ax_engine::{FakeExecutor, OrchestratorConfig, StatusBus};
use ax_storage::JobDb;
use serde_json::json;
use tempfile::TempDir;
use tokio::io::duplex;

struct Fixture {
    _dir: TempDir,
    fake: FakeExecutor,
    ctx: Arc<ListenCtx>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(JobDb::open([("main".to_string(), dir.path().join("main"))]));
        let mut catalog = MethodCatalog::new();
        catalog.insert("default", leaf_method("leaf", "h-leaf")).unwrap();
        let fake = FakeExecutor::new();
        let orchestrator = Orchestrator::new(
            db,
            catalog,
            Arc::new(fake.clone()),
            StatusBus::default(),
            OrchestratorConfig::new("main"),
            SystemClock,
        );
        let ctx = Arc::new(ListenCtx {
            orchestrator,
            shutdown: Arc::new(Notify::new()),
            ipc_timeout: Duration::from_secs(5),
        });
        Self { _dir: dir, fake, ctx }
    }

    /// Send one request over an in-memory connection and read the reply.
    async fn call(&self, request: Request) -> Response {
        let (mut client, server) = duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let ctx = Arc::clone(&self.ctx);
        let task = tokio::spawn(async move { handle_connection(reader, writer, &ctx).await });
        ax_wire::send(&mut client, &request).await.unwrap();
        let response = ax_wire::recv(&mut client).await.unwrap().unwrap();
        task.await.unwrap().unwrap();
        response
    }
}

fn submit(n: i64) -> Request {
    Request::Submit { submission: Submission::new(JobRequest::new("leaf").option("n", n)) }
}

#[tokio::test]
async fn ping_pongs() {
    let f = Fixture::new();
    assert_eq!(f.call(Request::Ping).await, Response::Pong);
}

#[tokio::test]
async fn hello_reports_protocol_version() {
    let f = Fixture::new();
    let response = f.call(Request::Hello { version: "0.0.0".to_string() }).await;
    assert_eq!(response, Response::Hello { version: PROTOCOL_VERSION.to_string() });
}

#[tokio::test]
async fn submit_builds_then_reuses() {
    let f = Fixture::new();

    let first = f.call(submit(1)).await;
    let Response::Submitted { job, reused, jobs } = first else {
        panic!("expected Submitted");
    };
    assert_eq!(job, JobId::new("main", 0));
    assert!(!reused);
    assert_eq!(jobs, vec![job.clone()]);

    let second = f.call(submit(1)).await;
    assert_eq!(second, Response::Submitted { job: job.clone(), reused: true, jobs: vec![job] });
    assert_eq!(f.fake.calls_for("leaf"), 1);
}

#[tokio::test]
async fn unknown_method_is_rejected_before_execution() {
    let f = Fixture::new();
    let request = Request::Submit { submission: Submission::new(JobRequest::new("nope")) };

    let Response::SubmitFailed { kind, .. } = f.call(request).await else {
        panic!("expected SubmitFailed");
    };
    assert_eq!(kind, ErrorKind::InvalidOptions);
    assert!(f.fake.calls().is_empty());
}

#[tokio::test]
async fn execution_failure_names_node_and_message() {
    let f = Fixture::new();
    f.fake.fail_next(
        "leaf",
        FailureCause::ExecutionError {
            phase: ax_core::Phase::Synthesize,
            slice: None,
            message: "bad input".to_string(),
        },
    );

    let Response::SubmitFailed { kind, node, message } = f.call(submit(2)).await else {
        panic!("expected SubmitFailed");
    };
    assert_eq!(kind, ErrorKind::ExecutionError);
    assert!(node.is_some());
    assert!(message.contains("bad input"), "{message}");
}

#[tokio::test]
async fn job_and_latest_lookups() {
    let f = Fixture::new();
    f.call(submit(3)).await;

    let Response::Job { job: Some(job) } = f.call(Request::Job { id: JobId::new("main", 0) }).await
    else {
        panic!("expected a job");
    };
    assert!(job.is_finished());

    let latest = f
        .call(Request::Latest { workdir: None, method: "leaf".to_string(), options: Default::default() })
        .await;
    assert_eq!(latest, Response::Job { job: Some(job) });

    let missing = f.call(Request::Job { id: JobId::new("main", 7) }).await;
    assert_eq!(missing, Response::Job { job: None });
}

#[tokio::test]
async fn latest_matches_every_spelling_submit_accepts() {
    let f = Fixture::new();
    let request = Request::Submit { submission: Submission::new(JobRequest::new("leaf").option("n", "5")) };
    let Response::Submitted { job, .. } = f.call(request).await else {
        panic!("expected Submitted");
    };

    for n in [json!("5"), json!(5), json!(5.0)] {
        let options = ax_core::test_support::options(json!({ "n": n }));
        let response = f.call(Request::Latest { workdir: None, method: "leaf".to_string(), options }).await;
        let Response::Job { job: Some(found) } = response else {
            panic!("expected a job for n = {n}");
        };
        assert_eq!(found.id, job);
    }
}

#[tokio::test]
async fn latest_rejects_invalid_filters() {
    let f = Fixture::new();
    let cases = [
        ("leaf", json!({ "colour": 1 })),
        ("leaf", json!({ "n": "many" })),
        ("nope", json!({})),
    ];
    for (method, filter) in cases {
        let options = ax_core::test_support::options(filter);
        let response = f.call(Request::Latest { workdir: None, method: method.to_string(), options }).await;
        assert!(
            matches!(response, Response::SubmitFailed { kind: ErrorKind::InvalidOptions, .. }),
            "{method}: {response:?}"
        );
    }
}

#[tokio::test]
async fn unknown_workdir_lookup_is_an_error() {
    let f = Fixture::new();
    let response = f.call(Request::Job { id: JobId::new("elsewhere", 0) }).await;
    assert!(matches!(response, Response::Error { .. }), "{response:?}");
}

#[tokio::test]
async fn methods_lists_catalog() {
    let f = Fixture::new();
    let Response::Methods { methods } = f.call(Request::Methods).await else {
        panic!("expected Methods");
    };
    let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["leaf"]);
}

#[tokio::test]
async fn explain_reports_build_then_reuse() {
    let f = Fixture::new();
    let submission = Submission::new(JobRequest::new("leaf").option("n", 4));

    let Response::Explanation { nodes } = f.call(Request::Explain { submission: submission.clone() }).await
    else {
        panic!("expected Explanation");
    };
    assert!(matches!(nodes[0].verdict, ax_wire::Verdict::Build { .. }));

    f.call(Request::Submit { submission: submission.clone() }).await;
    let Response::Explanation { nodes } = f.call(Request::Explain { submission }).await else {
        panic!("expected Explanation");
    };
    assert!(matches!(nodes[0].verdict, ax_wire::Verdict::Reuse { .. }));
}

#[tokio::test]
async fn shutdown_notifies_daemon() {
    let f = Fixture::new();
    let notified = f.ctx.shutdown.notified();
    tokio::pin!(notified);
    notified.as_mut().enable();

    assert_eq!(f.call(Request::Shutdown).await, Response::ShuttingDown);
    tokio::time::timeout(Duration::from_secs(1), notified).await.unwrap();
}

#[tokio::test]
async fn client_disconnect_cancels_submit() {
    let f = Fixture::new();
    f.fake.hang("leaf");

    let (mut client, server) = duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(server);
    let ctx = Arc::clone(&f.ctx);
    let task = tokio::spawn(async move { handle_connection(reader, writer, &ctx).await });
    ax_wire::send(&mut client, &submit(5)).await.unwrap();

    // Wait until the job is executing, then hang up
    for _ in 0..200 {
        if !f.fake.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    drop(client);

    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    let job = f.ctx.orchestrator.db().get(&JobId::new("main", 0)).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Aborted { cause: FailureCause::Cancelled });
}

#[tokio::test]
async fn garbage_request_is_a_protocol_error() {
    let f = Fixture::new();
    let (mut client, server) = duplex(1024);
    let (reader, writer) = tokio::io::split(server);
    ax_wire::write_message(&mut client, b"not json").await.unwrap();

    let result = handle_connection(reader, writer, &f.ctx).await;
    assert!(matches!(result, Err(ConnectionError::Protocol(ProtocolError::Json(_)))));
}
