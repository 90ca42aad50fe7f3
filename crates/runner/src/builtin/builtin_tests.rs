// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::method::{Flow, Method, MethodError};
use crate::test_helpers::{context, context_with_socket, fake_daemon, store_result};
use ax_core::test_support::options;
use ax_core::{Job, JobId, Phase};
use ax_wire::Response;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn job(method: &str, opts: Value) -> Job {
    Job::builder().method(method).options(options(opts)).build()
}

#[yare::parameterized(
    one_slice    = { 1 },
    three_slices = { 3 },
    more_than_n  = { 12 },
)]
fn slice_sum_partials_cover_every_number(slices: u32) {
    let total: i64 = (0..slices).map(|s| SliceSum::partial(10, s, slices)).sum();
    assert_eq!(total, 45);
}

#[test]
fn slice_sum_synthesizes_the_total() {
    let dir = TempDir::new().unwrap();
    let (ctx, _, _) = context(dir.path(), job("slice_sum", json!({"n": 10})), 2);

    let parts: Vec<Value> = (0..2)
        .map(|s| SliceSum.analyze(&ctx, s, &Value::Null).unwrap().into_value())
        .collect();
    assert_eq!(parts, [json!(20), json!(25)]);
    let result = SliceSum.synthesize(&ctx, &Value::Null, &parts).unwrap();
    assert_eq!(result, json!({"sum": 45, "parts": 2}));
}

#[test]
fn echo_returns_its_value() {
    let dir = TempDir::new().unwrap();
    let (ctx, _, _) = context(dir.path(), job("echo", json!({"value": {"a": [1, 2]}})), 1);
    assert_eq!(Echo.synthesize(&ctx, &Value::Null, &[]).unwrap(), json!({"a": [1, 2]}));
}

#[test]
fn concat_collects_input_results_in_order() {
    let dir = TempDir::new().unwrap();
    let first = store_result(dir.path(), 1, &json!("one"));
    let second = store_result(dir.path(), 2, &json!("two"));
    let job = Job::builder()
        .method("concat")
        .options(options(json!({"label": "both"})))
        .jobs(BTreeMap::from([("inputs".to_string(), vec![second, first])]))
        .build();
    let (ctx, _, _) = context(dir.path(), job, 1);

    let result = Concat.synthesize(&ctx, &Value::Null, &[]).unwrap();
    assert_eq!(result, json!({"label": "both", "results": ["two", "one"]}));
}

#[test]
fn concat_without_dependency_result_fails() {
    let dir = TempDir::new().unwrap();
    let job = Job::builder()
        .method("concat")
        .options(options(json!({"label": ""})))
        .jobs(BTreeMap::from([("inputs".to_string(), vec![JobId::new("test", 9)])]))
        .build();
    let (ctx, _, _) = context(dir.path(), job, 1);
    assert!(matches!(
        Concat.synthesize(&ctx, &Value::Null, &[]),
        Err(MethodError::MissingResult(_))
    ));
}

#[yare::parameterized(
    prepare    = { Phase::Prepare },
    analyze    = { Phase::Analyze },
    synthesize = { Phase::Synthesize },
)]
fn fail_fails_only_in_the_requested_phase(phase: Phase) {
    let dir = TempDir::new().unwrap();
    let opts = json!({"phase": phase.to_string(), "message": "requested"});
    let (ctx, _, _) = context(dir.path(), job("fail", opts), 2);

    let results = [
        (Phase::Prepare, Fail.prepare(&ctx).map(|_| ())),
        (Phase::Analyze, Fail.analyze(&ctx, 0, &Value::Null).map(|_| ())),
        (Phase::Synthesize, Fail.synthesize(&ctx, &Value::Null, &[]).map(|_| ())),
    ];
    for (p, result) in results {
        match result {
            Err(MethodError::Failed(message)) => {
                assert_eq!(p, phase);
                assert_eq!(message, "requested");
            }
            Ok(()) => assert_ne!(p, phase),
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert!(Fail.analyze(&ctx, 1, &Value::Null).is_ok(), "only slice 0 fails");
}

#[test]
fn crash_spares_other_slices() {
    let dir = TempDir::new().unwrap();
    let (ctx, _, _) = context(dir.path(), job("crash", json!({"slice": 1})), 2);
    assert_eq!(Crash.analyze(&ctx, 0, &Value::Null).unwrap(), Flow::Continue(json!(0)));
}

#[test]
fn sleep_stops_when_cancelled() {
    let dir = TempDir::new().unwrap();
    let (ctx, cancel, _) = context(dir.path(), job("sleep", json!({"ms": 60_000})), 1);
    cancel.cancel();
    assert!(matches!(Sleep.analyze(&ctx, 0, &Value::Null), Err(MethodError::Cancelled)));
}

#[test]
fn sleep_returns_after_its_duration() {
    let dir = TempDir::new().unwrap();
    let (ctx, _, _) = context(dir.path(), job("sleep", json!({"ms": 30})), 1);
    assert_eq!(Sleep.analyze(&ctx, 0, &Value::Null).unwrap(), Flow::Continue(json!(30)));
}

#[tokio::test(flavor = "multi_thread")]
async fn fanout_collects_echo_subjobs_in_order() {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("axd.sock");
    let root = dir.path().to_path_buf();
    let seen = fake_daemon(&socket, move |n, submission| {
        let value = submission.root.options["value"].clone();
        let job = store_result(&root, 20 + n as u64, &value);
        Response::Submitted { job, reused: false, jobs: Vec::new() }
    });
    let (ctx, _) = context_with_socket(dir.path(), job("fanout", json!({"values": ["a", 2]})), &socket);

    let task_ctx = ctx.in_phase(Phase::Synthesize);
    let result = tokio::task::spawn_blocking(move || Fanout.synthesize(&task_ctx, &Value::Null, &[]))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result, json!(["a", 2]));
    assert_eq!(ctx.submitted_subjobs(), [JobId::new("test", 20), JobId::new("test", 21)]);
    assert!(seen.lock().iter().all(|s| s.root.method == "echo"));
}
