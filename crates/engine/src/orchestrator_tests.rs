// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::fake::FakeExecutor;
use ax_core::test_support::{joining_method, leaf_method};
use ax_core::{Binding, FakeClock, JobInput, JobRequest, Phase};
use ax_storage::read_setup;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    db: Arc<JobDb>,
    fake: FakeExecutor,
    bus: StatusBus,
    clock: FakeClock,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = JobDb::open([
            ("main".to_string(), dir.path().join("main")),
            ("other".to_string(), dir.path().join("other")),
        ]);
        Self {
            _dir: dir,
            db: Arc::new(db),
            fake: FakeExecutor::new(),
            bus: StatusBus::default(),
            clock: FakeClock::new(),
        }
    }

    fn orchestrator_with(&self, catalog: MethodCatalog) -> Orchestrator<FakeClock> {
        Orchestrator::new(
            Arc::clone(&self.db),
            catalog,
            Arc::new(self.fake.clone()),
            self.bus.clone(),
            OrchestratorConfig::new("main").slices(3),
            self.clock.clone(),
        )
    }

    fn orchestrator(&self) -> Orchestrator<FakeClock> {
        self.orchestrator_with(catalog())
    }

    /// A `leaf` job left in progress, as if it were still executing.
    fn running(&self, fingerprint: Fingerprint, parent: Option<JobId>) -> Job {
        let new = NewJob {
            fingerprint,
            method: "leaf".into(),
            source_hash: "h-leaf".into(),
            equivalent_hashes: Vec::new(),
            options: Options::new(),
            jobs: BTreeMap::new(),
            datasets: BTreeMap::new(),
            started_at_ms: 1,
            parent,
        };
        self.db.begin("main", new).unwrap()
    }
}

fn catalog() -> MethodCatalog {
    let mut catalog = MethodCatalog::new();
    catalog.insert("default", leaf_method("leaf", "h-leaf")).unwrap();
    catalog.insert("default", leaf_method("other", "h-other")).unwrap();
    catalog.insert("default", joining_method("join", "h-join")).unwrap();
    catalog
}

fn leaf(n: i64) -> JobRequest {
    JobRequest::new("leaf").option("n", n)
}

fn join_of(inputs: Vec<JobRequest>) -> JobRequest {
    inputs
        .into_iter()
        .fold(JobRequest::new("join"), |req, input| req.bind(Binding::job("inputs", JobInput::build(input))))
}

#[tokio::test]
async fn second_identical_submit_is_reused() {
    let f = Fixture::new();
    let orch = f.orchestrator();

    let first = orch.submit(Submission::new(leaf(1))).await.unwrap();
    assert!(!first.reused);
    assert_eq!(first.job.id, JobId::new("main", 0));
    assert!(first.job.is_finished());

    let second = orch.submit(Submission::new(leaf(1))).await.unwrap();
    assert!(second.reused);
    assert_eq!(second.job.id, first.job.id);
    assert_eq!(f.fake.calls_for("leaf"), 1);
    assert!(f.db.get(&JobId::new("main", 1)).unwrap().is_none());
}

#[tokio::test]
async fn changing_one_option_builds_a_new_job() {
    let f = Fixture::new();
    let orch = f.orchestrator();

    let a = orch.submit(Submission::new(leaf(1))).await.unwrap();
    let b = orch.submit(Submission::new(leaf(2))).await.unwrap();
    assert!(!b.reused);
    assert_ne!(a.job.fingerprint, b.job.fingerprint);
    assert_eq!(b.job.id, JobId::new("main", 1));
}

#[tokio::test]
async fn omitted_default_matches_explicit_default() {
    let f = Fixture::new();
    let orch = f.orchestrator();

    orch.submit(Submission::new(JobRequest::new("leaf"))).await.unwrap();
    let explicit = orch.submit(Submission::new(leaf(1))).await.unwrap();
    assert!(explicit.reused);
}

#[tokio::test]
async fn dependencies_are_built_before_dependents() {
    let f = Fixture::new();
    let orch = f.orchestrator();

    let outcome = orch.submit(Submission::new(join_of(vec![leaf(1), leaf(2)]))).await.unwrap();
    assert_eq!(outcome.jobs.len(), 3);
    assert_eq!(outcome.jobs.last(), Some(&outcome.job.id));

    let calls = f.fake.calls();
    assert_eq!(calls.last().map(|c| c.method.as_str()), Some("join"));

    let inputs = &outcome.job.jobs["inputs"];
    let first = f.db.get(&inputs[0]).unwrap().unwrap();
    let second = f.db.get(&inputs[1]).unwrap().unwrap();
    assert_eq!(first.options["n"], 1);
    assert_eq!(second.options["n"], 2);
}

#[tokio::test]
async fn independent_subtrees_run_concurrently() {
    let f = Fixture::new();
    f.fake.delay("leaf", Duration::from_millis(50));
    let orch = f.orchestrator();

    orch.submit(Submission::new(join_of(vec![leaf(1), leaf(2), leaf(3)]))).await.unwrap();
    assert!(f.fake.max_running() >= 2, "max running {}", f.fake.max_running());
}

#[tokio::test]
async fn shared_named_request_runs_once() {
    let f = Fixture::new();
    let orch = f.orchestrator();

    let root = JobRequest::new("join")
        .bind(Binding::job("previous", JobInput::named("base")))
        .bind(Binding::job("inputs", JobInput::named("base")));
    let outcome = orch.submit(Submission::new(root).with_named("base", leaf(9))).await.unwrap();

    assert_eq!(f.fake.calls_for("leaf"), 1);
    assert_eq!(outcome.jobs.len(), 2);
    assert_eq!(outcome.job.jobs["previous"], outcome.job.jobs["inputs"]);
}

#[tokio::test]
async fn job_built_under_an_equivalent_hash_is_reused() {
    let f = Fixture::new();
    let mut old = MethodCatalog::new();
    old.insert("default", leaf_method("leaf", "h1")).unwrap();
    let built = f.orchestrator_with(old).submit(Submission::new(leaf(4))).await.unwrap();

    let mut new = MethodCatalog::new();
    new.insert("default", leaf_method("leaf", "h2").with_equivalent_hashes(["h1"])).unwrap();
    let again = f.orchestrator_with(new).submit(Submission::new(leaf(4))).await.unwrap();

    assert!(again.reused);
    assert_eq!(again.job.id, built.job.id);
    assert_eq!(again.job.source_hash, "h1");
}

#[tokio::test]
async fn recorded_equivalence_works_in_reverse() {
    let f = Fixture::new();
    let mut new = MethodCatalog::new();
    new.insert("default", leaf_method("leaf", "h2").with_equivalent_hashes(["h1"])).unwrap();
    let built = f.orchestrator_with(new).submit(Submission::new(leaf(4))).await.unwrap();

    let mut old = MethodCatalog::new();
    old.insert("default", leaf_method("leaf", "h1")).unwrap();
    let again = f.orchestrator_with(old).submit(Submission::new(leaf(4))).await.unwrap();

    assert!(again.reused);
    assert_eq!(again.job.id, built.job.id);
}

#[tokio::test]
async fn unrelated_hash_is_not_reused() {
    let f = Fixture::new();
    let mut old = MethodCatalog::new();
    old.insert("default", leaf_method("leaf", "h1")).unwrap();
    f.orchestrator_with(old).submit(Submission::new(leaf(4))).await.unwrap();

    let mut new = MethodCatalog::new();
    new.insert("default", leaf_method("leaf", "h3")).unwrap();
    let again = f.orchestrator_with(new).submit(Submission::new(leaf(4))).await.unwrap();
    assert!(!again.reused);
}

#[tokio::test]
async fn cycle_is_rejected_without_creating_jobs() {
    let f = Fixture::new();
    let orch = f.orchestrator();
    let submission = Submission::new(JobRequest::new("join").bind(Binding::job("previous", JobInput::named("a"))))
        .with_named("a", JobRequest::new("join").bind(Binding::job("previous", JobInput::named("b"))))
        .with_named("b", JobRequest::new("join").bind(Binding::job("previous", JobInput::named("a"))));

    let err = orch.submit(submission).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicDependency);
    assert!(f.fake.calls().is_empty());
    assert!(f.db.get(&JobId::new("main", 0)).unwrap().is_none());
}

#[tokio::test]
async fn failing_subtree_does_not_stop_its_sibling() {
    let f = Fixture::new();
    f.fake.fail_next(
        "other",
        FailureCause::ExecutionError { phase: Phase::Analyze, slice: Some(0), message: "bad row".into() },
    );
    let orch = f.orchestrator();

    let root = join_of(vec![leaf(1), JobRequest::new("other")]);
    let err = orch.submit(Submission::new(root)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExecutionError);
    assert_eq!(err.node(), Some("root/inputs[1]"));
    let SubmitError::Failed { failure, completed } = err else { panic!("expected Failed") };
    assert_eq!(failure.method, "other");
    assert!(failure.cause.to_string().contains("bad row"));
    assert_eq!(completed.len(), 1);
    assert_eq!(f.fake.calls_for("join"), 0);

    let sibling = orch.submit(Submission::new(leaf(1))).await.unwrap();
    assert!(sibling.reused);
    assert_eq!(sibling.job.id, completed[0]);
}

#[tokio::test]
async fn failure_propagates_through_every_ancestor() {
    let f = Fixture::new();
    f.fake.fail_next("other", FailureCause::Timeout { phase: Some(Phase::Prepare), slice: None });
    let orch = f.orchestrator();

    let middle = join_of(vec![JobRequest::new("other")]);
    let root = join_of(vec![middle]);
    let err = orch.submit(Submission::new(root)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.node(), Some("root/inputs[0]/inputs[0]"));
    assert_eq!(f.fake.calls_for("join"), 0);
}

#[tokio::test]
async fn panicking_node_fails_with_its_label() {
    let f = Fixture::new();
    f.fake.panic_next("other");
    let orch = f.orchestrator();

    let root = join_of(vec![leaf(1), JobRequest::new("other")]);
    let err = orch.submit(Submission::new(root)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SubprocessFailure);
    assert_eq!(err.node(), Some("root/inputs[1]"));
    let SubmitError::Failed { failure, completed } = err else { panic!("expected Failed") };
    assert_eq!(failure.method, "other");
    assert!(matches!(failure.cause, FailureCause::SubprocessDied { .. }), "{:?}", failure.cause);
    assert_eq!(completed.len(), 1);
    assert_eq!(f.fake.calls_for("join"), 0);

    let retry = orch.submit(Submission::new(JobRequest::new("other"))).await.unwrap();
    assert!(!retry.reused);
}

#[tokio::test]
async fn unrecordable_result_aborts_the_job() {
    let f = Fixture::new();
    let db = Arc::clone(&f.db);
    f.fake.before_success("leaf", move |id| {
        db.mark_aborted(id, 0, FailureCause::Interrupted).unwrap();
    });
    let orch = f.orchestrator();

    let err = orch.submit(Submission::new(join_of(vec![leaf(1)]))).await.unwrap_err();
    assert_eq!(err.node(), Some("root/inputs[0]"));
    assert_eq!(f.fake.calls_for("join"), 0);
    let job = f.db.get(&JobId::new("main", 0)).unwrap().unwrap();
    assert!(job.is_aborted());
    assert!(f.db.lookup_exact("main", &job.fingerprint).unwrap().is_none());
}

#[tokio::test]
async fn crashed_job_is_never_a_hit_and_is_rebuilt() {
    let f = Fixture::new();
    f.fake.fail_next(
        "leaf",
        FailureCause::SubprocessFailure {
            phase: Phase::Analyze,
            slice: Some(1),
            detail: "killed by signal 9".into(),
        },
    );
    let orch = f.orchestrator();

    let err = orch.submit(Submission::new(leaf(1))).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SubprocessFailure);
    let aborted = f.db.get(&JobId::new("main", 0)).unwrap().unwrap();
    assert!(aborted.is_aborted());
    assert!(f.db.lookup_exact("main", &aborted.fingerprint).unwrap().is_none());

    let retry = orch.submit(Submission::new(leaf(1))).await.unwrap();
    assert!(!retry.reused);
    assert_eq!(retry.job.id, JobId::new("main", 1));
    assert_eq!(retry.job.fingerprint, aborted.fingerprint);
}

#[tokio::test]
async fn racing_submits_share_one_execution() {
    let f = Fixture::new();
    f.fake.delay("leaf", Duration::from_millis(100));
    let orch = f.orchestrator();

    let (a, b) = tokio::join!(orch.submit(Submission::new(leaf(7))), orch.submit(Submission::new(leaf(7))));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.job.id, b.job.id);
    assert_eq!(f.fake.calls_for("leaf"), 1);
    assert!(a.reused != b.reused, "exactly one submit built the job");
}

#[tokio::test]
async fn force_build_rebuilds_only_the_root() {
    let f = Fixture::new();
    let orch = f.orchestrator();
    let request = join_of(vec![leaf(1)]);

    let first = orch.submit(Submission::new(request.clone())).await.unwrap();
    let forced = orch.submit(Submission::new(request).force_build(true)).await.unwrap();

    assert!(!forced.reused);
    assert_ne!(forced.job.id, first.job.id);
    assert_eq!(forced.job.fingerprint, first.job.fingerprint);
    assert_eq!(f.fake.calls_for("leaf"), 1);
    assert_eq!(f.fake.calls_for("join"), 2);
}

#[tokio::test]
async fn cancelling_aborts_running_nodes() {
    let f = Fixture::new();
    f.fake.hang("leaf");
    let orch = f.orchestrator();
    let cancel = CancellationToken::new();

    let task = {
        let orch = orch.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orch.submit_with_cancel(Submission::new(join_of(vec![leaf(1)])), cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();

    let err = tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(f.db.get(&JobId::new("main", 0)).unwrap().unwrap().is_aborted());
    assert_eq!(f.fake.calls_for("join"), 0);
}

#[tokio::test]
async fn existing_job_can_be_bound() {
    let f = Fixture::new();
    let orch = f.orchestrator();
    let base = orch.submit(Submission::new(leaf(1))).await.unwrap().job;

    let root = JobRequest::new("join").bind(Binding::job("previous", base.id.clone()));
    let outcome = orch.submit(Submission::new(root)).await.unwrap();
    assert_eq!(outcome.job.jobs["previous"], vec![base.id]);
}

#[tokio::test]
async fn dataset_bindings_are_recorded() {
    let f = Fixture::new();
    let orch = f.orchestrator();
    let base = orch.submit(Submission::new(leaf(1))).await.unwrap().job;

    let root = JobRequest::new("join").bind(Binding::dataset("source", base.id.clone(), "default"));
    let outcome = orch.submit(Submission::new(root)).await.unwrap();
    assert_eq!(outcome.job.datasets["source"], vec![DatasetRef::new(base.id, "default")]);
}

#[tokio::test]
async fn missing_or_unfinished_existing_job_is_invalid() {
    let f = Fixture::new();
    f.fake.fail_next("leaf", FailureCause::Cancelled);
    let orch = f.orchestrator();
    orch.submit(Submission::new(leaf(1))).await.unwrap_err();

    for id in [JobId::new("main", 0), JobId::new("main", 5), JobId::new("nowhere", 0)] {
        let root = JobRequest::new("join").bind(Binding::job("previous", id.clone()));
        let err = orch.submit(Submission::new(root)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOptions, "{id}: {err}");
    }
}

#[tokio::test]
async fn request_can_target_another_workdir() {
    let f = Fixture::new();
    let orch = f.orchestrator();

    let outcome = orch.submit(Submission::new(leaf(1).in_workdir("other"))).await.unwrap();
    assert_eq!(outcome.job.id, JobId::new("other", 0));

    let err = orch.submit(Submission::new(leaf(1).in_workdir("missing"))).await.unwrap_err();
    assert!(matches!(err, SubmitError::UnknownWorkDir { .. }));
}

#[tokio::test]
async fn setup_file_describes_the_job() {
    let f = Fixture::new();
    let orch = f.orchestrator();
    let outcome = orch.submit(Submission::new(leaf(1))).await.unwrap();

    let job_dir = f.db.job_dir(&outcome.job.id).unwrap();
    let setup = read_setup(&job_dir).unwrap();
    assert_eq!(setup.version, SETUP_VERSION);
    assert_eq!(setup.runtime, "default");
    assert_eq!(setup.slices, 3);
    assert!(setup.job.is_finished());
    assert_eq!(setup.workdirs.len(), 2);

    let calls = f.fake.calls();
    assert_eq!(calls[0].request.job_dir, job_dir);
    assert!(calls[0].request.job.is_in_progress());
}

#[tokio::test]
async fn node_states_follow_the_state_machine() {
    let f = Fixture::new();
    let orch = f.orchestrator();
    let mut rx = f.bus.subscribe();

    orch.submit(Submission::new(leaf(1))).await.unwrap();
    orch.submit(Submission::new(leaf(1))).await.unwrap();

    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let StatusKind::Node { state } = event.kind {
            states.push(state);
        }
    }
    use NodeState::*;
    assert_eq!(
        states,
        [
            Requested, Resolving, CacheMiss, Dispatching, Executing, Finished,
            Requested, Resolving, CacheHit, Reused,
        ]
    );
    for pair in states[..6].windows(2).chain(states[6..].windows(2)) {
        assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
    }
}

#[tokio::test]
async fn subjob_records_its_parent() {
    let f = Fixture::new();
    let parent = f.running(Fingerprint::from_hex("aa"), None);
    let orch = f.orchestrator();

    let out = orch.submit(Submission::new(join_of(vec![leaf(2)])).parent(parent.id.clone())).await.unwrap();
    assert_eq!(out.job.parent.as_ref(), Some(&parent.id));
    let built = f.db.get(&out.jobs[0]).unwrap().unwrap();
    assert_eq!(built.parent, Some(parent.id));
}

#[tokio::test]
async fn reported_subjobs_are_recorded() {
    let f = Fixture::new();
    let subjobs = vec![JobId::new("other", 0), JobId::new("main", 9)];
    f.fake.report_subjobs("leaf", subjobs.clone());
    let orch = f.orchestrator();

    let out = orch.submit(Submission::new(leaf(1))).await.unwrap();
    assert_eq!(out.job.subjobs, subjobs);
    assert_eq!(f.db.get(&out.job.id).unwrap().unwrap().subjobs, subjobs);
}

#[tokio::test]
async fn subjob_needs_a_running_parent() {
    let f = Fixture::new();
    let orch = f.orchestrator();
    let finished = orch.submit(Submission::new(leaf(1))).await.unwrap().job;

    let err = orch.submit(Submission::new(leaf(2)).parent(finished.id.clone())).await.unwrap_err();
    assert!(matches!(err, SubmitError::ParentNotRunning { .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::InvalidOptions);

    let err = orch.submit(Submission::new(leaf(2)).parent(JobId::new("main", 40))).await.unwrap_err();
    assert!(matches!(err, SubmitError::UnknownJob { .. }), "{err}");
    assert_eq!(f.fake.calls_for("leaf"), 1);
}

#[tokio::test]
async fn subjob_nesting_is_bounded() {
    let f = Fixture::new();
    let mut chain = vec![f.running(Fingerprint::from_hex("a0"), None)];
    while chain.len() < MAX_SUBJOB_DEPTH {
        let parent = chain.last().map(|j| j.id.clone());
        chain.push(f.running(Fingerprint::from_hex(&format!("a{}", chain.len())), parent));
    }
    let orch = f.orchestrator();
    let deepest = chain.last().unwrap().id.clone();

    let out = orch.submit(Submission::new(leaf(1)).parent(deepest.clone())).await.unwrap();
    assert_eq!(out.job.parent, Some(deepest.clone()));

    let too_deep = f.running(Fingerprint::from_hex("ff"), Some(deepest));
    let err = orch.submit(Submission::new(leaf(2)).parent(too_deep.id)).await.unwrap_err();
    assert!(matches!(err, SubmitError::TooDeep { max: MAX_SUBJOB_DEPTH, .. }), "{err}");
    assert_eq!(f.fake.calls_for("leaf"), 1);
}

#[tokio::test]
async fn subjob_waiting_on_its_own_parent_is_cyclic() {
    let fingerprint = {
        let scratch = Fixture::new();
        scratch.orchestrator().submit(Submission::new(leaf(1))).await.unwrap().job.fingerprint
    };
    let f = Fixture::new();
    let parent = f.running(fingerprint, None);
    let orch = f.orchestrator();

    let submit = orch.submit(Submission::new(leaf(1)).parent(parent.id.clone()));
    let err = tokio::time::timeout(Duration::from_secs(2), submit).await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicDependency);
    assert!(err.to_string().contains(&parent.id.to_string()), "{err}");
    assert_eq!(f.fake.calls_for("leaf"), 0);
}
