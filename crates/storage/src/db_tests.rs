// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ax_core::test_support::options;
use ax_core::Profile;
use serde_json::json;
use std::io::Write;
use tempfile::{tempdir, TempDir};

fn open_db(dir: &TempDir) -> JobDb {
    JobDb::open([
        ("main".to_string(), dir.path().join("main")),
        ("side".to_string(), dir.path().join("side")),
    ])
}

fn new_job(fp: &str, opts: serde_json::Value) -> NewJob {
    NewJob {
        fingerprint: Fingerprint::from_hex(fp),
        method: "m".into(),
        source_hash: "h1".into(),
        equivalent_hashes: Vec::new(),
        options: options(opts),
        jobs: BTreeMap::new(),
        datasets: BTreeMap::new(),
        started_at_ms: 10,
        parent: None,
    }
}

fn done(ms: u64) -> Completion {
    Completion { ended_at_ms: ms, profile: Profile::default(), files: vec!["result.json".into()], subjobs: vec![] }
}

#[test]
fn begin_then_record_makes_a_hit() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);
    let fp = Fingerprint::from_hex("aa");

    let job = db.begin("main", new_job("aa", json!({}))).unwrap();
    assert!(db.lookup_exact("main", &fp).unwrap().is_none());

    db.record(&job.id, done(20)).unwrap();
    let hit = db.lookup_exact("main", &fp).unwrap().unwrap();
    assert_eq!(hit.id, JobId::new("main", 0));
    assert_eq!(hit.ended_at_ms, Some(20));
}

#[test]
fn parent_and_subjobs_survive_reopen() {
    let dir = tempdir().unwrap();
    let (parent, child) = {
        let db = open_db(&dir);
        let parent = db.begin("main", new_job("aa", json!({}))).unwrap();
        let child = db
            .begin("side", NewJob { parent: Some(parent.id.clone()), ..new_job("bb", json!({})) })
            .unwrap();
        db.record(&child.id, done(5)).unwrap();
        db.record(&parent.id, Completion { subjobs: vec![child.id.clone()], ..done(6) }).unwrap();
        (parent.id, child.id)
    };

    let db = open_db(&dir);
    assert_eq!(db.get(&parent).unwrap().unwrap().subjobs, [child.clone()]);
    let child = db.get(&child).unwrap().unwrap();
    assert_eq!(child.parent, Some(parent));
    assert!(child.subjobs.is_empty());
}

#[test]
fn workdirs_have_separate_sequences() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);
    let a = db.begin("main", new_job("aa", json!({}))).unwrap();
    let b = db.begin("side", new_job("aa", json!({}))).unwrap();
    assert_eq!(a.id.number(), 0);
    assert_eq!(b.id.number(), 0);
    assert!(db.lookup_exact("side", &Fingerprint::from_hex("aa")).unwrap().is_none());
}

#[test]
fn aborted_number_is_never_reissued() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);
    let a = db.begin("main", new_job("aa", json!({}))).unwrap();
    db.mark_aborted(&a.id, 11, FailureCause::Cancelled).unwrap();

    let b = db.begin("main", new_job("aa", json!({}))).unwrap();

    assert_eq!(b.id.number(), 1);
    assert!(db.lookup_exact("main", &Fingerprint::from_hex("aa")).unwrap().is_none());
    assert!(db.latest("main", "m").unwrap().is_none());
}

#[test]
fn unknown_workdir_is_an_error() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);
    assert!(matches!(
        db.lookup_exact("nope", &Fingerprint::from_hex("aa")),
        Err(StorageError::UnknownWorkDir(_))
    ));
}

#[test]
fn lookup_any_tries_in_order() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);
    let a = db.begin("main", new_job("bb", json!({}))).unwrap();
    db.record(&a.id, done(1)).unwrap();

    let fps = [Fingerprint::from_hex("aa"), Fingerprint::from_hex("bb")];
    assert_eq!(db.lookup_any("main", &fps).unwrap().unwrap().id, a.id);
    assert!(db.lookup_any("main", &fps[..1]).unwrap().is_none());
}

#[test]
fn interrupted_jobs_are_aborted_on_restart() {
    let dir = tempdir().unwrap();
    {
        let db = open_db(&dir);
        db.begin("main", new_job("aa", json!({}))).unwrap();
        db.close().unwrap();
    }

    let db = open_db(&dir);
    let aborted = db.abort_interrupted(50).unwrap();

    assert_eq!(aborted, vec![JobId::new("main", 0)]);
    let job = db.get(&JobId::new("main", 0)).unwrap().unwrap();
    assert_eq!(job.status, ax_core::JobStatus::Aborted { cause: FailureCause::Interrupted });
    assert_eq!(db.begin("main", new_job("aa", json!({}))).unwrap().id.number(), 1);
}

#[test]
fn closest_ranks_by_differing_options() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);
    for (fp, opts) in [
        ("aa", json!({"n": 1, "mode": "fast"})),
        ("bb", json!({"n": 2, "mode": "fast"})),
        ("cc", json!({"n": 3, "mode": "slow"})),
    ] {
        let job = db.begin("main", new_job(fp, opts)).unwrap();
        db.record(&job.id, done(1)).unwrap();
    }

    let wanted = options(json!({"n": 4, "mode": "fast"}));
    let found = db.closest("main", "m", &["h1".to_string()], &wanted, 2).unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].job.id.number(), 1);
    assert_eq!(found[0].differing, vec!["n"]);
    assert_eq!(found[1].job.id.number(), 0);

    let other_hash = db.closest("main", "m", &["h9".to_string()], &wanted, 2).unwrap();
    assert!(other_hash.is_empty());
}

#[test]
fn broken_workdir_is_isolated_and_repairable() {
    let dir = tempdir().unwrap();
    {
        let db = open_db(&dir);
        db.begin("main", new_job("aa", json!({}))).unwrap();
    }
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join("main").join(crate::LOG_FILE))
            .unwrap();
        writeln!(
            file,
            "{}",
            json!({"seq": 2, "record": {"type": "started", "job": serde_json::to_value(
                ax_core::Job::builder().id(JobId::new("main", 7)).build()
            ).unwrap()}})
        )
        .unwrap();
    }

    let db = open_db(&dir);
    assert_eq!(db.broken().len(), 1);
    assert!(matches!(
        db.begin("main", new_job("aa", json!({}))),
        Err(StorageError::Inconsistent { seq: 2, .. })
    ));
    assert!(db.begin("side", new_job("aa", json!({}))).is_ok());

    let report = db.repair("main", 60).unwrap();
    assert_eq!(report.kept, 2);
    assert_eq!(report.retired, 6);
    assert!(db.broken().is_empty());
    let first = db.get(&JobId::new("main", 0)).unwrap().unwrap();
    assert!(first.is_aborted());
    // The out-of-order job is tombstoned and the gap before it stays retired
    assert!(db.get(&JobId::new("main", 7)).unwrap().unwrap().is_aborted());
    assert!(db.get(&JobId::new("main", 3)).unwrap().is_none());
    assert_eq!(db.begin("main", new_job("aa", json!({}))).unwrap().id, JobId::new("main", 8));
}

#[test]
fn equivalence_merges_workdirs() {
    let dir = tempdir().unwrap();
    let db = open_db(&dir);
    let mut new = new_job("aa", json!({}));
    new.source_hash = "h2".into();
    new.equivalent_hashes = vec!["h1".into()];
    db.begin("side", new).unwrap();

    assert_eq!(db.equivalence().closure("m", "h1", &[]), vec!["h1", "h2"]);
}
