// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator: turns a submission into finished jobs.
//!
//! Per node: `requested → resolving → (cache-hit → reused) |
//! (cache-miss → dispatching → executing → finished | aborted)`.
//!
//! Nodes run as soon as all of their children are done, so independent
//! subtrees proceed concurrently. A node whose child failed never runs;
//! unrelated subtrees are not affected.

use crate::executor::{ExecutionRequest, JobExecutor};
use crate::locks::FingerprintLocks;
use crate::resolve::{resolve, Child, DependencyNode, DependencyTree, NodeId, ResolveError};
use crate::status::StatusBus;
use ax_core::{
    fingerprint, Clock, DatasetRef, DependencyDigest, DependencyKind, EquivalenceClasses,
    ErrorKind, FailureCause, Fingerprint, Job, JobId, MethodCatalog, NodeState, Options, PhaseTimeouts,
    StatusEvent, StatusKind, Submission, SystemClock,
};
use ax_storage::{write_setup, Completion, JobDb, JobSetup, NewJob, StorageError, SETUP_VERSION};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// WorkDir for nodes that do not name one.
    pub target_workdir: String,
    pub slices: u32,
    pub concurrency: Option<u32>,
    pub timeouts: PhaseTimeouts,
    /// Handed to jobs so they can submit subjobs.
    pub socket: Option<PathBuf>,
}

impl OrchestratorConfig {
    pub fn new(target_workdir: impl Into<String>) -> Self {
        Self {
            target_workdir: target_workdir.into(),
            slices: 1,
            concurrency: None,
            timeouts: PhaseTimeouts::default(),
            socket: None,
        }
    }

    ax_core::setters! {
        into { target_workdir: String }
        set { slices: u32, timeouts: PhaseTimeouts }
        option { concurrency: u32, socket: PathBuf }
    }
}

/// Deepest chain of subjob submits below a top-level submit.
pub const MAX_SUBJOB_DEPTH: usize = 5;

/// Result of a successful submit.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// The root job.
    pub job: Job,
    /// The root job existed before this submit.
    pub reused: bool,
    /// Every job of the tree, dependencies first.
    pub jobs: Vec<JobId>,
}

/// The node an execution failure started from.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure {
    pub node: String,
    pub method: String,
    /// Set once a job was allocated for the node.
    pub job: Option<JobId>,
    pub cause: FailureCause,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.job {
            Some(job) => write!(f, "{} ({} {job}): {}", self.node, self.method, self.cause),
            None => write!(f, "{} ({}): {}", self.node, self.method, self.cause),
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{node}: unknown workdir {workdir:?}")]
    UnknownWorkDir { node: String, workdir: String },

    #[error("{node}: job {id} does not exist")]
    UnknownJob { node: String, id: JobId },

    #[error("{node}: job {id} is {status}; only finished jobs can be depended on")]
    UnusableJob { node: String, id: JobId, status: String },

    #[error("{node}: {source}")]
    Storage {
        node: String,
        #[source]
        source: StorageError,
    },

    #[error("{failure}")]
    Failed {
        failure: NodeFailure,
        /// Jobs of the tree that did finish or were reused.
        completed: Vec<JobId>,
    },

    #[error("parent job {id} is {status}; only a running job can submit subjobs")]
    ParentNotRunning { id: JobId, status: String },

    #[error("subjob of {id} would nest deeper than {max} levels")]
    TooDeep { id: JobId, max: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

impl SubmitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmitError::Resolve(e) => e.kind(),
            SubmitError::UnknownWorkDir { .. }
            | SubmitError::UnknownJob { .. }
            | SubmitError::UnusableJob { .. }
            | SubmitError::ParentNotRunning { .. }
            | SubmitError::TooDeep { .. } => ErrorKind::InvalidOptions,
            SubmitError::Storage { source, .. } => source.kind(),
            SubmitError::Failed { failure, .. } => failure.cause.kind(),
            SubmitError::Internal(_) => ErrorKind::SubprocessFailure,
        }
    }

    /// Label of the node the error belongs to.
    pub fn node(&self) -> Option<&str> {
        match self {
            SubmitError::Resolve(e) => e.node(),
            SubmitError::UnknownWorkDir { node, .. }
            | SubmitError::UnknownJob { node, .. }
            | SubmitError::UnusableJob { node, .. }
            | SubmitError::Storage { node, .. } => Some(node),
            SubmitError::Failed { failure, .. } => Some(&failure.node),
            SubmitError::ParentNotRunning { .. } | SubmitError::TooDeep { .. } | SubmitError::Internal(_) => None,
        }
    }
}

/// Why a node did not produce a job.
enum NodeError {
    Failed(NodeFailure),
    Storage { node: String, source: StorageError },
    /// The node would wait on a running job it was submitted from.
    Cyclic { cycle: Vec<String> },
}

impl NodeError {
    fn into_submit_error(self, completed: Vec<JobId>) -> SubmitError {
        match self {
            NodeError::Failed(failure) => SubmitError::Failed { failure, completed },
            NodeError::Storage { node, source } => SubmitError::Storage { node, source },
            NodeError::Cyclic { cycle } => SubmitError::Resolve(ResolveError::Cyclic { cycle }),
        }
    }
}

/// The running jobs a subjob submit descends from.
#[derive(Debug, Default)]
pub(crate) struct Lineage {
    /// Recorded as the parent of every job the submit builds.
    parent: Option<JobId>,
    /// Nearest first.
    ancestors: Vec<Job>,
}

#[derive(Clone)]
enum NodeResult {
    Done { job: Job, reused: bool },
    /// The node itself failed.
    Failed,
    /// A child failed; the node never ran. Holds the node that failed.
    Blocked(NodeId),
}

/// A validated submission, ready to walk.
pub(crate) struct Plan {
    pub(crate) tree: DependencyTree,
    pub(crate) existing: HashMap<JobId, Job>,
}

pub(crate) struct Inner<C: Clock> {
    pub(crate) db: Arc<JobDb>,
    pub(crate) catalog: MethodCatalog,
    pub(crate) declared: EquivalenceClasses,
    pub(crate) executor: Arc<dyn JobExecutor>,
    pub(crate) locks: FingerprintLocks,
    pub(crate) bus: StatusBus,
    pub(crate) config: OrchestratorConfig,
    pub(crate) clock: C,
}

pub struct Orchestrator<C: Clock = SystemClock> {
    pub(crate) inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for Orchestrator<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(
        db: Arc<JobDb>,
        catalog: MethodCatalog,
        executor: Arc<dyn JobExecutor>,
        bus: StatusBus,
        config: OrchestratorConfig,
        clock: C,
    ) -> Self {
        let declared = catalog.equivalence();
        Self {
            inner: Arc::new(Inner {
                db,
                catalog,
                declared,
                executor,
                locks: FingerprintLocks::new(),
                bus,
                config,
                clock,
            }),
        }
    }

    pub fn db(&self) -> &Arc<JobDb> {
        &self.inner.db
    }

    pub fn catalog(&self) -> &MethodCatalog {
        &self.inner.catalog
    }

    pub fn bus(&self) -> &StatusBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Newest finished job of `method` whose options include `filter`.
    ///
    /// The filter goes through the method's schema first, so any spelling
    /// a submit accepts matches the job it built.
    pub fn latest(&self, workdir: &str, method: &str, filter: &Options) -> Result<Option<Job>, SubmitError> {
        let node = method.to_string();
        let spec = self.catalog().spec(method).ok_or_else(|| ResolveError::UnknownMethod {
            node: node.clone(),
            method: method.to_string(),
        })?;
        let filter = spec
            .options
            .normalize_filter(method, filter)
            .map_err(|source| ResolveError::InvalidOptions { node: node.clone(), source })?;
        self.db().latest_matching(workdir, method, &filter).map_err(|source| SubmitError::Storage { node, source })
    }

    /// Build or reuse every job of `submission`.
    pub async fn submit(&self, submission: Submission) -> Result<SubmitOutcome, SubmitError> {
        self.submit_with_cancel(submission, CancellationToken::new()).await
    }

    /// Like [`Orchestrator::submit`]; cancelling `cancel` aborts every node
    /// that has not finished yet. Finished nodes stay valid.
    pub async fn submit_with_cancel(
        &self,
        submission: Submission,
        cancel: CancellationToken,
    ) -> Result<SubmitOutcome, SubmitError> {
        let Plan { tree, existing } = self.plan(&submission)?;
        let lineage = Arc::new(self.lineage(submission.parent.as_ref())?);
        let tree = Arc::new(tree);
        let existing = Arc::new(existing);
        let recorded = Arc::new(self.inner.db.equivalence());
        let root = tree.root();
        info!(method = tree.node(root).method(), nodes = tree.len(), "submit");

        for node in tree.nodes() {
            self.inner.publish(&node.label, None, NodeState::Requested);
        }

        let parents = tree.parents();
        let mut waiting: Vec<usize> = tree
            .nodes()
            .iter()
            .map(|n| n.children.iter().filter(|c| matches!(c.child, Child::Node(_))).count())
            .collect();
        let mut results: Vec<Option<NodeResult>> = vec![None; tree.len()];
        let mut errors: HashMap<NodeId, NodeError> = HashMap::new();
        let mut ready: VecDeque<NodeId> = (0..tree.len()).filter(|&id| waiting[id] == 0).collect();
        let mut running = JoinSet::new();

        loop {
            while let Some(id) = ready.pop_front() {
                let node = tree.node(id);
                let blocked = node.children.iter().find_map(|c| match c.child {
                    Child::Node(child) => match &results[child] {
                        Some(NodeResult::Failed) => Some(child),
                        Some(NodeResult::Blocked(origin)) => Some(*origin),
                        _ => None,
                    },
                    Child::Existing(_) => None,
                });
                if let Some(origin) = blocked {
                    debug!(node = %node.label, failed = %tree.node(origin).label, "dependency failed, not running");
                    self.inner.publish(&node.label, None, NodeState::Aborted);
                    results[id] = Some(NodeResult::Blocked(origin));
                    settle(id, &parents, &mut waiting, &mut ready);
                    continue;
                }

                let children: Vec<Job> = node
                    .children
                    .iter()
                    .filter_map(|c| match &c.child {
                        Child::Node(child) => match &results[*child] {
                            Some(NodeResult::Done { job, .. }) => Some(job.clone()),
                            _ => None,
                        },
                        Child::Existing(job) => existing.get(job).cloned(),
                    })
                    .collect();
                let inner = Arc::clone(&self.inner);
                let tree = Arc::clone(&tree);
                let recorded = Arc::clone(&recorded);
                let force = submission.force_build && id == root;
                let cancel = cancel.clone();
                let lineage = Arc::clone(&lineage);
                let node_task = tokio::spawn(async move {
                    inner.run_node(tree.node(id), children, &recorded, &lineage, force, cancel).await
                });
                running.spawn(async move { (id, node_task.await) });
            }

            let Some(joined) = running.join_next().await else { break };
            let (id, outcome) = match joined {
                Ok((id, Ok(outcome))) => (id, outcome),
                Ok((id, Err(e))) => {
                    let node = tree.node(id);
                    error!(node = %node.label, error = %e, "node task failed");
                    let failure = NodeFailure {
                        node: node.label.clone(),
                        method: node.method().to_string(),
                        job: None,
                        cause: FailureCause::SubprocessDied { detail: format!("node task failed: {e}") },
                    };
                    (id, Err(NodeError::Failed(failure)))
                }
                Err(e) => {
                    error!(error = %e, "node watcher failed");
                    continue;
                }
            };
            results[id] = Some(match outcome {
                Ok((job, reused)) => NodeResult::Done { job, reused },
                Err(e) => {
                    errors.insert(id, e);
                    NodeResult::Failed
                }
            });
            settle(id, &parents, &mut waiting, &mut ready);
        }

        let completed: Vec<JobId> = {
            let mut seen = Vec::new();
            for result in results.iter().flatten() {
                if let NodeResult::Done { job, .. } = result {
                    if !seen.contains(&job.id) {
                        seen.push(job.id.clone());
                    }
                }
            }
            seen
        };

        let origin = match results[root].take() {
            Some(NodeResult::Done { job, reused }) => {
                info!(job = %job.id, reused, jobs = completed.len(), "submit finished");
                return Ok(SubmitOutcome { job, reused, jobs: completed });
            }
            Some(NodeResult::Failed) => root,
            Some(NodeResult::Blocked(origin)) => origin,
            None => return Err(SubmitError::Internal("root node never completed".to_string())),
        };
        let err = errors
            .remove(&origin)
            .map(|e| e.into_submit_error(completed))
            .unwrap_or_else(|| SubmitError::Internal("failure without a cause".to_string()));
        warn!(error = %err, "submit failed");
        Err(err)
    }

    /// Walk the parents of a subjob submit. The direct parent must still be
    /// running.
    fn lineage(&self, parent: Option<&JobId>) -> Result<Lineage, SubmitError> {
        let Some(parent) = parent else {
            return Ok(Lineage::default());
        };
        let mut lineage = Lineage { parent: Some(parent.clone()), ancestors: Vec::new() };
        let mut next = Some(parent.clone());
        while let Some(id) = next {
            if lineage.ancestors.len() == MAX_SUBJOB_DEPTH {
                return Err(SubmitError::TooDeep { id: parent.clone(), max: MAX_SUBJOB_DEPTH });
            }
            let job = self
                .inner
                .db
                .get(&id)
                .map_err(|source| SubmitError::Storage { node: "root".to_string(), source })?
                .ok_or_else(|| SubmitError::UnknownJob { node: "root".to_string(), id: id.clone() })?;
            if lineage.ancestors.is_empty() && !job.is_in_progress() {
                return Err(SubmitError::ParentNotRunning { id, status: job.status.to_string() });
            }
            next = job.parent.clone();
            lineage.ancestors.push(job);
        }
        debug!(parent = %parent, depth = lineage.ancestors.len(), "subjob submit");
        Ok(lineage)
    }

    /// Resolve `submission` and check everything it references.
    pub(crate) fn plan(&self, submission: &Submission) -> Result<Plan, SubmitError> {
        let tree = resolve(submission, &self.inner.catalog)?;

        for node in tree.nodes() {
            let workdir = self.inner.workdir_of(node);
            if self.inner.db.workdir_path(workdir).is_none() {
                return Err(SubmitError::UnknownWorkDir {
                    node: node.label.clone(),
                    workdir: workdir.to_string(),
                });
            }
        }

        let mut existing = HashMap::new();
        for node in tree.nodes() {
            for binding in &node.children {
                let Child::Existing(id) = &binding.child else { continue };
                if existing.contains_key(id) {
                    continue;
                }
                let node_label = || node.label.clone();
                if self.inner.db.workdir_path(id.workdir()).is_none() {
                    return Err(SubmitError::UnknownJob { node: node_label(), id: id.clone() });
                }
                let job = self
                    .inner
                    .db
                    .get(id)
                    .map_err(|source| SubmitError::Storage { node: node_label(), source })?
                    .ok_or_else(|| SubmitError::UnknownJob { node: node_label(), id: id.clone() })?;
                if !job.is_finished() {
                    return Err(SubmitError::UnusableJob {
                        node: node_label(),
                        id: id.clone(),
                        status: job.status.to_string(),
                    });
                }
                existing.insert(id.clone(), job);
            }
        }

        Ok(Plan { tree, existing })
    }
}

/// Mark one edge into each parent of `id` as done.
fn settle(id: NodeId, parents: &[Vec<NodeId>], waiting: &mut [usize], ready: &mut VecDeque<NodeId>) {
    for &parent in &parents[id] {
        waiting[parent] -= 1;
        if waiting[parent] == 0 {
            ready.push_back(parent);
        }
    }
}

impl<C: Clock> Inner<C> {
    pub(crate) fn workdir_of<'a>(&'a self, node: &'a DependencyNode) -> &'a str {
        node.workdir.as_deref().unwrap_or(&self.config.target_workdir)
    }

    fn publish(&self, label: &str, job: Option<JobId>, state: NodeState) {
        self.bus.publish(StatusEvent::new(
            job,
            vec![label.to_string()],
            StatusKind::Node { state },
            self.clock.epoch_ms(),
        ));
    }

    /// Every hash the node's method is equivalent to, current first.
    pub(crate) fn hash_class(&self, node: &DependencyNode, recorded: &EquivalenceClasses) -> Vec<String> {
        self.declared.closure(node.method(), &node.spec.source_hash, &[recorded])
    }

    /// Fingerprints of `node` under each hash of its class, given the
    /// fingerprints of its children in binding order.
    pub(crate) fn fingerprints(
        &self,
        node: &DependencyNode,
        children: &[Fingerprint],
        recorded: &EquivalenceClasses,
    ) -> Vec<Fingerprint> {
        let digests: Vec<DependencyDigest> = node
            .children
            .iter()
            .zip(children)
            .map(|(binding, fp)| DependencyDigest {
                kind: binding.kind,
                slot: binding.slot.clone(),
                position: binding.position,
                fingerprint: fp.clone(),
                dataset: binding.dataset.clone(),
            })
            .collect();
        self.hash_class(node, recorded)
            .iter()
            .map(|hash| fingerprint(node.method(), hash, &node.options, &digests))
            .collect()
    }

    async fn run_node(
        &self,
        node: &DependencyNode,
        children: Vec<Job>,
        recorded: &EquivalenceClasses,
        lineage: &Lineage,
        force: bool,
        cancel: CancellationToken,
    ) -> Result<(Job, bool), NodeError> {
        let label = node.label.as_str();
        let method = node.method();
        let workdir = self.workdir_of(node);
        let fail = |job: Option<JobId>, cause: FailureCause| {
            NodeError::Failed(NodeFailure { node: label.to_string(), method: method.to_string(), job, cause })
        };
        let storage = |source: StorageError| NodeError::Storage { node: label.to_string(), source };

        self.publish(label, None, NodeState::Resolving);
        if cancel.is_cancelled() {
            self.publish(label, None, NodeState::Aborted);
            return Err(fail(None, FailureCause::Cancelled));
        }

        let child_fps: Vec<Fingerprint> = children.iter().map(|j| j.fingerprint.clone()).collect();
        let candidates = self.fingerprints(node, &child_fps, recorded);
        let Some(current) = candidates.first().cloned() else {
            return Err(fail(None, FailureCause::SubprocessDied { detail: "no fingerprint".to_string() }));
        };

        if !force {
            if let Some(job) = self.db.lookup_any(workdir, &candidates).map_err(storage)? {
                return Ok(self.reuse(label, job));
            }
        }
        let waits_on_ancestor =
            lineage.ancestors.iter().find(|a| a.is_in_progress() && candidates.contains(&a.fingerprint));
        if let Some(ancestor) = waits_on_ancestor {
            return Err(NodeError::Cyclic { cycle: vec![ancestor.id.to_string(), label.to_string()] });
        }
        self.publish(label, None, NodeState::CacheMiss);

        let _guard = tokio::select! {
            guard = self.locks.lock(workdir, &current) => guard,
            _ = cancel.cancelled() => {
                self.publish(label, None, NodeState::Aborted);
                return Err(fail(None, FailureCause::Cancelled));
            }
        };
        if !force {
            if let Some(job) = self.db.lookup_any(workdir, &candidates).map_err(storage)? {
                debug!(node = label, job = %job.id, "built by a concurrent submit");
                return Ok(self.reuse(label, job));
            }
        }

        let (jobs, datasets) = dependency_maps(node, &children);
        let job = self
            .db
            .begin(
                workdir,
                NewJob {
                    fingerprint: current.clone(),
                    method: method.to_string(),
                    source_hash: node.spec.source_hash.clone(),
                    equivalent_hashes: node.spec.equivalent_hashes.clone(),
                    options: node.options.clone(),
                    jobs,
                    datasets,
                    started_at_ms: self.clock.epoch_ms(),
                    parent: lineage.parent.clone(),
                },
            )
            .map_err(storage)?;
        let id = job.id.clone();
        info!(node = label, job = %id, method, fingerprint = current.short(), "building");
        self.publish(label, Some(id.clone()), NodeState::Dispatching);

        let job_dir = match self.write_setup(&job) {
            Ok(dir) => dir,
            Err(e) => {
                let cause = FailureCause::SubprocessDied { detail: format!("cannot write job setup: {e}") };
                return Err(self.abort(label, fail(Some(id.clone()), cause.clone()), &id, cause));
            }
        };

        self.publish(label, Some(id.clone()), NodeState::Executing);
        let request = ExecutionRequest {
            job: job.clone(),
            runtime: node.runtime.clone(),
            job_dir,
            timeouts: self.config.timeouts,
        };
        match self.executor.execute(request, cancel).await {
            Ok(report) => {
                let completion = Completion {
                    ended_at_ms: self.clock.epoch_ms(),
                    profile: report.profile,
                    files: report.files,
                    subjobs: report.subjobs,
                };
                let finished = match self.db.record(&id, completion) {
                    Ok(job) => job,
                    Err(source) => {
                        error!(node = label, job = %id, error = %source, "could not record finished job");
                        let cause = FailureCause::SubprocessDied { detail: format!("result not recorded: {source}") };
                        return Err(self.abort(label, storage(source), &id, cause));
                    }
                };
                if let Err(e) = self.write_setup(&finished) {
                    warn!(job = %id, error = %e, "could not update job setup");
                }
                info!(node = label, job = %id, "finished");
                self.publish(label, Some(id), NodeState::Finished);
                Ok((finished, false))
            }
            Err(cause) => {
                warn!(node = label, job = %id, %cause, "aborted");
                Err(self.abort(label, fail(Some(id.clone()), cause.clone()), &id, cause))
            }
        }
    }

    fn reuse(&self, label: &str, job: Job) -> (Job, bool) {
        debug!(node = label, job = %job.id, "cache hit");
        self.publish(label, Some(job.id.clone()), NodeState::CacheHit);
        self.publish(label, Some(job.id.clone()), NodeState::Reused);
        (job, true)
    }

    /// Tombstone `id` and hand back the error to report.
    fn abort(&self, label: &str, err: NodeError, id: &JobId, cause: FailureCause) -> NodeError {
        let err = match self.db.mark_aborted(id, self.clock.epoch_ms(), cause) {
            Ok(_) => err,
            Err(source) => NodeError::Storage { node: label.to_string(), source },
        };
        self.publish(label, Some(id.clone()), NodeState::Aborted);
        err
    }

    fn write_setup(&self, job: &Job) -> Result<PathBuf, StorageError> {
        let job_dir = self.db.job_dir(&job.id).ok_or_else(|| StorageError::UnknownJob(job.id.clone()))?;
        let setup = JobSetup {
            version: SETUP_VERSION,
            job: job.clone(),
            runtime: self
                .catalog
                .get(&job.method)
                .map(|e| e.runtime.clone())
                .unwrap_or_default(),
            slices: self.config.slices,
            concurrency: self.config.concurrency,
            timeouts: self.config.timeouts,
            workdirs: self.db.workdir_paths(),
            socket: self.config.socket.clone(),
        };
        write_setup(&job_dir, &setup)?;
        Ok(job_dir)
    }
}

type DependencyMaps = (BTreeMap<String, Vec<JobId>>, BTreeMap<String, Vec<DatasetRef>>);

/// Dependency ids per slot, in binding order.
fn dependency_maps(node: &DependencyNode, children: &[Job]) -> DependencyMaps {
    let mut jobs: BTreeMap<String, Vec<JobId>> = BTreeMap::new();
    let mut datasets: BTreeMap<String, Vec<DatasetRef>> = BTreeMap::new();
    for (binding, child) in node.children.iter().zip(children) {
        match binding.kind {
            DependencyKind::Job => jobs.entry(binding.slot.clone()).or_default().push(child.id.clone()),
            DependencyKind::Dataset => datasets.entry(binding.slot.clone()).or_default().push(DatasetRef::new(
                child.id.clone(),
                binding.dataset.clone().unwrap_or_default(),
            )),
        }
    }
    (jobs, datasets)
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
