use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use commons::DepgraphError;
use graph::{Dag, Options, Package, PackageRef};
use registry::Fetcher;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Resolver;

/// Fixed worker-pool size. Not configurable through [`Options`]: it governs
/// how many fetches run concurrently, not the shape of the resulting graph.
const DEFAULT_WORKERS: usize = 20;

struct Job {
    name: String,
    depth: u32,
}

struct JobResult {
    job: Job,
    outcome: Result<Package, DepgraphError>,
}

/// Mutable state shared by the collector, every worker and every enrichment
/// task spawned during one [`Crawler::resolve`] call.
struct Shared {
    visited: Mutex<HashSet<String>>,
    node_count: AtomicU32,
    pending: AtomicI64,
    meta: Mutex<indexmap::IndexMap<String, indexmap::IndexMap<String, String>>>,
    dag: Mutex<Dag>,
    closing: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Shared {
            visited: Mutex::new(HashSet::new()),
            node_count: AtomicU32::new(0),
            pending: AtomicI64::new(0),
            meta: Mutex::new(indexmap::IndexMap::new()),
            dag: Mutex::new(Dag::new()),
            closing: AtomicBool::new(false),
        }
    }
}

/// Checks and inserts `name` into the visited set, then pushes a [`Job`]
/// onto the work queue. A name already visited is a silent no-op: this is
/// the single dedup point that makes cycles and diamonds safe (an edge can
/// still be added for a name that's already enqueued; only the fetch is
/// deduplicated).
///
/// A closed or full-and-cancelled work queue is swallowed rather than
/// propagated — shutdown races must never panic a worker or the collector.
async fn enqueue(
    shared: &Shared,
    work_tx: &mpsc::Sender<Job>,
    shutdown: &CancellationToken,
    name: &str,
    depth: u32,
) {
    if shared.closing.load(Ordering::SeqCst) {
        return;
    }
    {
        let mut visited = shared.visited.lock().unwrap();
        if !visited.insert(name.to_string()) {
            return;
        }
    }
    shared.node_count.fetch_add(1, Ordering::SeqCst);
    shared.pending.fetch_add(1, Ordering::SeqCst);

    tokio::select! {
        result = work_tx.send(Job { name: name.to_string(), depth }) => {
            if result.is_err() {
                shared.pending.fetch_sub(1, Ordering::SeqCst);
            }
        }
        _ = shutdown.cancelled() => {
            shared.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

async fn worker_loop(
    fetcher: Arc<dyn Fetcher>,
    work_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    result_tx: mpsc::Sender<JobResult>,
    shutdown: CancellationToken,
    refresh: bool,
) {
    loop {
        let job = {
            let mut rx = work_rx.lock().await;
            rx.recv().await
        };
        let job = match job {
            Some(job) => job,
            None => return,
        };

        if shutdown.is_cancelled() {
            // Drop the job without calling the network, but still post a
            // (failing) Result so the collector's single decrement-on-result
            // path accounts for `pending` uniformly regardless of why a job
            // didn't succeed.
            if result_tx
                .send(JobResult {
                    job,
                    outcome: Err(DepgraphError::Other(anyhow::anyhow!("cancelled"))),
                })
                .await
                .is_err()
            {
                return;
            }
            continue;
        }

        let outcome = fetcher.fetch(&shutdown, &job.name, refresh).await;
        if result_tx.send(JobResult { job, outcome }).await.is_err() {
            return;
        }
    }
}

/// Turns a root package name into a [`Dag`] via a fixed-size worker pool.
///
/// One `Crawler` wraps one ecosystem [`Fetcher`]; a full crawl is driven by
/// [`Crawler::resolve`] (exposed through the [`Resolver`] trait), which owns
/// the work/result queues and all shared crawl state for the duration of
/// that single call — nothing survives across calls.
pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    workers: usize,
}

impl Crawler {
    /// Build a crawler backed by `fetcher`, using the default worker count.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    /// Build a crawler with an explicit worker count (at least 1).
    pub fn with_workers(fetcher: Arc<dyn Fetcher>, workers: usize) -> Self {
        Crawler {
            fetcher,
            workers: workers.max(1),
        }
    }
}

#[async_trait]
impl Resolver for Crawler {
    fn name(&self) -> &str {
        self.fetcher.name()
    }

    async fn resolve(
        &self,
        token: &CancellationToken,
        root_name: &str,
        options: Options,
    ) -> Result<Dag, DepgraphError> {
        if token.is_cancelled() {
            return Err(DepgraphError::Other(anyhow::anyhow!(
                "context cancelled before crawl of {} started",
                root_name
            )));
        }

        let shared = Arc::new(Shared::new());
        let ecosystem = self.fetcher.name().to_string();

        // `shutdown` inherits the caller's cancellation but can also be
        // tripped internally (root failure) without affecting `token`
        // itself, so the "cancelled before root" check below keeps working
        // even after we've triggered our own shutdown.
        let shutdown = token.child_token();

        let queue_capacity = 2 * self.workers;
        let (work_tx, work_rx) = mpsc::channel::<Job>(queue_capacity);
        let (result_tx, mut result_rx) = mpsc::channel::<JobResult>(queue_capacity);
        let work_rx = Arc::new(tokio::sync::Mutex::new(work_rx));

        let mut worker_handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            worker_handles.push(tokio::spawn(worker_loop(
                self.fetcher.clone(),
                work_rx.clone(),
                result_tx.clone(),
                shutdown.clone(),
                options.refresh,
            )));
        }
        // The collector never sends work itself from inside a worker; drop
        // our extra result_tx clone count back down to one per worker plus
        // this function's ability to observe channel closure correctly.
        drop(result_tx);

        enqueue(&shared, &work_tx, &shutdown, root_name, 0).await;

        let mut root_err: Option<DepgraphError> = None;
        let mut root_settled = false;
        let mut enrich_handles: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                maybe_result = result_rx.recv() => {
                    let Some(JobResult { job, outcome }) = maybe_result else {
                        break;
                    };

                    match outcome {
                        Ok(pkg) => {
                            handle_success(
                                &shared,
                                &options,
                                &ecosystem,
                                &work_tx,
                                &shutdown,
                                &job,
                                pkg,
                                &mut enrich_handles,
                            )
                            .await;
                            if job.depth == 0 {
                                root_settled = true;
                            }
                        }
                        Err(err) => {
                            if job.depth == 0 {
                                shared.closing.store(true, Ordering::SeqCst);
                                shutdown.cancel();
                                root_err = Some(wrap_root_error(err, root_name));
                                root_settled = true;
                            } else {
                                options.log(format!("fetch failed for {}: {}", job.name, err));
                            }
                        }
                    }

                    if shared.pending.fetch_sub(1, Ordering::SeqCst) - 1 <= 0 {
                        break;
                    }
                }
                _ = token.cancelled(), if !root_settled => {
                    shared.closing.store(true, Ordering::SeqCst);
                    shutdown.cancel();
                    teardown(work_tx, worker_handles).await;
                    return Err(DepgraphError::Other(anyhow::anyhow!(
                        "context cancelled before root package {} was resolved",
                        root_name
                    )));
                }
            }
        }

        shared.closing.store(true, Ordering::SeqCst);
        teardown(work_tx, worker_handles).await;

        if let Some(err) = root_err {
            return Err(err);
        }

        for handle in enrich_handles {
            let _ = handle.await;
        }

        apply_metadata(&shared);
        Ok(shared.dag.lock().unwrap().clone())
    }
}

async fn teardown(work_tx: mpsc::Sender<Job>, worker_handles: Vec<JoinHandle<()>>) {
    drop(work_tx);
    for handle in worker_handles {
        let _ = handle.await;
    }
}

fn wrap_root_error(err: DepgraphError, root_name: &str) -> DepgraphError {
    match err {
        DepgraphError::NotFound(msg) => {
            DepgraphError::NotFound(format!("root package {}: {}", root_name, msg))
        }
        other => other,
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_success(
    shared: &Arc<Shared>,
    options: &Options,
    ecosystem: &str,
    work_tx: &mpsc::Sender<Job>,
    shutdown: &CancellationToken,
    job: &Job,
    pkg: Package,
    enrich_handles: &mut Vec<JoinHandle<()>>,
) {
    {
        let mut dag = shared.dag.lock().unwrap();
        dag.ensure_node(job.name.clone());
        for dep in &pkg.dependencies {
            dag.add_edge(job.name.clone(), dep.clone());
        }
    }

    shared
        .meta
        .lock()
        .unwrap()
        .insert(job.name.clone(), pkg.metadata());

    if !options.metadata_providers.is_empty() {
        let package_ref = PackageRef {
            ecosystem: ecosystem.to_string(),
            name: job.name.clone(),
            version: pkg.version.clone(),
        };
        enrich_handles.push(spawn_enrichment(
            shared.clone(),
            options.clone(),
            shutdown.clone(),
            package_ref,
        ));
    }

    for dep in &pkg.dependencies {
        let can_enqueue = shared.node_count.load(Ordering::SeqCst) < options.max_nodes
            && job.depth < options.max_depth;
        if can_enqueue {
            enqueue(shared, work_tx, shutdown, dep, job.depth + 1).await;
        }
    }
}

fn spawn_enrichment(
    shared: Arc<Shared>,
    options: Options,
    shutdown: CancellationToken,
    package_ref: PackageRef,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut merged = indexmap::IndexMap::new();
        for provider in &options.metadata_providers {
            match provider
                .enrich(&shutdown, &package_ref, options.refresh)
                .await
            {
                Ok(fields) => merged.extend(fields),
                Err(err) => options.log(format!(
                    "metadata enrichment failed for {}: {}",
                    package_ref.name, err
                )),
            }
        }
        if merged.is_empty() {
            return;
        }
        let mut table = shared.meta.lock().unwrap();
        table
            .entry(package_ref.name.clone())
            .or_default()
            .extend(merged);
    })
}

fn apply_metadata(shared: &Shared) {
    let meta = shared.meta.lock().unwrap();
    let mut dag = shared.dag.lock().unwrap();
    for (id, fields) in meta.iter() {
        if let Some(node) = dag.node_mut(id) {
            node.meta = fields.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct ScriptedFetcher {
        graph: HashMap<&'static str, Vec<&'static str>>,
        not_found: HashSet<&'static str>,
        calls: Arc<Mutex<HashMap<String, usize>>>,
    }

    impl ScriptedFetcher {
        fn new(graph: &[(&'static str, &[&'static str])]) -> Self {
            ScriptedFetcher {
                graph: graph.iter().map(|(k, v)| (*k, v.to_vec())).collect(),
                not_found: HashSet::new(),
                calls: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        fn with_not_found(mut self, name: &'static str) -> Self {
            self.not_found.insert(name);
            self
        }

        fn call_count(&self, name: &str) -> usize {
            *self.calls.lock().unwrap().get(name).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        fn name(&self) -> &str {
            "test"
        }

        async fn fetch(
            &self,
            _token: &CancellationToken,
            name: &str,
            _refresh: bool,
        ) -> Result<Package, DepgraphError> {
            *self.calls.lock().unwrap().entry(name.to_string()).or_insert(0) += 1;
            if self.not_found.contains(name) {
                return Err(DepgraphError::NotFound(name.to_string()));
            }
            let deps = self
                .graph
                .get(name)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect();
            Ok(Package {
                name: name.to_string(),
                version: "1.0.0".to_string(),
                dependencies: deps,
                ..Default::default()
            })
        }
    }

    fn options(max_depth: u32, max_nodes: u32) -> Options {
        Options {
            max_depth,
            max_nodes,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn trivial_chain() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[("a", &["b"]), ("b", &[])]));
        let crawler = Crawler::with_workers(fetcher, 4);
        let token = CancellationToken::new();
        let dag = crawler
            .resolve(&token, "a", options(5, 100))
            .await
            .unwrap();

        assert_eq!(dag.node_count(), 2);
        assert!(dag.contains_edge("a", "b"));
        assert_eq!(dag.edge_count(), 1);
    }

    #[tokio::test]
    async fn diamond_fetches_shared_dependency_once() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[
            ("a", &["b", "c"]),
            ("b", &["d"]),
            ("c", &["d"]),
            ("d", &[]),
        ]));
        let crawler = Crawler::with_workers(fetcher.clone(), 4);
        let token = CancellationToken::new();
        let dag = crawler
            .resolve(&token, "a", options(5, 100))
            .await
            .unwrap();

        assert_eq!(dag.node_count(), 4);
        assert_eq!(dag.edge_count(), 4);
        assert!(dag.contains_edge("a", "b"));
        assert!(dag.contains_edge("a", "c"));
        assert!(dag.contains_edge("b", "d"));
        assert!(dag.contains_edge("c", "d"));
        assert_eq!(fetcher.call_count("d"), 1);
    }

    #[tokio::test]
    async fn depth_cap_adds_node_without_fetching_it() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[
            ("a", &["b"]),
            ("b", &["c"]),
            ("c", &["d"]),
            ("d", &[]),
        ]));
        let crawler = Crawler::with_workers(fetcher.clone(), 4);
        let token = CancellationToken::new();
        let dag = crawler
            .resolve(&token, "a", options(2, 100))
            .await
            .unwrap();

        assert_eq!(dag.node_count(), 4);
        assert!(dag.contains_edge("c", "d"));
        assert_eq!(fetcher.call_count("d"), 0);
    }

    #[tokio::test]
    async fn max_depth_zero_yields_only_the_root() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[("a", &["b"])]));
        let crawler = Crawler::with_workers(fetcher, 4);
        let token = CancellationToken::new();
        let dag = crawler
            .resolve(&token, "a", options(0, 100))
            .await
            .unwrap();

        assert_eq!(dag.node_count(), 1);
        assert_eq!(dag.edge_count(), 0);
    }

    #[tokio::test]
    async fn max_nodes_one_adds_direct_edges_but_queues_no_grandchildren() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[
            ("a", &["b", "c"]),
            ("b", &["d"]),
            ("c", &["d"]),
        ]));
        let crawler = Crawler::with_workers(fetcher.clone(), 4);
        let token = CancellationToken::new();
        let dag = crawler
            .resolve(&token, "a", options(5, 1))
            .await
            .unwrap();

        assert!(dag.contains_edge("a", "b"));
        assert!(dag.contains_edge("a", "c"));
        assert_eq!(fetcher.call_count("b"), 0);
        assert_eq!(fetcher.call_count("c"), 0);
    }

    #[tokio::test]
    async fn non_root_failure_leaves_a_partial_graph() {
        let fetcher =
            Arc::new(ScriptedFetcher::new(&[("a", &["b", "c"]), ("b", &[])]).with_not_found("c"));
        let crawler = Crawler::with_workers(fetcher, 4);
        let token = CancellationToken::new();
        let dag = crawler
            .resolve(&token, "a", options(5, 100))
            .await
            .unwrap();

        assert_eq!(dag.node_count(), 3);
        assert!(dag.contains_edge("a", "c"));
        assert_eq!(dag.edges().filter(|(from, _)| from == "c").count(), 0);
    }

    #[tokio::test]
    async fn root_failure_returns_an_error_and_no_graph() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[]).with_not_found("a"));
        let crawler = Crawler::with_workers(fetcher, 4);
        let token = CancellationToken::new();
        let result = crawler.resolve(&token, "a", options(5, 100)).await;

        match result {
            Err(DepgraphError::NotFound(msg)) => assert!(msg.contains('a')),
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn dependency_cycle_materializes_both_edges_once() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[("a", &["b"]), ("b", &["a"])]));
        let crawler = Crawler::with_workers(fetcher.clone(), 4);
        let token = CancellationToken::new();
        let dag = crawler
            .resolve(&token, "a", options(5, 100))
            .await
            .unwrap();

        assert_eq!(dag.node_count(), 2);
        assert_eq!(dag.edge_count(), 2);
        assert!(dag.contains_edge("a", "b"));
        assert!(dag.contains_edge("b", "a"));
        assert_eq!(fetcher.call_count("a"), 1);
        assert_eq!(fetcher.call_count("b"), 1);
    }

    #[tokio::test]
    async fn cancelled_before_any_result_returns_cancellation_error() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[("a", &[])]));
        let crawler = Crawler::with_workers(fetcher, 4);
        let token = CancellationToken::new();
        token.cancel();
        let result = crawler.resolve(&token, "a", options(5, 100)).await;
        assert!(result.is_err());
    }
}
