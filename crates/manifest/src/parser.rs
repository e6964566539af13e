use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use commons::DepgraphError;
use crawler::Resolver;
use graph::{Dag, Node, Options, PROJECT_ROOT_ID};
use tokio_util::sync::CancellationToken;

/// What [`ManifestParser::parse`] returns: the assembled DAG, the parser's
/// type label, whether that DAG already has transitive edges, and the root
/// node's id (always [`PROJECT_ROOT_ID`] for the manifest parsers in this
/// crate).
#[derive(Debug, Clone)]
pub struct ManifestResult {
    pub dag: Dag,
    pub manifest_type: String,
    pub includes_transitive: bool,
    pub root_name: String,
}

/// A local-file front-end that substitutes a registry root fetch with
/// direct dependencies read out of a manifest file.
#[async_trait]
pub trait ManifestParser: Send + Sync {
    /// True if `filename` (basename, not full path) is this dialect's file.
    fn supports(&self, filename: &str) -> bool;

    /// Canonical type label, e.g. `"cargo"`, `"npm"`, `"composer"`.
    fn manifest_type(&self) -> &str;

    /// True if this parser was built with a [`Resolver`] and therefore
    /// expands direct dependencies into their full transitive closure.
    fn includes_transitive(&self) -> bool;

    /// Read `path` and build a [`ManifestResult`].
    async fn parse(
        &self,
        path: &Path,
        token: &CancellationToken,
        options: Options,
    ) -> Result<ManifestResult, DepgraphError>;
}

/// Shared policy every manifest parser in this crate follows: attach a
/// `__project__` sentinel root, add one edge per direct dependency, and —
/// if `resolver` is set — expand each dependency into its own subgraph and
/// union it in. Failures resolving an individual dependency are logged and
/// leave that dependency as an isolated node (the sentinel edge still
/// exists either way).
pub(crate) async fn build_manifest_dag(
    resolver: &Option<Arc<dyn Resolver>>,
    token: &CancellationToken,
    options: &Options,
    manifest_type: &str,
    root_version: &str,
    direct_deps: Vec<String>,
) -> ManifestResult {
    let mut dag = Dag::new();
    let mut root = Node::new(PROJECT_ROOT_ID);
    root.meta.insert("virtual".to_string(), "true".to_string());
    root.meta
        .insert("version".to_string(), root_version.to_string());
    dag.upsert_node(root);

    match resolver {
        None => {
            for dep in &direct_deps {
                dag.add_edge(PROJECT_ROOT_ID, dep.clone());
            }
        }
        Some(resolver) => {
            for dep in &direct_deps {
                dag.add_edge(PROJECT_ROOT_ID, dep.clone());
                match resolver.resolve(token, dep, options.clone()).await {
                    Ok(sub) => dag.merge(sub),
                    Err(err) => {
                        options.log(format!(
                            "failed to resolve manifest dependency {}: {}",
                            dep, err
                        ));
                    }
                }
            }
        }
    }

    ManifestResult {
        dag,
        manifest_type: manifest_type.to_string(),
        includes_transitive: resolver.is_some(),
        root_name: PROJECT_ROOT_ID.to_string(),
    }
}
