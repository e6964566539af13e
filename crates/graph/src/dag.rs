use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Sentinel node id used as the virtual root when a manifest is parsed
/// without a named root package.
pub const PROJECT_ROOT_ID: &str = "__project__";

/// What kind of vertex a [`Node`] is.
///
/// Only [`NodeKind::Regular`] is ever produced by this crate; `Subdivider`
/// exists so downstream layout code can tag nodes it inserts without
/// needing its own node type, and is never interpreted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodeKind {
    #[default]
    Regular,
    SubdividerForLayout,
}

/// A vertex in the DAG: a canonical package name (or [`PROJECT_ROOT_ID`])
/// plus the display metadata attached once the crawl finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub meta: IndexMap<String, String>,
    #[serde(default)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            meta: IndexMap::new(),
            kind: NodeKind::Regular,
        }
    }
}

/// An ordered pair `(from, to)`: "`from` depends on `to`".
pub type Edge = (String, String);

/// The directed graph of packages produced by a crawl.
///
/// Acyclicity is *not* enforced here: the container will happily hold an
/// edge `B -> A` alongside `A -> B` if asked to, because the crawler's
/// visited-set (not the container) is what keeps concurrent fetches of a
/// package to one-per-name. This matters for diamond and even pathological
/// cyclic dependency data, which still needs to materialize every declared
/// edge even though each node is fetched exactly once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dag {
    nodes: IndexMap<String, Node>,
    edges: IndexSet<Edge>,
}

impl Dag {
    pub fn new() -> Self {
        Dag::default()
    }

    /// Insert a node if `id` isn't already present; a no-op (not an
    /// overwrite) otherwise, so callers may call this unconditionally when
    /// adding a dependency edge's endpoints.
    pub fn ensure_node(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.nodes.entry(id.clone()).or_insert_with(|| Node::new(id));
    }

    /// Insert or replace a node outright.
    pub fn upsert_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Add the edge `(from, to)`, inserting both endpoints as nodes if
    /// missing. Duplicate edges are not re-added (the edge set is a set).
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let from = from.into();
        let to = to.into();
        self.ensure_node(from.clone());
        self.ensure_node(to.clone());
        self.edges.insert((from, to));
    }

    /// Union another DAG's nodes and edges into this one. Nodes present in
    /// both are overwritten by `other`'s copy; callers that union several
    /// independently-resolved subgraphs sharing a package accept this as
    /// harmless (the shared package's own metadata doesn't depend on which
    /// caller resolved it).
    pub fn merge(&mut self, other: Dag) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        self.edges.contains(&(from.to_string(), to.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Every outgoing edge's endpoints exist as nodes, and there are no
    /// duplicate node ids (guaranteed by the `IndexMap`) or duplicate
    /// edges (guaranteed by the `IndexSet`). Exposed for tests asserting
    /// the invariants in isolation.
    pub fn check_invariants(&self) -> bool {
        self.edges
            .iter()
            .all(|(from, to)| self.nodes.contains_key(from) && self.nodes.contains_key(to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_creates_missing_endpoints() {
        let mut dag = Dag::new();
        dag.add_edge("a", "b");
        assert!(dag.contains_node("a"));
        assert!(dag.contains_node("b"));
        assert!(dag.contains_edge("a", "b"));
        assert!(dag.check_invariants());
    }

    #[test]
    fn duplicate_edges_are_not_duplicated() {
        let mut dag = Dag::new();
        dag.add_edge("a", "b");
        dag.add_edge("a", "b");
        assert_eq!(dag.edge_count(), 1);
    }

    #[test]
    fn tolerates_a_cycle_in_the_underlying_data() {
        let mut dag = Dag::new();
        dag.add_edge("a", "b");
        dag.add_edge("b", "a");
        assert_eq!(dag.edge_count(), 2);
        assert_eq!(dag.node_count(), 2);
        assert!(dag.check_invariants());
    }

    #[test]
    fn ensure_node_does_not_clobber_existing_metadata() {
        let mut dag = Dag::new();
        let mut node = Node::new("a");
        node.meta.insert("version".into(), "1.0.0".into());
        dag.upsert_node(node);
        dag.ensure_node("a");
        assert_eq!(dag.node("a").unwrap().meta.get("version").unwrap(), "1.0.0");
    }

    #[test]
    fn merge_unions_nodes_and_edges() {
        let mut a = Dag::new();
        a.add_edge("root", "shared");
        let mut b = Dag::new();
        b.add_edge("shared", "leaf");
        a.merge(b);
        assert_eq!(a.node_count(), 3);
        assert!(a.contains_edge("root", "shared"));
        assert!(a.contains_edge("shared", "leaf"));
    }
}
