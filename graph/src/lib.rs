//! Dependency Graph (C4, §4.4): file-level and symbol-level edge store that
//! answers direct and transitive dependency queries.
//!
//! Edges live durably in the [`smartctx_store::Store`]; this crate mirrors
//! them into an in-memory `petgraph` graph for traversal, the same split
//! the reference codebase's repo-map component uses between its SQLite
//! edge cache and an in-memory `DiGraph` built for one ranking pass.

mod cache;

pub use cache::TransitiveCache;
pub use cache::TransitiveKey;

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use smartctx_error::Result;
use smartctx_store::Direction;
use smartctx_store::FileEdge;
use smartctx_store::Store;
use smartctx_store::SymbolEdge;
use smartctx_store::SymbolRelation;

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

pub struct DependencyGraph {
    store: Arc<Store>,
    cache: TransitiveCache,
}

impl DependencyGraph {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            cache: TransitiveCache::new(),
        }
    }

    /// Invalidate every memoized transitive closure; called by the indexer
    /// whenever any file's edges change (§4.3).
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }

    pub async fn direct(&self, path: &str, direction: Direction) -> Result<Vec<FileEdge>> {
        let mut edges = self.store.file_edges(path, direction).await?;
        edges.sort_by(|a, b| target_of(a, direction).cmp(target_of(b, direction)));
        Ok(edges)
    }

    /// BFS with a visited set, capped at `max_depth` levels, deterministic
    /// iteration order (edges sorted by target path, §4.4/§5).
    pub async fn transitive(&self, path: &str, direction: Direction, max_depth: u32) -> Result<BTreeSet<String>> {
        let key = TransitiveKey {
            path: path.to_string(),
            direction,
            max_depth,
        };
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached.into_iter().collect());
        }

        let all_edges = self.store.all_file_edges().await?;
        let adjacency = build_file_adjacency(&all_edges, direction);

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((path.to_string(), 0));
        visited.insert(path.to_string());

        let mut result = BTreeSet::new();
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let mut neighbors: Vec<&String> = adjacency
                .get(&current)
                .map(|v| v.iter().collect())
                .unwrap_or_default();
            neighbors.sort();
            for next in neighbors {
                if visited.insert(next.clone()) {
                    result.insert(next.clone());
                    queue.push_back((next.clone(), depth + 1));
                }
            }
        }

        self.cache
            .put(key, result.iter().cloned().collect())
            .await;
        Ok(result)
    }

    pub async fn symbol_call_graph(
        &self,
        symbol: &str,
        direction: Direction,
        max_depth: u32,
    ) -> Result<(BTreeSet<String>, Vec<GraphEdge>)> {
        self.symbol_graph(symbol, direction, max_depth, &[SymbolRelation::Calls])
            .await
    }

    pub async fn type_graph(
        &self,
        symbol: &str,
        direction: Direction,
        max_depth: u32,
    ) -> Result<(BTreeSet<String>, Vec<GraphEdge>)> {
        self.symbol_graph(
            symbol,
            direction,
            max_depth,
            &[SymbolRelation::Extends, SymbolRelation::Implements, SymbolRelation::UsesType],
        )
        .await
    }

    async fn symbol_graph(
        &self,
        symbol: &str,
        direction: Direction,
        max_depth: u32,
        relations: &[SymbolRelation],
    ) -> Result<(BTreeSet<String>, Vec<GraphEdge>)> {
        let all_edges = self.store.all_symbol_edges().await?;
        let filtered: Vec<&SymbolEdge> = all_edges
            .iter()
            .filter(|e| relations.contains(&e.relation))
            .collect();
        let adjacency = build_symbol_adjacency(&filtered, direction);

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((symbol.to_string(), 0));
        visited.insert(symbol.to_string());

        let mut nodes = BTreeSet::new();
        let mut edges = Vec::new();
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let mut neighbors: Vec<&String> = adjacency
                .get(&current)
                .map(|v| v.iter().collect())
                .unwrap_or_default();
            neighbors.sort();
            for next in neighbors {
                edges.push(GraphEdge {
                    from: current.clone(),
                    to: next.clone(),
                    label: relations.first().map(|r| r.as_str().to_string()).unwrap_or_default(),
                });
                if visited.insert(next.clone()) {
                    nodes.insert(next.clone());
                    queue.push_back((next.clone(), depth + 1));
                }
            }
        }
        Ok((nodes, edges))
    }

    /// Heuristic forward data-flow trace: follows textual occurrences of
    /// `variable` from `line` onward in `file`, up to `max_steps` hits. Full
    /// dataflow analysis requires the (out of scope, §1) AST backend; this
    /// is the best a text-level view can offer and is documented as such.
    pub fn data_flow(&self, file_text: &str, variable: &str, from_line: u32, max_steps: u32) -> Vec<u32> {
        let mut hits = Vec::new();
        for (idx, line) in file_text.lines().enumerate() {
            let line_no = (idx + 1) as u32;
            if line_no < from_line {
                continue;
            }
            if line_contains_identifier(line, variable) {
                hits.push(line_no);
                if hits.len() as u32 >= max_steps {
                    break;
                }
            }
        }
        hits
    }

    /// Builds an in-memory `DiGraph` mirror of the current file edge set,
    /// for callers (e.g. `get_batch_guidance`) that want connected
    /// components rather than point queries.
    pub async fn build_file_digraph(&self) -> Result<(DiGraph<String, ()>, HashMap<String, NodeIndex>)> {
        let all_edges = self.store.all_file_edges().await?;
        let mut graph = DiGraph::new();
        let mut idx: HashMap<String, NodeIndex> = HashMap::new();
        let mut node = |g: &mut DiGraph<String, ()>, idx: &mut HashMap<String, NodeIndex>, name: &str| -> NodeIndex {
            if let Some(i) = idx.get(name) {
                *i
            } else {
                let i = g.add_node(name.to_string());
                idx.insert(name.to_string(), i);
                i
            }
        };
        for e in &all_edges {
            let from = node(&mut graph, &mut idx, &e.from_path);
            let to = node(&mut graph, &mut idx, &e.to_path);
            graph.add_edge(from, to, ());
        }
        Ok((graph, idx))
    }
}

fn target_of(edge: &FileEdge, direction: Direction) -> &str {
    match direction {
        Direction::Downstream => &edge.to_path,
        Direction::Upstream => &edge.from_path,
    }
}

fn build_file_adjacency(edges: &[FileEdge], direction: Direction) -> HashMap<String, Vec<String>> {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    for e in edges {
        let (from, to) = match direction {
            Direction::Downstream => (e.from_path.clone(), e.to_path.clone()),
            Direction::Upstream => (e.to_path.clone(), e.from_path.clone()),
        };
        adjacency.entry(from).or_default().push(to);
    }
    adjacency
}

fn build_symbol_adjacency(edges: &[&SymbolEdge], direction: Direction) -> HashMap<String, Vec<String>> {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    for e in edges {
        let (from, to) = match direction {
            Direction::Downstream => (e.from_symbol.clone(), e.to_symbol.clone()),
            Direction::Upstream => (e.to_symbol.clone(), e.from_symbol.clone()),
        };
        adjacency.entry(from).or_default().push(to);
    }
    adjacency
}

fn line_contains_identifier(line: &str, ident: &str) -> bool {
    let bytes = line.as_bytes();
    let needle = ident.as_bytes();
    if needle.is_empty() {
        return false;
    }
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let mut i = 0usize;
    while let Some(pos) = find_from(bytes, needle, i) {
        let before_ok = pos == 0 || !is_word(bytes[pos - 1]);
        let after = pos + needle.len();
        let after_ok = after >= bytes.len() || !is_word(bytes[after]);
        if before_ok && after_ok {
            return true;
        }
        i = pos + 1;
    }
    false
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Connected components of the undirected projection of the file graph,
/// restricted to the requested file set — the grouping step that
/// `get_batch_guidance` (§4.11, §10.5) clusters on.
pub fn connected_components(files: &[String], edges: &[FileEdge]) -> Vec<Vec<String>> {
    let file_set: HashSet<&str> = files.iter().map(|s| s.as_str()).collect();
    let mut undirected: HashMap<&str, Vec<&str>> = HashMap::new();
    for e in edges {
        if file_set.contains(e.from_path.as_str()) && file_set.contains(e.to_path.as_str()) {
            undirected.entry(&e.from_path).or_default().push(&e.to_path);
            undirected.entry(&e.to_path).or_default().push(&e.from_path);
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut components = Vec::new();
    let mut sorted_files: Vec<&str> = files.iter().map(|s| s.as_str()).collect();
    sorted_files.sort();
    for &start in &sorted_files {
        if visited.contains(start) {
            continue;
        }
        let mut component = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);
        while let Some(cur) = queue.pop_front() {
            component.insert(cur.to_string());
            let mut neighbors = undirected.get(cur).cloned().unwrap_or_default();
            neighbors.sort();
            for n in neighbors {
                if visited.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        components.push(component.into_iter().collect());
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartctx_store::FileEdgeKind;

    fn edge(from: &str, to: &str) -> FileEdge {
        FileEdge {
            from_path: from.to_string(),
            to_path: to.to_string(),
            edge_kind: FileEdgeKind::Import,
        }
    }

    #[tokio::test]
    async fn transitive_closure_respects_depth_cap() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.replace_file_edges("a".into(), vec![edge("a", "b")]).await.unwrap();
        store.replace_file_edges("b".into(), vec![edge("b", "c")]).await.unwrap();
        store.replace_file_edges("c".into(), vec![edge("c", "d")]).await.unwrap();

        let graph = DependencyGraph::new(store);
        let one_hop = graph.transitive("a", Direction::Downstream, 1).await.unwrap();
        assert_eq!(one_hop, BTreeSet::from(["b".to_string()]));

        let full = graph.transitive("a", Direction::Downstream, 10).await.unwrap();
        assert_eq!(full, BTreeSet::from(["b".to_string(), "c".to_string(), "d".to_string()]));
    }

    #[tokio::test]
    async fn transitive_closure_is_stable_across_calls_without_changes() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.replace_file_edges("a".into(), vec![edge("a", "b")]).await.unwrap();
        let graph = DependencyGraph::new(store);
        let first = graph.transitive("a", Direction::Downstream, 5).await.unwrap();
        let second = graph.transitive("a", Direction::Downstream, 5).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cyclic_edges_terminate_via_visited_set() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.replace_file_edges("a".into(), vec![edge("a", "b")]).await.unwrap();
        store.replace_file_edges("b".into(), vec![edge("b", "a")]).await.unwrap();
        let graph = DependencyGraph::new(store);
        let result = graph.transitive("a", Direction::Downstream, 10).await.unwrap();
        assert_eq!(result, BTreeSet::from(["b".to_string()]));
    }

    #[test]
    fn connected_components_groups_linked_files() {
        let files = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let edges = vec![edge("a", "b")];
        let components = connected_components(&files, &edges);
        assert_eq!(components.len(), 2);
        assert!(components.iter().any(|c| c.len() == 2));
    }
}
