use crate::error::{GraphError, Result};
use crate::stats::GraphStats;
use crate::types::{Access, Confidence, Edge, EdgeKind, Relation, Symbol};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Assembled, read-only code graph
///
/// Nodes are stored in declaration order (file path, then source order),
/// edges in assembly order; both orders are reproducible across runs.
#[derive(Debug, Clone)]
pub struct CodeGraph {
    graph: DiGraph<Symbol, Relation>,
    index: HashMap<String, NodeIndex>,
    stats: GraphStats,
}

/// One outgoing call
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite<'g> {
    pub target: &'g Symbol,
    pub confidence: Confidence,
    pub line: usize,
}

/// One direct base of a type
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRef<'g> {
    pub base: &'g Symbol,
    pub access: Access,
    pub is_virtual: bool,
}

/// Serializable node/edge tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Symbol>,
    pub edges: Vec<Edge>,
    pub stats: GraphStats,
}

impl CodeGraph {
    /// Build from assembled nodes and edges. Every edge endpoint must be
    /// one of `symbols`.
    pub(crate) fn new(symbols: Vec<Symbol>, edges: Vec<Edge>, stats: GraphStats) -> Self {
        let mut graph = DiGraph::with_capacity(symbols.len(), edges.len());
        let mut index = HashMap::with_capacity(symbols.len());

        for symbol in symbols {
            let key = symbol.id.as_str().to_string();
            let idx = graph.add_node(symbol);
            index.insert(key, idx);
        }

        for edge in edges {
            let endpoints = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            );
            match endpoints {
                (Some(&from), Some(&to)) => {
                    graph.add_edge(from, to, edge.relation);
                }
                _ => log::debug!("dropping dangling edge {} -> {}", edge.source, edge.target),
            }
        }

        Self { graph, index, stats }
    }

    pub(crate) fn record_cache_hits(&mut self, hits: usize) {
        self.stats.cache_hits = hits;
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// All nodes, placeholders included
    pub fn nodes(&self) -> impl Iterator<Item = &Symbol> {
        self.graph.node_weights()
    }

    /// Declaration nodes ordered by (file path, declaration order)
    pub fn declarations(&self) -> impl Iterator<Item = &Symbol> {
        self.graph.node_weights().filter(|symbol| !symbol.is_placeholder())
    }

    /// Edges of one kind (all edges for `None`), in assembly order
    pub fn edges(&self, kind: Option<EdgeKind>) -> Vec<Edge> {
        self.graph
            .edge_references()
            .filter(|edge| kind.map_or(true, |kind| edge.weight().kind() == kind))
            .map(|edge| Edge {
                source: self.graph[edge.source()].id.clone(),
                target: self.graph[edge.target()].id.clone(),
                relation: edge.weight().clone(),
            })
            .collect()
    }

    /// Node by exact id
    pub fn symbol(&self, id: &str) -> Option<&Symbol> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    /// Resolve by id, then by qualified signature (`ns::f(int)`), then by
    /// qualified name; the first declaration wins among several matches
    pub fn resolve(&self, name: &str) -> Result<&Symbol> {
        if let Some(symbol) = self.symbol(name) {
            return Ok(symbol);
        }
        self.declarations()
            .find(|symbol| symbol.id.key() == name)
            .or_else(|| self.declarations().find(|symbol| symbol.qualified_name == name))
            .ok_or_else(|| GraphError::NodeNotFound(name.to_string()))
    }

    /// Every declaration whose qualified signature or qualified name is `name`
    pub fn resolve_all(&self, name: &str) -> Vec<&Symbol> {
        self.declarations()
            .filter(|symbol| symbol.id.key() == name || symbol.qualified_name == name)
            .collect()
    }

    /// Declarations with the given simple name
    pub fn by_name(&self, name: &str) -> Vec<&Symbol> {
        self.declarations().filter(|symbol| symbol.name == name).collect()
    }

    /// Declarations contributed by one file
    pub fn by_file(&self, path: &str) -> Vec<&Symbol> {
        self.declarations()
            .filter(|symbol| symbol.provenance.iter().any(|file| file == path))
            .collect()
    }

    /// Direct members of a scope (`Contains` targets)
    pub fn members(&self, id: &str) -> Result<Vec<&Symbol>> {
        let node = self.node(id)?;
        Ok(self.neighbors(node, Direction::Outgoing, EdgeKind::Contains))
    }

    /// Functions that call `id`
    pub fn callers(&self, id: &str) -> Result<Vec<&Symbol>> {
        let node = self.node(id)?;
        Ok(self.neighbors(node, Direction::Incoming, EdgeKind::Calls))
    }

    /// Functions (or placeholders) that `id` calls, first call first
    pub fn callees(&self, id: &str) -> Result<Vec<&Symbol>> {
        let node = self.node(id)?;
        Ok(self.neighbors(node, Direction::Outgoing, EdgeKind::Calls))
    }

    /// Every call made by `id`, one entry per call expression
    pub fn calls_from(&self, id: &str) -> Result<Vec<CallSite<'_>>> {
        let node = self.node(id)?;
        Ok(self
            .ordered_edges(node, Direction::Outgoing)
            .into_iter()
            .filter_map(|edge| match self.graph[edge] {
                Relation::Calls { confidence, line } => {
                    let (_, target) = self.graph.edge_endpoints(edge)?;
                    Some(CallSite {
                        target: &self.graph[target],
                        confidence,
                        line,
                    })
                }
                _ => None,
            })
            .collect())
    }

    /// Direct bases of a type, in declaration order
    pub fn bases_of(&self, id: &str) -> Result<Vec<BaseRef<'_>>> {
        let node = self.node(id)?;
        Ok(self
            .ordered_edges(node, Direction::Outgoing)
            .into_iter()
            .filter_map(|edge| match self.graph[edge] {
                Relation::Inherits { access, is_virtual } => {
                    let (_, target) = self.graph.edge_endpoints(edge)?;
                    Some(BaseRef {
                        base: &self.graph[target],
                        access,
                        is_virtual,
                    })
                }
                _ => None,
            })
            .collect())
    }

    /// Serializable copy of the node and edge tables
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self.edges(None),
            stats: self.stats.clone(),
        }
    }

    /// Deterministic JSON rendering of [`CodeGraph::snapshot`]
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    fn node(&self, id: &str) -> Result<NodeIndex> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    /// Edges touching `node` in insertion order (petgraph walks them
    /// newest first)
    fn ordered_edges(&self, node: NodeIndex, direction: Direction) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(node, direction)
            .map(|edge| edge.id())
            .collect();
        edges.sort();
        edges
    }

    fn neighbors(&self, node: NodeIndex, direction: Direction, kind: EdgeKind) -> Vec<&Symbol> {
        let mut seen = HashSet::new();
        self.ordered_edges(node, direction)
            .into_iter()
            .filter(|&edge| self.graph[edge].kind() == kind)
            .filter_map(|edge| {
                let (source, target) = self.graph.edge_endpoints(edge)?;
                let other = match direction {
                    Direction::Outgoing => target,
                    Direction::Incoming => source,
                };
                seen.insert(other).then(|| &self.graph[other])
            })
            .collect()
    }
}
