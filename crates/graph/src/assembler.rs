use crate::error::{GraphError, Result};
use crate::file_graph::{EdgeTarget, FileGraph, PartialEdge};
use crate::graph::CodeGraph;
use crate::stats::GraphStats;
use crate::symbols::{join_scope, split_scope, SymbolTable};
use crate::types::{
    Confidence, Edge, EdgeKind, FunctionKind, ImportKind, Location, Relation, Symbol, SymbolDetail,
    SymbolId, SymbolKind,
};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Merges per-file partial graphs into one [`CodeGraph`]
///
/// Inputs are sorted by path first, so the result does not depend on the
/// order in which workers finished.
#[derive(Debug, Clone, Default)]
pub struct GraphAssembler {
    include_dirs: Vec<String>,
}

/// Declarations unified by id, in first-seen order
#[derive(Default)]
struct MergedSymbols {
    symbols: Vec<Symbol>,
    index: HashMap<SymbolId, usize>,
}

impl MergedSymbols {
    fn insert(&mut self, symbol: Symbol) {
        match self.index.get(&symbol.id) {
            Some(&idx) => self.symbols[idx].merge(&symbol),
            None => {
                self.index.insert(symbol.id.clone(), self.symbols.len());
                self.symbols.push(symbol);
            }
        }
    }

    fn get(&self, id: &SymbolId) -> Option<&Symbol> {
        self.index.get(id).map(|&idx| &self.symbols[idx])
    }

    fn reindex(&mut self) {
        self.index = self
            .symbols
            .iter()
            .enumerate()
            .map(|(idx, symbol)| (symbol.id.clone(), idx))
            .collect();
    }
}

/// Unresolved placeholders created while finalizing edges
#[derive(Default)]
struct Placeholders {
    symbols: Vec<Symbol>,
    index: HashMap<String, usize>,
}

impl Placeholders {
    fn get_or_create(&mut self, name: &str, file: &str, line: usize) -> SymbolId {
        if let Some(&idx) = self.index.get(name) {
            let symbol = &mut self.symbols[idx];
            if !symbol.provenance.iter().any(|known| known == file) {
                symbol.provenance.push(file.to_string());
            }
            return symbol.id.clone();
        }
        let id = SymbolId::unresolved(name);
        self.index.insert(name.to_string(), self.symbols.len());
        self.symbols.push(Symbol {
            id: id.clone(),
            name: split_scope(name).1.to_string(),
            qualified_name: name.to_string(),
            kind: SymbolKind::Unresolved,
            parent: None,
            location: Location {
                file: file.to_string(),
                line,
                end_line: line,
            },
            provenance: vec![file.to_string()],
            detail: SymbolDetail::Unresolved,
        });
        id
    }
}

impl GraphAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search roots for quoted includes, tried after the includer's directory
    pub fn with_include_dirs(include_dirs: Vec<String>) -> Self {
        Self { include_dirs }
    }

    /// Merge partial graphs, settle deferred lookups and check structure.
    ///
    /// Fails only on containment or inheritance cycles.
    pub fn assemble<F: Borrow<FileGraph>>(&self, files: &[F]) -> Result<CodeGraph> {
        let files = ordered_files(files);
        let mut stats = GraphStats::default();

        // Phase 1: unify declarations across files
        let mut merged = MergedSymbols::default();
        for file in &files {
            for symbol in &file.symbols {
                merged.insert(symbol.clone());
            }
            for diagnostic in &file.diagnostics {
                stats.count_diagnostic(diagnostic.kind);
            }
        }

        // Phase 2: out-of-line members whose type lives in another file
        let renames = attach_out_of_line_members(&mut merged);

        // Phase 3: replay deferred lookups against the merged table
        let mut placeholders = Placeholders::default();
        let mut edges = {
            let table = SymbolTable::new(merged.symbols.iter());
            let mut edges = Vec::new();
            for file in &files {
                for partial in &file.edges {
                    if let Some(edge) = finalize_edge(
                        &table,
                        &merged,
                        &renames,
                        &mut placeholders,
                        &mut stats,
                        &file.path,
                        partial,
                    ) {
                        edges.push(edge);
                    }
                }
            }
            edges
        };

        // Phase 4: includes and using directives
        let paths: BTreeSet<&str> = files.iter().map(|file| file.path.as_str()).collect();
        edges.extend(self.resolve_imports(&mut merged, &paths));

        merged.symbols.extend(placeholders.symbols);
        merged.reindex();

        let edges = dedup_edges(edges);
        let mut all_edges = containment_edges(&merged);
        all_edges.extend(edges);

        check_acyclic(&all_edges, EdgeKind::Contains, "contains")?;
        check_acyclic(&all_edges, EdgeKind::Inherits, "inherits")?;

        stats.count_symbols(&merged.symbols);
        stats.count_edges(&all_edges);

        log::info!(
            "Assembled code graph from {} files: {} nodes, {} edges ({} unresolved calls)",
            files.len(),
            merged.symbols.len(),
            all_edges.len(),
            stats.calls_unresolved
        );

        Ok(CodeGraph::new(merged.symbols, all_edges, stats))
    }

    /// Settle include and using imports; returns `Imports` edges from
    /// resolved includes to the file they name
    fn resolve_imports(&self, merged: &mut MergedSymbols, paths: &BTreeSet<&str>) -> Vec<Edge> {
        let updates: Vec<(usize, Option<String>, bool)> = {
            let table = SymbolTable::new(merged.symbols.iter());
            merged
                .symbols
                .iter()
                .enumerate()
                .filter_map(|(idx, symbol)| {
                    let info = symbol.import_info()?;
                    let update = match info.kind {
                        ImportKind::Include => {
                            let found = self.resolve_include(&symbol.location.file, &info.target, paths);
                            let resolved = found.is_some();
                            (idx, found, resolved)
                        }
                        ImportKind::SystemInclude => (idx, None, false),
                        ImportKind::UsingNamespace => {
                            (idx, None, table.namespace_exists(&info.target))
                        }
                        ImportKind::UsingDeclaration => {
                            (idx, None, !table.named(&info.target).is_empty())
                        }
                    };
                    Some(update)
                })
                .collect()
        };

        let mut edges = Vec::new();
        for (idx, resolved_path, resolved) in updates {
            let symbol = &mut merged.symbols[idx];
            if let SymbolDetail::Import(info) = &mut symbol.detail {
                info.resolved = resolved;
                if let Some(path) = &resolved_path {
                    edges.push(Edge {
                        source: symbol.id.clone(),
                        target: SymbolId::file(path),
                        relation: Relation::Imports,
                    });
                }
                info.resolved_path = resolved_path;
            }
        }
        edges
    }

    /// Includer's directory, then include dirs, then any analyzed file
    /// whose path ends with `/<target>`
    fn resolve_include(&self, includer: &str, target: &str, paths: &BTreeSet<&str>) -> Option<String> {
        let directory = split_directory(includer);
        let relative = normalize_path(&join_path(directory, target));
        if paths.contains(relative.as_str()) {
            return Some(relative);
        }

        for dir in &self.include_dirs {
            let candidate = normalize_path(&join_path(dir, target));
            if paths.contains(candidate.as_str()) {
                return Some(candidate);
            }
        }

        let normalized = normalize_path(target);
        let suffix = format!("/{normalized}");
        paths
            .iter()
            .find(|path| **path == normalized || path.ends_with(&suffix))
            .map(|path| path.to_string())
    }
}

/// Sort by path; later inputs with an already-seen path are dropped
fn ordered_files<F: Borrow<FileGraph>>(files: &[F]) -> Vec<&FileGraph> {
    let mut ordered: Vec<&FileGraph> = files
        .iter()
        .map(<F as Borrow<FileGraph>>::borrow)
        .collect();
    ordered.sort_by(|a, b| a.path.cmp(&b.path));

    let mut seen = HashSet::new();
    ordered.retain(|file| {
        let fresh = seen.insert(file.path.clone());
        if !fresh {
            log::warn!("{}: duplicate input path, keeping the first partial graph", file.path);
        }
        fresh
    });
    ordered
}

/// Re-home functions defined as `A::f` in a file that never saw `A`.
///
/// Returns the id renames applied (old → new).
fn attach_out_of_line_members(merged: &mut MergedSymbols) -> HashMap<SymbolId, SymbolId> {
    struct Fixup {
        idx: usize,
        id: SymbolId,
        qualified: String,
        parent: SymbolId,
    }

    let fixups: Vec<Fixup> = {
        let table = SymbolTable::new(merged.symbols.iter());
        let types: Vec<&Symbol> = merged
            .symbols
            .iter()
            .filter(|symbol| symbol.kind == SymbolKind::Type)
            .collect();

        merged
            .symbols
            .iter()
            .enumerate()
            .filter_map(|(idx, symbol)| {
                let info = symbol.function_info()?;
                let hint = info.owner_hint.as_deref()?;
                let parent_is_type = symbol
                    .parent
                    .as_ref()
                    .and_then(|parent| merged.get(parent))
                    .is_some_and(|parent| parent.kind == SymbolKind::Type);
                if parent_is_type {
                    return None;
                }

                let owner = table.find_type(hint).or_else(|| {
                    let suffix = format!("::{hint}");
                    let mut candidates = types
                        .iter()
                        .filter(|ty| ty.qualified_name.ends_with(&suffix));
                    match (candidates.next(), candidates.next()) {
                        (Some(only), None) => Some(*only),
                        _ => None,
                    }
                })?;
                let owner = table.canonical_type(owner);

                let qualified = join_scope(&owner.qualified_name, &symbol.name);
                let id = SymbolId::new("fn", &format!("{qualified}{}", info.signature()));
                Some(Fixup {
                    idx,
                    id,
                    qualified,
                    parent: owner.id.clone(),
                })
            })
            .collect()
    };

    let mut renames = HashMap::new();
    let mut removed = HashSet::new();
    for fixup in fixups {
        let mut symbol = merged.symbols[fixup.idx].clone();
        let old_id = symbol.id.clone();
        symbol.id = fixup.id.clone();
        symbol.qualified_name = fixup.qualified;
        symbol.parent = Some(fixup.parent);
        if let SymbolDetail::Function(info) = &mut symbol.detail {
            info.owner_hint = None;
            if info.kind == FunctionKind::Free {
                info.kind = FunctionKind::Method;
            }
        }

        match merged.index.get(&fixup.id).copied() {
            Some(existing) if existing != fixup.idx => {
                merged.symbols[existing].merge(&symbol);
                removed.insert(fixup.idx);
            }
            _ => {
                merged.index.insert(fixup.id.clone(), fixup.idx);
                merged.symbols[fixup.idx] = symbol;
            }
        }
        log::debug!("attached out-of-line definition {old_id} as {}", fixup.id);
        if old_id != fixup.id {
            renames.insert(old_id, fixup.id);
        }
    }

    if !removed.is_empty() {
        let mut idx = 0;
        merged.symbols.retain(|_| {
            let keep = !removed.contains(&idx);
            idx += 1;
            keep
        });
    }
    for symbol in &mut merged.symbols {
        if let Some(parent) = symbol.parent.as_ref().and_then(|parent| renames.get(parent)) {
            symbol.parent = Some(parent.clone());
        }
    }
    merged.reindex();
    renames
}

/// Turn one partial edge into a final edge, or drop it (unmatched type
/// references)
fn finalize_edge(
    table: &SymbolTable<'_>,
    merged: &MergedSymbols,
    renames: &HashMap<SymbolId, SymbolId>,
    placeholders: &mut Placeholders,
    stats: &mut GraphStats,
    file: &str,
    partial: &PartialEdge,
) -> Option<Edge> {
    let rename = |id: &SymbolId| renames.get(id).cloned().unwrap_or_else(|| id.clone());
    let source = rename(&partial.source);
    let line = match partial.relation {
        Relation::Calls { line, .. } => line,
        _ => merged.get(&source).map_or(0, |symbol| symbol.location.line),
    };

    let (target, relation) = match &partial.target {
        EdgeTarget::Resolved(id) => {
            let id = rename(id);
            if merged.get(&id).is_some() {
                (id, partial.relation.clone())
            } else {
                let id = placeholders.get_or_create(id.key(), file, line);
                (id, demote(&partial.relation))
            }
        }
        EdgeTarget::Unresolved(name) => {
            let id = placeholders.get_or_create(name, file, line);
            (id, demote(&partial.relation))
        }
        EdgeTarget::Pending(lookup) => match table.lookup(lookup) {
            Some(resolution) => {
                let relation = match partial.relation {
                    Relation::Calls { line, .. } => Relation::Calls {
                        confidence: resolution.confidence,
                        line,
                    },
                    ref other => other.clone(),
                };
                (resolution.id, relation)
            }
            None => match partial.relation.kind() {
                EdgeKind::References => {
                    stats.unresolved_type_references += 1;
                    log::debug!("{file}: unknown referenced type {}", lookup.display_name());
                    return None;
                }
                _ => {
                    stats.unresolved_symbols += 1;
                    log::debug!("{file}: {} stays unresolved", lookup.display_name());
                    let id = placeholders.get_or_create(&lookup.display_name(), file, line);
                    (id, demote(&partial.relation))
                }
            },
        },
    };

    Some(Edge {
        source,
        target,
        relation,
    })
}

/// Calls that end at a placeholder are unresolved by definition
fn demote(relation: &Relation) -> Relation {
    match relation {
        Relation::Calls { line, .. } => Relation::Calls {
            confidence: Confidence::Unresolved,
            line: *line,
        },
        other => other.clone(),
    }
}

/// Drop repeated imports, inherits and references; every call stays
fn dedup_edges(edges: Vec<Edge>) -> Vec<Edge> {
    let mut seen = HashSet::new();
    edges
        .into_iter()
        .filter(|edge| edge.kind() == EdgeKind::Calls || seen.insert(edge.clone()))
        .collect()
}

/// `Contains` edges derived from parent links, in declaration order
fn containment_edges(merged: &MergedSymbols) -> Vec<Edge> {
    merged
        .symbols
        .iter()
        .filter_map(|symbol| {
            let parent = symbol.parent.as_ref()?;
            if merged.get(parent).is_none() {
                log::warn!("{}: parent {parent} is not part of the graph", symbol.id);
                return None;
            }
            Some(Edge {
                source: parent.clone(),
                target: symbol.id.clone(),
                relation: Relation::Contains,
            })
        })
        .collect()
}

fn check_acyclic(edges: &[Edge], kind: EdgeKind, relation: &str) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for edge in edges.iter().filter(|edge| edge.kind() == kind) {
        graph.add_edge(edge.source.as_str(), edge.target.as_str(), ());
    }
    toposort(&graph, None)
        .map(|_| ())
        .map_err(|cycle| GraphError::cycle(relation, cycle.node_id()))
}

fn split_directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn join_path(directory: &str, name: &str) -> String {
    if directory.is_empty() || name.starts_with('/') {
        name.to_string()
    } else {
        format!("{}/{name}", directory.trim_end_matches('/'))
    }
}

/// Collapse `.` and `..` segments (`src/./a/../b.h` → `src/b.h`)
fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("src/./a/../b.h"), "src/b.h");
        assert_eq!(normalize_path("../include/x.h"), "../include/x.h");
        assert_eq!(normalize_path("/usr/../opt/x.h"), "/opt/x.h");
        assert_eq!(join_path("src", "../inc/x.h"), "src/../inc/x.h");
        assert_eq!(split_directory("src/main.c"), "src");
        assert_eq!(split_directory("main.c"), "");
    }

    #[test]
    fn test_include_search_order() {
        let assembler = GraphAssembler::with_include_dirs(vec!["include".to_string()]);
        let paths: BTreeSet<&str> = ["src/util.h", "include/util.h", "include/api.h", "lib/deep/log.h"]
            .into_iter()
            .collect();

        assert_eq!(
            assembler.resolve_include("src/main.c", "util.h", &paths).as_deref(),
            Some("src/util.h")
        );
        assert_eq!(
            assembler.resolve_include("src/main.c", "api.h", &paths).as_deref(),
            Some("include/api.h")
        );
        assert_eq!(
            assembler.resolve_include("src/main.c", "deep/log.h", &paths).as_deref(),
            Some("lib/deep/log.h")
        );
        assert_eq!(assembler.resolve_include("src/main.c", "missing.h", &paths), None);
    }

    #[test]
    fn test_dedup_keeps_every_call() {
        let call = Edge {
            source: SymbolId::new("fn", "main()"),
            target: SymbolId::new("fn", "f()"),
            relation: Relation::Calls {
                confidence: Confidence::Exact,
                line: 2,
            },
        };
        let import = Edge {
            source: SymbolId::file("a.c"),
            target: SymbolId::internal("import", "\"a.h\"", "a.c"),
            relation: Relation::Imports,
        };
        let edges = dedup_edges(vec![call.clone(), call, import.clone(), import]);
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn test_inheritance_cycle_is_rejected() {
        let inherits = |from: &str, to: &str| Edge {
            source: SymbolId::new("class", from),
            target: SymbolId::new("class", to),
            relation: Relation::Inherits {
                access: crate::types::Access::Public,
                is_virtual: false,
            },
        };
        let edges = vec![inherits("A", "B"), inherits("B", "C"), inherits("C", "A")];
        let err = check_acyclic(&edges, EdgeKind::Inherits, "inherits").unwrap_err();
        assert!(matches!(err, GraphError::StructuralCycle { ref relation, .. } if relation == "inherits"));

        let edges = vec![inherits("A", "B"), inherits("A", "C"), inherits("B", "C")];
        assert!(check_acyclic(&edges, EdgeKind::Inherits, "inherits").is_ok());
    }
}
