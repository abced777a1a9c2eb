use crate::assembler::GraphAssembler;
use crate::cache::AnalysisCache;
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::extractor::Extractor;
use crate::file_graph::{content_hash, FileGraph};
use crate::graph::CodeGraph;
use crate::linker::Linker;
use crate::resolver::CallResolver;
use codegraph_parser::{AdaptedTree, ParsedSource, ParserError};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashSet;
use std::sync::Arc;

/// Build a code graph from parsed sources
///
/// Per-file analysis (extraction, call resolution, linking) runs in
/// parallel with no shared state; the assembler then merges the results.
pub struct GraphBuilder {
    config: GraphConfig,
    cache: AnalysisCache,
    pool: Option<ThreadPool>,
}

impl GraphBuilder {
    pub fn new(config: GraphConfig) -> Result<Self> {
        config.validate().map_err(GraphError::InvalidConfig)?;

        let pool = match config.max_workers {
            Some(workers) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|idx| format!("codegraph-worker-{idx}"))
                    .build()
                    .map_err(|e| GraphError::Other(format!("Failed to start worker pool: {e}")))?,
            ),
            None => None,
        };

        Ok(Self {
            config,
            cache: AnalysisCache::new(),
            pool,
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Forget the cached partial graph of one file
    pub fn invalidate(&mut self, path: &str) -> bool {
        self.cache.invalidate(path)
    }

    /// Partial graph of one file (a pure function of the input)
    pub fn analyze(&self, source: &ParsedSource) -> Result<FileGraph> {
        if !self.config.accepts(source.language()) {
            return Err(ParserError::unsupported_language(source.language().as_str()).into());
        }

        let tree = AdaptedTree::new(source)?;
        let extraction = Extractor::new(&tree).extract();
        let resolved = CallResolver::new(&tree, &extraction).resolve(&extraction);

        let mut symbols = extraction.symbols;
        symbols.extend(resolved.symbols);

        let mut edges = extraction.edges;
        edges.extend(resolved.edges);
        let linker = Linker::new(&symbols);
        let mut linked = linker.inheritance();
        if self.config.emit_references {
            linked.extend(linker.references());
        }
        edges.extend(linked);

        let mut diagnostics = extraction.diagnostics;
        diagnostics.extend(resolved.diagnostics);

        log::debug!(
            "{}: {} declarations, {} edges, {} diagnostics",
            source.path(),
            symbols.len(),
            edges.len(),
            diagnostics.len()
        );

        Ok(FileGraph {
            path: source.path().to_string(),
            language: source.language(),
            content_hash: content_hash(source.text()),
            symbols,
            edges,
            diagnostics,
        })
    }

    /// Analyze every accepted source and assemble the graph.
    ///
    /// Files that fail analysis are logged and left out; the run fails
    /// only when assembly finds a structural cycle.
    pub fn build(&mut self, sources: &[ParsedSource]) -> Result<CodeGraph> {
        let accepted: Vec<&ParsedSource> = sources
            .iter()
            .filter(|source| {
                let accepted = self.config.accepts(source.language());
                if !accepted {
                    log::debug!("{}: skipped ({})", source.path(), source.language().as_str());
                }
                accepted
            })
            .collect();

        // Phase 1: reuse partial graphs of unchanged files
        let mut graphs: Vec<Arc<FileGraph>> = Vec::with_capacity(accepted.len());
        let mut pending: Vec<&ParsedSource> = Vec::new();
        for &source in &accepted {
            let cached = if self.config.use_cache {
                self.cache.get(source.path(), &content_hash(source.text()))
            } else {
                None
            };
            match cached {
                Some(graph) => graphs.push(graph),
                None => pending.push(source),
            }
        }
        let cache_hits = graphs.len();

        // Phase 2: analyze the rest
        for (path, result) in self.analyze_all(&pending) {
            match result {
                Ok(graph) => {
                    let graph = Arc::new(graph);
                    if self.config.use_cache {
                        self.cache.insert(Arc::clone(&graph));
                    }
                    graphs.push(graph);
                }
                Err(e) => log::warn!("{path}: analysis failed: {e}"),
            }
        }

        let live: HashSet<&str> = accepted.iter().map(|source| source.path()).collect();
        let evicted = self.cache.retain_paths(&live);

        log::info!(
            "Analyzed {} files ({} cached, {} evicted from cache)",
            graphs.len(),
            cache_hits,
            evicted
        );

        // Phase 3: merge
        let assembler = GraphAssembler::with_include_dirs(self.config.include_dirs.clone());
        let mut graph = assembler.assemble(&graphs)?;
        graph.record_cache_hits(cache_hits);

        log::info!(
            "Built code graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(graph)
    }

    fn analyze_all(&self, sources: &[&ParsedSource]) -> Vec<(String, Result<FileGraph>)> {
        let analyze = |source: &&ParsedSource| (source.path().to_string(), self.analyze(source));

        if !self.config.parallel {
            return sources.iter().map(analyze).collect();
        }
        match &self.pool {
            Some(pool) => pool.install(|| sources.par_iter().map(analyze).collect()),
            None => sources.par_iter().map(analyze).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EdgeKind;
    use codegraph_parser::Language;

    fn source(path: &str, code: &str) -> ParsedSource {
        ParsedSource::parse(path, Language::Cpp, code).unwrap()
    }

    #[test]
    fn test_build_simple_graph() {
        let sources = vec![
            source("a.cpp", "int bar() { return 1; }\nint foo() { return bar(); }"),
            source("b.cpp", "int bar();\nint baz() { return bar() + 1; }"),
        ];

        let mut builder = GraphBuilder::new(GraphConfig::default()).unwrap();
        let graph = builder.build(&sources).unwrap();

        let callers: Vec<&str> = graph
            .callers("fn:bar()")
            .unwrap()
            .iter()
            .map(|symbol| symbol.name.as_str())
            .collect();
        assert_eq!(callers, vec!["foo", "baz"]);
        assert_eq!(graph.edges(Some(EdgeKind::Calls)).len(), 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = GraphConfig {
            max_workers: Some(0),
            ..Default::default()
        };
        assert!(matches!(GraphBuilder::new(config), Err(GraphError::InvalidConfig(_))));
    }

    #[test]
    fn test_cache_hits_on_unchanged_sources() {
        let sources = vec![source("a.cpp", "void f() {}"), source("b.cpp", "void g() { f(); }")];
        let mut builder = GraphBuilder::new(GraphConfig::sequential()).unwrap();

        let first = builder.build(&sources).unwrap();
        assert_eq!(first.stats().cache_hits, 0);

        let second = builder.build(&sources).unwrap();
        assert_eq!(second.stats().cache_hits, 2);
        assert_eq!(first.snapshot().nodes, second.snapshot().nodes);
        assert_eq!(first.snapshot().edges, second.snapshot().edges);

        assert!(builder.invalidate("a.cpp"));
        let third = builder.build(&sources[..1]).unwrap();
        assert_eq!(third.stats().cache_hits, 0);
        assert_eq!(builder.cache().len(), 1);
    }

    #[test]
    fn test_unsupported_language_is_skipped() {
        let builder = GraphBuilder::new(GraphConfig {
            supported_languages: vec!["c".to_string()],
            ..Default::default()
        })
        .unwrap();
        let err = builder.analyze(&source("a.cpp", "void f() {}")).unwrap_err();
        assert!(matches!(err, GraphError::Parser(ParserError::UnsupportedLanguage(_))));
    }
}
