use crate::file_graph::FileGraph;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Partial graphs keyed by path, valid while the content hash matches
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: HashMap<String, Arc<FileGraph>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached graph for `path`, if it was built from content with `hash`
    pub fn get(&self, path: &str, hash: &str) -> Option<Arc<FileGraph>> {
        self.entries
            .get(path)
            .filter(|graph| graph.content_hash == hash)
            .cloned()
    }

    pub fn insert(&mut self, graph: Arc<FileGraph>) {
        self.entries.insert(graph.path.clone(), graph);
    }

    pub fn invalidate(&mut self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Drop entries for paths outside `live`; returns how many were dropped
    pub fn retain_paths(&mut self, live: &HashSet<&str>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| live.contains(path.as_str()));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_graph::content_hash;
    use codegraph_parser::Language;

    fn graph(path: &str, text: &str) -> Arc<FileGraph> {
        Arc::new(FileGraph {
            path: path.to_string(),
            language: Language::C,
            content_hash: content_hash(text),
            symbols: Vec::new(),
            edges: Vec::new(),
            diagnostics: Vec::new(),
        })
    }

    #[test]
    fn test_hit_requires_matching_hash() {
        let mut cache = AnalysisCache::new();
        cache.insert(graph("a.c", "int x;"));

        assert!(cache.get("a.c", &content_hash("int x;")).is_some());
        assert!(cache.get("a.c", &content_hash("int y;")).is_none());
        assert!(cache.get("b.c", &content_hash("int x;")).is_none());
    }

    #[test]
    fn test_retain_and_invalidate() {
        let mut cache = AnalysisCache::new();
        cache.insert(graph("a.c", "1"));
        cache.insert(graph("b.c", "2"));
        cache.insert(graph("c.c", "3"));

        let live: HashSet<&str> = ["a.c", "b.c"].into_iter().collect();
        assert_eq!(cache.retain_paths(&live), 1);
        assert!(cache.invalidate("a.c"));
        assert!(!cache.invalidate("a.c"));
        assert_eq!(cache.len(), 1);
    }
}
