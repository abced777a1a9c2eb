use crate::types::{Confidence, DiagnosticKind, Edge, Relation, Symbol, SymbolDetail};
use serde::{Deserialize, Serialize};

/// Run-level completeness figures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub files: usize,
    pub declarations: usize,
    pub functions: usize,
    pub types: usize,
    pub variables: usize,
    pub imports_resolved: usize,
    pub imports_unresolved: usize,
    /// `unresolved:` placeholder nodes
    pub placeholders: usize,

    pub calls_exact: usize,
    pub calls_best_effort: usize,
    pub calls_unresolved: usize,
    pub inherits: usize,
    pub references: usize,
    /// Referenced type names that matched nothing in the run
    pub unresolved_type_references: usize,

    pub unsupported_constructs: usize,
    pub ambiguous_resolutions: usize,
    pub unresolved_symbols: usize,

    /// Files whose partial graph came from the analysis cache
    pub cache_hits: usize,
}

impl GraphStats {
    pub(crate) fn count_symbols<'a>(&mut self, symbols: impl IntoIterator<Item = &'a Symbol>) {
        for symbol in symbols {
            match &symbol.detail {
                SymbolDetail::File { .. } => {
                    self.files += 1;
                    continue;
                }
                SymbolDetail::Unresolved => {
                    self.placeholders += 1;
                    continue;
                }
                SymbolDetail::Namespace => {}
                SymbolDetail::Type(_) => self.types += 1,
                SymbolDetail::Function(_) => self.functions += 1,
                SymbolDetail::Variable(_) => self.variables += 1,
                SymbolDetail::Import(info) => {
                    if info.resolved {
                        self.imports_resolved += 1;
                    } else {
                        self.imports_unresolved += 1;
                    }
                }
            }
            self.declarations += 1;
        }
    }

    pub(crate) fn count_edges<'a>(&mut self, edges: impl IntoIterator<Item = &'a Edge>) {
        for edge in edges {
            match &edge.relation {
                Relation::Calls { confidence, .. } => match confidence {
                    Confidence::Exact => self.calls_exact += 1,
                    Confidence::BestEffort => self.calls_best_effort += 1,
                    Confidence::Unresolved => self.calls_unresolved += 1,
                },
                Relation::Inherits { .. } => self.inherits += 1,
                Relation::References { .. } => self.references += 1,
                Relation::Contains | Relation::Imports => {}
            }
        }
    }

    pub(crate) fn count_diagnostic(&mut self, kind: DiagnosticKind) {
        match kind {
            DiagnosticKind::UnsupportedConstruct => self.unsupported_constructs += 1,
            DiagnosticKind::AmbiguousResolution => self.ambiguous_resolutions += 1,
            DiagnosticKind::UnresolvedSymbol => self.unresolved_symbols += 1,
        }
    }

    pub fn total_calls(&self) -> usize {
        self.calls_exact + self.calls_best_effort + self.calls_unresolved
    }

    /// Share of call edges resolved exactly (1.0 when there are no calls)
    pub fn exact_call_ratio(&self) -> f64 {
        match self.total_calls() {
            0 => 1.0,
            total => self.calls_exact as f64 / total as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolId;

    fn call(confidence: Confidence) -> Edge {
        Edge {
            source: SymbolId::new("fn", "main()"),
            target: SymbolId::new("fn", "f()"),
            relation: Relation::Calls { confidence, line: 1 },
        }
    }

    #[test]
    fn test_call_counts_and_ratio() {
        let mut stats = GraphStats::default();
        assert_eq!(stats.exact_call_ratio(), 1.0);

        let edges = vec![
            call(Confidence::Exact),
            call(Confidence::Exact),
            call(Confidence::BestEffort),
            call(Confidence::Unresolved),
        ];
        stats.count_edges(&edges);

        assert_eq!(stats.total_calls(), 4);
        assert_eq!(stats.calls_best_effort, 1);
        assert_eq!(stats.exact_call_ratio(), 0.5);
    }
}
