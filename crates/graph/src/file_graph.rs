use crate::error::Result;
use crate::types::{Diagnostic, DiagnosticKind, EdgeKind, Relation, Symbol, SymbolId};
use codegraph_parser::Language;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Name lookup that could not be answered from one file alone.
///
/// Scope lists run innermost to outermost and end with the global scope
/// (`""`). The assembler replays the lookup against the merged symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "lookup", rename_all = "snake_case")]
pub enum PendingLookup {
    /// `A::b(..)`
    Qualified {
        name: String,
        scopes: Vec<String>,
        arity: usize,
    },
    /// `b(..)`
    Free {
        name: String,
        scopes: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        using: Vec<String>,
        arity: usize,
    },
    /// `recv.m(..)` / `recv->m(..)`, receiver type candidates fully qualified
    Member {
        receiver: Vec<String>,
        name: String,
        arity: usize,
    },
    /// Base class or referenced type
    Type { name: String, scopes: Vec<String> },
}

impl PendingLookup {
    /// Placeholder name used when the lookup fails everywhere
    pub fn display_name(&self) -> String {
        match self {
            PendingLookup::Qualified { name, .. }
            | PendingLookup::Free { name, .. }
            | PendingLookup::Type { name, .. } => name.clone(),
            PendingLookup::Member { receiver, name, .. } => match receiver.first() {
                Some(owner) => format!("{owner}::{name}"),
                None => name.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum EdgeTarget {
    Resolved(SymbolId),
    Pending(PendingLookup),
    /// Resolution gave up; the assembler points the edge at a placeholder
    Unresolved(String),
}

/// Edge produced by per-file analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialEdge {
    pub source: SymbolId,
    pub relation: Relation,
    pub target: EdgeTarget,
}

/// Isolated partial graph of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileGraph {
    pub path: String,
    pub language: Language,
    pub content_hash: String,
    /// Declarations in source order, one per id
    pub symbols: Vec<Symbol>,
    pub edges: Vec<PartialEdge>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileGraph {
    /// Deterministic JSON rendering; identical input yields identical bytes
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn symbol(&self, id: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|symbol| symbol.id.as_str() == id)
    }

    /// Declarations with the given qualified name
    pub fn find(&self, qualified_name: &str) -> Vec<&Symbol> {
        self.symbols
            .iter()
            .filter(|symbol| symbol.qualified_name == qualified_name)
            .collect()
    }

    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &PartialEdge> {
        self.edges.iter().filter(move |edge| edge.relation.kind() == kind)
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |diag| diag.kind == kind)
    }
}

/// Hex SHA-256 of the source text
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash("int main(void) { return 0; }");
        let b = content_hash("int main(void) { return 0; }");
        let c = content_hash("int main(void) { return 1; }");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_pending_display_name() {
        let member = PendingLookup::Member {
            receiver: vec!["Widget".to_string()],
            name: "draw".to_string(),
            arity: 0,
        };
        assert_eq!(member.display_name(), "Widget::draw");
    }
}
