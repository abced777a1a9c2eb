//! # Code Graph
//!
//! Declaration and call graphs for C and C++ sources.
//!
//! ## Features
//!
//! - **Declaration extraction** - functions, types, fields, enums, typedefs, imports
//! - **Call resolution** - qualified, member, functor, function-pointer and free calls
//! - **Type linking** - multiple/virtual inheritance and type references
//! - **Cross-file assembly** - declaration/definition unification, deferred lookups
//!
//! ## Architecture
//!
//! ```text
//! ParsedSource[]
//!     │
//!     ├──> Per-file analysis (rayon, no shared state)
//!     │      ├─ Language Adapter (SemanticKind view of the tree)
//!     │      ├─ Declaration Extractor (symbols, normalized signatures)
//!     │      ├─ Call-Site Resolver (Calls edges, deferred lookups)
//!     │      └─ Type/Inheritance Linker (Inherits, References)
//!     │                 │
//!     │                 └──> FileGraph (cached by content hash)
//!     │
//!     ├──> Graph Assembler (sorted by path)
//!     │      ├─ Unify declarations across files
//!     │      ├─ Replay deferred lookups, add placeholders
//!     │      └─ Reject containment / inheritance cycles
//!     │
//!     └──> Code Graph (petgraph)
//!            ├─ Nodes: files, namespaces, types, functions, variables, imports
//!            └─ Edges: contains, calls, inherits, references, imports
//! ```
//!
//! ## Example
//!
//! ```rust
//! use codegraph::{GraphBuilder, GraphConfig};
//! use codegraph_parser::{Language, ParsedSource};
//!
//! let sources = vec![ParsedSource::parse(
//!     "main.c",
//!     Language::C,
//!     "int helper(int x) { return x; }\nint main(void) { return helper(1); }",
//! )
//! .unwrap()];
//!
//! let mut builder = GraphBuilder::new(GraphConfig::default()).unwrap();
//! let graph = builder.build(&sources).unwrap();
//!
//! let callees = graph.callees("fn:main()").unwrap();
//! assert_eq!(callees[0].qualified_name, "helper");
//! ```

mod assembler;
mod builder;
mod cache;
mod config;
mod descriptor;
mod error;
mod extractor;
mod file_graph;
mod graph;
mod linker;
mod resolver;
mod stats;
mod symbols;
mod types;

pub use assembler::GraphAssembler;
pub use builder::GraphBuilder;
pub use cache::AnalysisCache;
pub use config::GraphConfig;
pub use descriptor::{ArraySize, Qualifiers, TypeDescriptor};
pub use error::{GraphError, Result};
pub use file_graph::{content_hash, EdgeTarget, FileGraph, PartialEdge, PendingLookup};
pub use graph::{BaseRef, CallSite, CodeGraph, GraphSnapshot};
pub use stats::GraphStats;
pub use types::{
    Access, BaseSpecifier, Confidence, Diagnostic, DiagnosticKind, Edge, EdgeKind, Enumerator,
    FunctionFlags, FunctionInfo, FunctionKind, ImportInfo, ImportKind, Location, Parameter,
    ReferenceRole, Relation, StorageClass, Symbol, SymbolDetail, SymbolId, SymbolKind, TypeInfo,
    TypeKind, VariableInfo, VariableKind,
};
