//! # Code Graph Parser
//!
//! Parse-tree input layer for the code graph engine.
//!
//! ## Architecture
//!
//! ```text
//! Source Code
//!     │
//!     ├──> Language Detection (from extension or explicit tag)
//!     │
//!     ├──> Tree-sitter Parsing → ParsedSource
//!     │
//!     └──> Language Adapter
//!          ├─> Map grammar node kinds to SemanticKind
//!          └─> Report UnsupportedConstruct for anything else
//! ```
//!
//! ## Example
//!
//! ```rust
//! use codegraph_parser::{AdaptedTree, Language, ParsedSource, SemanticKind};
//!
//! let source = ParsedSource::parse("main.c", Language::C, "int main(void) { return 0; }").unwrap();
//! let tree = AdaptedTree::new(&source).unwrap();
//!
//! let first = tree.children(tree.root())[0];
//! assert_eq!(tree.kind(first).unwrap(), SemanticKind::FunctionDefinition);
//! ```

mod adapter;
mod error;
mod language;
mod source;

pub use adapter::{adapter_for, AdaptedTree, AggregateKind, CFamilyAdapter, LanguageAdapter, SemanticKind};
pub use error::{ParserError, Result};
pub use language::Language;
pub use source::ParsedSource;

/// Re-exported so downstream crates name nodes without a direct dependency
pub use tree_sitter::Node;
