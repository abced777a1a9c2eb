use thiserror::Error;

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParserError>;

/// Errors that can occur while producing or adapting a parse tree
#[derive(Error, Debug)]
pub enum ParserError {
    /// Failed to parse the source code
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Unsupported language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// A tree node kind the adapter has no semantic mapping for.
    /// Callers skip the node and continue.
    #[error("Unsupported construct `{kind}` at line {line}")]
    UnsupportedConstruct { kind: String, line: usize },

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ParserError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Create an unsupported construct error
    pub fn unsupported_construct(kind: impl Into<String>, line: usize) -> Self {
        Self::UnsupportedConstruct {
            kind: kind.into(),
            line,
        }
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }

    /// Whether the error only affects a single node
    pub const fn is_skippable(&self) -> bool {
        matches!(self, Self::UnsupportedConstruct { .. })
    }
}
