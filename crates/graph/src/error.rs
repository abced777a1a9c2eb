use codegraph_parser::ParserError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Parser(#[from] ParserError),

    /// Containment or inheritance cycle; the whole run is rejected
    #[error("Structural cycle in {relation} edges involving {symbol}")]
    StructuralCycle { relation: String, symbol: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl GraphError {
    pub fn cycle(relation: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::StructuralCycle {
            relation: relation.into(),
            symbol: symbol.into(),
        }
    }
}
