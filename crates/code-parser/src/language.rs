use crate::error::{ParserError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source language of an analyzed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "c++" | "hpp" | "hh" | "hxx" | "h++" | "ipp" | "tpp" => {
                Language::Cpp
            }
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Parse a language tag such as `"c"` or `"cpp"`
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "c" => Language::C,
            "cpp" | "c++" | "cxx" => Language::Cpp,
            _ => Language::Unknown,
        }
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Unknown => "unknown",
        }
    }

    /// Check if this language can be turned into a code graph
    pub fn supports_graph(self) -> bool {
        matches!(self, Language::C | Language::Cpp)
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Language::C => Ok(tree_sitter_c::LANGUAGE.into()),
            Language::Cpp => Ok(tree_sitter_cpp::LANGUAGE.into()),
            Language::Unknown => Err(ParserError::unsupported_language(self.as_str())),
        }
    }

    /// Whether aggregates declared with `class` exist in this language
    pub fn has_classes(self) -> bool {
        matches!(self, Language::Cpp)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("c"), Language::C);
        assert_eq!(Language::from_extension("H"), Language::C);
        assert_eq!(Language::from_extension("cpp"), Language::Cpp);
        assert_eq!(Language::from_extension("hpp"), Language::Cpp);
        assert_eq!(Language::from_extension("cc"), Language::Cpp);
        assert_eq!(Language::from_extension("rs"), Language::Unknown);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path("src/main.c"), Language::C);
        assert_eq!(Language::from_path("include/widget.hxx"), Language::Cpp);
        assert_eq!(Language::from_path("Makefile"), Language::Unknown);
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(Language::from_tag("C"), Language::C);
        assert_eq!(Language::from_tag("c++"), Language::Cpp);
        assert_eq!(Language::from_tag("go"), Language::Unknown);
    }

    #[test]
    fn test_tree_sitter_language() {
        assert!(Language::C.tree_sitter_language().is_ok());
        assert!(Language::Cpp.tree_sitter_language().is_ok());
        assert!(Language::Unknown.tree_sitter_language().is_err());
    }

    #[test]
    fn test_supports_graph() {
        assert!(Language::C.supports_graph());
        assert!(Language::Cpp.supports_graph());
        assert!(!Language::Unknown.supports_graph());
    }
}
