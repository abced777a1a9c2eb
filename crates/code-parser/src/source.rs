use crate::error::{ParserError, Result};
use crate::language::Language;
use tree_sitter::{Parser, Tree};

/// One input file: path, language tag, source text and its parse tree.
///
/// Loaders normally hand a tree they produced themselves to [`ParsedSource::new`];
/// [`ParsedSource::parse`] runs the tree-sitter grammar for the language.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    path: String,
    language: Language,
    text: String,
    tree: Tree,
}

impl ParsedSource {
    /// Wrap an already parsed tree
    pub fn new(path: impl Into<String>, language: Language, text: impl Into<String>, tree: Tree) -> Self {
        Self {
            path: path.into(),
            language,
            text: text.into(),
            tree,
        }
    }

    /// Parse `text` with the grammar for `language`
    pub fn parse(path: impl Into<String>, language: Language, text: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let text = text.into();

        if !language.supports_graph() {
            return Err(ParserError::unsupported_language(language.as_str()));
        }

        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| ParserError::tree_sitter(format!("Failed to set language: {e}")))?;

        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| ParserError::parse(format!("Failed to parse {path}")))?;

        if tree.root_node().has_error() {
            log::debug!("{path}: parse tree contains error nodes");
        }

        Ok(Self::new(path, language, text, tree))
    }

    /// Parse a file, detecting the language from its extension
    pub fn parse_detected(path: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let language = Language::from_path(&path);
        Self::parse(path, language, text)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn language(&self) -> Language {
        self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn tree(&self) -> &Tree {
        &self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_c_source() {
        let source = ParsedSource::parse("a.c", Language::C, "int main(void) { return 0; }").unwrap();
        assert_eq!(source.path(), "a.c");
        assert_eq!(source.tree().root_node().kind(), "translation_unit");
    }

    #[test]
    fn test_parse_detected_cpp() {
        let source = ParsedSource::parse_detected("a.cpp", "namespace n { void f(); }").unwrap();
        assert_eq!(source.language(), Language::Cpp);
    }

    #[test]
    fn test_parse_unknown_language_fails() {
        let err = ParsedSource::parse_detected("a.rs", "fn main() {}").unwrap_err();
        assert!(matches!(err, ParserError::UnsupportedLanguage(_)));
    }
}
