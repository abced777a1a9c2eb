use codegraph_parser::Language;
use serde::{Deserialize, Serialize};

/// Configuration for graph construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Languages to analyze (empty = all supported languages)
    pub supported_languages: Vec<String>,

    /// Worker threads for per-file analysis (`None` = rayon default)
    pub max_workers: Option<usize>,

    /// Analyze files in parallel
    pub parallel: bool,

    /// Search roots for quoted `#include` directives
    pub include_dirs: Vec<String>,

    /// Emit `References` edges for field, parameter and return types
    pub emit_references: bool,

    /// Reuse partial graphs of files whose content hash is unchanged
    pub use_cache: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            supported_languages: vec![],
            max_workers: None,
            parallel: true,
            include_dirs: vec![],
            emit_references: true,
            use_cache: true,
        }
    }
}

impl GraphConfig {
    /// Single-threaded analysis (deterministic scheduling, easier debugging)
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            max_workers: None,
            ..Default::default()
        }
    }

    /// Calls, containment and inheritance only
    pub fn without_references() -> Self {
        Self {
            emit_references: false,
            ..Default::default()
        }
    }

    /// Whether files of `language` should be analyzed
    pub fn accepts(&self, language: Language) -> bool {
        if !language.supports_graph() {
            return false;
        }
        self.supported_languages.is_empty()
            || self
                .supported_languages
                .iter()
                .any(|tag| Language::from_tag(tag) == language)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == Some(0) {
            return Err("max_workers must be > 0".to_string());
        }

        if self.max_workers.is_some() && !self.parallel {
            return Err("max_workers requires parallel analysis".to_string());
        }

        for tag in &self.supported_languages {
            if !Language::from_tag(tag).supports_graph() {
                return Err(format!("unsupported language in supported_languages: {tag}"));
            }
        }

        if self.include_dirs.iter().any(|dir| dir.trim().is_empty()) {
            return Err("include_dirs must not contain empty paths".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GraphConfig::default().validate().is_ok());
        assert!(GraphConfig::sequential().validate().is_ok());
        assert!(GraphConfig::without_references().validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = GraphConfig {
            max_workers: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_language_rejected() {
        let config = GraphConfig {
            supported_languages: vec!["cobol".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_accepts_filters_languages() {
        let config = GraphConfig {
            supported_languages: vec!["c".to_string()],
            ..Default::default()
        };
        assert!(config.accepts(Language::C));
        assert!(!config.accepts(Language::Cpp));
        assert!(GraphConfig::default().accepts(Language::Cpp));
        assert!(!GraphConfig::default().accepts(Language::Unknown));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: GraphConfig = serde_json::from_str(r#"{"parallel": false}"#).unwrap();
        assert!(!config.parallel);
        assert!(config.emit_references);
    }
}
