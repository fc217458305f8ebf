//! Compiler configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ManifestError, ManifestResult};
use crate::program::StashScope;

/// Result shape of a branch chain where some, but not all, arms yield nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialBranchResults {
    /// The unified shape also admits the absent value.
    #[default]
    Nullable,
    /// The unified shape is exactly what the producing arms yield.
    Exact,
}

/// Knobs for template generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Branch unification policy.
    pub partial_branch_results: PartialBranchResults,
    /// Scope of stashes that do not name one.
    pub default_stash_scope: StashScope,
    /// Indentation step of loop and branch blocks.
    pub indent_width: usize,
    /// Schema scalar emitted for timestamps.
    pub timestamp_scalar: String,
    /// Request version of the no-op data source.
    pub none_request_version: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            partial_branch_results: PartialBranchResults::Nullable,
            default_stash_scope: StashScope::Global,
            indent_width: 2,
            timestamp_scalar: "AWSDateTime".to_string(),
            none_request_version: "2017-02-28".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Load a JSON configuration file; missing keys take their defaults.
    pub fn load(path: &Path) -> ManifestResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config_fills_defaults() {
        let config: CompilerConfig =
            serde_json::from_str(r#"{"partial_branch_results": "exact"}"#).unwrap();
        assert_eq!(config.partial_branch_results, PartialBranchResults::Exact);
        assert_eq!(config.default_stash_scope, StashScope::Global);
        assert_eq!(config.indent_width, 2);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_stash_scope": "local", "indent_width": 4}}"#).unwrap();
        let config = CompilerConfig::load(file.path()).unwrap();
        assert_eq!(config.default_stash_scope, StashScope::Local);
        assert_eq!(config.indent_width, 4);
        assert_eq!(config.timestamp_scalar, "AWSDateTime");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CompilerConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
