//! Emit options and the optional `wiregen.toml` file.
//!
//! ```toml
//! output_dir = "src/generated"
//!
//! [emit]
//! namespace = "modbus"
//! runtime_path = "wiregen::runtime"
//! externals_path = "crate::externals"
//! describe_chunk = 16
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// How generated code is laid out and where it finds its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitOptions {
    /// Wrap the output in `pub mod <namespace>`.
    pub namespace: Option<String>,
    /// Path of the runtime module generated code imports.
    pub runtime_path: String,
    /// Module providing application types for externally-owned fields.
    pub externals_path: String,
    /// Elements per describe line for primitive arrays.
    pub describe_chunk: usize,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions {
            namespace: None,
            runtime_path: "wiregen::runtime".to_string(),
            externals_path: "crate::externals".to_string(),
            describe_chunk: 16,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub output_dir: Option<PathBuf>,
    pub emit: EmitOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.emit.validate().map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }
}

impl EmitOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.describe_chunk == 0 {
            return Err("describe_chunk must be at least 1".to_string());
        }
        if let Some(ns) = &self.namespace {
            if ns.is_empty() || !ns.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(format!("namespace `{}` is not a plain identifier", ns));
            }
        }
        for (key, path) in [("runtime_path", &self.runtime_path), ("externals_path", &self.externals_path)] {
            if path.is_empty() || path.split("::").any(|seg| seg.is_empty()) {
                return Err(format!("{} `{}` is not a module path", key, path));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fill_missing_keys() {
        let c: ConfigFile = toml::from_str("[emit]\nnamespace = \"modbus\"\n").unwrap();
        assert_eq!(c.emit.namespace.as_deref(), Some("modbus"));
        assert_eq!(c.emit.runtime_path, "wiregen::runtime");
        assert_eq!(c.emit.describe_chunk, 16);
        assert!(c.output_dir.is_none());
    }

    #[test]
    fn load_rejects_unknown_keys_and_bad_values() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[emit]\nnamspace = \"x\"").unwrap();
        assert!(matches!(ConfigFile::load(f.path()), Err(ConfigError::Parse { .. })));

        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "output_dir = \"out\"\n[emit]\ndescribe_chunk = 0").unwrap();
        assert!(matches!(ConfigFile::load(f.path()), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn load_reads_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "output_dir = \"gen\"\n[emit]\nexternals_path = \"crate::hooks\"").unwrap();
        let c = ConfigFile::load(f.path()).unwrap();
        assert_eq!(c.output_dir, Some(PathBuf::from("gen")));
        assert_eq!(c.emit.externals_path, "crate::hooks");
    }
}
