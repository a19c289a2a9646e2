//! Layered configuration for the smart-context backend.
//!
//! # Configuration resolution
//!
//! Values are resolved with the following precedence (highest to lowest):
//! 1. Environment variables (§6 of the spec — operator/session overrides)
//! 2. Project dotfile `<project>/.smart-context/config.json`
//! 3. Built-in defaults (this module)
//!
//! Loading a project config file never fails the process: a missing or
//! malformed file falls back to defaults with a logged warning, so a fresh
//! project with no config at all is always a valid starting state.

mod env;

pub use env::EnvOverrides;

use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;

pub const STATE_DIR_NAME: &str = ".smart-context";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DB_FILE_NAME: &str = "index.db";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Fixed-size window for plain text, in lines.
    pub text_window_lines: usize,
    pub text_window_overlap_lines: usize,
    /// Preview builder caps (§4.2).
    pub preview_max_lines: usize,
    pub summary_max_lines: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            text_window_lines: 60,
            text_window_overlap_lines: 10,
            preview_max_lines: 8,
            summary_max_lines: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub max_candidates: usize,
    pub max_chunk_candidates: usize,
    pub max_vector_candidates: usize,
    pub rrf_k: f64,
    pub rrf_depth: usize,
    pub mmr_lambda: f64,
    pub max_evidence_sections: usize,
    pub max_evidence_chars: usize,
    pub bm25_k1: f64,
    pub bm25_b: f64,
    /// Field boosts for BM25F, keyed to `heading`/`section_path`/`text`.
    pub boost_heading: f64,
    pub boost_section_path: f64,
    pub boost_text: f64,
    pub max_chunks_to_embed: usize,
    pub max_embedding_time_ms: u64,
    pub max_provider_concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_candidates: 60,
            max_chunk_candidates: 400,
            max_vector_candidates: 100,
            rrf_k: 60.0,
            rrf_depth: 200,
            mmr_lambda: 0.7,
            max_evidence_sections: 8,
            max_evidence_chars: 8_000,
            bm25_k1: 1.2,
            bm25_b: 0.75,
            boost_heading: 2.5,
            boost_section_path: 1.5,
            boost_text: 1.0,
            max_chunks_to_embed: 64,
            max_embedding_time_ms: 3_000,
            max_provider_concurrency: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditSafetyConfig {
    pub large_delete_bytes: u64,
    pub large_delete_lines: usize,
    pub context_fuzziness: usize,
    /// Levenshtein distance budget as a fraction of target string length.
    pub levenshtein_budget_ratio: f64,
}

impl Default for EditSafetyConfig {
    fn default() -> Self {
        Self {
            large_delete_bytes: 10_000,
            large_delete_lines: 100,
            context_fuzziness: 2,
            levenshtein_budget_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImpactConfig {
    pub upstream_depth: usize,
    pub downstream_depth: usize,
    pub risk_low_max: u64,
    pub risk_medium_max: u64,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            upstream_depth: 4,
            downstream_depth: 3,
            risk_low_max: 8,
            risk_medium_max: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub evidence_pack_ttl_ms: u64,
    pub evidence_pack_cache_size: usize,
    pub read_file_max_bytes: u64,
    pub shutdown_timeout_ms: u64,
    pub heartbeat: bool,
    pub log_to_file: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            evidence_pack_ttl_ms: 86_400_000,
            evidence_pack_cache_size: 100,
            read_file_max_bytes: 1_048_576,
            shutdown_timeout_ms: 5_000,
            heartbeat: true,
            log_to_file: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub edit_safety: EditSafetyConfig,
    pub impact: ImpactConfig,
    pub server: ServerConfig,
}

impl Config {
    pub fn state_dir(project_root: &Path) -> PathBuf {
        project_root.join(STATE_DIR_NAME)
    }

    pub fn db_path(project_root: &Path) -> PathBuf {
        Self::state_dir(project_root).join(DB_FILE_NAME)
    }

    fn config_path(project_root: &Path) -> PathBuf {
        Self::state_dir(project_root).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for `project_root`, applying the full precedence
    /// chain. Never fails: missing/malformed input at any layer falls back
    /// to the next layer down, with a warning logged for the project file.
    pub fn load(project_root: &Path) -> Self {
        let mut cfg = Self::load_project_file(project_root);
        EnvOverrides::read().apply(&mut cfg);
        cfg
    }

    fn load_project_file(project_root: &Path) -> Self {
        let path = Self::config_path(project_root);
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "invalid project config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(dir.path());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn malformed_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(Config::state_dir(dir.path())).unwrap();
        std::fs::write(
            Config::state_dir(dir.path()).join(CONFIG_FILE_NAME),
            "{ not json",
        )
        .unwrap();
        let cfg = Config::load(dir.path());
        assert_eq!(cfg.search.rrf_k, SearchConfig::default().rrf_k);
    }

    #[test]
    fn partial_config_file_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(Config::state_dir(dir.path())).unwrap();
        std::fs::write(
            Config::state_dir(dir.path()).join(CONFIG_FILE_NAME),
            r#"{ "search": { "mmr_lambda": 0.5 } }"#,
        )
        .unwrap();
        let cfg = Config::load(dir.path());
        assert_eq!(cfg.search.mmr_lambda, 0.5);
        assert_eq!(cfg.search.rrf_k, SearchConfig::default().rrf_k);
    }
}
