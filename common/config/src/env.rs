//! Environment variable overrides (§6 of the spec). These sit above the
//! project config file in precedence since they are operator/session scoped.

use crate::Config;

#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    evidence_pack_ttl_ms: Option<u64>,
    evidence_pack_cache_size: Option<usize>,
    read_file_max_bytes: Option<u64>,
    shutdown_timeout_ms: Option<u64>,
    heartbeat: Option<bool>,
    log_to_file: Option<bool>,
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl EnvOverrides {
    pub fn read() -> Self {
        Self {
            evidence_pack_ttl_ms: parse_env("EVIDENCE_PACK_TTL_MS"),
            evidence_pack_cache_size: parse_env("EVIDENCE_PACK_CACHE_SIZE"),
            read_file_max_bytes: parse_env("READ_FILE_MAX_BYTES"),
            shutdown_timeout_ms: parse_env("SHUTDOWN_TIMEOUT_MS"),
            heartbeat: std::env::var("HEARTBEAT")
                .ok()
                .map(|v| !matches!(v.as_str(), "0" | "false" | "off")),
            log_to_file: std::env::var("LOG_TO_FILE").ok().map(|v| v != "0"),
        }
    }

    pub fn apply(&self, cfg: &mut Config) {
        if let Some(v) = self.evidence_pack_ttl_ms {
            cfg.server.evidence_pack_ttl_ms = v;
        }
        if let Some(v) = self.evidence_pack_cache_size {
            cfg.server.evidence_pack_cache_size = v;
        }
        if let Some(v) = self.read_file_max_bytes {
            cfg.server.read_file_max_bytes = v;
        }
        if let Some(v) = self.shutdown_timeout_ms {
            cfg.server.shutdown_timeout_ms = v;
        }
        if let Some(v) = self.heartbeat {
            cfg.server.heartbeat = v;
        }
        if let Some(v) = self.log_to_file {
            cfg.server.log_to_file = v;
        }
    }
}
