//! Impact Analyzer (C10, §4.10): for a proposed edit set, computes the
//! upstream/downstream transitive reach over the dependency graph and
//! derives a coarse risk score. Read-only and safe to run concurrently
//! with the planner — its output only ever decorates a response; it
//! blocks a transaction only when the caller explicitly opts in via
//! `require_low_risk`.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use smartctx_config::ImpactConfig;
use smartctx_error::Result;
use smartctx_graph::DependencyGraph;
use smartctx_store::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// `low` (<8), `medium` (<25), `high` (>=25) per §4.10, using the
    /// project's configured thresholds rather than the hardcoded defaults.
    fn from_metric(metric: u64, cfg: &ImpactConfig) -> Self {
        if metric < cfg.risk_low_max {
            RiskLevel::Low
        } else if metric < cfg.risk_medium_max {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub incoming: Vec<String>,
    pub outgoing: Vec<String>,
    pub risk_metric: u64,
    pub risk_level: RiskLevel,
    pub affected_tests: Vec<String>,
    pub warnings: Vec<String>,
}

static TEST_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\.test\.|\.spec\.|/__tests__/|(^|/)tests/)").unwrap());

/// Matches the "collect tests" patterns of §4.10: `.test.*`, `.spec.*`,
/// `__tests__/`, `tests/`.
pub fn is_test_path(path: &str) -> bool {
    TEST_PATTERN.is_match(path)
}

pub struct ImpactAnalyzer {
    graph: std::sync::Arc<DependencyGraph>,
    config: ImpactConfig,
}

impl ImpactAnalyzer {
    pub fn new(graph: std::sync::Arc<DependencyGraph>, config: ImpactConfig) -> Self {
        Self { graph, config }
    }

    /// Computes the impact report for a proposed edit touching `files`.
    /// `incoming` is the upstream transitive closure (who depends on these
    /// files), `outgoing` is downstream (what these files depend on).
    pub async fn analyze(&self, files: &[String], edit_count: usize) -> Result<ImpactReport> {
        let mut incoming: BTreeSet<String> = BTreeSet::new();
        let mut outgoing: BTreeSet<String> = BTreeSet::new();

        for file in files {
            let up = self
                .graph
                .transitive(file, Direction::Upstream, self.config.upstream_depth as u32)
                .await?;
            let down = self
                .graph
                .transitive(file, Direction::Downstream, self.config.downstream_depth as u32)
                .await?;
            incoming.extend(up);
            outgoing.extend(down);
        }
        for file in files {
            incoming.remove(file);
            outgoing.remove(file);
        }

        let risk_metric = 2 * incoming.len() as u64 + outgoing.len() as u64 + edit_count as u64;
        let risk_level = RiskLevel::from_metric(risk_metric, &self.config);

        let affected_tests: Vec<String> = incoming
            .iter()
            .chain(outgoing.iter())
            .chain(files.iter())
            .filter(|p| is_test_path(p))
            .cloned()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();

        let mut warnings = Vec::new();
        if matches!(risk_level, RiskLevel::Medium | RiskLevel::High) {
            warnings.push(format!(
                "{} upstream and {} downstream dependents affected by this edit",
                incoming.len(),
                outgoing.len()
            ));
        }
        if matches!(risk_level, RiskLevel::High) {
            warnings.push("high blast radius: consider splitting this edit into smaller batches".to_string());
        }
        if affected_tests.is_empty() && !incoming.is_empty() {
            warnings.push("no test files found among affected dependents".to_string());
        }

        Ok(ImpactReport {
            incoming: incoming.into_iter().collect(),
            outgoing: outgoing.into_iter().collect(),
            risk_metric,
            risk_level,
            affected_tests,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartctx_store::FileEdge;
    use smartctx_store::FileEdgeKind;
    use smartctx_store::Store;
    use std::sync::Arc;

    fn edge(from: &str, to: &str) -> FileEdge {
        FileEdge {
            from_path: from.to_string(),
            to_path: to.to_string(),
            edge_kind: FileEdgeKind::Import,
        }
    }

    #[test]
    fn test_path_patterns() {
        assert!(is_test_path("src/foo.test.ts"));
        assert!(is_test_path("src/foo.spec.ts"));
        assert!(is_test_path("src/__tests__/foo.ts"));
        assert!(is_test_path("tests/foo.rs"));
        assert!(!is_test_path("src/foo.ts"));
    }

    #[tokio::test]
    async fn s6_high_fanin_is_high_risk_but_never_blocks_by_itself() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        for i in 0..30 {
            store
                .replace_file_edges(format!("upstream{i}.rs"), vec![edge(&format!("upstream{i}.rs"), "core.rs")])
                .await
                .unwrap();
        }
        for i in 0..10 {
            store
                .replace_file_edges("core.rs".to_string(), vec![edge("core.rs", &format!("downstream{i}.rs"))])
                .await
                .unwrap();
        }
        let graph = Arc::new(DependencyGraph::new(store));
        let analyzer = ImpactAnalyzer::new(graph, ImpactConfig::default());

        let report = analyzer.analyze(&["core.rs".to_string()], 1).await.unwrap();
        assert_eq!(report.incoming.len(), 30);
        assert_eq!(report.outgoing.len(), 10);
        assert_eq!(report.risk_metric, 2 * 30 + 10 + 1);
        assert_eq!(report.risk_level, RiskLevel::High);
        assert!(!report.warnings.is_empty());
    }

    #[tokio::test]
    async fn isolated_file_is_low_risk() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let graph = Arc::new(DependencyGraph::new(store));
        let analyzer = ImpactAnalyzer::new(graph, ImpactConfig::default());
        let report = analyzer.analyze(&["lonely.rs".to_string()], 1).await.unwrap();
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.risk_metric, 1);
    }
}
