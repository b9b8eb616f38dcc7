// Orchestrator module - 扫描编排
// 并发运行请求的全部适配器，收集部分失败，组装报告

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tokio::task::JoinSet;

use crate::adapters::{run_tool, AdapterRegistry, ToolResult};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::normalize::normalize;
use crate::report::Report;
use crate::request::{AnalysisRequest, CodeSource};
use crate::score::score;

/// 片段先落盘到临时目录再交给扫描器；临时目录随值析构清理
enum StagedTarget {
    Snippet { dir: TempDir, file: PathBuf },
    Local(PathBuf),
}

impl StagedTarget {
    fn path(&self) -> &Path {
        match self {
            Self::Snippet { file, .. } => file,
            Self::Local(path) => path,
        }
    }

    /// 归一化时剥掉的路径前缀，临时目录不能参与 Finding id
    fn base(&self) -> Option<&Path> {
        match self {
            Self::Snippet { dir, .. } => Some(dir.path()),
            Self::Local(_) => None,
        }
    }
}

pub struct Orchestrator {
    registry: AdapterRegistry,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(registry: AdapterRegistry, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// 执行一次完整编排。
    ///
    /// 所有适配器独立并发运行，单个失败或超时不会阻塞或取消其余；
    /// 等全部结束（或超时）才继续，不存在首个完成即返回的捷径。
    /// 全部适配器失败时仍返回空发现集合的有效报告——工具层面的
    /// 失败不是请求失败。
    pub async fn execute(
        &self,
        request: &AnalysisRequest,
        fingerprint: &str,
    ) -> Result<Report, EngineError> {
        let staged = stage(request)?;
        let target = staged.path();
        let timeout = self.config.tool_timeout();
        let started = Instant::now();

        let mut results: Vec<ToolResult> = Vec::with_capacity(request.tools.len());
        let mut set = JoinSet::new();
        for tool in &request.tools {
            match self.registry.get(*tool) {
                Some(adapter) => {
                    let target = target.to_path_buf();
                    let language = request.language;
                    set.spawn(
                        async move { run_tool(adapter, &target, language, timeout).await },
                    );
                }
                None => {
                    results.push(ToolResult::failed(
                        *tool,
                        "scanner not registered",
                        std::time::Duration::ZERO,
                    ));
                }
            }
        }

        // 整次编排的截止时间：超过后中止剩余任务，按 timeout 记账
        let deadline = self
            .config
            .run_deadline()
            .map(|d| tokio::time::Instant::now() + d);

        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(fingerprint, "run deadline exceeded, aborting remaining scanners");
                        set.abort_all();
                        while set.join_next().await.is_some() {}
                        break;
                    }
                },
                None => set.join_next().await,
            };
            match next {
                Some(Ok(result)) => results.push(result),
                Some(Err(e)) => {
                    tracing::error!(fingerprint, "scanner task failed to join: {}", e);
                }
                None => break,
            }
        }

        // 未收集到结果的工具（被截止时间中止的）统一记为 timeout
        for tool in &request.tools {
            if !results.iter().any(|r| r.tool == *tool) {
                results.push(ToolResult::failed(*tool, "timeout", started.elapsed()));
            }
        }

        let normalized = normalize(&results, staged.base());
        let (severity_counts, risk_score) = score(&normalized.findings, &self.config.score);

        tracing::info!(
            fingerprint,
            findings = normalized.findings.len(),
            risk_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "orchestration finished"
        );

        Ok(Report {
            fingerprint: fingerprint.to_string(),
            created_at: Utc::now(),
            language: request.language,
            tool_results: results.iter().map(ToolResult::summary).collect(),
            findings: normalized.findings,
            severity_counts,
            risk_score,
            normalization_warnings: normalized.warnings,
            served_from_cache: false,
        })
    }
}

fn stage(request: &AnalysisRequest) -> Result<StagedTarget, EngineError> {
    match &request.source {
        CodeSource::Snippet(code) => {
            let dir = tempfile::Builder::new().prefix("snippet_").tempdir()?;
            let file = dir
                .path()
                .join(format!("snippet{}", request.language.file_suffix()));
            fs::write(&file, code)?;
            Ok(StagedTarget::Snippet { dir, file })
        }
        CodeSource::Path(path) => Ok(StagedTarget::Local(path.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{RawIssue, ToolAdapter, ToolError, ToolId};
    use crate::request::Language;
    use async_trait::async_trait;
    use std::time::Duration;

    /// 挂起指定时长后返回一条发现的假扫描器
    struct SlowAdapter {
        tool: ToolId,
        delay: Duration,
    }

    #[async_trait]
    impl ToolAdapter for SlowAdapter {
        fn id(&self) -> ToolId {
            self.tool
        }

        fn accepts(&self, _language: Language) -> bool {
            true
        }

        async fn invoke(
            &self,
            _target: &Path,
            _language: Language,
        ) -> Result<Vec<RawIssue>, ToolError> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![RawIssue {
                file: Some("slow.py".to_string()),
                line: Some(1),
                rule_id: Some("slow-rule".to_string()),
                severity: Some("ERROR".to_string()),
                message: "slow finding".to_string(),
            }])
        }
    }

    fn config_with_timeout(secs: u64) -> EngineConfig {
        EngineConfig {
            tool_timeout_secs: secs,
            reports_dir: std::env::temp_dir(),
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn timed_out_adapter_does_not_block_the_others() {
        let mut registry = AdapterRegistry::new();
        registry.register(SlowAdapter {
            tool: ToolId::Semgrep,
            delay: Duration::from_secs(30),
        });
        registry.register(crate::adapters::pattern::PatternDetector::new());

        let orchestrator = Orchestrator::new(registry, config_with_timeout(1));
        let request = AnalysisRequest::snippet(
            Language::Python,
            "password = 'hardcoded123'",
            [ToolId::Semgrep, ToolId::PatternDetector],
        );

        let report = orchestrator.execute(&request, "fp-timeout").await.unwrap();

        let semgrep = report
            .tool_results
            .iter()
            .find(|r| r.tool == ToolId::Semgrep)
            .unwrap();
        assert!(!semgrep.success);
        assert_eq!(semgrep.error.as_deref(), Some("timeout"));

        let detector = report
            .tool_results
            .iter()
            .find(|r| r.tool == ToolId::PatternDetector)
            .unwrap();
        assert!(detector.success);
        assert_eq!(report.severity_counts.high, 1);
    }

    #[tokio::test]
    async fn all_failures_still_yield_an_empty_report() {
        let mut registry = AdapterRegistry::new();
        registry.register(SlowAdapter {
            tool: ToolId::Bandit,
            delay: Duration::from_secs(30),
        });

        let orchestrator = Orchestrator::new(registry, config_with_timeout(1));
        let request =
            AnalysisRequest::snippet(Language::Python, "print('a')", [ToolId::Bandit]);

        let report = orchestrator.execute(&request, "fp-all-failed").await.unwrap();
        assert!(report.findings.is_empty());
        assert_eq!(report.severity_counts.total(), 0);
        assert_eq!(report.risk_score, 0);
        assert!(report.tool_results.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn run_deadline_aborts_remaining_scanners() {
        let mut registry = AdapterRegistry::new();
        registry.register(SlowAdapter {
            tool: ToolId::Eslint,
            delay: Duration::from_secs(30),
        });

        let config = EngineConfig {
            tool_timeout_secs: 120,
            run_deadline_secs: Some(1),
            reports_dir: std::env::temp_dir(),
            ..EngineConfig::default()
        };
        let orchestrator = Orchestrator::new(registry, config);
        let request =
            AnalysisRequest::snippet(Language::Javascript, "var x = 1;", [ToolId::Eslint]);

        let report = orchestrator.execute(&request, "fp-deadline").await.unwrap();
        let eslint = &report.tool_results[0];
        assert!(!eslint.success);
        assert_eq!(eslint.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn unregistered_scanner_is_reported_not_fatal() {
        let registry = AdapterRegistry::new();
        let orchestrator = Orchestrator::new(registry, config_with_timeout(5));
        let request =
            AnalysisRequest::snippet(Language::Python, "print('a')", [ToolId::Bandit]);

        let report = orchestrator.execute(&request, "fp-missing").await.unwrap();
        assert_eq!(report.tool_results.len(), 1);
        assert_eq!(
            report.tool_results[0].error.as_deref(),
            Some("scanner not registered")
        );
    }
}
