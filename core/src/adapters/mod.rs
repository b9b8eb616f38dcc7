// Adapters module - 扫描器适配器
// 定义适配器的核心接口和类型；每个外部分析工具对应一个适配器，
// 把子进程/库调用包装成统一的结果形状

pub mod bandit;
pub mod eslint;
pub mod pattern;
pub mod semgrep;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

use crate::config::EngineConfig;
use crate::report::ToolResultSummary;
use crate::request::Language;

/// 已知扫描器。新增工具即新增一个变体，编排器无需改动。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ToolId {
    Bandit,
    Semgrep,
    Eslint,
    PatternDetector,
}

impl ToolId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bandit => "bandit",
            Self::Semgrep => "semgrep",
            Self::Eslint => "eslint",
            Self::PatternDetector => "pattern-detector",
        }
    }

    pub fn all() -> [ToolId; 4] {
        [
            Self::Bandit,
            Self::Semgrep,
            Self::Eslint,
            Self::PatternDetector,
        ]
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bandit" => Ok(Self::Bandit),
            "semgrep" => Ok(Self::Semgrep),
            "eslint" => Ok(Self::Eslint),
            "pattern-detector" | "pattern_detector" => Ok(Self::PatternDetector),
            other => Err(format!("unknown scanner: {}", other)),
        }
    }
}

/// 适配器解析后的单条原始输出。file/line 可能缺失，
/// 由归一化层丢弃并计入警告。
#[derive(Debug, Clone, Default)]
pub struct RawIssue {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub rule_id: Option<String>,
    pub severity: Option<String>,
    pub message: String,
}

/// 适配器内部错误。永远不会越过 `run_tool` 边界，
/// 统一折叠成 `ToolResult { success: false, error }`。
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} is not installed")]
    NotInstalled(String),
    #[error("{0}")]
    Failed(String),
    #[error("invalid JSON output: {0}")]
    BadOutput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 单个工具的执行结果，由编排器独占，归一化后只保留摘要
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool: ToolId,
    pub success: bool,
    pub issues: Vec<RawIssue>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl ToolResult {
    pub fn failed(tool: ToolId, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            tool,
            success: false,
            issues: Vec::new(),
            error: Some(error.into()),
            duration,
        }
    }

    pub fn summary(&self) -> ToolResultSummary {
        ToolResultSummary {
            tool: self.tool,
            success: self.success,
            error: self.error.clone(),
            duration_ms: self.duration.as_millis() as u64,
        }
    }
}

/// 适配器 trait - 所有扫描器适配器都需要实现此接口
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn id(&self) -> ToolId;

    /// 该适配器是否支持此语言
    fn accepts(&self, language: Language) -> bool;

    /// 对已落盘的目标执行扫描。超时和错误折叠由 `run_tool` 负责。
    async fn invoke(&self, target: &Path, language: Language) -> Result<Vec<RawIssue>, ToolError>;
}

/// 执行单个适配器并把一切失败折叠成 ToolResult。
///
/// 不支持的语言立即返回 `unsupported-language`，不会产生子进程；
/// 超时返回 `timeout`，在途子进程随 future 丢弃被终止（kill_on_drop）。
pub async fn run_tool(
    adapter: Arc<dyn ToolAdapter>,
    target: &Path,
    language: Language,
    timeout: Duration,
) -> ToolResult {
    let tool = adapter.id();
    if !adapter.accepts(language) {
        return ToolResult::failed(tool, "unsupported-language", Duration::ZERO);
    }

    let start = Instant::now();
    match tokio::time::timeout(timeout, adapter.invoke(target, language)).await {
        Ok(Ok(issues)) => ToolResult {
            tool,
            success: true,
            issues,
            error: None,
            duration: start.elapsed(),
        },
        Ok(Err(e)) => {
            tracing::warn!(tool = %tool, error = %e, "scanner failed");
            ToolResult::failed(tool, e.to_string(), start.elapsed())
        }
        Err(_) => {
            tracing::warn!(tool = %tool, "scanner timed out after {}s", timeout.as_secs());
            ToolResult::failed(tool, "timeout", start.elapsed())
        }
    }
}

/// 适配器注册表
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<ToolId, Arc<dyn ToolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// 注册全部内置适配器
    pub fn with_defaults(config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        registry.register(bandit::BanditAdapter::new());
        registry.register(semgrep::SemgrepAdapter::new(config.semgrep_config.clone()));
        registry.register(eslint::EslintAdapter::new());
        registry.register(pattern::PatternDetector::new());
        registry
    }

    pub fn register<A: ToolAdapter + 'static>(&mut self, adapter: A) {
        self.adapters.insert(adapter.id(), Arc::new(adapter));
    }

    pub fn get(&self, tool: ToolId) -> Option<Arc<dyn ToolAdapter>> {
        self.adapters.get(&tool).cloned()
    }

    /// 给定工具集中是否存在支持该语言的适配器
    pub fn any_accepts<'a>(
        &self,
        tools: impl IntoIterator<Item = &'a ToolId>,
        language: Language,
    ) -> bool {
        tools
            .into_iter()
            .filter_map(|tool| self.adapters.get(tool))
            .any(|adapter| adapter.accepts(language))
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 运行一个外部命令并返回 stdout。
///
/// 扫描器惯例：退出码 0/1 都算成功（1 表示有发现），其余为失败。
pub(crate) async fn run_json_command(program: &str, args: &[String]) -> Result<String, ToolError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotInstalled(program.to_string())
            } else {
                ToolError::Io(e)
            }
        })?;

    let output = child.wait_with_output().await?;
    let code = output.status.code().unwrap_or(-1);
    if code != 0 && code != 1 {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let reason = if stderr.is_empty() {
            format!("{} exited with status {}", program, code)
        } else {
            stderr
        };
        return Err(ToolError::Failed(reason));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// 扫描器二进制的可用性信息（/status 探针用）
#[derive(Debug, Clone, Serialize)]
pub struct BinaryStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 探测外部扫描器二进制是否安装及其版本
pub async fn check_binaries() -> BTreeMap<String, BinaryStatus> {
    let mut statuses = BTreeMap::new();
    for program in ["bandit", "semgrep", "eslint"] {
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            run_json_command(program, &["--version".to_string()]),
        )
        .await;
        let status = match result {
            Ok(Ok(stdout)) => BinaryStatus {
                available: true,
                version: stdout
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .map(str::to_string),
                error: None,
            },
            Ok(Err(e)) => BinaryStatus {
                available: false,
                version: None,
                error: Some(e.to_string()),
            },
            Err(_) => BinaryStatus {
                available: false,
                version: None,
                error: Some("version probe timed out".to_string()),
            },
        };
        statuses.insert(program.to_string(), status);
    }
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_id_round_trip() {
        for tool in ToolId::all() {
            assert_eq!(tool.as_str().parse::<ToolId>().unwrap(), tool);
        }
        assert!("nuclei".parse::<ToolId>().is_err());
    }

    #[tokio::test]
    async fn unsupported_language_short_circuits() {
        let adapter: Arc<dyn ToolAdapter> = Arc::new(bandit::BanditAdapter::new());
        let result = run_tool(
            adapter,
            Path::new("/nonexistent"),
            Language::Java,
            Duration::from_secs(1),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("unsupported-language"));
        assert!(result.issues.is_empty());
    }
}
