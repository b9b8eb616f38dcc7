// Report module - 报告数据模型
// 归一化后的发现、严重度统计和持久化报告结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::Digest;
use std::fmt;

use crate::adapters::ToolId;
use crate::request::Language;

/// 严重度等级（从高到低排序）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
            Self::Info => write!(f, "INFO"),
        }
    }
}

/// 漏洞分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Injection,
    Secret,
    Exec,
    Crypto,
    Auth,
    Deserialization,
    Other,
}

/// 归一化后的漏洞发现结果
///
/// `id` 由结构字段派生（非随机分配），同一底层发现在重复运行中
/// 总是归一化出同一个 id，跨工具去重因此安全。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub tool: ToolId,
    pub severity: Severity,
    pub rule_id: String,
    pub file: String,
    pub line: u32,
    pub message: String,
    pub category: Category,
}

impl Finding {
    /// 结构化 id：sha1(tool|rule_id|file|line|message) 的前 16 位十六进制
    pub fn derive_id(tool: ToolId, rule_id: &str, file: &str, line: u32, message: &str) -> String {
        let mut hasher = sha1::Sha1::new();
        hasher.update(tool.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(rule_id.as_bytes());
        hasher.update(b"|");
        hasher.update(file.as_bytes());
        hasher.update(b"|");
        hasher.update(line.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(message.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest.chars().take(16).collect()
    }
}

/// 各严重度的发现数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    #[serde(rename = "HIGH")]
    pub high: u32,
    #[serde(rename = "MEDIUM")]
    pub medium: u32,
    #[serde(rename = "LOW")]
    pub low: u32,
    #[serde(rename = "INFO")]
    pub info: u32,
}

impl SeverityCounts {
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> u32 {
        self.high + self.medium + self.low + self.info
    }

    /// 最高的非零严重度（历史索引按此分组）
    pub fn highest(&self) -> Option<Severity> {
        if self.high > 0 {
            Some(Severity::High)
        } else if self.medium > 0 {
            Some(Severity::Medium)
        } else if self.low > 0 {
            Some(Severity::Low)
        } else if self.info > 0 {
            Some(Severity::Info)
        } else {
            None
        }
    }
}

/// 工具执行摘要（原始输出在归一化后丢弃，只保留此摘要）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultSummary {
    pub tool: ToolId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// 一次分析的持久化报告，以指纹为键
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub language: Language,
    pub tool_results: Vec<ToolResultSummary>,
    pub findings: Vec<Finding>,
    pub severity_counts: SeverityCounts,
    pub risk_score: u32,
    #[serde(default)]
    pub normalization_warnings: u32,
    #[serde(default)]
    pub served_from_cache: bool,
}

/// 历史条目：报告的轻量投影，浏览历史时无需加载完整报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub language: Language,
    pub severity_counts: SeverityCounts,
    pub risk_score: u32,
}

impl From<&Report> for HistoryEntry {
    fn from(report: &Report) -> Self {
        Self {
            fingerprint: report.fingerprint.clone(),
            created_at: report.created_at,
            language: report.language,
            severity_counts: report.severity_counts,
            risk_score: report.risk_score,
        }
    }
}
