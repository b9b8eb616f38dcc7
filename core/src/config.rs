// Config module - 引擎配置
// 超时、报告目录和评分权重都是配置而非硬编码常量，
// 运维可通过环境变量或 YAML 文件调整，无需改代码

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 风险评分权重与上限
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreConfig {
    #[serde(default = "default_high_weight")]
    pub high_weight: u32,
    #[serde(default = "default_medium_weight")]
    pub medium_weight: u32,
    #[serde(default = "default_low_weight")]
    pub low_weight: u32,
    /// 饱和上限，防止病态输入产生无界分数
    #[serde(default = "default_max_score")]
    pub max_score: u32,
}

fn default_high_weight() -> u32 {
    10
}
fn default_medium_weight() -> u32 {
    3
}
fn default_low_weight() -> u32 {
    1
}
fn default_max_score() -> u32 {
    100
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            high_weight: default_high_weight(),
            medium_weight: default_medium_weight(),
            low_weight: default_low_weight(),
            max_score: default_max_score(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 单个扫描器的执行超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// 整次编排的截止时间（秒），超时后剩余扫描器按 timeout 处理
    #[serde(default)]
    pub run_deadline_secs: Option<u64>,
    /// 报告存储目录
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    #[serde(default = "default_semgrep_config")]
    pub semgrep_config: String,
    #[serde(default)]
    pub score: ScoreConfig,
}

fn default_tool_timeout_secs() -> u64 {
    120
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("analyses")
}

fn default_semgrep_config() -> String {
    "auto".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            run_deadline_secs: None,
            reports_dir: default_reports_dir(),
            semgrep_config: default_semgrep_config(),
            score: ScoreConfig::default(),
        }
    }
}

impl EngineConfig {
    /// 从环境变量读取配置（未设置的项用默认值）
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_u64("SCANNER_TIMEOUT_SECONDS") {
            config.tool_timeout_secs = secs;
        }
        if let Some(secs) = env_u64("SCAN_DEADLINE_SECONDS") {
            config.run_deadline_secs = Some(secs);
        }
        if let Ok(dir) = std::env::var("REPORTS_DIR") {
            if !dir.is_empty() {
                config.reports_dir = PathBuf::from(dir);
            }
        }
        if let Ok(semgrep) = std::env::var("SEMGREP_CONFIG_DEFAULT") {
            if !semgrep.is_empty() {
                config.semgrep_config = semgrep;
            }
        }
        config
    }

    /// 从 YAML 文件加载配置
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_secs.map(Duration::from_secs)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tool_timeout_secs, 120);
        assert_eq!(config.reports_dir, PathBuf::from("analyses"));
        assert_eq!(config.score.high_weight, 10);
        assert_eq!(config.score.max_score, 100);
    }

    #[test]
    fn yaml_overlay_keeps_defaults_for_missing_fields() {
        let parsed: EngineConfig =
            serde_yaml::from_str("tool_timeout_secs: 30\nscore:\n  high_weight: 20\n").unwrap();
        assert_eq!(parsed.tool_timeout_secs, 30);
        assert_eq!(parsed.score.high_weight, 20);
        assert_eq!(parsed.score.medium_weight, 3);
        assert_eq!(parsed.semgrep_config, "auto");
    }
}
