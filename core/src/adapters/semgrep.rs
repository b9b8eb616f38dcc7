// Semgrep 适配器 - 多语言静态分析

use async_trait::async_trait;
use std::path::Path;

use super::{run_json_command, RawIssue, ToolAdapter, ToolError, ToolId};
use crate::request::Language;

pub struct SemgrepAdapter {
    config: String,
}

impl SemgrepAdapter {
    pub fn new(config: String) -> Self {
        Self { config }
    }

    /// 按语言选择规则集，可用 SEMGREP_CONFIG_<LANG> 覆盖
    fn config_for(&self, language: Language) -> String {
        let key = match language {
            Language::Python => "SEMGREP_CONFIG_PY",
            Language::Javascript => "SEMGREP_CONFIG_JS",
            Language::Typescript => "SEMGREP_CONFIG_TS",
            Language::Java => "SEMGREP_CONFIG_JAVA",
            Language::Csharp => "SEMGREP_CONFIG_CS",
        };
        std::env::var(key).unwrap_or_else(|_| self.config.clone())
    }
}

#[async_trait]
impl ToolAdapter for SemgrepAdapter {
    fn id(&self) -> ToolId {
        ToolId::Semgrep
    }

    fn accepts(&self, _language: Language) -> bool {
        true
    }

    async fn invoke(&self, target: &Path, language: Language) -> Result<Vec<RawIssue>, ToolError> {
        let args = vec![
            "--json".to_string(),
            "--config".to_string(),
            self.config_for(language),
            target.to_string_lossy().to_string(),
        ];
        let stdout = run_json_command("semgrep", &args).await?;
        parse_semgrep_output(&stdout)
    }
}

fn parse_semgrep_output(stdout: &str) -> Result<Vec<RawIssue>, ToolError> {
    let data: serde_json::Value = serde_json::from_str(if stdout.trim().is_empty() {
        "{}"
    } else {
        stdout
    })
    .map_err(|e| ToolError::BadOutput(e.to_string()))?;

    let mut issues = Vec::new();
    for result in data["results"].as_array().into_iter().flatten() {
        issues.push(RawIssue {
            file: result["path"].as_str().map(str::to_string),
            line: result["start"]["line"].as_u64().map(|n| n as u32),
            rule_id: result["check_id"].as_str().map(str::to_string),
            severity: result["extra"]["severity"].as_str().map(str::to_string),
            message: result["extra"]["message"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        });
    }
    Ok(issues)
}
