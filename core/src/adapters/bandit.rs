// Bandit 适配器 - Python 安全扫描器

use async_trait::async_trait;
use std::path::Path;

use super::{run_json_command, RawIssue, ToolAdapter, ToolError, ToolId};
use crate::request::Language;

pub struct BanditAdapter;

impl BanditAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BanditAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for BanditAdapter {
    fn id(&self) -> ToolId {
        ToolId::Bandit
    }

    fn accepts(&self, language: Language) -> bool {
        language == Language::Python
    }

    async fn invoke(&self, target: &Path, _language: Language) -> Result<Vec<RawIssue>, ToolError> {
        let mut args = vec!["-f".to_string(), "json".to_string(), "-q".to_string()];
        if target.is_dir() {
            args.push("-r".to_string());
        }
        args.push(target.to_string_lossy().to_string());

        let stdout = run_json_command("bandit", &args).await?;
        parse_bandit_output(&stdout)
    }
}

fn parse_bandit_output(stdout: &str) -> Result<Vec<RawIssue>, ToolError> {
    let data: serde_json::Value = serde_json::from_str(if stdout.trim().is_empty() {
        "{}"
    } else {
        stdout
    })
    .map_err(|e| ToolError::BadOutput(e.to_string()))?;

    let mut issues = Vec::new();
    for result in data["results"].as_array().into_iter().flatten() {
        issues.push(RawIssue {
            file: result["filename"].as_str().map(str::to_string),
            line: result["line_number"].as_u64().map(|n| n as u32),
            rule_id: result["test_id"].as_str().map(str::to_string),
            severity: result["issue_severity"].as_str().map(str::to_string),
            message: result["issue_text"].as_str().unwrap_or_default().to_string(),
        });
    }
    Ok(issues)
}
