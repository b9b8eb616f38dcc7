// ESLint 适配器 - JavaScript/TypeScript 检查

use async_trait::async_trait;
use std::path::Path;

use super::{run_json_command, RawIssue, ToolAdapter, ToolError, ToolId};
use crate::request::Language;

pub struct EslintAdapter;

impl EslintAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EslintAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolAdapter for EslintAdapter {
    fn id(&self) -> ToolId {
        ToolId::Eslint
    }

    fn accepts(&self, language: Language) -> bool {
        matches!(language, Language::Javascript | Language::Typescript)
    }

    async fn invoke(&self, target: &Path, _language: Language) -> Result<Vec<RawIssue>, ToolError> {
        let args = vec![
            "-f".to_string(),
            "json".to_string(),
            target.to_string_lossy().to_string(),
        ];
        let stdout = run_json_command("eslint", &args).await?;
        parse_eslint_output(&stdout)
    }
}

fn parse_eslint_output(stdout: &str) -> Result<Vec<RawIssue>, ToolError> {
    let data: serde_json::Value = serde_json::from_str(if stdout.trim().is_empty() {
        "[]"
    } else {
        stdout
    })
    .map_err(|e| ToolError::BadOutput(e.to_string()))?;

    let mut issues = Vec::new();
    for file_entry in data.as_array().into_iter().flatten() {
        let file = file_entry["filePath"].as_str().map(str::to_string);
        for msg in file_entry["messages"].as_array().into_iter().flatten() {
            issues.push(RawIssue {
                file: file.clone(),
                line: msg["line"].as_u64().map(|n| n as u32),
                rule_id: msg["ruleId"].as_str().map(str::to_string),
                // ESLint 用数字严重度：2 = error, 1 = warning
                severity: msg["severity"].as_u64().map(|n| n.to_string()),
                message: msg["message"].as_str().unwrap_or_default().to_string(),
            });
        }
    }
    Ok(issues)
}
