// Normalize module - 输出归一化
// 把各工具异构的原始输出映射成统一的 Finding 形状并做结构化去重

use std::collections::BTreeMap;
use std::path::Path;

use crate::adapters::{ToolId, ToolResult};
use crate::report::{Category, Finding, Severity};

/// 归一化结果：去重后的发现集合 + 丢弃的畸形条目计数
#[derive(Debug, Default)]
pub struct NormalizedFindings {
    pub findings: Vec<Finding>,
    pub warnings: u32,
}

/// 归一化全部成功工具的输出。
///
/// 发现按结构化 id 去重并排序，最终集合与工具完成顺序无关；
/// 缺 file 或 line 的条目丢弃并计入 warnings，不视为致命错误。
/// `base` 是片段落盘目录，文件路径剥掉该前缀后才参与 id 计算，
/// 否则临时目录会让同一发现每次运行得到不同 id。
pub fn normalize(tool_results: &[ToolResult], base: Option<&Path>) -> NormalizedFindings {
    let mut deduped: BTreeMap<String, Finding> = BTreeMap::new();
    let mut warnings = 0u32;

    for result in tool_results {
        if !result.success {
            continue;
        }
        for issue in &result.issues {
            let (Some(file), Some(line)) = (&issue.file, issue.line) else {
                warnings += 1;
                continue;
            };
            let file = relativize(file, base);
            let rule_id = issue.rule_id.as_deref().unwrap_or("unknown").to_string();
            let severity = map_severity(result.tool, issue.severity.as_deref());
            let category = categorize(result.tool, &rule_id, &issue.message);
            let id = Finding::derive_id(result.tool, &rule_id, &file, line, &issue.message);

            deduped.entry(id.clone()).or_insert(Finding {
                id,
                tool: result.tool,
                severity,
                rule_id,
                file,
                line,
                message: issue.message.clone(),
                category,
            });
        }
    }

    NormalizedFindings {
        findings: deduped.into_values().collect(),
        warnings,
    }
}

fn relativize(file: &str, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(stripped) = Path::new(file).strip_prefix(base) {
            return stripped.to_string_lossy().to_string();
        }
    }
    file.to_string()
}

/// 各工具严重度词汇到四级枚举的固定映射表
fn map_severity(tool: ToolId, raw: Option<&str>) -> Severity {
    let raw = raw.unwrap_or_default();
    match tool {
        // Bandit: issue_severity ∈ {HIGH, MEDIUM, LOW}
        ToolId::Bandit => match raw.to_uppercase().as_str() {
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Info,
        },
        // Semgrep: extra.severity ∈ {ERROR, WARNING, INFO}
        ToolId::Semgrep => match raw.to_uppercase().as_str() {
            "ERROR" => Severity::High,
            "WARNING" => Severity::Medium,
            _ => Severity::Info,
        },
        // ESLint: 数字严重度 2 = error, 1 = warning
        ToolId::Eslint => match raw {
            "2" => Severity::Medium,
            "1" => Severity::Low,
            _ => Severity::Info,
        },
        ToolId::PatternDetector => match raw.to_lowercase().as_str() {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Info,
        },
    }
}

/// 分类：先查 (tool, rule_id) 固定表，查不到再按消息关键词兜底
fn categorize(tool: ToolId, rule_id: &str, message: &str) -> Category {
    if let Some(category) = rule_table(tool, rule_id) {
        return category;
    }
    keyword_fallback(&format!("{} {}", rule_id, message).to_lowercase())
}

fn rule_table(tool: ToolId, rule_id: &str) -> Option<Category> {
    match tool {
        ToolId::Bandit => match rule_id {
            "B102" | "B307" => Some(Category::Exec),
            "B105" | "B106" | "B107" => Some(Category::Secret),
            "B301" | "B302" | "B506" => Some(Category::Deserialization),
            "B303" | "B304" | "B305" | "B324" => Some(Category::Crypto),
            "B501" => Some(Category::Auth),
            "B602" | "B603" | "B604" | "B605" | "B606" | "B607" => Some(Category::Exec),
            "B608" => Some(Category::Injection),
            _ => None,
        },
        ToolId::PatternDetector => {
            if rule_id.starts_with("secret-") {
                Some(Category::Secret)
            } else {
                match rule_id {
                    "dynamic-exec" | "os-system" | "subprocess-call" | "pattern-eval"
                    | "pattern-shell-true" => Some(Category::Exec),
                    "pattern-sql-keyword" => Some(Category::Injection),
                    _ => None,
                }
            }
        }
        // Semgrep/ESLint 规则 id 是开放集合，走关键词兜底
        ToolId::Semgrep | ToolId::Eslint => None,
    }
}

fn keyword_fallback(text: &str) -> Category {
    const SECRET: &[&str] = &["password", "secret", "token", "api_key", "api key", "credential"];
    const INJECTION: &[&str] = &["sql", "injection"];
    const EXEC: &[&str] = &["eval", "exec", "subprocess", "os.system", "shell", "command"];
    const DESER: &[&str] = &["pickle", "deserial", "yaml.load", "marshal"];
    const CRYPTO: &[&str] = &["md5", "sha1", "cipher", "crypto", "random"];
    const AUTH: &[&str] = &["auth", "session", "cookie", "csrf", "certificate"];

    let contains_any = |needles: &[&str]| needles.iter().any(|needle| text.contains(needle));

    if contains_any(SECRET) {
        Category::Secret
    } else if contains_any(INJECTION) {
        Category::Injection
    } else if contains_any(EXEC) {
        Category::Exec
    } else if contains_any(DESER) {
        Category::Deserialization
    } else if contains_any(CRYPTO) {
        Category::Crypto
    } else if contains_any(AUTH) {
        Category::Auth
    } else {
        Category::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::RawIssue;
    use std::time::Duration;

    fn issue(file: &str, line: u32, rule: &str, severity: &str, message: &str) -> RawIssue {
        RawIssue {
            file: Some(file.to_string()),
            line: Some(line),
            rule_id: Some(rule.to_string()),
            severity: Some(severity.to_string()),
            message: message.to_string(),
        }
    }

    fn ok_result(tool: ToolId, issues: Vec<RawIssue>) -> ToolResult {
        ToolResult {
            tool,
            success: true,
            issues,
            error: None,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn arrival_order_does_not_change_findings() {
        let bandit = ok_result(
            ToolId::Bandit,
            vec![issue("a.py", 3, "B105", "HIGH", "hardcoded password")],
        );
        let detector = ok_result(
            ToolId::PatternDetector,
            vec![issue("a.py", 7, "dynamic-exec", "high", "eval call")],
        );

        let forward = normalize(&[bandit.clone(), detector.clone()], None);
        let backward = normalize(&[detector, bandit], None);
        assert_eq!(forward.findings, backward.findings);
        assert_eq!(forward.findings.len(), 2);
    }

    #[test]
    fn duplicate_hits_from_same_run_collapse() {
        let result = ok_result(
            ToolId::Bandit,
            vec![
                issue("a.py", 3, "B105", "HIGH", "hardcoded password"),
                issue("a.py", 3, "B105", "HIGH", "hardcoded password"),
            ],
        );
        let normalized = normalize(&[result], None);
        assert_eq!(normalized.findings.len(), 1);
        assert_eq!(normalized.warnings, 0);
    }

    #[test]
    fn malformed_entries_are_dropped_and_counted() {
        let result = ok_result(
            ToolId::Semgrep,
            vec![
                RawIssue {
                    file: None,
                    line: Some(2),
                    rule_id: Some("rule".to_string()),
                    severity: Some("ERROR".to_string()),
                    message: "no file".to_string(),
                },
                RawIssue {
                    file: Some("a.py".to_string()),
                    line: None,
                    rule_id: Some("rule".to_string()),
                    severity: Some("ERROR".to_string()),
                    message: "no line".to_string(),
                },
                issue("a.py", 1, "rule", "ERROR", "kept"),
            ],
        );
        let normalized = normalize(&[result], None);
        assert_eq!(normalized.findings.len(), 1);
        assert_eq!(normalized.warnings, 2);
    }

    #[test]
    fn failed_tools_contribute_nothing() {
        let failed = ToolResult::failed(ToolId::Bandit, "timeout", Duration::ZERO);
        let normalized = normalize(&[failed], None);
        assert!(normalized.findings.is_empty());
    }

    #[test]
    fn severity_tables() {
        assert_eq!(map_severity(ToolId::Bandit, Some("HIGH")), Severity::High);
        assert_eq!(map_severity(ToolId::Bandit, Some("low")), Severity::Low);
        assert_eq!(map_severity(ToolId::Semgrep, Some("ERROR")), Severity::High);
        assert_eq!(map_severity(ToolId::Semgrep, Some("WARNING")), Severity::Medium);
        assert_eq!(map_severity(ToolId::Eslint, Some("2")), Severity::Medium);
        assert_eq!(map_severity(ToolId::Eslint, Some("1")), Severity::Low);
        assert_eq!(map_severity(ToolId::Bandit, None), Severity::Info);
    }

    #[test]
    fn category_table_and_fallback() {
        assert_eq!(categorize(ToolId::Bandit, "B608", "sql expr"), Category::Injection);
        assert_eq!(categorize(ToolId::Bandit, "B105", "..."), Category::Secret);
        assert_eq!(
            categorize(ToolId::PatternDetector, "secret-aws-access-key", "..."),
            Category::Secret
        );
        assert_eq!(
            categorize(ToolId::Semgrep, "python.lang.sql-injection", "tainted query"),
            Category::Injection
        );
        assert_eq!(
            categorize(ToolId::Eslint, "no-eval", "eval can be harmful"),
            Category::Exec
        );
        assert_eq!(
            categorize(ToolId::Eslint, "no-unused-vars", "x is unused"),
            Category::Other
        );
    }

    #[test]
    fn staged_paths_are_relativized() {
        let result = ok_result(
            ToolId::Bandit,
            vec![issue("/tmp/stage1/snippet.py", 1, "B105", "HIGH", "pw")],
        );
        let normalized = normalize(&[result], Some(Path::new("/tmp/stage1")));
        assert_eq!(normalized.findings[0].file, "snippet.py");
    }
}
