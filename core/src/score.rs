// Score module - 风险评分
// 把发现集合归约成严重度统计和一个加权标量

use crate::config::ScoreConfig;
use crate::report::{Finding, SeverityCounts};

/// 统计严重度并计算加权风险分。
///
/// severity_counts 永远直接从发现集合重算，risk_score 永远由
/// severity_counts 推导，两者不独立存储，避免漂移。
pub fn score(findings: &[Finding], config: &ScoreConfig) -> (SeverityCounts, u32) {
    let counts = SeverityCounts::tally(findings);
    (counts, risk_score(&counts, config))
}

/// 加权和：HIGH×w_h + MEDIUM×w_m + LOW×w_l，饱和并截断到上限
pub fn risk_score(counts: &SeverityCounts, config: &ScoreConfig) -> u32 {
    let raw = counts
        .high
        .saturating_mul(config.high_weight)
        .saturating_add(counts.medium.saturating_mul(config.medium_weight))
        .saturating_add(counts.low.saturating_mul(config.low_weight));
    raw.min(config.max_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ToolId;
    use crate::report::{Category, Severity};

    fn finding(severity: Severity) -> Finding {
        Finding {
            id: Finding::derive_id(ToolId::Bandit, "B000", "a.py", 1, "x"),
            tool: ToolId::Bandit,
            severity,
            rule_id: "B000".to_string(),
            file: "a.py".to_string(),
            line: 1,
            message: "x".to_string(),
            category: Category::Other,
        }
    }

    #[test]
    fn weighted_sum_with_defaults() {
        let findings = vec![
            finding(Severity::High),
            finding(Severity::Medium),
            finding(Severity::Medium),
            finding(Severity::Low),
            finding(Severity::Info),
        ];
        let (counts, risk) = score(&findings, &ScoreConfig::default());
        assert_eq!(counts.high, 1);
        assert_eq!(counts.medium, 2);
        assert_eq!(counts.low, 1);
        assert_eq!(counts.info, 1);
        // 1×10 + 2×3 + 1×1，INFO 不计分
        assert_eq!(risk, 17);
    }

    #[test]
    fn empty_set_scores_zero() {
        let (counts, risk) = score(&[], &ScoreConfig::default());
        assert_eq!(counts.total(), 0);
        assert_eq!(risk, 0);
    }

    #[test]
    fn score_clamps_at_max() {
        let findings: Vec<_> = (0..50).map(|_| finding(Severity::High)).collect();
        let (_, risk) = score(&findings, &ScoreConfig::default());
        assert_eq!(risk, 100);
    }

    #[test]
    fn weights_are_configurable() {
        let config = ScoreConfig {
            high_weight: 5,
            medium_weight: 2,
            low_weight: 1,
            max_score: 1000,
        };
        let counts = SeverityCounts {
            high: 2,
            medium: 1,
            low: 0,
            info: 0,
        };
        assert_eq!(risk_score(&counts, &config), 12);
    }
}
