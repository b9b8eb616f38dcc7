// Guardrail Core Library
// 核心功能库：请求指纹、扫描编排、输出归一化、风险评分和报告存储

mod adapters;
mod config;
mod engine;
mod fingerprint;
mod normalize;
mod orchestrator;
mod report;
mod request;
mod score;
mod store;

// 重新导出常用类型
pub use adapters::{
    check_binaries, AdapterRegistry, BinaryStatus, RawIssue, ToolAdapter, ToolError, ToolId,
    ToolResult,
};
pub use adapters::{
    bandit::BanditAdapter, eslint::EslintAdapter, pattern::PatternDetector,
    semgrep::SemgrepAdapter,
};
pub use config::{EngineConfig, ScoreConfig};
pub use engine::AnalysisEngine;
pub use fingerprint::fingerprint;
pub use normalize::{normalize, NormalizedFindings};
pub use orchestrator::Orchestrator;
pub use report::{
    Category, Finding, HistoryEntry, Report, Severity, SeverityCounts, ToolResultSummary,
};
pub use request::{AnalysisRequest, CodeSource, Language, RepoContext};
pub use score::{risk_score, score};
pub use store::{HistoryDateGroup, HistoryLanguageGroup, ReportStore, StoreError};

pub mod error {
    use std::path::PathBuf;
    use thiserror::Error;

    use crate::request::Language;
    use crate::store::StoreError;

    #[derive(Error, Debug)]
    pub enum EngineError {
        #[error("request content is empty")]
        EmptyContent,

        #[error("requested tool set is empty")]
        NoToolsRequested,

        #[error("no requested scanner supports language: {0}")]
        UnsupportedLanguage(Language),

        #[error("target path not found: {0}")]
        PathNotFound(PathBuf),

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error(transparent)]
        Store(#[from] StoreError),
    }

    impl EngineError {
        /// 请求本身无效（而非基础设施故障），传输层据此映射 4xx
        pub fn is_invalid_request(&self) -> bool {
            matches!(
                self,
                Self::EmptyContent
                    | Self::NoToolsRequested
                    | Self::UnsupportedLanguage(_)
                    | Self::PathNotFound(_)
            )
        }
    }

    pub type Result<T> = std::result::Result<T, EngineError>;
}
