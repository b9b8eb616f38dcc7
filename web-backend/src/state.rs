use guardrail_core::{AnalysisEngine, EngineConfig};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AnalysisEngine>,
}

impl AppState {
    pub fn new() -> anyhow::Result<Self> {
        // 配置来自环境变量（扫描超时、报告目录、semgrep 规则集）
        let config = EngineConfig::from_env();
        tracing::info!("Reports directory: {}", config.reports_dir.display());

        let engine = AnalysisEngine::new(config)?;
        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}
