// Engine module - 分析引擎门面
// 组合指纹、存储 get-or-compute 和编排器；进程启动时创建一个实例，
// 所有查询/变更都走它的契约，没有环境全局状态

use crate::adapters::AdapterRegistry;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fingerprint::fingerprint;
use crate::report::{HistoryEntry, Report};
use crate::request::{AnalysisRequest, CodeSource};
use crate::orchestrator::Orchestrator;
use crate::store::{HistoryDateGroup, ReportStore};

pub struct AnalysisEngine {
    orchestrator: Orchestrator,
    store: ReportStore,
}

impl AnalysisEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let registry = AdapterRegistry::with_defaults(&config);
        Self::with_registry(config, registry)
    }

    /// 用自定义注册表构建（测试注入假适配器用）
    pub fn with_registry(
        config: EngineConfig,
        registry: AdapterRegistry,
    ) -> Result<Self, EngineError> {
        let store = ReportStore::new(&config.reports_dir)?;
        let orchestrator = Orchestrator::new(registry, config);
        Ok(Self {
            orchestrator,
            store,
        })
    }

    /// 分析一次请求。
    ///
    /// 相同指纹的请求只会执行一次编排；重复请求直接返回已持久化的
    /// 报告并置 `served_from_cache`。只要请求本身有效，零个工具成功
    /// 也会得到有效的空报告而不是错误。
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Report, EngineError> {
        self.validate(request)?;
        let fp = fingerprint(request);
        tracing::info!(fingerprint = %fp, language = %request.language, "analysis requested");

        let (report, from_cache) = self
            .store
            .get_or_compute(&fp, || self.orchestrator.execute(request, &fp))
            .await?;

        if from_cache {
            tracing::info!(fingerprint = %fp, "analysis already performed, serving stored report");
        }
        Ok(report)
    }

    pub fn get_report(&self, fingerprint: &str) -> Result<Option<Report>, EngineError> {
        Ok(self.store.get(fingerprint)?)
    }

    pub fn list_history(&self) -> Result<Vec<HistoryEntry>, EngineError> {
        Ok(self.store.list_history()?)
    }

    pub fn history_tree(&self) -> Result<Vec<HistoryDateGroup>, EngineError> {
        Ok(self.store.history_tree()?)
    }

    pub fn delete_report(&self, fingerprint: &str) -> Result<(), EngineError> {
        Ok(self.store.delete(fingerprint)?)
    }

    /// 任何适配器运行前先拒绝无效请求
    fn validate(&self, request: &AnalysisRequest) -> Result<(), EngineError> {
        if request.tools.is_empty() {
            return Err(EngineError::NoToolsRequested);
        }
        match &request.source {
            CodeSource::Snippet(code) => {
                if code.trim().is_empty() {
                    return Err(EngineError::EmptyContent);
                }
            }
            CodeSource::Path(path) => {
                if !path.exists() {
                    return Err(EngineError::PathNotFound(path.clone()));
                }
            }
        }
        if !self
            .orchestrator
            .registry()
            .any_accepts(request.tools.iter(), request.language)
        {
            return Err(EngineError::UnsupportedLanguage(request.language));
        }
        Ok(())
    }
}
