// Request module - 分析请求模型

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::adapters::ToolId;

/// 支持的源码语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Java,
    Csharp,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::Java => "java",
            Self::Csharp => "csharp",
        }
    }

    /// 代码片段落盘时使用的文件扩展名
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::Python => ".py",
            Self::Javascript => ".js",
            Self::Typescript => ".ts",
            Self::Java => ".java",
            Self::Csharp => ".cs",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 待分析内容：内联代码片段或本地文件/目录路径
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeSource {
    Snippet(String),
    Path(PathBuf),
}

/// 可选的仓库来源元数据。参与指纹计算：同一内容在不同仓库
/// 上下文下会得到不同指纹，历史条目因此可追溯到来源。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoContext {
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// 一次分析请求。创建后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub language: Language,
    pub source: CodeSource,
    /// BTreeSet 保证工具列表有序，{bandit, semgrep} 与 {semgrep, bandit}
    /// 指纹一致。
    pub tools: BTreeSet<ToolId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RepoContext>,
}

impl AnalysisRequest {
    pub fn snippet(
        language: Language,
        code: impl Into<String>,
        tools: impl IntoIterator<Item = ToolId>,
    ) -> Self {
        Self {
            language,
            source: CodeSource::Snippet(code.into()),
            tools: tools.into_iter().collect(),
            context: None,
        }
    }

    pub fn path(
        language: Language,
        path: impl Into<PathBuf>,
        tools: impl IntoIterator<Item = ToolId>,
    ) -> Self {
        Self {
            language,
            source: CodeSource::Path(path.into()),
            tools: tools.into_iter().collect(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: RepoContext) -> Self {
        self.context = Some(context);
        self
    }
}
