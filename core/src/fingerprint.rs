// Fingerprint module - 请求指纹
// 为分析请求派生稳定身份，相同指纹的请求视为同一次分析

use sha1::Digest;
use std::fs;
use std::path::Path;

use crate::request::{AnalysisRequest, CodeSource};

/// 计算请求指纹：sha1(内容字节, 语言, 排序后的工具名, 仓库上下文)。
///
/// 确定性、纯函数、无失败路径。片段哈希原始字节（不做空白归一化，
/// 字节级重复提交才命中缓存）；路径哈希规范化后的路径字符串。
pub fn fingerprint(request: &AnalysisRequest) -> String {
    let mut hasher = sha1::Sha1::new();

    match &request.source {
        CodeSource::Snippet(code) => hasher.update(code.as_bytes()),
        CodeSource::Path(path) => {
            let canonical = canonicalize_lossy(path);
            hasher.update(canonical.as_bytes());
        }
    }
    hasher.update(b"\n");
    hasher.update(request.language.as_str().as_bytes());
    hasher.update(b"\n");

    // BTreeSet 迭代即有序
    for tool in &request.tools {
        hasher.update(tool.as_str().as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"\n");

    if let Some(context) = &request.context {
        hasher.update(context.repository.as_bytes());
        hasher.update(b"@");
        if let Some(branch) = &context.branch {
            hasher.update(branch.as_bytes());
        }
        hasher.update(b"#");
        if let Some(commit) = &context.commit {
            hasher.update(commit.as_bytes());
        }
    }

    format!("{:x}", hasher.finalize())
}

fn canonicalize_lossy(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}
