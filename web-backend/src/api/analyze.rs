use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use guardrail_core::{AnalysisRequest, CodeSource, Language, RepoContext, ToolId};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct AnalyzeBody {
    pub language: Language,
    /// 内联代码片段；与 path 二选一
    #[serde(default)]
    pub code: Option<String>,
    /// 本地文件或目录路径
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// 要运行的扫描器，缺省按语言选择保守默认
    #[serde(default)]
    pub scanners: Option<Vec<String>>,
    #[serde(default)]
    pub context: Option<RepoContext>,
}

pub fn configure_analyze_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/analyze", web::post().to(run_analysis))
        .route("/reports/{fingerprint}", web::get().to(get_report))
        .route("/reports/{fingerprint}", web::delete().to(delete_report));
}

/// 校验扫描器名称；为空时按语言选择默认组合
fn resolve_scanners(
    scanners: &Option<Vec<String>>,
    language: Language,
) -> Result<BTreeSet<ToolId>, String> {
    let raw: Vec<&str> = scanners
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if raw.is_empty() {
        let defaults = match language {
            Language::Python => vec![ToolId::Bandit, ToolId::PatternDetector],
            _ => vec![ToolId::Semgrep, ToolId::PatternDetector],
        };
        return Ok(defaults.into_iter().collect());
    }

    let mut tools = BTreeSet::new();
    for name in raw {
        let tool: ToolId = name.parse().map_err(|_| {
            format!(
                "unsupported scanner: {}. valid choices: bandit, semgrep, eslint, pattern-detector",
                name
            )
        })?;
        tools.insert(tool);
    }
    Ok(tools)
}

pub async fn run_analysis(
    state: web::Data<AppState>,
    body: web::Json<AnalyzeBody>,
) -> impl Responder {
    let tools = match resolve_scanners(&body.scanners, body.language) {
        Ok(tools) => tools,
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({ "error": e }));
        }
    };

    let source = match (&body.code, &body.path) {
        (Some(code), _) => CodeSource::Snippet(code.clone()),
        (None, Some(path)) => CodeSource::Path(path.clone()),
        (None, None) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "either code or path must be provided"
            }));
        }
    };

    let request = AnalysisRequest {
        language: body.language,
        source,
        tools,
        context: body.context.clone(),
    };

    match state.engine.analyze(&request).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) if e.is_invalid_request() => {
            HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() }))
        }
        Err(e) => {
            tracing::error!("analysis failed: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Analysis failed: {}", e)
            }))
        }
    }
}

pub async fn get_report(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let fingerprint = path.into_inner();
    match state.engine.get_report(&fingerprint) {
        Ok(Some(report)) => HttpResponse::Ok().json(report),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("No report for fingerprint {}", fingerprint)
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to load report: {}", e)
        })),
    }
}

pub async fn delete_report(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let fingerprint = path.into_inner();
    match state.engine.delete_report(&fingerprint) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "deleted": fingerprint })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to delete report: {}", e)
        })),
    }
}
