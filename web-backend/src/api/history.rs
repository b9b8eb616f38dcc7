use actix_web::{web, HttpResponse, Responder};

use crate::state::AppState;

pub fn configure_history_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/history", web::get().to(get_history))
        .route("/history/tree", web::get().to(get_history_tree));
}

/// 历史条目列表，created_at 降序
pub async fn get_history(state: web::Data<AppState>) -> impl Responder {
    match state.engine.list_history() {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to list history: {}", e)
        })),
    }
}

/// 分组视图：日期 → 语言 → 按最高严重度排序
pub async fn get_history_tree(state: web::Data<AppState>) -> impl Responder {
    match state.engine.history_tree() {
        Ok(tree) => HttpResponse::Ok().json(tree),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to build history index: {}", e)
        })),
    }
}
