use actix_web::{web, HttpResponse, Responder};

use crate::state::AppState;

pub fn configure_status_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/status", web::get().to(get_status));
}

/// 报告各扫描器二进制的可用性，前端据此决定能跑哪些扫描
pub async fn get_status(_state: web::Data<AppState>) -> impl Responder {
    let binaries = guardrail_core::check_binaries().await;
    HttpResponse::Ok().json(serde_json::json!({
        "platform": {
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
        "binaries": binaries,
    }))
}
