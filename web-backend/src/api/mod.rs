use actix_web::{web, Scope};

pub mod analyze;
pub mod history;
pub mod status;

pub fn create_api_router() -> Scope {
    web::scope("/api")
        .configure(analyze::configure_analyze_routes)
        .configure(history::configure_history_routes)
        .configure(status::configure_status_routes)
}
