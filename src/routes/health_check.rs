use actix_web::HttpResponse;

use crate::routes::response::ApiResponse;

pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().json(ApiResponse::message("API is running"))
}
