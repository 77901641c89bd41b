// src/handlers/saved.rs
use actix_web::{web, HttpResponse};
use log::info;
use serde::Deserialize;

use crate::context::AppContext;
use crate::utils::ApiError;

pub async fn get_saved(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(context.channel.saved_servers()))
}

pub async fn refresh(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    if !context.channel.request_saved_servers() {
        return Err(ApiError::ScannerUnavailable);
    }
    Ok(HttpResponse::Accepted().finish())
}

#[derive(Deserialize)]
pub struct SavedServerRef {
    ip: String,
    port: String,
}

pub async fn delete(
    context: web::Data<AppContext>,
    body: web::Json<SavedServerRef>,
) -> Result<HttpResponse, ApiError> {
    if body.ip.is_empty() || body.port.is_empty() {
        return Err(ApiError::InvalidRequest("ip and port are required".to_string()));
    }
    if !context.channel.delete_saved_server(&body.ip, &body.port) {
        return Err(ApiError::ScannerUnavailable);
    }
    info!("Requested removal of saved server {}:{}", body.ip, body.port);
    Ok(HttpResponse::Accepted().finish())
}
