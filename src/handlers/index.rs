// src/handlers/index.rs
use actix_web::{web, HttpResponse};
use log::info;
use serde::Deserialize;

use crate::context::AppContext;
use crate::utils::ApiError;

pub async fn status(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(context.status()))
}

pub async fn notices(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(context.notices.recent()))
}

#[derive(Deserialize)]
pub struct RealtimeToggle {
    enabled: bool,
}

/// Switches between the scanner channel and the listing API fallback.
pub async fn set_realtime(
    context: web::Data<AppContext>,
    body: web::Json<RealtimeToggle>,
) -> Result<HttpResponse, ApiError> {
    info!("Realtime channel {}", if body.enabled { "enabled" } else { "disabled" });
    context.channel.set_use_realtime(body.enabled);
    Ok(HttpResponse::Ok().json(context.status()))
}
