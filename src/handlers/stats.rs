// src/handlers/stats.rs
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::context::AppContext;
use crate::utils::ApiError;

const DEFAULT_TOP_LIMIT: u32 = 10;

pub async fn server_stats(
    context: web::Data<AppContext>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let steam_id = path.into_inner();
    match context.channel.map_changes_stats(&steam_id).await {
        Some(stats) => Ok(HttpResponse::Ok().json(stats)),
        None => Ok(HttpResponse::NotFound().body(format!("No map change stats for {}", steam_id))),
    }
}

#[derive(Deserialize)]
pub struct TopQuery {
    limit: Option<u32>,
}

pub async fn top_changing(
    context: web::Data<AppContext>,
    query: web::Query<TopQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    if limit == 0 {
        return Err(ApiError::InvalidRequest("limit must be positive".to_string()));
    }
    let servers = context.channel.top_changing_servers(limit).await;
    Ok(HttpResponse::Ok().json(servers))
}

pub async fn get_threshold(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    let threshold = context.channel.auto_save_threshold().await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "threshold": threshold })))
}

#[derive(Deserialize)]
pub struct ThresholdUpdate {
    threshold: u32,
}

pub async fn set_threshold(
    context: web::Data<AppContext>,
    body: web::Json<ThresholdUpdate>,
) -> Result<HttpResponse, ApiError> {
    if body.threshold == 0 {
        return Err(ApiError::InvalidRequest("threshold must be at least 1".to_string()));
    }
    if !context.channel.set_auto_save_threshold(body.threshold).await {
        return Err(ApiError::ScannerUnavailable);
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "threshold": body.threshold })))
}
