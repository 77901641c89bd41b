// src/handlers/auth.rs
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::context::AppContext;
use crate::utils::ApiError;

#[derive(Deserialize)]
pub struct KeySubmission {
    api_key: String,
}

pub async fn submit_key(
    context: web::Data<AppContext>,
    body: web::Json<KeySubmission>,
) -> Result<HttpResponse, ApiError> {
    context.submit_api_key(&body.api_key).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })))
}

#[derive(Deserialize)]
pub struct AutoConnectToggle {
    enabled: bool,
}

pub async fn set_auto_connect(
    context: web::Data<AppContext>,
    body: web::Json<AutoConnectToggle>,
) -> Result<HttpResponse, ApiError> {
    context
        .auto_connect
        .set_armed(body.enabled)
        .map_err(|e| ApiError::Settings(e.to_string()))?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "auto_connect": body.enabled })))
}
