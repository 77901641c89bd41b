// src/handlers/servers.rs
use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use log::debug;
use serde::Serialize;

use crate::context::AppContext;
use crate::models::server::{ScanStats, ServerRecord};
use crate::utils::ApiError;

#[derive(Serialize)]
pub struct ServersView {
    unavailable: Vec<ServerRecord>,
    visible: Vec<ServerRecord>,
    tracked: usize,
    transition_counts: HashMap<String, u32>,
    stats: Option<ScanStats>,
}

pub async fn get_servers(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    let snapshot = context.store.snapshot();
    let view = ServersView {
        unavailable: snapshot.unavailable_newest_first(),
        visible: snapshot.visible_newest_first(),
        tracked: snapshot.history.len(),
        transition_counts: snapshot.transition_counts,
        stats: context.channel.last_stats(),
    };
    debug!(
        "Serving {} unavailable and {} visible servers",
        view.unavailable.len(),
        view.visible.len()
    );
    Ok(HttpResponse::Ok().json(view))
}

pub async fn scan(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    let outcome = context.load_servers().await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn clear_unavailable(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    let removed = context.store.clear_unavailable();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "removed": removed })))
}

pub async fn refresh(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    if !context.channel.force_update() {
        return Err(ApiError::ScannerUnavailable);
    }
    Ok(HttpResponse::Accepted().finish())
}

/// Asks the scanner to resend its visible server list.
pub async fn refresh_game(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    if !context.channel.request_game_servers() {
        return Err(ApiError::ScannerUnavailable);
    }
    Ok(HttpResponse::Accepted().finish())
}

/// Asks the scanner to resend its unavailable server list.
pub async fn refresh_empty(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    if !context.channel.request_empty_servers() {
        return Err(ApiError::ScannerUnavailable);
    }
    Ok(HttpResponse::Accepted().finish())
}
