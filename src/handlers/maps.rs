// src/handlers/maps.rs
use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::context::AppContext;
use crate::selection::{is_catalog_map, MapSelection, SelectionStats, MAP_CATALOG};
use crate::storage::settings::SettingsError;
use crate::utils::ApiError;

#[derive(Serialize)]
pub struct MapsView {
    catalog: &'static [&'static str],
    selected: Vec<String>,
    stats: SelectionStats,
}

impl MapsView {
    fn of(selection: &MapSelection) -> Self {
        Self {
            catalog: MAP_CATALOG,
            selected: selection.maps(),
            stats: selection.stats(),
        }
    }
}

fn settings_error(e: SettingsError) -> ApiError {
    ApiError::Settings(e.to_string())
}

pub async fn get_maps(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    let view = context.with_selection(|selection| MapsView::of(selection));
    Ok(HttpResponse::Ok().json(view))
}

pub async fn select_all(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    let view = context.with_selection(|selection| {
        selection.select_all().map(|_| MapsView::of(selection))
    });
    Ok(HttpResponse::Ok().json(view.map_err(settings_error)?))
}

pub async fn select_none(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    let view = context.with_selection(|selection| {
        selection.select_none().map(|_| MapsView::of(selection))
    });
    Ok(HttpResponse::Ok().json(view.map_err(settings_error)?))
}

pub async fn select_popular(context: web::Data<AppContext>) -> Result<HttpResponse, ApiError> {
    let view = context.with_selection(|selection| {
        selection.select_popular().map(|_| MapsView::of(selection))
    });
    Ok(HttpResponse::Ok().json(view.map_err(settings_error)?))
}

pub async fn toggle(
    context: web::Data<AppContext>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let map = path.into_inner();
    if map.trim().is_empty() {
        return Err(ApiError::InvalidRequest("empty map code".to_string()));
    }

    let selected = context
        .with_selection(|selection| selection.toggle(&map))
        .map_err(settings_error)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "map": map,
        "selected": selected,
        "in_catalog": is_catalog_map(&map),
    })))
}
