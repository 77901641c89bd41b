// src/handlers/mod.rs
use actix_web::web;

pub mod auth;
pub mod index;
pub mod maps;
pub mod saved;
pub mod servers;
pub mod stats;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index::status))
        .route("/notices", web::get().to(index::notices))
        .route("/realtime", web::post().to(index::set_realtime))
        .route("/auth/key", web::post().to(auth::submit_key))
        .route("/auth/auto_connect", web::post().to(auth::set_auto_connect))
        .route("/servers", web::get().to(servers::get_servers))
        .route("/servers/scan", web::post().to(servers::scan))
        .route("/servers/clear", web::post().to(servers::clear_unavailable))
        .route("/servers/refresh", web::post().to(servers::refresh))
        .route("/servers/refresh/game", web::post().to(servers::refresh_game))
        .route("/servers/refresh/empty", web::post().to(servers::refresh_empty))
        .route("/maps", web::get().to(maps::get_maps))
        .route("/maps/all", web::post().to(maps::select_all))
        .route("/maps/none", web::post().to(maps::select_none))
        .route("/maps/popular", web::post().to(maps::select_popular))
        .route("/maps/toggle/{map}", web::post().to(maps::toggle))
        // `top` must be matched before the `{steam_id}` catch-all
        .route("/stats/top", web::get().to(stats::top_changing))
        .route("/stats/{steam_id}", web::get().to(stats::server_stats))
        .route("/threshold", web::get().to(stats::get_threshold))
        .route("/threshold", web::post().to(stats::set_threshold))
        .route("/saved", web::get().to(saved::get_saved))
        .route("/saved/refresh", web::post().to(saved::refresh))
        .route("/saved/delete", web::post().to(saved::delete));
}
