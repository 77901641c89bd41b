//! The local HTTP surface with the scanner offline.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::Value;

use gswatch::config::Config;
use gswatch::context::AppContext;
use gswatch::handlers;

fn context(name: &str) -> Arc<AppContext> {
    let path = std::env::temp_dir().join(format!("gswatch-http-{}-{}.json", name, std::process::id()));
    let _ = std::fs::remove_file(&path);
    AppContext::new(Config {
        use_realtime: false,
        settings_path: path.to_string_lossy().into_owned(),
        ..Config::default()
    })
}

#[actix_web::test]
async fn status_reports_offline_scanner() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(context("status")))
            .configure(handlers::routes),
    )
    .await;

    let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(body["connection"], "disconnected");
    assert_eq!(body["loading"], false);
    assert_eq!(body["has_api_key"], false);
    assert_eq!(body["tracked"], 0);
}

#[actix_web::test]
async fn scan_without_key_is_a_bad_request() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(context("scan")))
            .configure(handlers::routes),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::post().uri("/servers/scan").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn queries_fall_back_to_defaults_when_offline() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(context("queries")))
            .configure(handlers::routes),
    )
    .await;

    let threshold: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/threshold").to_request()).await;
    assert_eq!(threshold["threshold"], 3);

    let top: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/stats/top?limit=5").to_request()).await;
    assert_eq!(top, Value::Array(vec![]));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/stats/76561198000000001").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    for uri in ["/servers/refresh", "/servers/refresh/game", "/servers/refresh/empty", "/saved/refresh"] {
        let resp = test::call_service(&app, test::TestRequest::post().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
    }
}

#[actix_web::test]
async fn map_toggle_flips_and_persists() {
    let context = context("maps");
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(Arc::clone(&context)))
            .configure(handlers::routes),
    )
    .await;

    let maps: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/maps").to_request()).await;
    assert_eq!(maps["stats"]["status"], "all");

    let toggled: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post().uri("/maps/toggle/de_nuke").to_request(),
    )
    .await;
    assert_eq!(toggled["selected"], false);
    assert_eq!(toggled["in_catalog"], true);

    let stored = context.settings.get().selected_maps.unwrap();
    assert!(!stored.contains(&"de_nuke".to_string()));

    let none: Value =
        test::call_and_read_body_json(&app, test::TestRequest::post().uri("/maps/none").to_request()).await;
    assert_eq!(none["stats"]["selected"], 0);
}

#[actix_web::test]
async fn clearing_unavailable_keeps_history() {
    let context = context("clear");
    context.store.ingest(vec![gswatch::models::server::ServerRecord::new("1", "graphics_settings")]);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(Arc::clone(&context)))
            .configure(handlers::routes),
    )
    .await;

    let cleared: Value =
        test::call_and_read_body_json(&app, test::TestRequest::post().uri("/servers/clear").to_request()).await;
    assert_eq!(cleared["removed"], 1);

    let servers: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/servers").to_request()).await;
    assert_eq!(servers["tracked"], 1);
    assert_eq!(servers["unavailable"], Value::Array(vec![]));
    assert_eq!(servers["transition_counts"]["1"], 1);
}
