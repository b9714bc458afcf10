use std::path::Path;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    routing::get,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::AppState;

pub mod status;
pub mod ws;

pub fn build_router(dashboard_path: &Path) -> Router<AppState> {
    Router::new()
        .route("/", get(ws::upgrade))
        .route("/ws", get(ws::upgrade))
        .route("/api/status", get(status::get_status))
        .route_service(
            "/dashboard",
            <ServeFile as ServiceExt<Request>>::map_response(
                ServeFile::new(dashboard_path),
                |mut response| {
                    // Regenerated on every start
                    response
                        .headers_mut()
                        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                    response
                },
            ),
        )
}
